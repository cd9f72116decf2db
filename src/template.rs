//! Page-shell template compiler.
//!
//! A shell template is the fixed HTML document a rendered fragment gets
//! merged into. Placeholders:
//!
//! - `{{content}}` - the rendered HTML fragment
//! - `{{head}}` - head/meta directives collected during the render
//! - `{{path}}` - the target path being generated
//! - `{{param:NAME}}` - a value from the caller-supplied template params
//!
//! Compilation validates placeholder names once per batch; unknown
//! placeholders fail there rather than on every page.

use crate::sandbox::PageResult;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown template placeholder '{{{{{0}}}}}'")]
    UnknownPlaceholder(String),
    #[error("unterminated template placeholder at byte {0}")]
    Unterminated(usize),
    #[error("template parameter '{0}' has no value in params")]
    MissingParam(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Content,
    Head,
    Path,
    Param(String),
}

/// A parsed shell template, reusable across every path in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    segments: Vec<Segment>,
}

/// Parses `source` into a compiled template.
pub fn compile(source: &str) -> Result<CompiledTemplate, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = source;
    let mut offset = 0;

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            segments.push(Segment::Literal(rest[..open].to_string()));
        }
        let after_open = &rest[open + 2..];
        let close = after_open
            .find("}}")
            .ok_or(TemplateError::Unterminated(offset + open))?;
        let name = after_open[..close].trim();

        let segment = match name {
            "content" => Segment::Content,
            "head" => Segment::Head,
            "path" => Segment::Path,
            _ => match name.strip_prefix("param:") {
                Some(param) if !param.is_empty() => Segment::Param(param.to_string()),
                _ => return Err(TemplateError::UnknownPlaceholder(name.to_string())),
            },
        };
        segments.push(segment);

        offset += open + 2 + close + 2;
        rest = &after_open[close + 2..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }

    Ok(CompiledTemplate { segments })
}

impl CompiledTemplate {
    /// Merges one page's fragment and metadata into a complete document.
    pub fn render(
        &self,
        page: &PageResult,
        target_path: &str,
        params: &Map<String, Value>,
    ) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Content => out.push_str(&page.html),
                Segment::Head => out.push_str(&page.head),
                Segment::Path => out.push_str(target_path),
                Segment::Param(name) => {
                    let value = params
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingParam(name.clone()))?;
                    match value {
                        Value::String(s) => out.push_str(s),
                        other => out.push_str(&other.to_string()),
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(html: &str, head: &str) -> PageResult {
        PageResult {
            html: html.to_string(),
            head: head.to_string(),
            collected: Value::Null,
        }
    }

    fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn merges_fragment_head_and_path() {
        let template =
            compile("<html><head>{{head}}</head><body data-path=\"{{path}}\">{{content}}</body></html>")
                .unwrap();
        let document = template
            .render(&page("<p>hi</p>", "<title>Hi</title>"), "/about", &Map::new())
            .unwrap();
        assert_eq!(
            document,
            "<html><head><title>Hi</title></head><body data-path=\"/about\"><p>hi</p></body></html>"
        );
    }

    #[test]
    fn substitutes_params_strings_raw_and_other_values_as_json() {
        let template = compile("<html lang=\"{{param:lang}}\">{{param:build}}</html>").unwrap();
        let document = template
            .render(
                &page("", ""),
                "/",
                &params(&[("lang", json!("en")), ("build", json!(42))]),
            )
            .unwrap();
        assert_eq!(document, "<html lang=\"en\">42</html>");
    }

    #[test]
    fn unknown_placeholder_fails_at_compile_time() {
        assert_eq!(
            compile("{{conten}}"),
            Err(TemplateError::UnknownPlaceholder("conten".to_string()))
        );
    }

    #[test]
    fn unterminated_placeholder_reports_its_offset() {
        assert_eq!(compile("abc{{content"), Err(TemplateError::Unterminated(3)));
    }

    #[test]
    fn missing_param_fails_at_render_time() {
        let template = compile("{{param:site}}").unwrap();
        assert_eq!(
            template.render(&page("", ""), "/", &Map::new()),
            Err(TemplateError::MissingParam("site".to_string()))
        );
    }

    #[test]
    fn whitespace_inside_placeholders_is_tolerated() {
        let template = compile("{{ content }}").unwrap();
        let document = template.render(&page("<p>x</p>", ""), "/", &Map::new()).unwrap();
        assert_eq!(document, "<p>x</p>");
    }
}
