//! HTML minifier built on `lol_html`.
//!
//! Two variants: `conservative` strips comments only; `standard` also
//! collapses whitespace runs in text, leaving `pre`, `textarea`, `script`,
//! and `style` content untouched. Important comments (`<!--! ... -->`) and
//! IE conditional comments are preserved verbatim and surface as advisory
//! warnings, alongside lints for markup the minifier deliberately keeps
//! as-is (deprecated presentational elements, inline event handlers).

use anyhow::{anyhow, Error};
use lol_html::html_content::ContentType;
use lol_html::{doc_comments, element, rewrite_str, text, RewriteStrSettings};
use std::cell::RefCell;
use std::rc::Rc;

/// Which minifier the batch uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MinifierVariant {
    /// Strip comments, keep all whitespace.
    Conservative,
    /// Strip comments and collapse whitespace outside preformatted content.
    #[default]
    Standard,
}

/// The minified document plus any issues the minifier flagged.
#[derive(Debug, Clone)]
pub struct MinifyResult {
    pub code: String,
    pub warnings: Vec<String>,
}

pub struct HtmlMinifier {
    variant: MinifierVariant,
}

impl HtmlMinifier {
    pub fn for_variant(variant: MinifierVariant) -> Self {
        Self { variant }
    }

    pub fn minify(&self, html: &str) -> Result<MinifyResult, Error> {
        let warnings: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        // Set per text chunk by the preformatted-content handler, cleared by
        // the collapser; handlers run in registration order for each chunk.
        let keep_chunk = Rc::new(RefCell::new(false));

        let mut handlers = vec![
            element!("center, font, marquee, blink", {
                let warnings = Rc::clone(&warnings);
                move |el| {
                    warnings.borrow_mut().push(format!(
                        "deprecated presentational element <{}> retained",
                        el.tag_name()
                    ));
                    Ok(())
                }
            }),
            element!("[onclick], [onload], [onerror]", {
                let warnings = Rc::clone(&warnings);
                move |el| {
                    warnings.borrow_mut().push(format!(
                        "inline event handler attribute on <{}> retained",
                        el.tag_name()
                    ));
                    Ok(())
                }
            }),
        ];

        if self.variant == MinifierVariant::Standard {
            handlers.push(text!("pre, textarea, script, style", {
                let keep_chunk = Rc::clone(&keep_chunk);
                move |_chunk| {
                    *keep_chunk.borrow_mut() = true;
                    Ok(())
                }
            }));
            handlers.push(text!("*", {
                let keep_chunk = Rc::clone(&keep_chunk);
                move |chunk| {
                    let keep = std::mem::replace(&mut *keep_chunk.borrow_mut(), false);
                    if !keep {
                        let collapsed = collapse_whitespace(chunk.as_str());
                        if collapsed != chunk.as_str() {
                            chunk.replace(&collapsed, ContentType::Text);
                        }
                    }
                    Ok(())
                }
            }));
        }

        let code = rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: handlers,
                document_content_handlers: vec![doc_comments!({
                    let warnings = Rc::clone(&warnings);
                    move |comment| {
                        let body = comment.text();
                        if body.starts_with('!') {
                            warnings
                                .borrow_mut()
                                .push("preserved important comment".to_string());
                        } else if body.trim_start().starts_with("[if") {
                            warnings
                                .borrow_mut()
                                .push("conditional comment retained".to_string());
                        } else {
                            comment.remove();
                        }
                        Ok(())
                    }
                })],
                ..RewriteStrSettings::default()
            },
        )
        .map_err(|e| anyhow!("minification failed: {e}"))?;

        let warnings = warnings.borrow().clone();
        Ok(MinifyResult { code, warnings })
    }
}

/// Collapses runs of ASCII whitespace to a single space.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if matches!(c, ' ' | '\t' | '\n' | '\r') {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minify(variant: MinifierVariant, html: &str) -> MinifyResult {
        HtmlMinifier::for_variant(variant).minify(html).unwrap()
    }

    #[test]
    fn strips_plain_comments_in_both_variants() {
        for variant in [MinifierVariant::Conservative, MinifierVariant::Standard] {
            let result = minify(variant, "<div><!-- scaffolding note --><p>x</p></div>");
            assert!(!result.code.contains("scaffolding"), "{variant:?}");
            assert!(result.warnings.is_empty(), "{variant:?}");
        }
    }

    #[test]
    fn preserves_important_and_conditional_comments_with_warnings() {
        let result = minify(
            MinifierVariant::Standard,
            "<!--! license --><div><!--[if IE]>legacy<![endif]--></div>",
        );
        assert!(result.code.contains("license"));
        assert!(result.code.contains("[if IE]"));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("preserved important comment")));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("conditional comment retained")));
    }

    #[test]
    fn standard_collapses_whitespace_but_conservative_does_not() {
        let html = "<p>hello\n\n      world</p>";
        let standard = minify(MinifierVariant::Standard, html);
        assert_eq!(standard.code, "<p>hello world</p>");

        let conservative = minify(MinifierVariant::Conservative, html);
        assert_eq!(conservative.code, html);
    }

    #[test]
    fn preformatted_and_raw_text_content_is_untouched() {
        let html = "<pre>line one\n  line two</pre><script>const x   =   1;\n</script>";
        let result = minify(MinifierVariant::Standard, html);
        assert!(result.code.contains("line one\n  line two"));
        assert!(result.code.contains("const x   =   1;\n"));
    }

    #[test]
    fn flags_deprecated_elements_and_inline_handlers() {
        let result = minify(
            MinifierVariant::Standard,
            r#"<center>old</center><button onclick="go()">go</button>"#,
        );
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("deprecated presentational element <center>")));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("inline event handler attribute on <button>")));
        // Lints never change the markup.
        assert!(result.code.contains(r#"onclick="go()""#));
    }
}
