//! Page composer - one target path, end to end.
//!
//! render -> shell merge -> minify -> write, strictly ordered within a path.
//! Any stage failure wraps into a `ComposeError` attributed to the path and
//! the stage; when the cause looks like client-only code touching browser
//! APIs, a remediation hint rides along.

use crate::error::{ComposeError, ComposeStage};
use crate::hints;
use crate::minify::HtmlMinifier;
use crate::renderer::RendererHandle;
use crate::sandbox::RenderRequest;
use crate::template::CompiledTemplate;
use crate::writer::PageWriter;
use serde_json::{Map, Value};

/// What a successfully composed path contributes to the batch: the data its
/// render collected, and any minifier warnings.
#[derive(Debug, Clone)]
pub struct PageData {
    pub collected: Value,
    pub warnings: Vec<String>,
}

pub async fn compose_page(
    request: RenderRequest,
    renderer: &RendererHandle,
    template: &CompiledTemplate,
    minifier: &HtmlMinifier,
    writer: &PageWriter,
    template_params: &Map<String, Value>,
) -> Result<PageData, ComposeError> {
    let target_path = request.target_path.clone();

    let page = renderer
        .render(request)
        .await
        .map_err(|cause| fail(&target_path, ComposeStage::Render, cause))?;

    let document = template
        .render(&page, &target_path, template_params)
        .map_err(|cause| fail(&target_path, ComposeStage::Template, cause.into()))?;

    let minified = minifier
        .minify(&document)
        .map_err(|cause| fail(&target_path, ComposeStage::Minify, cause))?;

    writer
        .write(&target_path, &minified.code)
        .await
        .map_err(|cause| fail(&target_path, ComposeStage::Write, cause))?;

    Ok(PageData {
        collected: page.collected,
        warnings: minified.warnings,
    })
}

fn fail(target_path: &str, stage: ComposeStage, cause: anyhow::Error) -> ComposeError {
    // Best-effort diagnostic only: the hint decorates the failure, it never
    // steers control flow.
    let hint = hints::classify(&format!("{cause:#}"));
    ComposeError {
        target_path: target_path.to_string(),
        stage,
        hint,
        cause,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn failures_carry_path_stage_and_hint() {
        let error = fail(
            "/b",
            ComposeStage::Render,
            anyhow!("ReferenceError: window is not defined"),
        );
        assert_eq!(error.target_path, "/b");
        assert_eq!(error.stage, ComposeStage::Render);
        assert_eq!(error.hint, Some(hints::CLIENT_ONLY_HINT));
    }

    #[test]
    fn unrelated_failures_get_no_hint() {
        let error = fail("/a", ComposeStage::Write, anyhow!("disk full"));
        assert_eq!(error.hint, None);
    }
}
