//! Batch orchestration.
//!
//! One call to [`generate_site`] is one batch: compile the shell template,
//! load the sandbox (a load failure aborts before any path work), fan out
//! over every target path under the concurrency ceiling, tear the sandbox
//! down once every render has settled, report warnings, and aggregate the
//! outcomes into a single verdict. Teardown happens before either terminal
//! state is reached; file writes for succeeded paths are never rolled back.

use crate::aggregate::{aggregate, BatchResult};
use crate::compose::compose_page;
use crate::error::EngineError;
use crate::executor::{default_concurrency, run_all};
use crate::minify::{HtmlMinifier, MinifierVariant};
use crate::renderer::RendererHandle;
use crate::report::report_warnings;
use crate::sandbox::{RenderRequest, SandboxConfig};
use crate::sanitize::check_render_context;
use crate::shims;
use crate::template;
use crate::writer::PageWriter;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything one batch needs.
pub struct GenerateParams {
    /// Entry file of the compiled server bundle.
    pub bundle_path: PathBuf,
    /// Logical documents to produce.
    pub target_paths: Vec<String>,
    /// Destination root for written HTML files.
    pub out_dir: PathBuf,
    /// Raw page-shell template source.
    pub template_source: String,
    /// Which minifier to pipe documents through.
    pub minifier: MinifierVariant,
    /// In-flight ceiling; defaults to a small multiple of available
    /// parallelism.
    pub concurrency: Option<usize>,
    /// Escape hatch: skip the consolidated warning summary entirely.
    pub suppress_warning_summary: bool,
    /// Arbitrary JSON handed to every render call.
    pub render_context: Value,
    /// Values for `{{param:NAME}}` placeholders in the shell template.
    pub template_params: Map<String, Value>,
    /// Placeholder globals installed in the sandbox.
    pub shim_globals: BTreeMap<String, Value>,
    /// Origins the bundle may fetch from during renders.
    pub allowed_fetch_origins: Vec<String>,
    /// V8 heap ceiling for the sandbox.
    pub max_heap_size: Option<usize>,
}

impl GenerateParams {
    pub fn new(
        bundle_path: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
        template_source: impl Into<String>,
    ) -> Self {
        Self {
            bundle_path: bundle_path.into(),
            target_paths: Vec::new(),
            out_dir: out_dir.into(),
            template_source: template_source.into(),
            minifier: MinifierVariant::default(),
            concurrency: None,
            suppress_warning_summary: false,
            render_context: Value::Null,
            template_params: Map::new(),
            shim_globals: shims::default_shims(),
            allowed_fetch_origins: Vec::new(),
            max_heap_size: Some(crate::sandbox::DEFAULT_MAX_HEAP_BYTES),
        }
    }
}

/// Runs one batch. Returns the path -> collected-data map on full success,
/// or a single aggregate error carrying every per-path cause.
pub async fn generate_site(params: GenerateParams) -> Result<BatchResult, EngineError> {
    let template = template::compile(&params.template_source)?;
    check_render_context(&params.render_context)?;

    let minifier = HtmlMinifier::for_variant(params.minifier);
    let writer = PageWriter::new(&params.out_dir);
    let requests: Vec<RenderRequest> = params
        .target_paths
        .iter()
        .map(|path| RenderRequest::new(path.clone()))
        .collect();

    let sandbox_config = SandboxConfig {
        bundle_path: params.bundle_path.clone(),
        shim_globals: params.shim_globals.clone(),
        allowed_fetch_origins: params.allowed_fetch_origins.clone(),
        max_heap_size: params.max_heap_size,
    };
    let renderer = RendererHandle::connect(sandbox_config, params.render_context.clone()).await?;

    let limit = params.concurrency.unwrap_or_else(default_concurrency);
    tracing::info!(
        paths = requests.len(),
        concurrency = limit,
        bundle = %params.bundle_path.display(),
        "sandbox ready, rendering"
    );

    let outcomes = run_all(requests, limit, |request| {
        compose_page(
            request,
            &renderer,
            &template,
            &minifier,
            &writer,
            &params.template_params,
        )
    })
    .await;

    // Every render has settled; teardown precedes either terminal state.
    renderer.shutdown().await;

    report_warnings(&outcomes, params.suppress_warning_summary);

    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    let failed = outcomes.len() - succeeded;
    if failed > 0 {
        tracing::error!(succeeded, failed, "batch finished with failures");
    } else {
        tracing::info!(succeeded, "batch finished");
    }

    Ok(aggregate(outcomes)?)
}
