//! Sandbox - the isolated V8 runtime that executes the compiled bundle.
//!
//! One sandbox exists per batch. Creation builds a fresh module-resolution
//! environment scoped to the bundle directory, installs the placeholder
//! globals, evaluates the bundle's top-level code, and validates its export
//! surface; any failure there is a `LoadError` and no path work starts.
//! Teardown drops the runtime, and with it the per-batch module cache, so
//! nothing leaks into the next batch.

use crate::error::{LoadError, RenderError};
use crate::fetch::{op_ssg_fetch, FetchAllowlist};
use crate::loader::BundleLoader;
use crate::shims;
use anyhow::{anyhow, Error};
use deno_core::{op2, JsRuntime, OpState, PollEventLoopOptions, RuntimeOptions};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

/// Identifies one logical document to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub target_path: String,
}

impl RenderRequest {
    pub fn new(target_path: impl Into<String>) -> Self {
        Self {
            target_path: target_path.into(),
        }
    }
}

/// The bundle's output for one request: an HTML fragment, head directives,
/// and whatever data the render collected along the way.
#[derive(Debug, Clone)]
pub struct PageResult {
    pub html: String,
    pub head: String,
    pub collected: Value,
}

#[derive(Debug, Deserialize)]
struct PageEnvelope {
    html: String,
    head: String,
    data: Value,
}

/// Console output captured from the sandbox, drained after each render.
#[derive(Debug, Default, Clone)]
pub struct ConsoleOutput {
    pub logs: Vec<String>,
    pub warns: Vec<String>,
    pub errors: Vec<String>,
}

#[op2(fast)]
fn op_console_log(state: &mut OpState, #[string] msg: &str) {
    if let Some(output) = state.try_borrow_mut::<ConsoleOutput>() {
        output.logs.push(msg.to_string());
    }
}

#[op2(fast)]
fn op_console_warn(state: &mut OpState, #[string] msg: &str) {
    if let Some(output) = state.try_borrow_mut::<ConsoleOutput>() {
        output.warns.push(msg.to_string());
    }
}

#[op2(fast)]
fn op_console_error(state: &mut OpState, #[string] msg: &str) {
    if let Some(output) = state.try_borrow_mut::<ConsoleOutput>() {
        output.errors.push(msg.to_string());
    }
}

deno_core::extension!(
    ssg_runtime,
    ops = [op_console_log, op_console_warn, op_console_error, op_ssg_fetch],
    esm_entry_point = "ext:ssg_runtime/bootstrap.js",
    esm = ["ext:ssg_runtime/bootstrap.js" = "src/bootstrap.js"],
);

/// Default V8 heap ceiling for a batch sandbox.
pub const DEFAULT_MAX_HEAP_BYTES: usize = 256 * 1024 * 1024;

/// Configuration for one batch's sandbox.
pub struct SandboxConfig {
    /// Entry file of the compiled server bundle.
    pub bundle_path: PathBuf,
    /// Placeholder globals installed before the bundle runs.
    pub shim_globals: BTreeMap<String, Value>,
    /// Origins the bundle may fetch from (empty = fetch disabled).
    pub allowed_fetch_origins: Vec<String>,
    /// V8 heap ceiling in bytes (None = unlimited).
    pub max_heap_size: Option<usize>,
}

impl SandboxConfig {
    pub fn new(bundle_path: impl Into<PathBuf>) -> Self {
        Self {
            bundle_path: bundle_path.into(),
            shim_globals: shims::default_shims(),
            allowed_fetch_origins: Vec::new(),
            max_heap_size: Some(DEFAULT_MAX_HEAP_BYTES),
        }
    }
}

/// A loaded sandbox, ready to render. `!Send`: lives on the thread that
/// created it for its whole life.
pub struct Sandbox {
    runtime: JsRuntime,
}

impl Sandbox {
    /// Builds the runtime, injects shims, evaluates the bundle, and
    /// validates that it exports a single callable default.
    pub async fn load(config: &SandboxConfig) -> Result<Self, LoadError> {
        let bundle = config.bundle_path.display().to_string();
        Self::load_inner(config)
            .await
            .map_err(|e| LoadError::new(&bundle, e))
    }

    async fn load_inner(config: &SandboxConfig) -> Result<Self, Error> {
        let (loader, entry) = BundleLoader::for_bundle(&config.bundle_path)?;

        let create_params = config
            .max_heap_size
            .map(|max_bytes| deno_core::v8::Isolate::create_params().heap_limits(0, max_bytes));

        let mut runtime = JsRuntime::new(RuntimeOptions {
            module_loader: Some(Rc::new(loader)),
            extensions: vec![ssg_runtime::init_ops_and_esm()],
            create_params,
            ..Default::default()
        });

        if config.max_heap_size.is_some() {
            // Keep the limit where it is so V8 raises an OOM error instead
            // of aborting the process.
            runtime.add_near_heap_limit_callback(|current, initial| {
                tracing::error!(
                    current_mb = current / (1024 * 1024),
                    initial_mb = initial / (1024 * 1024),
                    "sandbox is near its heap limit"
                );
                current
            });
        }

        let fetch_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| anyhow!("failed to build fetch client: {e}"))?;
        {
            let op_state = runtime.op_state();
            let mut op_state = op_state.borrow_mut();
            op_state.put(ConsoleOutput::default());
            op_state.put(FetchAllowlist::new(config.allowed_fetch_origins.clone()));
            op_state.put(fetch_client);
        }

        let shim_script = shims::injection_script(&config.shim_globals)?;
        runtime.execute_script("<shims>", shim_script)?;

        // Evaluate the bundle's top-level code and check its export surface.
        let load_call = format!(
            "globalThis.__ssg_load__({})",
            Value::String(entry.to_string())
        );
        let settled = runtime.execute_script("<load>", load_call)?;
        runtime
            .run_event_loop(PollEventLoopOptions::default())
            .await?;
        settle(&mut runtime, settled)?;

        let mut sandbox = Self { runtime };
        sandbox.drain_console("<load>");
        Ok(sandbox)
    }

    /// Renders one target path. Errors are whatever the bundle raised,
    /// wrapped as a `RenderError` but not otherwise normalized.
    pub async fn render(
        &mut self,
        request: &RenderRequest,
        context: &Value,
    ) -> Result<PageResult, Error> {
        let payload = serde_json::json!({
            "path": request.target_path,
            "context": context,
        });
        let render_call = format!("globalThis.__ssg_render__({payload})");

        let result = async {
            let settled = self.runtime.execute_script("<render>", render_call)?;
            self.runtime
                .run_event_loop(PollEventLoopOptions::default())
                .await?;
            let envelope = settle(&mut self.runtime, settled)?
                .ok_or_else(|| anyhow!("render entry produced a non-string envelope"))?;
            let envelope: PageEnvelope = serde_json::from_str(&envelope)
                .map_err(|e| anyhow!("render envelope is not valid JSON: {e}"))?;
            Ok::<_, Error>(PageResult {
                html: envelope.html,
                head: envelope.head,
                collected: envelope.data,
            })
        }
        .await;

        self.drain_console(&request.target_path);

        result.map_err(|e| {
            Error::new(RenderError {
                target_path: request.target_path.clone(),
                message: format!("{e:#}"),
            })
        })
    }

    /// Tears the sandbox down: clears the cached render entry and drops the
    /// runtime together with its per-batch module cache. Called exactly once
    /// per batch, after the last render has settled.
    pub fn shutdown(mut self) {
        let _ = self
            .runtime
            .execute_script("<reset>", "globalThis.__ssg_reset__();");
        tracing::debug!("sandbox torn down");
    }

    /// Moves captured console output out of the sandbox into the engine's
    /// log stream, attributed to the path that produced it.
    fn drain_console(&mut self, scope: &str) {
        let output = {
            let op_state = self.runtime.op_state();
            let mut op_state = op_state.borrow_mut();
            std::mem::take(op_state.borrow_mut::<ConsoleOutput>())
        };
        for line in &output.logs {
            tracing::debug!(target: "ssg_engine::sandbox_console", path = scope, "{line}");
        }
        for line in output.warns.iter().chain(&output.errors) {
            tracing::warn!(target: "ssg_engine::sandbox_console", path = scope, "{line}");
        }
    }
}

/// Resolves the value returned by `execute_script` after the event loop has
/// run: strings come back as `Some`, other fulfilled values as `None`, and a
/// rejection or still-pending promise is an error.
fn settle(
    runtime: &mut JsRuntime,
    value: deno_core::v8::Global<deno_core::v8::Value>,
) -> Result<Option<String>, Error> {
    use deno_core::v8;

    let scope = &mut runtime.handle_scope();
    let local = v8::Local::new(scope, &value);

    if let Ok(promise) = v8::Local::<v8::Promise>::try_from(local) {
        match promise.state() {
            v8::PromiseState::Fulfilled => {
                let result = promise.result(scope);
                if result.is_string() {
                    Ok(Some(result.to_rust_string_lossy(scope)))
                } else {
                    Ok(None)
                }
            }
            v8::PromiseState::Rejected => {
                let exception = promise.result(scope);
                Err(anyhow!("{}", exception.to_rust_string_lossy(scope)))
            }
            v8::PromiseState::Pending => Err(anyhow!("promise never settled")),
        }
    } else if local.is_string() {
        Ok(Some(local.to_rust_string_lossy(scope)))
    } else {
        Ok(None)
    }
}
