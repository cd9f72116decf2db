//! # SSG Engine
//!
//! Turns a compiled server-side rendering bundle plus a list of target paths
//! into fully-composed, minified HTML files on disk, using deno_core to run
//! the bundle in an isolated sandbox.
//!
//! ## Guarantees
//!
//! - **Isolation**: bundle imports resolve only inside the bundle's own
//!   directory; no network imports, no engine-module leakage, and the
//!   per-batch module cache dies with the batch.
//! - **Partial-failure isolation**: one path's failure never prevents any
//!   other path from being attempted; every request settles into exactly one
//!   outcome.
//! - **One verdict**: the caller gets either a path -> collected-data map or
//!   a single aggregate error carrying every individual cause.
//! - **Teardown**: the sandbox is torn down exactly once per batch, after
//!   the last render has settled, whatever the batch outcome.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ssg_engine::{generate_site, GenerateParams};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut params = GenerateParams::new(
//!         "./dist/server/main.js",
//!         "./build",
//!         "<html><head>{{head}}</head><body>{{content}}</body></html>",
//!     );
//!     params.target_paths = vec!["/".into(), "/about".into()];
//!
//!     match generate_site(params).await {
//!         Ok(result) => println!("{} page(s) written", result.collected_by_path.len()),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! ```
//!
//! The bundle's contract: a single default export, called once per path with
//! `{ path, context }`, returning an HTML string or `{ html, head?, data? }`
//! (optionally via a promise).

mod aggregate;
mod compose;
mod engine;
mod error;
mod executor;
mod fetch;
mod hints;
mod loader;
mod minify;
mod renderer;
mod report;
mod sandbox;
mod sanitize;
mod shims;
mod template;
mod writer;

pub use aggregate::{aggregate, BatchResult};
pub use compose::{compose_page, PageData};
pub use engine::{generate_site, GenerateParams};
pub use error::{
    BatchFailure, ComposeError, ComposeStage, EngineError, LoadError, RenderError,
};
pub use executor::{default_concurrency, run_all, PathOutcome};
pub use fetch::FetchAllowlist;
pub use hints::{classify, CLIENT_ONLY_HINT};
pub use minify::{HtmlMinifier, MinifierVariant, MinifyResult};
pub use renderer::RendererHandle;
pub use report::{filter_benign, report_warnings, warning_summary, KNOWN_BENIGN_WARNINGS};
pub use sandbox::{ConsoleOutput, PageResult, RenderRequest, Sandbox, SandboxConfig};
pub use sanitize::{check_render_context, ContextError};
pub use shims::{default_shims, injection_script};
pub use template::{compile as compile_template, CompiledTemplate, TemplateError};
pub use writer::PageWriter;
