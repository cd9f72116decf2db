//! SSG Engine CLI
//!
//! Renders a compiled server bundle to static HTML files:
//!
//!   ssg-engine --bundle dist/server/main.js \
//!              --out-dir build \
//!              --template shell.html \
//!              --path /,/about,/docs/intro
//!
//! Target paths come from repeated `--path` flags (comma-separable) and/or a
//! `--routes` file with one path per line (`#` comments allowed). Exit code
//! is 1 when any path fails; every failing path is reported with its cause.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::{Map, Value};
use ssg_engine::{generate_site, EngineError, GenerateParams, MinifierVariant};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MinifierArg {
    /// Strip comments only.
    Conservative,
    /// Strip comments and collapse whitespace.
    Standard,
}

impl From<MinifierArg> for MinifierVariant {
    fn from(arg: MinifierArg) -> Self {
        match arg {
            MinifierArg::Conservative => MinifierVariant::Conservative,
            MinifierArg::Standard => MinifierVariant::Standard,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "ssg-engine", version, about = "Render a compiled SSR bundle to static HTML")]
struct Cli {
    /// Entry file of the compiled server bundle
    #[arg(long)]
    bundle: PathBuf,

    /// Destination root for written HTML files
    #[arg(long)]
    out_dir: PathBuf,

    /// Page-shell template file
    #[arg(long)]
    template: PathBuf,

    /// Target path(s) to generate (repeatable, comma-separable)
    #[arg(long = "path", value_delimiter = ',')]
    paths: Vec<String>,

    /// File with one target path per line
    #[arg(long)]
    routes: Option<PathBuf>,

    /// Maximum units of work in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Minifier variant
    #[arg(long, value_enum, default_value = "standard")]
    minifier: MinifierArg,

    /// Suppress the consolidated minifier warning summary
    #[arg(long, env = "SSG_SUPPRESS_WARNINGS")]
    suppress_warnings: bool,

    /// JSON render context handed to every render call
    #[arg(long)]
    context: Option<String>,

    /// JSON object with values for {{param:NAME}} template placeholders
    #[arg(long)]
    template_params: Option<String>,

    /// Origin the sandboxed fetch may reach (repeatable)
    #[arg(long = "allow-origin")]
    allow_origins: Vec<String>,
}

impl Cli {
    fn target_paths(&self) -> Result<Vec<String>> {
        let mut paths = self.paths.clone();
        if let Some(routes) = &self.routes {
            let listing = std::fs::read_to_string(routes)
                .with_context(|| format!("failed to read routes file '{}'", routes.display()))?;
            paths.extend(
                listing
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(str::to_string),
            );
        }
        if paths.is_empty() {
            return Err(anyhow!("no target paths given (use --path or --routes)"));
        }
        Ok(paths)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let target_paths = cli.target_paths()?;

    let template_source = std::fs::read_to_string(&cli.template)
        .with_context(|| format!("failed to read template '{}'", cli.template.display()))?;

    let render_context: Value = match &cli.context {
        Some(raw) => serde_json::from_str(raw).context("--context is not valid JSON")?,
        None => Value::Null,
    };
    let template_params: Map<String, Value> = match &cli.template_params {
        Some(raw) => serde_json::from_str(raw).context("--template-params is not a JSON object")?,
        None => Map::new(),
    };

    let mut params = GenerateParams::new(&cli.bundle, &cli.out_dir, template_source);
    params.target_paths = target_paths;
    params.minifier = cli.minifier.into();
    params.concurrency = cli.concurrency;
    params.suppress_warning_summary = cli.suppress_warnings;
    params.render_context = render_context;
    params.template_params = template_params;
    params.allowed_fetch_origins = cli.allow_origins.clone();

    match generate_site(params).await {
        Ok(result) => {
            tracing::info!(
                pages = result.collected_by_path.len(),
                out_dir = %cli.out_dir.display(),
                "static site generated"
            );
            Ok(())
        }
        Err(EngineError::Batch(failure)) => {
            tracing::error!("{}", failure.detail());
            std::process::exit(1);
        }
        Err(other) => Err(other.into()),
    }
}
