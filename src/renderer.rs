//! Renderer handle - the uniform `{render, shutdown}` contract over the
//! sandbox.
//!
//! A `JsRuntime` is `!Send`, so the sandbox lives on a dedicated thread with
//! its own single-threaded tokio runtime. The handle is the only way in:
//! render calls are messages answered over oneshot channels, and `shutdown`
//! consumes the handle, tears the sandbox down exactly once, and joins the
//! thread. Render calls serialize inside V8; everything around them is free
//! to overlap.

use crate::error::LoadError;
use crate::sandbox::{PageResult, RenderRequest, Sandbox, SandboxConfig};
use anyhow::{anyhow, Error};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

enum Job {
    Render {
        request: RenderRequest,
        reply: oneshot::Sender<Result<PageResult, Error>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the sandbox actor for one batch.
pub struct RendererHandle {
    jobs: mpsc::Sender<Job>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl RendererHandle {
    /// Spawns the sandbox thread, loads the bundle, and waits for the export
    /// surface to validate. A failure here means no path can be attempted.
    pub async fn connect(config: SandboxConfig, context: Value) -> Result<Self, LoadError> {
        let bundle = config.bundle_path.display().to_string();
        let (jobs_tx, jobs_rx) = mpsc::channel(32);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), LoadError>>();

        let thread = std::thread::Builder::new()
            .name("ssg-sandbox".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let bundle = config.bundle_path.display().to_string();
                        let _ = ready_tx.send(Err(LoadError::new(
                            &bundle,
                            anyhow!("failed to start sandbox runtime: {e}"),
                        )));
                        return;
                    }
                };
                runtime.block_on(run_sandbox(config, context, jobs_rx, ready_tx));
            })
            .map_err(|e| LoadError::new(&bundle, anyhow!("failed to spawn sandbox thread: {e}")))?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self {
                jobs: jobs_tx,
                thread: Some(thread),
            }),
            Ok(Err(load_error)) => {
                let _ = thread.join();
                Err(load_error)
            }
            Err(_) => {
                let _ = thread.join();
                Err(LoadError::new(
                    &bundle,
                    anyhow!("sandbox thread exited before the bundle loaded"),
                ))
            }
        }
    }

    /// Renders one target path. Fails with whatever the bundle raised, or
    /// with a teardown error if the sandbox is already shut down.
    pub async fn render(&self, request: RenderRequest) -> Result<PageResult, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.jobs
            .send(Job::Render {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow!("sandbox is shut down; no further renders are possible"))?;
        reply_rx
            .await
            .map_err(|_| anyhow!("sandbox exited before the render settled"))?
    }

    /// Tears the sandbox down. Consuming `self` makes a second call
    /// unrepresentable; every in-flight render has settled by the time the
    /// actor processes this message.
    pub async fn shutdown(mut self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .jobs
            .send(Job::Shutdown { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

async fn run_sandbox(
    config: SandboxConfig,
    context: Value,
    mut jobs: mpsc::Receiver<Job>,
    ready: oneshot::Sender<Result<(), LoadError>>,
) {
    let mut sandbox = match Sandbox::load(&config).await {
        Ok(sandbox) => sandbox,
        Err(load_error) => {
            let _ = ready.send(Err(load_error));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        // Caller vanished between spawn and ready; unwind immediately.
        sandbox.shutdown();
        return;
    }

    while let Some(job) = jobs.recv().await {
        match job {
            Job::Render { request, reply } => {
                let result = sandbox.render(&request, &context).await;
                let _ = reply.send(result);
            }
            Job::Shutdown { reply } => {
                sandbox.shutdown();
                let _ = reply.send(());
                return;
            }
        }
    }

    // All senders dropped without an explicit shutdown (the Drop backstop).
    sandbox.shutdown();
}
