//! Pipeline driver
//!
//! Drives one submitted snippet through its stage sequence. Each stage
//! runs in a background task reporting through a pair of capacity-1
//! channels; the driver blocks in a three-way arbiter that races stage
//! completion against the pipeline deadline and the cancel watcher, and
//! translates whichever event wins into the matching status report.
//!
//! Cleanup is guard-based: the workspace is deleted and background tasks
//! are aborted when the driver returns, on every exit path.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use playpen_core::domain::{Sdk, Status};

use crate::cache::Cache;
use crate::config::{Config, SdkEnv};
use crate::executors::{setup_executor_builder, CommandSpec};
use crate::fs::LifeCycle;
use crate::streaming::RunOutputWriter;

use super::reporter::{self, Stage};
use super::watcher::spawn_cancel_watcher;

/// Capture buffer shared between a stage task and the arbiter. Written
/// while the command runs, read only after the stage signals completion.
type OutputBuffer = Arc<Mutex<Vec<u8>>>;

fn new_buffer() -> OutputBuffer {
    Arc::new(Mutex::new(Vec::new()))
}

fn snapshot(buffer: &OutputBuffer) -> Vec<u8> {
    buffer.lock().map(|bytes| bytes.clone()).unwrap_or_default()
}

/// Destination for a stage's stdout.
enum OutputSink {
    /// Collect into a buffer read back on stage completion.
    Capture(OutputBuffer),
    /// Forward each chunk to the cache as it arrives (run stage).
    Stream(RunOutputWriter),
}

/// Aborts a background task when dropped. Aborting a stage task drops its
/// child process handle, which kills the external process.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Deletes the pipeline workspace when dropped.
struct WorkspaceGuard {
    lc: LifeCycle,
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        let pipeline_id = self.lc.pipeline_id();
        info!("{}: deleting workspace", pipeline_id);
        if let Err(e) = self.lc.delete_folders() {
            error!("{}: workspace deletion failed: {:#}", pipeline_id, e);
        }
    }
}

/// Channel ends and context shared by every stage's arbiter call.
struct StepWait<'a> {
    cache: Arc<dyn Cache>,
    pipeline_id: Uuid,
    deadline: Instant,
    cancel_rx: &'a mut mpsc::Receiver<bool>,
    success_rx: &'a mut mpsc::Receiver<bool>,
    error_rx: &'a mut mpsc::Receiver<anyhow::Error>,
}

/// Drives one pipeline through validate → prepare → compile → run.
///
/// Never returns an error to the caller: every terminal condition is
/// written to the cache as a status (plus output slots where the stage
/// defines them), and callers poll the cache for the outcome. The
/// workspace owned by `lc` is removed on every exit path.
pub async fn process(
    cache: Arc<dyn Cache>,
    lc: LifeCycle,
    pipeline_id: Uuid,
    app_env: &Config,
    sdk_env: &SdkEnv,
) {
    let deadline = Instant::now() + app_env.pipeline_execute_timeout;

    let (success_tx, mut success_rx) = mpsc::channel::<bool>(1);
    let (error_tx, mut error_rx) = mpsc::channel::<anyhow::Error>(1);
    let (cancel_tx, mut cancel_rx) = mpsc::channel::<bool>(1);

    let _watcher = AbortOnDrop(spawn_cancel_watcher(
        cache.clone(),
        pipeline_id,
        app_env.cancel_check_interval,
        cancel_tx,
    ));
    let _workspace = WorkspaceGuard { lc: lc.clone() };

    let builder = match setup_executor_builder(&lc, sdk_env) {
        Ok(builder) => builder,
        Err(err) => {
            reporter::process_setup_error(cache.as_ref(), pipeline_id, &err).await;
            return;
        }
    };
    let mut executor = builder.build();

    let mut wait = StepWait {
        cache: cache.clone(),
        pipeline_id,
        deadline,
        cancel_rx: &mut cancel_rx,
        success_rx: &mut success_rx,
        error_rx: &mut error_rx,
    };

    // Validate
    info!("{}: validate ...", pipeline_id);
    {
        let _stage = spawn_stage_fn(executor.validate(), success_tx.clone(), error_tx.clone());
        if process_step(&mut wait, Stage::Validate, Status::Preparing, None, None)
            .await
            .is_err()
        {
            return;
        }
    }

    // Prepare
    info!("{}: prepare ...", pipeline_id);
    {
        let _stage = spawn_stage_fn(executor.prepare(), success_tx.clone(), error_tx.clone());
        if process_step(&mut wait, Stage::Prepare, Status::Compiling, None, None)
            .await
            .is_err()
        {
            return;
        }
    }

    // Compile
    match sdk_env.sdk {
        Sdk::Java | Sdk::Go | Sdk::Scio => {
            info!("{}: compile ...", pipeline_id);
            let Some(spec) = executor.compile_spec() else {
                let err = anyhow!("no compile command for sdk {}", sdk_env.sdk);
                reporter::process_setup_error(cache.as_ref(), pipeline_id, &err).await;
                return;
            };

            let compile_output = new_buffer();
            let compile_error = new_buffer();
            let _stage = spawn_stage_command(
                spec,
                OutputSink::Capture(compile_output.clone()),
                compile_error.clone(),
                success_tx.clone(),
                error_tx.clone(),
            );
            if process_step(
                &mut wait,
                Stage::Compile,
                Status::Executing,
                Some(&compile_output),
                Some(&compile_error),
            )
            .await
            .is_err()
            {
                return;
            }
        }
        Sdk::Python => {
            // No compile stage; synthesize its success so readers observe
            // the same status sequence as compiled SDKs.
            reporter::process_success(
                cache.as_ref(),
                pipeline_id,
                Status::Executing,
                Some(Vec::new()),
            )
            .await;
        }
    }

    // The Java entry-point class is only known after compilation; rebuild
    // the executor with the looked-up name before running.
    if sdk_env.sdk == Sdk::Java {
        let class_name = match lc.executable_name() {
            Ok(name) => name,
            Err(err) => {
                reporter::process_setup_error(cache.as_ref(), pipeline_id, &err).await;
                return;
            }
        };
        executor = builder.with_executable_name(class_name).build();
    }

    // Run
    info!("{}: run ...", pipeline_id);
    let run_error = new_buffer();
    let run_output = RunOutputWriter::new(cache.clone(), pipeline_id);
    let _stage = spawn_stage_command(
        executor.run_spec(),
        OutputSink::Stream(run_output),
        run_error.clone(),
        success_tx.clone(),
        error_tx.clone(),
    );
    let _ = process_step(
        &mut wait,
        Stage::Run,
        Status::Finished,
        None,
        Some(&run_error),
    )
    .await;
}

/// Runs an in-process stage callable in a background task with the same
/// success/error channel contract as external commands.
fn spawn_stage_fn<F>(
    task: F,
    success_tx: mpsc::Sender<bool>,
    error_tx: mpsc::Sender<anyhow::Error>,
) -> AbortOnDrop
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    AbortOnDrop(tokio::spawn(async move {
        match task() {
            Ok(()) => {
                let _ = success_tx.send(true).await;
            }
            Err(err) => {
                let _ = error_tx.send(err).await;
                let _ = success_tx.send(false).await;
            }
        }
    }))
}

/// Launches one external stage command.
///
/// Stdout goes to the given sink and stderr into the capture buffer; both
/// pipes are fully drained before the exit status is reported, so the
/// arbiter never reads a buffer that is still being written.
fn spawn_stage_command(
    spec: &CommandSpec,
    stdout_sink: OutputSink,
    stderr_buffer: OutputBuffer,
    success_tx: mpsc::Sender<bool>,
    error_tx: mpsc::Sender<anyhow::Error>,
) -> AbortOnDrop {
    let mut cmd = spec.command();
    let program = spec.program.clone();

    AbortOnDrop(tokio::spawn(async move {
        let mut child = match cmd.spawn().with_context(|| format!("spawning {}", program)) {
            Ok(child) => child,
            Err(err) => {
                report_failure(err, &success_tx, &error_tx).await;
                return;
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::join!(
            drain(stdout, stdout_sink),
            drain(stderr, OutputSink::Capture(stderr_buffer)),
        );

        match child.wait().await {
            Ok(status) if status.success() => {
                let _ = success_tx.send(true).await;
            }
            Ok(status) => {
                let err = match status.code() {
                    Some(code) => anyhow!("exit status {}", code),
                    None => anyhow!("process terminated by signal"),
                };
                report_failure(err, &success_tx, &error_tx).await;
            }
            Err(err) => {
                report_failure(
                    anyhow!(err).context(format!("waiting for {}", program)),
                    &success_tx,
                    &error_tx,
                )
                .await;
            }
        }
    }))
}

/// Queues the error, then signals failure. The arbiter reads the success
/// channel first and drains the error channel on `false`.
async fn report_failure(
    err: anyhow::Error,
    success_tx: &mpsc::Sender<bool>,
    error_tx: &mpsc::Sender<anyhow::Error>,
) {
    let _ = error_tx.send(err).await;
    let _ = success_tx.send(false).await;
}

async fn drain<R: AsyncRead + Unpin>(reader: Option<R>, sink: OutputSink) {
    let Some(mut reader) = reader else { return };
    let mut buf = [0u8; 4096];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => return,
            Ok(n) => match &sink {
                OutputSink::Capture(buffer) => {
                    if let Ok(mut bytes) = buffer.lock() {
                        bytes.extend_from_slice(&buf[..n]);
                    }
                }
                OutputSink::Stream(writer) => {
                    if let Err(e) = writer.write(&buf[..n]).await {
                        warn!("streaming run output failed: {:#}", e);
                    }
                }
            },
            Err(e) => {
                warn!("reading stage output failed: {}", e);
                return;
            }
        }
    }
}

/// The stage arbiter: blocks until the deadline elapses, a cancel signal
/// arrives, or the stage reports completion, and dispatches exactly one
/// status report. Returns `Ok(())` only on stage success; any other event
/// returns an error so the driver stops advancing.
async fn process_step(
    wait: &mut StepWait<'_>,
    stage: Stage,
    next_status: Status,
    out_buffer: Option<&OutputBuffer>,
    err_buffer: Option<&OutputBuffer>,
) -> Result<()> {
    let pipeline_id = wait.pipeline_id;

    tokio::select! {
        _ = time::sleep_until(wait.deadline) => {
            reporter::finish_by_timeout(wait.cache.as_ref(), pipeline_id).await;
            Err(anyhow!("{}: context was done", pipeline_id))
        }
        _ = wait.cancel_rx.recv() => {
            reporter::process_cancel(wait.cache.as_ref(), pipeline_id).await;
            Err(anyhow!("{}: code processing was canceled", pipeline_id))
        }
        ok = wait.success_rx.recv() => {
            if ok == Some(true) {
                let out_data = out_buffer.map(snapshot);
                reporter::process_success(wait.cache.as_ref(), pipeline_id, next_status, out_data).await;
                Ok(())
            } else {
                // The error is queued before the failure signal, so it is
                // already available; a closed channel means the stage task
                // died without reporting.
                let err = wait
                    .error_rx
                    .try_recv()
                    .unwrap_or_else(|_| anyhow!("stage finished without error detail"));
                let err_data = err_buffer.map(snapshot);
                reporter::process_error(wait.cache.as_ref(), pipeline_id, stage, &err, err_data).await;
                Err(anyhow!("{}: {} stage failed", pipeline_id, stage.name()))
            }
        }
    }
}
