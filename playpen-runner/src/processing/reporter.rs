//! Status reporting
//!
//! Every cache write the orchestrator makes goes through this module, so
//! the mapping from terminal condition to `{status, output, error}` slots
//! lives in one place. Reporting is best-effort: by the time a report is
//! made the driver has already committed to terminating the stage, so a
//! failed cache write is logged and swallowed rather than propagated.

use tracing::{error, info};
use uuid::Uuid;

use playpen_core::domain::Status;

use crate::cache::{Cache, SubKey, Value};

/// One unit of pipeline work, used to map failures onto their terminal
/// status and output slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Prepare,
    Compile,
    Run,
}

impl Stage {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Prepare => "prepare",
            Stage::Compile => "compile",
            Stage::Run => "run",
        }
    }

    fn error_status(&self) -> Status {
        match self {
            Stage::Validate => Status::ValidationError,
            Stage::Prepare => Status::PreparationError,
            Stage::Compile => Status::CompileError,
            Stage::Run => Status::RunError,
        }
    }
}

/// Best-effort cache write.
async fn update_cache(cache: &dyn Cache, pipeline_id: Uuid, sub_key: SubKey, value: Value) {
    if let Err(e) = cache.set_value(pipeline_id, sub_key, value).await {
        error!("{}: failed to write {:?} to cache: {}", pipeline_id, sub_key, e);
    }
}

/// Reports a failure that happened before any stage could begin (executor
/// builder construction, post-compile name lookup).
pub(crate) async fn process_setup_error(cache: &dyn Cache, pipeline_id: Uuid, err: &anyhow::Error) {
    error!("{}: error during setup: {:#}", pipeline_id, err);
    update_cache(cache, pipeline_id, SubKey::Status, Value::Status(Status::Error)).await;
}

/// Reports a failed stage.
///
/// Compile and run failures persist the captured output next to the error
/// message; validate and prepare write status only.
pub(crate) async fn process_error(
    cache: &dyn Cache,
    pipeline_id: Uuid,
    stage: Stage,
    err: &anyhow::Error,
    captured: Option<Vec<u8>>,
) {
    error!("{}: {} failed: {:#}", pipeline_id, stage.name(), err);

    match stage {
        Stage::Compile => {
            update_cache(
                cache,
                pipeline_id,
                SubKey::CompileOutput,
                Value::Text(error_payload(err, captured)),
            )
            .await;
        }
        Stage::Run => {
            update_cache(
                cache,
                pipeline_id,
                SubKey::RunError,
                Value::Text(error_payload(err, captured)),
            )
            .await;
        }
        Stage::Validate | Stage::Prepare => {}
    }

    update_cache(
        cache,
        pipeline_id,
        SubKey::Status,
        Value::Status(stage.error_status()),
    )
    .await;
}

/// Reports a successful stage by writing the next intermediate status.
///
/// The transition into `Executing` also persists the compile output and
/// resets the run-output slot so streaming starts from empty.
pub(crate) async fn process_success(
    cache: &dyn Cache,
    pipeline_id: Uuid,
    next_status: Status,
    output: Option<Vec<u8>>,
) {
    match next_status {
        Status::Preparing => {
            info!("{}: validate finished", pipeline_id);
        }
        Status::Compiling => {
            info!("{}: prepare finished", pipeline_id);
        }
        Status::Executing => {
            info!("{}: compile finished", pipeline_id);
            let output = output.unwrap_or_default();
            update_cache(
                cache,
                pipeline_id,
                SubKey::CompileOutput,
                Value::Text(String::from_utf8_lossy(&output).into_owned()),
            )
            .await;
            update_cache(
                cache,
                pipeline_id,
                SubKey::RunOutput,
                Value::Text(String::new()),
            )
            .await;
        }
        Status::Finished => {
            info!("{}: run finished", pipeline_id);
        }
        _ => {}
    }

    update_cache(cache, pipeline_id, SubKey::Status, Value::Status(next_status)).await;
}

/// Reports that the global deadline elapsed.
pub(crate) async fn finish_by_timeout(cache: &dyn Cache, pipeline_id: Uuid) {
    error!("{}: code processing finished by timeout", pipeline_id);
    update_cache(
        cache,
        pipeline_id,
        SubKey::Status,
        Value::Status(Status::RunTimeout),
    )
    .await;
}

/// Reports that the client canceled the pipeline.
pub(crate) async fn process_cancel(cache: &dyn Cache, pipeline_id: Uuid) {
    info!("{}: code processing was canceled", pipeline_id);
    update_cache(
        cache,
        pipeline_id,
        SubKey::Status,
        Value::Status(Status::Canceled),
    )
    .await;
}

fn error_payload(err: &anyhow::Error, captured: Option<Vec<u8>>) -> String {
    let captured = captured.unwrap_or_default();
    format!(
        "error: {}, output: {}",
        err,
        String::from_utf8_lossy(&captured)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalCache;
    use anyhow::anyhow;

    #[tokio::test]
    async fn test_compile_error_writes_payload_and_status() {
        let cache = LocalCache::new();
        let id = Uuid::new_v4();

        process_error(
            &cache,
            id,
            Stage::Compile,
            &anyhow!("exit status 1"),
            Some(b"syntax error at 3:1".to_vec()),
        )
        .await;

        let output = cache.get_value(id, SubKey::CompileOutput).await.unwrap();
        assert_eq!(
            output.as_text(),
            Some("error: exit status 1, output: syntax error at 3:1")
        );
        let status = cache.get_value(id, SubKey::Status).await.unwrap();
        assert_eq!(status.as_status(), Some(Status::CompileError));
    }

    #[tokio::test]
    async fn test_validation_error_writes_status_only() {
        let cache = LocalCache::new();
        let id = Uuid::new_v4();

        process_error(&cache, id, Stage::Validate, &anyhow!("bad source"), None).await;

        let status = cache.get_value(id, SubKey::Status).await.unwrap();
        assert_eq!(status.as_status(), Some(Status::ValidationError));
        assert!(cache.get_value(id, SubKey::CompileOutput).await.is_err());
        assert!(cache.get_value(id, SubKey::RunError).await.is_err());
    }

    #[tokio::test]
    async fn test_executing_transition_resets_run_output() {
        let cache = LocalCache::new();
        let id = Uuid::new_v4();

        cache
            .set_value(id, SubKey::RunOutput, Value::Text("stale".to_string()))
            .await
            .unwrap();

        process_success(&cache, id, Status::Executing, Some(b"compiled ok".to_vec())).await;

        let compile = cache.get_value(id, SubKey::CompileOutput).await.unwrap();
        assert_eq!(compile.as_text(), Some("compiled ok"));
        let run = cache.get_value(id, SubKey::RunOutput).await.unwrap();
        assert_eq!(run.as_text(), Some(""));
        let status = cache.get_value(id, SubKey::Status).await.unwrap();
        assert_eq!(status.as_status(), Some(Status::Executing));
    }

    #[tokio::test]
    async fn test_intermediate_success_writes_status_only() {
        let cache = LocalCache::new();
        let id = Uuid::new_v4();

        process_success(&cache, id, Status::Preparing, None).await;

        let status = cache.get_value(id, SubKey::Status).await.unwrap();
        assert_eq!(status.as_status(), Some(Status::Preparing));
        assert!(cache.get_value(id, SubKey::CompileOutput).await.is_err());
    }

    #[tokio::test]
    async fn test_terminal_reports() {
        let cache = LocalCache::new();

        let id = Uuid::new_v4();
        finish_by_timeout(&cache, id).await;
        let status = cache.get_value(id, SubKey::Status).await.unwrap();
        assert_eq!(status.as_status(), Some(Status::RunTimeout));

        let id = Uuid::new_v4();
        process_cancel(&cache, id).await;
        let status = cache.get_value(id, SubKey::Status).await.unwrap();
        assert_eq!(status.as_status(), Some(Status::Canceled));

        let id = Uuid::new_v4();
        process_setup_error(&cache, id, &anyhow!("builder failed")).await;
        let status = cache.get_value(id, SubKey::Status).await.unwrap();
        assert_eq!(status.as_status(), Some(Status::Error));
    }
}
