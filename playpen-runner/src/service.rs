//! Processing service
//!
//! The surface a serving layer (RPC handlers, out of scope here) calls:
//! accept a snippet, hand back the pipeline id to poll with, and expose
//! cancellation and result reads. The heavy lifting happens in
//! [`crate::processing`]; this module only prepares the workspace, seeds
//! the initial status, and detaches the driver.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use uuid::Uuid;

use playpen_core::domain::Status;

use crate::cache::{Cache, SubKey, Value};
use crate::config::{Config, SdkEnv};
use crate::errors::Error;
use crate::fs::LifeCycle;
use crate::processing;

/// Entry point for code submissions.
pub struct ProcessingService {
    cache: Arc<dyn Cache>,
    config: Config,
}

impl ProcessingService {
    pub fn new(cache: Arc<dyn Cache>, config: Config) -> Self {
        Self { cache, config }
    }

    /// Accepts a snippet and starts processing it in the background.
    ///
    /// The workspace is created and the source written before the initial
    /// `Validating` status is published, so a client that sees the id can
    /// immediately start polling. Returns the pipeline id.
    pub async fn submit(&self, code: &str, sdk_env: SdkEnv) -> Result<Uuid> {
        let pipeline_id = Uuid::new_v4();

        let lc = LifeCycle::new(sdk_env.sdk, pipeline_id, &self.config.working_dir);
        lc.create_folders()
            .with_context(|| format!("{}: preparing workspace", pipeline_id))?;
        lc.create_source_file(code)
            .with_context(|| format!("{}: writing snippet", pipeline_id))?;

        self.cache
            .set_value(
                pipeline_id,
                SubKey::Status,
                Value::Status(Status::Validating),
            )
            .await
            .with_context(|| format!("{}: publishing initial status", pipeline_id))?;

        info!("{}: submitted ({} snippet)", pipeline_id, sdk_env.sdk);

        let cache = self.cache.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            processing::process(cache, lc, pipeline_id, &config, &sdk_env).await;
        });

        Ok(pipeline_id)
    }

    /// Requests cancellation of a running pipeline. The driver observes
    /// the flag within one cancel-check interval.
    pub async fn cancel(&self, pipeline_id: Uuid) -> Result<()> {
        self.cache
            .set_value(pipeline_id, SubKey::Canceled, Value::Flag(true))
            .await
            .with_context(|| format!("{}: setting cancel flag", pipeline_id))?;
        Ok(())
    }

    pub async fn status(&self, pipeline_id: Uuid) -> Result<Status, Error> {
        processing::get_processing_status(self.cache.as_ref(), pipeline_id, "Get status").await
    }

    pub async fn run_output(&self, pipeline_id: Uuid) -> Result<String, Error> {
        processing::get_processing_output(
            self.cache.as_ref(),
            pipeline_id,
            SubKey::RunOutput,
            "Get run output",
        )
        .await
    }

    pub async fn run_error(&self, pipeline_id: Uuid) -> Result<String, Error> {
        processing::get_processing_output(
            self.cache.as_ref(),
            pipeline_id,
            SubKey::RunError,
            "Get run error",
        )
        .await
    }

    pub async fn compile_output(&self, pipeline_id: Uuid) -> Result<String, Error> {
        processing::get_processing_output(
            self.cache.as_ref(),
            pipeline_id,
            SubKey::CompileOutput,
            "Get compile output",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalCache;
    use crate::config::ExecutorConfig;
    use playpen_core::domain::Sdk;
    use std::time::Duration;
    use tokio::time;

    fn service(working_dir: &std::path::Path) -> ProcessingService {
        let mut config = Config::new(working_dir.to_path_buf());
        config.pipeline_execute_timeout = Duration::from_secs(10);
        config.cancel_check_interval = Duration::from_millis(50);
        ProcessingService::new(Arc::new(LocalCache::new()), config)
    }

    fn sh_env(run_script: &str) -> SdkEnv {
        SdkEnv::with_config(
            Sdk::Python,
            ExecutorConfig {
                compile_cmd: String::new(),
                compile_args: vec![],
                run_cmd: "sh".to_string(),
                run_args: vec!["-c".to_string(), run_script.to_string()],
            },
        )
    }

    async fn wait_for_terminal(service: &ProcessingService, pipeline_id: Uuid) -> Status {
        for _ in 0..200 {
            if let Ok(status) = service.status(pipeline_id).await {
                if status.is_terminal() {
                    return status;
                }
            }
            time::sleep(Duration::from_millis(25)).await;
        }
        panic!("pipeline {} did not reach a terminal status", pipeline_id);
    }

    #[tokio::test]
    async fn test_submit_to_finished() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let id = service.submit("print('hi')", sh_env("printf hi")).await.unwrap();

        assert_eq!(wait_for_terminal(&service, id).await, Status::Finished);
        assert_eq!(service.run_output(id).await.unwrap(), "hi");
        assert_eq!(service.compile_output(id).await.unwrap(), "");
        assert!(!dir.path().join(id.to_string()).exists());
    }

    #[tokio::test]
    async fn test_cancel_a_running_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let id = service.submit("print('hi')", sh_env("sleep 5")).await.unwrap();
        service.cancel(id).await.unwrap();

        assert_eq!(wait_for_terminal(&service, id).await, Status::Canceled);
    }

    #[tokio::test]
    async fn test_run_error_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let id = service
            .submit("print('hi')", sh_env("printf oops >&2; exit 3"))
            .await
            .unwrap();

        assert_eq!(wait_for_terminal(&service, id).await, Status::RunError);
        assert_eq!(
            service.run_error(id).await.unwrap(),
            "error: exit status 3, output: oops"
        );
    }

    #[tokio::test]
    async fn test_status_of_unknown_pipeline_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let err = service.status(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
