//! Streaming run output
//!
//! During the run stage, stdout is not buffered until completion: each
//! chunk read from the child process is appended to the pipeline's
//! `RunOutput` cache slot as it arrives, and an index slot is bumped so
//! incremental readers can tell how far the output has advanced.

use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use crate::cache::{Cache, SubKey, Value};

/// Write sink that appends run output to the cache chunk by chunk.
#[derive(Clone)]
pub struct RunOutputWriter {
    cache: Arc<dyn Cache>,
    pipeline_id: Uuid,
}

impl RunOutputWriter {
    pub fn new(cache: Arc<dyn Cache>, pipeline_id: Uuid) -> Self {
        Self { cache, pipeline_id }
    }

    /// Appends one chunk of run output and bumps the last-written index.
    pub async fn write(&self, chunk: &[u8]) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        let existing = match self
            .cache
            .get_value(self.pipeline_id, SubKey::RunOutput)
            .await
        {
            Ok(value) => value.as_text().unwrap_or_default().to_string(),
            Err(_) => String::new(),
        };

        let index = match self
            .cache
            .get_value(self.pipeline_id, SubKey::RunOutputIndex)
            .await
        {
            Ok(value) => value.as_index().unwrap_or(0),
            Err(_) => 0,
        };

        let mut output = existing;
        output.push_str(&String::from_utf8_lossy(chunk));

        self.cache
            .set_value(self.pipeline_id, SubKey::RunOutput, Value::Text(output))
            .await?;
        self.cache
            .set_value(
                self.pipeline_id,
                SubKey::RunOutputIndex,
                Value::Index(index + 1),
            )
            .await?;

        Ok(())
    }
}
