//! Cancel watcher
//!
//! One background poller per pipeline. Clients request cancellation by
//! setting the `Canceled` flag in the cache; the watcher observes it on a
//! fixed tick and forwards a single signal to whichever stage arbiter is
//! currently selecting. The watcher never writes status itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::info;
use uuid::Uuid;

use crate::cache::{Cache, SubKey};

/// Spawns the cancel watcher for one pipeline.
///
/// On every tick the `Canceled` flag is read from the cache. A missing
/// slot or a read error means no cancel was requested yet, so the poll
/// continues. The first successful read ends the watch: a `true` value
/// pushes one signal into the capacity-1 cancel channel before exiting,
/// anything else exits without signalling. When the pipeline terminates
/// for any other reason the driver aborts the task.
pub(crate) fn spawn_cancel_watcher(
    cache: Arc<dyn Cache>,
    pipeline_id: Uuid,
    interval: Duration,
    cancel_tx: mpsc::Sender<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        // An interval's first tick completes immediately; consume it so
        // the first cache read happens one full interval after launch.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let value = match cache.get_value(pipeline_id, SubKey::Canceled).await {
                Ok(value) => value,
                Err(_) => continue,
            };

            if value.as_flag() == Some(true) {
                info!("{}: cancel flag observed", pipeline_id);
                let _ = cancel_tx.send(true).await;
            }
            return;
        }
    })
}
