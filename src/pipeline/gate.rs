//! Single-flight execution of pipeline runs.

use super::processor::NotificationProcessor;
use crate::metrics::{self, RunOutcome};
use crate::models::{AggregatedPayload, NotificationRequest};
use lazy_static::lazy_static;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error};

lazy_static! {
    /// Shared by every gate in the process.
    static ref PROCESS_LOCK: Arc<Mutex<()>> = Arc::new(Mutex::new(()));
}

/// Lets at most one processor run execute at a time, process-wide.
#[derive(Clone)]
pub struct SerializationGate {
    processor: Arc<NotificationProcessor>,
}

impl SerializationGate {
    pub fn new(processor: Arc<NotificationProcessor>) -> Self {
        Self { processor }
    }

    /// Run the processor for `request` once every earlier run has finished.
    ///
    /// The run executes in its own task that owns the lock, so it completes
    /// and releases the lock even if the caller stops waiting. A panicking run
    /// yields `None`.
    pub async fn run(&self, request: NotificationRequest) -> Option<AggregatedPayload> {
        let guard = PROCESS_LOCK.clone().lock_owned().await;
        debug!("Acquired notification processing lock");

        let processor = self.processor.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            processor.process(&request).await
        });

        match task.await {
            Ok(payload) => payload,
            Err(e) => {
                error!("Notification processing failed: {}", e);
                metrics::record_run(RunOutcome::Failed, Duration::ZERO);
                None
            }
        }
    }
}
