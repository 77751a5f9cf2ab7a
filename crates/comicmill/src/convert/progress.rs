use std::sync::Arc;

use tokio::sync::broadcast;

use crate::convert::{ConversionResult, FileOutcome};

/// Discrete events the orchestrator emits for the reporting layer.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Short status line ("Converting file 2 of 5...").
    Info(String),
    /// Append-only log line.
    Log(String),
    FileStarted {
        index: usize,
        total: usize,
    },
    FileFinished {
        outcome: FileOutcome,
    },
    JobFinished {
        result: ConversionResult,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bridges progress events onto a broadcast channel for UI streaming.
/// Lagging or absent subscribers never block or fail the job.
pub struct BroadcastReporter {
    sender: Arc<broadcast::Sender<ProgressEvent>>,
}

impl BroadcastReporter {
    pub fn new(sender: Arc<broadcast::Sender<ProgressEvent>>) -> Self {
        Self { sender }
    }

    pub fn channel(capacity: usize) -> (Self, broadcast::Receiver<ProgressEvent>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self::new(Arc::new(sender)), receiver)
    }
}

impl ProgressReporter for BroadcastReporter {
    fn report(&self, event: ProgressEvent) {
        // send only errors when there are no receivers; that's fine.
        let _ = self.sender.send(event);
    }
}
