//! Progress reporting. Sinks are the only coupling between the engine and
//! whatever displays it.

use packwright_core::ProgressEvent;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Writes progress into the log; used by the CLI
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn emit(&self, event: ProgressEvent) {
        log::info!(
            "[{}] {} {}/{} ({:.0}%)",
            event.operation_id,
            event.stage,
            event.current,
            event.total,
            event.percentage()
        );
    }
}

/// Forwards progress into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn emit(&self, event: ProgressEvent) {
        // Receiver gone means nobody is watching
        let _ = self.tx.send(event);
    }
}

/// Discards all progress
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Shared `(completed, total)` counter for one stage of one operation
#[derive(Clone)]
pub struct StageCounter {
    sink: Arc<dyn ProgressSink>,
    operation_id: String,
    stage: String,
    finished: Arc<AtomicU32>,
    total: u32,
}

impl StageCounter {
    pub fn new(
        sink: Arc<dyn ProgressSink>,
        operation_id: &str,
        stage: &str,
        total: usize,
    ) -> Self {
        Self {
            sink,
            operation_id: operation_id.to_string(),
            stage: stage.to_string(),
            finished: Arc::new(AtomicU32::new(0)),
            total: total as u32,
        }
    }

    /// Emit the initial `0/total` event
    pub fn start(&self) {
        self.emit(self.finished.load(Ordering::SeqCst));
    }

    /// Count one settled unit and emit the new state
    pub fn advance(&self) -> u32 {
        let done = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
        self.emit(done);
        done
    }

    pub fn finished(&self) -> u32 {
        self.finished.load(Ordering::SeqCst)
    }

    fn emit(&self, current: u32) {
        self.sink.emit(ProgressEvent {
            operation_id: self.operation_id.clone(),
            stage: self.stage.clone(),
            current,
            total: self.total,
        });
    }
}
