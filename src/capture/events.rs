use crossbeam_channel::{Receiver, Sender};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Notifications raised by a capture pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// An encoded frame was appended to the frame queue.
    FrameReady,
    /// Capture stopped; frames already queued remain available.
    Stopped,
    /// An on-disk encode finished.
    Recorded(PathBuf),
    /// A frame failed to encode and was dropped.
    EncodeFailed(String),
}

/// Fan-out of [`CaptureEvent`]s to any number of channel subscribers.
///
/// Subscribers whose receiver was dropped are pruned on the next emit.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<CaptureEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<CaptureEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    pub fn emit(&self, event: CaptureEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}
