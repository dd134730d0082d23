//! Progress notifications
//!
//! Runners report completions through a [`ProgressSink`]. Sending never
//! blocks, and a dropped receiver silently disables reporting.

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// One completed request for an endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    pub endpoint: String,
    pub completed: usize,
    pub total: usize,
}

impl ProgressEvent {
    pub fn is_final(&self) -> bool {
        self.completed >= self.total
    }
}

/// Sending half of a progress channel
#[derive(Clone, Debug, Default)]
pub struct ProgressSink {
    sender: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    /// Sink that drops every event
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn notify(&self, endpoint: &str, completed: usize, total: usize) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(ProgressEvent {
                endpoint: endpoint.to_string(),
                completed,
                total,
            });
        }
    }
}

/// Create a connected sink and receiver
pub fn progress_channel() -> (ProgressSink, UnboundedReceiver<ProgressEvent>) {
    let (sender, receiver) = unbounded_channel();
    (
        ProgressSink {
            sender: Some(sender),
        },
        receiver,
    )
}
