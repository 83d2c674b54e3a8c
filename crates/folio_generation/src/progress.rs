//! Channel-backed progress reporting.

use folio_core::ProgressUpdate;
use folio_interface::ProgressSink;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::trace;

/// Forwards every update into an unbounded channel.
///
/// Sending never blocks; updates sent after the receiver is dropped are
/// discarded.
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    sender: UnboundedSender<ProgressUpdate>,
}

impl ChannelProgressSink {
    /// Create a sink and the receiver its updates arrive on.
    pub fn new() -> (Self, UnboundedReceiver<ProgressUpdate>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Wrap an existing sender.
    pub fn from_sender(sender: UnboundedSender<ProgressUpdate>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn report(&self, update: &ProgressUpdate) {
        if self.sender.send(update.clone()).is_err() {
            trace!("Progress receiver dropped");
        }
    }
}
