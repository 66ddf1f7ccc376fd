use dronenode_proto::PropertyChange;
use tokio::sync::mpsc;
use tracing::trace;

/// Receives property-change notifications for the transport layer.
///
/// Called inline from the poller and dispatcher, so implementations must not block.
pub trait PropertySink: Send + Sync {
    fn property_changed(&self, change: PropertyChange);
}

/// Forwards changes to a channel. A closed receiver drops them.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<PropertyChange>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PropertyChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PropertySink for ChannelSink {
    fn property_changed(&self, change: PropertyChange) {
        if let Err(e) = self.tx.send(change) {
            trace!(property = %e.0.property, "property change dropped, no listener");
        }
    }
}

/// Swallows everything (one-shot CLI commands).
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl PropertySink for Discard {
    fn property_changed(&self, _change: PropertyChange) {}
}
