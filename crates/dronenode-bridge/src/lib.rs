pub mod actions;
pub mod cache;
pub mod dispatch;
pub mod error;
pub mod poller;
pub mod sink;

pub use actions::{Action, ActionName};
pub use cache::StateCache;
pub use dispatch::{ActionDispatcher, DispatchConfig};
pub use error::BridgeError;
pub use poller::{PollReport, TelemetryPoller};
pub use sink::{ChannelSink, Discard, PropertySink};
