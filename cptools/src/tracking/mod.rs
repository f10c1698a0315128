//! Client side of the real-time order tracking channel.
mod backoff;
mod channel;
mod registry;

pub use backoff::BackoffPolicy;
pub use channel::{ChannelConfig, ChannelError, ChannelState, TrackingChannel};
pub use registry::{handler, EventHandler, EventRegistry};
