//! Stateless pub-sub for engine events.
//!
//! The APIs publish an event after every committed change (a new order, a status change, a payment result, a new
//! notification). Anything that wants to react, like the real-time tracking hub, registers an async handler in
//! [`EventHooks`]. Handlers only ever see the event itself, never the engine's internal state.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
