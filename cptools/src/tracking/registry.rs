use std::{
    collections::HashMap,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard},
};

use cp_order_engine::tracking_protocol::ServerMessage;
use log::*;

/// A callback for tracking events. Handlers are compared by identity, so keep a clone of the `Arc` around if you
/// want to unregister it later.
pub type EventHandler = Arc<dyn Fn(&ServerMessage) + Send + Sync>;

pub fn handler<F>(f: F) -> EventHandler
where F: Fn(&ServerMessage) + Send + Sync + 'static {
    Arc::new(f)
}

/// Local fan-out of tracking events, keyed by event name (`order:update`, `notification:new`, ...).
///
/// Cloning the registry gives another handle to the same set of handlers.
#[derive(Clone, Default)]
pub struct EventRegistry {
    handlers: Arc<Mutex<HashMap<String, Vec<EventHandler>>>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<EventHandler>>> {
        self.handlers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds `handler` for `event`. Returns `false` if that exact handler was already registered for it.
    pub fn register(&self, event: &str, handler: EventHandler) -> bool {
        let mut handlers = self.lock();
        let set = handlers.entry(event.to_string()).or_default();
        if set.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            trace!("📡️ Handler already registered for {event}");
            return false;
        }
        set.push(handler);
        true
    }

    /// Removes `handler` from `event`. Unknown handlers and events are ignored, and `false` is returned.
    pub fn unregister(&self, event: &str, handler: &EventHandler) -> bool {
        let mut handlers = self.lock();
        let Some(set) = handlers.get_mut(event) else {
            return false;
        };
        let before = set.len();
        set.retain(|h| !Arc::ptr_eq(h, handler));
        let removed = set.len() < before;
        if set.is_empty() {
            handlers.remove(event);
        }
        removed
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.lock().get(event).map(Vec::len).unwrap_or_default()
    }

    /// Calls every handler registered for the message's event and returns how many completed without panicking.
    ///
    /// Handlers run on a snapshot of the set, so they may register or unregister handlers themselves. A panicking
    /// handler is logged and does not stop the others.
    pub fn emit(&self, message: &ServerMessage) -> usize {
        let event = message.event_name();
        let snapshot = match self.lock().get(event) {
            Some(set) => set.clone(),
            None => return 0,
        };
        let mut delivered = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(message))) {
                Ok(()) => delivered += 1,
                Err(_) => error!("📡️ A handler for {event} panicked. The remaining handlers still ran."),
            }
        }
        delivered
    }
}
