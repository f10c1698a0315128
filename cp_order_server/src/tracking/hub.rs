use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
        MutexGuard,
    },
};

use cp_order_engine::{db_types::OrderId, events::EventHooks, tracking_protocol::ServerMessage};
use log::*;
use tokio::sync::mpsc;

pub type ConnectionId = u64;

struct Connection {
    user_id: Option<String>,
    subscriptions: HashSet<OrderId>,
    sender: mpsc::Sender<String>,
}

/// Keeps track of every open tracking connection and what it is subscribed to.
///
/// Delivery is best-effort: a frame for a connection whose outbound buffer is full is dropped.
#[derive(Clone, Default)]
pub struct TrackingHub {
    connections: Arc<Mutex<HashMap<ConnectionId, Connection>>>,
    next_id: Arc<AtomicU64>,
}

impl TrackingHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Connection>> {
        // A panic while holding the lock leaves the map itself intact
        self.connections.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, user_id: Option<String>, sender: mpsc::Sender<String>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let user = user_id.as_deref().unwrap_or("anonymous").to_string();
        self.lock().insert(id, Connection { user_id, subscriptions: HashSet::new(), sender });
        debug!("📡️ Connection #{id} registered for {user}");
        id
    }

    pub fn remove(&self, id: ConnectionId) {
        if let Some(conn) = self.lock().remove(&id) {
            debug!("📡️ Connection #{id} closed. It had {} subscriptions", conn.subscriptions.len());
        }
    }

    /// Returns false if the connection was already subscribed to the order, or is gone.
    pub fn subscribe(&self, id: ConnectionId, order_id: OrderId) -> bool {
        match self.lock().get_mut(&id) {
            Some(conn) => {
                trace!("📡️ Connection #{id} subscribed to {order_id}");
                conn.subscriptions.insert(order_id)
            },
            None => false,
        }
    }

    pub fn unsubscribe(&self, id: ConnectionId, order_id: &OrderId) -> bool {
        self.lock().get_mut(&id).map(|conn| conn.subscriptions.remove(order_id)).unwrap_or(false)
    }

    pub fn subscriptions(&self, id: ConnectionId) -> Vec<OrderId> {
        self.lock().get(&id).map(|conn| conn.subscriptions.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn connection_count(&self) -> usize {
        self.lock().len()
    }

    /// Forwards an order-scoped frame to every connection subscribed to that order. Returns the number of
    /// connections the frame was queued for.
    pub fn publish_order_event(&self, message: &ServerMessage) -> usize {
        let Some(order_id) = message.order_id() else {
            warn!("📡️ Tried to publish a {} frame that is not about an order", message.event_name());
            return 0;
        };
        let frame = message.to_json();
        let sent = self.send_where(&frame, |conn| conn.subscriptions.contains(order_id));
        trace!("📡️ {} for {order_id} sent to {sent} connections", message.event_name());
        sent
    }

    /// Forwards a frame to every connection authenticated as `user_id`.
    pub fn publish_to_user(&self, user_id: &str, message: &ServerMessage) -> usize {
        let frame = message.to_json();
        let sent = self.send_where(&frame, |conn| conn.user_id.as_deref() == Some(user_id));
        trace!("📡️ {} for {user_id} sent to {sent} connections", message.event_name());
        sent
    }

    fn send_where<F>(&self, frame: &str, predicate: F) -> usize
    where F: Fn(&Connection) -> bool {
        let connections = self.lock();
        connections
            .iter()
            .filter(|(_, conn)| predicate(conn))
            .filter(|(id, conn)| match conn.sender.try_send(frame.to_string()) {
                Ok(()) => true,
                Err(e) => {
                    debug!("📡️ Dropped a frame for connection #{id}. {e}");
                    false
                },
            })
            .count()
    }

    /// Event hooks that feed committed changes into the hub.
    pub fn event_hooks(&self) -> EventHooks {
        let mut hooks = EventHooks::default();
        let hub = self.clone();
        hooks.on_order_status_changed(move |ev| {
            hub.publish_order_event(&ServerMessage::from(&ev));
            Box::pin(async {})
        });
        let hub = self.clone();
        hooks.on_payment_updated(move |ev| {
            hub.publish_order_event(&ServerMessage::from(&ev));
            Box::pin(async {})
        });
        let hub = self.clone();
        hooks.on_notification_created(move |ev| {
            hub.publish_to_user(&ev.notification.user_id, &ServerMessage::from(&ev));
            Box::pin(async {})
        });
        hooks
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use cp_order_engine::{
        db_types::{OrderStatusType, PaymentStatus},
        tracking_protocol::{OrderUpdatePayload, PaymentUpdatePayload},
    };

    use super::*;

    fn order_update(order_id: &str) -> ServerMessage {
        ServerMessage::OrderUpdate(OrderUpdatePayload {
            order_id: OrderId::from(order_id),
            status: OrderStatusType::Shipped,
            message: "Order shipped".into(),
            timestamp: Utc::now(),
            location: None,
        })
    }

    #[tokio::test]
    async fn order_events_reach_subscribers_only() {
        let hub = TrackingHub::new();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        let c1 = hub.register(Some("alice".into()), tx1);
        let c2 = hub.register(None, tx2);
        assert!(hub.subscribe(c1, OrderId::from("O123")));
        assert!(!hub.subscribe(c1, OrderId::from("O123")));
        assert!(hub.subscribe(c2, OrderId::from("O456")));

        assert_eq!(hub.publish_order_event(&order_update("O123")), 1);
        let frame = rx1.try_recv().unwrap();
        assert!(frame.contains(r#""event":"order:update""#));
        assert!(frame.contains("O123"));
        assert!(rx2.try_recv().is_err());

        let payment = ServerMessage::PaymentUpdate(PaymentUpdatePayload {
            order_id: OrderId::from("O456"),
            payment_status: PaymentStatus::Paid,
            payment_id: Some("pay_1".into()),
            timestamp: Utc::now(),
        });
        assert_eq!(hub.publish_order_event(&payment), 1);
        assert!(rx2.try_recv().unwrap().contains("payment:update"));
        assert!(rx1.try_recv().is_err());

        assert!(hub.unsubscribe(c1, &OrderId::from("O123")));
        assert!(!hub.unsubscribe(c1, &OrderId::from("O123")));
        assert_eq!(hub.publish_order_event(&order_update("O123")), 0);
        assert!(hub.subscriptions(c1).is_empty());
    }

    #[tokio::test]
    async fn notifications_go_to_the_owner() {
        let hub = TrackingHub::new();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        let (tx3, mut rx3) = mpsc::channel(8);
        hub.register(Some("alice".into()), tx1);
        hub.register(Some("alice".into()), tx2);
        hub.register(Some("bob".into()), tx3);
        assert_eq!(hub.publish_to_user("alice", &ServerMessage::error("hello")), 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_err());
        assert_eq!(hub.publish_to_user("carol", &ServerMessage::error("hello")), 0);
    }

    #[tokio::test]
    async fn closed_connections_are_skipped() {
        let hub = TrackingHub::new();
        let (tx, rx) = mpsc::channel(1);
        let id = hub.register(Some("alice".into()), tx);
        hub.subscribe(id, OrderId::from("O1"));
        drop(rx);
        assert_eq!(hub.publish_order_event(&order_update("O1")), 0);
        assert_eq!(hub.connection_count(), 1);
        hub.remove(id);
        assert_eq!(hub.connection_count(), 0);
        assert!(!hub.subscribe(id, OrderId::from("O1")));
    }

    #[tokio::test]
    async fn full_buffers_drop_frames() {
        let hub = TrackingHub::new();
        let (tx, mut rx) = mpsc::channel(1);
        let id = hub.register(None, tx);
        hub.subscribe(id, OrderId::from("O1"));
        assert_eq!(hub.publish_order_event(&order_update("O1")), 1);
        assert_eq!(hub.publish_order_event(&order_update("O1")), 0);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn frames_without_an_order_are_not_published_to_subscribers() {
        let hub = TrackingHub::new();
        assert_eq!(hub.publish_order_event(&ServerMessage::error("oops")), 0);
    }
}
