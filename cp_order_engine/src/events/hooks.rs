use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    NotificationCreatedEvent,
    OrderCreatedEvent,
    OrderStatusChangedEvent,
    PaymentUpdatedEvent,
};

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The publishing half of every registered hook. The APIs hold a clone of this.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_created_producer: Vec<EventProducer<OrderCreatedEvent>>,
    pub status_changed_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub payment_updated_producer: Vec<EventProducer<PaymentUpdatedEvent>>,
    pub notification_created_producer: Vec<EventProducer<NotificationCreatedEvent>>,
}

pub struct EventHandlers {
    pub on_order_created: Option<EventHandler<OrderCreatedEvent>>,
    pub on_order_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_payment_updated: Option<EventHandler<PaymentUpdatedEvent>>,
    pub on_notification_created: Option<EventHandler<NotificationCreatedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_created: hooks.on_order_created.map(|f| EventHandler::new(buffer_size, f)),
            on_order_status_changed: hooks.on_order_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_payment_updated: hooks.on_payment_updated.map(|f| EventHandler::new(buffer_size, f)),
            on_notification_created: hooks.on_notification_created.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_created {
            result.order_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_status_changed {
            result.status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_updated {
            result.payment_updated_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_notification_created {
            result.notification_created_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task per registered handler. Each task ends once all of its producers have been dropped.
    pub fn start_handlers(self) {
        if let Some(handler) = self.on_order_created {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_updated {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_notification_created {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_created: Option<Handler<OrderCreatedEvent>>,
    pub on_order_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_payment_updated: Option<Handler<PaymentUpdatedEvent>>,
    pub on_notification_created: Option<Handler<NotificationCreatedEvent>>,
}

impl EventHooks {
    pub fn on_order_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreatedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_created = Some(Arc::new(f));
        self
    }

    pub fn on_order_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_payment_updated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentUpdatedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_payment_updated = Some(Arc::new(f));
        self
    }

    pub fn on_notification_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(NotificationCreatedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_notification_created = Some(Arc::new(f));
        self
    }
}
