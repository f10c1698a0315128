use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use cp_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The public, human-readable order number, e.g. `CP-20241019-7QX2MD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The fulfilment stage of an order.
///
/// The string representations are persisted and sent over the wire, and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    /// The order has been submitted at checkout and is awaiting confirmation or payment.
    Pending,
    Confirmed,
    Processing,
    Packed,
    Shipped,
    OutForDelivery,
    /// Terminal. The order reached the customer.
    Delivered,
    /// Terminal. The order was cancelled by the customer, staff, or a payment failure.
    Cancelled,
    /// Terminal. The order was returned.
    Returned,
}

/// The forward fulfilment chain, in order.
pub const FULFILMENT_CHAIN: [OrderStatusType; 7] = [
    OrderStatusType::Pending,
    OrderStatusType::Confirmed,
    OrderStatusType::Processing,
    OrderStatusType::Packed,
    OrderStatusType::Shipped,
    OrderStatusType::OutForDelivery,
    OrderStatusType::Delivered,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatusTransitionError {
    #[error("The order already has status {0}")]
    NoOp(OrderStatusType),
    #[error("The order has status {0} and can no longer be modified")]
    Immutable(OrderStatusType),
    #[error("An order cannot move from {from} to {to}")]
    Invalid { from: OrderStatusType, to: OrderStatusType },
}

impl OrderStatusType {
    /// Position in the fulfilment chain. `None` for the absorbing alternate states.
    pub fn stage(&self) -> Option<usize> {
        FULFILMENT_CHAIN.iter().position(|s| s == self)
    }

    /// `DELIVERED`, `CANCELLED` and `RETURNED` orders are immutable.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Returned)
    }

    /// The next stage in the fulfilment chain, if there is one.
    pub fn next(&self) -> Option<Self> {
        self.stage().and_then(|i| FULFILMENT_CHAIN.get(i + 1)).copied()
    }

    /// Checks the transition table.
    ///
    /// | From \ To         | next stage | any other chain stage | CANCELLED / RETURNED | itself |
    /// |-------------------|------------|-----------------------|----------------------|--------|
    /// | non-terminal      | Ok         | Invalid               | Ok                   | NoOp   |
    /// | terminal          | Immutable  | Immutable             | Immutable            | NoOp   |
    pub fn check_transition(&self, to: OrderStatusType) -> Result<(), StatusTransitionError> {
        if *self == to {
            return Err(StatusTransitionError::NoOp(to));
        }
        if self.is_terminal() {
            return Err(StatusTransitionError::Immutable(*self));
        }
        match to {
            Self::Cancelled | Self::Returned => Ok(()),
            to if self.next() == Some(to) => Ok(()),
            to => Err(StatusTransitionError::Invalid { from: *self, to }),
        }
    }

    /// The tracking message used when a status change does not supply one.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::Pending => "Order placed",
            Self::Confirmed => "Order confirmed",
            Self::Processing => "Order is being processed",
            Self::Packed => "Order packed",
            Self::Shipped => "Order shipped",
            Self::OutForDelivery => "Out for delivery",
            Self::Delivered => "Order delivered",
            Self::Cancelled => "Order cancelled",
            Self::Returned => "Order returned",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Processing => "PROCESSING",
            Self::Packed => "PACKED",
            Self::Shipped => "SHIPPED",
            Self::OutForDelivery => "OUT_FOR_DELIVERY",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
            Self::Returned => "RETURNED",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "PROCESSING" => Ok(Self::Processing),
            "PACKED" => Ok(Self::Packed),
            "SHIPPED" => Ok(Self::Shipped),
            "OUT_FOR_DELIVERY" => Ok(Self::OutForDelivery),
            "DELIVERED" => Ok(Self::Delivered),
            "CANCELLED" => Ok(Self::Cancelled),
            "RETURNED" => Ok(Self::Returned),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Paid => write!(f, "PAID"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "FAILED" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------      OrderItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Catalogue reference of the medicine, lab test, consultation or service.
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn new<S: Into<String>>(product_id: S, product_name: S, quantity: i64, unit_price: Money) -> Self {
        Self { product_id: product_id.into(), product_name: product_name.into(), quantity, unit_price }
    }

    /// `None` if the line total does not fit in [`Money`].
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

//--------------------------------------   DeliveryAddress     ---------------------------------------------------------
/// A snapshot of the delivery address taken at checkout. Later edits to the customer's address book do not affect it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub recipient: String,
    pub phone: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

//--------------------------------------    CartSnapshot       ---------------------------------------------------------
/// The checkout submission from which an order is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub items: Vec<OrderItem>,
    /// Coupon or promotional discount already resolved by the cart.
    #[serde(default)]
    pub discount: Money,
    pub delivery_address: DeliveryAddress,
    #[serde(default)]
    pub delivery_slot: Option<String>,
    #[serde(default)]
    pub prescription_id: Option<String>,
}

//--------------------------------------     OrderTotals       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub delivery_fee: Money,
    pub tax: Money,
    pub total: Money,
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatus,
    pub totals: OrderTotals,
    pub delivery_address: DeliveryAddress,
    pub delivery_slot: Option<String>,
    pub prescription_id: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub delivery_address: DeliveryAddress,
    pub delivery_slot: Option<String>,
    pub prescription_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, user_id: String, cart: CartSnapshot, totals: OrderTotals) -> Self {
        Self {
            order_id,
            user_id,
            items: cart.items,
            totals,
            delivery_address: cart.delivery_address,
            delivery_slot: cart.delivery_slot,
            prescription_id: cart.prescription_id,
            created_at: Utc::now(),
        }
    }
}

//-------------------------------------- OrderTrackingUpdate   ---------------------------------------------------------
/// An append-only entry in an order's tracking log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTrackingUpdate {
    pub id: i64,
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub message: String,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The tracking details that accompany a status change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingNote {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl TrackingNote {
    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_location<S: Into<String>>(mut self, location: S) -> Self {
        self.location = Some(location.into());
        self
    }
}

//--------------------------------------     Notification      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Order,
    Payment,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

impl Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Order => write!(f, "ORDER"),
            Self::Payment => write!(f, "PAYMENT"),
            Self::System => write!(f, "SYSTEM"),
        }
    }
}

impl Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Normal => write!(f, "NORMAL"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub priority: NotificationPriority,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub order_id: Option<OrderId>,
}

impl NewNotification {
    pub fn for_order(order: &Order, notification_type: NotificationType, title: &str, message: String) -> Self {
        Self {
            user_id: order.user_id.clone(),
            notification_type,
            title: title.to_string(),
            message,
            priority: NotificationPriority::Normal,
            order_id: Some(order.order_id.clone()),
        }
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }
}

//--------------------------------------    PaymentIntent      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentIntentStatus {
    /// Live. The customer may complete checkout against it.
    Created,
    Captured,
    Failed,
    /// A newer intent was created for the same order.
    Superseded,
    Expired,
}

impl Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Captured => write!(f, "CAPTURED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Superseded => write!(f, "SUPERSEDED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: i64,
    pub order_id: OrderId,
    pub provider: String,
    pub provider_order_id: String,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentIntentStatus,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentIntentStatus::Created && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub order_id: OrderId,
    pub provider: String,
    pub provider_order_id: String,
    pub amount: Money,
    pub currency: String,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------         Role          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Staff,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Staff => write!(f, "staff"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "staff" => Ok(Self::Staff),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

impl Role {
    /// Admins can do everything staff can, and staff can do everything a user can.
    pub fn grants(&self, required: Role) -> bool {
        match self {
            Role::Admin => true,
            Role::Staff => matches!(required, Role::Staff | Role::User),
            Role::User => required == Role::User,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::OrderStatusType::*;

    #[test]
    fn status_strings_are_stable() {
        let all = [Pending, Confirmed, Processing, Packed, Shipped, OutForDelivery, Delivered, Cancelled, Returned];
        let strings = all.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(strings, vec![
            "PENDING",
            "CONFIRMED",
            "PROCESSING",
            "PACKED",
            "SHIPPED",
            "OUT_FOR_DELIVERY",
            "DELIVERED",
            "CANCELLED",
            "RETURNED"
        ]);
        for (s, status) in strings.iter().zip(all) {
            assert_eq!(s.parse::<OrderStatusType>().unwrap(), status);
            assert_eq!(serde_json::to_string(&status).unwrap(), format!("\"{s}\""));
        }
        assert!("shipped".parse::<OrderStatusType>().is_err());
    }

    #[test]
    fn forward_chain_is_walkable() {
        let mut status = Pending;
        let mut visited = vec![status];
        while let Some(next) = status.next() {
            assert!(status.check_transition(next).is_ok());
            status = next;
            visited.push(status);
        }
        assert_eq!(visited, FULFILMENT_CHAIN.to_vec());
        assert_eq!(status, Delivered);
    }

    #[test]
    fn skipped_and_backward_transitions_are_rejected() {
        assert_eq!(Pending.check_transition(Processing), Err(StatusTransitionError::Invalid {
            from: Pending,
            to: Processing
        }));
        assert_eq!(Shipped.check_transition(Packed), Err(StatusTransitionError::Invalid { from: Shipped, to: Packed }));
        assert_eq!(OutForDelivery.check_transition(Pending), Err(StatusTransitionError::Invalid {
            from: OutForDelivery,
            to: Pending
        }));
        assert_eq!(Packed.check_transition(Packed), Err(StatusTransitionError::NoOp(Packed)));
    }

    #[test]
    fn cancel_and_return_reachable_from_every_live_state() {
        for status in FULFILMENT_CHAIN.iter().filter(|s| !s.is_terminal()) {
            assert!(status.check_transition(Cancelled).is_ok(), "{status} -> CANCELLED");
            assert!(status.check_transition(Returned).is_ok(), "{status} -> RETURNED");
        }
    }

    #[test]
    fn terminal_states_are_absorbing() {
        for terminal in [Delivered, Cancelled, Returned] {
            for to in [Pending, Confirmed, Delivered, Cancelled, Returned] {
                if to == terminal {
                    continue;
                }
                assert_eq!(terminal.check_transition(to), Err(StatusTransitionError::Immutable(terminal)));
            }
        }
    }

    #[test]
    fn roles() {
        assert_eq!("Staff".parse::<Role>().unwrap(), Role::Staff);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert!("root".parse::<Role>().is_err());
        assert!(Role::Admin.grants(Role::Staff));
        assert!(Role::Staff.grants(Role::User));
        assert!(!Role::Staff.grants(Role::Admin));
        assert!(!Role::User.grants(Role::Staff));
    }
}
