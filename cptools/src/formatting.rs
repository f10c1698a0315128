use std::fmt::Write;

use cp_order_engine::{
    db_types::{Notification, Order, OrderItem, OrderTrackingUpdate},
    tracking_protocol::ServerMessage,
};
use prettytable::{
    format::{LinePosition, LineSeparator, TableFormat},
    row,
    Table,
};

fn markdown_format() -> TableFormat {
    prettytable::format::FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separator(LinePosition::Title, LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

fn markdown_table() -> Table {
    let mut table = Table::new();
    table.set_format(markdown_format());
    table
}

pub fn format_orders(orders: &[Order]) -> String {
    if orders.is_empty() {
        return "No orders".to_string();
    }
    let mut table = markdown_table();
    table.set_titles(row!["Order id", "Customer", "Status", "Payment", "Items", "Total", "Placed"]);
    for order in orders {
        table.add_row(row![
            order.order_id,
            order.user_id,
            order.status,
            order.payment_status,
            r->order.items.len(),
            r->order.totals.total,
            order.created_at.format("%Y-%m-%d %H:%M")
        ]);
    }
    table.to_string()
}

pub fn format_order(order: &Order) -> Result<String, std::fmt::Error> {
    let mut f = String::new();
    writeln!(f, "Order {} for {}", order.order_id, order.user_id)?;
    writeln!(f, "Status: {}. Payment: {}", order.status, order.payment_status)?;
    if let Some(reason) = &order.cancellation_reason {
        writeln!(f, "Cancelled: {reason}")?;
    }
    let mut table = markdown_table();
    table.set_titles(row!["Product", "Name", "Qty", "Unit price", "Line total"]);
    for item in &order.items {
        table.add_row(row![item.product_id, item.product_name, r->item.quantity, r->item.unit_price, r->line_total(item)]);
    }
    writeln!(f, "{table}")?;
    let t = &order.totals;
    writeln!(f, "Subtotal: {}  Discount: {}  Delivery: {}  Tax: {}", t.subtotal, t.discount, t.delivery_fee, t.tax)?;
    writeln!(f, "Total:    {}", t.total)?;
    let a = &order.delivery_address;
    writeln!(f, "Deliver to {}, {}, {} {} ({})", a.recipient, a.line1, a.city, a.postal_code, a.phone)?;
    Ok(f)
}

fn line_total(item: &OrderItem) -> String {
    item.line_total().map(|m| m.to_string()).unwrap_or_else(|| "overflow".to_string())
}

pub fn format_tracking(tracking: &[OrderTrackingUpdate]) -> String {
    if tracking.is_empty() {
        return "No tracking updates yet".to_string();
    }
    let mut table = markdown_table();
    table.set_titles(row!["When", "Status", "Message", "Location"]);
    for update in tracking {
        table.add_row(row![
            update.created_at.format("%Y-%m-%d %H:%M:%S"),
            update.status,
            update.message,
            update.location.as_deref().unwrap_or("")
        ]);
    }
    table.to_string()
}

pub fn format_notifications(notifications: &[Notification]) -> String {
    if notifications.is_empty() {
        return "No notifications".to_string();
    }
    let mut table = markdown_table();
    table.set_titles(row!["Id", "", "Type", "Priority", "Title", "Message", "Order"]);
    for n in notifications {
        let order = n.order_id.as_ref().map(|o| o.to_string()).unwrap_or_default();
        let unread = if n.is_read { "" } else { "●" };
        table.add_row(row![r->n.id, unread, n.notification_type, n.priority, n.title, n.message, order]);
    }
    table.to_string()
}

/// One line per tracking event, for the `watch` command.
pub fn format_event(message: &ServerMessage) -> String {
    match message {
        ServerMessage::OrderUpdate(u) => {
            let location = u.location.as_deref().map(|l| format!(" @ {l}")).unwrap_or_default();
            format!("[{}] {} is {}: {}{location}", u.timestamp.format("%H:%M:%S"), u.order_id, u.status, u.message)
        },
        ServerMessage::PaymentUpdate(p) => {
            let payment = p.payment_id.as_deref().map(|id| format!(" ({id})")).unwrap_or_default();
            format!("[{}] {} payment is {}{payment}", p.timestamp.format("%H:%M:%S"), p.order_id, p.payment_status)
        },
        ServerMessage::NotificationNew(n) => {
            format!("[{}] 🔔 {}: {}", n.timestamp.format("%H:%M:%S"), n.title, n.message)
        },
        ServerMessage::Error(e) => format!("Server error: {}", e.message),
    }
}
