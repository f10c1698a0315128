use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{types::Json, FromRow, QueryBuilder, SqliteConnection};

use crate::{
    cpe_api::order_objects::OrderQueryFilter,
    db_types::{
        DeliveryAddress,
        Money,
        NewOrder,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        OrderTotals,
        PaymentStatus,
    },
    sqlite::SqliteDatabaseError,
};

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    order_id: OrderId,
    user_id: String,
    status: OrderStatusType,
    payment_status: PaymentStatus,
    subtotal: Money,
    discount: Money,
    delivery_fee: Money,
    tax: Money,
    total: Money,
    delivery_address: Json<DeliveryAddress>,
    delivery_slot: Option<String>,
    prescription_id: Option<String>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            order_id: self.order_id,
            user_id: self.user_id,
            items,
            status: self.status,
            payment_status: self.payment_status,
            totals: OrderTotals {
                subtotal: self.subtotal,
                discount: self.discount,
                delivery_fee: self.delivery_fee,
                tax: self.tax,
                total: self.total,
            },
            delivery_address: self.delivery_address.0,
            delivery_slot: self.delivery_slot,
            prescription_id: self.prescription_id,
            cancellation_reason: self.cancellation_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    product_id: String,
    product_name: String,
    quantity: i64,
    unit_price: Money,
}

impl From<ItemRow> for OrderItem {
    fn from(row: ItemRow) -> Self {
        OrderItem {
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

/// Inserts the order and its items. This is not atomic on its own; call it with `&mut tx` to make it so.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<i64, SqliteDatabaseError> {
    let result = sqlx::query_scalar::<_, i64>(
        r#"
            INSERT INTO orders (
                order_id, user_id, status, payment_status,
                subtotal, discount, delivery_fee, tax, total,
                delivery_address, delivery_slot, prescription_id,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING id;
        "#,
    )
    .bind(&order.order_id)
    .bind(&order.user_id)
    .bind(OrderStatusType::Pending)
    .bind(PaymentStatus::Pending)
    .bind(order.totals.subtotal)
    .bind(order.totals.discount)
    .bind(order.totals.delivery_fee)
    .bind(order.totals.tax)
    .bind(order.totals.total)
    .bind(Json(&order.delivery_address))
    .bind(&order.delivery_slot)
    .bind(&order.prescription_id)
    .bind(order.created_at)
    .fetch_one(&mut *conn)
    .await;
    let id = match result {
        Ok(id) => id,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(SqliteDatabaseError::DuplicateOrder(order.order_id.clone()));
        },
        Err(e) => return Err(e.into()),
    };
    for (position, item) in order.items.iter().enumerate() {
        sqlx::query(
            r#"
                INSERT INTO order_items (order_id, position, product_id, product_name, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6);
            "#,
        )
        .bind(&order.order_id)
        .bind(position as i64)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(item.unit_price)
        .execute(&mut *conn)
        .await?;
    }
    debug!("🗃️ Order {} saved with {} items as #{id}", order.order_id, order.items.len());
    Ok(id)
}

async fn fetch_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, ItemRow>(
        "SELECT product_id, product_name, quantity, unit_price FROM order_items WHERE order_id = $1 ORDER BY position",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(OrderItem::from).collect())
}

async fn attach_items(rows: Vec<OrderRow>, conn: &mut SqliteConnection) -> Result<Vec<Order>, SqliteDatabaseError> {
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let items = fetch_items(&row.order_id, conn).await?;
        orders.push(row.into_order(items));
    }
    Ok(orders)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => {
            let items = fetch_items(&row.order_id, conn).await?;
            Ok(Some(row.into_order(items)))
        },
        None => Ok(None),
    }
}

pub async fn fetch_orders_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
    attach_items(rows, conn).await
}

/// Fetches orders according to the criteria in the `OrderQueryFilter`, oldest first.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id);
    }
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        for (i, status) in statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    if let Some(payment_status) = query.payment_status {
        where_clause.push("payment_status = ");
        where_clause.push_bind_unseparated(payment_status);
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let rows = builder.build_query_as::<OrderRow>().fetch_all(&mut *conn).await?;
    trace!("🗃️ search_orders matched {} orders", rows.len());
    attach_items(rows, conn).await
}

/// Overwrites the status. The transition must already have been checked by the caller.
/// Takes the database write lock by touching the order row. Call it first in a transaction that reads the order
/// before changing it, so competing writers wait on the busy timeout instead of failing with "database is locked".
pub async fn claim_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query("UPDATE orders SET updated_at = updated_at WHERE order_id = $1").bind(order_id).execute(conn).await?;
    Ok(())
}

pub async fn update_order_status(
    order_id: &OrderId,
    status: OrderStatusType,
    cancellation_reason: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
            UPDATE orders
            SET status = $1, cancellation_reason = COALESCE($2, cancellation_reason), updated_at = $3
            WHERE order_id = $4
        "#,
    )
    .bind(status)
    .bind(cancellation_reason)
    .bind(now)
    .bind(order_id)
    .execute(conn)
    .await?;
    trace!("🗃️ Order {order_id} status set to {status} ({} rows)", result.rows_affected());
    Ok(())
}

pub async fn update_payment_status(
    order_id: &OrderId,
    payment_status: PaymentStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query("UPDATE orders SET payment_status = $1, updated_at = $2 WHERE order_id = $3")
        .bind(payment_status)
        .bind(now)
        .bind(order_id)
        .execute(conn)
        .await?;
    trace!("🗃️ Order {order_id} payment status set to {payment_status}");
    Ok(())
}
