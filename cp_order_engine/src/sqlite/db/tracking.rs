use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{OrderId, OrderStatusType, OrderTrackingUpdate},
    sqlite::SqliteDatabaseError,
};

#[derive(Debug, sqlx::FromRow)]
struct TrackingRow {
    id: i64,
    order_id: OrderId,
    status: OrderStatusType,
    message: String,
    location: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<TrackingRow> for OrderTrackingUpdate {
    fn from(row: TrackingRow) -> Self {
        OrderTrackingUpdate {
            id: row.id,
            order_id: row.order_id,
            status: row.status,
            message: row.message,
            location: row.location,
            created_at: row.created_at,
        }
    }
}

/// Appends an entry to the tracking log. Entries are never updated or deleted.
pub async fn append_tracking_update(
    order_id: &OrderId,
    status: OrderStatusType,
    message: &str,
    location: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<OrderTrackingUpdate, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, TrackingRow>(
        r#"
            INSERT INTO order_tracking (order_id, status, message, location, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(status)
    .bind(message)
    .bind(location)
    .bind(now)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Tracking entry #{} appended for {order_id}: {status}", row.id);
    Ok(row.into())
}

pub async fn fetch_tracking_updates(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderTrackingUpdate>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, TrackingRow>("SELECT * FROM order_tracking WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().map(OrderTrackingUpdate::from).collect())
}
