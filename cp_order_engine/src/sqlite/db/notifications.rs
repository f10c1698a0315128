use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewNotification, Notification, NotificationPriority, NotificationType, OrderId},
    sqlite::SqliteDatabaseError,
};

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: i64,
    user_id: String,
    notification_type: NotificationType,
    title: String,
    message: String,
    is_read: bool,
    priority: NotificationPriority,
    order_id: Option<OrderId>,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            user_id: row.user_id,
            notification_type: row.notification_type,
            title: row.title,
            message: row.message,
            is_read: row.is_read,
            priority: row.priority,
            order_id: row.order_id,
            created_at: row.created_at,
        }
    }
}

pub async fn insert_notification(
    notification: NewNotification,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Notification, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, NotificationRow>(
        r#"
            INSERT INTO notifications (user_id, notification_type, title, message, is_read, priority, order_id, created_at)
            VALUES ($1, $2, $3, $4, FALSE, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(notification.user_id)
    .bind(notification.notification_type)
    .bind(notification.title)
    .bind(notification.message)
    .bind(notification.priority)
    .bind(notification.order_id)
    .bind(now)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Notification #{} stored for user {}", row.id, row.user_id);
    Ok(row.into())
}

pub async fn fetch_notifications_for_user(
    user_id: &str,
    unread_only: bool,
    conn: &mut SqliteConnection,
) -> Result<Vec<Notification>, SqliteDatabaseError> {
    let sql = if unread_only {
        "SELECT * FROM notifications WHERE user_id = $1 AND is_read = FALSE ORDER BY created_at DESC, id DESC"
    } else {
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
    };
    let rows = sqlx::query_as::<_, NotificationRow>(sql).bind(user_id).fetch_all(conn).await?;
    Ok(rows.into_iter().map(Notification::from).collect())
}

pub async fn fetch_notification(
    user_id: &str,
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Notification>, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, NotificationRow>("SELECT * FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(Notification::from))
}

pub async fn count_unread(user_id: &str, conn: &mut SqliteConnection) -> Result<i64, SqliteDatabaseError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE")
        .bind(user_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}

/// Returns `true` if a notification belonging to `user_id` with the given id exists.
pub async fn mark_read(user_id: &str, id: i64, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_all_read(user_id: &str, conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE")
        .bind(user_id)
        .execute(conn)
        .await?;
    trace!("🗃️ {} notifications marked read for user {user_id}", result.rows_affected());
    Ok(result.rows_affected())
}
