use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Money, NewPaymentIntent, OrderId, PaymentIntent, PaymentIntentStatus},
    sqlite::SqliteDatabaseError,
};

#[derive(Debug, sqlx::FromRow)]
struct PaymentIntentRow {
    id: i64,
    order_id: OrderId,
    provider: String,
    provider_order_id: String,
    amount: Money,
    currency: String,
    status: PaymentIntentStatus,
    payment_id: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentIntentRow> for PaymentIntent {
    fn from(row: PaymentIntentRow) -> Self {
        PaymentIntent {
            id: row.id,
            order_id: row.order_id,
            provider: row.provider,
            provider_order_id: row.provider_order_id,
            amount: row.amount,
            currency: row.currency,
            status: row.status,
            payment_id: row.payment_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
            updated_at: row.updated_at,
        }
    }
}

/// Marks every `CREATED` intent for the order as `SUPERSEDED` and returns them in their new state.
pub async fn supersede_live_intents(
    order_id: &OrderId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentIntent>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, PaymentIntentRow>(
        r#"
            UPDATE payment_intents SET status = $1, updated_at = $2
            WHERE order_id = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(PaymentIntentStatus::Superseded)
    .bind(now)
    .bind(order_id)
    .bind(PaymentIntentStatus::Created)
    .fetch_all(conn)
    .await?;
    if !rows.is_empty() {
        debug!("🗃️ {} payment intent(s) for {order_id} superseded", rows.len());
    }
    Ok(rows.into_iter().map(PaymentIntent::from).collect())
}

pub async fn insert_payment_intent(
    intent: NewPaymentIntent,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentIntent, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, PaymentIntentRow>(
        r#"
            INSERT INTO payment_intents (
                order_id, provider, provider_order_id, amount, currency, status, created_at, expires_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $7)
            RETURNING *;
        "#,
    )
    .bind(intent.order_id)
    .bind(intent.provider)
    .bind(intent.provider_order_id)
    .bind(intent.amount)
    .bind(intent.currency)
    .bind(PaymentIntentStatus::Created)
    .bind(now)
    .bind(intent.expires_at)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Payment intent #{} created for {} ({})", row.id, row.order_id, row.provider_order_id);
    Ok(row.into())
}

pub async fn fetch_by_provider_order_id(
    provider_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, PaymentIntentRow>("SELECT * FROM payment_intents WHERE provider_order_id = $1")
        .bind(provider_order_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(PaymentIntent::from))
}

pub async fn fetch_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentIntent>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, PaymentIntentRow>("SELECT * FROM payment_intents WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().map(PaymentIntent::from).collect())
}

/// Same as [`super::orders::claim_order`], for transactions that start from a payment intent.
pub async fn claim_intent(provider_order_id: &str, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query("UPDATE payment_intents SET updated_at = updated_at WHERE provider_order_id = $1")
        .bind(provider_order_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn update_status(
    id: i64,
    status: PaymentIntentStatus,
    payment_id: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentIntent, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, PaymentIntentRow>(
        r#"
            UPDATE payment_intents SET status = $1, payment_id = COALESCE($2, payment_id), updated_at = $3
            WHERE id = $4
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(payment_id)
    .bind(now)
    .bind(id)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Payment intent #{id} is now {status}");
    Ok(row.into())
}

pub async fn expire_stale_intents(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentIntent>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, PaymentIntentRow>(
        r#"
            UPDATE payment_intents SET status = $1, updated_at = $2
            WHERE status = $3 AND expires_at < $2
            RETURNING *;
        "#,
    )
    .bind(PaymentIntentStatus::Expired)
    .bind(now)
    .bind(PaymentIntentStatus::Created)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(PaymentIntent::from).collect())
}
