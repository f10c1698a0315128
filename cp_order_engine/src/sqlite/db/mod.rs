//! # SQLite database methods
//!
//! Low-level SQLite interactions. Each function takes a `&mut SqliteConnection`, so callers can pass a pooled
//! connection for a one-off query or `&mut tx` to make several calls part of one atomic transaction.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod notifications;
pub mod orders;
pub mod payment_intents;
pub mod tracking;

const SQLITE_DB_URL: &str = "sqlite://data/carepoint.db";
/// How long a writer waits for the write lock before giving up with "database is locked".
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn db_url() -> String {
    let result = env::var("CP_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ CP_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true).busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
