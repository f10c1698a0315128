use cp_order_engine::{
    db_types::{CartSnapshot, DeliveryAddress, Money, OrderItem},
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/cp_test_store_{}.db", dir.display(), rand::random::<u64>())
}

/// Creates a fresh database at `url` and brings the schema up to date.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("🚀️ Nothing to drop at {url}: {e}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}

pub async fn tear_down(db: SqliteDatabase) {
    let url = db.url().to_string();
    db.close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not drop test database {url}: {e}");
    }
}

pub fn address() -> DeliveryAddress {
    DeliveryAddress {
        recipient: "Asha Rao".into(),
        phone: "+91 98450 00000".into(),
        line1: "14 MG Road".into(),
        line2: None,
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        postal_code: "560001".into(),
    }
}

/// A cart of `(product id, rupees, quantity)` lines.
pub fn cart(lines: &[(&str, i64, i64)]) -> CartSnapshot {
    let items = lines
        .iter()
        .map(|(id, rupees, qty)| OrderItem::new(*id, *id, *qty, Money::from_rupees(*rupees)))
        .collect();
    CartSnapshot {
        items,
        discount: Money::default(),
        delivery_address: address(),
        delivery_slot: Some("2024-10-20 09:00-12:00".into()),
        prescription_id: None,
    }
}
