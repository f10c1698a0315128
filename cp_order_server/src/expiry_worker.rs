use chrono::Duration;
use cp_order_engine::{db_types::PaymentIntent, events::EventProducers, PaymentApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

use crate::integrations::ServerPaymentProvider;

/// Starts the payment intent expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_expiry_worker(
    db: SqliteDatabase,
    provider: ServerPaymentProvider,
    producers: EventProducers,
    intent_ttl: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(60));
        let api = PaymentApi::new(db, provider, producers).with_intent_ttl(intent_ttl);
        info!("🕰️ Payment intent expiry worker started");
        loop {
            timer.tick().await;
            debug!("🕰️ Running payment intent expiry job");
            match api.expire_intents().await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No payment intents expired"),
                Ok(expired) => {
                    info!("🕰️ {} payment intents expired", expired.len());
                    debug!("🕰️ Expired intents: {}", intent_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running payment intent expiry job: {e}");
                },
            }
        }
    })
}

fn intent_list(intents: &[PaymentIntent]) -> String {
    intents
        .iter()
        .map(|i| format!("[{}] order_id: {} provider_order_id: {}", i.id, i.order_id, i.provider_order_id))
        .collect::<Vec<String>>()
        .join(", ")
}
