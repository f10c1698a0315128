use std::collections::HashMap;

use cp_order_engine::{
    db_types::{Order, OrderId},
    events::EventProducers,
    providers::LocalPaymentProvider,
    OrderFlowApi,
    PaymentApi,
    SqliteDatabase,
};
use cucumber::World;
use log::*;

use crate::support::prepare_env::{prepare_test_env, random_db_path};

#[derive(Default, Debug, World)]
pub struct OrderWorld {
    pub system: Option<OrderSystem>,
    /// Orders by the alias a scenario gave them
    pub orders: HashMap<String, OrderId>,
    pub last_error: Option<String>,
    pub last_provider_order_id: Option<String>,
}

#[derive(Debug)]
pub struct OrderSystem {
    pub db: SqliteDatabase,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub payments: PaymentApi<SqliteDatabase, LocalPaymentProvider>,
}

impl OrderSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        debug!("🚀️ Created database: {url}");
        let orders = OrderFlowApi::new(db.clone(), EventProducers::default());
        let payments = PaymentApi::new(db.clone(), LocalPaymentProvider::default(), EventProducers::default());
        Self { db, orders, payments }
    }
}

impl OrderWorld {
    pub async fn system(&mut self) -> &OrderSystem {
        if self.system.is_none() {
            self.system = Some(OrderSystem::new().await);
        }
        self.system.as_ref().expect("System was just initialised")
    }

    pub fn order_id(&self, alias: &str) -> OrderId {
        self.orders.get(alias).cloned().unwrap_or_else(|| panic!("No order called {alias} in this scenario"))
    }

    pub async fn order(&mut self, alias: &str) -> Order {
        let id = self.order_id(alias);
        self.system().await.orders.fetch_order(&id).await.expect("Error fetching order").expect("Order not found")
    }
}
