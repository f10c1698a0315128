use cp_order_engine::{
    db_types::{Money, OrderStatusType, PaymentStatus, TrackingNote},
    payment_objects::PaymentVerification,
};
use cucumber::{gherkin::Step, given, then, when};

use crate::{cucumber::OrderWorld, support::prepare_env::cart};

#[given(expr = "user {string} checks out order {word} with these items")]
async fn checkout(world: &mut OrderWorld, user: String, alias: String, step: &Step) {
    let table = step.table.as_ref().expect("The step needs an item table");
    let lines = table
        .rows
        .iter()
        .skip(1)
        .map(|row| {
            let price = row[1].parse::<i64>().expect("Price must be whole rupees");
            let qty = row[2].parse::<i64>().expect("Quantity must be an integer");
            (row[0].clone(), price, qty)
        })
        .collect::<Vec<_>>();
    let lines = lines.iter().map(|(id, p, q)| (id.as_str(), *p, *q)).collect::<Vec<_>>();
    let order = world.system().await.orders.create_order(&user, cart(&lines)).await.expect("Error creating order");
    world.orders.insert(alias, order.order_id);
}

#[when(expr = "staff move order {word} to {word}")]
async fn move_order(world: &mut OrderWorld, alias: String, status: String) {
    let status = status.parse::<OrderStatusType>().expect("Unknown status");
    let id = world.order_id(&alias);
    let result = world.system().await.orders.update_status(&id, status, TrackingNote::default()).await;
    world.last_error = result.err().map(|e| e.to_string());
}

#[when(expr = "order {word} is cancelled because {string}")]
async fn cancel_order(world: &mut OrderWorld, alias: String, reason: String) {
    let id = world.order_id(&alias);
    let result = world.system().await.orders.cancel_order(&id, &reason).await;
    world.last_error = result.err().map(|e| e.to_string());
}

#[when(expr = "the customer starts paying for order {word}")]
async fn initiate(world: &mut OrderWorld, alias: String) {
    let order = world.order(&alias).await;
    let init = world
        .system()
        .await
        .payments
        .initiate_payment(&order.order_id, order.totals.total)
        .await
        .expect("Error initiating payment");
    world.last_provider_order_id = Some(init.provider_order_id);
}

#[when(expr = "the checkout completes with a {word} signature")]
async fn complete_checkout(world: &mut OrderWorld, kind: String) {
    let provider_order_id = world.last_provider_order_id.clone().expect("No payment was started");
    let system = world.system().await;
    let (payment_id, signature) = system.payments.provider().simulate_checkout(&provider_order_id);
    let signature = match kind.as_str() {
        "valid" => signature,
        _ => "0".repeat(64),
    };
    let result = system.payments.verify_payment(PaymentVerification { provider_order_id, payment_id, signature }).await;
    world.last_error = result.err().map(|e| e.to_string());
}

#[then(expr = "order {word} has status {word}")]
async fn check_status(world: &mut OrderWorld, alias: String, status: String) {
    let order = world.order(&alias).await;
    assert_eq!(order.status.to_string(), status);
}

#[then(expr = "order {word} has payment status {word}")]
async fn check_payment_status(world: &mut OrderWorld, alias: String, status: String) {
    let order = world.order(&alias).await;
    let expected = status.parse::<PaymentStatus>().expect("Unknown payment status");
    assert_eq!(order.payment_status, expected);
}

#[then(expr = "order {word} has a total of {int} rupees")]
async fn check_total(world: &mut OrderWorld, alias: String, rupees: i64) {
    let order = world.order(&alias).await;
    assert_eq!(order.totals.total, Money::from_rupees(rupees));
}

#[then(expr = "order {word} has a delivery fee of {int} rupees")]
async fn check_delivery_fee(world: &mut OrderWorld, alias: String, rupees: i64) {
    let order = world.order(&alias).await;
    assert_eq!(order.totals.delivery_fee, Money::from_rupees(rupees));
}

#[then(expr = "the tracking log for order {word} reads {string}")]
async fn check_tracking(world: &mut OrderWorld, alias: String, expected: String) {
    let id = world.order_id(&alias);
    let tracking = world.system().await.orders.track(&id).await.expect("Error fetching tracking log");
    let statuses = tracking.iter().map(|t| t.status.to_string()).collect::<Vec<_>>().join(", ");
    assert_eq!(statuses, expected);
}

#[then(expr = "the tracking log for order {word} is empty")]
async fn check_tracking_empty(world: &mut OrderWorld, alias: String) {
    let id = world.order_id(&alias);
    let tracking = world.system().await.orders.track(&id).await.expect("Error fetching tracking log");
    assert!(tracking.is_empty(), "Expected no tracking entries, found {}", tracking.len());
}

#[then(expr = "the last tracking message for order {word} is {string}")]
async fn check_last_message(world: &mut OrderWorld, alias: String, expected: String) {
    let id = world.order_id(&alias);
    let tracking = world.system().await.orders.track(&id).await.expect("Error fetching tracking log");
    let last = tracking.last().expect("The tracking log is empty");
    assert_eq!(last.message, expected);
}

#[then(expr = "the request fails with {string}")]
async fn check_error(world: &mut OrderWorld, expected: String) {
    let err = world.last_error.take().expect("Expected the last request to fail");
    assert!(err.contains(&expected), "Expected an error containing '{expected}', got '{err}'");
}

#[then("the request succeeds")]
async fn check_success(world: &mut OrderWorld) {
    if let Some(err) = world.last_error.take() {
        panic!("Expected success, got '{err}'");
    }
}
