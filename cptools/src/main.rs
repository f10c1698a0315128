use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use cp_common::Secret;
use cp_order_engine::{
    db_types::{CartSnapshot, OrderId, OrderStatusType, PaymentStatus},
    tracking_protocol::{ERROR, NOTIFICATION_NEW, ORDER_UPDATE, PAYMENT_UPDATE},
};
use cp_order_server::data_objects::UpdateStatusParams;
use cptools::{
    client::{OrderSearch, OrderServerClient},
    formatting::{format_event, format_notifications, format_order, format_orders, format_tracking},
    payment_flow::PaymentFlow,
    tracking::{handler, ChannelConfig, ChannelState, TrackingChannel},
    widgets::{PromptCheckout, SimulatedCheckout},
};
use log::*;

#[derive(Parser, Debug)]
#[command(version, about = "Command-line client for the CarePoint order service")]
pub struct Arguments {
    /// Base URL of the order server's REST API
    #[arg(long = "server", env = "CP_SERVER_URL", default_value = "http://127.0.0.1:8480")]
    server: String,
    /// URL of the order tracking channel
    #[arg(long = "ws", env = "CP_WS_URL", default_value = "ws://127.0.0.1:8481")]
    ws: String,
    /// Access token (JWT) sent with every API call
    #[arg(long = "token", env = "CP_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the server is up
    Health,
    /// List your orders
    Orders,
    /// Show an order
    Order { order_id: String },
    /// Place an order from a cart snapshot stored as JSON
    Create {
        #[arg(short = 'c', long = "cart")]
        cart: PathBuf,
    },
    /// Show the tracking log of an order
    Track { order_id: String },
    /// Move an order to a new status (staff)
    Status(StatusParams),
    /// Cancel an order
    Cancel {
        order_id: String,
        #[arg(short = 'r', long = "reason")]
        reason: String,
    },
    /// Search all orders (staff)
    Search(SearchParams),
    /// Pay for an order
    Pay {
        order_id: String,
        /// Sign the checkout locally with the mock provider's key secret instead of prompting for the result
        #[arg(long = "simulate-with", env = "CP_MOCK_KEY_SECRET", hide_env_values = true)]
        simulate_with: Option<String>,
    },
    /// List your notifications
    Notifications {
        #[arg(short = 'u', long = "unread")]
        unread: bool,
    },
    /// Mark a notification as read
    Read { id: i64 },
    /// Mark all your notifications as read
    ReadAll,
    /// Follow orders in real time until interrupted
    Watch { order_ids: Vec<String> },
}

#[derive(Debug, Args)]
pub struct StatusParams {
    order_id: String,
    status: OrderStatusType,
    /// The tracking message. Defaults to a standard message for the status
    #[arg(short = 'm', long = "message")]
    message: Option<String>,
    #[arg(short = 'l', long = "location")]
    location: Option<String>,
}

#[derive(Debug, Args)]
pub struct SearchParams {
    #[arg(short = 'u', long = "user")]
    user_id: Option<String>,
    /// May be given more than once
    #[arg(short = 's', long = "status")]
    statuses: Vec<OrderStatusType>,
    #[arg(short = 'p', long = "payment-status")]
    payment_status: Option<PaymentStatus>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let args = Arguments::parse();
    let client = OrderServerClient::new(&args.server, args.token.clone())?;
    match args.command {
        Command::Health => println!("{}", client.health().await?),
        Command::Orders => println!("{}", format_orders(&client.my_orders().await?)),
        Command::Order { order_id } => println!("{}", format_order(&client.order(&OrderId::from(order_id)).await?)?),
        Command::Create { cart } => {
            let json = fs::read_to_string(&cart).with_context(|| format!("Could not read {}", cart.display()))?;
            let cart: CartSnapshot = serde_json::from_str(&json).context("Invalid cart")?;
            let order = client.create_order(&cart).await?;
            println!("Order {} placed", order.order_id);
            println!("{}", format_order(&order)?);
        },
        Command::Track { order_id } => println!("{}", format_tracking(&client.track(&OrderId::from(order_id)).await?)),
        Command::Status(params) => {
            let update =
                UpdateStatusParams { status: params.status, message: params.message, location: params.location };
            let order = client.update_status(&OrderId::from(params.order_id), &update).await?;
            println!("Order {} is now {}", order.order_id, order.status);
        },
        Command::Cancel { order_id, reason } => {
            let order = client.cancel_order(&OrderId::from(order_id), &reason).await?;
            println!("Order {} cancelled", order.order_id);
        },
        Command::Search(params) => {
            let search =
                OrderSearch { user_id: params.user_id, statuses: params.statuses, payment_status: params.payment_status };
            println!("{}", format_orders(&client.search_orders(&search).await?));
        },
        Command::Pay { order_id, simulate_with } => pay(&client, OrderId::from(order_id), simulate_with).await?,
        Command::Notifications { unread } => {
            let list = client.notifications(unread).await?;
            println!("{} unread", list.unread_count);
            println!("{}", format_notifications(&list.notifications));
        },
        Command::Read { id } => {
            let n = client.mark_notification_read(id).await?;
            println!("Notification {} marked as read", n.id);
        },
        Command::ReadAll => {
            let result = client.mark_all_notifications_read().await?;
            println!("{} notifications marked as read", result.updated);
        },
        Command::Watch { order_ids } => watch(&args.ws, args.token, order_ids).await?,
    }
    Ok(())
}

async fn pay(client: &OrderServerClient, order_id: OrderId, simulate_with: Option<String>) -> Result<()> {
    let order = client.order(&order_id).await?;
    let paid = match simulate_with {
        Some(secret) => {
            let widget = SimulatedCheckout::new(Secret::new(secret));
            PaymentFlow::new(client, &widget).pay(&order).await
        },
        None => PaymentFlow::new(client, &PromptCheckout).pay(&order).await,
    }
    .map_err(|e| anyhow!("Payment failed at the {} step. {e}", e.step()))?;
    println!("Order {} is {} and {}", paid.order_id, paid.status, paid.payment_status);
    Ok(())
}

async fn watch(url: &str, token: Option<String>, order_ids: Vec<String>) -> Result<()> {
    let mut config = ChannelConfig::new(url);
    if let Some(token) = token {
        config = config.with_access_token(token);
    }
    let channel = TrackingChannel::connect(config).await?;
    let print = handler(|msg| println!("{}", format_event(msg)));
    for event in [ORDER_UPDATE, PAYMENT_UPDATE, NOTIFICATION_NEW, ERROR] {
        channel.on(event, Arc::clone(&print));
    }
    for order_id in order_ids {
        channel.subscribe(OrderId::from(order_id))?;
    }
    println!("Watching {} order(s). Press Ctrl-C to stop.", channel.subscriptions().len());
    let mut state = channel.state_changes();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted. Closing the tracking channel.");
            channel.disconnect().await;
            Ok(())
        },
        _ = state.wait_for(|s| *s == ChannelState::Disconnected) => {
            Err(anyhow!("Lost the connection to {url} and could not reconnect"))
        },
    }
}
