use std::{fs, path::Path, sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use cp_order_engine::{
    events::{EventHandlers, EventProducers},
    NotificationApi,
    OrderFlowApi,
    PaymentApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    auth::TokenValidator,
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::ServerPaymentProvider,
    middleware::JwtMiddlewareFactory,
    routes::{
        health,
        CancelOrderRoute,
        CreateOrderRoute,
        InitiatePaymentRoute,
        MarkAllNotificationsReadRoute,
        MarkNotificationReadRoute,
        MyNotificationsRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        OrdersSearchRoute,
        TrackOrderRoute,
        UpdateOrderStatusRoute,
        VerifyPaymentRoute,
    },
    tracking::{run_tracking_listener, TrackingContext, TrackingHub},
};
#[cfg(feature = "razorpay")]
use {
    actix_web::dev::Service,
    crate::{
        helpers::get_remote_ip,
        middleware::{HmacMiddlewareFactory, RAZORPAY_SIGNATURE_HEADER},
        routes::RazorpayWebhookRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 128;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    prepare_database_dir(&config.database_url);
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let provider = ServerPaymentProvider::from_config(&config.payments)
        .map_err(|e| ServerError::ConfigurationError(e.to_string()))?;

    let hub = TrackingHub::new();
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hub.event_hooks());
    let producers = handlers.producers();
    handlers.start_handlers();

    let tracking = TrackingContext {
        hub,
        validator: TokenValidator::new(&config.auth),
        orders: OrderFlowApi::new(db.clone(), producers.clone()),
        notifications: NotificationApi::new(db.clone()),
    };
    let ws_addr = format!("{}:{}", config.host, config.ws_port);
    tokio::spawn(async move {
        if let Err(e) = run_tracking_listener(ws_addr, Arc::new(tracking)).await {
            error!("📡️ The tracking hub stopped. {e}");
        }
    });
    let _worker = start_expiry_worker(db.clone(), provider.clone(), producers.clone(), config.payments.intent_ttl);

    let srv = create_server_instance(config, db, provider, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    provider: ServerPaymentProvider,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let (host, port) = (config.host.clone(), config.port);
    info!("💻️ REST API listening on {host}:{port}");
    if cfg!(feature = "razorpay") && !config.payments.webhook_checks {
        warn!("💻️ Razorpay webhook signature checks are DISABLED. Do not run like this in production.");
    }
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone()).with_pricing(config.pricing);
        let payments_api = PaymentApi::new(db.clone(), provider.clone(), producers.clone())
            .with_intent_ttl(config.payments.intent_ttl);
        let notifications_api = NotificationApi::new(db.clone());
        let validator = TokenValidator::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cp::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(notifications_api));
        // Routes that require authentication
        let auth_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(validator))
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(TrackOrderRoute::<SqliteDatabase>::new())
            .service(InitiatePaymentRoute::<SqliteDatabase>::new())
            .service(OrdersSearchRoute::<SqliteDatabase>::new())
            .service(MyNotificationsRoute::<SqliteDatabase>::new())
            .service(MarkAllNotificationsReadRoute::<SqliteDatabase>::new())
            .service(MarkNotificationReadRoute::<SqliteDatabase>::new());
        let app = app.service(health).service(auth_scope);
        #[cfg(feature = "razorpay")]
        let app = {
            let payments = &config.payments;
            let hmac = HmacMiddlewareFactory::new(
                RAZORPAY_SIGNATURE_HEADER,
                payments.webhook_secret.clone(),
                payments.webhook_checks,
            );
            let use_x_forwarded_for = config.use_x_forwarded_for;
            let webhook_scope = web::scope("/webhooks")
                .wrap(hmac)
                .wrap_fn(move |req, srv| {
                    match get_remote_ip(req.request(), use_x_forwarded_for) {
                        Some(ip) => info!("💻️ Webhook call from {ip}"),
                        None => warn!("💻️ Webhook call from an unknown address"),
                    }
                    srv.call(req)
                })
                .service(RazorpayWebhookRoute::<SqliteDatabase>::new());
            app.service(webhook_scope)
        };
        app
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// SQLite creates a missing database file, but not the directory it lives in.
fn prepare_database_dir(url: &str) {
    let path = url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or_default();
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            info!("🗃️ Creating database directory {}", dir.display());
            if let Err(e) = fs::create_dir_all(dir) {
                warn!("🗃️ Could not create {}. {e}", dir.display());
            }
        },
        _ => {},
    }
}
