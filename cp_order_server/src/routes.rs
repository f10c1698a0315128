//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers never block. Everything that touches the database or the payment provider is awaited, so worker threads
//! keep serving other requests in the meantime.
use actix_web::{get, web, HttpResponse, Responder};
use cp_order_engine::{
    db_types::{CartSnapshot, Order, OrderId, Role},
    order_objects::OrderQueryFilter,
    payment_objects::PaymentVerification,
    traits::{NotificationManagement, OrderManagement, PaymentManagement},
    NotificationApi,
    OrderFlowApi,
    PaymentApi,
};
use log::*;

use crate::{
    auth::JwtClaims,
    data_objects::{
        CancelOrderParams,
        InitiatePaymentParams,
        MarkAllReadResult,
        NotificationList,
        NotificationQuery,
        UpdateStatusParams,
    },
    errors::ServerError,
    integrations::ServerPaymentProvider,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:expr),*]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:path),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:path),+ where requires [$($roles:expr),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

pub type ServerPaymentApi<A> = PaymentApi<A, ServerPaymentProvider>;

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------

route!(my_orders => Get "/orders" impl OrderManagement, NotificationManagement where requires [Role::User]);
/// Authenticated users fetch their own orders, newest first. The user id is taken from the access token.
pub async fn my_orders<A>(claims: JwtClaims, api: web::Data<OrderFlowApi<A>>) -> Result<HttpResponse, ServerError>
where A: OrderManagement + NotificationManagement {
    debug!("💻️ GET my_orders for {}", claims.sub);
    let orders = api.orders_for_user(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(create_order => Post "/orders" impl OrderManagement, NotificationManagement where requires [Role::User]);
/// Submits a checkout. The cart snapshot is priced on the server; any totals the client calculated are ignored.
pub async fn create_order<A>(
    claims: JwtClaims,
    body: web::Json<CartSnapshot>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: OrderManagement + NotificationManagement,
{
    let cart = body.into_inner();
    debug!("💻️ POST create_order for {} with {} items", claims.sub, cart.items.len());
    let order = api.create_order(claims.user_id(), cart).await.map_err(|e| {
        debug!("💻️ Could not create order. {e}");
        e
    })?;
    Ok(HttpResponse::Created().json(order))
}

route!(order_by_id => Get "/orders/{order_id}" impl OrderManagement, NotificationManagement where requires [Role::User]);
/// Fetches a single order. Users only see their own orders; staff see every order.
pub async fn order_by_id<A>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: OrderManagement + NotificationManagement,
{
    let order_id = path.into_inner();
    debug!("💻️ GET order_by_id({order_id}) for {}", claims.sub);
    let order = fetch_visible_order(&claims, &order_id, api.as_ref()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order_status => Patch "/orders/{order_id}/status" impl OrderManagement, NotificationManagement where requires [Role::Staff]);
/// Moves an order along the fulfilment pipeline. Only the next stage, `CANCELLED` or `RETURNED` are accepted; anything
/// else is answered with a 409.
pub async fn update_order_status<A>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<UpdateStatusParams>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: OrderManagement + NotificationManagement,
{
    let order_id = path.into_inner();
    let params = body.into_inner();
    info!("💻️ {} is moving order {order_id} to {}", claims.sub, params.status);
    let order = api.update_status(&order_id, params.status, params.note()).await.map_err(|e| {
        debug!("💻️ Could not update the status of {order_id}. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/orders/{order_id}/cancel" impl OrderManagement, NotificationManagement where requires [Role::User]);
/// Cancels an order. Customers can cancel their own orders; staff can cancel any order. A reason is required.
pub async fn cancel_order<A>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<CancelOrderParams>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: OrderManagement + NotificationManagement,
{
    let order_id = path.into_inner();
    let CancelOrderParams { reason } = body.into_inner();
    info!("💻️ {} is cancelling order {order_id}. Reason: {reason}", claims.sub);
    let _ = fetch_visible_order(&claims, &order_id, api.as_ref()).await?;
    let order = api.cancel_order(&order_id, &reason).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(track_order => Get "/orders/{order_id}/track" impl OrderManagement, NotificationManagement where requires [Role::User]);
/// The tracking log of an order, oldest entry first.
pub async fn track_order<A>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: OrderManagement + NotificationManagement,
{
    let order_id = path.into_inner();
    trace!("💻️ GET track_order({order_id}) for {}", claims.sub);
    let _ = fetch_visible_order(&claims, &order_id, api.as_ref()).await?;
    let tracking = api.track(&order_id).await?;
    Ok(HttpResponse::Ok().json(tracking))
}

route!(orders_search => Get "/search/orders" impl OrderManagement, NotificationManagement where requires [Role::Staff]);
pub async fn orders_search<A>(
    query: web::Query<OrderQueryFilter>,
    api: web::Data<OrderFlowApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: OrderManagement + NotificationManagement,
{
    debug!("💻️ GET orders search for [{query}]");
    let orders = api.search_orders(query.into_inner()).await.map_err(|e| {
        debug!("💻️ Could not fetch orders. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(orders))
}

/// Orders that belong to someone else are reported as missing, so that order numbers can't be probed.
async fn fetch_visible_order<A>(
    claims: &JwtClaims,
    order_id: &OrderId,
    api: &OrderFlowApi<A>,
) -> Result<Order, ServerError>
where
    A: OrderManagement + NotificationManagement,
{
    let not_found = || ServerError::NoRecordFound(format!("Order {order_id} does not exist"));
    let order = api.fetch_order(order_id).await?.ok_or_else(not_found)?;
    if claims.is_staff() || order.is_owned_by(claims.user_id()) {
        Ok(order)
    } else {
        warn!("💻️ {} tried to access order {order_id}, which belongs to someone else", claims.sub);
        Err(not_found())
    }
}

//----------------------------------------------   Payments  ----------------------------------------------------

route!(initiate_payment => Post "/orders/{order_id}/payment/initiate" impl OrderManagement, PaymentManagement, NotificationManagement where requires [Role::User]);
/// Step 1 of the payment flow. Only the owner of the order can pay for it.
///
/// The response carries everything the checkout widget needs: the provider order id, the amount and currency, and
/// the provider's public key id.
pub async fn initiate_payment<A>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<InitiatePaymentParams>,
    orders: web::Data<OrderFlowApi<A>>,
    payments: web::Data<ServerPaymentApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: OrderManagement + PaymentManagement + NotificationManagement,
{
    let order_id = path.into_inner();
    let InitiatePaymentParams { amount } = body.into_inner();
    let order = orders.fetch_order(&order_id).await?;
    if !order.as_ref().is_some_and(|o| o.is_owned_by(claims.user_id())) {
        return Err(ServerError::NoRecordFound(format!("Order {order_id} does not exist")));
    }
    info!("💻️ {} is starting a payment of {amount} for {order_id}", claims.sub);
    let initiation = payments.initiate_payment(&order_id, amount).await.map_err(|e| {
        debug!("💻️ Could not initiate a payment for {order_id}. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(initiation))
}

route!(verify_payment => Post "/orders/payment/verify" impl OrderManagement, PaymentManagement, NotificationManagement where requires [Role::User]);
/// Step 3 of the payment flow. The body is exactly what the checkout widget returned. A bad signature is answered with
/// a 400 and leaves the order untouched.
pub async fn verify_payment<A>(
    claims: JwtClaims,
    body: web::Json<PaymentVerification>,
    orders: web::Data<OrderFlowApi<A>>,
    payments: web::Data<ServerPaymentApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: OrderManagement + PaymentManagement + NotificationManagement,
{
    let verification = body.into_inner();
    debug!("💻️ {} is verifying payment {} for {}", claims.sub, verification.payment_id, verification.provider_order_id);
    let intent = payments.fetch_intent(&verification.provider_order_id).await?;
    let order = orders.fetch_order(&intent.order_id).await?;
    if !order.as_ref().is_some_and(|o| o.is_owned_by(claims.user_id())) {
        warn!("💻️ {} tried to verify a payment for {}, which is not theirs", claims.sub, intent.order_id);
        return Err(ServerError::NoRecordFound(format!(
            "No payment intent exists for provider order {}",
            verification.provider_order_id
        )));
    }
    let order = payments.verify_payment(verification).await.map_err(|e| {
        warn!("💻️ Payment verification for {} failed. {e}", intent.order_id);
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Notifications  ----------------------------------------------------

route!(my_notifications => Get "/notifications" impl NotificationManagement where requires [Role::User]);
pub async fn my_notifications<A>(
    claims: JwtClaims,
    query: web::Query<NotificationQuery>,
    api: web::Data<NotificationApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: NotificationManagement,
{
    trace!("💻️ GET my_notifications for {}", claims.sub);
    let notifications = api.notifications_for_user(claims.user_id(), query.unread_only).await?;
    let unread_count = api.unread_count(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(NotificationList { unread_count, notifications }))
}

route!(mark_notification_read => Patch "/notifications/{id}/read" impl NotificationManagement where requires [Role::User]);
pub async fn mark_notification_read<A>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<NotificationApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: NotificationManagement,
{
    let id = path.into_inner();
    let notification = api.mark_read(claims.user_id(), id).await?;
    Ok(HttpResponse::Ok().json(notification))
}

route!(mark_all_notifications_read => Patch "/notifications/read-all" impl NotificationManagement where requires [Role::User]);
pub async fn mark_all_notifications_read<A>(
    claims: JwtClaims,
    api: web::Data<NotificationApi<A>>,
) -> Result<HttpResponse, ServerError>
where
    A: NotificationManagement,
{
    let updated = api.mark_all_read(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(MarkAllReadResult { updated }))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
#[cfg(feature = "razorpay")]
pub use webhooks::*;

#[cfg(feature = "razorpay")]
mod webhooks {
    use actix_web::{web, HttpResponse};
    use cp_order_engine::{
        traits::{NotificationManagement, OrderManagement, PaymentManagement},
        PaymentApiError,
    };
    use log::*;
    use razorpay_tools::WebhookEvent;

    use super::ServerPaymentApi;
    use crate::{data_objects::JsonResponse, errors::ServerError};

    route!(razorpay_webhook => Post "/razorpay" impl OrderManagement, PaymentManagement, NotificationManagement);
    /// Payment events pushed by Razorpay. The HMAC middleware has already checked the body signature.
    ///
    /// Anything the server can't act on is acknowledged with `success: false`, so that the provider does not retry it.
    /// Only backend failures produce an error status, which makes the provider try again later.
    pub async fn razorpay_webhook<A>(
        body: web::Json<WebhookEvent>,
        payments: web::Data<ServerPaymentApi<A>>,
    ) -> Result<HttpResponse, ServerError>
    where
        A: OrderManagement + PaymentManagement + NotificationManagement,
    {
        let event = body.into_inner();
        info!("💻️ Received Razorpay webhook: {}", event.event);
        let Some(payment) = event.payment() else {
            debug!("💻️ Webhook {} carries no payment. Ignoring it.", event.event);
            return Ok(HttpResponse::Ok().json(JsonResponse::failure("No payment in event")));
        };
        let Some(provider_order_id) = payment.order_id.as_deref() else {
            debug!("💻️ Payment {} is not linked to an order. Ignoring it.", payment.id);
            return Ok(HttpResponse::Ok().json(JsonResponse::failure("Payment has no order id")));
        };
        let result = match event.event.as_str() {
            WebhookEvent::PAYMENT_CAPTURED => payments.capture_from_webhook(provider_order_id, &payment.id).await,
            WebhookEvent::PAYMENT_FAILED => payments.fail_from_webhook(provider_order_id, Some(payment.id.clone())).await,
            other => {
                debug!("💻️ Ignoring webhook event {other}");
                return Ok(HttpResponse::Ok().json(JsonResponse::failure(format!("Unhandled event {other}"))));
            },
        };
        match result {
            Ok(order) => {
                let msg = format!("Order {} payment status is {}", order.order_id, order.payment_status);
                info!("💻️ {msg}");
                Ok(HttpResponse::Ok().json(JsonResponse::success(msg)))
            },
            Err(PaymentApiError::StorageError(e)) => Err(ServerError::BackendError(e)),
            Err(e) => {
                warn!("💻️ Could not apply webhook {} for {provider_order_id}. {e}", event.event);
                Ok(HttpResponse::Ok().json(JsonResponse::failure(e.to_string())))
            },
        }
    }
}
