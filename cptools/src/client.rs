use cp_order_engine::{
    db_types::{CartSnapshot, Money, Notification, Order, OrderId, OrderStatusType, OrderTrackingUpdate, PaymentStatus},
    payment_objects::{PaymentInitiation, PaymentVerification},
};
use cp_order_server::data_objects::{
    CancelOrderParams,
    InitiatePaymentParams,
    MarkAllReadResult,
    NotificationList,
    UpdateStatusParams,
};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    RequestBuilder,
    Response,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::payment_flow::PaymentGateway;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid server URL. {0}")]
    InvalidUrl(String),
    #[error("Request failed. {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("The server responded with {status}. {message}")]
    Api { status: u16, message: String },
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Filters for the staff order search. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct OrderSearch {
    pub user_id: Option<String>,
    pub statuses: Vec<OrderStatusType>,
    pub payment_status: Option<PaymentStatus>,
}

impl OrderSearch {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(user_id) = &self.user_id {
            query.push(("user_id", user_id.clone()));
        }
        if !self.statuses.is_empty() {
            let statuses = self.statuses.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(",");
            query.push(("status", statuses));
        }
        if let Some(status) = self.payment_status {
            query.push(("payment_status", status.to_string()));
        }
        query
    }
}

/// A REST client for the order server. Every call under `/api` sends the access token as a bearer token.
pub struct OrderServerClient {
    client: Client,
    server: Url,
    access_token: Option<String>,
}

impl OrderServerClient {
    pub fn new(server: &str, access_token: Option<String>) -> Result<Self, ClientError> {
        let server = Url::parse(server).map_err(|e| ClientError::InvalidUrl(format!("{server}. {e}")))?;
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder().user_agent("CarePoint cptools").default_headers(headers).build()?;
        Ok(Self { client, server, access_token })
    }

    pub fn server(&self) -> &str {
        self.server.as_str()
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.server.join(path).map_err(|e| ClientError::InvalidUrl(format!("{path}. {e}")))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ClientError> {
        let url = self.url(path)?;
        trace!("GET {url}");
        let res = self.authorized(self.client.get(url).query(query)).send().await?;
        parse_response(res).await
    }

    async fn send_json<B, T>(&self, method: reqwest::Method, path: &str, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        trace!("{method} {url}");
        let mut builder = self.client.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let res = self.authorized(builder).send().await?;
        parse_response(res).await
    }

    pub async fn health(&self) -> Result<String, ClientError> {
        let res = self.client.get(self.url("/health")?).send().await?;
        Ok(res.text().await?)
    }

    pub async fn my_orders(&self) -> Result<Vec<Order>, ClientError> {
        self.get("/api/orders", &[]).await
    }

    pub async fn create_order(&self, cart: &CartSnapshot) -> Result<Order, ClientError> {
        self.send_json(reqwest::Method::POST, "/api/orders", Some(cart)).await
    }

    pub async fn order(&self, order_id: &OrderId) -> Result<Order, ClientError> {
        self.get(&format!("/api/orders/{order_id}"), &[]).await
    }

    pub async fn update_status(&self, order_id: &OrderId, params: &UpdateStatusParams) -> Result<Order, ClientError> {
        self.send_json(reqwest::Method::PATCH, &format!("/api/orders/{order_id}/status"), Some(params)).await
    }

    pub async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<Order, ClientError> {
        let params = CancelOrderParams { reason: reason.to_string() };
        self.send_json(reqwest::Method::POST, &format!("/api/orders/{order_id}/cancel"), Some(&params)).await
    }

    pub async fn track(&self, order_id: &OrderId) -> Result<Vec<OrderTrackingUpdate>, ClientError> {
        self.get(&format!("/api/orders/{order_id}/track"), &[]).await
    }

    pub async fn search_orders(&self, search: &OrderSearch) -> Result<Vec<Order>, ClientError> {
        self.get("/api/search/orders", &search.query()).await
    }

    pub async fn notifications(&self, unread_only: bool) -> Result<NotificationList, ClientError> {
        self.get("/api/notifications", &[("unread_only", unread_only.to_string())]).await
    }

    pub async fn mark_notification_read(&self, id: i64) -> Result<Notification, ClientError> {
        self.send_json::<(), _>(reqwest::Method::PATCH, &format!("/api/notifications/{id}/read"), None).await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<MarkAllReadResult, ClientError> {
        self.send_json::<(), _>(reqwest::Method::PATCH, "/api/notifications/read-all", None).await
    }
}

impl PaymentGateway for OrderServerClient {
    async fn initiate_payment(&self, order_id: &OrderId, amount: Money) -> Result<PaymentInitiation, ClientError> {
        let params = InitiatePaymentParams { amount };
        self.send_json(reqwest::Method::POST, &format!("/api/orders/{order_id}/payment/initiate"), Some(&params)).await
    }

    async fn verify_payment(&self, verification: &PaymentVerification) -> Result<Order, ClientError> {
        self.send_json(reqwest::Method::POST, "/api/orders/payment/verify", Some(verification)).await
    }
}

async fn parse_response<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res.json::<T>().await?);
    }
    let text = res.text().await?;
    let message = serde_json::from_str::<ErrorBody>(&text).map(|b| b.error).unwrap_or(text);
    debug!("Request failed with {status}. {message}");
    Err(ClientError::Api { status: status.as_u16(), message })
}
