use std::sync::Arc;

use cp_common::Money;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::RazorpayConfig,
    data_objects::{NewRazorpayOrder, RazorpayOrder, RazorpayPayment},
    helpers::verify_checkout_signature,
    RazorpayApiError,
};

#[derive(Clone)]
pub struct RazorpayApi {
    config: RazorpayConfig,
    client: Arc<Client>,
}

impl RazorpayApi {
    pub fn new(config: RazorpayConfig) -> Result<Self, RazorpayApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| RazorpayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn key_id(&self) -> &str {
        self.config.key_id.as_str()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url.trim_end_matches('/'))
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, RazorpayApiError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {method} {url}");
        let mut req =
            self.client.request(method, url).basic_auth(&self.config.key_id, Some(self.config.key_secret.reveal()));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| RazorpayApiError::RestRequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("💳️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| RazorpayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| RazorpayApiError::RestResponseError(e.to_string()))?;
            Err(RazorpayApiError::QueryError { status, message })
        }
    }

    /// Creates a provider-side order that the checkout widget can be opened against.
    pub async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<RazorpayOrder, RazorpayApiError> {
        if amount.value() <= 0 {
            return Err(RazorpayApiError::InvalidAmount(amount.to_string()));
        }
        let body = NewRazorpayOrder {
            amount: amount.value(),
            currency: currency.to_string(),
            receipt: receipt.to_string(),
            notes: Some(serde_json::json!({ "order_id": receipt })),
        };
        debug!("💳️ Creating Razorpay order for {receipt} ({amount})");
        let order = self.rest_query::<RazorpayOrder, _>(Method::POST, "/orders", Some(body)).await?;
        info!("💳️ Created Razorpay order {} for {receipt}", order.id);
        Ok(order)
    }

    pub async fn fetch_order(&self, razorpay_order_id: &str) -> Result<RazorpayOrder, RazorpayApiError> {
        let path = format!("/orders/{razorpay_order_id}");
        self.rest_query::<RazorpayOrder, ()>(Method::GET, &path, None).await
    }

    pub async fn fetch_payment(&self, payment_id: &str) -> Result<RazorpayPayment, RazorpayApiError> {
        let path = format!("/payments/{payment_id}");
        self.rest_query::<RazorpayPayment, ()>(Method::GET, &path, None).await
    }

    pub fn verify_checkout_signature(&self, razorpay_order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_checkout_signature(self.config.key_secret.reveal(), razorpay_order_id, payment_id, signature)
    }

    pub fn webhook_secret(&self) -> &str {
        self.config.webhook_secret.reveal()
    }
}
