//! Stripe Checkout client.

use async_trait::async_trait;
use serde::Deserialize;

use super::{CheckoutRequest, CheckoutSession, PaymentGateway};
use crate::config::StripeConfig;
use crate::{EcommerceError, Result};

#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(config: &StripeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EcommerceError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }
}

/// Form fields for `POST /v1/checkout/sessions`.
pub(crate) fn session_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("metadata[orderId]".to_string(), request.order_id.to_string()),
    ];
    for (i, line) in request.lines.iter().enumerate() {
        let key = |field: &str| format!("line_items[{i}]{field}");
        form.push((key("[price_data][currency]"), request.currency.clone()));
        form.push((key("[price_data][product_data][name]"), line.name.clone()));
        if let Some(description) = &line.description {
            form.push((key("[price_data][product_data][description]"), description.clone()));
        }
        form.push((key("[price_data][unit_amount]"), line.unit_amount.to_string()));
        form.push((key("[quantity]"), line.quantity.to_string()));
    }
    form
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let resp = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&session_form(request))
            .send()
            .await
            .map_err(|e| EcommerceError::PaymentGateway(format!("request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| EcommerceError::PaymentGateway(format!("reading response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|env| env.error.message)
                .unwrap_or(body);
            tracing::warn!(status = status.as_u16(), order_id = %request.order_id, "checkout session rejected");
            return Err(EcommerceError::PaymentGateway(format!("status {}: {message}", status.as_u16())));
        }

        let session: SessionResponse = serde_json::from_str(&body)
            .map_err(|e| EcommerceError::PaymentGateway(format!("invalid response: {e}")))?;
        let url = session
            .url
            .ok_or_else(|| EcommerceError::PaymentGateway("session has no url".to_string()))?;
        tracing::info!(session_id = %session.id, order_id = %request.order_id, "checkout session created");
        Ok(CheckoutSession { id: session.id, url })
    }
}
