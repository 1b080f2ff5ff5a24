// src/api/stripe_client.rs
//
// Minimal client for the Stripe Checkout API (https://api.stripe.com).
// Authorization: Bearer secret key; request bodies are form-encoded.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;

use crate::models::Product;

const STRIPE_API_BASE: &str = "https://api.stripe.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stripe api error status={status} body={body}")]
    Api { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("price not representable in minor units")]
    InvalidAmount,
}

/// Everything Stripe needs to build one single-quantity checkout session.
#[derive(Debug)]
pub struct CheckoutSessionRequest<'a> {
    pub product: &'a Product,
    pub customer_email: &'a str,
    pub customer_name: Option<&'a str>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionResponse {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Converts a decimal price to the processor's minor-unit integer.
/// `Decimal::round` resolves halves to even.
pub fn unit_amount_from_price(price: Decimal) -> Option<i64> {
    (price * Decimal::ONE_HUNDRED).round().to_i64()
}

/// Form parameters for `POST /v1/checkout/sessions`. Kept separate from the
/// request itself so the encoding is testable without a network.
pub fn session_form_params(
    req: &CheckoutSessionRequest<'_>,
) -> Result<Vec<(String, String)>, StripeError> {
    let unit_amount =
        unit_amount_from_price(req.product.price).ok_or(StripeError::InvalidAmount)?;

    let mut params: Vec<(String, String)> = vec![
        ("mode".into(), "payment".into()),
        ("payment_method_types[0]".into(), "card".into()),
        ("line_items[0][quantity]".into(), "1".into()),
        ("line_items[0][price_data][currency]".into(), "usd".into()),
        (
            "line_items[0][price_data][unit_amount]".into(),
            unit_amount.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]".into(),
            req.product.title.clone(),
        ),
        ("success_url".into(), req.success_url.clone()),
        ("cancel_url".into(), req.cancel_url.clone()),
        ("customer_email".into(), req.customer_email.to_string()),
        ("metadata[productId]".into(), req.product.id.to_string()),
        ("metadata[productTitle]".into(), req.product.title.clone()),
        (
            "metadata[customerName]".into(),
            req.customer_name.unwrap_or_default().to_string(),
        ),
        ("allow_promotion_codes".into(), "true".into()),
        ("billing_address_collection".into(), "auto".into()),
    ];

    if let Some(description) = req.product.description.as_deref() {
        if !description.is_empty() {
            params.push((
                "line_items[0][price_data][product_data][description]".into(),
                description.to_string(),
            ));
        }
    }

    if let Some(image_url) = req.product.image_url.as_deref() {
        params.push((
            "line_items[0][price_data][product_data][images][0]".into(),
            image_url.to_string(),
        ));
    }

    Ok(params)
}

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.into(),
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    /// Points the client at a different API host. Tests use this with a mock
    /// server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub async fn create_checkout_session(
        &self,
        req: &CheckoutSessionRequest<'_>,
    ) -> Result<CheckoutSessionResponse, StripeError> {
        let params = session_form_params(req)?;

        let resp = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(StripeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<CheckoutSessionResponse>(&body)
            .map_err(|e| StripeError::InvalidResponse(format!("{e}; body={body}")))
    }
}
