// src/api/checkout.rs

use actix_web::{HttpResponse, post, web};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::stripe_client::CheckoutSessionRequest;
use crate::error::ApiError;
use crate::{AppState, db};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    pub product_id: String,
    pub customer_email: String,
    #[serde(default)]
    pub customer_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateCheckoutResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Creates a payment session for a paid product and returns its reference.
/// Nothing is persisted here: the purchase row only exists once the processor
/// confirms completion over the webhook, so an abandoned checkout leaves no
/// trace.
#[utoipa::path(
    post,
    path = "/api/create-checkout-session",
    tag = "checkout",
    request_body = CreateCheckoutRequest,
    responses(
        (status = 200, description = "Session created", body = CreateCheckoutResponse),
        (status = 400, description = "Invalid input, free product, or non-positive price"),
        (status = 404, description = "Product not found or inactive"),
        (status = 500, description = "Payment processor failure")
    )
)]
#[post("/create-checkout-session")]
pub async fn create_checkout_session(
    state: web::Data<AppState>,
    payload: web::Json<CreateCheckoutRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();

    if payload.product_id.trim().is_empty() {
        return Err(ApiError::BadRequest("Product ID is required".into()));
    }

    let email = payload.customer_email.trim().to_string();
    if !email.contains('@') || !email.contains('.') {
        return Err(ApiError::BadRequest("Customer email is required".into()));
    }

    let product_id = Uuid::parse_str(payload.product_id.trim())
        .map_err(|_| ApiError::BadRequest("invalid product id".into()))?;

    let product = db::get_active_product(&state.pool, product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".into()))?;

    if product.is_free {
        return Err(ApiError::BadRequest(
            "Cannot create checkout for free product".into(),
        ));
    }

    if product.price <= Decimal::ZERO {
        return Err(ApiError::BadRequest("Invalid product price".into()));
    }

    let request = CheckoutSessionRequest {
        product: &product,
        customer_email: &email,
        customer_name: payload.customer_name.as_deref(),
        success_url: format!(
            "{}/success?session_id={{CHECKOUT_SESSION_ID}}",
            state.site_base_url
        ),
        cancel_url: format!("{}/checkout?product={}", state.site_base_url, product.id),
    };

    let session = state
        .stripe
        .create_checkout_session(&request)
        .await
        .map_err(|e| {
            log::error!("stripe session creation failed for product {}: {e}", product.id);
            ApiError::Payment {
                details: e.to_string(),
            }
        })?;

    log::info!(
        "checkout session {} created for product {}",
        session.id,
        product.id
    );

    Ok(HttpResponse::Ok().json(CreateCheckoutResponse {
        session_id: session.id,
    }))
}
