// src/api/downloads.rs

use actix_web::{HttpResponse, get, post, web};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::Product;
use crate::{AppState, db};

/// Free download links stay valid for a day.
const FREE_LINK_VALIDITY_HOURS: i64 = 24;

#[derive(Debug, Serialize, ToSchema)]
pub struct DownloadResponse {
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
    pub product: Product,
    #[serde(rename = "downloadsRemaining")]
    pub downloads_remaining: i32,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

/// Redeems one download against a recorded purchase. The three rejection
/// codes are distinct on purpose: 404 never existed (or has no file), 410
/// existed but elapsed, 429 existed but is used up.
#[utoipa::path(
    get,
    path = "/download/{session_id}",
    tag = "downloads",
    params(("session_id" = String, Path, description = "Payment-processor session id")),
    responses(
        (status = 200, description = "Download granted", body = DownloadResponse),
        (status = 404, description = "Purchase not found or no file available"),
        (status = 410, description = "Download link expired"),
        (status = 429, description = "Download limit exceeded")
    )
)]
#[get("/download/{session_id}")]
pub async fn redeem_download(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let session_id = path.into_inner();

    let (purchase, product) = db::get_purchase_with_product(&state.pool, &session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Purchase not found".into()))?;

    if Utc::now() > purchase.download_expires_at {
        return Err(ApiError::Gone("Download link has expired".into()));
    }

    if purchase.download_count >= purchase.max_downloads {
        return Err(ApiError::LimitExceeded("Download limit exceeded".into()));
    }

    let download_url = product
        .download_file_url_paid
        .clone()
        .or_else(|| product.download_file_url.clone())
        .ok_or_else(|| ApiError::NotFound("Download file not available".into()))?;

    // The conditional update is the only thing that consumes a slot; losing
    // the race for the last one surfaces as the same limit error.
    let (download_count, max_downloads) = db::claim_download(&state.pool, purchase.id)
        .await?
        .ok_or_else(|| ApiError::LimitExceeded("Download limit exceeded".into()))?;

    log::info!(
        "download {download_count}/{max_downloads} redeemed for session {session_id}"
    );

    Ok(HttpResponse::Ok().json(DownloadResponse {
        download_url,
        product,
        downloads_remaining: max_downloads - download_count,
        expires_at: purchase.download_expires_at,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FreeDownloadRequest {
    pub product_id: String,
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FreeDownloadResponse {
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

/// Unpaid fulfillment path for free products: no payment session, just an
/// email-gated link. The grant record lives in an optional relation, so a
/// deployment without it still hands out the link.
#[utoipa::path(
    post,
    path = "/api/free-download",
    tag = "downloads",
    request_body = FreeDownloadRequest,
    responses(
        (status = 200, description = "Download link issued", body = FreeDownloadResponse),
        (status = 400, description = "Invalid input or product is not free"),
        (status = 404, description = "Product not found or no file available")
    )
)]
#[post("/free-download")]
pub async fn free_download(
    state: web::Data<AppState>,
    payload: web::Json<FreeDownloadRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();

    let email = payload.email.trim().to_string();
    if !email.contains('@') || !email.contains('.') {
        return Err(ApiError::BadRequest("Email is required".into()));
    }

    let product_id = Uuid::parse_str(payload.product_id.trim())
        .map_err(|_| ApiError::BadRequest("invalid product id".into()))?;

    let product = db::get_active_product(&state.pool, product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".into()))?;

    if !product.is_free {
        return Err(ApiError::BadRequest("Product is not free".into()));
    }

    let download_url = product
        .download_file_url
        .clone()
        .ok_or_else(|| ApiError::NotFound("Download file not available".into()))?;

    let expires_at = Utc::now() + Duration::hours(FREE_LINK_VALIDITY_HOURS);

    db::insert_free_download(&state.pool, product_id, &email, &download_url, expires_at).await?;
    db::increment_product_downloads(&state.pool, product_id).await?;

    Ok(HttpResponse::Ok().json(FreeDownloadResponse {
        download_url,
        expires_at,
    }))
}
