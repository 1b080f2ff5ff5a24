// src/api/webhooks_stripe.rs
//
// Inbound events from the payment processor. The signature covers the exact
// request bytes, so the handler takes the raw body and parses only after
// verification succeeds.

use actix_web::{HttpRequest, HttpResponse, post, web};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use crate::db::NewPurchase;
use crate::error::DataError;
use crate::{AppState, db, mailer};

type HmacSha256 = Hmac<Sha256>;

/// Tolerated distance between the signature timestamp and our clock; older
/// deliveries are treated as replays.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Purchase records give the customer this long to redeem the download.
const DOWNLOAD_VALIDITY_DAYS: i64 = 30;

#[derive(Debug, PartialEq, Eq)]
pub enum SignatureError {
    Malformed,
    Expired,
    Mismatch,
}

/// Verifies a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`)
/// against the raw request body: HMAC-SHA256 over `"{t}.{body}"` with the
/// shared webhook secret. Comparison is constant-time via `Mac::verify_slice`.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => {
                if let Ok(sig) = hex::decode(value) {
                    candidates.push(sig);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }

    if (Utc::now().timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    for candidate in &candidates {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| SignatureError::Malformed)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        if mac.verify_slice(candidate).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Minor units.
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: CheckoutMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutMetadata {
    #[serde(rename = "productId")]
    pub product_id: Option<String>,
    #[serde(rename = "productTitle")]
    pub product_title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntentObject {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct DisputeObject {
    pub id: String,
    #[serde(default)]
    pub charge: Option<String>,
}

/// The finite set of event kinds the fulfillment workflow reacts to. Each
/// variant carries only what its handler reads; everything else in the
/// processor payload is dropped at the boundary.
#[derive(Debug)]
pub enum WebhookEvent {
    CheckoutCompleted(CheckoutSessionObject),
    PaymentSucceeded(PaymentIntentObject),
    PaymentFailed(PaymentIntentObject),
    ChargeDisputed(DisputeObject),
    Ignored { event_type: String },
}

pub fn parse_event(body: &[u8]) -> Result<WebhookEvent, serde_json::Error> {
    let envelope: EventEnvelope = serde_json::from_slice(body)?;

    Ok(match envelope.event_type.as_str() {
        "checkout.session.completed" => {
            WebhookEvent::CheckoutCompleted(serde_json::from_value(envelope.data.object)?)
        }
        "payment_intent.succeeded" => {
            WebhookEvent::PaymentSucceeded(serde_json::from_value(envelope.data.object)?)
        }
        "payment_intent.payment_failed" => {
            WebhookEvent::PaymentFailed(serde_json::from_value(envelope.data.object)?)
        }
        "charge.dispute.created" => {
            WebhookEvent::ChargeDisputed(serde_json::from_value(envelope.data.object)?)
        }
        _ => WebhookEvent::Ignored {
            event_type: envelope.event_type,
        },
    })
}

#[post("/webhook/stripe")]
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> HttpResponse {
    let Some(signature) = req
        .headers()
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
    else {
        return HttpResponse::BadRequest().json(json!({"error": "invalid signature"}));
    };

    if let Err(e) = verify_signature(&state.webhook_secret, &body, signature) {
        log::warn!("webhook signature rejected: {e:?}");
        return HttpResponse::BadRequest().json(json!({"error": "invalid signature"}));
    }

    let event = match parse_event(&body) {
        Ok(event) => event,
        Err(e) => {
            log::warn!("webhook payload parse error: {e}");
            return HttpResponse::BadRequest().json(json!({"error": "invalid payload"}));
        }
    };

    // Once the signature checks out the delivery is acknowledged no matter
    // what the handlers do; a non-2xx here puts the processor into a
    // redelivery loop.
    match event {
        WebhookEvent::CheckoutCompleted(session) => {
            if let Err(e) = handle_checkout_completed(&state, session).await {
                log::error!("checkout.session.completed handler error: {e}");
            }
        }
        WebhookEvent::PaymentSucceeded(intent) => {
            if let Err(e) = handle_payment_succeeded(&state, &intent).await {
                log::error!("payment_intent.succeeded handler error: {e}");
            }
        }
        WebhookEvent::PaymentFailed(intent) => {
            if let Err(e) = handle_payment_failed(&state, &intent).await {
                log::error!("payment_intent.payment_failed handler error: {e}");
            }
        }
        WebhookEvent::ChargeDisputed(dispute) => {
            if let Err(e) = handle_charge_disputed(&state, &dispute).await {
                log::error!("charge.dispute.created handler error: {e}");
            }
        }
        WebhookEvent::Ignored { event_type } => {
            log::info!("ignoring webhook event kind {event_type}");
        }
    }

    HttpResponse::Ok().json(json!({"received": true}))
}

async fn handle_checkout_completed(
    state: &AppState,
    session: CheckoutSessionObject,
) -> Result<(), DataError> {
    let Some(product_id) = session
        .metadata
        .product_id
        .as_deref()
        .and_then(|s| Uuid::parse_str(s).ok())
    else {
        log::warn!(
            "checkout completed without usable productId metadata, session {}",
            session.id
        );
        return Ok(());
    };

    // A purchase is never recorded against an unknown product.
    let Some(product) = db::get_product(&state.pool, product_id).await? else {
        log::warn!(
            "checkout completed for unknown product {product_id}, session {}",
            session.id
        );
        return Ok(());
    };

    let purchase = NewPurchase {
        product_id,
        customer_email: session.customer_email.clone(),
        stripe_session_id: session.id.clone(),
        stripe_payment_intent_id: session.payment_intent.clone(),
        amount_paid: session.amount_total.map(|minor| Decimal::new(minor, 2)),
        download_expires_at: Utc::now() + Duration::days(DOWNLOAD_VALIDITY_DAYS),
    };

    if db::insert_purchase_once(&state.pool, &purchase).await?.is_none() {
        // Redelivered event: the row, the counter and the email all already
        // happened the first time around.
        log::info!("purchase already recorded for session {}", session.id);
        return Ok(());
    }

    db::increment_product_downloads(&state.pool, product_id).await?;

    let title = session
        .metadata
        .product_title
        .clone()
        .unwrap_or_else(|| product.title.clone());

    match (&state.mailer, session.customer_email.as_deref()) {
        (Some(mailer), Some(email)) => {
            let download_url = format!("{}/download/{}", state.site_base_url, session.id);
            let html = mailer::purchase_email_html(&title, &download_url);
            if let Err(e) = mailer
                .send(email, &format!("Your purchase: {title}"), html)
                .await
            {
                log::error!("fulfillment email to {email} failed: {e}");
            }
        }
        (None, _) => log::info!(
            "mailer disabled, skipping fulfillment email for session {}",
            session.id
        ),
        (_, None) => log::warn!("no customer email on session {}", session.id),
    }

    log::info!(
        "purchase recorded for session {} product {product_id}",
        session.id
    );
    Ok(())
}

async fn handle_payment_succeeded(
    state: &AppState,
    intent: &PaymentIntentObject,
) -> Result<(), DataError> {
    let updated = db::confirm_payment(&state.pool, &intent.id).await?;
    if updated == 0 {
        // The processor does not order deliveries; the completed-checkout
        // event may simply not have arrived yet.
        log::info!("payment_intent.succeeded {} matched no purchase", intent.id);
    } else {
        log::info!("payment confirmed for intent {}", intent.id);
    }
    Ok(())
}

async fn handle_payment_failed(
    state: &AppState,
    intent: &PaymentIntentObject,
) -> Result<(), DataError> {
    let updated = db::fail_payment(&state.pool, &intent.id).await?;
    if updated == 0 {
        log::info!(
            "payment_intent.payment_failed {} matched no purchase",
            intent.id
        );
    } else {
        log::warn!("payment failed for intent {}", intent.id);
    }
    Ok(())
}

async fn handle_charge_disputed(
    state: &AppState,
    dispute: &DisputeObject,
) -> Result<(), DataError> {
    let Some(charge) = dispute.charge.as_deref() else {
        log::warn!("dispute {} carries no charge reference", dispute.id);
        return Ok(());
    };

    let updated = db::mark_disputed(&state.pool, charge).await?;
    if updated == 0 {
        log::info!("dispute {} matched no purchase", dispute.id);
    } else {
        log::warn!("dispute recorded for charge {charge}");
    }
    Ok(())
}
