// src/models.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = f64)]
    pub price: Decimal,
    #[schema(value_type = Option<f64>)]
    pub original_price: Option<Decimal>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub stripe_price_id: Option<String>,
    pub custom_link: Option<String>,
    pub featured: bool,
    pub status: String, // active | inactive
    #[schema(value_type = f64)]
    pub rating: Decimal,
    pub downloads: i32,
    pub is_free: bool,
    pub download_file_url: Option<String>,
    pub download_file_url_paid: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Purchase {
    pub id: Uuid,
    pub product_id: Uuid,
    pub customer_email: Option<String>,
    pub stripe_session_id: String,
    pub stripe_payment_intent_id: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub amount_paid: Option<Decimal>,
    pub status: String, // completed | payment_confirmed | payment_failed | disputed
    pub download_expires_at: DateTime<Utc>,
    pub download_count: i32,
    pub max_downloads: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SocialMediaLink {
    pub platform: String,
    pub url: String,
}
