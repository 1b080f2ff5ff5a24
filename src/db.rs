// src/db.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::DataError;
use crate::models::{Product, Purchase, SocialMediaLink};

const PRODUCT_COLUMNS: &str = r#"id, title, description, price, original_price, category,
       image_url, stripe_price_id, custom_link, featured, status, rating,
       downloads, is_free, download_file_url, download_file_url_paid,
       created_at, updated_at"#;

fn map_product(r: &PgRow) -> Product {
    Product {
        id: r.get("id"),
        title: r.get("title"),
        description: r.get("description"),
        price: r.get("price"),
        original_price: r.get("original_price"),
        category: r.get("category"),
        image_url: r.get("image_url"),
        stripe_price_id: r.get("stripe_price_id"),
        custom_link: r.get("custom_link"),
        featured: r.get("featured"),
        status: r.get("status"),
        rating: r.get("rating"),
        downloads: r.get("downloads"),
        is_free: r.get("is_free"),
        download_file_url: r.get("download_file_url"),
        download_file_url_paid: r.get("download_file_url_paid"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

pub async fn list_active_products(pool: &PgPool) -> Result<Vec<Product>, DataError> {
    let rows = sqlx::query(&format!(
        r#"SELECT {PRODUCT_COLUMNS}
           FROM products
           WHERE status = 'active'
           ORDER BY created_at DESC"#,
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(map_product).collect())
}

pub async fn get_active_product(pool: &PgPool, id: Uuid) -> Result<Option<Product>, DataError> {
    let row = sqlx::query(&format!(
        r#"SELECT {PRODUCT_COLUMNS}
           FROM products
           WHERE id = $1 AND status = 'active'"#,
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(map_product))
}

/// Lookup without the status filter. Webhook reconciliation uses this: a sale
/// that completed moments before an admin deactivated the product must still
/// be recorded.
pub async fn get_product(pool: &PgPool, id: Uuid) -> Result<Option<Product>, DataError> {
    let row = sqlx::query(&format!(
        r#"SELECT {PRODUCT_COLUMNS}
           FROM products
           WHERE id = $1"#,
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(map_product))
}

#[derive(Debug)]
pub struct NewPurchase {
    pub product_id: Uuid,
    pub customer_email: Option<String>,
    pub stripe_session_id: String,
    pub stripe_payment_intent_id: Option<String>,
    pub amount_paid: Option<Decimal>,
    pub download_expires_at: DateTime<Utc>,
}

/// Inserts a purchase exactly once per checkout session.
///
/// The processor redelivers events, so the session id carries a UNIQUE
/// constraint and a conflicting insert is a successful no-op. Returns the new
/// row id, or `None` when the session was already recorded — callers must
/// skip the per-sale side effects (download counter, email) in that case.
pub async fn insert_purchase_once(
    pool: &PgPool,
    purchase: &NewPurchase,
) -> Result<Option<Uuid>, DataError> {
    let row = sqlx::query(
        r#"INSERT INTO purchases
               (product_id, customer_email, stripe_session_id,
                stripe_payment_intent_id, amount_paid, status, download_expires_at)
           VALUES ($1, $2, $3, $4, $5, 'completed', $6)
           ON CONFLICT (stripe_session_id) DO NOTHING
           RETURNING id"#,
    )
    .bind(purchase.product_id)
    .bind(&purchase.customer_email)
    .bind(&purchase.stripe_session_id)
    .bind(&purchase.stripe_payment_intent_id)
    .bind(purchase.amount_paid)
    .bind(purchase.download_expires_at)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.get("id")))
}

pub async fn increment_product_downloads(pool: &PgPool, product_id: Uuid) -> Result<(), DataError> {
    sqlx::query("UPDATE products SET downloads = downloads + 1, updated_at = NOW() WHERE id = $1")
        .bind(product_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// `completed` -> `payment_confirmed`. The status guard keeps the transition
/// one-way: a redelivered event against a disputed or failed purchase matches
/// zero rows.
pub async fn confirm_payment(pool: &PgPool, payment_intent_id: &str) -> Result<u64, DataError> {
    let result = sqlx::query(
        r#"UPDATE purchases
           SET status = 'payment_confirmed', updated_at = NOW()
           WHERE stripe_payment_intent_id = $1 AND status = 'completed'"#,
    )
    .bind(payment_intent_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// `completed` -> `payment_failed`. A purchase that was already confirmed
/// stays confirmed; post-confirmation problems arrive as disputes.
pub async fn fail_payment(pool: &PgPool, payment_intent_id: &str) -> Result<u64, DataError> {
    let result = sqlx::query(
        r#"UPDATE purchases
           SET status = 'payment_failed', updated_at = NOW()
           WHERE stripe_payment_intent_id = $1 AND status = 'completed'"#,
    )
    .bind(payment_intent_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Disputes can arrive before or after confirmation; `disputed` is terminal.
pub async fn mark_disputed(pool: &PgPool, charge_id: &str) -> Result<u64, DataError> {
    let result = sqlx::query(
        r#"UPDATE purchases
           SET status = 'disputed', updated_at = NOW()
           WHERE stripe_session_id = $1
             AND status IN ('completed', 'payment_confirmed')"#,
    )
    .bind(charge_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

fn map_purchase(r: &PgRow) -> Purchase {
    Purchase {
        id: r.get("id"),
        product_id: r.get("product_id"),
        customer_email: r.get("customer_email"),
        stripe_session_id: r.get("stripe_session_id"),
        stripe_payment_intent_id: r.get("stripe_payment_intent_id"),
        amount_paid: r.get("amount_paid"),
        status: r.get("status"),
        download_expires_at: r.get("download_expires_at"),
        download_count: r.get("download_count"),
        max_downloads: r.get("max_downloads"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

pub async fn get_purchase_with_product(
    pool: &PgPool,
    session_id: &str,
) -> Result<Option<(Purchase, Product)>, DataError> {
    let row = sqlx::query(
        r#"SELECT pu.id, pu.product_id, pu.customer_email, pu.stripe_session_id,
                  pu.stripe_payment_intent_id, pu.amount_paid, pu.status,
                  pu.download_expires_at, pu.download_count, pu.max_downloads,
                  pu.created_at, pu.updated_at,
                  pr.title AS pr_title, pr.description AS pr_description,
                  pr.price AS pr_price, pr.original_price AS pr_original_price,
                  pr.category AS pr_category, pr.image_url AS pr_image_url,
                  pr.stripe_price_id AS pr_stripe_price_id,
                  pr.custom_link AS pr_custom_link, pr.featured AS pr_featured,
                  pr.status AS pr_status, pr.rating AS pr_rating,
                  pr.downloads AS pr_downloads, pr.is_free AS pr_is_free,
                  pr.download_file_url AS pr_download_file_url,
                  pr.download_file_url_paid AS pr_download_file_url_paid,
                  pr.created_at AS pr_created_at, pr.updated_at AS pr_updated_at
           FROM purchases pu
           JOIN products pr ON pr.id = pu.product_id
           WHERE pu.stripe_session_id = $1
             AND pu.status IN ('completed', 'payment_confirmed')"#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| {
        let purchase = map_purchase(&r);
        let product = Product {
            id: r.get("product_id"),
            title: r.get("pr_title"),
            description: r.get("pr_description"),
            price: r.get("pr_price"),
            original_price: r.get("pr_original_price"),
            category: r.get("pr_category"),
            image_url: r.get("pr_image_url"),
            stripe_price_id: r.get("pr_stripe_price_id"),
            custom_link: r.get("pr_custom_link"),
            featured: r.get("pr_featured"),
            status: r.get("pr_status"),
            rating: r.get("pr_rating"),
            downloads: r.get("pr_downloads"),
            is_free: r.get("pr_is_free"),
            download_file_url: r.get("pr_download_file_url"),
            download_file_url_paid: r.get("pr_download_file_url_paid"),
            created_at: r.get("pr_created_at"),
            updated_at: r.get("pr_updated_at"),
        };
        (purchase, product)
    }))
}

/// Claims one download slot as a single conditional update.
///
/// The bound `download_count < max_downloads` lives in the WHERE clause, so
/// two concurrent redemptions of the last slot serialize at the row lock and
/// exactly one of them gets a row back. Returns the post-claim
/// `(download_count, max_downloads)`, or `None` when the slot is gone
/// (exhausted or expired since the caller's read).
pub async fn claim_download(
    pool: &PgPool,
    purchase_id: Uuid,
) -> Result<Option<(i32, i32)>, DataError> {
    let row = sqlx::query(
        r#"UPDATE purchases
           SET download_count = download_count + 1, updated_at = NOW()
           WHERE id = $1
             AND status IN ('completed', 'payment_confirmed')
             AND download_count < max_downloads
             AND download_expires_at > NOW()
           RETURNING download_count, max_downloads"#,
    )
    .bind(purchase_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| (r.get("download_count"), r.get("max_downloads"))))
}

/// Records a free-tier grant. The relation is optional; when it has not been
/// provisioned the grant is simply not recorded. Returns whether a row was
/// written.
pub async fn insert_free_download(
    pool: &PgPool,
    product_id: Uuid,
    email: &str,
    download_link: &str,
    expires_at: DateTime<Utc>,
) -> Result<bool, DataError> {
    let result = sqlx::query(
        r#"INSERT INTO free_downloads (product_id, email, download_link, expires_at)
           VALUES ($1, $2, $3, $4)"#,
    )
    .bind(product_id)
    .bind(email)
    .bind(download_link)
    .bind(expires_at)
    .execute(pool)
    .await;

    match result.map_err(DataError::from) {
        Ok(_) => Ok(true),
        Err(DataError::RelationMissing) => {
            log::warn!("free_downloads relation missing, skipping record");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Social links live in an optional relation; absence means an empty list.
pub async fn list_social_links(pool: &PgPool) -> Result<Vec<SocialMediaLink>, DataError> {
    let result = sqlx::query("SELECT platform, url FROM social_media_links ORDER BY platform")
        .fetch_all(pool)
        .await;

    match result.map_err(DataError::from) {
        Ok(rows) => Ok(rows
            .into_iter()
            .map(|r| SocialMediaLink {
                platform: r.get("platform"),
                url: r.get("url"),
            })
            .collect()),
        Err(DataError::RelationMissing) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}
