use actix_web::test::TestRequest;
use actix_web::{App, test, web};
use serde_json::json;
use sqlx::Row;
use uuid::Uuid;

use storefront_api::api::downloads::{free_download, redeem_download};
use storefront_api::api::products::social_links;
use storefront_api::db;

mod support;

async fn insert_product(
    pool: &sqlx::PgPool,
    is_free: bool,
    public_file: Option<&str>,
    paid_file: Option<&str>,
) -> Uuid {
    sqlx::query(
        r#"INSERT INTO products
               (title, description, price, status, is_free, download_file_url, download_file_url_paid)
           VALUES ('Test Plan', 'A plan', 20.00, 'active', $1, $2, $3)
           RETURNING id"#,
    )
    .bind(is_free)
    .bind(public_file)
    .bind(paid_file)
    .fetch_one(pool)
    .await
    .expect("insert product")
    .get("id")
}

async fn insert_purchase(
    pool: &sqlx::PgPool,
    product_id: Uuid,
    status: &str,
    expires_interval: &str,
    download_count: i32,
    max_downloads: i32,
) -> (Uuid, String) {
    let session_id = format!("cs_test_{}", Uuid::new_v4());
    let id: Uuid = sqlx::query(&format!(
        r#"INSERT INTO purchases
               (product_id, customer_email, stripe_session_id, stripe_payment_intent_id,
                amount_paid, status, download_expires_at, download_count, max_downloads)
           VALUES ($1, 'buyer@example.com', $2, 'pi_test', 20.00, $3,
                   NOW() + INTERVAL '{expires_interval}', $4, $5)
           RETURNING id"#,
    ))
    .bind(product_id)
    .bind(&session_id)
    .bind(status)
    .bind(download_count)
    .bind(max_downloads)
    .fetch_one(pool)
    .await
    .expect("insert purchase")
    .get("id");

    (id, session_id)
}

async fn download_count(pool: &sqlx::PgPool, purchase_id: Uuid) -> i32 {
    sqlx::query("SELECT download_count FROM purchases WHERE id = $1")
        .bind(purchase_id)
        .fetch_one(pool)
        .await
        .expect("select purchase")
        .get("download_count")
}

#[actix_web::test]
async fn redemption_prefers_paid_file_and_counts_down() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let product_id = insert_product(
        pool,
        false,
        Some("https://files.example/public.pdf"),
        Some("https://files.example/paid.pdf"),
    )
    .await;
    let (purchase_id, session_id) =
        insert_purchase(pool, product_id, "completed", "30 days", 0, 5).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_x", "http://localhost:1"));
    let app =
        test::init_service(App::new().app_data(state.clone()).service(redeem_download)).await;

    let req = TestRequest::get()
        .uri(&format!("/download/{session_id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["downloadUrl"], "https://files.example/paid.pdf");
    assert_eq!(body["downloadsRemaining"], 4);
    assert_eq!(body["product"]["title"], "Test Plan");

    assert_eq!(download_count(pool, purchase_id).await, 1);
}

#[actix_web::test]
async fn confirmed_purchase_is_redeemable() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let product_id =
        insert_product(pool, false, Some("https://files.example/public.pdf"), None).await;
    let (_, session_id) =
        insert_purchase(pool, product_id, "payment_confirmed", "30 days", 0, 5).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_x", "http://localhost:1"));
    let app =
        test::init_service(App::new().app_data(state.clone()).service(redeem_download)).await;

    let req = TestRequest::get()
        .uri(&format!("/download/{session_id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    // No paid-tier file on this product, fall back to the public one.
    assert_eq!(body["downloadUrl"], "https://files.example/public.pdf");
}

#[actix_web::test]
async fn expired_purchase_is_gone() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let product_id =
        insert_product(pool, false, Some("https://files.example/public.pdf"), None).await;
    let (purchase_id, session_id) =
        insert_purchase(pool, product_id, "completed", "-1 days", 0, 5).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_x", "http://localhost:1"));
    let app =
        test::init_service(App::new().app_data(state.clone()).service(redeem_download)).await;

    let req = TestRequest::get()
        .uri(&format!("/download/{session_id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::GONE);

    assert_eq!(download_count(pool, purchase_id).await, 0);
}

#[actix_web::test]
async fn exhausted_purchase_is_rate_limited() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let product_id =
        insert_product(pool, false, Some("https://files.example/public.pdf"), None).await;
    let (purchase_id, session_id) =
        insert_purchase(pool, product_id, "completed", "30 days", 5, 5).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_x", "http://localhost:1"));
    let app =
        test::init_service(App::new().app_data(state.clone()).service(redeem_download)).await;

    let req = TestRequest::get()
        .uri(&format!("/download/{session_id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::TOO_MANY_REQUESTS);

    assert_eq!(download_count(pool, purchase_id).await, 5);
}

#[actix_web::test]
async fn failed_or_unknown_purchases_are_not_found() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let product_id =
        insert_product(pool, false, Some("https://files.example/public.pdf"), None).await;
    let (_, session_id) =
        insert_purchase(pool, product_id, "payment_failed", "30 days", 0, 5).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_x", "http://localhost:1"));
    let app =
        test::init_service(App::new().app_data(state.clone()).service(redeem_download)).await;

    let req = TestRequest::get()
        .uri(&format!("/download/{session_id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

    let req = TestRequest::get()
        .uri("/download/cs_does_not_exist")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn missing_file_does_not_consume_a_slot() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let product_id = insert_product(pool, false, None, None).await;
    let (purchase_id, session_id) =
        insert_purchase(pool, product_id, "completed", "30 days", 0, 5).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_x", "http://localhost:1"));
    let app =
        test::init_service(App::new().app_data(state.clone()).service(redeem_download)).await;

    let req = TestRequest::get()
        .uri(&format!("/download/{session_id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

    assert_eq!(download_count(pool, purchase_id).await, 0);
}

#[actix_web::test]
async fn concurrent_redemptions_cannot_exceed_the_limit() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let product_id =
        insert_product(pool, false, Some("https://files.example/public.pdf"), None).await;
    // One slot left.
    let (purchase_id, _) = insert_purchase(pool, product_id, "completed", "30 days", 4, 5).await;

    let (a, b) = tokio::join!(
        db::claim_download(pool, purchase_id),
        db::claim_download(pool, purchase_id)
    );
    let a = a.expect("claim a");
    let b = b.expect("claim b");

    assert!(
        a.is_some() != b.is_some(),
        "exactly one concurrent claim may win the last slot, got {a:?} and {b:?}"
    );
    assert_eq!(download_count(pool, purchase_id).await, 5);
}

#[actix_web::test]
async fn free_download_works_without_optional_relation() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    // Migrations do not create free_downloads; the grant record is skipped.
    let product_id =
        insert_product(pool, true, Some("https://files.example/free.pdf"), None).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_x", "http://localhost:1"));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .service(web::scope("/api").service(free_download)),
    )
    .await;

    let req = TestRequest::post()
        .uri("/api/free-download")
        .set_json(json!({
            "productId": product_id.to_string(),
            "email": "reader@example.com"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["downloadUrl"], "https://files.example/free.pdf");

    let downloads: i32 = sqlx::query("SELECT downloads FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("select product")
        .get("downloads");
    assert_eq!(downloads, 1);
}

#[actix_web::test]
async fn free_download_rejected_for_paid_product() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;
    let product_id =
        insert_product(pool, false, Some("https://files.example/public.pdf"), None).await;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_x", "http://localhost:1"));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .service(web::scope("/api").service(free_download)),
    )
    .await;

    let req = TestRequest::post()
        .uri("/api/free-download")
        .set_json(json!({
            "productId": product_id.to_string(),
            "email": "reader@example.com"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn social_links_default_to_empty_without_relation() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;

    let state = web::Data::new(support::build_state(pool.clone(), "whsec_x", "http://localhost:1"));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .service(web::scope("/api").service(social_links)),
    )
    .await;

    let req = TestRequest::get().uri("/api/social-links").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!([]));
}
