// src/main.rs
use actix_web::{App, HttpResponse, HttpServer, Responder, web};
use dotenvy::dotenv;
use sqlx::PgPool;
use std::env;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use storefront_api::api::stripe_client::StripeClient;
use storefront_api::mailer::Mailer;
use storefront_api::{AppState, api, docs};

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let stripe_secret_key = env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY required");
    let webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").expect("STRIPE_WEBHOOK_SECRET required");
    let site_base_url =
        env::var("SITE_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

    let mut stripe = StripeClient::new(stripe_secret_key);
    if let Ok(base) = env::var("STRIPE_API_BASE_URL") {
        stripe = stripe.with_api_base(base);
    }

    let mailer = Mailer::from_env();
    if mailer.is_none() {
        log::warn!("SMTP not configured, fulfillment email disabled");
    }

    let state = web::Data::new(AppState {
        pool,
        stripe,
        mailer,
        webhook_secret,
        site_base_url,
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            .service(
                web::scope("/api")
                    .service(api::products::list_products)
                    .service(api::products::get_product)
                    .service(api::products::social_links)
                    .service(api::checkout::create_checkout_session)
                    .service(api::downloads::free_download),
            )
            // Публичные роуты: выдача файлов и вебхуки платёжного провайдера
            .service(api::downloads::redeem_download)
            .service(api::webhooks_stripe::stripe_webhook)
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
