pub mod api;
pub mod db;
pub mod docs;
pub mod error;
pub mod mailer;
pub mod models;

use sqlx::PgPool;

use crate::api::stripe_client::StripeClient;
use crate::mailer::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub stripe: StripeClient,
    pub mailer: Option<Mailer>,
    pub webhook_secret: String,
    pub site_base_url: String,
}
