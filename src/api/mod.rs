pub mod checkout;
pub mod downloads;
pub mod products;
pub mod stripe_client;
pub mod webhooks_stripe;
