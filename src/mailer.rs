// src/mailer.rs
//
// Transactional email. Delivery is best-effort: a failed send is logged and
// never rolls back the purchase that triggered it.

use std::env;

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("message build error: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    /// Builds the mailer from `SMTP_*` variables, `None` when the transport
    /// is not configured.
    pub fn from_env() -> Option<Self> {
        let host = env::var("SMTP_HOST").ok()?;
        let user = env::var("SMTP_USER").ok()?;
        let pass = env::var("SMTP_PASS").ok()?;
        let port: u16 = env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(465);
        let from = env::var("SMTP_FROM").unwrap_or_else(|_| user.clone());

        let from: Mailbox = match from.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                log::error!("invalid SMTP_FROM address: {e}");
                return None;
            }
        };

        let transport = match AsyncSmtpTransport::<Tokio1Executor>::relay(&host) {
            Ok(builder) => builder
                .port(port)
                .credentials(Credentials::new(user, pass))
                .build(),
            Err(e) => {
                log::error!("smtp transport setup failed: {e}");
                return None;
            }
        };

        Some(Self { transport, from })
    }

    pub async fn send(&self, to: &str, subject: &str, html: String) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)?;

        self.transport.send(message).await?;
        Ok(())
    }
}

pub fn purchase_email_html(product_title: &str, download_url: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <h1 style="text-align: center;">Thank you for your purchase!</h1>
  <p style="font-size: 16px;">You have successfully purchased: <strong>{product_title}</strong></p>
  <div style="background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; text-align: center;">
    <h3 style="margin-bottom: 15px;">Download your product:</h3>
    <a href="{download_url}"
       style="background: #e91e63; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px; display: inline-block; font-weight: bold;">
       Download Now
    </a>
  </div>
  <p style="font-size: 14px;">
    This download link expires in 30 days and can be used up to 5 times.
    Please keep this email for future reference.
  </p>
</div>"#
    )
}
