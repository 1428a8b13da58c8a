pub mod templates;

use anyhow::{Context, Result};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::EmailConfig;

const MAX_ATTEMPTS: u32 = 3;

/// Transactional email sender.
///
/// Delivery is attempted up to three times with exponential backoff; each
/// final outcome is recorded in `email_logs`. Callers never see a send
/// failure roll back the business transition that triggered it - the
/// outbox dispatcher owns redelivery.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_name: String,
    from_address: String,
    enabled: bool,
    db: PgPool,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("from_address", &self.from_address)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl EmailService {
    pub fn new(config: &EmailConfig, db: PgPool) -> Result<Self> {
        // Port 1025 is the local development relay (no TLS); production
        // ports negotiate STARTTLS with credentials.
        let mailer = if config.smtp_port == 1025 {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port)
                .build()
        } else {
            let creds =
                Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .context("Failed to create SMTP transport")?
                .port(config.smtp_port)
                .credentials(creds)
                .build()
        };

        info!(
            "Email service initialized: {}:{} (enabled: {})",
            config.smtp_host, config.smtp_port, config.enabled
        );

        Ok(Self {
            mailer,
            from_name: config.from_name.clone(),
            from_address: config.from_address.clone(),
            enabled: config.enabled,
            db,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Send an HTML email, retrying transient failures with backoff.
    pub async fn send(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        order_id: Option<Uuid>,
    ) -> Result<()> {
        if !self.enabled {
            info!("Email service disabled, skipping email to {}", to_email);
            return Ok(());
        }

        let mut backoff = Duration::from_secs(1);
        let mut last_error = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.deliver_once(to_email, subject, html_body).await {
                Ok(message_id) => {
                    self.log(to_email, subject, order_id, "sent", Some(&message_id), None)
                        .await;
                    info!("Email sent to {} (attempt {})", to_email, attempt);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Email send failed (attempt {}/{}) to {}: {}",
                        attempt, MAX_ATTEMPTS, to_email, e
                    );
                    last_error = Some(e);

                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        let err = last_error.expect("at least one attempt was made");
        self.log(
            to_email,
            subject,
            order_id,
            "failed",
            None,
            Some(&err.to_string()),
        )
        .await;
        error!("Email to {} not sent after {} attempts", to_email, MAX_ATTEMPTS);
        Err(err)
    }

    async fn deliver_once(&self, to_email: &str, subject: &str, html_body: &str) -> Result<String> {
        let from: Mailbox = format!("{} <{}>", self.from_name, self.from_address)
            .parse()
            .context("Failed to parse from address")?;

        let to: Mailbox = to_email
            .parse()
            .context("Failed to parse recipient address")?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .context("Failed to build email message")?;

        let response = self
            .mailer
            .send(email)
            .await
            .context("SMTP delivery failed")?;

        Ok(response.code().to_string())
    }

    /// Record a delivery outcome in the audit table. Logging failures are
    /// swallowed; the audit trail must never take down the send path.
    async fn log(
        &self,
        to_email: &str,
        subject: &str,
        order_id: Option<Uuid>,
        status: &str,
        message_id: Option<&str>,
        error_message: Option<&str>,
    ) {
        let result = sqlx::query(
            "INSERT INTO email_logs (id, recipient, subject, order_id, status, message_id, error)
             VALUES ($1, $2, $3, $4, ($5)::email_status, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(to_email)
        .bind(subject)
        .bind(order_id)
        .bind(status)
        .bind(message_id)
        .bind(error_message)
        .execute(&self.db)
        .await;

        if let Err(e) = result {
            error!("Failed to write email log row: {}", e);
        }
    }
}
