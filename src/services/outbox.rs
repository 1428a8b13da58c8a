//! Persisted email outbox.
//!
//! Business flows never call SMTP inline. They enqueue a rendered
//! notification intent here; a background dispatcher drains pending
//! intents on an interval, so delivery failures only ever affect outbox
//! rows, not the state change that triggered them.

use chrono::{Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use tokio::time::{Duration, interval};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::OutboxConfig;
use crate::error::Result;
use crate::services::email::EmailService;
use crate::services::email::templates::EmailContent;

/// What a queued notification is about; kept as text for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    VerifyOtp,
    ResendOtp,
    ResetPasswordOtp,
    Welcome,
    OrderConfirmation,
    OrderCancelled,
    PartnerCancellation,
    OrderDelivered,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::VerifyOtp => "verify_otp",
            NotificationKind::ResendOtp => "resend_otp",
            NotificationKind::ResetPasswordOtp => "reset_password_otp",
            NotificationKind::Welcome => "welcome",
            NotificationKind::OrderConfirmation => "order_confirmation",
            NotificationKind::OrderCancelled => "order_cancelled",
            NotificationKind::PartnerCancellation => "partner_cancellation",
            NotificationKind::OrderDelivered => "order_delivered",
        }
    }
}

/// Queue a rendered notification. Failures here are the caller's to log;
/// they must never unwind the triggering business transition.
pub async fn enqueue(
    db: &PgPool,
    recipient: &str,
    kind: NotificationKind,
    content: &EmailContent,
    order_id: Option<Uuid>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO email_outbox (id, recipient, kind, subject, html_body, order_id)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(Uuid::new_v4())
    .bind(recipient)
    .bind(kind.as_str())
    .bind(&content.subject)
    .bind(&content.html)
    .bind(order_id)
    .execute(db)
    .await?;

    Ok(())
}

/// Enqueue and swallow any failure with a log line - the standard call
/// shape for fire-and-forget notifications.
pub async fn enqueue_best_effort(
    db: &PgPool,
    recipient: &str,
    kind: NotificationKind,
    content: &EmailContent,
    order_id: Option<Uuid>,
) {
    if let Err(e) = enqueue(db, recipient, kind, content, order_id).await {
        error!(
            "Failed to enqueue {} email for {}: {}",
            kind.as_str(),
            recipient,
            e
        );
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    recipient: String,
    kind: String,
    subject: String,
    html_body: String,
    order_id: Option<Uuid>,
    attempts: i32,
}

/// Background worker draining the outbox.
#[derive(Clone)]
pub struct OutboxDispatcher {
    db: PgPool,
    email_service: EmailService,
    poll_interval: Duration,
    max_attempts: i32,
}

impl OutboxDispatcher {
    pub fn new(db: PgPool, email_service: EmailService, config: &OutboxConfig) -> Self {
        Self {
            db,
            email_service,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_attempts: config.max_attempts,
        }
    }

    /// Spawn the dispatch loop.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        info!(
            "Email outbox dispatcher started (poll every {:?})",
            self.poll_interval
        );

        tokio::spawn(async move {
            let mut ticker = interval(self.poll_interval);

            loop {
                ticker.tick().await;

                match self.tick().await {
                    Ok(0) => {}
                    Ok(n) => info!("Outbox dispatcher processed {} notification(s)", n),
                    Err(e) => error!("Outbox dispatcher tick failed: {}", e),
                }

                // Opportunistic sweep standing in for the document store's
                // TTL index on OTP records.
                if let Err(e) = sqlx::query("DELETE FROM otps WHERE expires_at < NOW()")
                    .execute(&self.db)
                    .await
                {
                    warn!("Expired OTP sweep failed: {}", e);
                }
            }
        })
    }

    /// Process one batch of due intents. Returns how many were attempted.
    pub async fn tick(&self) -> Result<u32> {
        let due = sqlx::query_as::<_, OutboxRow>(
            "SELECT id, recipient, kind, subject, html_body, order_id, attempts
               FROM email_outbox
              WHERE status = 'pending' AND next_attempt_at <= NOW()
              ORDER BY created_at
              LIMIT 20",
        )
        .fetch_all(&self.db)
        .await?;

        let mut processed = 0;

        for row in due {
            processed += 1;
            let attempts = row.attempts + 1;

            let outcome = self
                .email_service
                .send(&row.recipient, &row.subject, &row.html_body, row.order_id)
                .await;

            match outcome {
                Ok(()) => {
                    sqlx::query(
                        "UPDATE email_outbox
                            SET status = 'sent', attempts = $2, updated_at = NOW()
                          WHERE id = $1",
                    )
                    .bind(row.id)
                    .bind(attempts)
                    .execute(&self.db)
                    .await?;
                }
                Err(e) if attempts >= self.max_attempts => {
                    warn!(
                        "Giving up on {} email to {} after {} attempts: {}",
                        row.kind, row.recipient, attempts, e
                    );
                    sqlx::query(
                        "UPDATE email_outbox
                            SET status = 'failed', attempts = $2, updated_at = NOW()
                          WHERE id = $1",
                    )
                    .bind(row.id)
                    .bind(attempts)
                    .execute(&self.db)
                    .await?;
                }
                Err(e) => {
                    // Redelivery backs off a minute per prior attempt, doubled.
                    let delay = ChronoDuration::seconds(60 * (1 << (attempts - 1)) as i64);
                    warn!(
                        "Deferring {} email to {} (attempt {}): {}",
                        row.kind, row.recipient, attempts, e
                    );
                    sqlx::query(
                        "UPDATE email_outbox
                            SET attempts = $2, next_attempt_at = $3, updated_at = NOW()
                          WHERE id = $1",
                    )
                    .bind(row.id)
                    .bind(attempts)
                    .bind(Utc::now() + delay)
                    .execute(&self.db)
                    .await?;
                }
            }
        }

        Ok(processed)
    }
}
