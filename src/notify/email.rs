// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! SMTP delivery of alert emails with the snapshot attached

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use super::{DeliveryError, NotificationJob, NotificationTransport};

/// Implicit-TLS submission port
const DEFAULT_SMTP_PORT: u16 = 465;

/// Attachment filename recipients see
const ATTACHMENT_NAME: &str = "detected.jpg";

/// SMTP relay settings
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: String,
}

impl SmtpConfig {
    /// Read relay settings from the environment.
    ///
    /// `None` when `ALERT_SMTP_HOST` or `ALERT_EMAIL_TO` is unset, in which case
    /// no mailer should be built.
    ///
    /// | Variable              | Required | Default          |
    /// |-----------------------|----------|------------------|
    /// | `ALERT_SMTP_HOST`     | yes      |                  |
    /// | `ALERT_EMAIL_TO`      | yes      |                  |
    /// | `ALERT_SMTP_PORT`     | no       | `465`            |
    /// | `ALERT_SMTP_USER`     | no       |                  |
    /// | `ALERT_SMTP_PASSWORD` | no       |                  |
    /// | `ALERT_EMAIL_FROM`    | no       | `ALERT_SMTP_USER`|
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("ALERT_SMTP_HOST").ok()?;
        let to = std::env::var("ALERT_EMAIL_TO").ok()?;
        let username = std::env::var("ALERT_SMTP_USER").ok();
        let from = std::env::var("ALERT_EMAIL_FROM")
            .ok()
            .or_else(|| username.clone())
            .unwrap_or_else(|| "sentryline@localhost".to_string());

        Some(Self {
            host,
            port: std::env::var("ALERT_SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            username,
            password: std::env::var("ALERT_SMTP_PASSWORD").ok(),
            from,
            to,
        })
    }
}

/// Sends one email per job through an SMTP relay
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Result<Self, DeliveryError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| DeliveryError::Permanent(format!("sender address: {}", e)))?;
        let to: Mailbox = config
            .to
            .parse()
            .map_err(|e| DeliveryError::Permanent(format!("recipient address: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| DeliveryError::Permanent(format!("relay {}: {}", config.host, e)))?
            .port(config.port);

        if let (Some(user), Some(pass)) = (config.username, config.password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
            to,
        })
    }

    fn build_message(&self, job: &NotificationJob) -> Result<Message, DeliveryError> {
        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(job.body.clone()));

        if !job.snapshot.is_empty() {
            let jpeg = ContentType::parse("image/jpeg")
                .map_err(|e| DeliveryError::Permanent(e.to_string()))?;
            parts = parts.singlepart(
                Attachment::new(ATTACHMENT_NAME.to_string()).body(job.snapshot.clone(), jpeg),
            );
        }

        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(job.subject.clone())
            .date_now()
            .multipart(parts)
            .map_err(|e| DeliveryError::Permanent(format!("building message: {}", e)))
    }
}

#[async_trait]
impl NotificationTransport for SmtpNotifier {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn deliver(&self, job: &NotificationJob) -> Result<(), DeliveryError> {
        let message = self.build_message(job)?;

        self.mailer.send(message).await.map_err(|e| {
            if e.is_permanent() {
                DeliveryError::Permanent(e.to_string())
            } else {
                DeliveryError::Transient(e.to_string())
            }
        })?;

        info!(job = %job.id, to = %self.to, "[Email] Alert with image sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::AlertKind;
    use chrono::Utc;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            port: 465,
            username: Some("alerts@example.com".into()),
            password: Some("secret".into()),
            from: "alerts@example.com".into(),
            to: "guard@example.com".into(),
        }
    }

    fn job(snapshot: Vec<u8>) -> NotificationJob {
        NotificationJob {
            id: Uuid::new_v4(),
            kind: AlertKind::AreaIntrusion,
            subject: "Intrusion detected (ID 4)".into(),
            body: "PERSON DETECTED IN RESTRICTED AREA.".into(),
            snapshot,
            snapshot_path: PathBuf::from("detected/frame1_intrusion_id4.jpg"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_bad_recipient_is_permanent() {
        let mut cfg = config();
        cfg.to = "not-an-address".into();
        let err = SmtpNotifier::new(cfg).err().unwrap();
        assert!(matches!(err, DeliveryError::Permanent(_)));
    }

    #[tokio::test]
    async fn test_message_carries_attachment() {
        let notifier = SmtpNotifier::new(config()).unwrap();
        let message = notifier.build_message(&job(vec![0xFF, 0xD8, 0xFF])).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();

        assert!(raw.contains("Subject: Intrusion detected (ID 4)"));
        assert!(raw.contains("image/jpeg"));
        assert!(raw.contains("detected.jpg"));
        assert!(raw.contains("Date: "));
    }

    #[tokio::test]
    async fn test_message_without_snapshot_has_no_attachment() {
        let notifier = SmtpNotifier::new(config()).unwrap();
        let message = notifier.build_message(&job(Vec::new())).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(!raw.contains("detected.jpg"));
    }
}
