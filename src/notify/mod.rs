// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Notification module - jobs, transports and the bounded dispatcher

mod dispatcher;
mod email;
mod snapshot;

pub use dispatcher::*;
pub use email::*;
pub use snapshot::*;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::policy::{AlertEvent, AlertKind, Candidate};

/// Why a delivery attempt failed
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Worth retrying: connection reset, timeout, 4xx SMTP reply
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// Needs an operator: bad credentials, bad address, 5xx SMTP reply
    #[error("permanent delivery failure: {0}")]
    Permanent(String),

    #[error("snapshot could not be stored: {0}")]
    Snapshot(#[from] std::io::Error),
}

impl DeliveryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DeliveryError::Transient(_))
    }
}

/// Self-contained unit of outbound work. Owns its snapshot bytes.
#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub id: Uuid,
    pub kind: AlertKind,
    pub subject: String,
    pub body: String,
    pub snapshot: Vec<u8>,
    pub snapshot_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl NotificationJob {
    /// Build the job for a dispatched alert, copying the frame's image
    pub fn for_alert(event: &AlertEvent, candidate: &Candidate, image: &[u8]) -> Self {
        let (subject, body) = compose(candidate);
        Self {
            id: event.id,
            kind: event.kind,
            subject,
            body,
            snapshot: image.to_vec(),
            snapshot_path: event.snapshot.clone(),
            created_at: Utc::now(),
        }
    }
}

fn compose(candidate: &Candidate) -> (String, String) {
    let id_suffix = candidate
        .track_id
        .map(|id| format!(" (ID {})", id))
        .unwrap_or_default();

    match candidate.kind {
        AlertKind::SustainedPosture => {
            let angle = candidate
                .mean_angle
                .map(|a| format!(" MEAN JOINT ANGLE {:.1} DEG.", a))
                .unwrap_or_default();
            (
                format!("Suspicious posture detected{}", id_suffix),
                format!("SUSPICIOUS POSTURE SUSTAINED AT FRAME {}.{}", candidate.frame, angle),
            )
        }
        AlertKind::AreaIntrusion => {
            let overlap = candidate
                .overlap
                .map(|r| format!(" OVERLAP {:.0}%.", r * 100.0))
                .unwrap_or_default();
            (
                format!("Intrusion detected{}", id_suffix),
                format!("PERSON DETECTED IN RESTRICTED AREA.{}", overlap),
            )
        }
        AlertKind::UnauthorizedPresence => (
            format!("ALERT Detected{}", id_suffix),
            "UNKNOWN PERSON DETECTED IN RESTRICTED AREA.".to_string(),
        ),
    }
}

/// Where jobs finally go
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, job: &NotificationJob) -> Result<(), DeliveryError>;
}

/// Transport used when no mail relay is configured
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, job: &NotificationJob) -> Result<(), DeliveryError> {
        info!(
            job = %job.id,
            kind = %job.kind,
            subject = %job.subject,
            snapshot_bytes = job.snapshot.len(),
            "[Notify] {}",
            job.body
        );
        Ok(())
    }
}
