// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Alert policy - turns one detection into lane classifications and candidate alerts
//!
//! Two lanes run side by side on every detection that clears the confidence
//! floor:
//!
//! - **sustained**: tracked detections with a pose feed the joint angle into
//!   their temporal window; a full window whose mean sits inside the
//!   suspicious band is a `SustainedPosture` level for this frame.
//! - **geofence**: membership in the restricted region is an `AreaIntrusion`,
//!   or, with the identity gate on, `UnauthorizedPresence` unless the person
//!   is authorized.
//!
//! Non-normal classifications become [`Candidate`]s for the [`Deduplicator`].

mod dedup;

pub use dedup::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::{Config, ConfigError};
use crate::detection::{Detection, Identity, IdentityGallery, IdentityGate, JointTriple, TrackId};
use crate::geofence::{GeofenceEvaluator, Membership};
use crate::tracking::{pose_feature, TemporalStateTracker, WindowReading};

/// Kinds of alert the engine raises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    SustainedPosture,
    AreaIntrusion,
    UnauthorizedPresence,
}

/// Decision lane an alert kind comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Sustained,
    Geofence,
}

impl AlertKind {
    pub fn lane(&self) -> Lane {
        match self {
            AlertKind::SustainedPosture => Lane::Sustained,
            AlertKind::AreaIntrusion | AlertKind::UnauthorizedPresence => Lane::Geofence,
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            AlertKind::SustainedPosture => "posture",
            AlertKind::AreaIntrusion => "intrusion",
            AlertKind::UnauthorizedPresence => "unauthorized",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertKind::SustainedPosture => "SUSTAINED_POSTURE",
            AlertKind::AreaIntrusion => "AREA_INTRUSION",
            AlertKind::UnauthorizedPresence => "UNAUTHORIZED_PRESENCE",
        };
        f.write_str(s)
    }
}

/// Sustained-lane result for one detection in one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostureClass {
    /// Untracked, no pose, or a degenerate pose this frame
    NoSample,
    /// Window still filling
    Pending { len: usize },
    Normal { mean: f64 },
    Suspicious { mean: f64 },
}

/// Geofence-lane result for one detection in one frame
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneClass {
    Outside,
    Intrusion,
    /// Inside, but recognized as an authorized person. Informational only.
    Authorized(String),
    Unauthorized(Identity),
}

/// A classification that may become an alert
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub kind: AlertKind,
    pub track_id: Option<TrackId>,
    pub frame: u64,
    pub mean_angle: Option<f64>,
    pub overlap: Option<f64>,
}

/// Both lanes' view of one detection
#[derive(Debug, Clone)]
pub struct Assessment {
    pub posture: PostureClass,
    pub zone: ZoneClass,
    pub membership: Membership,
    pub candidates: Vec<Candidate>,
}

impl Assessment {
    /// Whether this detection holds an alert condition right now
    pub fn alarm(&self) -> bool {
        !self.candidates.is_empty()
    }
}

/// A dispatched alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub kind: AlertKind,
    pub track_id: Option<TrackId>,
    pub frame: u64,
    pub timestamp: DateTime<Utc>,
    pub snapshot: PathBuf,
}

impl AlertEvent {
    pub fn new(candidate: &Candidate, timestamp: DateTime<Utc>, snapshot: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: candidate.kind,
            track_id: candidate.track_id,
            frame: candidate.frame,
            timestamp,
            snapshot,
        }
    }
}

/// Lane classifier
pub struct AlertPolicy {
    confidence_floor: f64,
    band: (f64, f64),
    joints: JointTriple,
    geofence: GeofenceEvaluator,
    identity: Option<IdentityGate>,
}

impl AlertPolicy {
    pub fn from_config(config: &Config, gallery: IdentityGallery) -> Result<Self, ConfigError> {
        let geofence = GeofenceEvaluator::from_config(&config.geofence)?;
        let [lower, upper] = config.policy.suspicious_band;
        let identity = config
            .identity
            .enabled
            .then(|| IdentityGate::new(config.identity.authorized.iter().cloned(), gallery));

        Ok(Self {
            confidence_floor: config.policy.confidence_floor,
            band: (lower, upper),
            joints: config.tracking.feature_joints,
            geofence,
            identity,
        })
    }

    pub fn geofence(&self) -> &GeofenceEvaluator {
        &self.geofence
    }

    pub fn identity_gate(&self) -> Option<&IdentityGate> {
        self.identity.as_ref()
    }

    pub fn admits_confidence(&self, detection: &Detection) -> bool {
        detection.confidence >= self.confidence_floor
    }

    pub fn classify_posture(&self, reading: WindowReading) -> PostureClass {
        match reading {
            WindowReading::Filling { len } => PostureClass::Pending { len },
            WindowReading::Full { mean } => {
                if mean >= self.band.0 && mean <= self.band.1 {
                    PostureClass::Suspicious { mean }
                } else {
                    PostureClass::Normal { mean }
                }
            }
        }
    }

    pub fn classify_zone(&self, detection: &Detection) -> (ZoneClass, Membership) {
        let membership = self.geofence.evaluate(&detection.bbox);
        if !membership.inside {
            return (ZoneClass::Outside, membership);
        }

        let zone = match &self.identity {
            None => ZoneClass::Intrusion,
            Some(gate) => {
                let identity = gate.resolve(detection);
                if gate.is_authorized(&identity) {
                    ZoneClass::Authorized(identity.name().unwrap_or_default().to_string())
                } else {
                    ZoneClass::Unauthorized(identity)
                }
            }
        };
        (zone, membership)
    }

    /// Run both lanes for `detection` seen in frame `frame`. `None` when the
    /// detection is below the confidence floor.
    pub fn assess(&self, detection: &Detection, frame: u64, tracker: &mut TemporalStateTracker) -> Option<Assessment> {
        if !self.admits_confidence(detection) {
            trace!(frame, confidence = detection.confidence, "below confidence floor");
            return None;
        }

        let posture = match detection.track_id {
            Some(track_id) => match pose_feature(detection, &self.joints) {
                Some(angle) => self.classify_posture(tracker.observe(track_id, angle, frame)),
                None => {
                    tracker.touch(track_id, frame);
                    PostureClass::NoSample
                }
            },
            None => PostureClass::NoSample,
        };

        let (zone, membership) = self.classify_zone(detection);

        let mut candidates = Vec::new();
        if let PostureClass::Suspicious { mean } = posture {
            candidates.push(Candidate {
                kind: AlertKind::SustainedPosture,
                track_id: detection.track_id,
                frame,
                mean_angle: Some(mean),
                overlap: None,
            });
        }

        let zone_kind = match &zone {
            ZoneClass::Intrusion => Some(AlertKind::AreaIntrusion),
            ZoneClass::Unauthorized(_) => Some(AlertKind::UnauthorizedPresence),
            ZoneClass::Authorized(name) => {
                debug!(frame, name = %name, "authorized presence in restricted area");
                None
            }
            ZoneClass::Outside => None,
        };
        if let Some(kind) = zone_kind {
            candidates.push(Candidate {
                kind,
                track_id: detection.track_id,
                frame,
                mean_angle: None,
                overlap: membership.overlap,
            });
        }

        Some(Assessment {
            posture,
            zone,
            membership,
            candidates,
        })
    }
}
