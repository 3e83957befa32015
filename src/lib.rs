// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Sentryline - Real-Time Video Monitoring Alert Engine
//!
//! Turns per-frame person detections into security alerts:
//! - Restricted-area membership (center, any corner, or overlap ratio)
//! - Sustained suspicious posture from a smoothed joint angle per track
//! - Optional identity gate against authorized names and face embeddings
//! - One-shot and cooldown suppression of repeat alerts
//! - Bounded, non-blocking email dispatch with snapshot attachment
//! - Audible alarm driven by a shared flag
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                       Sentryline Engine                       │
//! ├───────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌──────────┐  ┌────────┐  ┌───────┐           │
//! │  │ Detection │→ │ Geofence │→ │ Policy │→ │ Dedup │──┐        │
//! │  │  Source   │  │ Tracking │  │        │  │       │  │        │
//! │  └───────────┘  └──────────┘  └────────┘  └───────┘  │        │
//! │                                    │                 ↓        │
//! │                               ┌────────┐     ┌──────────────┐ │
//! │                               │ Alarm  │     │ Notification │ │
//! │                               │ thread │     │   workers    │ │
//! │                               └────────┘     └──────────────┘ │
//! │                                    ↓                 ↓        │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │                        Event Bus                        │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```

pub mod alarm;
pub mod config;
pub mod core;
pub mod detection;
pub mod geofence;
pub mod notify;
pub mod policy;
pub mod tracking;

// Re-exports for convenience
pub use alarm::{AlarmActuator, AlarmState, BellTone, ToneSink};
pub use config::{Config, ConfigError};
pub use core::{Engine, EventBus, FrameOutcome, SessionStats};
pub use detection::{BoundingBox, Detection, Frame, Identity, IdentityGallery, Point, ReplaySource, TrackId};
pub use geofence::{GeofenceEvaluator, MembershipMode};
pub use notify::{LogTransport, NotificationDispatcher, NotificationTransport, SmtpNotifier, SnapshotStore};
pub use policy::{AlertEvent, AlertKind, AlertPolicy, Deduplicator};
pub use tracking::TemporalStateTracker;

/// Sentryline version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sentryline name
pub const NAME: &str = "Sentryline";

/// Compile-time features this build carries
pub fn enabled_features() -> Vec<&'static str> {
    #[cfg_attr(not(feature = "audio"), allow(unused_mut))]
    let mut features = vec![];

    #[cfg(feature = "audio")]
    features.push("audio");

    features
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_features_matches_build() {
        let features = enabled_features();
        assert_eq!(features.contains(&"audio"), cfg!(feature = "audio"));
        assert!(features.len() <= 1);
    }
}
