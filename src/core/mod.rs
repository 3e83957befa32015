// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Core engine module - owns the session state and drives each frame

mod engine;
mod event_bus;

pub use engine::{Engine, FrameOutcome};
pub use event_bus::{Event, EventBus, EventPayload, EventType};

use serde::{Deserialize, Serialize};

use crate::notify::DispatchStats;

/// Counters for one monitoring session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub frames: u64,
    pub detections: u64,
    /// Dropped by the confidence floor before any lane
    pub below_floor: u64,
    pub candidates: u64,
    pub dispatched: u64,
    pub suppressed: u64,
    /// Alerts whose notification job found the queue full
    pub dropped_jobs: u64,
    pub evicted_tracks: u64,
    pub active_tracks: usize,
    pub alarm_transitions: u64,
    pub uptime_seconds: u64,
    pub delivery: DispatchStats,
}
