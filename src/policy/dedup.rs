// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Duplicate suppression and notification rate limiting

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AlertKind, Candidate, Lane};
use crate::config::PolicyConfig;
use crate::tracking::TemporalStateTracker;

/// Why a candidate did or did not get through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Dispatch,
    SuppressedOneShot,
    SuppressedCooldown,
}

/// Global cooldown between dispatched notifications
pub struct CooldownLimiter {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl CooldownLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_dispatch(&self) -> Option<Instant> {
        *self.last.lock()
    }

    /// Pass if more than `interval` has elapsed since the last pass, and record `now`
    pub fn try_acquire(&self, now: Instant) -> bool {
        let mut last = self.last.lock();
        let open = match *last {
            None => true,
            Some(prev) => now.saturating_duration_since(prev) > self.interval,
        };
        if open {
            *last = Some(now);
        }
        open
    }
}

/// Which regimes apply to a lane; all that apply must pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuppressionRule {
    pub one_shot: bool,
    pub cooldown: bool,
}

/// One-shot per track plus a global cooldown, composed by AND
pub struct Deduplicator {
    limiter: CooldownLimiter,
    sustained: SuppressionRule,
    geofence: SuppressionRule,
}

impl Deduplicator {
    pub fn new(limiter: CooldownLimiter, sustained: SuppressionRule, geofence: SuppressionRule) -> Self {
        Self {
            limiter,
            sustained,
            geofence,
        }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(
            CooldownLimiter::new(config.cooldown()),
            SuppressionRule {
                one_shot: true,
                cooldown: config.sustained_cooldown,
            },
            SuppressionRule {
                one_shot: config.intrusion_one_shot,
                cooldown: true,
            },
        )
    }

    pub fn rule_for(&self, kind: AlertKind) -> SuppressionRule {
        match kind.lane() {
            Lane::Sustained => self.sustained,
            Lane::Geofence => self.geofence,
        }
    }

    pub fn limiter(&self) -> &CooldownLimiter {
        &self.limiter
    }

    /// Decide on a candidate. Suppression state is only consumed on `Dispatch`.
    pub fn admit(&self, candidate: &Candidate, tracker: &mut TemporalStateTracker, now: Instant) -> Verdict {
        let rule = self.rule_for(candidate.kind);

        let one_shot_track = match (rule.one_shot, candidate.track_id) {
            (true, Some(track_id)) => {
                if tracker.touch(track_id, candidate.frame).has_alerted() {
                    debug!(track_id, kind = %candidate.kind, "suppressed: already alerted");
                    return Verdict::SuppressedOneShot;
                }
                Some(track_id)
            }
            _ => None,
        };

        if rule.cooldown && !self.limiter.try_acquire(now) {
            debug!(kind = %candidate.kind, frame = candidate.frame, "suppressed: cooldown");
            return Verdict::SuppressedCooldown;
        }

        if let Some(track_id) = one_shot_track {
            tracker.touch(track_id, candidate.frame).mark_alerted();
        }
        Verdict::Dispatch
    }
}
