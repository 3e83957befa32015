// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Monitoring session engine
//!
//! Runs on the caller's thread. Each frame goes detection by detection through
//! the policy, the deduplicator and the dispatcher, then updates the alarm flag
//! once. Nothing here waits on I/O.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::{EventBus, SessionStats};
use crate::alarm::AlarmActuator;
use crate::config::{Config, ConfigError};
use crate::detection::{Frame, IdentityGallery, TrackId};
use crate::notify::{NotificationDispatcher, NotificationJob, SnapshotStore, SubmitError};
use crate::policy::{AlertEvent, AlertPolicy, Candidate, Deduplicator, Verdict};
use crate::tracking::TemporalStateTracker;

/// What one frame produced
#[derive(Debug, Clone, Default)]
pub struct FrameOutcome {
    pub frame: u64,
    pub alerts: Vec<AlertEvent>,
    pub suppressed: Vec<(Candidate, Verdict)>,
    /// Detections under the confidence floor
    pub discarded: usize,
    /// Alarm level set for this frame
    pub alarm: bool,
    pub evicted: Vec<TrackId>,
}

/// One monitoring session. Owns every piece of mutable state.
pub struct Engine {
    config: Arc<Config>,
    policy: AlertPolicy,
    tracker: TemporalStateTracker,
    dedup: Deduplicator,
    snapshots: SnapshotStore,
    dispatcher: NotificationDispatcher,
    alarm: Option<AlarmActuator>,
    alarm_level: bool,
    bus: Option<Arc<EventBus>>,
    stats: SessionStats,
    start_time: Instant,
}

impl Engine {
    /// Validate `config` and build a session around `dispatcher`
    pub fn new(config: Config, dispatcher: NotificationDispatcher) -> Result<Self, ConfigError> {
        config.validate()?;
        let outside = config.out_of_frame_vertices();
        if !outside.is_empty() {
            warn!(
                vertices = ?outside,
                width = config.resolution.width,
                height = config.resolution.height,
                "restricted region extends past the working frame"
            );
        }
        let policy = AlertPolicy::from_config(&config, IdentityGallery::empty(config.identity.match_threshold))?;
        let tracker = TemporalStateTracker::new(config.tracking.window_size, config.tracking.max_absent_frames);
        let dedup = Deduplicator::from_config(&config.policy);
        let snapshots = SnapshotStore::new(config.snapshot_dir.clone());

        info!(
            mode = ?policy.geofence().mode(),
            vertices = policy.geofence().region().vertices().len(),
            window = config.tracking.window_size,
            cooldown_secs = config.policy.cooldown_secs,
            transport = dispatcher.transport_name(),
            "Engine initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            policy,
            tracker,
            dedup,
            snapshots,
            dispatcher,
            alarm: None,
            alarm_level: false,
            bus: None,
            stats: SessionStats::default(),
            start_time: Instant::now(),
        })
    }

    pub fn with_alarm(mut self, alarm: Option<AlarmActuator>) -> Self {
        self.alarm = alarm;
        self
    }

    /// Replace the face gallery used by the identity gate
    pub fn with_gallery(mut self, gallery: IdentityGallery) -> Result<Self, ConfigError> {
        self.policy = AlertPolicy::from_config(&self.config, gallery)?;
        Ok(self)
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tracker(&self) -> &TemporalStateTracker {
        &self.tracker
    }

    pub fn alarm(&self) -> Option<&AlarmActuator> {
        self.alarm.as_ref()
    }

    pub fn stats(&self) -> SessionStats {
        let mut stats = self.stats.clone();
        stats.active_tracks = self.tracker.len();
        stats.uptime_seconds = self.start_time.elapsed().as_secs();
        stats.delivery = self.dispatcher.stats();
        stats
    }

    pub fn process_frame(&mut self, frame: &Frame) -> FrameOutcome {
        self.process_frame_at(frame, Instant::now())
    }

    /// Process one frame with an explicit clock reading for the cooldown
    pub fn process_frame_at(&mut self, frame: &Frame, now: Instant) -> FrameOutcome {
        let mut outcome = FrameOutcome {
            frame: frame.seq,
            ..FrameOutcome::default()
        };
        self.stats.frames += 1;

        for detection in &frame.detections {
            self.stats.detections += 1;

            let Some(assessment) = self.policy.assess(detection, frame.seq, &mut self.tracker) else {
                self.stats.below_floor += 1;
                outcome.discarded += 1;
                continue;
            };
            outcome.alarm |= assessment.alarm();

            for candidate in assessment.candidates {
                self.stats.candidates += 1;
                match self.dedup.admit(&candidate, &mut self.tracker, now) {
                    Verdict::Dispatch => {
                        let alert = self.dispatch(frame, &candidate);
                        outcome.alerts.push(alert);
                    }
                    verdict => {
                        self.stats.suppressed += 1;
                        if let Some(bus) = &self.bus {
                            bus.publish_suppressed(candidate.kind, candidate.track_id, candidate.frame, verdict);
                        }
                        outcome.suppressed.push((candidate, verdict));
                    }
                }
            }
        }

        self.set_alarm(outcome.alarm, frame.seq);

        outcome.evicted = self.tracker.evict_stale(frame.seq);
        if !outcome.evicted.is_empty() {
            self.stats.evicted_tracks += outcome.evicted.len() as u64;
            debug!(frame = frame.seq, evicted = ?outcome.evicted, "stale tracks evicted");
        }

        outcome
    }

    fn dispatch(&mut self, frame: &Frame, candidate: &Candidate) -> AlertEvent {
        let path = self.snapshots.path_for(candidate.frame, candidate.kind, candidate.track_id);
        let alert = AlertEvent::new(candidate, frame.captured_at, path);
        self.stats.dispatched += 1;

        info!(
            kind = %alert.kind,
            track_id = ?alert.track_id,
            frame = alert.frame,
            "ALERT"
        );

        let job = NotificationJob::for_alert(&alert, candidate, &frame.image);
        match self.dispatcher.submit(job) {
            Ok(()) => {}
            Err(e @ SubmitError::QueueFull(_)) => {
                self.stats.dropped_jobs += 1;
                warn!(kind = %alert.kind, error = %e, "notification dropped");
            }
            Err(e @ SubmitError::Closed) => {
                self.stats.dropped_jobs += 1;
                error!(kind = %alert.kind, error = %e, "notification dropped");
            }
        }

        if let Some(bus) = &self.bus {
            bus.publish_alert(alert.clone());
        }
        alert
    }

    fn set_alarm(&mut self, on: bool, frame: u64) {
        if let Some(alarm) = &self.alarm {
            alarm.set_active(on);
        }
        if on != self.alarm_level {
            self.alarm_level = on;
            self.stats.alarm_transitions += 1;
            if let Some(bus) = &self.bus {
                bus.publish_alarm(on, frame);
            }
        }
    }

    /// Stop the alarm, drain queued notifications and return the final counters
    pub async fn shutdown(mut self) -> SessionStats {
        info!("Stopping engine...");

        if let Some(alarm) = self.alarm.take() {
            if tokio::task::spawn_blocking(move || alarm.stop()).await.is_err() {
                warn!("alarm shutdown task failed");
            }
        }

        let mut stats = self.stats();
        stats.delivery = self.dispatcher.shutdown().await;

        info!(
            frames = stats.frames,
            dispatched = stats.dispatched,
            suppressed = stats.suppressed,
            delivered = stats.delivery.delivered,
            failed = stats.delivery.failed,
            "Engine stopped"
        );
        stats
    }
}
