// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Event bus for alert and status fan-out

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::detection::TrackId;
use crate::policy::{AlertEvent, AlertKind, Verdict};

/// Event types in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Alert,
    Suppressed,
    Alarm,
}

/// Generic event wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Alert(AlertEvent),
    Suppressed {
        kind: AlertKind,
        track_id: Option<TrackId>,
        frame: u64,
        verdict: Verdict,
    },
    Alarm {
        active: bool,
        frame: u64,
    },
}

/// Broadcast bus. Publishing with no subscribers is a no-op.
pub struct EventBus {
    alert_tx: broadcast::Sender<AlertEvent>,
    event_tx: broadcast::Sender<Event>,
    event_counter: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (alert_tx, _) = broadcast::channel(capacity.max(1));
        let (event_tx, _) = broadcast::channel(capacity.max(1));

        Self {
            alert_tx,
            event_tx,
            event_counter: AtomicU64::new(0),
        }
    }

    pub fn publish_alert(&self, alert: AlertEvent) {
        let _ = self.alert_tx.send(alert.clone());
        self.publish_event(EventType::Alert, EventPayload::Alert(alert));
    }

    pub fn publish_suppressed(&self, kind: AlertKind, track_id: Option<TrackId>, frame: u64, verdict: Verdict) {
        self.publish_event(
            EventType::Suppressed,
            EventPayload::Suppressed {
                kind,
                track_id,
                frame,
                verdict,
            },
        );
    }

    pub fn publish_alarm(&self, active: bool, frame: u64) {
        self.publish_event(EventType::Alarm, EventPayload::Alarm { active, frame });
    }

    fn publish_event(&self, event_type: EventType, payload: EventPayload) {
        let id = self.event_counter.fetch_add(1, Ordering::Relaxed);
        let event = Event {
            id,
            event_type,
            timestamp: Utc::now(),
            payload,
        };
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertEvent> {
        self.alert_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Events published so far
    pub fn published(&self) -> u64 {
        self.event_counter.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Candidate;
    use std::path::PathBuf;

    #[test]
    fn test_subscribers_see_events_in_order() {
        let bus = EventBus::new(16);
        let mut events = bus.subscribe_events();
        let mut alerts = bus.subscribe_alerts();

        let candidate = Candidate {
            kind: AlertKind::AreaIntrusion,
            track_id: Some(2),
            frame: 9,
            mean_angle: None,
            overlap: None,
        };
        bus.publish_alarm(true, 9);
        bus.publish_alert(AlertEvent::new(&candidate, Utc::now(), PathBuf::from("x.jpg")));
        bus.publish_suppressed(AlertKind::AreaIntrusion, Some(3), 9, Verdict::SuppressedCooldown);

        let first = events.try_recv().unwrap();
        assert_eq!(first.id, 0);
        assert_eq!(first.event_type, EventType::Alarm);
        assert_eq!(events.try_recv().unwrap().event_type, EventType::Alert);
        assert_eq!(events.try_recv().unwrap().event_type, EventType::Suppressed);
        assert_eq!(alerts.try_recv().unwrap().track_id, Some(2));
        assert_eq!(bus.published(), 3);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        bus.publish_alarm(false, 1);
        assert_eq!(bus.published(), 1);
    }
}
