// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Temporal state per tracked entity - sliding-window smoothing and eviction

mod pose;

pub use pose::*;

use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::detection::TrackId;

/// Outcome of adding one sample to a track's window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowReading {
    /// Fewer than K samples so far
    Filling { len: usize },
    /// Window holds exactly K samples; mean over them
    Full { mean: f64 },
}

impl WindowReading {
    pub fn mean(&self) -> Option<f64> {
        match self {
            WindowReading::Full { mean } => Some(*mean),
            WindowReading::Filling { .. } => None,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, WindowReading::Full { .. })
    }
}

/// Everything we remember about one track
#[derive(Debug, Clone)]
pub struct TrackState {
    pub track_id: TrackId,
    window: VecDeque<f64>,
    capacity: usize,
    alerted: bool,
    pub first_seen: u64,
    pub last_seen: u64,
}

impl TrackState {
    pub fn new(track_id: TrackId, capacity: usize, frame: u64) -> Self {
        Self {
            track_id,
            window: VecDeque::with_capacity(capacity),
            capacity,
            alerted: false,
            first_seen: frame,
            last_seen: frame,
        }
    }

    /// Append a sample, evicting the oldest once past capacity
    pub fn push(&mut self, value: f64) -> WindowReading {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);

        match self.mean() {
            Some(mean) => WindowReading::Full { mean },
            None => WindowReading::Filling { len: self.window.len() },
        }
    }

    pub fn is_full(&self) -> bool {
        self.window.len() == self.capacity
    }

    /// Mean of the window, only once it is full
    pub fn mean(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
    }

    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.window.iter().copied()
    }

    pub fn has_alerted(&self) -> bool {
        self.alerted
    }

    /// Test-and-set: true only on the first call for this track
    pub fn mark_alerted(&mut self) -> bool {
        !std::mem::replace(&mut self.alerted, true)
    }
}

/// Owns every live [`TrackState`]
pub struct TemporalStateTracker {
    tracks: HashMap<TrackId, TrackState>,
    capacity: usize,
    max_absent_frames: u64,
}

impl TemporalStateTracker {
    pub fn new(capacity: usize, max_absent_frames: u64) -> Self {
        Self {
            tracks: HashMap::new(),
            capacity: capacity.max(1),
            max_absent_frames,
        }
    }

    /// Record that a track was seen this frame, creating it on first sight
    pub fn touch(&mut self, track_id: TrackId, frame: u64) -> &mut TrackState {
        let capacity = self.capacity;
        let state = self
            .tracks
            .entry(track_id)
            .or_insert_with(|| {
                debug!(track_id, frame, "new track");
                TrackState::new(track_id, capacity, frame)
            });
        state.last_seen = state.last_seen.max(frame);
        state
    }

    /// Add a feature sample for a track
    pub fn observe(&mut self, track_id: TrackId, value: f64, frame: u64) -> WindowReading {
        self.touch(track_id, frame).push(value)
    }

    pub fn get(&self, track_id: TrackId) -> Option<&TrackState> {
        self.tracks.get(&track_id)
    }

    pub fn get_mut(&mut self, track_id: TrackId) -> Option<&mut TrackState> {
        self.tracks.get_mut(&track_id)
    }

    /// Drop tracks unseen for more than `max_absent_frames`, returning their ids
    pub fn evict_stale(&mut self, current_frame: u64) -> Vec<TrackId> {
        let limit = self.max_absent_frames;
        let mut evicted = Vec::new();
        self.tracks.retain(|&id, state| {
            let keep = current_frame.saturating_sub(state.last_seen) <= limit;
            if !keep {
                evicted.push(id);
            }
            keep
        });
        if !evicted.is_empty() {
            debug!(count = evicted.len(), frame = current_frame, "evicted stale tracks");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_fills_at_capacity() {
        let mut tracker = TemporalStateTracker::new(5, 100);
        let values = [105.0, 108.0, 110.0, 107.0, 109.0];

        let readings: Vec<WindowReading> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| tracker.observe(1, v, i as u64))
            .collect();

        assert_eq!(readings.iter().filter(|r| r.is_full()).count(), 1);
        assert_eq!(readings[3], WindowReading::Filling { len: 4 });
        let mean = readings[4].mean().unwrap();
        assert!((mean - 107.8).abs() < 1e-9);
    }

    #[test]
    fn test_window_slides() {
        let mut tracker = TemporalStateTracker::new(3, 100);
        tracker.observe(7, 1.0, 0);
        tracker.observe(7, 2.0, 1);
        assert_eq!(tracker.observe(7, 3.0, 2).mean(), Some(2.0));
        assert_eq!(tracker.observe(7, 9.0, 3).mean(), Some(14.0 / 3.0));

        let samples: Vec<f64> = tracker.get(7).unwrap().samples().collect();
        assert_eq!(samples, vec![2.0, 3.0, 9.0]);
    }

    #[test]
    fn test_tracks_are_independent() {
        let mut tracker = TemporalStateTracker::new(2, 100);
        tracker.observe(1, 10.0, 0);
        assert!(!tracker.observe(2, 20.0, 0).is_full());
        assert_eq!(tracker.observe(1, 30.0, 1).mean(), Some(20.0));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_alerted_flag_is_one_shot() {
        let mut state = TrackState::new(3, 5, 0);
        assert!(!state.has_alerted());
        assert!(state.mark_alerted());
        assert!(!state.mark_alerted());
        assert!(state.has_alerted());
    }

    #[test]
    fn test_eviction_after_absence() {
        let mut tracker = TemporalStateTracker::new(5, 10);
        tracker.observe(1, 100.0, 0);
        tracker.touch(2, 5);

        assert!(tracker.evict_stale(10).is_empty());
        assert_eq!(tracker.evict_stale(11), vec![1]);
        assert!(tracker.get(1).is_none());
        assert!(tracker.get(2).is_some());

        // A returning id starts a fresh lifetime
        tracker.get_mut(2).unwrap().mark_alerted();
        tracker.evict_stale(100);
        assert!(!tracker.touch(2, 100).has_alerted());
    }
}
