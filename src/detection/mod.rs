// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Detection module - per-frame records handed over by the detector/tracker/recognizer

mod keypoints;
mod identity;
mod source;

pub use keypoints::*;
pub use identity::*;
pub use source::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier assigned by the upstream tracker
pub type TrackId = u64;

/// A point in working-resolution pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Point {
    fn from(p: [f64; 2]) -> Self {
        Self::new(p[0], p[1])
    }
}

/// Axis-aligned box, (x1, y1) top-left and (x2, y2) bottom-right
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Corners in clockwise order starting top-left
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x1, self.y1),
            Point::new(self.x2, self.y1),
            Point::new(self.x2, self.y2),
            Point::new(self.x1, self.y2),
        ]
    }
}

/// Identity signal from the face recognizer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    Known(String),
    Unknown,
}

impl Identity {
    pub fn name(&self) -> Option<&str> {
        match self {
            Identity::Known(name) => Some(name),
            Identity::Unknown => None,
        }
    }
}

/// One detected person in one frame.
///
/// Collaborators fill in what they produce: a plain detector only sets the box
/// and confidence, a tracker adds `track_id`, a pose model adds `keypoints`, a
/// face recognizer adds `identity` or a raw `embedding`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub frame: u64,
    #[serde(default)]
    pub track_id: Option<TrackId>,
    pub bbox: BoundingBox,
    pub confidence: f64,
    #[serde(default)]
    pub keypoints: Option<Vec<Option<Point>>>,
    #[serde(default)]
    pub identity: Option<Identity>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl Detection {
    pub fn new(frame: u64, bbox: BoundingBox, confidence: f64) -> Self {
        Self {
            frame,
            track_id: None,
            bbox,
            confidence,
            keypoints: None,
            identity: None,
            embedding: None,
        }
    }

    pub fn with_track(mut self, track_id: TrackId) -> Self {
        self.track_id = Some(track_id);
        self
    }

    pub fn with_keypoints(mut self, keypoints: Vec<Option<Point>>) -> Self {
        self.keypoints = Some(keypoints);
        self
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Keypoint at `index`, `None` when missing or not detected
    pub fn keypoint(&self, index: usize) -> Option<Point> {
        self.keypoints.as_ref()?.get(index).copied().flatten()
    }
}

/// A processed video frame: its encoded snapshot plus detections
#[derive(Debug, Clone)]
pub struct Frame {
    pub seq: u64,
    pub captured_at: DateTime<Utc>,
    /// Encoded JPEG of the working-resolution frame, may be empty
    pub image: Vec<u8>,
    pub detections: Vec<Detection>,
}

impl Frame {
    pub fn new(seq: u64, detections: Vec<Detection>) -> Self {
        Self {
            seq,
            captured_at: Utc::now(),
            image: Vec::new(),
            detections,
        }
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = image;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_geometry() {
        let bbox = BoundingBox::new(40.0, 40.0, 60.0, 80.0);
        assert_eq!(bbox.area(), 800.0);
        assert_eq!(bbox.center(), Point::new(50.0, 60.0));
        assert_eq!(bbox.corners()[2], Point::new(60.0, 80.0));

        let inverted = BoundingBox::new(10.0, 10.0, 5.0, 20.0);
        assert_eq!(inverted.area(), 0.0);
    }

    #[test]
    fn test_detection_from_json_with_optional_fields() {
        let json = r#"{"bbox":{"x1":1,"y1":2,"x2":3,"y2":4},"confidence":0.9,
            "keypoints":[null,{"x":5,"y":6}],"identity":{"known":"alice"}}"#;
        let det: Detection = serde_json::from_str(json).unwrap();
        assert_eq!(det.track_id, None);
        assert_eq!(det.keypoint(0), None);
        assert_eq!(det.keypoint(1), Some(Point::new(5.0, 6.0)));
        assert_eq!(det.keypoint(40), None);
        assert_eq!(det.identity, Some(Identity::Known("alice".to_string())));

        let unknown: Identity = serde_json::from_str(r#""unknown""#).unwrap();
        assert_eq!(unknown, Identity::Unknown);
    }
}
