// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! 17-point COCO keypoint layout emitted by the upstream pose model

use serde::{Deserialize, Serialize};

pub const KEYPOINT_COUNT: usize = 17;

pub const KEYPOINT_LABELS: [&str; KEYPOINT_COUNT] = [
    "nose", "left_eye", "right_eye", "left_ear", "right_ear",
    "left_shoulder", "right_shoulder", "left_elbow", "right_elbow",
    "left_wrist", "right_wrist", "left_hip", "right_hip",
    "left_knee", "right_knee", "left_ankle", "right_ankle",
];

pub fn keypoint_label(index: usize) -> &'static str {
    KEYPOINT_LABELS.get(index).copied().unwrap_or("unknown")
}

/// Three keypoint indices spanning a joint angle, measured at `vertex`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointTriple {
    pub first: usize,
    pub vertex: usize,
    pub second: usize,
}

impl JointTriple {
    pub const fn new(first: usize, vertex: usize, second: usize) -> Self {
        Self { first, vertex, second }
    }

    pub fn indices(&self) -> [usize; 3] {
        [self.first, self.vertex, self.second]
    }

    pub fn is_valid(&self) -> bool {
        self.indices().iter().all(|&i| i < KEYPOINT_COUNT)
            && self.first != self.vertex
            && self.second != self.vertex
            && self.first != self.second
    }

    pub fn describe(&self) -> String {
        format!(
            "{}-{}-{}",
            keypoint_label(self.first),
            keypoint_label(self.vertex),
            keypoint_label(self.second)
        )
    }
}

impl Default for JointTriple {
    fn default() -> Self {
        // Landmarks 6, 8, 10 with the angle taken at 8
        Self::new(6, 8, 10)
    }
}
