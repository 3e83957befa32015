// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Joint-angle feature from pose keypoints

use nalgebra::Vector2;

use crate::detection::{Detection, JointTriple, Point};

/// Angle in degrees at `vertex` between the rays to `a` and `b`.
///
/// `None` when either ray has zero length, so a degenerate pose never turns
/// into a NaN sample.
pub fn joint_angle(a: Point, vertex: Point, b: Point) -> Option<f64> {
    let v1 = Vector2::new(a.x - vertex.x, a.y - vertex.y);
    let v2 = Vector2::new(b.x - vertex.x, b.y - vertex.y);

    let n1 = v1.norm();
    let n2 = v2.norm();
    if n1 == 0.0 || n2 == 0.0 || !n1.is_finite() || !n2.is_finite() {
        return None;
    }

    // Rounding can push the cosine just past +-1
    let cos = (v1.dot(&v2) / (n1 * n2)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// Feature sample for a detection, if its pose has all three landmarks
pub fn pose_feature(detection: &Detection, joints: &JointTriple) -> Option<f64> {
    let a = detection.keypoint(joints.first)?;
    let vertex = detection.keypoint(joints.vertex)?;
    let b = detection.keypoint(joints.second)?;
    joint_angle(a, vertex, b)
}
