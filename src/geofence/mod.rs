// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Geofence evaluation - point-in-polygon, sample points and box/polygon overlap
//!
//! Everything here is a pure function of coordinates. Polygons are assumed
//! simple (non-self-intersecting) and closed implicitly (last vertex joins the
//! first). Degenerate inputs never panic: an empty polygon contains nothing and
//! a zero-area box overlaps nothing.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, GeofenceConfig};
use crate::detection::{BoundingBox, Point};

/// Tolerance for the on-boundary test, in pixels
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Which sample-point rule decides membership of a bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipMode {
    /// Box center only
    Center,
    /// Box center or any of its four corners
    AnyCorner,
    /// Share of the box area inside the polygon exceeds a threshold
    OverlapRatio,
}

/// Even-odd containment with an inclusive boundary
pub fn contains(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let n = polygon.len();
    let mut inside = false;
    let mut j = n - 1;

    for i in 0..n {
        let a = polygon[i];
        let b = polygon[j];

        if on_segment(point, a, b) {
            return true;
        }

        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}

/// True when any sample point lies inside the polygon
pub fn inside_any(samples: &[Point], polygon: &[Point]) -> bool {
    samples.iter().any(|&p| contains(p, polygon))
}

/// Fraction of the box area that lies inside the polygon, in [0, 1]
pub fn overlap_ratio(bbox: &BoundingBox, polygon: &[Point]) -> f64 {
    let box_area = bbox.area();
    if box_area <= 0.0 || polygon.len() < 3 {
        return 0.0;
    }

    let clipped = clip_to_box(polygon, bbox);
    let intersection = shoelace_area(&clipped);
    (intersection / box_area).clamp(0.0, 1.0)
}

/// Absolute area of a simple polygon
pub fn shoelace_area(polygon: &[Point]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let n = polygon.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = polygon[i];
            let b = polygon[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice.abs() / 2.0
}

fn on_segment(p: Point, a: Point, b: Point) -> bool {
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    let length = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
    if cross.abs() > BOUNDARY_EPSILON * length.max(1.0) {
        return false;
    }
    p.x >= a.x.min(b.x) - BOUNDARY_EPSILON
        && p.x <= a.x.max(b.x) + BOUNDARY_EPSILON
        && p.y >= a.y.min(b.y) - BOUNDARY_EPSILON
        && p.y <= a.y.max(b.y) + BOUNDARY_EPSILON
}

#[derive(Clone, Copy)]
enum ClipEdge {
    Left(f64),
    Right(f64),
    Top(f64),
    Bottom(f64),
}

impl ClipEdge {
    fn keeps(&self, p: Point) -> bool {
        match *self {
            ClipEdge::Left(x) => p.x >= x,
            ClipEdge::Right(x) => p.x <= x,
            ClipEdge::Top(y) => p.y >= y,
            ClipEdge::Bottom(y) => p.y <= y,
        }
    }

    fn intersect(&self, a: Point, b: Point) -> Point {
        match *self {
            ClipEdge::Left(x) | ClipEdge::Right(x) => {
                let t = (x - a.x) / (b.x - a.x);
                Point::new(x, a.y + t * (b.y - a.y))
            }
            ClipEdge::Top(y) | ClipEdge::Bottom(y) => {
                let t = (y - a.y) / (b.y - a.y);
                Point::new(a.x + t * (b.x - a.x), y)
            }
        }
    }
}

/// Sutherland-Hodgman clip of `polygon` against the (convex) box
fn clip_to_box(polygon: &[Point], bbox: &BoundingBox) -> Vec<Point> {
    let edges = [
        ClipEdge::Left(bbox.x1),
        ClipEdge::Right(bbox.x2),
        ClipEdge::Top(bbox.y1),
        ClipEdge::Bottom(bbox.y2),
    ];

    let mut output = polygon.to_vec();
    for edge in edges {
        if output.is_empty() {
            break;
        }
        let input = std::mem::take(&mut output);
        let mut prev = input[input.len() - 1];
        for &curr in &input {
            match (edge.keeps(curr), edge.keeps(prev)) {
                (true, true) => output.push(curr),
                (true, false) => {
                    output.push(edge.intersect(prev, curr));
                    output.push(curr);
                }
                (false, true) => output.push(edge.intersect(prev, curr)),
                (false, false) => {}
            }
            prev = curr;
        }
    }
    output
}

/// A validated restricted region
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceRegion {
    vertices: Vec<Point>,
}

impl GeofenceRegion {
    pub fn new(vertices: Vec<Point>) -> Result<Self, ConfigError> {
        if vertices.len() < 3 {
            return Err(ConfigError::TooFewVertices(vertices.len()));
        }
        if let Some(i) = vertices.iter().position(|p| !p.is_finite()) {
            return Err(ConfigError::NonFiniteVertex(i));
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn area(&self) -> f64 {
        shoelace_area(&self.vertices)
    }
}

/// Result of testing one box against the region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Membership {
    pub inside: bool,
    /// Only computed in overlap-ratio mode
    pub overlap: Option<f64>,
}

/// Applies the deployment's membership mode to bounding boxes
#[derive(Debug, Clone)]
pub struct GeofenceEvaluator {
    region: GeofenceRegion,
    mode: MembershipMode,
    overlap_threshold: f64,
}

impl GeofenceEvaluator {
    pub fn new(region: GeofenceRegion, mode: MembershipMode, overlap_threshold: f64) -> Self {
        Self {
            region,
            mode,
            overlap_threshold,
        }
    }

    pub fn from_config(config: &GeofenceConfig) -> Result<Self, ConfigError> {
        let region = GeofenceRegion::new(config.vertices())?;
        Ok(Self::new(region, config.mode, config.overlap_threshold))
    }

    pub fn region(&self) -> &GeofenceRegion {
        &self.region
    }

    pub fn mode(&self) -> MembershipMode {
        self.mode
    }

    /// Sample points for the point-based modes
    pub fn sample_points(&self, bbox: &BoundingBox) -> Vec<Point> {
        match self.mode {
            MembershipMode::AnyCorner => {
                let mut samples = vec![bbox.center()];
                samples.extend(bbox.corners());
                samples
            }
            MembershipMode::Center | MembershipMode::OverlapRatio => vec![bbox.center()],
        }
    }

    pub fn evaluate(&self, bbox: &BoundingBox) -> Membership {
        let polygon = self.region.vertices();
        match self.mode {
            MembershipMode::Center | MembershipMode::AnyCorner => Membership {
                inside: inside_any(&self.sample_points(bbox), polygon),
                overlap: None,
            },
            MembershipMode::OverlapRatio => {
                let ratio = overlap_ratio(bbox, polygon);
                Membership {
                    inside: ratio > self.overlap_threshold,
                    overlap: Some(ratio),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ]
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_contains_inside_outside_boundary() {
        let poly = square();
        assert!(contains(Point::new(50.0, 50.0), &poly));
        assert!(contains(Point::new(0.5, 99.5), &poly));
        assert!(!contains(Point::new(150.0, 50.0), &poly));
        assert!(!contains(Point::new(-0.5, 50.0), &poly));

        // Edges and vertices count as inside
        assert!(contains(Point::new(100.0, 50.0), &poly));
        assert!(contains(Point::new(50.0, 0.0), &poly));
        assert!(contains(Point::new(0.0, 0.0), &poly));
        assert!(contains(Point::new(100.0, 100.0), &poly));
    }

    #[test]
    fn test_contains_irregular_quad() {
        let area: Vec<Point> = [[380.0, 78.0], [358.0, 236.0], [582.0, 302.0], [614.0, 90.0]]
            .into_iter()
            .map(Point::from)
            .collect();
        assert!(contains(Point::new(480.0, 180.0), &area));
        assert!(!contains(Point::new(100.0, 100.0), &area));
        assert!(!contains(Point::new(600.0, 300.0), &area));
    }

    #[test]
    fn test_contains_concave() {
        // U shape, the notch is outside
        let u = vec![
            Point::new(0.0, 0.0),
            Point::new(30.0, 0.0),
            Point::new(30.0, 30.0),
            Point::new(20.0, 30.0),
            Point::new(20.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 30.0),
            Point::new(0.0, 30.0),
        ];
        assert!(contains(Point::new(5.0, 20.0), &u));
        assert!(!contains(Point::new(15.0, 20.0), &u));
        assert!(contains(Point::new(15.0, 10.0), &u));
    }

    #[test]
    fn test_degenerate_polygon() {
        assert!(!contains(Point::new(0.0, 0.0), &[]));
        assert!(!inside_any(&[Point::new(0.0, 0.0)], &[Point::new(0.0, 0.0), Point::new(1.0, 1.0)]));
        assert_eq!(overlap_ratio(&BoundingBox::new(0.0, 0.0, 10.0, 10.0), &[]), 0.0);
    }

    #[test]
    fn test_overlap_ratio() {
        let poly = square();
        assert!(approx(overlap_ratio(&BoundingBox::new(40.0, 40.0, 60.0, 60.0), &poly), 1.0));
        assert!(approx(overlap_ratio(&BoundingBox::new(200.0, 200.0, 220.0, 220.0), &poly), 0.0));
        assert!(approx(overlap_ratio(&BoundingBox::new(90.0, 0.0, 110.0, 10.0), &poly), 0.5));
        assert!(approx(overlap_ratio(&BoundingBox::new(-50.0, -50.0, 150.0, 150.0), &poly), 0.25));
    }

    #[test]
    fn test_overlap_zero_area_box() {
        let poly = square();
        assert_eq!(overlap_ratio(&BoundingBox::new(50.0, 50.0, 50.0, 80.0), &poly), 0.0);
    }

    #[test]
    fn test_overlap_concave_polygon() {
        let u = vec![
            Point::new(0.0, 0.0),
            Point::new(30.0, 0.0),
            Point::new(30.0, 30.0),
            Point::new(20.0, 30.0),
            Point::new(20.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 30.0),
            Point::new(0.0, 30.0),
        ];
        // Box straddles the notch: 10x20 of the 30x20 box is notch
        let ratio = overlap_ratio(&BoundingBox::new(0.0, 10.0, 30.0, 30.0), &u);
        assert!(approx(ratio, 2.0 / 3.0));
    }

    #[test]
    fn test_evaluator_modes() {
        let region = GeofenceRegion::new(square()).unwrap();
        // Center outside, top-left corner inside
        let straddling = BoundingBox::new(90.0, 90.0, 130.0, 130.0);

        let center = GeofenceEvaluator::new(region.clone(), MembershipMode::Center, 0.3);
        assert!(!center.evaluate(&straddling).inside);

        let corners = GeofenceEvaluator::new(region.clone(), MembershipMode::AnyCorner, 0.3);
        assert!(corners.evaluate(&straddling).inside);
        assert_eq!(corners.sample_points(&straddling).len(), 5);

        let overlap = GeofenceEvaluator::new(region, MembershipMode::OverlapRatio, 0.3);
        let m = overlap.evaluate(&straddling);
        assert!(!m.inside);
        assert!(approx(m.overlap.unwrap(), 100.0 / 1600.0));

        let mostly_in = BoundingBox::new(80.0, 40.0, 110.0, 60.0);
        assert!(overlap.evaluate(&mostly_in).inside);
    }

    #[test]
    fn test_region_validation() {
        assert_eq!(
            GeofenceRegion::new(vec![Point::new(0.0, 0.0)]),
            Err(ConfigError::TooFewVertices(1))
        );
        assert!(approx(GeofenceRegion::new(square()).unwrap().area(), 10_000.0));
    }
}
