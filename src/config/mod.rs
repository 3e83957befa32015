// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Configuration module

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::detection::{JointTriple, Point};
use crate::geofence::MembershipMode;

/// Startup configuration errors. Always fatal.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("restricted region needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),

    #[error("restricted region vertex {0} is not a finite coordinate")]
    NonFiniteVertex(usize),

    #[error("{name} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("suspicious band is empty: lower {0} exceeds upper {1}")]
    InvalidBand(f64, f64),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("feature joint triple {0:?} is not a valid keypoint combination")]
    InvalidJoints(JointTriple),
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where alert snapshots are written
    pub snapshot_dir: PathBuf,

    /// Working resolution the detector runs at; polygon coordinates live in this space
    pub resolution: Resolution,

    /// Restricted region and membership rule
    pub geofence: GeofenceConfig,

    /// Per-track temporal smoothing
    pub tracking: TrackingConfig,

    /// Alert decision thresholds and suppression
    pub policy: PolicyConfig,

    /// Authorized identities
    pub identity: IdentityConfig,

    /// Outbound notifications
    pub notification: NotificationConfig,

    /// Audible alarm
    pub alarm: AlarmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("./detected"),
            resolution: Resolution::default(),
            geofence: GeofenceConfig::default(),
            tracking: TrackingConfig::default(),
            policy: PolicyConfig::default(),
            identity: IdentityConfig::default(),
            notification: NotificationConfig::default(),
            alarm: AlarmConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("sentryline"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Check every section. Called once before the engine is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(ConfigError::Zero("resolution"));
        }
        self.geofence.validate()?;
        self.tracking.validate()?;
        self.policy.validate()?;
        self.identity.validate()?;
        self.notification.validate()?;
        self.alarm.validate()?;
        Ok(())
    }

    /// Indices of polygon vertices that fall outside the working frame
    pub fn out_of_frame_vertices(&self) -> Vec<usize> {
        self.geofence
            .vertices()
            .iter()
            .enumerate()
            .filter(|(_, p)| !self.resolution.contains(p))
            .map(|(i, _)| i)
            .collect()
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { name, value, min, max })
    }
}

/// Working frame size in pixels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// True when `p` lies on the frame, edges included
    pub fn contains(&self, p: &Point) -> bool {
        (0.0..=self.width as f64).contains(&p.x) && (0.0..=self.height as f64).contains(&p.y)
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1020,
            height: 600,
        }
    }
}

/// Geofence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeofenceConfig {
    /// Closed polygon, ordered vertices as [x, y]
    pub polygon: Vec<[f64; 2]>,

    /// How a bounding box is tested against the polygon
    pub mode: MembershipMode,

    /// Minimum box/polygon overlap for `overlap_ratio` mode
    pub overlap_threshold: f64,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            polygon: vec![[380.0, 78.0], [358.0, 236.0], [582.0, 302.0], [614.0, 90.0]],
            mode: MembershipMode::AnyCorner,
            overlap_threshold: 0.3,
        }
    }
}

impl GeofenceConfig {
    pub fn vertices(&self) -> Vec<Point> {
        self.polygon.iter().copied().map(Point::from).collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.polygon.len() < 3 {
            return Err(ConfigError::TooFewVertices(self.polygon.len()));
        }
        if let Some(i) = self.vertices().iter().position(|p| !p.is_finite()) {
            return Err(ConfigError::NonFiniteVertex(i));
        }
        check_range("geofence.overlap_threshold", self.overlap_threshold, 0.0, 1.0)
    }
}

/// Temporal smoothing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Samples a track must accumulate before its mean is trusted
    pub window_size: usize,

    /// Drop a track after this many frames without an observation
    pub max_absent_frames: u64,

    /// Keypoints spanning the smoothed joint angle
    pub feature_joints: JointTriple,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            max_absent_frames: 300,
            feature_joints: JointTriple::default(),
        }
    }
}

impl TrackingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::Zero("tracking.window_size"));
        }
        if self.max_absent_frames == 0 {
            return Err(ConfigError::Zero("tracking.max_absent_frames"));
        }
        if !self.feature_joints.is_valid() {
            return Err(ConfigError::InvalidJoints(self.feature_joints));
        }
        Ok(())
    }
}

/// Alert policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Detections below this confidence are discarded before any lane
    pub confidence_floor: f64,

    /// Inclusive [lower, upper] band of mean joint angle (degrees) classed as suspicious
    pub suspicious_band: [f64; 2],

    /// Minimum seconds between notifications subject to the cooldown
    pub cooldown_secs: f64,

    /// Also apply the global cooldown to sustained-posture alerts
    pub sustained_cooldown: bool,

    /// Also apply one-shot suppression to geofence alerts of tracked detections
    pub intrusion_one_shot: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.5,
            suspicious_band: [100.0, 113.0],
            cooldown_secs: 5.0,
            sustained_cooldown: false,
            intrusion_one_shot: false,
        }
    }
}

impl PolicyConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_range("policy.confidence_floor", self.confidence_floor, 0.0, 1.0)?;
        let [lower, upper] = self.suspicious_band;
        check_range("policy.suspicious_band", lower, 0.0, 180.0)?;
        check_range("policy.suspicious_band", upper, 0.0, 180.0)?;
        if lower > upper {
            return Err(ConfigError::InvalidBand(lower, upper));
        }
        check_range("policy.cooldown_secs", self.cooldown_secs, 0.0, 86_400.0)
    }
}

/// Identity gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Route geofence hits through the identity gate
    pub enabled: bool,

    /// Names that are allowed inside the restricted region
    pub authorized: Vec<String>,

    /// JSON file of known face embeddings, names are authorized
    pub gallery_path: Option<PathBuf>,

    /// Minimum cosine similarity for an embedding match
    pub match_threshold: f32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            authorized: Vec::new(),
            gallery_path: None,
            match_threshold: 0.30,
        }
    }
}

impl IdentityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_range("identity.match_threshold", self.match_threshold as f64, -1.0, 1.0)
    }
}

/// Notification dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Concurrent delivery workers
    pub workers: usize,

    /// Jobs waiting for a worker; submissions beyond this are dropped
    pub queue_capacity: usize,

    /// Extra attempts for transient failures, 0 is fire-and-forget
    pub max_retries: u32,

    /// First retry delay, doubled each attempt
    pub retry_backoff_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 32,
            max_retries: 0,
            retry_backoff_ms: 1000,
        }
    }
}

impl NotificationConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Zero("notification.workers"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("notification.queue_capacity"));
        }
        Ok(())
    }
}

/// Audible alarm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    pub enabled: bool,
    pub frequency_hz: u32,
    pub tone_ms: u64,
    /// Pause after each pulse while active
    pub gap_ms: u64,
    /// Poll interval while inactive
    pub idle_poll_ms: u64,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency_hz: 1000,
            tone_ms: 300,
            gap_ms: 200,
            idle_poll_ms: 100,
        }
    }
}

impl AlarmConfig {
    pub fn tone(&self) -> Duration {
        Duration::from_millis(self.tone_ms)
    }

    pub fn gap(&self) -> Duration {
        Duration::from_millis(self.gap_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.frequency_hz == 0 {
            return Err(ConfigError::Zero("alarm.frequency_hz"));
        }
        if self.idle_poll_ms == 0 {
            return Err(ConfigError::Zero("alarm.idle_poll_ms"));
        }
        Ok(())
    }
}
