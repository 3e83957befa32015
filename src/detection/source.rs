// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! JSON-lines replay of recorded detector output
//!
//! Each line is one frame:
//!
//! ```text
//! {"frame": 12, "image": "frames/000012.jpg", "detections": [{"bbox": {...}, "confidence": 0.8}]}
//! ```
//!
//! Image paths are resolved relative to the replay file. Frame decimation
//! (`stride`) happens here, upstream of the engine.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Detection, Frame};

#[derive(Debug, Deserialize)]
struct FrameRecord {
    frame: u64,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    image: Option<PathBuf>,
    #[serde(default)]
    detections: Vec<Detection>,
}

/// Iterator over frames from a recorded detection stream
pub struct ReplaySource {
    reader: Box<dyn BufRead + Send>,
    base_dir: PathBuf,
    stride: u64,
    line_no: usize,
    frames_read: u64,
}

impl ReplaySource {
    /// Open a replay file, `-` reads standard input
    pub fn open(path: &Path, stride: u64) -> Result<Self> {
        if path.as_os_str() == "-" {
            return Ok(Self::from_reader(BufReader::new(io::stdin()), PathBuf::from("."), stride));
        }

        let file = File::open(path).with_context(|| format!("opening replay file {:?}", path))?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self::from_reader(BufReader::new(file), base_dir, stride))
    }

    pub fn from_reader(reader: impl BufRead + Send + 'static, base_dir: PathBuf, stride: u64) -> Self {
        Self {
            reader: Box::new(reader),
            base_dir,
            stride: stride.max(1),
            line_no: 0,
            frames_read: 0,
        }
    }

    fn load_image(&self, image: &Path) -> Vec<u8> {
        let path = if image.is_absolute() {
            image.to_path_buf()
        } else {
            self.base_dir.join(image)
        };
        match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = ?path, error = %e, "Snapshot image unreadable, continuing without it");
                Vec::new()
            }
        }
    }

    fn build_frame(&self, record: FrameRecord) -> Frame {
        let image = record
            .image
            .as_deref()
            .map(|p| self.load_image(p))
            .unwrap_or_default();

        let detections = record
            .detections
            .into_iter()
            .map(|mut d| {
                d.frame = record.frame;
                d
            })
            .collect();

        Frame {
            seq: record.frame,
            captured_at: record.timestamp.unwrap_or_else(Utc::now),
            image,
            detections,
        }
    }
}

impl Iterator for ReplaySource {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let record: FrameRecord = match serde_json::from_str(trimmed) {
                Ok(record) => record,
                Err(e) => {
                    return Some(Err(anyhow::anyhow!(
                        "malformed frame record on line {}: {}",
                        self.line_no,
                        e
                    )))
                }
            };

            self.frames_read += 1;
            if (self.frames_read - 1) % self.stride != 0 {
                debug!(frame = record.frame, "skipping frame (stride)");
                continue;
            }

            return Some(Ok(self.build_frame(record)));
        }
    }
}
