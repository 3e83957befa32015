// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Snapshot storage for dispatched alerts

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{DeliveryError, NotificationJob};
use crate::detection::TrackId;
use crate::policy::AlertKind;

/// Writes alert snapshots under one directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an alert's snapshot will be written to
    pub fn path_for(&self, frame: u64, kind: AlertKind, track_id: Option<TrackId>) -> PathBuf {
        let name = match track_id {
            Some(id) => format!("frame{}_{}_id{}.jpg", frame, kind.slug(), id),
            None => format!("frame{}_{}.jpg", frame, kind.slug()),
        };
        self.dir.join(name)
    }

    /// Persist the job's snapshot at its reserved path
    pub async fn persist(&self, job: &NotificationJob) -> Result<(), DeliveryError> {
        if let Some(parent) = job.snapshot_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&job.snapshot_path, &job.snapshot).await?;
        debug!(path = ?job.snapshot_path, bytes = job.snapshot.len(), "snapshot stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_snapshot_naming() {
        let store = SnapshotStore::new("detected");
        assert_eq!(
            store.path_for(12, AlertKind::SustainedPosture, Some(3)),
            PathBuf::from("detected/frame12_posture_id3.jpg")
        );
        assert_eq!(
            store.path_for(5, AlertKind::UnauthorizedPresence, None),
            PathBuf::from("detected/frame5_unauthorized.jpg")
        );
    }

    #[tokio::test]
    async fn test_persist_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("detected"));
        let job = NotificationJob {
            id: Uuid::new_v4(),
            kind: AlertKind::AreaIntrusion,
            subject: "s".into(),
            body: "b".into(),
            snapshot: vec![0xFF, 0xD8],
            snapshot_path: store.path_for(1, AlertKind::AreaIntrusion, None),
            created_at: Utc::now(),
        };

        store.persist(&job).await.unwrap();
        assert_eq!(std::fs::read(&job.snapshot_path).unwrap(), vec![0xFF, 0xD8]);
    }
}
