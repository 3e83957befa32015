// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/sentryline

//! Bounded, non-blocking notification dispatcher
//!
//! `submit` never waits: it places the job on a bounded queue or reports that
//! the queue is full. A fixed pool of workers drains the queue, stores the
//! snapshot, then hands the job to the transport. Failures stop at the worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{DeliveryError, NotificationJob, NotificationTransport, SnapshotStore};
use crate::config::NotificationConfig;

/// Job was not accepted
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("notification queue full, job {0} dropped")]
    QueueFull(uuid::Uuid),

    #[error("dispatcher is shut down")]
    Closed,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

/// Point-in-time dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    pub submitted: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub failed: u64,
    pub retried: u64,
}

#[derive(Clone, Copy)]
struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

/// Fire-and-forget front of the worker pool
pub struct NotificationDispatcher {
    tx: Option<mpsc::Sender<NotificationJob>>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
    transport_name: String,
}

impl NotificationDispatcher {
    /// Spawn the worker pool on `handle`
    pub fn start(
        handle: &Handle,
        transport: Arc<dyn NotificationTransport>,
        store: SnapshotStore,
        config: &NotificationConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let counters = Arc::new(Counters::default());
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        };
        let transport_name = transport.name().to_string();

        let workers = (0..config.workers.max(1))
            .map(|worker| {
                handle.spawn(worker_loop(
                    worker,
                    rx.clone(),
                    transport.clone(),
                    store.clone(),
                    counters.clone(),
                    retry,
                ))
            })
            .collect();

        info!(
            workers = config.workers,
            queue = config.queue_capacity,
            transport = %transport_name,
            "Notification dispatcher started"
        );

        Self {
            tx: Some(tx),
            workers,
            counters,
            transport_name,
        }
    }

    /// Queue a job without blocking
    pub fn submit(&self, job: NotificationJob) -> Result<(), SubmitError> {
        let tx = self.tx.as_ref().ok_or(SubmitError::Closed)?;
        let id = job.id;
        match tx.try_send(job) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                Err(SubmitError::QueueFull(id))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SubmitError::Closed),
        }
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
        }
    }

    pub fn transport_name(&self) -> &str {
        &self.transport_name
    }

    /// Stop accepting jobs and let queued and in-flight jobs finish
    pub async fn shutdown(mut self) -> DispatchStats {
        self.tx.take();
        for result in join_all(self.workers.drain(..)).await {
            if let Err(e) = result {
                error!(error = %e, "notification worker panicked");
            }
        }
        let stats = self.stats();
        info!(?stats, "Notification dispatcher stopped");
        stats
    }
}

async fn worker_loop(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<NotificationJob>>>,
    transport: Arc<dyn NotificationTransport>,
    store: SnapshotStore,
    counters: Arc<Counters>,
    retry: RetryPolicy,
) {
    loop {
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else {
            debug!(worker, "notification worker exiting");
            break;
        };

        if let Err(e) = store.persist(&job).await {
            warn!(job = %job.id, error = %e, "snapshot not stored, sending anyway");
        }

        match deliver_with_retry(transport.as_ref(), &job, retry, &counters).await {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                if e.is_transient() {
                    warn!(job = %job.id, transport = transport.name(), error = %e, "Alert notification failed");
                } else {
                    error!(job = %job.id, transport = transport.name(), error = %e, "Alert notification failed permanently");
                }
            }
        }
    }
}

async fn deliver_with_retry(
    transport: &dyn NotificationTransport,
    job: &NotificationJob,
    retry: RetryPolicy,
    counters: &Counters,
) -> Result<(), DeliveryError> {
    let mut attempt = 0;
    loop {
        match transport.deliver(job).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() && attempt < retry.max_retries => {
                let delay = retry.backoff.saturating_mul(1u32 << attempt.min(16));
                attempt += 1;
                counters.retried.fetch_add(1, Ordering::Relaxed);
                warn!(job = %job.id, attempt, error = %e, "delivery failed, retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::AlertKind;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;
    use uuid::Uuid;

    struct Recording {
        delivered: parking_lot::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationTransport for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn deliver(&self, job: &NotificationJob) -> Result<(), DeliveryError> {
            self.delivered.lock().push(job.subject.clone());
            Ok(())
        }
    }

    struct Flaky {
        failures_left: AtomicUsize,
        calls: AtomicUsize,
        permanent: bool,
    }

    #[async_trait]
    impl NotificationTransport for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn deliver(&self, _job: &NotificationJob) -> Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) == 0 {
                return Ok(());
            }
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            if self.permanent {
                Err(DeliveryError::Permanent("535 auth failed".into()))
            } else {
                Err(DeliveryError::Transient("connection reset".into()))
            }
        }
    }

    fn job(store: &SnapshotStore, n: u64) -> NotificationJob {
        NotificationJob {
            id: Uuid::new_v4(),
            kind: AlertKind::AreaIntrusion,
            subject: format!("alert {}", n),
            body: "PERSON DETECTED IN RESTRICTED AREA.".into(),
            snapshot: vec![n as u8],
            snapshot_path: store.path_for(n, AlertKind::AreaIntrusion, None),
            created_at: Utc::now(),
        }
    }

    fn config(workers: usize, queue: usize, retries: u32) -> NotificationConfig {
        NotificationConfig {
            workers,
            queue_capacity: queue,
            max_retries: retries,
            retry_backoff_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_jobs_delivered_and_snapshots_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let transport = Arc::new(Recording {
            delivered: parking_lot::Mutex::new(Vec::new()),
        });
        let dispatcher =
            NotificationDispatcher::start(&Handle::current(), transport.clone(), store.clone(), &config(2, 8, 0));
        assert_eq!(dispatcher.transport_name(), "recording");

        for n in 0..3 {
            dispatcher.submit(job(&store, n)).unwrap();
        }
        let stats = dispatcher.shutdown().await;

        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.delivered, 3);
        assert_eq!(transport.delivered.lock().len(), 3);
        assert_eq!(std::fs::read(store.path_for(2, AlertKind::AreaIntrusion, None)).unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let transport = Arc::new(Recording {
            delivered: parking_lot::Mutex::new(Vec::new()),
        });
        // Current-thread runtime: workers cannot run until we yield
        let dispatcher =
            NotificationDispatcher::start(&Handle::current(), transport, store.clone(), &config(1, 2, 0));

        assert!(dispatcher.submit(job(&store, 0)).is_ok());
        assert!(dispatcher.submit(job(&store, 1)).is_ok());
        assert!(matches!(dispatcher.submit(job(&store, 2)), Err(SubmitError::QueueFull(_))));

        let stats = dispatcher.shutdown().await;
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.delivered, 2);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_within_budget() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let transport = Arc::new(Flaky {
            failures_left: AtomicUsize::new(2),
            calls: AtomicUsize::new(0),
            permanent: false,
        });
        let dispatcher =
            NotificationDispatcher::start(&Handle::current(), transport.clone(), store.clone(), &config(1, 4, 2));

        dispatcher.submit(job(&store, 0)).unwrap();
        let stats = dispatcher.shutdown().await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(stats.retried, 2);
        assert_eq!(stats.delivered, 1);
    }

    #[tokio::test]
    async fn test_failures_are_contained() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let transport = Arc::new(Flaky {
            failures_left: AtomicUsize::new(1),
            calls: AtomicUsize::new(0),
            permanent: true,
        });
        let dispatcher =
            NotificationDispatcher::start(&Handle::current(), transport.clone(), store.clone(), &config(1, 4, 3));

        dispatcher.submit(job(&store, 0)).unwrap();
        dispatcher.submit(job(&store, 1)).unwrap();
        let stats = dispatcher.shutdown().await;

        // Permanent failures are never retried
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.retried, 0);
    }

    #[tokio::test]
    async fn test_fire_and_forget_default_has_no_retry() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let transport = Arc::new(Flaky {
            failures_left: AtomicUsize::new(1),
            calls: AtomicUsize::new(0),
            permanent: false,
        });
        let dispatcher = NotificationDispatcher::start(
            &Handle::current(),
            transport.clone(),
            store.clone(),
            &NotificationConfig::default(),
        );

        dispatcher.submit(job(&store, 0)).unwrap();
        let stats = dispatcher.shutdown().await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.failed, 1);
    }
}
