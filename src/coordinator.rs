use crate::catalog::Endpoint;
use crate::error::CycleError;
use crate::snapshot::{Snapshot, SourceEntry};
use crate::transport::DeviceApi;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a refresh resolves to: the installed snapshot, or why none was installed.
pub type CycleOutcome = Result<Arc<Snapshot>, CycleError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// No cycle has completed yet
    Unknown,
    /// Every source answered in the last cycle
    Healthy,
    /// Some sources failed but a snapshot was installed
    Degraded,
    /// The last cycle failed outright
    Failed,
}

/// Integration health as seen by the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub status: HealthStatus,
    pub last_cycle: u64,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub degraded_sources: Vec<String>,
    pub error: Option<String>,
}

impl Health {
    fn unknown() -> Self {
        Self {
            status: HealthStatus::Unknown,
            last_cycle: 0,
            last_attempt: None,
            last_success: None,
            degraded_sources: Vec::new(),
            error: None,
        }
    }

    /// Whether the host should show the integration as available.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

/// Polls every catalog endpoint per cycle and publishes the merged snapshot.
///
/// At most one cycle runs at a time. A refresh requested while a cycle is in
/// flight waits for that cycle and returns its outcome instead of starting
/// another one.
pub struct Coordinator {
    device: Arc<dyn DeviceApi>,
    catalog: Vec<Endpoint>,
    interval: Duration,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
    health_tx: watch::Sender<Health>,
    last_outcome: Mutex<Option<CycleOutcome>>,
    completed_cycles: AtomicU64,
}

impl Coordinator {
    pub fn new(device: Arc<dyn DeviceApi>, catalog: &[Endpoint], interval: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(Snapshot::empty()));
        let (health_tx, _) = watch::channel(Health::unknown());

        Self {
            device,
            catalog: catalog.to_vec(),
            interval,
            snapshot_tx,
            health_tx,
            last_outcome: Mutex::new(None),
            completed_cycles: AtomicU64::new(0),
        }
    }

    /// The latest installed snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver notified every time a new snapshot is installed.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_tx.subscribe()
    }

    #[must_use]
    pub fn health(&self) -> Health {
        self.health_tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_health(&self) -> watch::Receiver<Health> {
        self.health_tx.subscribe()
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of cycles that ran to completion, successful or not.
    #[must_use]
    pub fn completed_cycles(&self) -> u64 {
        self.completed_cycles.load(Ordering::Acquire)
    }

    /// Run a cycle now, or join the one already running.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError::AllSourcesFailed`] when no source answered; the
    /// previous snapshot stays installed in that case.
    pub async fn refresh_now(&self) -> CycleOutcome {
        let seen = self.completed_cycles.load(Ordering::Acquire);
        let mut last_outcome = self.last_outcome.lock().await;

        if self.completed_cycles.load(Ordering::Acquire) != seen {
            if let Some(outcome) = last_outcome.as_ref() {
                debug!("Refresh joined the cycle that was already in flight");
                return outcome.clone();
            }
        }

        let outcome = self.run_cycle(seen + 1).await;
        *last_outcome = Some(outcome.clone());
        self.completed_cycles.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    async fn run_cycle(&self, cycle: u64) -> CycleOutcome {
        let started = Utc::now();
        debug!("Starting polling cycle {cycle} over {} sources", self.catalog.len());

        let calls = self.catalog.iter().map(|endpoint| {
            let device = Arc::clone(&self.device);
            async move { (endpoint.name, device.get(endpoint.path).await) }
        });
        let results = futures::future::join_all(calls).await;

        let mut sources = BTreeMap::new();
        let mut failures = Vec::new();
        for (name, result) in results {
            if let Err(e) = &result {
                debug!("Source {name} failed at {} ({})", e.endpoint(), e.kind());
                failures.push((name.to_string(), e.clone()));
            }
            sources.insert(name.to_string(), SourceEntry::from(result));
        }

        let succeeded = sources.len() - failures.len();
        if succeeded == 0 {
            let failed: Vec<String> = failures.iter().map(|(name, _)| name.clone()).collect();
            let err = CycleError::AllSourcesFailed { failures };
            error!("Polling cycle {cycle} failed: {err}");

            self.health_tx.send_modify(|health| {
                health.status = HealthStatus::Failed;
                health.last_cycle = cycle;
                health.last_attempt = Some(started);
                health.degraded_sources = failed;
                health.error = Some(err.to_string());
            });
            return Err(err);
        }

        let snapshot = Arc::new(Snapshot::new(cycle, sources));
        let degraded: Vec<String> = failures.into_iter().map(|(name, _)| name).collect();

        if degraded.is_empty() {
            info!("Polling cycle {cycle} succeeded with all {succeeded} sources");
        } else {
            warn!(
                "Polling cycle {cycle} succeeded with {succeeded} sources; degraded: {}",
                degraded.join(", ")
            );
        }

        self.snapshot_tx.send_replace(Arc::clone(&snapshot));
        self.health_tx.send_replace(Health {
            status: if degraded.is_empty() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            last_cycle: cycle,
            last_attempt: Some(started),
            last_success: snapshot.fetched_at,
            degraded_sources: degraded,
            error: None,
        });

        Ok(snapshot)
    }

    /// Poll on the configured interval until `cancel` fires.
    ///
    /// Ticks are measured from cycle start. Cancelling mid-cycle abandons the
    /// in-flight calls and leaves the last good snapshot installed.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Starting polling loop every {}s over {} sources",
            self.interval.as_secs(),
            self.catalog.len()
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        _ = self.refresh_now() => {}
                    }
                }
            }
        }

        info!("Polling loop stopped");
    }
}
