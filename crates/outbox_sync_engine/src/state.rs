//! Drain engine state machine.

use crate::config::{CoalescePolicy, SyncConfig};
use crate::error::{SyncError, TransportFailure};
use crate::notify::{NoopSink, NotificationSink, Severity};
use crate::transport::{DeliveryResponse, DeliveryTransport};
use chrono::{DateTime, Utc};
use outbox_core::{ChangeRecord, RecordId, RecordStore};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Where the engine currently is within a drain run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run is active.
    Idle,
    /// Reading the snapshot of staged records.
    Fetching,
    /// Waiting for the outcome of record `index` out of `total`.
    Delivering {
        /// Zero-based position in the snapshot.
        index: usize,
        /// Snapshot size.
        total: usize,
    },
    /// The run stopped early and is returning to idle.
    Aborted,
}

impl RunState {
    /// Returns true while a run is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(self, RunState::Idle)
    }
}

/// A record the endpoint answered with a non-success status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Rejected record.
    pub id: RecordId,
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl From<Rejection> for SyncError {
    fn from(r: Rejection) -> Self {
        SyncError::Rejected {
            id: r.id,
            status: r.status,
            body: r.body,
        }
    }
}

/// How a drain trigger ended.
#[derive(Debug)]
pub enum DrainOutcome {
    /// Every record of the snapshot was attempted.
    Completed,
    /// The run stopped early; the remaining records stay staged.
    Aborted(SyncError),
    /// Another run was active; this trigger started nothing.
    Coalesced,
}

/// Result of one drain trigger.
#[derive(Debug)]
pub struct DrainReport {
    /// Outcome of the last pass.
    pub outcome: DrainOutcome,
    /// Passes performed (more than one when triggers were coalesced into
    /// this run).
    pub passes: u32,
    /// Records found in the snapshots.
    pub found: usize,
    /// Records for which the endpoint was called.
    pub attempted: usize,
    /// Records accepted and removed, in delivery order.
    pub delivered: Vec<RecordId>,
    /// Records rejected and kept.
    pub rejected: Vec<Rejection>,
    /// Wall time spent.
    pub duration: Duration,
}

impl DrainReport {
    fn empty(outcome: DrainOutcome) -> Self {
        Self {
            outcome,
            passes: 0,
            found: 0,
            attempted: 0,
            delivered: Vec::new(),
            rejected: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Returns true if the last pass attempted its whole snapshot.
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, DrainOutcome::Completed)
    }

    /// Returns true if the last pass stopped early.
    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, DrainOutcome::Aborted(_))
    }

    /// Returns true if the trigger was coalesced into an active run.
    pub fn was_coalesced(&self) -> bool {
        matches!(self.outcome, DrainOutcome::Coalesced)
    }

    fn absorb(&mut self, next: DrainReport) {
        self.outcome = next.outcome;
        self.passes += next.passes;
        self.found += next.found;
        self.attempted += next.attempted;
        self.delivered.extend(next.delivered);
        self.rejected.extend(next.rejected);
        self.duration += next.duration;
    }
}

/// Cumulative statistics.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Passes started.
    pub runs_started: u64,
    /// Passes that attempted their whole snapshot.
    pub runs_completed: u64,
    /// Passes that stopped early.
    pub runs_aborted: u64,
    /// Triggers that arrived during an active run.
    pub runs_coalesced: u64,
    /// Records accepted and removed.
    pub delivered: u64,
    /// Rejections observed.
    pub rejected: u64,
    /// Message of the last abort.
    pub last_error: Option<String>,
    /// End of the last pass.
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Drains the record store against a remote endpoint.
///
/// Cloning is cheap and clones share the run guard, so any number of
/// trigger sources can hold one.
pub struct SyncEngine<T: DeliveryTransport> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    config: SyncConfig,
    store: RecordStore,
    transport: T,
    sink: Arc<dyn NotificationSink>,
    running: AtomicBool,
    follow_up: AtomicBool,
    state: RwLock<RunState>,
    stats: RwLock<SyncStats>,
}

impl<T: DeliveryTransport> Clone for SyncEngine<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: DeliveryTransport> SyncEngine<T> {
    /// Creates an engine that discards notifications.
    pub fn new(config: SyncConfig, store: RecordStore, transport: T) -> Self {
        Self::with_sink(config, store, transport, NoopSink)
    }

    /// Creates an engine reporting to `sink`.
    pub fn with_sink(
        config: SyncConfig,
        store: RecordStore,
        transport: T,
        sink: impl NotificationSink + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                transport,
                sink: Arc::new(sink),
                running: AtomicBool::new(false),
                follow_up: AtomicBool::new(false),
                state: RwLock::new(RunState::Idle),
                stats: RwLock::new(SyncStats::default()),
            }),
        }
    }

    /// Gets the current run state.
    pub fn run_state(&self) -> RunState {
        *self.inner.state.read()
    }

    /// Returns true while a run is active.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Gets the cumulative stats.
    pub fn stats(&self) -> SyncStats {
        self.inner.stats.read().clone()
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Gets the transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Gets the store.
    pub fn store(&self) -> &RecordStore {
        &self.inner.store
    }

    /// Manual trigger; same as [`drain`](Self::drain).
    pub async fn sync_now(&self) -> DrainReport {
        self.drain().await
    }

    /// Runs one drain, unless one is already active.
    ///
    /// A trigger that finds a run active returns [`DrainOutcome::Coalesced`]
    /// at once. With [`CoalescePolicy::FollowUp`] the active run then makes
    /// one more pass before it returns.
    ///
    /// Never fails: every problem is reported through the notification
    /// sink and in the returned report.
    pub async fn drain(&self) -> DrainReport {
        let inner = &self.inner;
        if inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            inner.stats.write().runs_coalesced += 1;
            if inner.config.coalesce == CoalescePolicy::FollowUp {
                inner.follow_up.store(true, Ordering::SeqCst);
            }
            debug!(policy = ?inner.config.coalesce, "drain already running, trigger coalesced");
            return DrainReport::empty(DrainOutcome::Coalesced);
        }

        let mut report = self.run_pass().await;
        loop {
            if inner.follow_up.swap(false, Ordering::SeqCst) {
                debug!("running follow-up pass");
                report.absorb(self.run_pass().await);
                continue;
            }
            inner.running.store(false, Ordering::SeqCst);

            // A trigger may have landed between the swap and the release.
            if !inner.follow_up.load(Ordering::SeqCst)
                || inner
                    .running
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
            {
                break;
            }
        }
        report
    }

    /// Starts the automatic triggers.
    ///
    /// Drains once right away if `online` currently reads true, then once
    /// per offline→online transition. The task ends when the sender side
    /// of the channel is dropped.
    pub fn spawn(&self, mut online: watch::Receiver<bool>) -> JoinHandle<()>
    where
        T: 'static,
    {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut was_online = *online.borrow_and_update();
            if was_online {
                info!("online at startup, draining outbox");
                engine.trigger();
            } else {
                debug!("offline at startup, waiting for connectivity");
            }

            while online.changed().await.is_ok() {
                let now_online = *online.borrow_and_update();
                if now_online && !was_online {
                    info!("connectivity regained, draining outbox");
                    engine.trigger();
                }
                was_online = now_online;
            }
            debug!("connectivity source closed, trigger loop exiting");
        })
    }

    fn trigger(&self)
    where
        T: 'static,
    {
        let engine = self.clone();
        tokio::spawn(async move {
            engine.drain().await;
        });
    }

    async fn run_pass(&self) -> DrainReport {
        let inner = &self.inner;
        let started = Instant::now();
        let mut report = DrainReport::empty(DrainOutcome::Completed);
        report.passes = 1;
        inner.stats.write().runs_started += 1;

        self.set_state(RunState::Fetching);
        let snapshot = match inner.store.list_all().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "could not read pending changes");
                self.notify(&format!("Could not read pending changes: {e}"), Severity::Error);
                report.outcome = DrainOutcome::Aborted(SyncError::Store(e));
                return self.finish(report, started);
            }
        };

        report.found = snapshot.len();
        if snapshot.is_empty() {
            info!("no pending changes");
            self.notify("Nothing to sync", Severity::Info);
            return self.finish(report, started);
        }

        info!(pending = snapshot.len(), "draining outbox");
        self.notify(
            &format!("Found {} pending change(s) to sync", snapshot.len()),
            Severity::Info,
        );

        let total = snapshot.len();
        for (index, record) in snapshot.iter().enumerate() {
            self.set_state(RunState::Delivering { index, total });
            report.attempted += 1;

            match self.deliver(record).await {
                Err(failure) => {
                    warn!(
                        record_id = %record.id,
                        remaining = total - index,
                        error = %failure,
                        "transport failure, aborting drain"
                    );
                    self.notify("Network error, sync stopped", Severity::Warning);
                    report.outcome = DrainOutcome::Aborted(failure.into());
                    break;
                }
                Ok(response) if response.is_success() => {
                    if let Err(e) = inner.store.delete_by_id(record.id).await {
                        error!(record_id = %record.id, error = %e, "accepted change could not be removed");
                        self.notify(
                            &format!(
                                "Change {} was accepted but could not be removed from the queue: {e}",
                                record.id
                            ),
                            Severity::Error,
                        );
                        report.outcome = DrainOutcome::Aborted(SyncError::Store(e));
                        break;
                    }
                    debug!(record_id = %record.id, status = response.status, "change delivered");
                    self.notify(&format!("Change {} synced", record.id), Severity::Success);
                    report.delivered.push(record.id);
                }
                Ok(response) => {
                    let rejection = Rejection {
                        id: record.id,
                        status: response.status,
                        body: response.body,
                    };
                    warn!(
                        record_id = %record.id,
                        status = rejection.status,
                        body = %rejection.body,
                        "change rejected, keeping it queued"
                    );
                    self.notify(
                        &format!(
                            "Server error ({}) while syncing change {}",
                            rejection.status, record.id
                        ),
                        Severity::Error,
                    );
                    report.rejected.push(rejection);
                }
            }
        }

        if report.is_completed() {
            self.notify("Sync completed", Severity::Success);
        }
        self.finish(report, started)
    }

    async fn deliver(&self, record: &ChangeRecord) -> Result<DeliveryResponse, TransportFailure> {
        let timeout = self.inner.config.request_timeout;
        match tokio::time::timeout(timeout, self.inner.transport.deliver(record)).await {
            Ok(result) => result,
            Err(_) => Err(TransportFailure::Timeout(timeout)),
        }
    }

    fn finish(&self, mut report: DrainReport, started: Instant) -> DrainReport {
        report.duration = started.elapsed();

        if let DrainOutcome::Aborted(e) = &report.outcome {
            self.set_state(RunState::Aborted);
            let mut stats = self.inner.stats.write();
            stats.runs_aborted += 1;
            stats.last_error = Some(e.to_string());
        } else {
            self.inner.stats.write().runs_completed += 1;
        }

        {
            let mut stats = self.inner.stats.write();
            stats.delivered += report.delivered.len() as u64;
            stats.rejected += report.rejected.len() as u64;
            stats.last_run_at = Some(Utc::now());
        }

        info!(
            delivered = report.delivered.len(),
            rejected = report.rejected.len(),
            aborted = report.is_aborted(),
            elapsed_ms = report.duration.as_millis() as u64,
            "drain pass finished"
        );
        self.set_state(RunState::Idle);
        report
    }

    fn set_state(&self, state: RunState) {
        *self.inner.state.write() = state;
    }

    fn notify(&self, message: &str, severity: Severity) {
        self.inner.sink.notify(message, severity);
    }
}
