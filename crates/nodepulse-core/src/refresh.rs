//! Refresh coordination
//!
//! A single task owns the poll schedule, the retry schedule and the manual
//! trigger queue, and is the only caller of [`SnapshotSource::fetch`]. Each
//! successful fetch is diffed against the previous one, the resulting
//! changes go to a [`ChangeSink`], and the projected view is sent to the UI
//! as a [`CoordinatorEvent`].
//!
//! ```text
//!            tick / trigger                 fetch ok
//!   Idle ───────────────────▶ Refreshing ─────────────▶ Idle
//!                                 │ fetch failed
//!                                 ▼
//!                           ErrorBackoff ── retry ok with data ──▶ Idle
//! ```

use crate::change_log::ChangeSink;
use crate::constants::refresh_intervals;
use crate::diff::StateCache;
use crate::errors::{ConfigError, FetchError, FetchFailure};
use crate::filter::{FilterCriteria, FilteredView, project};
use crate::snapshot::ClusterSnapshot;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, timeout};

/// Producer of cluster snapshots (live cluster or mock)
pub trait SnapshotSource: Send + Sync + 'static {
    /// Fetch the current state of every node and its pods
    fn fetch(&self) -> impl Future<Output = Result<ClusterSnapshot, FetchError>> + Send;

    /// Name shown in the title bar
    fn cluster_name(&self) -> String;
}

/// Timing of the refresh loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub retry_interval: Duration,
    /// Report the first snapshot as additions instead of silently seeding
    pub record_initial: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(refresh_intervals::POLL),
            fetch_timeout: Duration::from_secs(refresh_intervals::FETCH_TIMEOUT),
            retry_interval: Duration::from_secs(refresh_intervals::RETRY),
            record_initial: false,
        }
    }
}

impl RefreshConfig {
    /// Build a config from whole seconds and validate it
    ///
    /// # Examples
    ///
    /// ```
    /// use nodepulse_core::refresh::RefreshConfig;
    ///
    /// assert!(RefreshConfig::from_secs(10, 30, 5).is_ok());
    /// assert!(RefreshConfig::from_secs(10, 30, 0).is_err());
    /// ```
    pub fn from_secs(poll: u64, fetch_timeout: u64, retry: u64) -> Result<Self, ConfigError> {
        let config = Self {
            poll_interval: Duration::from_secs(poll),
            fetch_timeout: Duration::from_secs(fetch_timeout),
            retry_interval: Duration::from_secs(retry),
            record_initial: false,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("poll"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::ZeroInterval("fetch timeout"));
        }
        if self.retry_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("retry"));
        }
        if self.retry_interval > self.poll_interval {
            return Err(ConfigError::RetryExceedsPoll {
                retry: self.retry_interval.as_secs(),
                poll: self.poll_interval.as_secs(),
            });
        }
        Ok(())
    }
}

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshState {
    #[default]
    Idle,
    Refreshing,
    ErrorBackoff,
}

/// Result of one successful refresh
#[derive(Debug, Clone)]
pub struct SnapshotUpdate {
    /// Full, unfiltered snapshot, for re-projecting without a fetch
    pub snapshot: Arc<ClusterSnapshot>,
    pub view: FilteredView,
    /// Number of change events this refresh produced
    pub change_count: usize,
    pub fetched_at: DateTime<Utc>,
}

/// Messages from the coordinator to the UI loop
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    Updated(SnapshotUpdate),
    /// First failure of an episode, formatted for display
    ErrorRaised(FetchFailure),
    ErrorCleared,
}

/// UI-side control of a running coordinator
///
/// The coordinator stops once every clone of its handle has been dropped.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    trigger_tx: mpsc::Sender<()>,
    suppressed_tx: Arc<watch::Sender<bool>>,
    criteria_tx: Arc<watch::Sender<FilterCriteria>>,
    state_rx: watch::Receiver<RefreshState>,
    refreshing: Arc<AtomicBool>,
}

impl RefreshHandle {
    /// Request an immediate refresh
    ///
    /// Returns `false` when the request was dropped: a fetch is already
    /// running or another request is still pending.
    pub fn trigger_refresh(&self) -> bool {
        if self.refreshing.load(Ordering::Acquire) {
            return false;
        }
        self.trigger_tx.try_send(()).is_ok()
    }

    /// Pause scheduled refreshes (manual triggers and retries still run)
    pub fn set_suppressed(&self, suppressed: bool) {
        self.suppressed_tx.send_replace(suppressed);
    }

    pub fn is_suppressed(&self) -> bool {
        *self.suppressed_tx.borrow()
    }

    /// Criteria used to project subsequent snapshots
    pub fn set_criteria(&self, criteria: FilterCriteria) {
        self.criteria_tx.send_replace(criteria);
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    pub fn state(&self) -> RefreshState {
        *self.state_rx.borrow()
    }
}

/// Resets the shared in-flight flag when a refresh ends, however it ends
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Initial,
    Scheduled,
    Manual,
    Retry,
}

/// Owner of the refresh state machine
pub struct RefreshCoordinator<S, K> {
    source: S,
    sink: K,
    cache: StateCache,
    config: RefreshConfig,
    events_tx: mpsc::UnboundedSender<CoordinatorEvent>,
    trigger_rx: mpsc::Receiver<()>,
    suppressed_rx: watch::Receiver<bool>,
    criteria_rx: watch::Receiver<FilterCriteria>,
    state_tx: watch::Sender<RefreshState>,
    refreshing: Arc<AtomicBool>,
    failing: bool,
    seeded: bool,
}

impl<S: SnapshotSource, K: ChangeSink> RefreshCoordinator<S, K> {
    /// Create a coordinator, its control handle and the UI event stream
    ///
    /// Nothing runs until [`RefreshCoordinator::run`] is spawned.
    pub fn new(
        source: S,
        sink: K,
        config: RefreshConfig,
        criteria: FilterCriteria,
    ) -> (
        Self,
        RefreshHandle,
        mpsc::UnboundedReceiver<CoordinatorEvent>,
    ) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        // One slot: a trigger arriving while one is pending is dropped
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (suppressed_tx, suppressed_rx) = watch::channel(false);
        let (criteria_tx, criteria_rx) = watch::channel(criteria);
        let (state_tx, state_rx) = watch::channel(RefreshState::Idle);
        let refreshing = Arc::new(AtomicBool::new(false));

        let handle = RefreshHandle {
            trigger_tx,
            suppressed_tx: Arc::new(suppressed_tx),
            criteria_tx: Arc::new(criteria_tx),
            state_rx,
            refreshing: Arc::clone(&refreshing),
        };

        let coordinator = Self {
            source,
            sink,
            cache: StateCache::new(),
            config,
            events_tx,
            trigger_rx,
            suppressed_rx,
            criteria_rx,
            state_tx,
            refreshing,
            failing: false,
            seeded: false,
        };

        (coordinator, handle, events_rx)
    }

    /// Drive the state machine until the UI goes away
    ///
    /// Fetches once immediately, then follows the poll schedule while
    /// healthy and the retry schedule while failing.
    pub async fn run(mut self) {
        tracing::info!(
            cluster = %self.source.cluster_name(),
            poll_secs = self.config.poll_interval.as_secs(),
            retry_secs = self.config.retry_interval.as_secs(),
            "Refresh coordinator started"
        );

        self.refresh(Trigger::Initial).await;

        let mut poll = schedule(self.config.poll_interval);
        let mut retry = schedule(self.config.retry_interval);

        loop {
            if self.events_tx.is_closed() {
                break;
            }

            let was_failing = self.failing;
            tokio::select! {
                _ = poll.tick(), if !was_failing => {
                    let suppressed = *self.suppressed_rx.borrow();
                    if suppressed {
                        tracing::debug!("Skipping scheduled refresh while suppressed");
                        continue;
                    }
                    self.refresh(Trigger::Scheduled).await;
                }
                _ = retry.tick(), if was_failing => {
                    self.refresh(Trigger::Retry).await;
                }
                trigger = self.trigger_rx.recv() => match trigger {
                    Some(()) => self.refresh(Trigger::Manual).await,
                    None => break,
                },
            }

            match (was_failing, self.failing) {
                (false, true) => retry.reset(),
                (true, false) => poll.reset(),
                _ => {}
            }
        }

        tracing::info!("Refresh coordinator stopped");
    }

    async fn refresh(&mut self, trigger: Trigger) {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(?trigger, "Refresh already in flight");
            return;
        }
        let _in_flight = InFlight(Arc::clone(&self.refreshing));
        self.state_tx.send_replace(RefreshState::Refreshing);

        tracing::debug!(?trigger, "Fetching snapshot");
        let result = match timeout(self.config.fetch_timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.config.fetch_timeout)),
        };

        // Requests made while the fetch was running are already satisfied
        while self.trigger_rx.try_recv().is_ok() {}

        match result {
            Ok(snapshot) if self.failing && snapshot.is_empty() => {
                tracing::debug!("Empty snapshot while recovering, still backing off");
            }
            Ok(snapshot) => {
                self.apply(snapshot);
                if self.failing {
                    self.failing = false;
                    tracing::info!("Fetch recovered");
                    self.emit(CoordinatorEvent::ErrorCleared);
                }
            }
            Err(error) => {
                tracing::warn!(?trigger, error = %error, "Snapshot fetch failed");
                if !self.failing {
                    self.failing = true;
                    self.emit(CoordinatorEvent::ErrorRaised(FetchFailure::from(&error)));
                }
            }
        }

        self.state_tx.send_replace(if self.failing {
            RefreshState::ErrorBackoff
        } else {
            RefreshState::Idle
        });
    }

    fn apply(&mut self, snapshot: ClusterSnapshot) {
        let now = Utc::now();
        let changes = if self.seeded || self.config.record_initial {
            self.cache.reconcile(&snapshot, now)
        } else {
            self.cache.seed(&snapshot);
            Vec::new()
        };
        self.seeded = true;

        if !changes.is_empty() {
            tracing::debug!(count = changes.len(), "Changes detected");
            self.sink.append_changes(&changes);
        }

        let criteria = self.criteria_rx.borrow().clone();
        let view = project(&snapshot, &criteria);
        self.emit(CoordinatorEvent::Updated(SnapshotUpdate {
            snapshot: Arc::new(snapshot),
            view,
            change_count: changes.len(),
            fetched_at: now,
        }));
    }

    fn emit(&self, event: CoordinatorEvent) {
        if self.events_tx.send(event).is_err() {
            tracing::debug!("UI receiver closed, dropping coordinator event");
        }
    }
}

fn schedule(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_log::ChangeLog;
    use crate::errors::ErrorCategory;
    use crate::snapshot::{NodeSnapshot, PodPhase, PodSnapshot};
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Replays scripted results, then keeps returning the fallback
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<ClusterSnapshot, FetchError>>>,
        fallback: ClusterSnapshot,
        delay: Duration,
        calls: Arc<AtomicUsize>,
        started: Instant,
        /// Seconds since creation at which each fetch began
        fetch_times: Arc<Mutex<Vec<u64>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<ClusterSnapshot, FetchError>>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let source = Self {
                script: Mutex::new(script.into()),
                fallback: cluster(true),
                delay: Duration::ZERO,
                calls: Arc::clone(&calls),
                started: Instant::now(),
                fetch_times: Arc::new(Mutex::new(Vec::new())),
            };
            (source, calls)
        }

        fn fetch_times(&self) -> Arc<Mutex<Vec<u64>>> {
            Arc::clone(&self.fetch_times)
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl SnapshotSource for ScriptedSource {
        async fn fetch(&self) -> Result<ClusterSnapshot, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let elapsed = self.started.elapsed().as_secs();
            self.fetch_times.lock().unwrap().push(elapsed);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(self.fallback.clone()))
        }

        fn cluster_name(&self) -> String {
            "scripted".to_string()
        }
    }

    fn cluster(ready: bool) -> ClusterSnapshot {
        let created = DateTime::<Utc>::UNIX_EPOCH;
        let node = NodeSnapshot::new("n1", ready, "v1.30.0", created)
            .with_pod(PodSnapshot::new("web", "default", PodPhase::Running, BTreeMap::new()))
            .with_pod(PodSnapshot::new("dns", "kube-system", PodPhase::Running, BTreeMap::new()));
        std::iter::once(node).collect()
    }

    fn transport() -> Result<ClusterSnapshot, FetchError> {
        Err(FetchError::Transport("connection refused".to_string()))
    }

    fn start(
        source: ScriptedSource,
        config: RefreshConfig,
    ) -> (
        RefreshHandle,
        mpsc::UnboundedReceiver<CoordinatorEvent>,
        Arc<Mutex<ChangeLog>>,
        tokio::task::JoinHandle<()>,
    ) {
        let log = Arc::new(Mutex::new(ChangeLog::default()));
        let (coordinator, handle, rx) =
            RefreshCoordinator::new(source, Arc::clone(&log), config, FilterCriteria::default());
        let task = tokio::spawn(coordinator.run());
        (handle, rx, log, task)
    }

    fn kind(event: &CoordinatorEvent) -> &'static str {
        match event {
            CoordinatorEvent::Updated(_) => "updated",
            CoordinatorEvent::ErrorRaised(_) => "error",
            CoordinatorEvent::ErrorCleared => "cleared",
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(RefreshConfig::default().validate().is_ok());
        assert_eq!(
            RefreshConfig::from_secs(0, 30, 5),
            Err(ConfigError::ZeroInterval("poll"))
        );
        assert_eq!(
            RefreshConfig::from_secs(10, 30, 20),
            Err(ConfigError::RetryExceedsPoll {
                retry: 20,
                poll: 10,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_fetch_seeds_without_changes() {
        let (source, calls) = ScriptedSource::new(vec![Ok(cluster(true)), Ok(cluster(false))]);
        let (_handle, mut rx, log, _task) = start(source, RefreshConfig::default());

        let Some(CoordinatorEvent::Updated(first)) = rx.recv().await else {
            panic!("expected an update");
        };
        assert_eq!(first.change_count, 0);
        assert_eq!(first.view.nodes.len(), 1);
        assert!(log.lock().unwrap().is_empty());

        // Next poll tick reports the readiness flip
        let Some(CoordinatorEvent::Updated(second)) = rx.recv().await else {
            panic!("expected an update");
        };
        assert_eq!(second.change_count, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_trigger_coalesces() {
        let (source, calls) = ScriptedSource::new(vec![]);
        let (handle, mut rx, _log, _task) = start(source, RefreshConfig::default());
        assert!(matches!(rx.recv().await, Some(CoordinatorEvent::Updated(_))));

        assert!(handle.trigger_refresh());
        assert!(!handle.trigger_refresh());

        assert!(matches!(rx.recv().await, Some(CoordinatorEvent::Updated(_))));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_during_fetch_is_ignored() {
        let (source, calls) = ScriptedSource::new(vec![]);
        let source = source.with_delay(Duration::from_secs(2));
        let (handle, mut rx, _log, _task) = start(source, RefreshConfig::default());
        assert!(matches!(rx.recv().await, Some(CoordinatorEvent::Updated(_))));

        assert!(handle.trigger_refresh());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(handle.is_refreshing());
        assert_eq!(handle.state(), RefreshState::Refreshing);
        assert!(!handle.trigger_refresh());

        assert!(matches!(rx.recv().await, Some(CoordinatorEvent::Updated(_))));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!handle.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_raised_once_per_episode() {
        let (source, calls) =
            ScriptedSource::new(vec![transport(), transport(), transport(), Ok(cluster(true))]);
        let (handle, mut rx, _log, _task) = start(source, RefreshConfig::default());

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            seen.push(kind(&event));
            if matches!(event, CoordinatorEvent::ErrorCleared) {
                break;
            }
        }
        assert_eq!(seen, vec!["error", "updated", "cleared"]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(handle.state(), RefreshState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_snapshot_does_not_end_backoff() {
        let (source, calls) = ScriptedSource::new(vec![
            transport(),
            Ok(ClusterSnapshot::new()),
            Ok(cluster(true)),
        ]);
        let (_handle, mut rx, _log, _task) = start(source, RefreshConfig::default());

        assert!(matches!(rx.recv().await, Some(CoordinatorEvent::ErrorRaised(_))));
        let Some(CoordinatorEvent::Updated(update)) = rx.recv().await else {
            panic!("expected an update");
        };
        assert!(!update.snapshot.is_empty());
        assert!(matches!(rx.recv().await, Some(CoordinatorEvent::ErrorCleared)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_cadence_follows_poll_and_retry_intervals() {
        let (source, _calls) = ScriptedSource::new(vec![
            Ok(cluster(true)),
            transport(),
            transport(),
            Ok(ClusterSnapshot::new()),
            transport(),
            Ok(cluster(true)),
        ]);
        let fetch_times = source.fetch_times();
        let (_handle, mut rx, _log, _task) = start(source, RefreshConfig::default());

        let mut seen = Vec::new();
        while seen.len() < 7 {
            let event = rx.recv().await.expect("coordinator stopped");
            seen.push(kind(&event));
        }

        // Poll every 10s, retry every 5s while failing, polling resumes
        // a full period after recovery
        assert_eq!(
            *fetch_times.lock().unwrap(),
            vec![0, 10, 15, 20, 25, 30, 40, 50, 60]
        );
        assert_eq!(
            seen,
            vec![
                "updated", "error", "updated", "cleared", "updated", "updated", "updated",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_is_a_failure() {
        let (source, _calls) = ScriptedSource::new(vec![]);
        let source = source.with_delay(Duration::from_secs(60));
        let (handle, mut rx, _log, _task) = start(source, RefreshConfig::default());

        let Some(CoordinatorEvent::ErrorRaised(failure)) = rx.recv().await else {
            panic!("expected an error");
        };
        assert!(failure.message.contains("timed out after 30s"));
        assert_eq!(failure.category, ErrorCategory::Timeout);
        assert_eq!(handle.state(), RefreshState::ErrorBackoff);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppressed_skips_scheduled_but_not_manual() {
        let (source, calls) = ScriptedSource::new(vec![]);
        let (handle, mut rx, _log, _task) = start(source, RefreshConfig::default());
        assert!(matches!(rx.recv().await, Some(CoordinatorEvent::Updated(_))));

        handle.set_suppressed(true);
        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());

        assert!(handle.trigger_refresh());
        assert!(matches!(rx.recv().await, Some(CoordinatorEvent::Updated(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        handle.set_suppressed(false);
        assert!(matches!(rx.recv().await, Some(CoordinatorEvent::Updated(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_criteria_apply_to_next_projection() {
        let (source, _calls) = ScriptedSource::new(vec![]);
        let (handle, mut rx, _log, _task) = start(source, RefreshConfig::default());
        assert!(matches!(rx.recv().await, Some(CoordinatorEvent::Updated(_))));

        handle.set_criteria(FilterCriteria::from_namespace_args(["kube-system"]));
        assert!(handle.trigger_refresh());
        let Some(CoordinatorEvent::Updated(update)) = rx.recv().await else {
            panic!("expected an update");
        };
        assert_eq!(update.view.nodes[0].pod_count, "1 (2)");
        // The unfiltered snapshot travels alongside the view
        assert_eq!(update.snapshot.pod_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_handle_dropped() {
        let (source, _calls) = ScriptedSource::new(vec![]);
        let (handle, mut rx, _log, task) = start(source, RefreshConfig::default());
        assert!(matches!(rx.recv().await, Some(CoordinatorEvent::Updated(_))));

        drop(handle);
        assert!(task.await.is_ok());
    }
}
