//! Multi-job live-progress store and connection manager.
//!
//! One `JobTracker` owns the progress snapshot, the bounded event log, and
//! the live connection for every tracked job. All three maps live behind a
//! single lock, so each reaction (message, open, error, close, stop) runs to
//! completion before readers see it, and `stop_tracking` clears a job
//! atomically. Progress is never persisted; this is a live cache, the
//! backend keeps the durable records.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::logging::LogThrottle;
use crate::transport::{StreamConnection, StreamTransport, TransportError};

use super::events::ScrapeEvent;
use super::progress::{JobProgress, ProgressUpdate, status};

/// Liveness message sent to keep intermediaries from reclaiming an idle
/// stream. The backend answers "pong"; the reply is ignored.
pub const KEEPALIVE_MESSAGE: &str = "ping";

/// Default keepalive period.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Default cap on retained events per job, oldest dropped first.
pub const EVENT_LOG_LIMIT: usize = 100;

struct ConnectionHandle {
    /// Tracking-session id; reactions from superseded sessions are dropped.
    epoch: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct TrackerState {
    progress: HashMap<String, JobProgress>,
    events: HashMap<String, VecDeque<ScrapeEvent>>,
    connections: HashMap<String, ConnectionHandle>,
}

impl TrackerState {
    fn is_current(&self, job_id: &str, epoch: u64) -> bool {
        self.connections
            .get(job_id)
            .is_some_and(|handle| handle.epoch == epoch)
    }
}

struct TrackerInner {
    transport: Arc<dyn StreamTransport>,
    state: RwLock<TrackerState>,
    epochs: AtomicU64,
    keepalive_interval: Duration,
    event_log_limit: usize,
    event_throttle: LogThrottle,
}

/// In-memory tracker for live scrape-job progress.
///
/// Cheap to clone; clones share state. Construct one per backend (or per
/// test) rather than holding a global.
#[derive(Clone)]
pub struct JobTracker {
    inner: Arc<TrackerInner>,
}

impl JobTracker {
    pub fn new(transport: Arc<dyn StreamTransport>) -> Self {
        Self::with_settings(transport, KEEPALIVE_INTERVAL, EVENT_LOG_LIMIT)
    }

    pub fn with_settings(
        transport: Arc<dyn StreamTransport>,
        keepalive_interval: Duration,
        event_log_limit: usize,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                transport,
                state: RwLock::new(TrackerState::default()),
                epochs: AtomicU64::new(0),
                keepalive_interval,
                event_log_limit,
                event_throttle: LogThrottle::new(Duration::from_millis(500)),
            }),
        }
    }

    /// Begin tracking `job_id`, streaming from `locator`.
    ///
    /// Idempotent re-subscription: any prior session for the same id is
    /// cancelled and its accumulated state discarded before the fresh
    /// `connecting` snapshot and empty log are installed. Returns once the
    /// connection task is spawned; the open itself happens asynchronously.
    pub async fn start_tracking(&self, job_id: &str, locator: &str) {
        let cancel = CancellationToken::new();
        let epoch = self.inner.epochs.fetch_add(1, Ordering::Relaxed) + 1;

        {
            let mut state = self.inner.state.write().await;
            if let Some(prev) = state.connections.remove(job_id) {
                prev.cancel.cancel();
            }
            state
                .progress
                .insert(job_id.to_string(), JobProgress::connecting(job_id));
            state.events.insert(job_id.to_string(), VecDeque::new());
            state.connections.insert(
                job_id.to_string(),
                ConnectionHandle {
                    epoch,
                    cancel: cancel.clone(),
                },
            );
        }

        info!(job_id, locator, "tracking started");

        let inner = self.inner.clone();
        let job_id = job_id.to_string();
        let locator = locator.to_string();
        tokio::spawn(async move {
            run_connection(inner, job_id, locator, epoch, cancel).await;
        });
    }

    /// Stop tracking `job_id`: tear down the connection and drop the job's
    /// progress and log in one step. Safe to call repeatedly or for ids
    /// that were never tracked.
    pub async fn stop_tracking(&self, job_id: &str) {
        let mut state = self.inner.state.write().await;
        if let Some(handle) = state.connections.remove(job_id) {
            handle.cancel.cancel();
        }
        let had_state = state.progress.remove(job_id).is_some();
        state.events.remove(job_id);
        drop(state);

        if had_state {
            info!(job_id, "tracking stopped");
        }
    }

    /// Current progress snapshot for `job_id`, if tracked (or retained
    /// after a disconnect).
    pub async fn progress(&self, job_id: &str) -> Option<JobProgress> {
        let state = self.inner.state.read().await;
        state.progress.get(job_id).cloned()
    }

    /// Snapshot of the retained event log for `job_id`, oldest first.
    /// Empty for untracked ids.
    pub async fn events(&self, job_id: &str) -> Vec<ScrapeEvent> {
        let state = self.inner.state.read().await;
        state
            .events
            .get(job_id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Merge a caller-driven partial update into `job_id`'s snapshot.
    /// No-op when the job isn't tracked.
    pub async fn update_progress(&self, job_id: &str, update: ProgressUpdate) {
        let mut state = self.inner.state.write().await;
        if let Some(progress) = state.progress.get_mut(job_id) {
            progress.merge(update);
        }
    }

    /// All known progress snapshots keyed by job id.
    pub async fn snapshot(&self) -> HashMap<String, JobProgress> {
        let state = self.inner.state.read().await;
        state.progress.clone()
    }

    /// Number of jobs with a live connection.
    pub async fn active_count(&self) -> usize {
        let state = self.inner.state.read().await;
        state.connections.len()
    }
}

/// One tracking session: open, pump messages and keepalives, tear down.
///
/// Every state write is guarded by `epoch` so a session that lost a
/// restart race, or whose job was stopped mid-flight, mutates nothing.
async fn run_connection(
    inner: Arc<TrackerInner>,
    job_id: String,
    locator: String,
    epoch: u64,
    cancel: CancellationToken,
) {
    let connect = tokio::select! {
        _ = cancel.cancelled() => return,
        result = inner.transport.connect(&locator) => result,
    };

    let mut conn = match connect {
        Ok(conn) => conn,
        Err(e) => {
            warn!(job_id, error = %e, "failed to open progress stream");
            inner.set_status(&job_id, epoch, status::ERROR).await;
            inner.remove_connection(&job_id, epoch).await;
            return;
        }
    };

    inner.set_status(&job_id, epoch, status::CONNECTED).await;
    debug!(job_id, "progress stream open");

    let period = inner.keepalive_interval;
    let mut keepalive = time::interval_at(time::Instant::now() + period, period);

    enum Wake {
        Cancelled,
        Keepalive,
        Frame(Option<Result<String, TransportError>>),
    }

    loop {
        // Resolve the wakeup first; the handlers below need the connection.
        let wake = tokio::select! {
            _ = cancel.cancelled() => Wake::Cancelled,
            _ = keepalive.tick() => Wake::Keepalive,
            frame = conn.recv() => Wake::Frame(frame),
        };

        match wake {
            Wake::Cancelled => {
                conn.close().await;
                return;
            }
            Wake::Keepalive => {
                // Best-effort liveness signal; no reply expected, no state
                // change. Skipped once the stream reports closed.
                if conn.is_open() {
                    if let Err(e) = conn.send(KEEPALIVE_MESSAGE).await {
                        debug!(job_id, error = %e, "keepalive send failed");
                    }
                }
            }
            Wake::Frame(Some(Ok(text))) => inner.ingest(&job_id, epoch, &text).await,
            Wake::Frame(Some(Err(e))) => {
                // Mark the job errored but keep reading: the stream finishes
                // through its own close sequence.
                warn!(job_id, error = %e, "transport error on progress stream");
                inner.set_status(&job_id, epoch, status::ERROR).await;
            }
            Wake::Frame(None) => {
                // Peer or network close. The connection leaves the live set;
                // the last-known progress and log stay readable until
                // stop_tracking.
                debug!(job_id, "progress stream closed");
                inner.remove_connection(&job_id, epoch).await;
                return;
            }
        }
    }
}

impl TrackerInner {
    /// Record one inbound frame and reduce it into the job's snapshot.
    /// Unparseable text is dropped here and never reaches the log.
    async fn ingest(&self, job_id: &str, epoch: u64, text: &str) {
        let event = match ScrapeEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                debug!(job_id, error = %e, "discarding malformed progress frame");
                return;
            }
        };

        if self.event_throttle.should_log() {
            debug!(job_id, kind = %event.kind, "progress event");
        }

        let mut state = self.state.write().await;
        if !state.is_current(job_id, epoch) {
            return;
        }
        if let Some(log) = state.events.get_mut(job_id) {
            log.push_back(event.clone());
            while log.len() > self.event_log_limit {
                log.pop_front();
            }
        }
        if let Some(progress) = state.progress.get_mut(job_id) {
            progress.apply(&event);
        }
    }

    async fn set_status(&self, job_id: &str, epoch: u64, value: &str) {
        let mut state = self.state.write().await;
        if !state.is_current(job_id, epoch) {
            return;
        }
        if let Some(progress) = state.progress.get_mut(job_id) {
            progress.status = value.to_string();
        }
    }

    async fn remove_connection(&self, job_id: &str, epoch: u64) {
        let mut state = self.state.write().await;
        if state.is_current(job_id, epoch) {
            state.connections.remove(job_id);
        }
    }
}
