//! Time-bounded snapshot cache.
//!
//! [`GraphCache::get`] never waits on I/O: it hands out the published
//! `Arc<GraphSnapshot>` and, when that snapshot is past its TTL or has been
//! invalidated, starts at most one background rebuild. A rebuild fetches every
//! source concurrently (each under a timeout), builds a fresh snapshot in
//! isolation, and publishes it with a single pointer swap.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use mfgraph_graph::{GraphSnapshot, SnapshotInput, SnapshotStats};
use mfgraph_shared::{CacheConfig, MfGraphError, Result, SnapshotId};
use mfgraph_sources::{FetchOutcome, SourceAdapter, SourceError};

// ---------------------------------------------------------------------------
// Status types
// ---------------------------------------------------------------------------

/// Per-source result of the most recent rebuild attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub name: String,
    pub instances: usize,
    pub namespaces: usize,
    pub types: usize,
    pub errors: Vec<SourceError>,
}

impl SourceReport {
    fn of(outcome: &FetchOutcome) -> Self {
        Self {
            name: outcome.source.clone(),
            instances: outcome.instances.len(),
            namespaces: outcome.namespaces.len(),
            types: outcome.types.len(),
            errors: outcome.errors.clone(),
        }
    }
}

/// The last rebuild that published nothing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildFailure {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Observable cache state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub snapshot_id: SnapshotId,
    pub version: u64,
    pub built_at: DateTime<Utc>,
    /// Seconds since the current snapshot was published; `None` before the first publish.
    pub age_secs: Option<u64>,
    pub ttl_secs: u64,
    pub stale: bool,
    pub rebuilding: bool,
    pub stats: SnapshotStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<RebuildFailure>,
    pub sources: Vec<SourceReport>,
}

// ---------------------------------------------------------------------------
// GraphCache
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CacheState {
    /// When the current snapshot goes stale. `None` until the first attempt.
    deadline: Option<Instant>,
    published_at: Option<Instant>,
    invalidated: bool,
    last_failure: Option<RebuildFailure>,
    sources: Vec<SourceReport>,
}

struct Inner {
    current: RwLock<Arc<GraphSnapshot>>,
    state: Mutex<CacheState>,
    /// A background rebuild has been scheduled and not yet finished.
    scheduled: AtomicBool,
    /// Held for the duration of any rebuild.
    rebuild_lock: tokio::sync::Mutex<()>,
    sources: Vec<Arc<dyn SourceAdapter>>,
    ttl: Duration,
    fetch_timeout: Duration,
}

/// Owns the published snapshot and keeps it fresh.
#[derive(Clone)]
pub struct GraphCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for GraphCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphCache")
            .field("sources", &self.inner.sources.len())
            .field("ttl", &self.inner.ttl)
            .field("version", &self.inner.current.read().version())
            .finish()
    }
}

impl GraphCache {
    /// A cache serving an empty snapshot until the first rebuild.
    pub fn new(sources: Vec<Arc<dyn SourceAdapter>>, config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(Arc::new(GraphSnapshot::empty())),
                state: Mutex::new(CacheState::default()),
                scheduled: AtomicBool::new(false),
                rebuild_lock: tokio::sync::Mutex::new(()),
                sources,
                ttl: config.ttl(),
                fetch_timeout: config.fetch_timeout(),
            }),
        }
    }

    /// The current snapshot. Starts a background rebuild when it is stale.
    pub fn get(&self) -> Arc<GraphSnapshot> {
        let snapshot = self.inner.current.read().clone();
        if self.inner.needs_rebuild() {
            self.spawn_rebuild();
        }
        snapshot
    }

    /// The current snapshot, without any freshness check.
    pub fn peek(&self) -> Arc<GraphSnapshot> {
        self.inner.current.read().clone()
    }

    /// First rebuild, awaited. Used at startup.
    pub async fn initialize(&self) -> Result<Arc<GraphSnapshot>> {
        self.refresh().await
    }

    /// Rebuild now and wait for the result.
    ///
    /// Waits for any rebuild already in flight, then runs its own.
    pub async fn refresh(&self) -> Result<Arc<GraphSnapshot>> {
        let _guard = self.inner.rebuild_lock.lock().await;
        self.inner.rebuild().await
    }

    /// Force a rebuild on the next [`get`](Self::get).
    pub fn invalidate(&self) {
        self.inner.state.lock().invalidated = true;
        debug!("snapshot invalidated");
    }

    pub fn status(&self) -> CacheStatus {
        let snapshot = self.peek();
        let state = self.inner.state.lock();
        let now = Instant::now();
        CacheStatus {
            snapshot_id: snapshot.id(),
            version: snapshot.version(),
            built_at: snapshot.built_at(),
            age_secs: state
                .published_at
                .map(|t| now.saturating_duration_since(t).as_secs()),
            ttl_secs: self.inner.ttl.as_secs(),
            stale: state.invalidated || state.deadline.is_none_or(|d| now >= d),
            rebuilding: self.inner.rebuild_lock.try_lock().is_err(),
            stats: snapshot.stats().clone(),
            last_failure: state.last_failure.clone(),
            sources: state.sources.clone(),
        }
    }

    fn spawn_rebuild(&self) {
        if self
            .inner
            .scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.inner.scheduled.store(false, Ordering::Release);
            warn!("no async runtime; cannot start background rebuild");
            return;
        };

        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            {
                let _guard = inner.rebuild_lock.lock().await;
                // A refresh may have completed while we waited for the lock.
                if inner.needs_rebuild() {
                    if let Err(e) = inner.rebuild().await {
                        debug!(error = %e, "background rebuild published nothing");
                    }
                }
            }
            inner.scheduled.store(false, Ordering::Release);
        });
    }
}

impl Inner {
    fn needs_rebuild(&self) -> bool {
        let state = self.state.lock();
        state.invalidated || state.deadline.is_none_or(|d| Instant::now() >= d)
    }

    /// Fetch, build, publish. Callers hold `rebuild_lock`.
    #[instrument(skip_all, fields(sources = self.sources.len()))]
    async fn rebuild(&self) -> Result<Arc<GraphSnapshot>> {
        self.state.lock().invalidated = false;
        let started = Instant::now();

        let outcomes = fetch_all(&self.sources, self.fetch_timeout).await;
        let reports: Vec<SourceReport> = outcomes.iter().map(SourceReport::of).collect();
        let failed = outcomes.iter().filter(|o| o.is_unreachable()).count();

        if !outcomes.is_empty() && failed == outcomes.len() {
            let message = format!("all {failed} sources unreachable");
            warn!(%message, "rebuild failed, keeping previous snapshot");
            let mut state = self.state.lock();
            state.deadline = Some(Instant::now() + self.ttl);
            state.last_failure = Some(RebuildFailure {
                at: Utc::now(),
                message: message.clone(),
            });
            state.sources = reports;
            return Err(MfGraphError::rebuild_failed(message));
        }

        let mut input = SnapshotInput::default();
        for outcome in outcomes {
            for error in &outcome.errors {
                warn!(source = %error.source, kind = ?error.kind, message = %error.message, "source degraded");
            }
            input.instances.extend(outcome.instances);
            input.namespaces.extend(outcome.namespaces);
            input.types.extend(outcome.types);
        }

        let built = GraphSnapshot::build_from(input);
        let snapshot = {
            let mut current = self.current.write();
            let published = Arc::new(built.with_version(current.version() + 1));
            *current = Arc::clone(&published);
            published
        };

        let now = Instant::now();
        {
            let mut state = self.state.lock();
            state.deadline = Some(now + self.ttl);
            state.published_at = Some(now);
            state.last_failure = None;
            state.sources = reports;
        }

        let stats = snapshot.stats();
        info!(
            version = snapshot.version(),
            instances = stats.instances,
            edges = stats.edges,
            dangling = stats.dangling_references,
            degraded_sources = failed,
            elapsed_ms = now.duration_since(started).as_millis() as u64,
            "snapshot published"
        );
        Ok(snapshot)
    }
}

/// Fetch every source concurrently; a source that exceeds `timeout` counts as unreachable.
///
/// Outcomes come back in source order.
pub async fn fetch_all(sources: &[Arc<dyn SourceAdapter>], timeout: Duration) -> Vec<FetchOutcome> {
    let handles: Vec<_> = sources
        .iter()
        .map(|source| {
            let source = Arc::clone(source);
            tokio::spawn(async move {
                let name = source.name().to_string();
                match tokio::time::timeout(timeout, source.fetch()).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(source = %name, timeout_secs = timeout.as_secs(), "source fetch timed out");
                        FetchOutcome::unreachable(name, format!("timed out after {timeout:?}"))
                    }
                }
            })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (handle, source) in handles.into_iter().zip(sources) {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                warn!(source = %source.name(), error = %e, "source fetch task failed");
                outcomes.push(FetchOutcome::unreachable(source.name(), e.to_string()));
            }
        }
    }
    outcomes
}
