// src/directory_cache.rs

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::AttendanceApi;
use crate::cancel::CancellationToken;
use crate::clock::Clock;
use crate::error::EngineError;
use crate::model::{EmployeeDirectory, EmployeeDirectoryEntry};
use crate::retry::RequestRetrier;

pub const DIRECTORY_KEY: &str = "allEmployees";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

type DirectoryResult = Result<Arc<EmployeeDirectory>, EngineError>;
type SharedFetch = Shared<BoxFuture<'static, DirectoryResult>>;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Default)]
struct Slot {
    entry: Option<CacheEntry<Arc<EmployeeDirectory>>>,
    in_flight: Option<SharedFetch>,
    // Bumped on invalidation; a fetch started under an older generation may
    // not write its result back.
    generation: u64,
}

struct CacheInner {
    api: Arc<dyn AttendanceApi>,
    clock: Arc<dyn Clock>,
    retrier: RequestRetrier,
    ttl: chrono::Duration,
    token: CancellationToken,
    slot: Mutex<Slot>,
}

impl CacheInner {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn is_fresh(&self, entry: &CacheEntry<Arc<EmployeeDirectory>>, now: DateTime<Utc>) -> bool {
        now - entry.fetched_at < self.ttl
    }

    fn complete(
        &self,
        generation: u64,
        result: Result<Vec<EmployeeDirectoryEntry>, EngineError>,
    ) -> DirectoryResult {
        let mut slot = self.lock_slot();
        let current = slot.generation == generation;
        if current {
            slot.in_flight = None;
        }

        match result {
            Ok(entries) => {
                let directory = Arc::new(EmployeeDirectory::from_entries(entries));
                if current {
                    info!("Cached employee directory ({} employees)", directory.len());
                    slot.entry = Some(CacheEntry {
                        value: directory.clone(),
                        fetched_at: self.clock.now(),
                    });
                } else {
                    debug!("Directory fetched before an invalidation; not caching it");
                }
                Ok(directory)
            }
            Err(e) => {
                warn!("Employee directory fetch failed: {}", e);
                Err(e)
            }
        }
    }
}

fn start_fetch(inner: Arc<CacheInner>, generation: u64) -> SharedFetch {
    debug!("Starting employee directory fetch (generation {})", generation);
    let handle = tokio::spawn(async move {
        let result = inner
            .retrier
            .execute(
                "fetch employee details",
                || inner.api.directory(),
                &inner.token,
            )
            .await;
        inner.complete(generation, result)
    });

    async move {
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(EngineError::Internal(format!(
                "directory fetch task failed: {}",
                e
            ))),
        }
    }
    .boxed()
    .shared()
}

/// Stale-while-revalidate cache of the employee directory.
///
/// The cache holds a single entry, stored under [`DIRECTORY_KEY`]. At most
/// one fetch is in flight; every caller that needs to wait
/// joins it and receives the same `Arc`. The fetch runs on its own task under
/// the cache's token, so a caller that stops waiting does not abort it.
/// Clones share the cache.
#[derive(Clone)]
pub struct DirectoryCache {
    inner: Arc<CacheInner>,
}

impl DirectoryCache {
    pub fn new(
        api: Arc<dyn AttendanceApi>,
        clock: Arc<dyn Clock>,
        retrier: RequestRetrier,
        ttl: Duration,
    ) -> Self {
        let ttl = chrono::Duration::from_std(ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_CACHE_TTL_SECS as i64));
        Self {
            inner: Arc::new(CacheInner {
                api,
                clock,
                retrier,
                ttl,
                token: CancellationToken::new(),
                slot: Mutex::new(Slot::default()),
            }),
        }
    }

    /// Returns the directory.
    ///
    /// A fresh entry, or a stale one (which also kicks off a background
    /// refresh), is returned before the first suspension point. A cold or
    /// forced read waits for the shared fetch.
    pub async fn get(&self, force_refresh: bool) -> DirectoryResult {
        let fetch = {
            let mut slot = self.inner.lock_slot();
            let now = self.inner.clock.now();
            let cached = slot
                .entry
                .as_ref()
                .map(|e| (e.value.clone(), self.inner.is_fresh(e, now)));

            match cached {
                Some((value, true)) if !force_refresh => {
                    debug!("Using cached employee directory");
                    return Ok(value);
                }
                Some((value, false)) if !force_refresh => {
                    if slot.in_flight.is_none() {
                        info!("Employee directory is stale; refreshing in background");
                        // The fetch task runs without a waiter and logs its own failure.
                        let generation = slot.generation;
                        slot.in_flight = Some(start_fetch(self.inner.clone(), generation));
                    }
                    return Ok(value);
                }
                _ => {}
            }

            let generation = slot.generation;
            let inner = self.inner.clone();
            let fetch = slot
                .in_flight
                .get_or_insert_with(|| start_fetch(inner, generation))
                .clone();
            fetch
        };
        fetch.await
    }

    /// Cached value regardless of age, without triggering any fetch.
    pub fn peek(&self) -> Option<Arc<EmployeeDirectory>> {
        self.inner
            .lock_slot()
            .entry
            .as_ref()
            .map(|entry| entry.value.clone())
    }

    /// Drops the entry for `key`, or every entry when `key` is `None`. Keys
    /// other than [`DIRECTORY_KEY`] hold nothing. A fetch already in flight
    /// still answers its waiters but is not cached.
    pub fn invalidate(&self, key: Option<&str>) {
        if let Some(other) = key.filter(|k| *k != DIRECTORY_KEY) {
            debug!("Nothing cached under '{}'", other);
            return;
        }
        let mut slot = self.inner.lock_slot();
        slot.entry = None;
        slot.in_flight = None;
        slot.generation += 1;
        debug!("Invalidated employee directory");
    }

    pub fn clear(&self) {
        self.invalidate(None);
    }
}
