// src/session.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::cancel::CancellationToken;
use crate::clock::Clock;
use crate::directory_cache::DirectoryCache;
use crate::error::EngineError;
use crate::model::EmployeeDirectory;

pub const DEFAULT_THROTTLE_MS: u64 = 1000;

// --- Sinks ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A user-facing toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}] {}", label, self.message)
    }
}

/// Receives the row set of every run that settles or fails.
pub trait ReportSink<R>: Send + Sync {
    fn publish(&self, rows: Vec<R>);
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

// --- Jobs ---

#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput<R> {
    pub rows: Vec<R>,
    /// Non-fatal problems to surface once the rows are published.
    pub notices: Vec<Notification>,
}

impl<R> JobOutput<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Self {
            rows,
            notices: Vec::new(),
        }
    }
}

/// One kind of report the session knows how to run.
#[async_trait]
pub trait ReportJob: Send + Sync {
    type Row: Clone + Send + Sync + 'static;

    fn describe(&self) -> String;

    /// Checks the query before anything is fetched.
    fn validate(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn run(
        &self,
        directory: Arc<EmployeeDirectory>,
        token: &CancellationToken,
    ) -> Result<JobOutput<Self::Row>, EngineError>;
}

// --- Session ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching,
    Settled,
    Cancelled,
    Failed,
}

/// What became of one `request` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Settled { rows: usize },
    Failed(EngineError),
    Cancelled,
    /// A newer request started before this one finished; its result was dropped.
    Superseded,
    /// Dropped because the previous request started less than the throttle interval ago.
    Throttled,
    TornDown,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub throttle: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(DEFAULT_THROTTLE_MS),
        }
    }
}

#[derive(Debug)]
struct SessionState {
    phase: Phase,
    epoch: u64,
    last_start: Option<DateTime<Utc>>,
    current: Option<CancellationToken>,
    torn_down: bool,
}

/// Drives report runs for one view.
///
/// Each request gets a child of the session's root token and a new epoch. A
/// newer request cancels the older one, and a result whose epoch is no longer
/// current is never published.
pub struct ReportSession<R> {
    cache: DirectoryCache,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ReportSink<R>>,
    notifier: Arc<dyn NotificationSink>,
    config: SessionConfig,
    root: CancellationToken,
    state: Mutex<SessionState>,
}

impl<R: Clone + Send + Sync + 'static> ReportSession<R> {
    pub fn new(
        cache: DirectoryCache,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn ReportSink<R>>,
        notifier: Arc<dyn NotificationSink>,
        config: SessionConfig,
    ) -> Self {
        Self {
            cache,
            clock,
            sink,
            notifier,
            config,
            root: CancellationToken::new(),
            state: Mutex::new(SessionState {
                phase: Phase::Idle,
                epoch: 0,
                last_start: None,
                current: None,
                torn_down: false,
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.lock_state().phase
    }

    pub fn epoch(&self) -> u64 {
        self.lock_state().epoch
    }

    /// Starts a run for `job` and drives it to completion.
    pub async fn request<J>(&self, job: J) -> Outcome
    where
        J: ReportJob<Row = R>,
    {
        // Rejected queries leave the current run and the throttle clock alone.
        if let Err(e) = job.validate() {
            return self.reject(&job, e);
        }

        let (epoch, token) = match self.begin(&job) {
            Some(started) => started,
            None => {
                return if self.lock_state().torn_down {
                    Outcome::TornDown
                } else {
                    Outcome::Throttled
                };
            }
        };

        let result = self.execute(&job, &token).await;
        self.finish(epoch, result)
    }

    fn begin<J: ReportJob>(&self, job: &J) -> Option<(u64, CancellationToken)> {
        let mut state = self.lock_state();
        if state.torn_down {
            debug!("Ignoring request for {}; session torn down", job.describe());
            return None;
        }

        let now = self.clock.now();
        if let Some(last) = state.last_start {
            let throttle = chrono::Duration::from_std(self.config.throttle)
                .unwrap_or_else(|_| chrono::Duration::zero());
            if now - last < throttle {
                debug!("Throttled request for {}", job.describe());
                return None;
            }
        }

        if let Some(previous) = state.current.take() {
            debug!("Cancelling run {} for a newer request", state.epoch);
            previous.cancel();
        }

        state.epoch += 1;
        state.last_start = Some(now);
        state.phase = Phase::Fetching;
        let token = self.root.child_token();
        state.current = Some(token.clone());
        info!("Run {} started: {}", state.epoch, job.describe());
        Some((state.epoch, token))
    }

    fn reject<J: ReportJob>(&self, job: &J, e: EngineError) -> Outcome {
        let mut state = self.lock_state();
        if state.torn_down {
            return Outcome::TornDown;
        }
        error!("Rejected {}: {}", job.describe(), e);
        // an in-flight run keeps its phase and still publishes its own rows
        if state.current.is_none() {
            state.phase = Phase::Failed;
            self.sink.publish(Vec::new());
        }
        self.notifier.notify(Notification::error(e.user_message()));
        Outcome::Failed(e)
    }

    async fn execute<J>(&self, job: &J, token: &CancellationToken) -> Result<JobOutput<R>, EngineError>
    where
        J: ReportJob<Row = R>,
    {
        let directory = tokio::select! {
            biased;
            _ = token.cancelled() => Err(EngineError::Cancelled),
            directory = self.cache.get(false) => directory,
        }?;
        if directory.is_empty() {
            return Err(EngineError::EmptyDirectory);
        }

        job.run(directory, token).await
    }

    fn finish(&self, epoch: u64, result: Result<JobOutput<R>, EngineError>) -> Outcome {
        // Held while publishing so a newer run cannot publish in between.
        let mut state = self.lock_state();
        if state.torn_down {
            debug!("Dropping result of run {}; session torn down", epoch);
            return Outcome::TornDown;
        }
        if state.epoch != epoch {
            debug!("Dropping late result of run {} (current run is {})", epoch, state.epoch);
            return Outcome::Superseded;
        }
        state.current = None;

        match result {
            Ok(output) => {
                state.phase = Phase::Settled;
                let rows = output.rows.len();
                info!("Run {} settled with {} rows", epoch, rows);
                self.sink.publish(output.rows);
                for notice in output.notices {
                    self.notifier.notify(notice);
                }
                Outcome::Settled { rows }
            }
            Err(EngineError::Cancelled) => {
                state.phase = Phase::Cancelled;
                debug!("Run {} cancelled", epoch);
                Outcome::Cancelled
            }
            Err(e) => {
                state.phase = Phase::Failed;
                error!("Run {} failed: {}", epoch, e);
                self.sink.publish(Vec::new());
                self.notifier.notify(Notification::error(e.user_message()));
                Outcome::Failed(e)
            }
        }
    }

    /// Cancels every in-flight run, rejects further requests and clears the
    /// directory cache.
    pub fn teardown(&self) {
        let mut state = self.lock_state();
        if state.torn_down {
            return;
        }
        state.torn_down = true;
        state.current = None;
        if state.phase == Phase::Fetching {
            state.phase = Phase::Cancelled;
        }
        self.root.cancel();
        self.cache.clear();
        info!("Report session torn down");
    }
}

impl<R> Drop for ReportSession<R> {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
