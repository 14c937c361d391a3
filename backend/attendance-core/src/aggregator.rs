// src/aggregator.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::AttendanceApi;
use crate::cancel::CancellationToken;
use crate::dates::DateWindow;
use crate::error::EngineError;
use crate::model::{EmployeeDirectoryEntry, MonthBucket, ReportRow};
use crate::retry::RequestRetrier;

/// Per-run context shared by every employee aggregated in one report run.
#[derive(Debug)]
pub struct AggregationRun {
    window: DateWindow,
    token: CancellationToken,
    unauthorized: AtomicBool,
}

impl AggregationRun {
    pub fn new(window: DateWindow, token: CancellationToken) -> Self {
        Self {
            window,
            token,
            unauthorized: AtomicBool::new(false),
        }
    }

    pub fn window(&self) -> &DateWindow {
        &self.window
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    fn record_unauthorized(&self) {
        self.unauthorized.store(true, Ordering::SeqCst);
    }

    /// True once any sub-fetch in this run was rejected as unauthorized.
    pub fn saw_unauthorized(&self) -> bool {
        self.unauthorized.load(Ordering::SeqCst)
    }
}

/// Sum of the buckets whose month lies inside the window's month range.
/// Boundary months count in full.
pub fn sum_in_window(buckets: &[MonthBucket], window: &DateWindow) -> f64 {
    buckets
        .iter()
        .filter(|b| window.contains_month(b.year, b.month))
        .map(|b| b.count)
        .sum()
}

pub fn week_off_days(entry: &EmployeeDirectoryEntry, window: &DateWindow) -> u32 {
    entry
        .week_off
        .map(|day| window.count_weekday(day))
        .unwrap_or(0)
}

#[derive(Clone)]
pub struct ReportAggregator {
    api: Arc<dyn AttendanceApi>,
    retrier: RequestRetrier,
}

impl ReportAggregator {
    pub fn new(api: Arc<dyn AttendanceApi>, retrier: RequestRetrier) -> Self {
        Self { api, retrier }
    }

    /// Builds one employee's row. Failed sub-fetches contribute zeros;
    /// only cancellation fails the call.
    pub async fn aggregate(
        &self,
        entry: &EmployeeDirectoryEntry,
        run: &AggregationRun,
    ) -> Result<ReportRow, EngineError> {
        let window = *run.window();
        let (from, to) = (window.from(), window.to());

        let (report, credit) = tokio::join!(
            self.retrier.execute(
                "fetch month-wise report",
                || self.api.combined_report(&entry.id, from, to),
                run.token(),
            ),
            self.retrier.execute(
                "fetch remaining leave credit",
                || self.api.remaining_credit(&entry.id, from, to),
                run.token(),
            ),
        );

        let report = degrade(report, entry, run)?.unwrap_or_default();
        let remaining_credit = degrade(credit, entry, run)?.unwrap_or(0.0);

        if run.token().is_cancelled() {
            debug!("Aggregation for employee {} cancelled", entry.id);
            return Err(EngineError::Cancelled);
        }

        Ok(ReportRow {
            emp_id: entry.id.clone(),
            name: entry.name.clone(),
            present: sum_in_window(&report.present, &window),
            absent: sum_in_window(&report.absent, &window),
            leave_days: sum_in_window(&report.leaves, &window),
            week_off_days: week_off_days(entry, &window),
            remaining_credit,
            duty_days: sum_in_window(&report.duties, &window),
        })
    }
}

fn degrade<T>(
    result: Result<T, EngineError>,
    entry: &EmployeeDirectoryEntry,
    run: &AggregationRun,
) -> Result<Option<T>, EngineError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(EngineError::Cancelled) => Err(EngineError::Cancelled),
        Err(e) => {
            if e.is_unauthorized() {
                run.record_unauthorized();
            }
            warn!("Using zeros for employee {} ({}): {}", entry.id, entry.name, e);
            Ok(None)
        }
    }
}
