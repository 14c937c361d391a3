// src/month.rs
//
// Month-wise report: one aggregated row per employee for a date window.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::aggregator::{AggregationRun, ReportAggregator};
use crate::batch::{run_batched, DEFAULT_BATCH_SIZE};
use crate::cancel::CancellationToken;
use crate::dates::{format_api_date, DateWindow};
use crate::error::EngineError;
use crate::model::{EmployeeDirectory, EmployeeDirectoryEntry, ReportRow};
use crate::session::{JobOutput, Notification, ReportJob};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EmployeeFilter {
    #[default]
    All,
    Only(Vec<String>),
}

impl EmployeeFilter {
    /// An empty id list means everyone.
    pub fn from_ids(ids: Vec<String>) -> Self {
        if ids.is_empty() {
            EmployeeFilter::All
        } else {
            EmployeeFilter::Only(ids)
        }
    }

    fn select(&self, directory: &EmployeeDirectory) -> Vec<EmployeeDirectoryEntry> {
        match self {
            EmployeeFilter::All => directory.iter().cloned().collect(),
            EmployeeFilter::Only(ids) => {
                let mut seen = HashSet::new();
                ids.iter()
                    .filter(|id| seen.insert(id.as_str()))
                    .filter_map(|id| match directory.get(id) {
                        Some(entry) => Some(entry.clone()),
                        None => {
                            warn!("Employee {} is not in the directory; skipping", id);
                            None
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Keeps the first row for each employee id.
pub fn dedupe_rows(rows: Vec<ReportRow>) -> Vec<ReportRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.emp_id.clone()))
        .collect()
}

pub struct MonthWiseJob {
    aggregator: ReportAggregator,
    from: NaiveDate,
    to: NaiveDate,
    filter: EmployeeFilter,
    batch_size: usize,
}

impl MonthWiseJob {
    pub fn new(aggregator: ReportAggregator, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            aggregator,
            from,
            to,
            filter: EmployeeFilter::All,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_filter(mut self, filter: EmployeeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

#[async_trait]
impl ReportJob for MonthWiseJob {
    type Row = ReportRow;

    fn describe(&self) -> String {
        format!(
            "month-wise report {}..{}",
            format_api_date(self.from),
            format_api_date(self.to)
        )
    }

    fn validate(&self) -> Result<(), EngineError> {
        DateWindow::new(self.from, self.to).map(|_| ())
    }

    async fn run(
        &self,
        directory: Arc<EmployeeDirectory>,
        token: &CancellationToken,
    ) -> Result<JobOutput<ReportRow>, EngineError> {
        let window = DateWindow::new(self.from, self.to)?;
        let employees = self.filter.select(&directory);
        info!(
            "Aggregating {} employees in batches of {}",
            employees.len(),
            self.batch_size
        );

        let run = AggregationRun::new(window, token.clone());
        let run = &run;
        let aggregator = &self.aggregator;
        let rows = run_batched(
            &employees,
            self.batch_size,
            |entry| {
                let entry = entry.clone();
                async move { aggregator.aggregate(&entry, run).await }
            },
            token,
        )
        .await?;

        let mut output = JobOutput::new(dedupe_rows(rows));
        if run.saw_unauthorized() {
            output
                .notices
                .push(Notification::error(EngineError::Unauthorized.user_message()));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{entry, staff};
    use chrono::Weekday;

    fn row(id: &str, present: f64) -> ReportRow {
        ReportRow {
            emp_id: id.to_string(),
            name: format!("Employee {}", id),
            present,
            absent: 0.0,
            leave_days: 0.0,
            week_off_days: 0,
            remaining_credit: 0.0,
            duty_days: 0.0,
        }
    }

    #[test]
    fn test_dedupe_keeps_first_row() {
        let rows = dedupe_rows(vec![row("1", 3.0), row("2", 1.0), row("1", 9.0)]);
        assert_eq!(rows, vec![row("1", 3.0), row("2", 1.0)]);
    }

    #[test]
    fn test_filter_selects_known_ids_in_request_order() {
        let directory = EmployeeDirectory::from_entries(staff(4));
        let filter = EmployeeFilter::from_ids(vec![
            "3".to_string(),
            "99".to_string(),
            "1".to_string(),
            "3".to_string(),
        ]);

        let ids: Vec<String> = filter.select(&directory).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["3", "1"]);
    }

    #[test]
    fn test_empty_filter_means_everyone() {
        let directory = EmployeeDirectory::from_entries(vec![
            entry("a", "Asha", Some(Weekday::Sun)),
            entry("b", "Bala", Some(Weekday::Mon)),
        ]);
        assert_eq!(EmployeeFilter::from_ids(Vec::new()), EmployeeFilter::All);
        assert_eq!(EmployeeFilter::All.select(&directory).len(), 2);
    }
}
