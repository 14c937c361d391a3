// src/daily.rs
//
// Day-wise report: the attendance records of one date joined with the directory.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::api::AttendanceApi;
use crate::cancel::CancellationToken;
use crate::dates::format_api_date;
use crate::error::EngineError;
use crate::model::{AttendanceRecord, DailyRow, EmployeeDirectory, NOT_AVAILABLE};
use crate::retry::RequestRetrier;
use crate::session::{JobOutput, ReportJob};

pub const DEFAULT_SHIFT: &str = "General";
pub const DEFAULT_WEEK_OFF: &str = "Sunday";
/// Shown for in/out times and actions the service did not send.
pub const MISSING_VALUE: &str = "--";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ShiftFilter {
    #[default]
    All,
    Named(String),
}

impl ShiftFilter {
    pub fn matches(&self, shift: &str) -> bool {
        match self {
            ShiftFilter::All => true,
            ShiftFilter::Named(name) => name.eq_ignore_ascii_case(shift),
        }
    }
}

impl FromStr for ShiftFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            Ok(ShiftFilter::All)
        } else {
            Ok(ShiftFilter::Named(s.to_string()))
        }
    }
}

impl fmt::Display for ShiftFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShiftFilter::All => write!(f, "All"),
            ShiftFilter::Named(name) => write!(f, "{}", name),
        }
    }
}

fn or_default(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

/// Joins one attendance record with its directory entry.
pub fn daily_row(record: &AttendanceRecord, directory: &EmployeeDirectory) -> DailyRow {
    let employee = directory.get(&record.emp_id);
    DailyRow {
        id: record.emp_id.clone(),
        name: employee
            .map(|e| e.name.clone())
            .unwrap_or_else(|| format!("Unknown Employee {}", record.emp_id)),
        phone: employee
            .map(|e| e.phone.clone())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        shift: or_default(record.shift.as_deref(), DEFAULT_SHIFT),
        week_off: or_default(record.week_off.as_deref(), DEFAULT_WEEK_OFF),
        in_time: or_default(record.in_time.as_deref(), MISSING_VALUE),
        out_time: or_default(record.out_time.as_deref(), MISSING_VALUE),
        action: or_default(record.action.as_deref(), MISSING_VALUE),
    }
}

pub struct DayWiseJob {
    api: Arc<dyn AttendanceApi>,
    retrier: RequestRetrier,
    date: NaiveDate,
    shift: ShiftFilter,
}

impl DayWiseJob {
    pub fn new(api: Arc<dyn AttendanceApi>, retrier: RequestRetrier, date: NaiveDate) -> Self {
        Self {
            api,
            retrier,
            date,
            shift: ShiftFilter::All,
        }
    }

    pub fn with_shift(mut self, shift: ShiftFilter) -> Self {
        self.shift = shift;
        self
    }
}

#[async_trait]
impl ReportJob for DayWiseJob {
    type Row = DailyRow;

    fn describe(&self) -> String {
        format!(
            "day-wise report {} (shift {})",
            format_api_date(self.date),
            self.shift
        )
    }

    async fn run(
        &self,
        directory: Arc<EmployeeDirectory>,
        token: &CancellationToken,
    ) -> Result<JobOutput<DailyRow>, EngineError> {
        let records = self
            .retrier
            .execute(
                "fetch attendance data",
                || self.api.daily_attendance(self.date),
                token,
            )
            .await?;

        let rows: Vec<DailyRow> = records
            .iter()
            .map(|record| daily_row(record, &directory))
            .filter(|row| self.shift.matches(&row.shift))
            .collect();
        info!(
            "{} of {} attendance records match shift {}",
            rows.len(),
            records.len(),
            self.shift
        );
        Ok(JobOutput::new(rows))
    }
}
