// src/breakdown.rs
//
// Day-by-day attendance of one employee over a date window.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::AttendanceApi;
use crate::batch::{run_batched, DEFAULT_BATCH_SIZE};
use crate::cancel::CancellationToken;
use crate::daily::MISSING_VALUE;
use crate::dates::{format_api_date, DateWindow};
use crate::error::EngineError;
use crate::model::{AttendanceRecord, AttendanceStatus, EmployeeDirectory, NOT_AVAILABLE};
use crate::retry::RequestRetrier;
use crate::session::{JobOutput, Notification, ReportJob};

pub const CASUAL_LEAVE: &str = "CL";
pub const DEFAULT_IN_TIME: &str = "09:00 AM";
pub const DEFAULT_OUT_TIME: &str = "06:00 PM";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayStatus {
    Present,
    Absent,
    /// Only casual leave counts towards the leave total.
    Leave { casual: bool },
    OnDuty,
    WeekOff,
    /// An action none of the above match; shown but not counted.
    Other(String),
}

impl DayStatus {
    pub fn label(&self) -> &str {
        match self {
            DayStatus::Present => "Present",
            DayStatus::Absent => "Absent",
            DayStatus::Leave { .. } => "Leave",
            DayStatus::OnDuty => "OD",
            DayStatus::WeekOff => "Week Off",
            DayStatus::Other(action) => action,
        }
    }
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for DayStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// No usable record: the employee's week-off day, otherwise absent.
fn without_record(day: NaiveDate, week_off: Option<Weekday>) -> DayStatus {
    if week_off == Some(day.weekday()) {
        DayStatus::WeekOff
    } else {
        DayStatus::Absent
    }
}

/// Classifies one day from the employee's record for it.
///
/// `empAction` wins over `status`; a record carrying neither counts as
/// missing.
pub fn classify_day(
    day: NaiveDate,
    record: Option<&AttendanceRecord>,
    week_off: Option<Weekday>,
) -> DayStatus {
    let Some(record) = record else {
        return without_record(day, week_off);
    };
    let action = record
        .action
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty());
    let status = match action {
        Some(action) => AttendanceStatus::from(action.to_string()),
        None => record.status,
    };

    match status {
        AttendanceStatus::Present => DayStatus::Present,
        AttendanceStatus::Absent => DayStatus::Absent,
        AttendanceStatus::OnDuty => DayStatus::OnDuty,
        AttendanceStatus::Leave => DayStatus::Leave {
            casual: record
                .leave_type
                .as_deref()
                .is_some_and(|t| t.trim().eq_ignore_ascii_case(CASUAL_LEAVE)),
        },
        AttendanceStatus::Unknown => match action {
            Some(action) => DayStatus::Other(action.to_string()),
            None => without_record(day, week_off),
        },
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownRow {
    pub date: String,
    pub day: String,
    pub shift: String,
    pub in_time: String,
    pub out_time: String,
    pub status: DayStatus,
}

pub fn breakdown_row(
    day: NaiveDate,
    record: Option<&AttendanceRecord>,
    week_off: Option<Weekday>,
) -> BreakdownRow {
    let status = classify_day(day, record, week_off);
    let present = status == DayStatus::Present;
    let field = |value: Option<&String>, present_default: &str| match value.map(|v| v.trim()) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ if present => present_default.to_string(),
        _ => MISSING_VALUE.to_string(),
    };
    let shift = match (&status, record.and_then(|r| r.shift.as_deref())) {
        (DayStatus::WeekOff, _) => NOT_AVAILABLE.to_string(),
        (_, Some(shift)) if !shift.trim().is_empty() => shift.trim().to_string(),
        _ => NOT_AVAILABLE.to_string(),
    };

    BreakdownRow {
        date: format_api_date(day),
        day: weekday_name(day.weekday()).to_string(),
        shift,
        in_time: field(record.and_then(|r| r.in_time.as_ref()), DEFAULT_IN_TIME),
        out_time: field(record.and_then(|r| r.out_time.as_ref()), DEFAULT_OUT_TIME),
        status,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownTotals {
    pub present: u32,
    pub absent: u32,
    pub leave: u32,
    pub on_duty: u32,
    pub week_off: u32,
}

impl BreakdownTotals {
    pub fn from_rows(rows: &[BreakdownRow]) -> Self {
        rows.iter().fold(Self::default(), |mut totals, row| {
            match row.status {
                DayStatus::Present => totals.present += 1,
                DayStatus::Absent => totals.absent += 1,
                DayStatus::Leave { casual: true } => totals.leave += 1,
                DayStatus::OnDuty => totals.on_duty += 1,
                DayStatus::WeekOff => totals.week_off += 1,
                DayStatus::Leave { casual: false } | DayStatus::Other(_) => {}
            }
            totals
        })
    }
}

impl fmt::Display for BreakdownTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Present {}, Absent {}, Leave {}, OD {}, Week Off {}",
            self.present, self.absent, self.leave, self.on_duty, self.week_off
        )
    }
}

/// One day's records. Failures other than cancellation and 401 leave the day
/// without records.
async fn fetch_day(
    api: &dyn AttendanceApi,
    retrier: &RequestRetrier,
    day: NaiveDate,
    token: &CancellationToken,
) -> Result<Option<Vec<AttendanceRecord>>, EngineError> {
    match retrier
        .execute("fetch attendance data", || api.daily_attendance(day), token)
        .await
    {
        Ok(records) => Ok(Some(records)),
        Err(e) if e.is_cancelled() || e.is_unauthorized() => Err(e),
        Err(e) => {
            warn!("No attendance for {}: {}", format_api_date(day), e);
            Ok(None)
        }
    }
}

/// Attendance of one employee for every date in a window.
pub struct EmployeeBreakdownJob {
    api: Arc<dyn AttendanceApi>,
    retrier: RequestRetrier,
    emp_id: String,
    from: NaiveDate,
    to: NaiveDate,
    batch_size: usize,
}

impl EmployeeBreakdownJob {
    pub fn new(
        api: Arc<dyn AttendanceApi>,
        retrier: RequestRetrier,
        emp_id: impl Into<String>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Self {
        Self {
            api,
            retrier,
            emp_id: emp_id.into(),
            from,
            to,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

#[async_trait]
impl ReportJob for EmployeeBreakdownJob {
    type Row = BreakdownRow;

    fn describe(&self) -> String {
        format!(
            "attendance breakdown of employee {} {}..{}",
            self.emp_id,
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
    ) -> Result<JobOutput<BreakdownRow>, EngineError> {
        let window = DateWindow::new(self.from, self.to)?;
        let mut notices = Vec::new();

        let week_off = match directory.get(&self.emp_id) {
            Some(entry) => entry.week_off,
            None => {
                let message = format!(
                    "Employee {} is not in the directory; assuming a Sunday week-off",
                    self.emp_id
                );
                warn!("{}", message);
                notices.push(Notification::warning(message));
                Some(Weekday::Sun)
            }
        };

        let days: Vec<NaiveDate> = window.days().collect();
        info!(
            "Fetching {} days of attendance for employee {} in batches of {}",
            window.len_days(),
            self.emp_id,
            self.batch_size
        );

        let api = self.api.as_ref();
        let retrier = &self.retrier;
        let fetched = run_batched(
            &days,
            self.batch_size,
            |day| {
                let day = *day;
                async move { fetch_day(api, retrier, day, token).await }
            },
            token,
        )
        .await?;

        let unloaded = fetched.iter().filter(|records| records.is_none()).count();
        let rows: Vec<BreakdownRow> = days
            .iter()
            .zip(&fetched)
            .map(|(&day, records)| {
                // first matching record wins
                let record = records.as_deref().and_then(|records| {
                    records.iter().find(|r| {
                        r.emp_id == self.emp_id && (r.date.is_none() || r.date == Some(day))
                    })
                });
                breakdown_row(day, record, week_off)
            })
            .collect();

        if unloaded > 0 {
            notices.push(Notification::warning(format!(
                "Attendance for {} of {} days could not be loaded",
                unloaded,
                days.len()
            )));
        }
        let totals = BreakdownTotals::from_rows(&rows);
        info!("Employee {}: {}", self.emp_id, totals);
        notices.push(Notification::info(format!(
            "Employee {}: {}",
            self.emp_id, totals
        )));

        Ok(JobOutput { rows, notices })
    }
}
