// src/test_support.rs
//
// In-memory doubles shared by the unit tests.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc, Weekday};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::AttendanceApi;
use crate::clock::TestClock;
use crate::error::ApiError;
use crate::model::{AttendanceRecord, CombinedReport, EmployeeDirectoryEntry, MonthBucket};
use crate::session::{Notification, NotificationSink, ReportSink};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn test_clock() -> TestClock {
    TestClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
}

pub fn entry(id: &str, name: &str, week_off: Option<Weekday>) -> EmployeeDirectoryEntry {
    EmployeeDirectoryEntry {
        id: id.to_string(),
        name: name.to_string(),
        phone: "N/A".to_string(),
        designation: "Guard".to_string(),
        department: "Security".to_string(),
        week_off,
    }
}

pub fn staff(count: usize) -> Vec<EmployeeDirectoryEntry> {
    (1..=count)
        .map(|i| entry(&i.to_string(), &format!("Employee {}", i), Some(Weekday::Sun)))
        .collect()
}

/// One month of attendance, leave and duty counts.
pub fn month_report(
    year: i32,
    month: u32,
    present: f64,
    absent: f64,
    leaves: f64,
    duties: f64,
) -> CombinedReport {
    CombinedReport {
        present: vec![MonthBucket::new(year, month, present)],
        absent: vec![MonthBucket::new(year, month, absent)],
        leaves: vec![MonthBucket::new(year, month, leaves)],
        duties: vec![MonthBucket::new(year, month, duties)],
    }
}

/// Scriptable `AttendanceApi`. Unscripted employees get an empty report and
/// zero credit.
pub struct FakeApi {
    directory: Mutex<Result<Vec<EmployeeDirectoryEntry>, ApiError>>,
    reports: Mutex<HashMap<String, Result<CombinedReport, ApiError>>>,
    credits: Mutex<HashMap<String, Result<f64, ApiError>>>,
    daily: Mutex<Result<Vec<AttendanceRecord>, ApiError>>,
    daily_by_date: Mutex<HashMap<NaiveDate, Result<Vec<AttendanceRecord>, ApiError>>>,
    latency: Mutex<Duration>,
    pub directory_calls: AtomicU32,
    pub report_calls: AtomicU32,
    pub credit_calls: AtomicU32,
    pub daily_calls: AtomicU32,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            directory: Mutex::new(Ok(Vec::new())),
            reports: Mutex::new(HashMap::new()),
            credits: Mutex::new(HashMap::new()),
            daily: Mutex::new(Ok(Vec::new())),
            daily_by_date: Mutex::new(HashMap::new()),
            latency: Mutex::new(Duration::ZERO),
            directory_calls: AtomicU32::new(0),
            report_calls: AtomicU32::new(0),
            credit_calls: AtomicU32::new(0),
            daily_calls: AtomicU32::new(0),
        }
    }

    pub fn with_directory(self, entries: Vec<EmployeeDirectoryEntry>) -> Self {
        self.set_directory(Ok(entries));
        self
    }

    pub fn with_report(self, emp_id: &str, report: CombinedReport) -> Self {
        self.reports.lock().unwrap().insert(emp_id.to_string(), Ok(report));
        self
    }

    pub fn with_report_error(self, emp_id: &str, error: ApiError) -> Self {
        self.reports.lock().unwrap().insert(emp_id.to_string(), Err(error));
        self
    }

    pub fn with_credit(self, emp_id: &str, credit: f64) -> Self {
        self.credits.lock().unwrap().insert(emp_id.to_string(), Ok(credit));
        self
    }

    pub fn with_credit_error(self, emp_id: &str, error: ApiError) -> Self {
        self.credits.lock().unwrap().insert(emp_id.to_string(), Err(error));
        self
    }

    pub fn with_daily(self, records: Vec<AttendanceRecord>) -> Self {
        *self.daily.lock().unwrap() = Ok(records);
        self
    }

    pub fn with_daily_error(self, error: ApiError) -> Self {
        *self.daily.lock().unwrap() = Err(error);
        self
    }

    /// Records for one date; other dates fall back to `with_daily`.
    pub fn with_daily_on(self, day: NaiveDate, records: Vec<AttendanceRecord>) -> Self {
        self.daily_by_date.lock().unwrap().insert(day, Ok(records));
        self
    }

    pub fn with_daily_error_on(self, day: NaiveDate, error: ApiError) -> Self {
        self.daily_by_date.lock().unwrap().insert(day, Err(error));
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap() = latency;
        self
    }

    pub fn set_directory(&self, result: Result<Vec<EmployeeDirectoryEntry>, ApiError>) {
        *self.directory.lock().unwrap() = result;
    }

    pub fn calls(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl AttendanceApi for FakeApi {
    async fn directory(&self) -> Result<Vec<EmployeeDirectoryEntry>, ApiError> {
        self.directory_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.directory.lock().unwrap().clone()
    }

    async fn combined_report(
        &self,
        emp_id: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<CombinedReport, ApiError> {
        self.report_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.reports
            .lock()
            .unwrap()
            .get(emp_id)
            .cloned()
            .unwrap_or_else(|| Ok(CombinedReport::default()))
    }

    async fn remaining_credit(
        &self,
        emp_id: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<f64, ApiError> {
        self.credit_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.credits
            .lock()
            .unwrap()
            .get(emp_id)
            .cloned()
            .unwrap_or(Ok(0.0))
    }

    async fn daily_attendance(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, ApiError> {
        self.daily_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        if let Some(scripted) = self.daily_by_date.lock().unwrap().get(&date) {
            return scripted.clone();
        }
        self.daily.lock().unwrap().clone()
    }
}

/// Keeps every published row set.
pub struct RecordingSink<R> {
    published: Mutex<Vec<Vec<R>>>,
}

impl<R: Clone> RecordingSink<R> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            published: Mutex::new(Vec::new()),
        })
    }

    pub fn published(&self) -> Vec<Vec<R>> {
        self.published.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Vec<R>> {
        self.published.lock().unwrap().last().cloned()
    }
}

impl<R: Clone + Send + Sync> ReportSink<R> for RecordingSink<R> {
    fn publish(&self, rows: Vec<R>) {
        self.published.lock().unwrap().push(rows);
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}
