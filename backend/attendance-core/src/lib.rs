// src/lib.rs
//
// Attendance aggregation and batched-fetch engine.

pub mod aggregator;
pub mod api;
pub mod batch;
pub mod breakdown;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod daily;
pub mod dates;
pub mod directory_cache;
pub mod error;
pub mod http_client;
pub mod model;
pub mod month;
pub mod retry;
pub mod session;
pub mod view;

#[cfg(test)]
mod test_support;

pub use aggregator::{AggregationRun, ReportAggregator};
pub use api::AttendanceApi;
pub use batch::run_batched;
pub use breakdown::{BreakdownRow, BreakdownTotals, DayStatus, EmployeeBreakdownJob};
pub use cancel::CancellationToken;
pub use clock::{Clock, SystemClock, TestClock};
pub use config::EngineConfig;
pub use daily::{DayWiseJob, ShiftFilter};
pub use dates::DateWindow;
pub use directory_cache::DirectoryCache;
pub use error::{ApiError, EngineError};
pub use http_client::{HttpApiConfig, HttpAttendanceApi};
pub use model::{DailyRow, EmployeeDirectory, EmployeeDirectoryEntry, ReportRow};
pub use month::{EmployeeFilter, MonthWiseJob};
pub use retry::{RequestRetrier, RetryPolicy};
pub use session::{
    JobOutput, Notification, NotificationSink, Outcome, Phase, ReportJob, ReportSession,
    ReportSink, SessionConfig, Severity,
};
pub use view::{ReportView, Searchable};
