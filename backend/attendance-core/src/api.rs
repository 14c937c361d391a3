// src/api.rs

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::ApiError;
use crate::model::{AttendanceRecord, CombinedReport, EmployeeDirectoryEntry};

/// The remote attendance service as seen by the engine.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    async fn directory(&self) -> Result<Vec<EmployeeDirectoryEntry>, ApiError>;

    async fn combined_report(
        &self,
        emp_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<CombinedReport, ApiError>;

    async fn remaining_credit(
        &self,
        emp_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<f64, ApiError>;

    async fn daily_attendance(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, ApiError>;
}
