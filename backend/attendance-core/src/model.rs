// src/model.rs

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::dates::parse_api_date;

pub const NOT_AVAILABLE: &str = "N/A";

// --- Wire helpers ---

// The service sends ids and phone numbers either as JSON strings or numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Int(i64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::Text(s) => s,
            StringOrNumber::Int(n) => n.to_string(),
            StringOrNumber::Float(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(StringOrNumber::deserialize(deserializer)?.into_string())
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(StringOrNumber::into_string))
}

fn opt_api_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.and_then(|s| parse_api_date(&s)))
}

fn text_or_na(value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => NOT_AVAILABLE.to_string(),
    }
}

// --- Employee directory ---

/// Raw `/emp/details` record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub emp_id: String,
    #[serde(default)]
    pub emp_name: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub emp_mobile_no: Option<String>,
    #[serde(default)]
    pub emp_designation: Option<String>,
    #[serde(default)]
    pub emp_department: Option<String>,
    #[serde(default)]
    pub emp_week_off: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeDirectoryEntry {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub designation: String,
    pub department: String,
    /// `None` when the service sent a day name we do not recognise; such an
    /// employee has no week-off days.
    pub week_off: Option<Weekday>,
}

/// Missing or blank week-off means Sunday.
pub fn parse_week_off(value: Option<&str>) -> Option<Weekday> {
    match value.map(str::trim) {
        None | Some("") => Some(Weekday::Sun),
        Some(name) => name.parse::<Weekday>().ok(),
    }
}

impl From<DirectoryRecord> for EmployeeDirectoryEntry {
    fn from(record: DirectoryRecord) -> Self {
        let week_off = parse_week_off(record.emp_week_off.as_deref());
        Self {
            id: record.emp_id,
            name: text_or_na(record.emp_name),
            phone: text_or_na(record.emp_mobile_no),
            designation: text_or_na(record.emp_designation),
            department: text_or_na(record.emp_department),
            week_off,
        }
    }
}

/// Ordered id -> entry map. Iteration follows first appearance of each id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmployeeDirectory {
    entries: Vec<EmployeeDirectoryEntry>,
    index: HashMap<String, usize>,
}

impl EmployeeDirectory {
    /// Duplicate ids collapse: the later record replaces the earlier one in place.
    pub fn from_entries(entries: impl IntoIterator<Item = EmployeeDirectoryEntry>) -> Self {
        let mut directory = Self::default();
        for entry in entries {
            match directory.index.get(&entry.id) {
                Some(&pos) => directory.entries[pos] = entry,
                None => {
                    directory.index.insert(entry.id.clone(), directory.entries.len());
                    directory.entries.push(entry);
                }
            }
        }
        directory
    }

    pub fn get(&self, id: &str) -> Option<&EmployeeDirectoryEntry> {
        self.index.get(id).map(|&pos| &self.entries[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmployeeDirectoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// --- Daily attendance ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    OnDuty,
    Leave,
    #[default]
    Unknown,
}

impl From<String> for AttendanceStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" | "p" => AttendanceStatus::Present,
            "absent" | "a" => AttendanceStatus::Absent,
            "od" | "onduty" | "on duty" | "on_duty" => AttendanceStatus::OnDuty,
            "leave" | "l" => AttendanceStatus::Leave,
            _ => AttendanceStatus::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for AttendanceStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<String>::deserialize(deserializer)?
            .map(AttendanceStatus::from)
            .unwrap_or_default())
    }
}

/// One `/attendance/get/byDate/{date}` record. Several records for the same
/// employee and date may arrive; they are kept as-is.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename = "empId", deserialize_with = "string_or_number")]
    pub emp_id: String,
    #[serde(default, deserialize_with = "opt_api_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub status: AttendanceStatus,
    #[serde(rename = "empShift", default)]
    pub shift: Option<String>,
    #[serde(rename = "empWeekOff", default)]
    pub week_off: Option<String>,
    #[serde(rename = "empInTime", default)]
    pub in_time: Option<String>,
    #[serde(rename = "empOutTime", default)]
    pub out_time: Option<String>,
    #[serde(rename = "empAction", default)]
    pub action: Option<String>,
    /// Kind of leave (`CL`, ...) when the action is a leave.
    #[serde(rename = "leaveType", default)]
    pub leave_type: Option<String>,
}

/// The daily endpoint answers either `{ "data": [...] }` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DailyAttendanceResponse {
    Wrapped { data: Vec<AttendanceRecord> },
    Bare(Vec<AttendanceRecord>),
}

impl DailyAttendanceResponse {
    pub fn into_records(self) -> Vec<AttendanceRecord> {
        match self {
            DailyAttendanceResponse::Wrapped { data } => data,
            DailyAttendanceResponse::Bare(records) => records,
        }
    }
}

// --- Leave / duty intervals ---

#[derive(Debug, Clone, PartialEq)]
pub struct IntervalRecord {
    pub emp_id: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub kind: String,
    pub reason: String,
}

pub type LeaveRecord = IntervalRecord;
pub type DutyRecord = IntervalRecord;

// --- Month buckets ---

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthBucket {
    pub year: i32,
    pub month: u32,
    pub count: f64,
}

impl MonthBucket {
    pub fn new(year: i32, month: u32, count: f64) -> Self {
        Self { year, month, count }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct BucketKey {
    year: i32,
    month: u32,
}

#[derive(Debug, Deserialize)]
struct AttendanceBucketWire {
    #[serde(rename = "_id")]
    id: BucketKey,
    #[serde(default)]
    present: Option<f64>,
    #[serde(default)]
    absent: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LeaveBucketWire {
    #[serde(rename = "_id")]
    id: BucketKey,
    #[serde(rename = "totalLeaves", default)]
    total_leaves: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DutyBucketWire {
    #[serde(rename = "_id")]
    id: BucketKey,
    #[serde(rename = "totalOds", default)]
    total_ods: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct CombinedReportWire {
    #[serde(default)]
    attendance: Vec<AttendanceBucketWire>,
    #[serde(default)]
    leaves: Vec<LeaveBucketWire>,
    #[serde(default)]
    ods: Vec<DutyBucketWire>,
}

/// Body of `/month/monthwise-report/{empId}`.
#[derive(Debug, Default, Deserialize)]
pub struct CombinedReportResponse {
    #[serde(rename = "combinedReport", default)]
    combined_report: Option<CombinedReportWire>,
}

/// The three remote feeds normalised into per-field bucket lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedReport {
    pub present: Vec<MonthBucket>,
    pub absent: Vec<MonthBucket>,
    pub leaves: Vec<MonthBucket>,
    pub duties: Vec<MonthBucket>,
}

impl From<CombinedReportResponse> for CombinedReport {
    fn from(response: CombinedReportResponse) -> Self {
        let wire = response.combined_report.unwrap_or_default();
        let bucket = |key: BucketKey, count: Option<f64>| {
            MonthBucket::new(key.year, key.month, count.unwrap_or(0.0))
        };
        Self {
            present: wire.attendance.iter().map(|b| bucket(b.id, b.present)).collect(),
            absent: wire.attendance.iter().map(|b| bucket(b.id, b.absent)).collect(),
            leaves: wire.leaves.iter().map(|b| bucket(b.id, b.total_leaves)).collect(),
            duties: wire.ods.iter().map(|b| bucket(b.id, b.total_ods)).collect(),
        }
    }
}

/// Body of `/leaves/remaining-cl/{empId}`.
#[derive(Debug, Default, Deserialize)]
pub struct RemainingCreditResponse {
    #[serde(rename = "remainingCL", default)]
    pub remaining_cl: Option<f64>,
}

// --- Derived rows ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub emp_id: String,
    pub name: String,
    pub present: f64,
    pub absent: f64,
    pub leave_days: f64,
    pub week_off_days: u32,
    pub remaining_credit: f64,
    pub duty_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRow {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub shift: String,
    pub week_off: String,
    pub in_time: String,
    pub out_time: String,
    pub action: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_record_defaults() {
        let json = r#"[
            {"empId": 101, "empName": "Asha", "empMobileNo": 9876543210, "empWeekOff": "Monday"},
            {"empId": "102", "empName": "", "empWeekOff": ""},
            {"empId": "103", "empName": "Ravi", "empWeekOff": "Someday"}
        ]"#;
        let records: Vec<DirectoryRecord> = serde_json::from_str(json).unwrap();
        let entries: Vec<EmployeeDirectoryEntry> = records.into_iter().map(Into::into).collect();

        assert_eq!(entries[0].id, "101");
        assert_eq!(entries[0].phone, "9876543210");
        assert_eq!(entries[0].week_off, Some(Weekday::Mon));
        assert_eq!(entries[0].designation, NOT_AVAILABLE);

        assert_eq!(entries[1].name, NOT_AVAILABLE);
        assert_eq!(entries[1].week_off, Some(Weekday::Sun));

        assert_eq!(entries[2].week_off, None);
    }

    #[test]
    fn test_directory_collapses_duplicate_ids() {
        let entry = |id: &str, name: &str| EmployeeDirectoryEntry {
            id: id.to_string(),
            name: name.to_string(),
            phone: NOT_AVAILABLE.to_string(),
            designation: NOT_AVAILABLE.to_string(),
            department: NOT_AVAILABLE.to_string(),
            week_off: Some(Weekday::Sun),
        };
        let directory = EmployeeDirectory::from_entries(vec![
            entry("1", "First"),
            entry("2", "Second"),
            entry("1", "First (updated)"),
        ]);

        assert_eq!(directory.len(), 2);
        let ids: Vec<&str> = directory.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(directory.get("1").unwrap().name, "First (updated)");
    }

    #[test]
    fn test_combined_report_normalisation() {
        let json = r#"{
            "combinedReport": {
                "attendance": [{"_id": {"year": 2024, "month": 1}, "present": 20, "absent": 3}],
                "leaves": [{"_id": {"year": 2024, "month": 1}, "totalLeaves": 1.5}],
                "ods": [{"_id": {"year": 2024, "month": 1}, "totalOds": null}]
            }
        }"#;
        let response: CombinedReportResponse = serde_json::from_str(json).unwrap();
        let report = CombinedReport::from(response);

        assert_eq!(report.present, vec![MonthBucket::new(2024, 1, 20.0)]);
        assert_eq!(report.absent, vec![MonthBucket::new(2024, 1, 3.0)]);
        assert_eq!(report.leaves, vec![MonthBucket::new(2024, 1, 1.5)]);
        assert_eq!(report.duties, vec![MonthBucket::new(2024, 1, 0.0)]);
    }

    #[test]
    fn test_combined_report_missing_body_is_empty() {
        let response: CombinedReportResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(CombinedReport::from(response), CombinedReport::default());
    }

    #[test]
    fn test_daily_response_shapes() {
        let wrapped = r#"{"data": [{"empId": 7, "empShift": "Shift-A", "status": "Present", "date": "2024-03-05", "leaveType": "CL"}]}"#;
        let bare = r#"[{"empId": "8"}]"#;

        let wrapped: DailyAttendanceResponse = serde_json::from_str(wrapped).unwrap();
        let records = wrapped.into_records();
        assert_eq!(records[0].emp_id, "7");
        assert_eq!(records[0].shift.as_deref(), Some("Shift-A"));
        assert_eq!(records[0].status, AttendanceStatus::Present);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(records[0].leave_type.as_deref(), Some("CL"));

        let bare: DailyAttendanceResponse = serde_json::from_str(bare).unwrap();
        let records = bare.into_records();
        assert_eq!(records[0].emp_id, "8");
        assert_eq!(records[0].status, AttendanceStatus::Unknown);
        assert_eq!(records[0].in_time, None);
    }
}
