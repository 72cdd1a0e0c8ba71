use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use utoipa::ToSchema;

/// Id carried by a record that has not been written to the store yet.
pub const UNSAVED_ID: u64 = 0;

/// One check-in/check-out pair of an employee on a calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_id": 2,
        "date": "2024-01-15",
        "checkin_datetime": "2024-01-15T09:00:00",
        "checkout_datetime": "2024-01-15T17:30:00",
        "is_custom": false
    })
)]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = 2)]
    pub employee_id: u64,

    #[schema(example = "2024-01-15", value_type = String, format = "date")]
    pub date: NaiveDate,

    #[serde(rename = "checkin_datetime")]
    #[schema(example = "2024-01-15T09:00:00", value_type = String, format = "date-time")]
    pub check_in: NaiveDateTime,

    /// Null while the session is still open
    #[serde(rename = "checkout_datetime")]
    #[schema(
        example = "2024-01-15T17:30:00",
        value_type = Option<String>,
        format = "date-time",
        nullable = true
    )]
    pub check_out: Option<NaiveDateTime>,

    /// Entered manually instead of by a live check-in
    #[serde(default)]
    pub is_custom: bool,
}

/// OPEN is the initial state, CLOSED is terminal.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, AsRefStr, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    Open,
    Closed,
}

impl AttendanceRecord {
    /// A fresh open record for a live check-in.
    pub fn open(employee_id: u64, check_in: NaiveDateTime) -> Self {
        Self {
            id: UNSAVED_ID,
            employee_id,
            date: check_in.date(),
            check_in,
            check_out: None,
            is_custom: false,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.check_out {
            Some(_) => SessionState::Closed,
            None => SessionState::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.check_out.is_none()
    }

    /// Elapsed time of a closed session; `None` while open.
    pub fn working_duration(&self) -> Option<Duration> {
        self.check_out.map(|out| out - self.check_in)
    }

    pub fn working_seconds(&self) -> Option<i64> {
        self.working_duration().map(|d| d.num_seconds())
    }
}

/// Attendance row joined with the owning employee, used by admin listings.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceEntry {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub record: AttendanceRecord,

    #[schema(example = "Jane Smith")]
    pub employee_name: String,

    #[schema(example = "HR")]
    pub department: String,

    #[schema(example = "closed")]
    #[sqlx(skip)]
    pub state: Option<SessionState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn open_record_has_no_duration() {
        let record = AttendanceRecord::open(7, at(9, 0));
        assert_eq!(record.id, UNSAVED_ID);
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(record.state(), SessionState::Open);
        assert!(record.working_seconds().is_none());
    }

    #[test]
    fn closed_record_reports_elapsed_seconds() {
        let mut record = AttendanceRecord::open(7, at(9, 0));
        record.check_out = Some(at(17, 30));
        assert_eq!(record.state(), SessionState::Closed);
        assert_eq!(record.working_seconds(), Some(30_600));
    }

    #[test]
    fn serializes_with_backend_field_names() {
        let record = AttendanceRecord::open(7, at(9, 0));
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["checkin_datetime"], "2024-01-15T09:00:00");
        assert!(v["checkout_datetime"].is_null());
        assert_eq!(SessionState::Closed.to_string(), "closed");
    }
}
