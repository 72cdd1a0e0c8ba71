use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::attendance::AttendanceRecord;
use crate::session;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EmployeeStats {
    #[schema(example = 2)]
    pub employee_id: u64,
    /// Weekdays in range plus any weekend day actually worked
    #[schema(example = 22)]
    pub total_days: u32,
    #[schema(example = 20)]
    pub present_days: u32,
    #[schema(example = 18)]
    pub on_time_days: u32,
    #[schema(example = 90.9)]
    pub attendance_rate: f64,
    #[schema(example = 90.0)]
    pub punctuality_rate: f64,
    #[schema(example = 8.3)]
    pub avg_working_hours: f64,
    #[schema(example = 597600)]
    pub total_working_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DailyStats {
    #[schema(example = "2024-01-15", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = 4)]
    pub total_employees: u64,
    /// Employees with at least one record that day
    #[schema(example = 3)]
    pub present: u64,
    /// Employees whose latest session is open
    #[schema(example = 1)]
    pub active: u64,
    #[schema(example = 2)]
    pub checked_out: u64,
}

fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

fn rate(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round1(part as f64 * 100.0 / whole as f64)
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Aggregates one employee's records over `[start, end]`.
///
/// Records outside the range are ignored. A day counts as on time when its
/// first check-in is at or before `on_time_cutoff`.
pub fn employee_stats(
    employee_id: u64,
    records: &[AttendanceRecord],
    start: NaiveDate,
    end: NaiveDate,
    on_time_cutoff: NaiveTime,
) -> EmployeeStats {
    let mut first_check_in: BTreeMap<NaiveDate, NaiveTime> = BTreeMap::new();
    let mut total_working_seconds = 0i64;

    for record in records
        .iter()
        .filter(|r| r.employee_id == employee_id && r.date >= start && r.date <= end)
    {
        let t = record.check_in.time();
        first_check_in
            .entry(record.date)
            .and_modify(|first| *first = (*first).min(t))
            .or_insert(t);
        total_working_seconds += record.working_seconds().unwrap_or(0).max(0);
    }

    let weekdays = start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !is_weekend(*d))
        .count() as u32;
    let weekend_worked = first_check_in.keys().filter(|d| is_weekend(**d)).count() as u32;

    let total_days = weekdays + weekend_worked;
    let present_days = first_check_in.len() as u32;
    let on_time_days = first_check_in
        .values()
        .filter(|t| **t <= on_time_cutoff)
        .count() as u32;

    let avg_working_hours = if present_days == 0 {
        0.0
    } else {
        round1(total_working_seconds as f64 / 3600.0 / present_days as f64)
    };

    EmployeeStats {
        employee_id,
        total_days,
        present_days,
        on_time_days,
        attendance_rate: rate(present_days, total_days),
        punctuality_rate: rate(on_time_days, present_days),
        avg_working_hours,
        total_working_seconds,
    }
}

/// Headcount for a single day across all employees.
pub fn daily_stats(date: NaiveDate, total_employees: u64, records: &[AttendanceRecord]) -> DailyStats {
    let mut by_employee: BTreeMap<u64, Vec<AttendanceRecord>> = BTreeMap::new();
    for record in records.iter().filter(|r| r.date == date) {
        by_employee
            .entry(record.employee_id)
            .or_default()
            .push(record.clone());
    }

    // same rule as the day status: active only when the latest session is open
    let present = by_employee.len() as u64;
    let active = by_employee
        .values()
        .filter(|day| session::can_check_out(day))
        .count() as u64;

    DailyStats {
        date,
        total_employees,
        present,
        active,
        checked_out: present - active,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn dt(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn record(employee_id: u64, check_in: NaiveDateTime, check_out: Option<NaiveDateTime>) -> AttendanceRecord {
        AttendanceRecord {
            id: 0,
            employee_id,
            date: check_in.date(),
            check_in,
            check_out,
            is_custom: false,
        }
    }

    fn cutoff() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn stats_for_a_working_week() {
        // 2024-01-15 is a Monday
        let records = vec![
            record(1, dt(15, 9, 0), Some(dt(15, 17, 30))),
            record(1, dt(16, 9, 15), Some(dt(16, 12, 0))),
            record(1, dt(16, 8, 45), Some(dt(16, 9, 0))),
            record(1, dt(17, 10, 0), None),
            record(2, dt(17, 8, 0), Some(dt(17, 16, 0))),
        ];
        let start = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 19).unwrap();
        let stats = employee_stats(1, &records, start, end, cutoff());

        assert_eq!(stats.total_days, 5);
        assert_eq!(stats.present_days, 3);
        // the 16th counts as on time through its earliest check-in
        assert_eq!(stats.on_time_days, 2);
        assert_eq!(stats.attendance_rate, 60.0);
        assert_eq!(stats.punctuality_rate, 66.7);
        // 8h30 + 2h45 + 0h15 = 11.5h over 3 days
        assert_eq!(stats.total_working_seconds, 41_400);
        assert_eq!(stats.avg_working_hours, 3.8);
    }

    #[test]
    fn weekend_work_extends_total_days() {
        let records = vec![record(1, dt(20, 10, 0), Some(dt(20, 12, 0)))];
        let start = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 21).unwrap();
        let stats = employee_stats(1, &records, start, end, cutoff());
        assert_eq!(stats.total_days, 1);
        assert_eq!(stats.attendance_rate, 100.0);
        assert_eq!(stats.punctuality_rate, 0.0);
    }

    #[test]
    fn no_records_yields_zero_rates() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let stats = employee_stats(1, &[], start, start, cutoff());
        assert_eq!(stats.total_days, 1);
        assert_eq!(stats.present_days, 0);
        assert_eq!(stats.attendance_rate, 0.0);
        assert_eq!(stats.avg_working_hours, 0.0);
    }

    #[test]
    fn daily_headcount() {
        let records = vec![
            record(1, dt(15, 9, 0), Some(dt(15, 12, 0))),
            record(1, dt(15, 13, 0), None),
            record(2, dt(15, 9, 0), Some(dt(15, 17, 0))),
            record(3, dt(16, 9, 0), None),
        ];
        let stats = daily_stats(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(), 4, &records);
        assert_eq!(stats.present, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.checked_out, 1);
        assert_eq!(stats.total_employees, 4);
    }

    #[test]
    fn stale_open_record_does_not_count_as_active() {
        // an earlier session left open, followed by a closed one
        let records = vec![
            record(1, dt(15, 8, 0), None),
            record(1, dt(15, 9, 0), Some(dt(15, 12, 0))),
            record(2, dt(15, 9, 0), Some(dt(15, 10, 0))),
            record(2, dt(15, 11, 0), None),
        ];
        let stats = daily_stats(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(), 2, &records);
        assert_eq!(stats.present, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.checked_out, 1);
    }
}
