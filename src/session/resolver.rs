//! Check-in/check-out reconciliation for one employee on one calendar day.
//!
//! Every function takes the day's records explicitly; nothing here touches
//! the store. Filtering records down to a single employee and date is the
//! caller's job. "Most recent" always means the record with the latest
//! check-in, ties resolved in favour of the later position in the input.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use utoipa::ToSchema;

use super::error::SessionError;
use super::format::format_duration;
use crate::model::attendance::AttendanceRecord;

/// Derived view of a day's sessions. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DaySessionStatus {
    /// Records in check-in order
    pub records: Vec<AttendanceRecord>,
    pub has_active_check_in: bool,
    pub active_record: Option<AttendanceRecord>,
    pub total_check_ins: usize,
    /// Closed sessions only; an open session contributes nothing
    #[schema(example = 30600)]
    pub total_working_seconds: i64,
    #[schema(example = "8h 30m")]
    pub total_working_hours: String,
}

impl DaySessionStatus {
    pub fn total_working_duration(&self) -> Duration {
        Duration::seconds(self.total_working_seconds)
    }
}

fn latest(records: &[AttendanceRecord]) -> Option<&AttendanceRecord> {
    records.iter().max_by_key(|r| r.check_in)
}

/// Stable sort by check-in time; equal check-ins keep their input order,
/// so the last element is always the record `latest` picks.
pub fn normalize(records: &[AttendanceRecord]) -> Vec<AttendanceRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| r.check_in);
    sorted
}

/// Expects records that already passed [`validate`]; an inverted record
/// contributes its negative duration as is. Use [`resolve`] on untrusted data.
pub fn derive_status(records: &[AttendanceRecord]) -> DaySessionStatus {
    let records = normalize(records);

    let active_record = records.last().filter(|r| r.is_open()).cloned();

    let total = records
        .iter()
        .filter_map(AttendanceRecord::working_duration)
        .fold(Duration::zero(), |acc, d| acc + d);
    let total_working_seconds = total.num_seconds();

    DaySessionStatus {
        has_active_check_in: active_record.is_some(),
        active_record,
        total_check_ins: records.len(),
        total_working_seconds,
        total_working_hours: format_duration(Some(total_working_seconds)),
        records,
    }
}

/// Rejects records whose check-out does not come after their check-in.
pub fn validate(records: &[AttendanceRecord]) -> Result<(), SessionError> {
    for record in records {
        if let Some(out) = record.check_out {
            if out <= record.check_in {
                return Err(SessionError::InvalidTimestamp {
                    timestamp: out,
                    bound: record.check_in,
                });
            }
        }
    }
    Ok(())
}

/// `validate` followed by `derive_status`.
pub fn resolve(records: &[AttendanceRecord]) -> Result<DaySessionStatus, SessionError> {
    validate(records)?;
    Ok(derive_status(records))
}

/// Only one session may be open at a time.
pub fn can_check_in(records: &[AttendanceRecord]) -> bool {
    latest(records).map_or(true, |r| !r.is_open())
}

pub fn can_check_out(records: &[AttendanceRecord]) -> bool {
    latest(records).is_some_and(AttendanceRecord::is_open)
}

/// Opens a new session at `at` and appends it to `records`.
///
/// The appended record carries [`UNSAVED_ID`](crate::model::attendance::UNSAVED_ID)
/// until the store assigns a real id.
pub fn record_check_in(
    records: &mut Vec<AttendanceRecord>,
    employee_id: u64,
    at: NaiveDateTime,
) -> Result<&AttendanceRecord, SessionError> {
    if !can_check_in(records) {
        return Err(SessionError::InvalidTransition);
    }

    // a new session may not start inside an earlier one
    let bound = records
        .iter()
        .map(|r| r.check_out.unwrap_or(r.check_in))
        .max();
    if let Some(bound) = bound {
        if at < bound {
            return Err(SessionError::InvalidTimestamp {
                timestamp: at,
                bound,
            });
        }
    }

    records.push(AttendanceRecord::open(employee_id, at));
    let idx = records.len() - 1;
    Ok(&records[idx])
}

/// Closes `target` if given, otherwise the most recent open session.
pub fn record_check_out(
    records: &mut [AttendanceRecord],
    at: NaiveDateTime,
    target: Option<u64>,
) -> Result<&AttendanceRecord, SessionError> {
    let idx = match target {
        Some(id) => {
            let idx = records
                .iter()
                .position(|r| r.id == id)
                .ok_or(SessionError::RecordNotFound(id))?;
            if !records[idx].is_open() {
                return Err(SessionError::AlreadyClosed(id));
            }
            idx
        }
        None => records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_open())
            .max_by_key(|(_, r)| r.check_in)
            .map(|(i, _)| i)
            .ok_or(SessionError::NoActiveSession)?,
    };

    let record = &mut records[idx];
    if at <= record.check_in {
        return Err(SessionError::InvalidTimestamp {
            timestamp: at,
            bound: record.check_in,
        });
    }
    record.check_out = Some(at);
    Ok(&*record)
}

/// Inserts a manually entered session in check-in order.
pub fn record_custom(
    records: &mut Vec<AttendanceRecord>,
    employee_id: u64,
    check_in: NaiveDateTime,
    check_out: Option<NaiveDateTime>,
) -> Result<&AttendanceRecord, SessionError> {
    if let Some(out) = check_out {
        if out <= check_in {
            return Err(SessionError::InvalidTimestamp {
                timestamp: out,
                bound: check_in,
            });
        }
    }

    if check_out.is_none() && records.iter().any(AttendanceRecord::is_open) {
        return Err(SessionError::InvalidTransition);
    }

    let end = check_out.unwrap_or(NaiveDateTime::MAX);
    if let Some(clash) = records.iter().find(|r| {
        let r_end = r.check_out.unwrap_or(NaiveDateTime::MAX);
        check_in < r_end && r.check_in < end
    }) {
        return Err(SessionError::InvalidTimestamp {
            timestamp: check_in,
            bound: clash.check_in,
        });
    }

    let mut record = AttendanceRecord::open(employee_id, check_in);
    record.check_out = check_out;
    record.is_custom = true;

    let pos = records.partition_point(|r| r.check_in <= check_in);
    records.insert(pos, record);
    Ok(&records[pos])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::UNSAVED_ID;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn record(id: u64, check_in: NaiveDateTime, check_out: Option<NaiveDateTime>) -> AttendanceRecord {
        AttendanceRecord {
            id,
            employee_id: 1,
            date: check_in.date(),
            check_in,
            check_out,
            is_custom: false,
        }
    }

    #[test]
    fn empty_day_has_no_active_session() {
        let status = derive_status(&[]);
        assert!(!status.has_active_check_in);
        assert_eq!(status.total_check_ins, 0);
        assert_eq!(status.active_record, None);
        assert_eq!(format_duration(Some(status.total_working_seconds)), "--:--");
        assert!(can_check_in(&[]));
        assert!(!can_check_out(&[]));
    }

    #[test]
    fn open_session_blocks_check_in() {
        let records = vec![record(1, at(9, 0), None)];
        let status = derive_status(&records);
        assert!(status.has_active_check_in);
        assert_eq!(status.active_record.as_ref().map(|r| r.id), Some(1));
        assert!(can_check_out(&records));
        assert!(!can_check_in(&records));
    }

    #[test]
    fn closed_session_counts_towards_total() {
        let records = vec![record(1, at(9, 0), Some(at(17, 30)))];
        let status = derive_status(&records);
        assert_eq!(status.total_working_seconds, 30_600);
        assert_eq!(status.total_working_hours, "8h 30m");
        assert_eq!(format_duration(Some(30_600)), "8h 30m");
        assert!(!status.has_active_check_in);
    }

    #[test]
    fn check_in_while_open_is_rejected() {
        let mut records = vec![record(1, at(9, 0), None)];
        let err = record_check_in(&mut records, 1, at(10, 0)).unwrap_err();
        assert_eq!(err, SessionError::InvalidTransition);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn check_out_before_check_in_is_rejected() {
        let mut records = vec![record(1, at(9, 0), None)];
        let err = record_check_out(&mut records, at(8, 0), None).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTimestamp {
                timestamp: at(8, 0),
                bound: at(9, 0)
            }
        );
        let err = record_check_out(&mut records, at(9, 0), None).unwrap_err();
        assert_eq!(err.code(), "invalid_timestamp");
        assert!(records[0].is_open());
    }

    #[test]
    fn open_session_is_excluded_from_total() {
        let records = vec![
            record(1, at(9, 0), Some(at(12, 0))),
            record(2, at(13, 0), None),
        ];
        let status = derive_status(&records);
        assert_eq!(status.total_working_seconds, 3 * 3600);
        assert_eq!(status.total_check_ins, 2);
        assert_eq!(status.active_record.map(|r| r.id), Some(2));
    }

    #[test]
    fn equal_check_ins_keep_input_order() {
        let records = vec![
            record(7, at(9, 0), Some(at(10, 0))),
            record(3, at(9, 0), None),
        ];
        let sorted = normalize(&records);
        assert_eq!(sorted.iter().map(|r| r.id).collect::<Vec<_>>(), vec![7, 3]);

        let status = derive_status(&records);
        assert_eq!(status.active_record.map(|r| r.id), Some(3));
        assert!(can_check_out(&records));
    }

    #[test]
    fn inverted_record_is_not_clamped() {
        let records = vec![
            record(1, at(9, 0), Some(at(12, 0))),
            record(2, at(13, 0), Some(at(12, 0))),
        ];
        assert_eq!(derive_status(&records).total_working_seconds, 2 * 3600);
        assert!(matches!(
            resolve(&records),
            Err(SessionError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn unordered_input_is_normalized() {
        let records = vec![
            record(2, at(13, 0), None),
            record(1, at(9, 0), Some(at(12, 0))),
        ];
        let status = derive_status(&records);
        assert_eq!(status.records[0].id, 1);
        assert!(status.has_active_check_in);
        assert!(can_check_out(&records));
    }

    #[test]
    fn check_in_appends_unsaved_open_record() {
        let mut records = vec![record(1, at(9, 0), Some(at(12, 0)))];
        let new = record_check_in(&mut records, 1, at(13, 0)).unwrap().clone();
        assert_eq!(new.id, UNSAVED_ID);
        assert!(new.is_open());
        assert_eq!(records.len(), 2);
        assert!(!can_check_in(&records));
        assert!(can_check_out(&records));
    }

    #[test]
    fn check_in_inside_previous_session_is_rejected() {
        let mut records = vec![record(1, at(9, 0), Some(at(12, 0)))];
        let err = record_check_in(&mut records, 1, at(11, 0)).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTimestamp {
                timestamp: at(11, 0),
                bound: at(12, 0)
            }
        );
        // back-to-back sessions are fine
        assert!(record_check_in(&mut records, 1, at(12, 0)).is_ok());
    }

    #[test]
    fn targeted_check_out_errors() {
        let mut records = vec![
            record(1, at(9, 0), Some(at(12, 0))),
            record(2, at(13, 0), None),
        ];
        assert_eq!(
            record_check_out(&mut records, at(17, 0), Some(99)).unwrap_err(),
            SessionError::RecordNotFound(99)
        );
        assert_eq!(
            record_check_out(&mut records, at(17, 0), Some(1)).unwrap_err(),
            SessionError::AlreadyClosed(1)
        );
        let closed = record_check_out(&mut records, at(17, 0), Some(2)).unwrap();
        assert_eq!(closed.check_out, Some(at(17, 0)));
        assert!(can_check_in(&records));
    }

    #[test]
    fn check_out_without_open_session_fails() {
        let mut records = vec![record(1, at(9, 0), Some(at(12, 0)))];
        assert_eq!(
            record_check_out(&mut records, at(17, 0), None).unwrap_err(),
            SessionError::NoActiveSession
        );
        assert_eq!(
            record_check_out(&mut [], at(17, 0), None).unwrap_err(),
            SessionError::NoActiveSession
        );
    }

    #[test]
    fn untargeted_check_out_picks_latest_open() {
        // two open sessions can only come from legacy data
        let mut records = vec![record(1, at(8, 0), None), record(2, at(9, 0), None)];
        let closed = record_check_out(&mut records, at(10, 0), None).unwrap();
        assert_eq!(closed.id, 2);
        assert!(records[0].is_open());
    }

    #[test]
    fn validate_rejects_inverted_record() {
        let records = vec![record(1, at(12, 0), Some(at(9, 0)))];
        assert!(matches!(
            resolve(&records),
            Err(SessionError::InvalidTimestamp { .. })
        ));
        assert!(resolve(&[record(1, at(9, 0), Some(at(12, 0)))]).is_ok());
    }

    #[test]
    fn custom_entry_is_inserted_in_order() {
        let mut records = vec![record(1, at(13, 0), Some(at(17, 0)))];
        let custom = record_custom(&mut records, 1, at(8, 0), Some(at(12, 0)))
            .unwrap()
            .clone();
        assert!(custom.is_custom);
        assert_eq!(records[0].check_in, at(8, 0));
        assert_eq!(derive_status(&records).total_working_seconds, 8 * 3600);
    }

    #[test]
    fn custom_entry_validation() {
        let mut records = vec![record(1, at(9, 0), Some(at(12, 0)))];
        assert!(matches!(
            record_custom(&mut records, 1, at(14, 0), Some(at(13, 0))),
            Err(SessionError::InvalidTimestamp { .. })
        ));
        assert_eq!(
            record_custom(&mut records, 1, at(11, 0), Some(at(13, 0))).unwrap_err(),
            SessionError::InvalidTimestamp {
                timestamp: at(11, 0),
                bound: at(9, 0)
            }
        );
        // an open custom entry before a closed session would overlap it
        assert!(record_custom(&mut records, 1, at(8, 0), None).is_err());

        records.push(record(2, at(13, 0), None));
        assert_eq!(
            record_custom(&mut records, 1, at(18, 0), None).unwrap_err(),
            SessionError::InvalidTransition
        );
        assert_eq!(records.len(), 2);
    }

    fn arb_day() -> impl Strategy<Value = Vec<AttendanceRecord>> {
        // (start minute, length in minutes, closed?) laid out back to back
        prop::collection::vec((0u32..60, 1u32..240, any::<bool>()), 0..8).prop_map(|spans| {
            let mut cursor = at(6, 0);
            let last = spans.len().saturating_sub(1);
            spans
                .into_iter()
                .enumerate()
                .map(|(i, (gap, len, closed))| {
                    let check_in = cursor + Duration::minutes(gap as i64);
                    let check_out = check_in + Duration::minutes(len as i64);
                    cursor = check_out;
                    let open = i == last && !closed;
                    record(i as u64 + 1, check_in, (!open).then_some(check_out))
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_total_check_ins_matches_len(records in arb_day()) {
            prop_assert_eq!(derive_status(&records).total_check_ins, records.len());
        }

        #[test]
        fn prop_contributions_are_non_negative(records in arb_day()) {
            for r in &records {
                if let Some(secs) = r.working_seconds() {
                    prop_assert!(secs >= 0);
                }
            }
            prop_assert!(derive_status(&records).total_working_seconds >= 0);
        }

        #[test]
        fn prop_derive_status_is_idempotent(records in arb_day()) {
            prop_assert_eq!(derive_status(&records), derive_status(&records));
        }

        #[test]
        fn prop_check_in_and_out_alternate(records in arb_day()) {
            let mut records = records;
            let tail = records.iter().filter_map(|r| r.check_out).max().unwrap_or(at(6, 0));
            prop_assert!(can_check_in(&records) != can_check_out(&records));

            if can_check_out(&records) {
                let open_at = records.last().unwrap().check_in;
                record_check_out(&mut records, open_at + Duration::minutes(5), None).unwrap();
            } else {
                record_check_in(&mut records, 1, tail + Duration::minutes(1)).unwrap();
                prop_assert!(!can_check_in(&records));
                prop_assert!(can_check_out(&records));
                let open_at = records.last().unwrap().check_in;
                record_check_out(&mut records, open_at + Duration::minutes(5), None).unwrap();
            }
            prop_assert!(can_check_in(&records));
            prop_assert!(!can_check_out(&records));
        }
    }
}
