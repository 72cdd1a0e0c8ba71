use std::collections::BTreeMap;

use crate::api::error::ApiError;
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::model::attendance::{AttendanceEntry, AttendanceRecord, SessionState};
use crate::session::{self, DaySessionStatus, SessionError};
use crate::summary::{self, EmployeeStats};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlConnection, MySqlPool, QueryBuilder};
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};

const RECORD_COLUMNS: &str = "id, employee_id, date, check_in, check_out, is_custom";

// -------------------- DTOs --------------------

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CheckOutRequest {
    /// Close this record instead of the latest open one
    #[serde(default, alias = "recordId")]
    #[schema(example = 12)]
    pub record_id: Option<u64>,
}

/// Accepts `HH:MM` (as sent by browser time inputs) or `HH:MM:SS`.
fn wall_clock<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
    let raw = String::deserialize(d)?;
    parse_wall_clock(&raw).map_err(serde::de::Error::custom)
}

fn optional_wall_clock<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(raw) if !raw.trim().is_empty() => parse_wall_clock(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

fn parse_wall_clock(raw: &str) -> Result<NaiveTime, String> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| format!("invalid time {raw:?}, expected HH:MM or HH:MM:SS"))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CustomAttendanceRequest {
    /// Admins may record attendance for someone else
    #[serde(default, alias = "employeeId")]
    #[schema(example = 2)]
    pub employee_id: Option<u64>,

    #[schema(example = "2024-01-15", value_type = String, format = "date")]
    pub date: NaiveDate,

    #[serde(
        deserialize_with = "wall_clock",
        alias = "checkIn",
        alias = "checkInTime",
        alias = "check_in_time"
    )]
    #[schema(example = "09:00", value_type = String)]
    pub check_in: NaiveTime,

    #[serde(
        default,
        deserialize_with = "optional_wall_clock",
        alias = "checkOut",
        alias = "checkOutTime",
        alias = "check_out_time"
    )]
    #[schema(example = "17:30", value_type = Option<String>, nullable = true)]
    pub check_out: Option<NaiveTime>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DayQuery {
    /// Defaults to today
    #[param(value_type = Option<String>, example = "2024-01-15")]
    pub date: Option<NaiveDate>,
    /// Defaults to the caller's own employee record
    #[serde(default, alias = "employeeId")]
    pub employee_id: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RangeQuery {
    /// Defaults to the first day of the current month
    #[serde(alias = "startDate")]
    #[param(value_type = Option<String>, example = "2024-01-01")]
    pub start_date: Option<NaiveDate>,
    /// Defaults to the last day of the current month
    #[serde(alias = "endDate")]
    #[param(value_type = Option<String>, example = "2024-01-31")]
    pub end_date: Option<NaiveDate>,
    /// Restrict the summary to one employee
    #[serde(default, alias = "employeeId")]
    pub employee_id: Option<u64>,
}

/// One session rendered for display.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    #[schema(example = 1)]
    pub id: u64,
    pub state: SessionState,
    #[schema(example = "09:00 AM")]
    pub check_in: String,
    #[schema(example = "05:30 PM")]
    pub check_out: String,
    #[schema(example = "8h 30m")]
    pub duration: String,
    pub is_custom: bool,
}

impl From<&AttendanceRecord> for SessionView {
    fn from(r: &AttendanceRecord) -> Self {
        Self {
            id: r.id,
            state: r.state(),
            check_in: session::format_clock(Some(r.check_in.time())),
            check_out: session::format_clock(r.check_out.map(|t| t.time())),
            duration: session::format_duration(r.working_seconds()),
            is_custom: r.is_custom,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DayStatusResponse {
    #[schema(example = 2)]
    pub employee_id: u64,
    #[schema(example = "2024-01-15", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[serde(flatten)]
    pub status: DaySessionStatus,
    pub sessions: Vec<SessionView>,
    pub can_check_in: bool,
    pub can_check_out: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmployeeSummary {
    #[schema(example = "Jane Smith")]
    pub name: String,
    #[schema(example = "HR")]
    pub department: String,
    #[serde(flatten)]
    pub stats: EmployeeStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryResponse {
    #[schema(example = "2024-01-01", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2024-01-31", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub data: Vec<EmployeeSummary>,
}

// -------------------- Helpers --------------------

/// Server wall-clock time at the store's precision.
fn now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = day.with_day(1).unwrap_or(day);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap_or(first);
    (first, last)
}

fn resolve_range(query: &RangeQuery) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let (first, last) = month_bounds(today());
    let start = query.start_date.unwrap_or(first);
    let end = query.end_date.unwrap_or(last);
    if start > end {
        return Err(ApiError::BadRequest(
            "start_date must not be after end_date".to_string(),
        ));
    }
    Ok((start, end))
}

/// Loads a day's records and locks them until the transaction ends.
async fn lock_day(
    conn: &mut MySqlConnection,
    employee_id: u64,
    date: NaiveDate,
) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM attendance \
         WHERE employee_id = ? AND date = ? ORDER BY check_in FOR UPDATE"
    );
    sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(employee_id)
        .bind(date)
        .fetch_all(&mut *conn)
        .await
}

async fn fetch_day(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM attendance \
         WHERE employee_id = ? AND date = ? ORDER BY check_in"
    );
    sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(employee_id)
        .bind(date)
        .fetch_all(pool)
        .await
}

async fn record_date(
    conn: &mut MySqlConnection,
    employee_id: u64,
    record_id: u64,
) -> Result<Option<NaiveDate>, sqlx::Error> {
    sqlx::query_scalar::<_, NaiveDate>(
        "SELECT date FROM attendance WHERE id = ? AND employee_id = ?",
    )
    .bind(record_id)
    .bind(employee_id)
    .fetch_optional(&mut *conn)
    .await
}

async fn insert_record(
    conn: &mut MySqlConnection,
    record: &AttendanceRecord,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, check_in, check_out, is_custom)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.employee_id)
    .bind(record.date)
    .bind(record.check_in)
    .bind(record.check_out)
    .bind(record.is_custom)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_id())
}

/// Sets check_out once; never overwrites a closed record.
async fn close_record(
    conn: &mut MySqlConnection,
    record: &AttendanceRecord,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = ?
        WHERE id = ?
        AND check_out IS NULL
        "#,
    )
    .bind(record.check_out)
    .bind(record.id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

async fn employee_exists(pool: &MySqlPool, employee_id: u64) -> Result<bool, sqlx::Error> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT EXISTS(SELECT 1 FROM employees WHERE id = ?)",
    )
    .bind(employee_id)
    .fetch_one(pool)
    .await?;
    Ok(found > 0)
}

// -------------------- Handlers --------------------

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 201, description = "Checked in successfully", body = Object, example = json!({
            "message": "Checked in successfully",
            "record": {
                "id": 3,
                "employee_id": 2,
                "date": "2024-01-15",
                "checkin_datetime": "2024-01-15T09:00:00",
                "checkout_datetime": null,
                "is_custom": false
            }
        })),
        (status = 409, description = "A session is already open", body = Object, example = json!({
            "message": "Please check out from your current session before checking in again",
            "code": "invalid_transition"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(name = "attendance_check_in", skip(auth, pool), fields(user_id = auth.user_id))]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<impl Responder, ApiError> {
    let employee_id = auth.employee()?;
    let at = now();

    let mut tx = pool.begin().await?;
    let mut records = lock_day(&mut tx, employee_id, at.date()).await?;
    session::validate(&records)?;

    let mut record = session::record_check_in(&mut records, employee_id, at)?.clone();
    record.id = insert_record(&mut tx, &record).await?;
    tx.commit().await?;

    info!(employee_id, record_id = record.id, "Checked in");

    Ok(HttpResponse::Created().json(json!({
        "message": "Checked in successfully",
        "record": record
    })))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body(
        content = CheckOutRequest,
        description = "Optional record to close; defaults to the latest open session",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Checked out successfully",
            "record": {
                "id": 3,
                "employee_id": 2,
                "date": "2024-01-15",
                "checkin_datetime": "2024-01-15T09:00:00",
                "checkout_datetime": "2024-01-15T17:30:00",
                "is_custom": false
            }
        })),
        (status = 400, description = "No active check-in found", body = Object, example = json!({
            "message": "No active check-in record found",
            "code": "no_active_session"
        })),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Record already checked out"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(name = "attendance_check_out", skip(auth, pool, body), fields(user_id = auth.user_id))]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: Option<web::Json<CheckOutRequest>>,
) -> Result<impl Responder, ApiError> {
    let employee_id = auth.employee()?;
    let target = body.and_then(|b| b.into_inner().record_id);
    let at = now();

    let mut tx = pool.begin().await?;

    // a targeted session may have started on an earlier day
    let date = match target {
        Some(id) => record_date(&mut tx, employee_id, id)
            .await?
            .ok_or(SessionError::RecordNotFound(id))?,
        None => at.date(),
    };

    let mut records = lock_day(&mut tx, employee_id, date).await?;
    session::validate(&records)?;

    let record = session::record_check_out(&mut records, at, target)?.clone();
    if !close_record(&mut tx, &record).await? {
        return Err(SessionError::AlreadyClosed(record.id).into());
    }
    tx.commit().await?;

    info!(employee_id, record_id = record.id, "Checked out");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked out successfully",
        "record": record
    })))
}

/// Add a manually entered session
#[utoipa::path(
    post,
    path = "/api/attendance/custom",
    request_body = CustomAttendanceRequest,
    responses(
        (status = 201, description = "Custom attendance added", body = Object, example = json!({
            "message": "Custom attendance added successfully",
            "record": {
                "id": 4,
                "employee_id": 2,
                "date": "2024-01-14",
                "checkin_datetime": "2024-01-14T09:00:00",
                "checkout_datetime": "2024-01-14T17:30:00",
                "is_custom": true
            }
        })),
        (status = 400, description = "Times out of order or overlapping an existing session"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Would open a second session"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(name = "attendance_custom", skip(auth, pool, payload), fields(user_id = auth.user_id))]
pub async fn add_custom(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CustomAttendanceRequest>,
) -> Result<impl Responder, ApiError> {
    let payload = payload.into_inner();

    let employee_id = match payload.employee_id {
        Some(id) if auth.employee_id != Some(id) => {
            auth.require_admin()?;
            if !employee_exists(pool.get_ref(), id).await? {
                return Err(ApiError::NotFound("Employee"));
            }
            id
        }
        _ => auth.employee()?,
    };

    let check_in = payload.date.and_time(payload.check_in);
    let check_out = payload.check_out.map(|t| payload.date.and_time(t));

    let mut tx = pool.begin().await?;
    let mut records = lock_day(&mut tx, employee_id, payload.date).await?;
    session::validate(&records)?;

    let mut record =
        session::record_custom(&mut records, employee_id, check_in, check_out)?.clone();
    record.id = insert_record(&mut tx, &record).await?;
    tx.commit().await?;

    info!(employee_id, record_id = record.id, date = %payload.date, "Custom attendance added");

    Ok(HttpResponse::Created().json(json!({
        "message": "Custom attendance added successfully",
        "record": record
    })))
}

/// Session status of one employee on one day
#[utoipa::path(
    get,
    path = "/api/attendance/status",
    params(DayQuery),
    responses(
        (status = 200, description = "Derived day status", body = DayStatusResponse),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn day_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DayQuery>,
) -> Result<impl Responder, ApiError> {
    let employee_id = match query.employee_id {
        Some(id) => {
            auth.require_access_to(id)?;
            id
        }
        None => auth.employee()?,
    };
    let date = query.date.unwrap_or_else(today);

    let records = fetch_day(pool.get_ref(), employee_id, date).await?;
    debug!(employee_id, %date, count = records.len(), "Resolving day status");

    let status = session::resolve(&records)?;
    let sessions = status.records.iter().map(SessionView::from).collect();

    Ok(HttpResponse::Ok().json(DayStatusResponse {
        employee_id,
        date,
        can_check_in: session::can_check_in(&status.records),
        can_check_out: session::can_check_out(&status.records),
        sessions,
        status,
    }))
}

/// Attendance history of one employee
#[utoipa::path(
    get,
    path = "/api/attendance/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        RangeQuery
    ),
    responses(
        (status = 200, description = "Records in check-in order", body = [AttendanceRecord]),
        (status = 400, description = "Invalid date range"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn employee_history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<RangeQuery>,
) -> Result<impl Responder, ApiError> {
    let employee_id = path.into_inner();
    auth.require_access_to(employee_id)?;
    let (start, end) = resolve_range(&query)?;

    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM attendance \
         WHERE employee_id = ? AND date BETWEEN ? AND ? ORDER BY date, check_in"
    );
    let records = sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(employee_id)
        .bind(start)
        .bind(end)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(records))
}

/// All attendance of one day, joined with employee details
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(DayQuery),
    responses(
        (status = 200, description = "Records of the day", body = [AttendanceEntry]),
        (status = 403, description = "Admin/Manager only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list_by_date(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DayQuery>,
) -> Result<impl Responder, ApiError> {
    auth.require_admin_or_manager()?;
    let date = query.date.unwrap_or_else(today);

    let mut qb: QueryBuilder<MySql> = QueryBuilder::new(
        r#"
        SELECT a.id, a.employee_id, a.date, a.check_in, a.check_out, a.is_custom,
               e.name AS employee_name, e.department
        FROM attendance a
        JOIN employees e ON e.id = a.employee_id
        WHERE a.date = "#,
    );
    qb.push_bind(date);
    if let Some(employee_id) = query.employee_id {
        qb.push(" AND a.employee_id = ").push_bind(employee_id);
    }
    qb.push(" ORDER BY a.check_in");

    let mut entries = qb
        .build_query_as::<AttendanceEntry>()
        .fetch_all(pool.get_ref())
        .await?;
    for entry in &mut entries {
        entry.state = Some(entry.record.state());
    }

    Ok(HttpResponse::Ok().json(entries))
}

/// Per-employee statistics over a date range
#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(RangeQuery),
    responses(
        (status = 200, description = "Attendance statistics", body = SummaryResponse),
        (status = 400, description = "Invalid date range"),
        (status = 403, description = "Admin/Manager only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<RangeQuery>,
) -> Result<impl Responder, ApiError> {
    auth.require_admin_or_manager()?;
    let (start, end) = resolve_range(&query)?;

    let mut employees_q: QueryBuilder<MySql> =
        QueryBuilder::new("SELECT id, name, department FROM employees WHERE status = 'active'");
    let mut records_q: QueryBuilder<MySql> = QueryBuilder::new(format!(
        "SELECT {RECORD_COLUMNS} FROM attendance WHERE date BETWEEN "
    ));
    records_q.push_bind(start).push(" AND ").push_bind(end);

    if let Some(employee_id) = query.employee_id {
        employees_q.push(" AND id = ").push_bind(employee_id);
        records_q.push(" AND employee_id = ").push_bind(employee_id);
    }
    employees_q.push(" ORDER BY name");

    let employees = employees_q
        .build_query_as::<(u64, String, String)>()
        .fetch_all(pool.get_ref())
        .await?;
    let records = records_q
        .build_query_as::<AttendanceRecord>()
        .fetch_all(pool.get_ref())
        .await?;

    let mut by_employee: BTreeMap<u64, Vec<AttendanceRecord>> = BTreeMap::new();
    for record in records {
        by_employee.entry(record.employee_id).or_default().push(record);
    }

    let data = employees
        .into_iter()
        .map(|(id, name, department)| {
            let records = by_employee.get(&id).map(Vec::as_slice).unwrap_or(&[]);
            EmployeeSummary {
                name,
                department,
                stats: summary::employee_stats(id, records, start, end, config.on_time_cutoff),
            }
        })
        .collect();

    Ok(HttpResponse::Ok().json(SummaryResponse {
        start_date: start,
        end_date: end,
        data,
    }))
}

/// Headcount for one day
#[utoipa::path(
    get,
    path = "/api/attendance/daily",
    params(DayQuery),
    responses(
        (status = 200, description = "Daily headcount", body = DailyStats),
        (status = 403, description = "Admin/Manager only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn daily(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DayQuery>,
) -> Result<impl Responder, ApiError> {
    auth.require_admin_or_manager()?;
    let date = query.date.unwrap_or_else(today);

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM employees WHERE status = 'active'",
    )
    .fetch_one(pool.get_ref())
    .await?;

    let sql = format!("SELECT {RECORD_COLUMNS} FROM attendance WHERE date = ?");
    let records = sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(date)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(summary::daily_stats(date, total.max(0) as u64, &records)))
}
