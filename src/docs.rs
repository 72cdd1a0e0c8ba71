use crate::api::attendance::{
    CheckOutRequest, CustomAttendanceRequest, DayStatusResponse, EmployeeSummary, SessionView,
    SummaryResponse,
};
use crate::api::employee::{
    CreateEmployee, EmployeeListResponse, EmployeeStatus, UpdateEmployee,
};
use crate::auth::auth::AuthUser;
use crate::model::attendance::{AttendanceEntry, AttendanceRecord, SessionState};
use crate::model::employee::Employee;
use crate::model::role::Role;
use crate::session::DaySessionStatus;
use crate::summary::{DailyStats, EmployeeStats};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance API",
        version = "1.0.0",
        description = r#"
## Attendance Session Tracking

Employees check in and out any number of times per day. Each check-in opens a
session; each check-out closes the most recent open one. The service derives the
day's status (active session, session count, total working time) from the stored
records and rejects transitions that would corrupt the timeline.

### Security
Every endpoint under `/api` requires a **JWT Bearer** access token.
Admins and managers may view any employee; employees see only their own records.
Only admins may record entries on behalf of someone else.

### Errors
Failures are returned as `{"message": "...", "code": "..."}`.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::add_custom,
        crate::api::attendance::day_status,
        crate::api::attendance::employee_history,
        crate::api::attendance::list_by_date,
        crate::api::attendance::summary,
        crate::api::attendance::daily,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::auth::handlers::me
    ),
    components(
        schemas(
            AttendanceRecord,
            AttendanceEntry,
            SessionState,
            DaySessionStatus,
            DayStatusResponse,
            SessionView,
            CheckOutRequest,
            CustomAttendanceRequest,
            EmployeeStats,
            EmployeeSummary,
            SummaryResponse,
            DailyStats,
            Employee,
            CreateEmployee,
            UpdateEmployee,
            EmployeeListResponse,
            EmployeeStatus,
            Role,
            AuthUser
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Check-in, check-out and attendance reporting"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Auth", description = "Caller identity"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
