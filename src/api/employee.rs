use crate::{
    api::error::ApiError,
    auth::auth::AuthUser,
    model::{employee::Employee, role::Role},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use strum_macros::{AsRefStr, Display};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

const EMPLOYEE_COLUMNS: &str =
    "id, employee_code, name, email, department, role, join_date, status";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize, Display, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[serde(alias = "employeeCode")]
    #[schema(example = "EMP-005", value_type = String)]
    pub employee_code: String,
    #[schema(example = "Jane Smith", value_type = String)]
    pub name: String,
    #[schema(example = "jane@company.com", format = "email", value_type = String)]
    pub email: String,
    #[schema(example = "HR", value_type = String)]
    pub department: String,
    #[serde(default = "default_role", alias = "role_name")]
    pub role: Role,
    /// Defaults to today
    #[serde(default, alias = "joinDate", alias = "hire_date")]
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub join_date: Option<NaiveDate>,
}

fn default_role() -> Role {
    Role::Employee
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department: Option<String>,
    #[param(value_type = Option<String>, example = "employee")]
    pub role: Option<Role>,
    #[param(value_type = Option<String>, example = "active")]
    pub status: Option<EmployeeStatus>,
    /// Matches name, email or department
    pub search: Option<String>,
}

impl EmployeeQuery {
    /// `(page, per_page, offset)`, the offset computed in `u64`.
    fn paging(&self) -> (u32, u32, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page as u64 - 1) * per_page as u64;
        (page, per_page, offset)
    }
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 4)]
    pub total: i64,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateEmployee {
    #[serde(alias = "employeeCode")]
    pub employee_code: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub role: Option<Role>,
    pub status: Option<EmployeeStatus>,
    #[serde(alias = "joinDate", alias = "hire_date")]
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub join_date: Option<NaiveDate>,
}

fn require_text(field: &'static str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    require_text("email", email)?;
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ApiError::BadRequest(format!("invalid email {email:?}"))),
    }
}

impl CreateEmployee {
    fn validate(&self) -> Result<(), ApiError> {
        require_text("employee_code", &self.employee_code)?;
        require_text("name", &self.name)?;
        require_text("department", &self.department)?;
        validate_email(&self.email)
    }
}

impl UpdateEmployee {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(code) = &self.employee_code {
            require_text("employee_code", code)?;
        }
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(department) = &self.department {
            require_text("department", department)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        Ok(())
    }

    /// Appends `SET col = ?, ...`; returns false when nothing is set.
    fn push_assignments(&self, qb: &mut QueryBuilder<'_, MySql>) -> bool {
        let mut set = qb.separated(", ");
        let mut any = false;

        if let Some(v) = &self.employee_code {
            set.push("employee_code = ").push_bind_unseparated(v.trim().to_string());
            any = true;
        }
        if let Some(v) = &self.name {
            set.push("name = ").push_bind_unseparated(v.trim().to_string());
            any = true;
        }
        if let Some(v) = &self.email {
            set.push("email = ").push_bind_unseparated(v.trim().to_lowercase());
            any = true;
        }
        if let Some(v) = &self.department {
            set.push("department = ").push_bind_unseparated(v.trim().to_string());
            any = true;
        }
        if let Some(v) = self.role {
            set.push("role = ").push_bind_unseparated(v.to_string());
            any = true;
        }
        if let Some(v) = self.status {
            set.push("status = ").push_bind_unseparated(v.to_string());
            any = true;
        }
        if let Some(v) = self.join_date {
            set.push("join_date = ").push_bind_unseparated(v);
            any = true;
        }
        any
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, MySql>, query: &EmployeeQuery) {
    qb.push(" WHERE 1 = 1");

    if let Some(department) = &query.department {
        qb.push(" AND department = ").push_bind(department.clone());
    }
    if let Some(role) = query.role {
        qb.push(" AND role = ").push_bind(role.to_string());
    }
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.to_string());
    }
    if let Some(search) = &query.search {
        let like = format!("%{}%", search.trim());
        qb.push(" AND (name LIKE ")
            .push_bind(like.clone())
            .push(" OR email LIKE ")
            .push_bind(like.clone())
            .push(" OR department LIKE ")
            .push_bind(like)
            .push(")");
    }
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created successfully", body = Object, example = json!({
            "message": "Employee created successfully",
            "id": 5
        })),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Employee code or email already exists")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> Result<impl Responder, ApiError> {
    auth.require_admin()?;
    payload.validate()?;

    let join_date = payload
        .join_date
        .unwrap_or_else(|| Local::now().date_naive());

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (employee_code, name, email, department, role, join_date, status)
        VALUES (?, ?, ?, ?, ?, ?, 'active')
        "#,
    )
    .bind(payload.employee_code.trim())
    .bind(payload.name.trim())
    .bind(payload.email.trim().to_lowercase())
    .bind(payload.department.trim())
    .bind(payload.role.to_string())
    .bind(join_date)
    .execute(pool.get_ref())
    .await?;

    let id = result.last_insert_id();
    info!(employee_id = id, by = auth.user_id, "Employee created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Employee created successfully",
        "id": id
    })))
}

#[utoipa::path(
    get,
    path = "/api/employee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 403, description = "Admin only")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> Result<impl Responder, ApiError> {
    auth.require_admin()?;

    let (page, per_page, offset) = query.paging();

    // ---------- total count ----------
    let mut count_q: QueryBuilder<MySql> = QueryBuilder::new("SELECT COUNT(*) FROM employees");
    push_filters(&mut count_q, &query);
    debug!(sql = %count_q.sql(), "Counting employees");

    let total = count_q
        .build_query_scalar::<i64>()
        .fetch_one(pool.get_ref())
        .await?;

    // ---------- data query ----------
    let mut data_q: QueryBuilder<MySql> =
        QueryBuilder::new(format!("SELECT {EMPLOYEE_COLUMNS} FROM employees"));
    push_filters(&mut data_q, &query);
    data_q
        .push(" ORDER BY id DESC LIMIT ")
        .push_bind(per_page as i64)
        .push(" OFFSET ")
        .push_bind(offset);
    debug!(sql = %data_q.sql(), page, per_page, offset, "Fetching employees");

    let employees = data_q
        .build_query_as::<Employee>()
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated successfully", body = Object, example = json!({
            "message": "Employee updated successfully"
        })),
        (status = 400, description = "No fields provided"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found",
            "code": "not_found"
        })),
        (status = 403, description = "Admin only")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdateEmployee>,
) -> Result<impl Responder, ApiError> {
    auth.require_admin()?;
    let employee_id = path.into_inner();
    body.validate()?;

    let mut qb: QueryBuilder<MySql> = QueryBuilder::new("UPDATE employees SET ");
    if !body.push_assignments(&mut qb) {
        return Err(ApiError::BadRequest(
            "No fields provided for update".to_string(),
        ));
    }
    qb.push(" WHERE id = ").push_bind(employee_id);

    qb.build().execute(pool.get_ref()).await?;

    // MySQL reports 0 affected rows for a no-op update, so check existence separately
    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE id = ?")
        .bind(employee_id)
        .fetch_one(pool.get_ref())
        .await?;
    if exists == 0 {
        return Err(ApiError::NotFound("Employee"));
    }

    info!(employee_id, by = auth.user_id, "Employee updated");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee updated successfully"
    })))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found"),
        (status = 403, description = "Admin only")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<impl Responder, ApiError> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Employee"));
    }

    info!(employee_id, by = auth.user_id, "Employee deleted");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<impl Responder, ApiError> {
    let employee_id = path.into_inner();
    // employees may look up their own profile
    auth.require_access_to(employee_id)?;

    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
    let employee = sqlx::query_as::<_, Employee>(&sql)
        .bind(employee_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or(ApiError::NotFound("Employee"))?;

    Ok(HttpResponse::Ok().json(employee))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(email: &str) -> CreateEmployee {
        serde_json::from_value(json!({
            "employeeCode": "EMP-009",
            "name": "Mike Johnson",
            "email": email,
            "department": "Finance",
            "joinDate": "2023-03-10"
        }))
        .unwrap()
    }

    #[test]
    fn create_payload_defaults_and_aliases() {
        let payload = create("mike@company.com");
        assert_eq!(payload.role, Role::Employee);
        assert_eq!(payload.join_date, NaiveDate::from_ymd_opt(2023, 3, 10));
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn bad_email_is_rejected() {
        assert!(create("mike").validate().is_err());
        assert!(create("@company.com").validate().is_err());
        assert!(create("  ").validate().is_err());
    }

    #[test]
    fn update_builds_only_given_columns() {
        let update: UpdateEmployee = serde_json::from_value(json!({
            "department": "IT",
            "status": "inactive"
        }))
        .unwrap();
        let mut qb: QueryBuilder<MySql> = QueryBuilder::new("UPDATE employees SET ");
        assert!(update.push_assignments(&mut qb));
        assert_eq!(qb.sql(), "UPDATE employees SET department = ?, status = ?");

        let mut qb: QueryBuilder<MySql> = QueryBuilder::new("UPDATE employees SET ");
        assert!(!UpdateEmployee::default().push_assignments(&mut qb));
    }

    #[test]
    fn filters_bind_every_value() {
        let query: EmployeeQuery = serde_json::from_value(json!({
            "role": "manager",
            "search": "ja"
        }))
        .unwrap();
        let mut qb: QueryBuilder<MySql> = QueryBuilder::new("SELECT COUNT(*) FROM employees");
        push_filters(&mut qb, &query);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM employees WHERE 1 = 1 AND role = ? \
             AND (name LIKE ? OR email LIKE ? OR department LIKE ?)"
        );
    }

    fn query(page: Option<u32>, per_page: Option<u32>) -> EmployeeQuery {
        EmployeeQuery {
            page,
            per_page,
            department: None,
            role: None,
            status: None,
            search: None,
        }
    }

    #[test]
    fn paging_defaults_and_bounds() {
        assert_eq!(query(None, None).paging(), (1, 20, 0));
        assert_eq!(query(Some(0), Some(0)).paging(), (1, 1, 0));
        assert_eq!(query(Some(3), Some(500)).paging(), (3, 100, 200));
    }

    #[test]
    fn huge_page_number_does_not_overflow() {
        let (page, per_page, offset) = query(Some(u32::MAX), Some(100)).paging();
        assert_eq!(page, u32::MAX);
        assert_eq!(per_page, 100);
        assert_eq!(offset, (u32::MAX as u64 - 1) * 100);
    }
}
