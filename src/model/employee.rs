use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 2,
        "employee_code": "EMP-002",
        "name": "Jane Smith",
        "email": "jane@company.com",
        "department": "HR",
        "role": "employee",
        "join_date": "2023-02-20",
        "status": "active"
    })
)]
pub struct Employee {
    #[schema(example = 2)]
    pub id: u64,

    #[schema(example = "EMP-002")]
    pub employee_code: String,

    #[schema(example = "Jane Smith")]
    pub name: String,

    #[schema(example = "jane@company.com")]
    pub email: String,

    #[schema(example = "HR")]
    pub department: String,

    /// One of `admin`, `manager`, `employee`
    #[schema(example = "employee")]
    pub role: String,

    #[schema(
        example = "2023-02-20",
        value_type = String,
        format = "date"
    )]
    pub join_date: NaiveDate,

    #[schema(example = "active")]
    pub status: String,
}
