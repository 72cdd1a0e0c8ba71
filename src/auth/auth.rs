use crate::api::error::ApiError;
use crate::model::role::Role;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};
use serde::Serialize;
use utoipa::ToSchema;

/// Caller identity, put into request extensions by `auth_middleware`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or(ApiError::Unauthorized("Missing token")),
        )
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin only"))
        }
    }

    pub fn require_admin_or_manager(&self) -> Result<(), ApiError> {
        if self.role.can_view_all() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin/Manager only"))
        }
    }

    /// The employee record this user checks in as.
    pub fn employee(&self) -> Result<u64, ApiError> {
        self.employee_id
            .ok_or(ApiError::Forbidden("No employee profile"))
    }

    /// Employees see their own attendance; admins and managers see everyone's.
    pub fn require_access_to(&self, employee_id: u64) -> Result<(), ApiError> {
        if self.role.can_view_all() || self.employee_id == Some(employee_id) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Not allowed to view this employee"))
        }
    }
}
