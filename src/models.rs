use serde::{Deserialize, Serialize};

/// Access-token claims. Tokens are minted by the identity service that
/// shares `JWT_SECRET`; this service only verifies them.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    /// Role id, see `Role::from_id`
    #[serde(alias = "role_id")]
    pub role: u8,
    pub exp: usize,

    pub token_type: TokenType,
    /// Present only if this user is linked to an employee record
    #[serde(default, alias = "employeeId")]
    pub employee_id: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
