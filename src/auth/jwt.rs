use crate::models::Claims;
use jsonwebtoken::{DecodingKey, Validation, decode, errors::Error};

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::TokenType;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn now() -> usize {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as usize
    }

    /// Mints a token the way the identity service does.
    pub(crate) fn issue(
        role: u8,
        employee_id: Option<u64>,
        token_type: TokenType,
        ttl: isize,
        secret: &str,
    ) -> String {
        let claims = Claims {
            user_id: 42,
            sub: "jane".to_string(),
            role,
            exp: (now() as isize + ttl) as usize,
            token_type,
            employee_id,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_round_trips() {
        let token = issue(3, Some(2), TokenType::Access, 900, "s3cret");
        let claims = verify_token(&token, "s3cret").unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.employee_id, Some(2));
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn wrong_secret_or_expired_token_fails() {
        let token = issue(3, None, TokenType::Access, 900, "s3cret");
        assert!(verify_token(&token, "other").is_err());

        // beyond the default 60s leeway
        let expired = issue(3, None, TokenType::Access, -600, "s3cret");
        assert!(verify_token(&expired, "s3cret").is_err());
    }
}
