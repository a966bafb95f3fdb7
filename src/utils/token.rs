use crate::error::{Error, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn user_id(&self) -> Uuid {
        self.sub
    }

    pub fn has_role(&self, allowed: &[&str]) -> bool {
        allowed.iter().any(|r| r.eq_ignore_ascii_case(&self.role))
    }
}

/// HS256 signing and verification keys shared by the login handler and the
/// auth middleware.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            ttl: Duration::hours(ttl_hours.max(1)),
        }
    }

    pub fn issue(&self, user_id: Uuid, role: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            role: role.to_string(),
            exp: (now + self.ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| Error::Unauthorized("invalid_token".to_string()))
    }

    #[cfg(test)]
    pub(crate) fn sign(&self, claims: &Claims) -> String {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let keys = JwtKeys::new("test-secret", 24);
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id, "student").unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.user_id(), user_id);
        assert_eq!(claims.role, "student");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = JwtKeys::new("secret-1", 24).issue(Uuid::new_v4(), "admin").unwrap();
        assert!(matches!(
            JwtKeys::new("secret-2", 24).verify(&token),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = JwtKeys::new("test-secret", 24);
        let past = Utc::now() - Duration::hours(2);
        let token = keys.sign(&Claims {
            sub: Uuid::new_v4(),
            role: "student".into(),
            exp: past.timestamp() as usize,
            iat: (past - Duration::hours(1)).timestamp() as usize,
        });
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn role_check_ignores_case() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: "Instructor".into(),
            exp: 0,
            iat: 0,
        };
        assert!(claims.has_role(&["admin", "instructor"]));
        assert!(!claims.has_role(&["admin"]));
    }
}
