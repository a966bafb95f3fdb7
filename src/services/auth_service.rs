use crate::dto::auth_dto::{AuthResponse, LoginPayload, RegisterPayload};
use crate::error::{is_unique_violation, Error, Result};
use crate::models::user::{User, ROLE_INSTRUCTOR, ROLE_STUDENT};
use crate::utils::crypto::{hash_password, verify_password};
use crate::utils::token::JwtKeys;
use sqlx::PgPool;

/// Roles that can be chosen at sign-up. Admins are provisioned out of band.
fn signup_role(requested: Option<&str>) -> Result<&'static str> {
    match requested.map(|r| r.trim().to_ascii_lowercase()) {
        None => Ok(ROLE_STUDENT),
        Some(r) if r == ROLE_STUDENT => Ok(ROLE_STUDENT),
        Some(r) if r == ROLE_INSTRUCTOR => Ok(ROLE_INSTRUCTOR),
        Some(other) => Err(Error::BadRequest(format!("Role '{}' cannot be self-assigned", other))),
    }
}

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(pool: PgPool, keys: JwtKeys) -> Self {
        Self { pool, keys }
    }

    pub async fn register(&self, payload: RegisterPayload) -> Result<AuthResponse> {
        let role = signup_role(payload.role.as_deref())?;
        let email = payload.email.trim().to_ascii_lowercase();
        let hash = hash_password(&payload.password)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(payload.name.trim())
        .bind(&email)
        .bind(hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict("Email is already registered".to_string())
            } else {
                Error::from(e)
            }
        })?;

        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        self.respond(user)
    }

    pub async fn login(&self, payload: LoginPayload) -> Result<AuthResponse> {
        let email = payload.email.trim().to_ascii_lowercase();
        let invalid = || Error::Unauthorized("Invalid email or password".to_string());

        let user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE email = $1"#)
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&payload.password, &user.password_hash)? {
            tracing::debug!(user_id = %user.id, "login rejected: bad password");
            return Err(invalid());
        }
        if !user.is_active {
            return Err(Error::Forbidden("Account is disabled".to_string()));
        }
        self.respond(user)
    }

    fn respond(&self, user: User) -> Result<AuthResponse> {
        let token = self.keys.issue(user.id, &user.role)?;
        Ok(AuthResponse {
            user_id: user.id,
            name: user.name,
            role: user.role,
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_defaults_to_student() {
        assert_eq!(signup_role(None).unwrap(), ROLE_STUDENT);
        assert_eq!(signup_role(Some(" Instructor ")).unwrap(), ROLE_INSTRUCTOR);
    }

    #[test]
    fn admin_cannot_be_self_assigned() {
        assert!(matches!(signup_role(Some("admin")), Err(Error::BadRequest(_))));
        assert!(matches!(signup_role(Some("root")), Err(Error::BadRequest(_))));
    }
}
