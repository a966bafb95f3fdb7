use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const ROLE_STUDENT: &str = "student";
pub const ROLE_INSTRUCTOR: &str = "instructor";
pub const ROLE_ADMIN: &str = "admin";

/// Roles allowed to author course content.
pub const AUTHOR_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_INSTRUCTOR];
