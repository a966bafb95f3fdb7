use crate::error::{Error, Result};
use crate::models::certificate::Certificate;
use chrono::{DateTime, SubsecRound, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use sqlx::{PgPool, Postgres, Transaction};
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const CODE_LEN: usize = 16;

/// Upper-case hex prefix of HMAC-SHA256 over the certificate identity.
pub fn verification_code(
    secret: &str,
    user_id: Uuid,
    course_id: Uuid,
    issued_at: DateTime<Utc>,
) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Internal(format!("Invalid certificate key: {}", e)))?;
    mac.update(user_id.as_bytes());
    mac.update(course_id.as_bytes());
    mac.update(issued_at.timestamp_micros().to_be_bytes().as_slice());
    let digest = hex::encode_upper(mac.finalize().into_bytes());
    Ok(digest[..CODE_LEN].to_string())
}

fn codes_match(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificateView {
    pub id: Uuid,
    pub course_id: Uuid,
    pub course_title: String,
    pub holder_name: String,
    pub verification_code: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CertificateService {
    pool: PgPool,
    secret: String,
}

impl CertificateService {
    pub fn new(pool: PgPool, secret: String) -> Self {
        Self { pool, secret }
    }

    /// Inserts the certificate unless one exists. Returns `None` when the
    /// learner already had one.
    pub async fn issue_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Certificate>> {
        // Postgres stores microseconds; truncate so the code can be recomputed from the row.
        let issued_at = Utc::now().trunc_subsecs(6);
        let code = verification_code(&self.secret, user_id, course_id, issued_at)?;
        let row = sqlx::query_as::<_, Certificate>(
            r#"
            INSERT INTO certificates (user_id, course_id, verification_code, issued_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, course_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(&code)
        .bind(issued_at)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row)
    }

    pub async fn find_for_course(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Certificate>> {
        let row = sqlx::query_as::<_, Certificate>(
            r#"SELECT * FROM certificates WHERE user_id = $1 AND course_id = $2"#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<CertificateView>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid, String, String, String, DateTime<Utc>)>(
            r#"
            SELECT cert.id, cert.course_id, c.title, u.name, cert.verification_code, cert.issued_at
            FROM certificates cert
            JOIN courses c ON c.id = cert.course_id
            JOIN users u ON u.id = cert.user_id
            WHERE cert.user_id = $1
            ORDER BY cert.issued_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(into_view).collect())
    }

    /// Looks a certificate up by its public code and checks that the code
    /// still matches the stored identity.
    pub async fn verify(&self, code: &str) -> Result<CertificateView> {
        let code = code.trim().to_ascii_uppercase();
        let row = sqlx::query_as::<_, (Uuid, Uuid, String, String, String, DateTime<Utc>, Uuid)>(
            r#"
            SELECT cert.id, cert.course_id, c.title, u.name, cert.verification_code, cert.issued_at, cert.user_id
            FROM certificates cert
            JOIN courses c ON c.id = cert.course_id
            JOIN users u ON u.id = cert.user_id
            WHERE cert.verification_code = $1
            "#,
        )
        .bind(&code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Certificate not found".to_string()))?;

        let (id, course_id, title, name, stored, issued_at, user_id) = row;
        let expected = verification_code(&self.secret, user_id, course_id, issued_at)?;
        if !codes_match(&expected, &stored) {
            tracing::warn!(certificate_id = %id, "certificate code does not match its signature");
            return Err(Error::NotFound("Certificate not found".to_string()));
        }
        Ok(into_view((id, course_id, title, name, stored, issued_at)))
    }
}

fn into_view(row: (Uuid, Uuid, String, String, String, DateTime<Utc>)) -> CertificateView {
    let (id, course_id, course_title, holder_name, verification_code, issued_at) = row;
    CertificateView {
        id,
        course_id,
        course_title,
        holder_name,
        verification_code,
        issued_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_stable_and_short() {
        let (u, c, t) = (Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        let a = verification_code("secret", u, c, t).unwrap();
        assert_eq!(a, verification_code("secret", u, c, t).unwrap());
        assert_eq!(a.len(), CODE_LEN);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_lowercase()));
    }

    #[test]
    fn code_depends_on_secret_and_identity() {
        let (u, c, t) = (Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        let base = verification_code("secret", u, c, t).unwrap();
        assert_ne!(base, verification_code("other", u, c, t).unwrap());
        assert_ne!(base, verification_code("secret", Uuid::new_v4(), c, t).unwrap());
        assert_ne!(
            base,
            verification_code("secret", u, c, t + chrono::Duration::seconds(1)).unwrap()
        );
    }

    #[test]
    fn comparison_requires_equal_length() {
        assert!(codes_match("ABCD", "ABCD"));
        assert!(!codes_match("ABCD", "ABC"));
        assert!(!codes_match("ABCD", "ABCE"));
    }
}
