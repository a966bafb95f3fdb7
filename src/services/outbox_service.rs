use crate::error::{Error, Result};
use crate::models::outbox_event::OutboxEvent;
use crate::services::audit_service::{AuditEntry, AuditService};
use crate::services::mail_service::{MailMessage, MailService};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Side effects produced by state changes. They are written to
/// `outbox_events` in the same transaction as the change itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    EnrollmentCreated {
        enrollment_id: Uuid,
        user_id: Uuid,
        course_id: Uuid,
    },
    ChapterUnlocked {
        user_id: Uuid,
        course_id: Uuid,
        chapter_id: Uuid,
    },
    ChapterPassed {
        user_id: Uuid,
        course_id: Uuid,
        chapter_id: Uuid,
        score: f64,
    },
    CertificateIssued {
        certificate_id: Uuid,
        user_id: Uuid,
        course_id: Uuid,
        verification_code: String,
    },
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::EnrollmentCreated { .. } => "enrollment_created",
            DomainEvent::ChapterUnlocked { .. } => "chapter_unlocked",
            DomainEvent::ChapterPassed { .. } => "chapter_passed",
            DomainEvent::CertificateIssued { .. } => "certificate_issued",
        }
    }

    pub fn audit_entry(&self) -> AuditEntry {
        match self {
            DomainEvent::EnrollmentCreated {
                enrollment_id,
                user_id,
                course_id,
            } => AuditEntry {
                user_id: Some(*user_id),
                action: "enroll".into(),
                entity_type: "enrollment".into(),
                entity_id: *enrollment_id,
                changes: Some(json!({ "course_id": course_id })),
            },
            DomainEvent::ChapterUnlocked {
                user_id,
                course_id,
                chapter_id,
            } => AuditEntry {
                user_id: Some(*user_id),
                action: "unlock_chapter".into(),
                entity_type: "chapter".into(),
                entity_id: *chapter_id,
                changes: Some(json!({ "course_id": course_id })),
            },
            DomainEvent::ChapterPassed {
                user_id,
                course_id,
                chapter_id,
                score,
            } => AuditEntry {
                user_id: Some(*user_id),
                action: "pass_chapter".into(),
                entity_type: "chapter".into(),
                entity_id: *chapter_id,
                changes: Some(json!({ "course_id": course_id, "score": score })),
            },
            DomainEvent::CertificateIssued {
                certificate_id,
                user_id,
                course_id,
                ..
            } => AuditEntry {
                user_id: Some(*user_id),
                action: "issue_certificate".into(),
                entity_type: "certificate".into(),
                entity_id: *certificate_id,
                changes: Some(json!({ "course_id": course_id })),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagedEvent {
    pub id: Uuid,
    pub event: DomainEvent,
}

/// A state change together with the events it staged.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub events: Vec<StagedEvent>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, events: Vec<StagedEvent>) -> Self {
        Self { value, events }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Deliver now; failures stay in the outbox for the worker.
    Immediate,
    /// Leave delivery to the background worker.
    Deferred,
}

pub async fn stage_events(
    tx: &mut Transaction<'_, Postgres>,
    events: Vec<DomainEvent>,
) -> Result<Vec<StagedEvent>> {
    let mut staged = Vec::with_capacity(events.len());
    for event in events {
        let id: Uuid = sqlx::query_scalar(
            r#"INSERT INTO outbox_events (event_type, payload) VALUES ($1, $2) RETURNING id"#,
        )
        .bind(event.event_type())
        .bind(serde_json::to_value(&event)?)
        .fetch_one(&mut **tx)
        .await?;
        staged.push(StagedEvent { id, event });
    }
    Ok(staged)
}

/// Seconds until the next delivery attempt after `attempts` failures.
pub fn retry_delay_secs(attempts: i32) -> i64 {
    let exp = (attempts - 1).clamp(0, 16) as u32;
    (30_i64 * 2_i64.pow(exp)).min(3600)
}

#[derive(Clone)]
pub struct OutboxService {
    pool: PgPool,
    audit: AuditService,
    mail: MailService,
}

impl OutboxService {
    pub fn new(pool: PgPool, audit: AuditService, mail: MailService) -> Self {
        Self { pool, audit, mail }
    }

    pub async fn dispatch(&self, events: &[StagedEvent], mode: Dispatch) {
        if mode == Dispatch::Deferred || events.is_empty() {
            return;
        }
        for staged in events {
            if let Err(err) = self.deliver_once(staged.id).await {
                tracing::warn!(
                    event_id = %staged.id,
                    event_type = staged.event.event_type(),
                    error = %err,
                    "immediate delivery failed, left for the outbox worker"
                );
            }
        }
    }

    /// Claims the event, runs its handlers and records the result. Returns
    /// `false` when another worker holds it or it is no longer pending.
    pub async fn deliver_once(&self, id: Uuid) -> Result<bool> {
        let claimed = sqlx::query_as::<_, OutboxEvent>(
            r#"
            UPDATE outbox_events
            SET attempts = attempts + 1,
                next_retry_at = NOW() + INTERVAL '5 minutes',
                updated_at = NOW()
            WHERE id = $1
              AND status = 'pending'
              AND (next_retry_at IS NULL OR next_retry_at <= NOW())
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = claimed else { return Ok(false) };

        match self.handle(&row).await {
            Ok(()) => {
                sqlx::query(
                    r#"UPDATE outbox_events SET status = 'delivered', next_retry_at = NULL, last_error = NULL, updated_at = NOW() WHERE id = $1"#,
                )
                .bind(row.id)
                .execute(&self.pool)
                .await?;
                tracing::debug!(event_id = %row.id, event_type = %row.event_type, "outbox event delivered");
                Ok(true)
            }
            Err(err) => {
                let exhausted = row.attempts >= row.max_attempts;
                sqlx::query(
                    r#"
                    UPDATE outbox_events
                    SET status = CASE WHEN $2 THEN 'failed' ELSE 'pending' END,
                        next_retry_at = CASE WHEN $2 THEN NULL ELSE NOW() + make_interval(secs => $3) END,
                        last_error = $4,
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(row.id)
                .bind(exhausted)
                .bind(retry_delay_secs(row.attempts) as f64)
                .bind(err.to_string())
                .execute(&self.pool)
                .await?;
                Err(err)
            }
        }
    }

    /// Delivers the oldest due event. Returns `false` when nothing was due.
    pub async fn run_once(&self) -> Result<bool> {
        let next: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM outbox_events
            WHERE status = 'pending' AND (next_retry_at IS NULL OR next_retry_at <= NOW())
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(id) = next else { return Ok(false) };
        if let Err(err) = self.deliver_once(id).await {
            tracing::warn!(event_id = %id, error = %err, "outbox delivery failed");
        }
        Ok(true)
    }

    async fn handle(&self, row: &OutboxEvent) -> Result<()> {
        let event: DomainEvent = serde_json::from_value(row.payload.clone())?;
        self.audit.log(row.id, &event.audit_entry()).await?;

        if let DomainEvent::CertificateIssued {
            user_id,
            course_id,
            verification_code,
            ..
        } = &event
        {
            let (email, name, title): (String, String, String) = sqlx::query_as(
                r#"
                SELECT u.email, u.name, c.title
                FROM users u, courses c
                WHERE u.id = $1 AND c.id = $2
                "#,
            )
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Certificate recipient not found".to_string()))?;

            self.mail
                .send(&MailMessage {
                    to: email,
                    subject: format!("Certificate of completion: {}", title),
                    text: format!(
                        "Hi {},\n\nCongratulations on completing \"{}\". Your certificate verification code is {}.",
                        name, title, verification_code
                    ),
                })
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(retry_delay_secs(1), 30);
        assert_eq!(retry_delay_secs(2), 60);
        assert_eq!(retry_delay_secs(4), 240);
        assert_eq!(retry_delay_secs(12), 3600);
        assert_eq!(retry_delay_secs(0), 30);
    }

    #[test]
    fn events_round_trip_through_payload() {
        let event = DomainEvent::ChapterPassed {
            user_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            chapter_id: Uuid::new_v4(),
            score: 80.0,
        };
        let payload = serde_json::to_value(&event).unwrap();
        assert_eq!(payload["type"], "chapter_passed");
        assert_eq!(serde_json::from_value::<DomainEvent>(payload).unwrap(), event);
    }

    #[test]
    fn audit_entries_point_at_the_changed_entity() {
        let chapter_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let entry = DomainEvent::ChapterUnlocked {
            user_id,
            course_id: Uuid::new_v4(),
            chapter_id,
        }
        .audit_entry();
        assert_eq!(entry.entity_id, chapter_id);
        assert_eq!(entry.user_id, Some(user_id));
        assert_eq!(entry.action, "unlock_chapter");
    }
}
