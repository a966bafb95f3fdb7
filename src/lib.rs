pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::services::{
    assessment_service::AssessmentService, audit_service::AuditService, auth_service::AuthService,
    certificate_service::CertificateService, chapter_service::ChapterService,
    course_service::CourseService, enrollment_service::EnrollmentService,
    judge_service::HttpJudge, lesson_service::LessonService, mail_service::MailService,
    outbox_service::OutboxService, progress_service::ProgressService,
    question_service::QuestionService, rating_service::RatingService,
};
use crate::utils::token::JwtKeys;
use reqwest::Client;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jwt: JwtKeys,
    pub auth_service: AuthService,
    pub course_service: CourseService,
    pub chapter_service: ChapterService,
    pub lesson_service: LessonService,
    pub question_service: QuestionService,
    pub enrollment_service: EnrollmentService,
    pub progress_service: ProgressService,
    pub assessment_service: AssessmentService,
    pub certificate_service: CertificateService,
    pub rating_service: RatingService,
    pub outbox_service: OutboxService,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let jwt = JwtKeys::new(&config.jwt_secret, config.jwt_ttl_hours);
        let judge = HttpJudge::new(
            http_client.clone(),
            config.judge_api_url.clone(),
            config.judge_api_key.clone(),
            config.judge_poll_attempts,
            Duration::from_millis(config.judge_poll_interval_ms),
        );
        let certificate_service = CertificateService::new(pool.clone(), config.certificate_secret.clone());
        let mail_service = MailService::new(
            http_client,
            config.mail_webhook_url.clone(),
            config.mail_api_key.clone(),
        );
        let outbox_service = OutboxService::new(pool.clone(), AuditService::new(pool.clone()), mail_service);

        Ok(Self {
            auth_service: AuthService::new(pool.clone(), jwt.clone()),
            course_service: CourseService::new(pool.clone()),
            chapter_service: ChapterService::new(pool.clone()),
            lesson_service: LessonService::new(pool.clone()),
            question_service: QuestionService::new(pool.clone()),
            enrollment_service: EnrollmentService::new(pool.clone()),
            progress_service: ProgressService::new(
                pool.clone(),
                certificate_service.clone(),
                config.mcq_pass_threshold,
            ),
            assessment_service: AssessmentService::new(pool.clone(), Arc::new(judge), config.mcq_pass_threshold),
            certificate_service,
            rating_service: RatingService::new(pool.clone()),
            outbox_service,
            jwt,
            pool,
        })
    }
}
