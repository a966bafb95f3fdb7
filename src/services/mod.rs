pub mod assessment_service;
pub mod audit_service;
pub mod auth_service;
pub mod certificate_service;
pub mod chapter_service;
pub mod course_service;
pub mod enrollment_service;
pub mod grading_service;
pub mod judge_service;
pub mod lesson_service;
pub mod mail_service;
pub mod outbox_service;
pub mod progress_rules;
pub mod progress_service;
pub mod question_service;
pub mod rating_service;
