pub mod audit_log;
pub mod certificate;
pub mod chapter;
pub mod coding_question;
pub mod course;
pub mod enrollment;
pub mod lesson;
pub mod mcq;
pub mod outbox_event;
pub mod rating;
pub mod submission;
pub mod user;
pub mod user_progress;
