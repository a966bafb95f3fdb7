pub mod assessments;
pub mod auth;
pub mod certificates;
pub mod courses;
pub mod health;
pub mod learning;
pub mod ratings;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::middleware::{
    auth::{require_auth, require_author},
    cors::cors_layer,
};
use crate::AppState;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Full HTTP surface: public, learner and author route tables merged
/// under shared layers.
pub fn app(state: AppState, cors_origins: &[String]) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/courses", get(courses::list_courses))
        .route("/api/courses/:id", get(courses::get_course))
        .route("/api/courses/:id/chapters", get(courses::list_chapters))
        .route("/api/chapters/:id/lessons", get(courses::list_lessons))
        .route("/api/courses/:id/ratings/stats", get(ratings::rating_stats))
        .route("/api/certificates/verify/:id", get(certificates::verify_certificate));

    let learner = Router::new()
        .route("/api/courses/:id/enroll", post(learning::enroll))
        .route("/api/enrollments", get(learning::list_enrollments))
        .route("/api/progress", get(learning::dashboard))
        .route("/api/progress/courses/:id", get(learning::course_progress))
        .route("/api/lessons/:id/complete", post(learning::complete_lesson))
        .route("/api/chapters/:id/mcqs", get(assessments::list_chapter_mcqs))
        .route("/api/chapters/:id/mcqs/submit", post(assessments::submit_mcq))
        .route("/api/chapters/:id/mcqs/submissions", get(assessments::list_mcq_submissions))
        .route("/api/chapters/:id/coding-questions", get(assessments::list_coding_questions))
        .route(
            "/api/coding-questions/:id/submissions",
            get(assessments::list_submissions).post(assessments::submit_code),
        )
        .route("/api/certificates", get(certificates::list_certificates))
        .route("/api/courses/:id/ratings", post(ratings::rate_course))
        .layer(from_fn_with_state(state.jwt.clone(), require_auth));

    let author = Router::new()
        .route("/api/courses", post(courses::create_course))
        .route("/api/courses/:id", patch(courses::update_course))
        .route("/api/courses/:id/publish", post(courses::publish_course))
        .route("/api/courses/:id/deactivate", post(courses::deactivate_course))
        .route("/api/courses/:id/chapters", post(courses::create_chapter))
        .route("/api/courses/:id/chapters/order", put(courses::reorder_chapters))
        .route("/api/chapters/:id", delete(courses::delete_chapter))
        .route("/api/chapters/:id/lessons", post(courses::create_lesson))
        .route("/api/lessons/:id", delete(courses::delete_lesson))
        .route("/api/chapters/:id/mcqs", post(assessments::create_mcq))
        .route("/api/mcqs/:id", patch(assessments::update_mcq))
        .route("/api/chapters/:id/coding-questions", post(assessments::create_coding_question))
        .layer(from_fn_with_state(state.jwt.clone(), require_author));

    Router::new()
        .merge(public)
        .merge(learner)
        .merge(author)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
