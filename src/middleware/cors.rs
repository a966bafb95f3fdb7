use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};

/// Any origin when `allowed` is empty, otherwise only the listed ones.
/// Unparsable origins are skipped.
pub fn cors_layer(allowed: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed.is_empty() {
        return base.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = allowed
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(origins)
}
