use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::models::user::AUTHOR_ROLES;
use crate::utils::token::{Claims, JwtKeys};

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

fn authenticate(keys: &JwtKeys, req: &Request) -> Result<Claims, Response> {
    let Some(header) = req.headers().get(AUTHORIZATION) else {
        return Err(reject(StatusCode::UNAUTHORIZED, "missing_authorization"));
    };
    let Ok(value) = header.to_str() else {
        return Err(reject(StatusCode::UNAUTHORIZED, "bad_authorization"));
    };
    let Some(token) = value.strip_prefix("Bearer ") else {
        return Err(reject(StatusCode::UNAUTHORIZED, "unsupported_scheme"));
    };
    keys.verify(token.trim())
        .map_err(|_| reject(StatusCode::UNAUTHORIZED, "invalid_token"))
}

/// Any signed-in user. Inserts [`Claims`] into the request extensions.
pub async fn require_auth(State(keys): State<JwtKeys>, mut req: Request, next: Next) -> Response {
    match authenticate(&keys, &req) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(resp) => resp,
    }
}

/// Admins and instructors only.
pub async fn require_author(State(keys): State<JwtKeys>, mut req: Request, next: Next) -> Response {
    match authenticate(&keys, &req) {
        Ok(claims) if claims.has_role(AUTHOR_ROLES) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Ok(claims) => {
            tracing::debug!(user_id = %claims.sub, role = %claims.role, "author route denied");
            reject(StatusCode::FORBIDDEN, "forbidden")
        }
        Err(resp) => resp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Extension, Router};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app(keys: JwtKeys) -> Router {
        let learner = Router::new()
            .route("/me", get(|Extension(c): Extension<Claims>| async move { c.sub.to_string() }))
            .layer(axum::middleware::from_fn_with_state(keys.clone(), require_auth));
        let author = Router::new()
            .route("/author", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(keys, require_author));
        learner.merge(author)
    }

    async fn call(app: Router, uri: &str, token: Option<&str>) -> StatusCode {
        let mut req = Request::builder().uri(uri);
        if let Some(t) = token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", t));
        }
        app.oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn missing_or_bad_token_is_401() {
        let keys = JwtKeys::new("k", 1);
        assert_eq!(call(app(keys.clone()), "/me", None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(call(app(keys), "/me", Some("garbage")).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_token_reaches_handler() {
        let keys = JwtKeys::new("k", 1);
        let token = keys.issue(Uuid::new_v4(), "student").unwrap();
        assert_eq!(call(app(keys), "/me", Some(&token)).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn students_cannot_author() {
        let keys = JwtKeys::new("k", 1);
        let student = keys.issue(Uuid::new_v4(), "student").unwrap();
        let instructor = keys.issue(Uuid::new_v4(), "instructor").unwrap();
        assert_eq!(call(app(keys.clone()), "/author", Some(&student)).await, StatusCode::FORBIDDEN);
        assert_eq!(call(app(keys), "/author", Some(&instructor)).await, StatusCode::OK);
    }
}
