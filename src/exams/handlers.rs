use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    routing::post,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::extractors::AuthUser,
    catalog::dto::render_all,
    error::{AppError, AppResult},
    exams::{
        dto::{ExamRequest, ExamResponse, ExportRequest},
        services::{export_file_name, render_latex, select, validate_count},
    },
    quota::repo as quota_repo,
    state::AppState,
};

const DEFAULT_EXPORT_TITLE: &str = "Simulacro";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/exams", post(generate_exam))
        .route("/exams/export", post(export_exam))
}

/// Random practice exam. The daily allowance is checked and taken in one
/// step, only once a large enough pool has been drawn.
#[instrument(skip(state, payload))]
pub async fn generate_exam(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Json(payload): Json<ExamRequest>,
) -> AppResult<Json<ExamResponse>> {
    let Some(AuthUser(user_id)) = user else {
        return Err(AppError::Forbidden("Register to take practice exams".into()));
    };
    let count = validate_count(&payload.num_questions).map_err(|e| {
        warn!(%user_id, requested = %payload.num_questions, "invalid exam size");
        AppError::BadRequest(e.to_string())
    })?;

    let pool = payload.criteria().pool(state.catalog.exercises().await);
    let picked = select(pool, count, &mut rand::thread_rng()).map_err(|e| {
        warn!(%user_id, error = %e, "exam pool too small");
        AppError::BadRequest(e.to_string())
    })?;

    let decision = quota_repo::consume_exam(&state.db, user_id, OffsetDateTime::now_utc())
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    if !decision.granted {
        info!(%user_id, "daily exam limit reached");
        return Err(AppError::QuotaExceeded(Box::new(decision.snapshot)));
    }

    let exercises = render_all(state.renderer.clone(), picked).await?;
    info!(%user_id, total = exercises.len(), "exam generated");

    Ok(Json(ExamResponse {
        total: exercises.len(),
        exercises,
        configuration: payload,
        limit: decision.snapshot,
    }))
}

/// LaTeX document of an already generated exam.
#[instrument(skip(state, payload))]
pub async fn export_exam(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ExportRequest>,
) -> AppResult<(HeaderMap, String)> {
    if payload.exercise_ids.is_empty() {
        return Err(AppError::BadRequest("exercise_ids is required".into()));
    }

    let all = state.catalog.exercises().await;
    let mut chosen = Vec::with_capacity(payload.exercise_ids.len());
    for id in &payload.exercise_ids {
        match all.iter().find(|e| &e.id == id) {
            Some(e) => chosen.push(e.clone()),
            None => {
                warn!(%user_id, %id, "export references unknown exercise");
                return Err(AppError::NotFound(format!("Exercise {} not found", id)));
            }
        }
    }

    let title = match payload.title.trim() {
        "" => DEFAULT_EXPORT_TITLE,
        t => t,
    };
    let doc = render_latex(title, payload.instructions.as_deref().unwrap_or(""), &chosen);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/x-tex; charset=utf-8"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!(
            "attachment; filename=\"{}\"",
            export_file_name(title)
        ))
        .map_err(anyhow::Error::from)?,
    );

    info!(%user_id, count = chosen.len(), "exam exported");
    Ok((headers, doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::FromRef,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::auth::services::JwtKeys;

    #[tokio::test]
    async fn anonymous_cannot_generate_exams() {
        let app = routes().with_state(AppState::fake());
        let res = app
            .oneshot(
                Request::post("/exams")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"num_questions": 5}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unsupported_size_is_rejected_before_touching_the_store() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state)
            .sign_access(uuid::Uuid::new_v4())
            .unwrap();
        let app = routes().with_state(state);
        let res = app
            .oneshot(
                Request::post("/exams")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::from(r#"{"num_questions": 6}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_sizes_are_bad_requests() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state)
            .sign_access(uuid::Uuid::new_v4())
            .unwrap();
        for body in [
            r#"{"num_questions": -5}"#,
            r#"{"num_questions": 7.5}"#,
            r#"{"num_questions": "ten"}"#,
            r#"{"num_questions": null}"#,
        ] {
            let res = routes()
                .with_state(state.clone())
                .oneshot(
                    Request::post("/exams")
                        .header(header::CONTENT_TYPE, "application/json")
                        .header(header::AUTHORIZATION, format!("Bearer {}", token))
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{}", body);
        }
    }

    // The fake pool has no database behind it: reaching consume_exam would be a 500.
    #[tokio::test]
    async fn small_pool_fails_before_the_allowance_is_taken() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state)
            .sign_access(uuid::Uuid::new_v4())
            .unwrap();
        let res = routes()
            .with_state(state)
            .oneshot(
                Request::post("/exams")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::from(r#"{"num_questions": 5}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn export_of_unknown_exercise_is_not_found() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state)
            .sign_access(uuid::Uuid::new_v4())
            .unwrap();
        let app = routes().with_state(state);
        let res = app
            .oneshot(
                Request::post("/exams/export")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::from(r#"{"title": "T", "exercise_ids": ["missing"]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
