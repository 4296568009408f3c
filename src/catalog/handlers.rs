use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use crate::{
    audit::{client::ClientMeta, repo as audit_repo},
    auth::{extractors::AuthUser, services::JwtKeys},
    catalog::{
        dto::{
            render_all, render_one, ExerciseDetailResponse, ExerciseListResponse, ExerciseView,
            Pagination, SearchQuery, SearchResponse, SEARCH_RESULT_CAP,
        },
        search::{keyword_filter, ExerciseFilter},
        subjects::subject_table,
    },
    error::{AppError, AppResult},
    quota::{
        anonymous::AnonymousQuota,
        dto::Principal,
        policy::{view_snapshot, ANONYMOUS_DAILY_VIEWS},
        repo as quota_repo,
    },
    state::AppState,
};

/// Presigned download links stay valid this long.
const DOWNLOAD_URL_TTL_SECS: u64 = 600;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/exercises", get(list_exercises))
        .route("/exercises/:id", get(get_exercise))
        .route("/search", get(search))
        .route("/metadata", get(metadata))
        .route("/theory", get(theory))
        .route("/formularies", get(formularies))
        .route("/formularies/:key/download", get(download_formulary))
}

#[instrument(skip(state))]
pub async fn list_exercises(
    State(state): State<AppState>,
    Query(filter): Query<ExerciseFilter>,
    Query(page): Query<Pagination>,
) -> AppResult<Json<ExerciseListResponse>> {
    let matched = filter.apply(state.catalog.exercises().await);
    let total = matched.len();

    let page = matched
        .into_iter()
        .skip(page.offset.unwrap_or(0))
        .take(page.limit.unwrap_or(usize::MAX))
        .collect();
    let exercises = render_all(state.renderer.clone(), page).await?;

    Ok(Json(ExerciseListResponse {
        total,
        exercises,
        applied_filters: filter.applied(),
    }))
}

/// Full exercise, counted against the caller's daily view quota.
#[instrument(skip(state, anonymous, meta))]
pub async fn get_exercise(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: Option<AuthUser>,
    anonymous: AnonymousQuota,
    meta: ClientMeta,
) -> AppResult<Response> {
    let exercise = state.catalog.find(&id).await.ok_or_else(|| {
        debug!(%id, "exercise not found");
        AppError::NotFound("Exercise not found".into())
    })?;
    let now = OffsetDateTime::now_utc();

    let (limit, cookie, user_id) = match user {
        Some(AuthUser(user_id)) => {
            let decision = quota_repo::consume_view(&state.db, user_id, &id, now)
                .await?
                .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
            if !decision.outcome.allowed() {
                info!(%user_id, %id, "daily view limit reached");
                return Err(AppError::QuotaExceeded(Box::new(decision.snapshot)));
            }
            (decision.snapshot, None, Some(user_id))
        }
        None => {
            let AnonymousQuota(mut views) = anonymous;
            let outcome = views.record(&id, ANONYMOUS_DAILY_VIEWS, now.date());
            let snapshot = view_snapshot(Principal::Anonymous, false, &views);
            if !outcome.allowed() {
                info!(%id, "anonymous view limit reached");
                return Err(AppError::QuotaExceeded(Box::new(snapshot)));
            }
            let cookie = if outcome.counted() {
                let keys = JwtKeys::from_config(&state.config.jwt);
                Some(AnonymousQuota(views).to_cookie(&keys, now, state.config.cookie_secure)?)
            } else {
                None
            };
            (snapshot, cookie, None)
        }
    };

    if let Err(e) = audit_repo::record_exercise_view(&state.db, user_id, &id, &meta).await {
        warn!(error = %e, %id, "exercise view not recorded");
    }

    let mut res = Json(ExerciseDetailResponse {
        exercise: render_one(state.renderer.clone(), exercise).await?,
        limit,
    })
    .into_response();

    if let Some(cookie) = cookie {
        let value = HeaderValue::from_str(&cookie).map_err(anyhow::Error::from)?;
        res.headers_mut().append(header::SET_COOKIE, value);
    }
    Ok(res)
}

/// Live search: unrendered, capped results.
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(SearchQuery { q }): Query<SearchQuery>,
) -> Json<SearchResponse> {
    if q.trim().is_empty() {
        return Json(SearchResponse::empty());
    }

    let found = keyword_filter(state.catalog.exercises().await, &q);
    let total = found.len();
    let exercises: Vec<ExerciseView> = found
        .into_iter()
        .take(SEARCH_RESULT_CAP)
        .map(ExerciseView::raw)
        .collect();

    Json(SearchResponse {
        shown: Some(exercises.len()),
        exercises,
        total,
        query: Some(q),
    })
}

pub async fn metadata(State(state): State<AppState>) -> Json<Value> {
    let mut meta = state.catalog.metadata().await;
    if let Value::Object(map) = &mut meta {
        map.insert("subjects".into(), json!(subject_table()));
    }
    Json(meta)
}

pub async fn theory(State(state): State<AppState>) -> Json<Value> {
    Json(state.catalog.theory().await)
}

pub async fn formularies(State(state): State<AppState>) -> Json<Value> {
    Json(state.catalog.formularies().await)
}

#[instrument(skip(state))]
pub async fn download_formulary(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Redirect> {
    let file = state.catalog.formulary_file(&key).await.ok_or_else(|| {
        warn!(%key, "unknown formulary");
        AppError::NotFound("Formulary not found".into())
    })?;
    let url = state.storage.presign_get(&file, DOWNLOAD_URL_TTL_SECS).await?;
    Ok(Redirect::temporary(&url))
}
