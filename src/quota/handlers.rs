use axum::{extract::State, routing::get, Json, Router};
use time::OffsetDateTime;
use tracing::{instrument, warn};

use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    quota::{
        anonymous::AnonymousQuota,
        dto::{LimitsResponse, Principal},
        policy::{exam_snapshot, view_snapshot, DailyCounter},
        repo,
    },
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/limits", get(get_limits))
}

#[instrument(skip(state, anonymous))]
pub async fn get_limits(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    anonymous: AnonymousQuota,
) -> AppResult<Json<LimitsResponse>> {
    let now = OffsetDateTime::now_utc();
    match user {
        Some(AuthUser(user_id)) => {
            let limits = repo::limits(&state.db, user_id, now).await?.ok_or_else(|| {
                warn!(%user_id, "limits for missing user");
                AppError::Unauthorized("User not found".into())
            })?;
            Ok(Json(limits))
        }
        None => {
            let AnonymousQuota(mut views) = anonymous;
            views.roll_over(now.date());
            Ok(Json(LimitsResponse {
                exercises: view_snapshot(Principal::Anonymous, false, &views),
                exams: exam_snapshot(Principal::Anonymous, false, &DailyCounter::default()),
            }))
        }
    }
}
