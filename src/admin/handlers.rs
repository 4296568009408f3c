use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    admin::{
        dto::{
            BulkAction, BulkRequest, BulkResponse, GrantPremiumRequest, RevokePremiumRequest,
            StatsResponse, UsersResponse,
        },
        repo,
        stats::CatalogStats,
    },
    audit::repo as audit_repo,
    auth::{dto::MeResponse, extractors::AdminUser, repo_types::User},
    error::{AppError, AppResult},
    quota::repo as quota_repo,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/bulk", post(bulk_update))
        .route("/admin/users/:id", delete(delete_user))
        .route("/admin/users/:id/toggle-active", post(toggle_active))
        .route("/admin/users/:id/toggle-admin", post(toggle_admin))
        .route(
            "/admin/users/:id/premium",
            post(grant_premium).delete(revoke_premium),
        )
        .route("/admin/users/:id/reset-limits", post(reset_limits))
        .route("/admin/stats", get(stats))
}

fn not_found() -> AppError {
    AppError::NotFound("User not found".into())
}

fn refuse_self(admin: &User, target: Uuid, what: &str) -> AppResult<()> {
    if admin.id == target {
        warn!(admin_id = %admin.id, what, "admin action on own account refused");
        return Err(AppError::BadRequest(format!(
            "You cannot {} your own account",
            what
        )));
    }
    Ok(())
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<UsersResponse>> {
    let now = OffsetDateTime::now_utc();
    let users = repo::list_users(&state.db).await?;
    let counts = repo::user_counts(&state.db, now).await?;
    Ok(Json(UsersResponse {
        users: users.into_iter().map(|u| MeResponse::new(u, now)).collect(),
        counts,
    }))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn toggle_active(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MeResponse>> {
    refuse_self(&admin, id, "deactivate")?;
    let user = repo::toggle_active(&state.db, id).await?.ok_or_else(not_found)?;
    info!(user_id = %id, active = user.is_active, "active flag toggled");
    Ok(Json(MeResponse::new(user, OffsetDateTime::now_utc())))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn toggle_admin(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MeResponse>> {
    refuse_self(&admin, id, "change the admin role of")?;
    let user = repo::toggle_admin(&state.db, id).await?.ok_or_else(not_found)?;
    info!(user_id = %id, admin = user.is_admin, "admin flag toggled");
    Ok(Json(MeResponse::new(user, OffsetDateTime::now_utc())))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.id))]
pub async fn grant_premium(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<GrantPremiumRequest>,
) -> AppResult<Json<MeResponse>> {
    let kind = payload.validate().map_err(|msg| {
        warn!(user_id = %id, %msg, "invalid premium grant");
        AppError::BadRequest(msg)
    })?;

    let user = User::grant_premium(&state.db, id, kind, payload.duration_days, &payload.reason)
        .await?
        .ok_or_else(not_found)?;
    info!(user_id = %id, kind = kind.as_str(), days = payload.duration_days, "premium granted");
    Ok(Json(MeResponse::new(user, OffsetDateTime::now_utc())))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.id))]
pub async fn revoke_premium(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<RevokePremiumRequest>>,
) -> AppResult<Json<MeResponse>> {
    let reason = payload
        .and_then(|Json(p)| p.reason)
        .unwrap_or_else(|| "Revoked by administrator".into());
    let user = User::revoke_premium(&state.db, id, &reason)
        .await?
        .ok_or_else(not_found)?;
    info!(user_id = %id, "premium revoked");
    Ok(Json(MeResponse::new(user, OffsetDateTime::now_utc())))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    refuse_self(&admin, id, "delete")?;
    let target = User::find_by_id(&state.db, id).await?.ok_or_else(not_found)?;
    if target.is_admin {
        warn!(user_id = %id, "refused to delete another admin");
        return Err(AppError::Forbidden("Administrators cannot be deleted".into()));
    }
    if !User::delete(&state.db, id).await? {
        return Err(not_found());
    }
    info!(user_id = %id, email = %target.email, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.id))]
pub async fn bulk_update(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<BulkRequest>,
) -> AppResult<Json<BulkResponse>> {
    if payload.user_ids.is_empty() {
        return Err(AppError::BadRequest("user_ids is required".into()));
    }
    let ids = &payload.user_ids;
    let affected = match payload.action {
        BulkAction::Activate => repo::bulk_set_active(&state.db, ids, true, admin.id).await?,
        BulkAction::Deactivate => repo::bulk_set_active(&state.db, ids, false, admin.id).await?,
        BulkAction::Delete => repo::bulk_delete(&state.db, ids, admin.id).await?,
    };
    info!(action = ?payload.action, requested = ids.len(), affected, "bulk user update");
    Ok(Json(BulkResponse {
        action: payload.action,
        affected,
    }))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn reset_limits(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MeResponse>> {
    if !quota_repo::reset_limits(&state.db, id).await? {
        return Err(not_found());
    }
    let user = User::find_by_id(&state.db, id).await?.ok_or_else(not_found)?;
    info!(user_id = %id, "daily limits reset");
    Ok(Json(MeResponse::new(user, OffsetDateTime::now_utc())))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn stats(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<StatsResponse>> {
    let now = OffsetDateTime::now_utc();
    let catalog = CatalogStats::compute(&state.catalog.exercises().await);
    let users = repo::user_counts(&state.db, now).await?;
    let visits = audit_repo::visit_counts(&state.db, now).await?;
    Ok(Json(StatsResponse {
        catalog,
        users,
        visits,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    #[tokio::test]
    async fn admin_routes_require_a_token() {
        for (method, uri) in [
            ("GET", "/admin/users"),
            ("GET", "/admin/stats"),
            ("POST", "/admin/users/bulk"),
        ] {
            let res = routes()
                .with_state(AppState::fake())
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        }
    }

    #[test]
    fn refusing_own_account() {
        let id = Uuid::new_v4();
        let admin = test_user(id);
        assert!(refuse_self(&admin, id, "delete").is_err());
        assert!(refuse_self(&admin, Uuid::new_v4(), "delete").is_ok());
    }

    fn test_user(id: Uuid) -> User {
        User {
            id,
            username: "admin".into(),
            email: "admin@example.com".into(),
            full_name: "Admin".into(),
            google_id: None,
            google_picture: None,
            auth_provider: "google".into(),
            is_active: true,
            is_admin: true,
            last_school: None,
            academic_level: None,
            academic_level_other: None,
            interests: None,
            whatsapp: None,
            city: None,
            career_interest: None,
            accepts_announcements: false,
            profile_completed: false,
            is_premium: false,
            premium_started_at: None,
            premium_ends_at: None,
            premium_kind: None,
            premium_reason: None,
            views_today: 0,
            views_day: None,
            viewed_ids: Vec::new(),
            exams_today: 0,
            exams_day: None,
            created_at: OffsetDateTime::now_utc(),
            last_access_at: None,
        }
    }
}
