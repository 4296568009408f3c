use axum::{
    extract::{FromRef, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post, put},
    Json, Router,
};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::json;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::{
    audit::{client::ClientMeta, repo as audit_repo},
    auth::{
        dto::{AuthResponse, CallbackQuery, MeResponse, ProfileUpdateRequest, PublicUser, RefreshRequest},
        extractors::AuthUser,
        repo_types::User,
        services::{find_or_create_google_user, is_valid_email, JwtKeys},
    },
    cookies::{build_cookie, expire_cookie, read_cookie},
    error::{AppError, AppResult},
    state::AppState,
};

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_STATE_TTL_SECS: i64 = 600;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/google/login", get(google_login))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).delete(delete_me))
        .route("/me/profile", put(update_profile))
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn issue_tokens(keys: &JwtKeys, user: &User) -> AppResult<AuthResponse> {
    let access_token = keys.sign_access(user.id).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        AppError::Internal(e)
    })?;
    let refresh_token = keys.sign_refresh(user.id).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        AppError::Internal(e)
    })?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
        profile_completed: user.profile_completed,
    })
}

/// Redirects to Google's consent screen with a fresh anti-forgery state.
#[instrument(skip(state))]
pub async fn google_login(State(state): State<AppState>) -> AppResult<Response> {
    let nonce = random_state();
    let url = state.identity.authorize_url(&nonce)?;
    let cookie = build_cookie(
        OAUTH_STATE_COOKIE,
        &nonce,
        OAUTH_STATE_TTL_SECS,
        state.config.cookie_secure,
    );
    Ok(([(header::SET_COOKIE, cookie)], Redirect::temporary(&url)).into_response())
}

#[instrument(skip(state, query, headers, meta))]
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
    meta: ClientMeta,
) -> AppResult<Response> {
    if let Some(reason) = query.error {
        warn!(%reason, "google login aborted by provider");
        return Err(AppError::BadRequest(format!("Google login failed: {}", reason)));
    }

    let expected = read_cookie(&headers, OAUTH_STATE_COOKIE);
    match (expected.as_deref(), query.state.as_deref()) {
        (Some(a), Some(b)) if !a.is_empty() && a == b => {}
        _ => {
            warn!("oauth state mismatch");
            return Err(AppError::BadRequest("Invalid OAuth state".into()));
        }
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".into()))?;

    let profile = state.identity.exchange_code(&code).await.map_err(|e| {
        error!(error = %e, "google code exchange failed");
        AppError::Upstream(e.to_string())
    })?;
    if !is_valid_email(&profile.email) {
        warn!(email = %profile.email, "google profile without usable email");
        return Err(AppError::Upstream("Google did not return a valid email".into()));
    }

    let user = find_or_create_google_user(&state, &profile).await?;
    if !user.is_active {
        warn!(user_id = %user.id, "inactive user tried to log in");
        return Err(AppError::Forbidden("Account is disabled".into()));
    }

    User::touch_last_access(&state.db, user.id).await?;
    if let Err(e) = audit_repo::record_session(&state.db, user.id, &meta).await {
        warn!(error = %e, user_id = %user.id, "session not recorded");
    }

    let body = issue_tokens(&JwtKeys::from_ref(&state), &user)?;
    info!(user_id = %user.id, "google login");
    let expired = expire_cookie(OAUTH_STATE_COOKIE, state.config.cookie_secure);
    Ok(([(header::SET_COOKIE, expired)], Json(body)).into_response())
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|_| {
        warn!("invalid refresh token");
        AppError::Unauthorized("Invalid refresh token".into())
    })?;

    let user = match User::find_by_id(&state.db, claims.sub).await? {
        Some(u) if u.is_active => u,
        _ => {
            warn!(user_id = %claims.sub, "refresh for missing or inactive user");
            return Err(AppError::Unauthorized("Invalid refresh token".into()));
        }
    };

    info!(user_id = %user.id, "tokens refreshed");
    Ok(Json(issue_tokens(&keys, &user)?))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    let closed = audit_repo::close_sessions(&state.db, user_id).await?;
    info!(%user_id, closed, "logout");
    Ok(Json(json!({ "closed_sessions": closed })))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<MeResponse>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(MeResponse::new(user, OffsetDateTime::now_utc())))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ProfileUpdateRequest>,
) -> AppResult<Json<MeResponse>> {
    let update = payload.normalize().map_err(|msg| {
        warn!(%user_id, msg, "invalid profile update");
        AppError::BadRequest(msg.into())
    })?;
    if User::find_by_id(&state.db, user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }
    let user = User::update_profile(&state.db, user_id, &update).await?;
    info!(%user_id, "profile updated");
    Ok(Json(MeResponse::new(user, OffsetDateTime::now_utc())))
}

#[instrument(skip(state))]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<StatusCode> {
    if !User::delete(&state.db, user_id).await? {
        return Err(AppError::NotFound("User not found".into()));
    }
    info!(%user_id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    fn app() -> Router {
        auth_routes().merge(me_routes()).with_state(AppState::fake())
    }

    #[test]
    fn state_nonce_is_random_alphanumeric() {
        let a = random_state();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, random_state());
    }

    #[tokio::test]
    async fn login_redirects_and_sets_state_cookie() {
        let res = app()
            .oneshot(Request::get("/auth/google/login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(res.status().is_redirection());
        let location = res.headers()[header::LOCATION].to_str().unwrap();
        let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("oauth_state="));
        let nonce = cookie
            .trim_start_matches("oauth_state=")
            .split(';')
            .next()
            .unwrap();
        assert!(location.contains(nonce));
    }

    #[tokio::test]
    async fn callback_rejects_state_mismatch() {
        let res = app()
            .oneshot(
                Request::get("/auth/google/callback?code=abc&state=forged")
                    .header(header::COOKIE, "oauth_state=genuine")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn callback_surfaces_provider_failure_as_bad_gateway() {
        let res = app()
            .oneshot(
                Request::get("/auth/google/callback?code=fail&state=s1")
                    .header(header::COOKIE, "oauth_state=s1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let state = AppState::fake();
        let access = JwtKeys::from_ref(&state)
            .sign_access(uuid::Uuid::new_v4())
            .unwrap();
        let res = app()
            .oneshot(
                Request::post("/auth/refresh")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(format!(r#"{{"refresh_token":"{}"}}"#, access)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_requires_token() {
        let res = app()
            .oneshot(Request::get("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
