use axum::{
    extract::{FromRef, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{
    audit::{client::ClientMeta, repo},
    auth::{claims::TokenKind, extractors::bearer_token, services::JwtKeys},
    state::AppState,
};

/// Appends a page-visit row for every API request, off the request path.
pub async fn log_visit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let (parts, body) = req.into_parts();

    let path = parts.uri.path().to_string();
    let meta = ClientMeta::from_parts(&parts);
    let user_id = bearer_token(&parts).and_then(|token| {
        let claims = JwtKeys::from_ref(&state).verify(token).ok()?;
        (claims.kind == TokenKind::Access).then_some(claims.sub)
    });

    let db = state.db.clone();
    tokio::spawn(async move {
        if let Err(e) = repo::record_page_visit(&db, &path, user_id, &meta).await {
            warn!(error = %e, %path, "page visit not recorded");
        }
    });

    next.run(Request::from_parts(parts, body)).await
}
