use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use serde::{Deserialize, Serialize};
use time::{format_description::FormatItem, macros::format_description, Date, Duration, OffsetDateTime, Time};
use tracing::debug;

use crate::{
    auth::{claims::TokenKind, services::JwtKeys},
    cookies::{build_cookie, read_cookie},
    quota::policy::DailyViews,
};

pub const QUOTA_COOKIE: &str = "preu_quota";

const DAY_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Signed anonymous view state carried in the quota cookie.
#[derive(Debug, Serialize, Deserialize)]
struct QuotaClaims {
    day: String,
    viewed: Vec<String>,
    iat: usize,
    exp: usize,
    iss: String,
    aud: String,
    kind: TokenKind,
}

/// Today's views for a visitor without an account.
///
/// A missing, tampered or expired cookie yields a fresh state.
#[derive(Debug, Clone, Default)]
pub struct AnonymousQuota(pub DailyViews);

impl AnonymousQuota {
    pub fn decode(keys: &JwtKeys, token: &str) -> Option<Self> {
        let claims: QuotaClaims = keys.decode(token).ok()?;
        if claims.kind != TokenKind::Quota {
            return None;
        }
        let day = Date::parse(&claims.day, DAY_FORMAT).ok()?;
        Some(Self(DailyViews {
            count: claims.viewed.len() as i32,
            day: Some(day),
            viewed: claims.viewed,
        }))
    }

    pub fn encode(&self, keys: &JwtKeys, now: OffsetDateTime) -> anyhow::Result<String> {
        let day = self.0.day.unwrap_or_else(|| now.date());
        let claims = QuotaClaims {
            day: day.format(DAY_FORMAT)?,
            viewed: self.0.viewed.clone(),
            iat: now.unix_timestamp() as usize,
            exp: expiry(day).unix_timestamp() as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
            kind: TokenKind::Quota,
        };
        keys.encode(&claims)
    }

    /// `Set-Cookie` value carrying this state.
    pub fn to_cookie(
        &self,
        keys: &JwtKeys,
        now: OffsetDateTime,
        secure: bool,
    ) -> anyhow::Result<String> {
        let token = self.encode(keys, now)?;
        let day = self.0.day.unwrap_or_else(|| now.date());
        let max_age = (expiry(day) - now).whole_seconds().max(0);
        Ok(build_cookie(QUOTA_COOKIE, &token, max_age, secure))
    }
}

/// End of the day after `day`; older state is useless anyway.
fn expiry(day: Date) -> OffsetDateTime {
    (day + Duration::days(2)).with_time(Time::MIDNIGHT).assume_utc()
}

#[async_trait]
impl<S> FromRequestParts<S> for AnonymousQuota
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = read_cookie(&parts.headers, QUOTA_COOKIE) else {
            return Ok(Self::default());
        };
        let keys = JwtKeys::from_ref(state);
        Ok(Self::decode(&keys, &token).unwrap_or_else(|| {
            debug!("discarding unreadable quota cookie");
            Self::default()
        }))
    }
}
