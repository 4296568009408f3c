use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::quota::policy::{PremiumKind, PremiumStatus};

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub google_id: Option<String>,
    pub google_picture: Option<String>,
    pub auth_provider: String,
    pub is_active: bool,
    pub is_admin: bool,

    pub last_school: Option<String>,
    pub academic_level: Option<String>,
    pub academic_level_other: Option<String>,
    pub interests: Option<String>,
    pub whatsapp: Option<String>,
    pub city: Option<String>,
    pub career_interest: Option<String>,
    pub accepts_announcements: bool,
    pub profile_completed: bool,

    pub is_premium: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub premium_started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub premium_ends_at: Option<OffsetDateTime>,
    pub premium_kind: Option<String>,
    pub premium_reason: Option<String>,

    #[serde(skip_serializing)]
    pub views_today: i32,
    #[serde(skip_serializing)]
    pub views_day: Option<Date>,
    #[serde(skip_serializing)]
    pub viewed_ids: Vec<String>,
    #[serde(skip_serializing)]
    pub exams_today: i32,
    #[serde(skip_serializing)]
    pub exams_day: Option<Date>,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_access_at: Option<OffsetDateTime>,
}

impl User {
    pub fn premium(&self) -> PremiumStatus {
        PremiumStatus {
            flag: self.is_premium,
            // an unknown stored kind is treated like a fixed-term plan
            kind: self.premium_kind.as_deref().and_then(PremiumKind::parse),
            ends_at: self.premium_ends_at,
        }
    }
}
