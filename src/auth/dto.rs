use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::User;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Request body for refreshing tokens.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response returned after login or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
    pub profile_completed: bool,
}

/// Public user info (safe to expose).
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub picture: Option<String>,
    pub is_admin: bool,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            full_name: u.full_name.clone(),
            picture: u.google_picture.clone(),
            is_admin: u.is_admin,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PremiumInfo {
    pub flag: bool,
    pub active: bool,
    pub kind: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ends_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub premium: PremiumInfo,
}

impl MeResponse {
    pub fn new(user: User, now: OffsetDateTime) -> Self {
        let premium = PremiumInfo {
            flag: user.is_premium,
            active: user.premium().is_active(now),
            kind: user.premium_kind.clone(),
            started_at: user.premium_started_at,
            ends_at: user.premium_ends_at,
        };
        Self { user, premium }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub last_school: String,
    #[serde(default)]
    pub academic_level: String,
    #[serde(default)]
    pub academic_level_other: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub whatsapp: String,
    #[serde(default)]
    pub career_interest: String,
    #[serde(default)]
    pub interests: String,
    #[serde(default)]
    pub accepts_announcements: bool,
}

/// Normalised profile fields ready to persist.
#[derive(Debug, PartialEq)]
pub struct ProfileUpdate {
    pub full_name: String,
    pub last_school: Option<String>,
    pub academic_level: Option<String>,
    pub academic_level_other: Option<String>,
    pub city: Option<String>,
    pub whatsapp: Option<String>,
    pub career_interest: Option<String>,
    pub interests: Option<String>,
    pub accepts_announcements: bool,
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

impl ProfileUpdateRequest {
    pub fn normalize(self) -> Result<ProfileUpdate, &'static str> {
        let full_name = self.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err("Full name is required");
        }

        let level = self.academic_level.trim().to_lowercase();
        let (academic_level, academic_level_other) = if level == "otro" || level == "other" {
            let other = non_empty(self.academic_level_other);
            (other.clone(), other)
        } else {
            (non_empty(self.academic_level), None)
        };

        Ok(ProfileUpdate {
            full_name,
            last_school: non_empty(self.last_school),
            academic_level,
            academic_level_other,
            city: non_empty(self.city),
            whatsapp: non_empty(self.whatsapp),
            career_interest: non_empty(self.career_interest),
            interests: non_empty(self.interests),
            accepts_announcements: self.accepts_announcements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, level: &str, other: &str) -> ProfileUpdateRequest {
        ProfileUpdateRequest {
            full_name: name.into(),
            last_school: "  ".into(),
            academic_level: level.into(),
            academic_level_other: other.into(),
            city: "La Paz".into(),
            whatsapp: String::new(),
            career_interest: String::new(),
            interests: String::new(),
            accepts_announcements: true,
        }
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(request("   ", "", "").normalize().is_err());
    }

    #[test]
    fn other_level_uses_free_text() {
        let p = request("Ana", "otro", "Técnico superior").normalize().unwrap();
        assert_eq!(p.academic_level.as_deref(), Some("Técnico superior"));
        assert_eq!(p.academic_level_other.as_deref(), Some("Técnico superior"));
    }

    #[test]
    fn empty_strings_become_none() {
        let p = request("Ana", "secundaria", "ignored").normalize().unwrap();
        assert_eq!(p.academic_level.as_deref(), Some("secundaria"));
        assert_eq!(p.academic_level_other, None);
        assert_eq!(p.last_school, None);
        assert_eq!(p.whatsapp, None);
        assert_eq!(p.city.as_deref(), Some("La Paz"));
        assert!(p.accepts_announcements);
    }
}
