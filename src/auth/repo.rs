use anyhow::Context;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::{dto::ProfileUpdate, repo_types::User},
    quota::policy::PremiumKind,
};

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE id = $1"#)
            .bind(id)
            .fetch_optional(db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE email = $1"#)
            .bind(email)
            .fetch_optional(db)
            .await
            .context("find user by email")?;
        Ok(user)
    }

    pub async fn find_by_google_id(db: &PgPool, google_id: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE google_id = $1"#)
            .bind(google_id)
            .fetch_optional(db)
            .await
            .context("find user by google id")?;
        Ok(user)
    }

    pub async fn usernames_with_prefix(db: &PgPool, prefix: &str) -> anyhow::Result<Vec<String>> {
        let pattern = format!("{}%", prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_"));
        let rows: Vec<(String,)> =
            sqlx::query_as(r#"SELECT username FROM users WHERE username LIKE $1"#)
                .bind(pattern)
                .fetch_all(db)
                .await
                .context("list usernames")?;
        Ok(rows.into_iter().map(|(u,)| u).collect())
    }

    /// Create a new account from a Google profile.
    pub async fn create_google(
        db: &PgPool,
        username: &str,
        email: &str,
        full_name: &str,
        google_id: &str,
        picture: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, full_name, google_id, google_picture, auth_provider)
            VALUES ($1, $2, $3, $4, $5, 'google')
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(full_name)
        .bind(google_id)
        .bind(picture)
        .fetch_one(db)
        .await
        .context("insert google user")?;
        Ok(user)
    }

    pub async fn refresh_google_profile(
        db: &PgPool,
        id: Uuid,
        full_name: &str,
        picture: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET full_name = CASE WHEN $2 = '' THEN full_name ELSE $2 END,
                   google_picture = $3
             WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(full_name)
        .bind(picture)
        .fetch_one(db)
        .await
        .context("refresh google profile")?;
        Ok(user)
    }

    pub async fn link_google(
        db: &PgPool,
        id: Uuid,
        google_id: &str,
        full_name: &str,
        picture: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET google_id = $2,
                   google_picture = $4,
                   auth_provider = 'google',
                   full_name = CASE WHEN $3 = '' THEN full_name ELSE $3 END
             WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(google_id)
        .bind(full_name)
        .bind(picture)
        .fetch_one(db)
        .await
        .context("link google account")?;
        Ok(user)
    }

    pub async fn set_admin(db: &PgPool, id: Uuid, is_admin: bool) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"UPDATE users SET is_admin = $2 WHERE id = $1 RETURNING *"#,
        )
        .bind(id)
        .bind(is_admin)
        .fetch_one(db)
        .await
        .context("set admin flag")?;
        Ok(user)
    }

    pub async fn touch_last_access(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE users SET last_access_at = now() WHERE id = $1"#)
            .bind(id)
            .execute(db)
            .await
            .context("update last access")?;
        Ok(())
    }

    pub async fn update_profile(db: &PgPool, id: Uuid, p: &ProfileUpdate) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET full_name = $2,
                   last_school = $3,
                   academic_level = $4,
                   academic_level_other = $5,
                   city = $6,
                   whatsapp = $7,
                   career_interest = $8,
                   interests = $9,
                   accepts_announcements = $10,
                   profile_completed = TRUE
             WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&p.full_name)
        .bind(&p.last_school)
        .bind(&p.academic_level)
        .bind(&p.academic_level_other)
        .bind(&p.city)
        .bind(&p.whatsapp)
        .bind(&p.career_interest)
        .bind(&p.interests)
        .bind(p.accepts_announcements)
        .fetch_one(db)
        .await
        .context("update profile")?;
        Ok(user)
    }

    /// Deletes the account; session rows cascade, audit rows keep a NULL user.
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn grant_premium(
        db: &PgPool,
        id: Uuid,
        kind: PremiumKind,
        duration_days: i64,
        reason: &str,
    ) -> anyhow::Result<Option<User>> {
        let now = OffsetDateTime::now_utc();
        let ends_at = match kind {
            PremiumKind::Permanent => None,
            _ => Some(
                duration_days
                    .checked_mul(86_400)
                    .map(Duration::seconds)
                    .and_then(|term| now.checked_add(term))
                    .with_context(|| format!("premium term of {} days out of range", duration_days))?,
            ),
        };
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET is_premium = TRUE,
                   premium_started_at = $2,
                   premium_ends_at = $3,
                   premium_kind = $4,
                   premium_reason = $5
             WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(ends_at)
        .bind(kind.as_str())
        .bind(reason)
        .fetch_optional(db)
        .await
        .context("grant premium")?;
        Ok(user)
    }

    pub async fn revoke_premium(db: &PgPool, id: Uuid, reason: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET is_premium = FALSE,
                   premium_started_at = NULL,
                   premium_ends_at = NULL,
                   premium_kind = NULL,
                   premium_reason = $2
             WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reason)
        .fetch_optional(db)
        .await
        .context("revoke premium")?;
        Ok(user)
    }
}
