use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{admin::dto::UserCounts, auth::repo_types::User};

pub async fn list_users(db: &PgPool) -> anyhow::Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(r#"SELECT * FROM users ORDER BY created_at DESC"#)
        .fetch_all(db)
        .await
        .context("list users")?;
    Ok(users)
}

/// Premium counts as active the same way `PremiumStatus::is_active` decides it.
pub async fn user_counts(db: &PgPool, now: OffsetDateTime) -> anyhow::Result<UserCounts> {
    let counts = sqlx::query_as::<_, UserCounts>(
        r#"
        SELECT COUNT(*)                                   AS total,
               COUNT(*) FILTER (WHERE is_active)          AS active,
               COUNT(*) FILTER (
                   WHERE is_premium
                     AND (premium_kind = 'permanent'
                          OR premium_ends_at IS NULL
                          OR premium_ends_at >= $1)
               )                                          AS premium_active,
               COUNT(*) FILTER (WHERE google_id IS NOT NULL) AS google
          FROM users
        "#,
    )
    .bind(now)
    .fetch_one(db)
    .await
    .context("count users")?;
    Ok(counts)
}

pub async fn toggle_active(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"UPDATE users SET is_active = NOT is_active WHERE id = $1 RETURNING *"#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .context("toggle active flag")?;
    Ok(user)
}

pub async fn toggle_admin(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"UPDATE users SET is_admin = NOT is_admin WHERE id = $1 RETURNING *"#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .context("toggle admin flag")?;
    Ok(user)
}

/// Sets `is_active` on every listed account except `except`.
pub async fn bulk_set_active(
    db: &PgPool,
    ids: &[Uuid],
    active: bool,
    except: Uuid,
) -> anyhow::Result<u64> {
    let res = sqlx::query(
        r#"UPDATE users SET is_active = $1 WHERE id = ANY($2) AND id <> $3"#,
    )
    .bind(active)
    .bind(ids)
    .bind(except)
    .execute(db)
    .await
    .context("bulk set active")?;
    Ok(res.rows_affected())
}

/// Deletes listed accounts, never admins and never `except`.
pub async fn bulk_delete(db: &PgPool, ids: &[Uuid], except: Uuid) -> anyhow::Result<u64> {
    let res = sqlx::query(
        r#"DELETE FROM users WHERE id = ANY($1) AND id <> $2 AND NOT is_admin"#,
    )
    .bind(ids)
    .bind(except)
    .execute(db)
    .await
    .context("bulk delete users")?;
    Ok(res.rows_affected())
}
