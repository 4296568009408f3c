use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::audit::client::ClientMeta;

/// Opens a login session row.
pub async fn record_session(db: &PgPool, user_id: Uuid, meta: &ClientMeta) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_sessions (id, user_id, ip_address, user_agent)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(meta.ip.as_deref())
    .bind(meta.user_agent.as_deref())
    .execute(db)
    .await
    .context("insert user session")?;
    Ok(())
}

/// Stamps the end time on every open session of the user.
pub async fn close_sessions(db: &PgPool, user_id: Uuid) -> anyhow::Result<u64> {
    let res = sqlx::query(
        r#"
        UPDATE user_sessions
           SET ended_at = now()
         WHERE user_id = $1 AND ended_at IS NULL
        "#,
    )
    .bind(user_id)
    .execute(db)
    .await
    .context("close user sessions")?;
    Ok(res.rows_affected())
}

pub async fn record_exercise_view(
    db: &PgPool,
    user_id: Option<Uuid>,
    exercise_id: &str,
    meta: &ClientMeta,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO exercise_views (id, user_id, exercise_id, ip_address, user_agent)
        VALUES ($1, (SELECT id FROM users WHERE id = $2), $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(exercise_id)
    .bind(meta.ip.as_deref())
    .bind(meta.user_agent.as_deref())
    .execute(db)
    .await
    .context("insert exercise view")?;
    Ok(())
}

/// Unknown or deleted user ids are stored as NULL.
pub async fn record_page_visit(
    db: &PgPool,
    path: &str,
    user_id: Option<Uuid>,
    meta: &ClientMeta,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO page_visits (id, path, user_id, ip_address, user_agent)
        VALUES ($1, $2, (SELECT id FROM users WHERE id = $3), $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(path)
    .bind(user_id)
    .bind(meta.ip.as_deref())
    .bind(meta.user_agent.as_deref())
    .execute(db)
    .await
    .context("insert page visit")?;
    Ok(())
}

#[derive(Debug, Clone, Copy, sqlx::FromRow, serde::Serialize)]
pub struct VisitCounts {
    pub last_24h: i64,
    pub total: i64,
}

pub async fn visit_counts(db: &PgPool, now: OffsetDateTime) -> anyhow::Result<VisitCounts> {
    let counts = sqlx::query_as::<_, VisitCounts>(
        r#"
        SELECT COUNT(*) FILTER (WHERE visited_at >= $1) AS last_24h,
               COUNT(*)                                 AS total
          FROM page_visits
        "#,
    )
    .bind(now - time::Duration::hours(24))
    .fetch_one(db)
    .await
    .context("count page visits")?;
    Ok(counts)
}
