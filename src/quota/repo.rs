use anyhow::Context;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::{Date, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::quota::{
    dto::{LimitSnapshot, LimitsResponse, Principal},
    policy::{
        decide_exam, decide_view, exam_snapshot, view_snapshot, DailyCounter, DailyViews,
        PremiumKind, PremiumStatus, ViewOutcome,
    },
};

/// Quota-relevant columns of a user row.
#[derive(Debug, FromRow)]
struct QuotaRow {
    is_premium: bool,
    premium_kind: Option<String>,
    premium_ends_at: Option<OffsetDateTime>,
    views_today: i32,
    views_day: Option<Date>,
    viewed_ids: Vec<String>,
    exams_today: i32,
    exams_day: Option<Date>,
}

impl QuotaRow {
    fn premium(&self) -> PremiumStatus {
        PremiumStatus {
            flag: self.is_premium,
            kind: self.premium_kind.as_deref().and_then(PremiumKind::parse),
            ends_at: self.premium_ends_at,
        }
    }

    fn views(&self) -> DailyViews {
        DailyViews {
            count: self.views_today,
            day: self.views_day,
            viewed: self.viewed_ids.clone(),
        }
    }

    fn exams(&self) -> DailyCounter {
        DailyCounter {
            count: self.exams_today,
            day: self.exams_day,
        }
    }
}

pub struct ViewDecision {
    pub outcome: ViewOutcome,
    pub snapshot: LimitSnapshot,
}

pub struct ExamDecision {
    pub granted: bool,
    pub snapshot: LimitSnapshot,
}

async fn lock_row(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> anyhow::Result<Option<QuotaRow>> {
    let row = sqlx::query_as::<_, QuotaRow>(
        r#"
        SELECT is_premium, premium_kind, premium_ends_at,
               views_today, views_day, viewed_ids,
               exams_today, exams_day
          FROM users
         WHERE id = $1
         FOR UPDATE
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
    .context("lock quota row")?;
    Ok(row)
}

/// Clears a lapsed premium flag; returns whether premium is still active.
async fn settle_premium(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    premium: &PremiumStatus,
    now: OffsetDateTime,
) -> anyhow::Result<bool> {
    if premium.is_expired(now) {
        sqlx::query(r#"UPDATE users SET is_premium = FALSE WHERE id = $1"#)
            .bind(user_id)
            .execute(&mut **tx)
            .await
            .context("expire premium")?;
        info!(%user_id, "premium expired");
        return Ok(false);
    }
    Ok(premium.is_active(now))
}

async fn store_views(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    views: &DailyViews,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"UPDATE users SET views_today = $2, views_day = $3, viewed_ids = $4 WHERE id = $1"#,
    )
    .bind(user_id)
    .bind(views.count)
    .bind(views.day)
    .bind(&views.viewed)
    .execute(&mut **tx)
    .await
    .context("store daily views")?;
    Ok(())
}

async fn store_exams(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    exams: &DailyCounter,
) -> anyhow::Result<()> {
    sqlx::query(r#"UPDATE users SET exams_today = $2, exams_day = $3 WHERE id = $1"#)
        .bind(user_id)
        .bind(exams.count)
        .bind(exams.day)
        .execute(&mut **tx)
        .await
        .context("store daily exams")?;
    Ok(())
}

/// Checks and records one exercise view for a registered user.
/// Returns `None` when the user no longer exists.
pub async fn consume_view(
    db: &PgPool,
    user_id: Uuid,
    exercise_id: &str,
    now: OffsetDateTime,
) -> anyhow::Result<Option<ViewDecision>> {
    let mut tx = db.begin().await.context("begin tx")?;
    let Some(row) = lock_row(&mut tx, user_id).await? else {
        return Ok(None);
    };

    let premium = settle_premium(&mut tx, user_id, &row.premium(), now).await?;
    let mut views = row.views();
    let outcome = decide_view(premium, &mut views, exercise_id, now.date());
    if views != row.views() {
        store_views(&mut tx, user_id, &views).await?;
    }
    tx.commit().await.context("commit tx")?;

    Ok(Some(ViewDecision {
        outcome,
        snapshot: view_snapshot(Principal::Registered, premium, &views),
    }))
}

/// Takes one exam from today's allowance, atomically.
pub async fn consume_exam(
    db: &PgPool,
    user_id: Uuid,
    now: OffsetDateTime,
) -> anyhow::Result<Option<ExamDecision>> {
    let mut tx = db.begin().await.context("begin tx")?;
    let Some(row) = lock_row(&mut tx, user_id).await? else {
        return Ok(None);
    };

    let premium = settle_premium(&mut tx, user_id, &row.premium(), now).await?;
    let mut exams = row.exams();
    let granted = decide_exam(premium, &mut exams, now.date());
    if exams != row.exams() {
        store_exams(&mut tx, user_id, &exams).await?;
    }
    tx.commit().await.context("commit tx")?;

    Ok(Some(ExamDecision {
        granted,
        snapshot: exam_snapshot(Principal::Registered, premium, &exams),
    }))
}

/// Both quotas for a registered user, resetting stale counters on the way.
pub async fn limits(
    db: &PgPool,
    user_id: Uuid,
    now: OffsetDateTime,
) -> anyhow::Result<Option<LimitsResponse>> {
    let mut tx = db.begin().await.context("begin tx")?;
    let Some(row) = lock_row(&mut tx, user_id).await? else {
        return Ok(None);
    };

    let premium = settle_premium(&mut tx, user_id, &row.premium(), now).await?;
    let mut views = row.views();
    let mut exams = row.exams();
    if views.roll_over(now.date()) {
        store_views(&mut tx, user_id, &views).await?;
    }
    if exams.roll_over(now.date()) {
        store_exams(&mut tx, user_id, &exams).await?;
    }
    tx.commit().await.context("commit tx")?;

    Ok(Some(LimitsResponse {
        exercises: view_snapshot(Principal::Registered, premium, &views),
        exams: exam_snapshot(Principal::Registered, premium, &exams),
    }))
}

/// Zeroes both daily counters.
pub async fn reset_limits(db: &PgPool, user_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        UPDATE users
           SET views_today = 0, views_day = NULL, viewed_ids = '{}',
               exams_today = 0, exams_day = NULL
         WHERE id = $1
        "#,
    )
    .bind(user_id)
    .execute(db)
    .await
    .context("reset limits")?;
    Ok(res.rows_affected() > 0)
}
