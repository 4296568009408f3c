use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    admin::stats::CatalogStats, audit::repo::VisitCounts, auth::dto::MeResponse,
    quota::policy::PremiumKind,
};

/// Longest fixed-term plan an admin can grant.
pub const MAX_PREMIUM_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Copy, Default, Serialize, sqlx::FromRow)]
pub struct UserCounts {
    pub total: i64,
    pub active: i64,
    pub premium_active: i64,
    pub google: i64,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<MeResponse>,
    pub counts: UserCounts,
}

fn default_duration_days() -> i64 {
    30
}

#[derive(Debug, Deserialize)]
pub struct GrantPremiumRequest {
    #[serde(alias = "tipo")]
    pub kind: String,
    #[serde(default = "default_duration_days", alias = "duracion_dias")]
    pub duration_days: i64,
    #[serde(default, alias = "motivo")]
    pub reason: String,
}

impl GrantPremiumRequest {
    /// Parsed plan kind; fixed-term plans need `1..=MAX_PREMIUM_DAYS` days.
    pub fn validate(&self) -> Result<PremiumKind, String> {
        let kind = PremiumKind::parse(&self.kind)
            .ok_or_else(|| "kind must be one of monthly, annual, permanent".to_string())?;
        if kind != PremiumKind::Permanent && !(1..=MAX_PREMIUM_DAYS).contains(&self.duration_days) {
            return Err(format!(
                "duration_days must be between 1 and {}",
                MAX_PREMIUM_DAYS
            ));
        }
        Ok(kind)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RevokePremiumRequest {
    #[serde(default, alias = "motivo")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Activate,
    Deactivate,
    Delete,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub action: BulkAction,
    #[serde(default)]
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub action: BulkAction,
    pub affected: u64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub catalog: CatalogStats,
    pub users: UserCounts,
    pub visits: VisitCounts,
}
