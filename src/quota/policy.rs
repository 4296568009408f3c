//! Daily usage caps and premium entitlement.
//!
//! Everything here is pure: callers load the counters, pass `today`/`now`,
//! and persist whatever changed.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::quota::dto::{Allowance, LimitSnapshot, Principal, Resource};

pub const ANONYMOUS_DAILY_VIEWS: i32 = 5;
pub const REGISTERED_DAILY_VIEWS: i32 = 15;
pub const REGISTERED_DAILY_EXAMS: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PremiumKind {
    Monthly,
    Annual,
    Permanent,
}

impl PremiumKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PremiumKind::Monthly => "monthly",
            PremiumKind::Annual => "annual",
            PremiumKind::Permanent => "permanent",
        }
    }

    /// Accepts both the stored names and the admin panel's Spanish labels.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "monthly" | "mensual" => Some(PremiumKind::Monthly),
            "annual" | "anual" => Some(PremiumKind::Annual),
            "permanent" | "permanente" => Some(PremiumKind::Permanent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PremiumStatus {
    pub flag: bool,
    pub kind: Option<PremiumKind>,
    pub ends_at: Option<OffsetDateTime>,
}

impl PremiumStatus {
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        if !self.flag {
            return false;
        }
        if self.kind == Some(PremiumKind::Permanent) {
            return true;
        }
        match self.ends_at {
            Some(end) => now <= end,
            None => true,
        }
    }

    /// Flag still set but the term is over; the store should clear it.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.flag && !self.is_active(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOutcome {
    /// Premium: nothing counted.
    Unmetered,
    /// Already viewed today: allowed, nothing counted.
    Repeat,
    /// Allowed and counted against today's quota.
    Counted,
    Denied,
}

impl ViewOutcome {
    pub fn allowed(&self) -> bool {
        !matches!(self, ViewOutcome::Denied)
    }

    /// Whether the stored counters changed.
    pub fn counted(&self) -> bool {
        matches!(self, ViewOutcome::Counted)
    }
}

/// Per-day exercise views: a counter, the day it belongs to, and the ids seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyViews {
    pub count: i32,
    pub day: Option<Date>,
    pub viewed: Vec<String>,
}

impl DailyViews {
    /// Resets the counters when they belong to another day. Returns true on reset.
    pub fn roll_over(&mut self, today: Date) -> bool {
        if self.day == Some(today) {
            return false;
        }
        self.count = 0;
        self.day = Some(today);
        self.viewed.clear();
        true
    }

    pub fn has_viewed(&self, exercise_id: &str) -> bool {
        self.viewed.iter().any(|v| v == exercise_id)
    }

    /// Rolls over, then records a view of `exercise_id` if the quota allows.
    pub fn record(&mut self, exercise_id: &str, limit: i32, today: Date) -> ViewOutcome {
        self.roll_over(today);
        if self.has_viewed(exercise_id) {
            return ViewOutcome::Repeat;
        }
        if self.count >= limit {
            return ViewOutcome::Denied;
        }
        self.count += 1;
        self.viewed.push(exercise_id.to_string());
        ViewOutcome::Counted
    }

    pub fn remaining(&self, limit: i32) -> i32 {
        (limit - self.count).max(0)
    }
}

/// Plain per-day counter used for exams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyCounter {
    pub count: i32,
    pub day: Option<Date>,
}

impl DailyCounter {
    pub fn roll_over(&mut self, today: Date) -> bool {
        if self.day == Some(today) {
            return false;
        }
        self.count = 0;
        self.day = Some(today);
        true
    }

    pub fn allows(&self, limit: i32) -> bool {
        self.count < limit
    }

    /// Rolls over, then takes one unit if available.
    pub fn take(&mut self, limit: i32, today: Date) -> bool {
        self.roll_over(today);
        if !self.allows(limit) {
            return false;
        }
        self.count += 1;
        true
    }
}

pub fn view_limit(principal: Principal) -> i32 {
    match principal {
        Principal::Anonymous => ANONYMOUS_DAILY_VIEWS,
        Principal::Registered => REGISTERED_DAILY_VIEWS,
    }
}

pub fn exam_limit(principal: Principal) -> i32 {
    match principal {
        Principal::Anonymous => 0,
        Principal::Registered => REGISTERED_DAILY_EXAMS,
    }
}

/// Decides one registered-user view. Premium views are allowed and never counted.
pub fn decide_view(premium: bool, views: &mut DailyViews, exercise_id: &str, today: Date) -> ViewOutcome {
    if premium {
        views.roll_over(today);
        return ViewOutcome::Unmetered;
    }
    views.record(exercise_id, REGISTERED_DAILY_VIEWS, today)
}

/// Takes one exam for a registered user. Premium is never denied but still counted.
pub fn decide_exam(premium: bool, exams: &mut DailyCounter, today: Date) -> bool {
    if premium {
        exams.roll_over(today);
        exams.count += 1;
        return true;
    }
    exams.take(REGISTERED_DAILY_EXAMS, today)
}

/// View quota as reported to clients. `views` must already be rolled over.
pub fn view_snapshot(principal: Principal, premium: bool, views: &DailyViews) -> LimitSnapshot {
    let limit = view_limit(principal);
    if premium {
        return LimitSnapshot {
            resource: Resource::Exercises,
            principal,
            premium,
            daily_limit: Allowance::Unlimited,
            used: views.count,
            remaining: Allowance::Unlimited,
            allowed: true,
            message: None,
        };
    }
    let remaining = views.remaining(limit);
    LimitSnapshot {
        resource: Resource::Exercises,
        principal,
        premium,
        daily_limit: Allowance::Limited(limit),
        used: views.count,
        remaining: Allowance::Limited(remaining),
        allowed: remaining > 0,
        message: None,
    }
}

/// Exam quota as reported to clients. `exams` must already be rolled over.
pub fn exam_snapshot(principal: Principal, premium: bool, exams: &DailyCounter) -> LimitSnapshot {
    if premium {
        return LimitSnapshot {
            resource: Resource::Exams,
            principal,
            premium,
            daily_limit: Allowance::Unlimited,
            used: exams.count,
            remaining: Allowance::Unlimited,
            allowed: true,
            message: None,
        };
    }
    if principal == Principal::Anonymous {
        return LimitSnapshot {
            resource: Resource::Exams,
            principal,
            premium,
            daily_limit: Allowance::Limited(0),
            used: 0,
            remaining: Allowance::Limited(0),
            allowed: false,
            message: Some("Register to take practice exams".into()),
        };
    }
    let limit = exam_limit(principal);
    let remaining = (limit - exams.count).max(0);
    LimitSnapshot {
        resource: Resource::Exams,
        principal,
        premium,
        daily_limit: Allowance::Limited(limit),
        used: exams.count,
        remaining: Allowance::Limited(remaining),
        allowed: remaining > 0,
        message: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    const TODAY: Date = date!(2026 - 10 - 18);
    const YESTERDAY: Date = date!(2026 - 10 - 17);

    #[test]
    fn counter_resets_only_on_a_new_day() {
        let mut views = DailyViews {
            count: 7,
            day: Some(TODAY),
            viewed: vec!["a".into()],
        };
        assert!(!views.roll_over(TODAY));
        assert_eq!(views.count, 7);
        assert_eq!(views.viewed.len(), 1);

        let mut stale = DailyViews {
            count: 7,
            day: Some(YESTERDAY),
            viewed: vec!["a".into()],
        };
        assert!(stale.roll_over(TODAY));
        assert_eq!(stale.count, 0);
        assert!(stale.viewed.is_empty());
        assert_eq!(stale.day, Some(TODAY));
    }

    #[test]
    fn never_counted_state_is_initialised() {
        let mut views = DailyViews::default();
        assert!(views.roll_over(TODAY));
        assert_eq!(views.day, Some(TODAY));
    }

    #[test]
    fn views_stop_at_the_limit() {
        let mut views = DailyViews::default();
        for i in 0..ANONYMOUS_DAILY_VIEWS {
            let id = format!("ex-{}", i);
            assert_eq!(views.record(&id, ANONYMOUS_DAILY_VIEWS, TODAY), ViewOutcome::Counted);
        }
        assert_eq!(views.record("ex-new", ANONYMOUS_DAILY_VIEWS, TODAY), ViewOutcome::Denied);
        assert_eq!(views.count, ANONYMOUS_DAILY_VIEWS);
        assert_eq!(views.remaining(ANONYMOUS_DAILY_VIEWS), 0);
    }

    #[test]
    fn repeat_views_are_free() {
        let mut views = DailyViews::default();
        assert_eq!(views.record("x", 1, TODAY), ViewOutcome::Counted);
        assert_eq!(views.record("x", 1, TODAY), ViewOutcome::Repeat);
        assert_eq!(views.count, 1);
        assert!(views.has_viewed("x"));
        assert_eq!(views.record("y", 1, TODAY), ViewOutcome::Denied);
    }

    #[test]
    fn exhausted_quota_is_restored_next_day() {
        let mut views = DailyViews::default();
        views.record("x", 1, YESTERDAY);
        assert_eq!(views.record("y", 1, YESTERDAY), ViewOutcome::Denied);
        assert_eq!(views.record("y", 1, TODAY), ViewOutcome::Counted);
    }

    #[test]
    fn exam_counter_allows_one_per_day() {
        let mut exams = DailyCounter::default();
        assert!(exams.take(REGISTERED_DAILY_EXAMS, TODAY));
        assert!(!exams.take(REGISTERED_DAILY_EXAMS, TODAY));
        assert!(exams.take(REGISTERED_DAILY_EXAMS, date!(2026 - 10 - 19)));
    }

    #[test]
    fn premium_kinds_parse_in_both_languages() {
        assert_eq!(PremiumKind::parse("mensual"), Some(PremiumKind::Monthly));
        assert_eq!(PremiumKind::parse("Annual"), Some(PremiumKind::Annual));
        assert_eq!(PremiumKind::parse("permanente"), Some(PremiumKind::Permanent));
        assert_eq!(PremiumKind::parse("lifetime"), None);
    }

    #[test]
    fn premium_activity() {
        let now = datetime!(2026-10-18 12:00 UTC);
        let off = PremiumStatus { flag: false, kind: Some(PremiumKind::Permanent), ends_at: None };
        assert!(!off.is_active(now));
        assert!(!off.is_expired(now));

        let permanent = PremiumStatus {
            flag: true,
            kind: Some(PremiumKind::Permanent),
            ends_at: Some(datetime!(2020-01-01 0:00 UTC)),
        };
        assert!(permanent.is_active(now));

        let running = PremiumStatus {
            flag: true,
            kind: Some(PremiumKind::Monthly),
            ends_at: Some(datetime!(2026-11-01 0:00 UTC)),
        };
        assert!(running.is_active(now));

        let lapsed = PremiumStatus {
            flag: true,
            kind: Some(PremiumKind::Annual),
            ends_at: Some(datetime!(2026-10-01 0:00 UTC)),
        };
        assert!(!lapsed.is_active(now));
        assert!(lapsed.is_expired(now));
    }

    #[test]
    fn premium_snapshot_is_never_blocked() {
        let views = DailyViews {
            count: 999,
            day: Some(TODAY),
            viewed: vec![],
        };
        let snap = view_snapshot(Principal::Registered, true, &views);
        assert!(snap.allowed);
        assert_eq!(snap.daily_limit, Allowance::Unlimited);

        let exams = DailyCounter { count: 50, day: Some(TODAY) };
        assert!(exam_snapshot(Principal::Registered, true, &exams).allowed);
    }

    #[test]
    fn anonymous_cannot_take_exams() {
        let snap = exam_snapshot(Principal::Anonymous, false, &DailyCounter::default());
        assert!(!snap.allowed);
        assert!(snap.message.is_some());
    }

    #[test]
    fn registered_view_snapshot_counts_down() {
        let views = DailyViews {
            count: 10,
            day: Some(TODAY),
            viewed: vec![],
        };
        let snap = view_snapshot(Principal::Registered, false, &views);
        assert_eq!(snap.daily_limit, Allowance::Limited(REGISTERED_DAILY_VIEWS));
        assert_eq!(snap.remaining, Allowance::Limited(5));
        assert!(snap.allowed);
    }

    #[test]
    fn premium_views_are_unmetered() {
        let mut views = DailyViews {
            count: REGISTERED_DAILY_VIEWS,
            day: Some(TODAY),
            viewed: vec!["a".into()],
        };
        let before = views.clone();
        assert_eq!(decide_view(true, &mut views, "new", TODAY), ViewOutcome::Unmetered);
        assert_eq!(views, before);

        assert_eq!(decide_view(false, &mut views, "new", TODAY), ViewOutcome::Denied);
        assert_eq!(decide_view(false, &mut views, "a", TODAY), ViewOutcome::Repeat);
    }

    #[test]
    fn premium_view_on_a_new_day_resets_stale_counters() {
        let mut views = DailyViews {
            count: 3,
            day: Some(YESTERDAY),
            viewed: vec!["a".into()],
        };
        assert_eq!(decide_view(true, &mut views, "b", TODAY), ViewOutcome::Unmetered);
        assert_eq!(views.count, 0);
        assert_eq!(views.day, Some(TODAY));
    }

    #[test]
    fn premium_exams_are_counted_but_never_denied() {
        let mut exams = DailyCounter { count: 4, day: Some(TODAY) };
        assert!(decide_exam(true, &mut exams, TODAY));
        assert_eq!(exams.count, 5);

        let mut exams = DailyCounter::default();
        assert!(decide_exam(false, &mut exams, TODAY));
        assert!(!decide_exam(false, &mut exams, TODAY));
        assert_eq!(exams.count, 1);
    }
}
