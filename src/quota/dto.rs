use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Principal {
    Anonymous,
    Registered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Exercises,
    Exams,
}

/// A count, or `"unlimited"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allowance {
    Limited(i32),
    Unlimited,
}

impl Serialize for Allowance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Allowance::Limited(n) => serializer.serialize_i32(*n),
            Allowance::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LimitSnapshot {
    pub resource: Resource,
    pub principal: Principal,
    pub premium: bool,
    pub daily_limit: Allowance,
    pub used: i32,
    pub remaining: Allowance,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LimitsResponse {
    pub exercises: LimitSnapshot,
    pub exams: LimitSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowance_serialization() {
        assert_eq!(serde_json::to_string(&Allowance::Limited(3)).unwrap(), "3");
        assert_eq!(
            serde_json::to_string(&Allowance::Unlimited).unwrap(),
            "\"unlimited\""
        );
    }
}
