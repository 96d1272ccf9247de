//! Admission decision types.

use serde::Serialize;

/// Quota metadata attached to every limited decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quota {
    /// Admissions allowed per window
    pub limit: u64,
    /// Admissions left in the current window after this request
    pub remaining: u64,
    /// Instant (clock nanoseconds) at which the current window ends
    pub reset_at: u64,
}

/// Outcome of admitting a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    /// The key matched the whitelist; no bucket was consulted.
    Exempt,
    /// A token was consumed from the key's bucket.
    Allowed(Quota),
    /// The key's bucket is empty for the current window.
    Limited(Quota),
}

impl Decision {
    /// Returns true if the request may proceed.
    pub fn is_allowed(&self) -> bool {
        !self.is_limited()
    }

    /// Returns true if the request must be rejected.
    pub fn is_limited(&self) -> bool {
        matches!(self, Decision::Limited(_))
    }

    /// Returns true if the whitelist bypassed the limiter.
    pub fn is_exempt(&self) -> bool {
        matches!(self, Decision::Exempt)
    }

    /// Quota metadata, absent for exempt requests.
    pub fn quota(&self) -> Option<&Quota> {
        match self {
            Decision::Exempt => None,
            Decision::Allowed(quota) | Decision::Limited(quota) => Some(quota),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_accessors() {
        let quota = Quota {
            limit: 2,
            remaining: 0,
            reset_at: 1_000,
        };

        assert!(Decision::Exempt.is_allowed());
        assert!(Decision::Exempt.quota().is_none());
        assert!(Decision::Allowed(quota).is_allowed());
        assert!(Decision::Limited(quota).is_limited());
        assert_eq!(Decision::Limited(quota).quota(), Some(&quota));
    }

    #[test]
    fn test_decision_serializes_with_outcome_tag() {
        let quota = Quota {
            limit: 5,
            remaining: 4,
            reset_at: 42,
        };
        let json = serde_json::to_value(Decision::Allowed(quota)).unwrap();
        assert_eq!(json["outcome"], "allowed");
        assert_eq!(json["remaining"], 4);

        let json = serde_json::to_value(Decision::Exempt).unwrap();
        assert_eq!(json["outcome"], "exempt");
    }
}
