//! Claims: maintenance windows and tenant reservations against the
//! replicated infrastructure model.

use crate::hardware::Hardware;
use crate::resource::ResourceDefinition;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Claim {
    Maintenance {
        name: String,
        reason: String,
        operator: String,
        targets: Vec<Hardware>,
        start: Option<i64>,
        end: Option<i64>,
    },
    Reservation {
        name: String,
        end_user: String,
        resources: Vec<ResourceDefinition>,
        hsn_only: bool,
        start: Option<i64>,
        end: Option<i64>,
    },
}

impl Claim {
    pub fn name(&self) -> &str {
        match self {
            Claim::Maintenance { name, .. } => name,
            Claim::Reservation { name, .. } => name,
        }
    }

    pub fn start(&self) -> Option<i64> {
        match self {
            Claim::Maintenance { start, .. } => *start,
            Claim::Reservation { start, .. } => *start,
        }
    }

    pub fn end(&self) -> Option<i64> {
        match self {
            Claim::Maintenance { end, .. } => *end,
            Claim::Reservation { end, .. } => *end,
        }
    }

    /// Whether `[self.start, self.end]` overlaps `[window_start,
    /// window_end]`, treating an absent bound as unbounded in that
    /// direction.
    pub fn overlaps(&self, window_start: i64, window_end: i64) -> bool {
        let claim_start = self.start().unwrap_or(i64::MIN);
        let claim_end = self.end().unwrap_or(i64::MAX);
        claim_start <= window_end && window_start <= claim_end
    }

    pub fn resources(&self) -> &[ResourceDefinition] {
        match self {
            Claim::Reservation { resources, .. } => resources,
            Claim::Maintenance { .. } => &[],
        }
    }
}

impl Eq for Claim {}

impl PartialOrd for Claim {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Claim {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start().cmp(&other.start())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(start: Option<i64>, end: Option<i64>) -> Claim {
        Claim::Reservation {
            name: "r".to_string(),
            end_user: "tenant".to_string(),
            resources: vec![],
            hsn_only: false,
            start,
            end,
        }
    }

    #[test]
    fn open_ended_start_overlaps_everything_before_its_end() {
        let claim = reservation(None, Some(100));
        assert!(claim.overlaps(-1000, 50));
        assert!(!claim.overlaps(200, 300));
    }

    #[test]
    fn ordering_is_by_start_with_none_first() {
        let mut claims = vec![reservation(Some(10), None), reservation(None, None)];
        claims.sort();
        assert_eq!(claims[0].start(), None);
        assert_eq!(claims[1].start(), Some(10));
    }
}
