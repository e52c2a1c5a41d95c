//! Release phases and the unit they are declared in (`SPEC_FULL.md` §3, §4.2).

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Activity unit a phase's total release is declared in. `to_gbq` centralizes the
/// GBq=1, TBq=1e3, PBq=1e6 conversion table from §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum Unit {
    GBq,
    TBq,
    PBq,
}

impl Unit {
    pub fn to_gbq(self, amount: f64) -> f64 {
        match self {
            Unit::GBq => amount,
            Unit::TBq => amount * 1e3,
            Unit::PBq => amount * 1e6,
        }
    }
}

/// A half-open emission interval `[start_day, end_day)` releasing `total` of
/// `unit` at a constant rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReleasePhase {
    pub start_day: f64,
    pub end_day: f64,
    pub total: f64,
    pub unit: Unit,
}

impl ReleasePhase {
    pub fn new(start_day: f64, end_day: f64, total: f64, unit: Unit) -> Self {
        ReleasePhase {
            start_day,
            end_day,
            total,
            unit,
        }
    }

    /// Inclusive on both ends: `rate_at(start)` and `rate_at(end)` are both
    /// nonzero (see `SPEC_FULL.md` §8 boundary behaviors), with ties between
    /// back-to-back phases broken by `ReleaseManager::rate_at`'s first-match rule.
    pub fn contains(&self, day: f64) -> bool {
        day >= self.start_day && day <= self.end_day
    }

    /// Rate in the phase's own declared unit, per day.
    pub fn rate(&self) -> f64 {
        self.total / (self.end_day - self.start_day)
    }

    pub fn total_in_gbq(&self) -> f64 {
        self.unit.to_gbq(self.total)
    }

    pub fn is_valid(&self) -> bool {
        self.end_day > self.start_day && self.start_day >= 0.0
    }

    fn overlaps(&self, other: &ReleasePhase) -> bool {
        self.start_day < other.end_day && other.start_day < self.end_day
    }
}

/// Validates a schedule against §4.2's invariants: every phase well-formed, and
/// (per the resolved open question in §9) no two phases overlapping in time.
/// Returns the index pair of the first overlap found, if any.
pub fn find_overlap(phases: &[ReleasePhase]) -> Option<(usize, usize)> {
    for i in 0..phases.len() {
        for j in (i + 1)..phases.len() {
            if phases[i].overlaps(&phases[j]) {
                return Some((i, j));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_conversion_table() {
        assert_eq!(Unit::GBq.to_gbq(5.0), 5.0);
        assert_eq!(Unit::TBq.to_gbq(5.0), 5_000.0);
        assert_eq!(Unit::PBq.to_gbq(5.0), 5_000_000.0);
    }

    #[test]
    fn rate_boundary_behavior() {
        let phase = ReleasePhase::new(0.0, 30.0, 16.2, Unit::PBq);
        assert!(phase.contains(0.0));
        assert!(phase.contains(29.999));
        assert!(phase.contains(30.0));
        assert!(!phase.contains(30.0 + 1e-6));
    }

    #[test]
    fn overlap_detection() {
        let a = ReleasePhase::new(0.0, 10.0, 1.0, Unit::GBq);
        let b = ReleasePhase::new(5.0, 15.0, 1.0, Unit::GBq);
        let c = ReleasePhase::new(10.0, 20.0, 1.0, Unit::GBq);
        assert_eq!(find_overlap(&[a, b]), Some((0, 1)));
        // half-open intervals touching at a boundary do not overlap
        assert_eq!(find_overlap(&[a, c]), None);
    }
}
