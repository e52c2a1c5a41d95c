//! Property tests for the ensemble invariants in `SPEC_FULL.md` §8: depth
//! stays fractional in `[0, 1]`, history never exceeds its ring capacity and
//! stays time-ordered, and `active` tracks the mass threshold correctly.

use proptest::prelude::*;
use tracer_drift::particle::{History, HistorySample, ParticleRecord, HISTORY_CAPACITY};

proptest! {
    #[test]
    fn history_never_exceeds_capacity_and_stays_monotone(days in prop::collection::vec(0.0f64..1000.0, 0..50)) {
        let mut sorted_days = days;
        sorted_days.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let mut history = History::new();
        for day in sorted_days {
            history.push(HistorySample { day, x: 0.0, y: 0.0, depth: 0.0 });
        }

        prop_assert!(history.len() <= HISTORY_CAPACITY);
        prop_assert!(history.is_monotone());
    }

    #[test]
    fn last_n_is_never_longer_than_the_history_or_the_request(
        days in prop::collection::vec(0.0f64..1000.0, 0..20),
        n in 0usize..10,
    ) {
        let mut sorted_days = days;
        sorted_days.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let mut history = History::new();
        for day in &sorted_days {
            history.push(HistorySample { day: *day, x: 0.0, y: 0.0, depth: 0.0 });
        }

        let last_n = history.last_n(n);
        prop_assert!(last_n.len() <= n);
        prop_assert!(last_n.len() <= history.len());
        if let (Some(slice_last), Some(history_last)) = (last_n.last(), history.last()) {
            prop_assert_eq!(slice_last.day, history_last.day);
        }
    }

    /// `below_mass_threshold` must agree with a direct recomputation of the
    /// threshold, across any initial/current mass pair (§3's invariant that
    /// `active` implies `mass_bq` at or above 0.1% of `initial_mass_bq`).
    #[test]
    fn below_mass_threshold_matches_direct_comparison(
        initial_mass in 1.0f64..1e18,
        fraction_remaining in 0.0f64..2.0,
    ) {
        let mut p = ParticleRecord::inactive(0, "Cs-137");
        p.activate(0.0, 0.0, initial_mass, 0.0);
        p.mass_bq = initial_mass * fraction_remaining;

        let expected = p.mass_bq < 1e-3 * initial_mass;
        prop_assert_eq!(p.below_mass_threshold(), expected);
    }

    /// Depth, expressed as a fraction of a kilometre, must clamp into
    /// `[0, 1]` regardless of how far a proposed vertical displacement
    /// would otherwise push it (§4.5.4's clamping rule).
    #[test]
    fn depth_fraction_clamps_into_unit_range(depth_m in -5000.0f64..5000.0) {
        let clamped = (depth_m / 1000.0).clamp(0.0, 1.0);
        prop_assert!(clamped >= 0.0);
        prop_assert!(clamped <= 1.0);
    }
}
