//! Particle records and their bounded position history
//! (`SPEC_FULL.md` §3, §9 ring-buffer redesign flag).

use serde::{Deserialize, Serialize};

/// Capacity of a particle's position history, per §3.
pub const HISTORY_CAPACITY: usize = 8;

/// One sampled position in a particle's trail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub day: f64,
    pub x: f64,
    pub y: f64,
    pub depth: f64,
}

/// Fixed-capacity ring buffer holding the last `HISTORY_CAPACITY` position
/// samples in monotone time order: a `HISTORY_CAPACITY`-slot array with a
/// `head`/`len` pair, overwritten in place rather than shifted. Replaces the
/// source's append-with-shift array (§9 redesign flag).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    samples: [HistorySample; HISTORY_CAPACITY],
    head: usize,
    len: usize,
}

impl Default for History {
    fn default() -> Self {
        History::new()
    }
}

impl History {
    pub fn new() -> Self {
        History {
            samples: [HistorySample::default(); HISTORY_CAPACITY],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, sample: HistorySample) {
        let write_index = (self.head + self.len) % HISTORY_CAPACITY;
        self.samples[write_index] = sample;
        if self.len < HISTORY_CAPACITY {
            self.len += 1;
        } else {
            self.head = (self.head + 1) % HISTORY_CAPACITY;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn iter(&self) -> impl Iterator<Item = &HistorySample> {
        (0..self.len).map(move |i| &self.samples[(self.head + i) % HISTORY_CAPACITY])
    }

    /// The full history, oldest first, copied out of the ring into a
    /// contiguous buffer.
    pub fn as_vec(&self) -> Vec<HistorySample> {
        self.iter().copied().collect()
    }

    pub fn last(&self) -> Option<&HistorySample> {
        if self.len == 0 {
            None
        } else {
            Some(&self.samples[(self.head + self.len - 1) % HISTORY_CAPACITY])
        }
    }

    /// The most recent `n` samples (or fewer if the history is shorter),
    /// oldest first. Used when snapshotting only the last 5 entries (§3).
    pub fn last_n(&self, n: usize) -> Vec<HistorySample> {
        let skip = self.len.saturating_sub(n);
        self.iter().skip(skip).copied().collect()
    }

    pub fn is_monotone(&self) -> bool {
        self.iter().zip(self.iter().skip(1)).all(|(a, b)| a.day <= b.day)
    }
}

/// Last-step velocity recorded on a particle, m/s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub u: f64,
    pub v: f64,
}

/// A single particle in the ensemble (§3). Local-plane coordinates `(x, y)`
/// are kilometres relative to the engine's `(lon0, lat0)` reference; `depth`
/// is a fraction of a kilometre in `[0, 1.0]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleRecord {
    pub id: u64,
    pub active: bool,
    pub tracer_id: String,
    pub x: f64,
    pub y: f64,
    pub depth: f64,
    pub mass_bq: f64,
    pub initial_mass_bq: f64,
    pub age_days: f64,
    pub velocity: Velocity,
    pub history: History,
    pub release_day: f64,
    pub concentration_bq_m3: f64,
}

impl ParticleRecord {
    /// A freshly created, inactive pool slot.
    pub fn inactive(id: u64, tracer_id: impl Into<String>) -> Self {
        ParticleRecord {
            id,
            active: false,
            tracer_id: tracer_id.into(),
            x: 0.0,
            y: 0.0,
            depth: 0.0,
            mass_bq: 0.0,
            initial_mass_bq: 0.0,
            age_days: 0.0,
            velocity: Velocity::default(),
            history: History::new(),
            release_day: 0.0,
            concentration_bq_m3: 0.0,
        }
    }

    /// Activates this slot at `(x, y)` with `mass_bq` on `release_day`,
    /// recording the first history sample (§4.5.1).
    pub fn activate(&mut self, x: f64, y: f64, mass_bq: f64, release_day: f64) {
        self.active = true;
        self.x = x;
        self.y = y;
        self.depth = 0.0;
        self.mass_bq = mass_bq;
        self.initial_mass_bq = mass_bq;
        self.age_days = 0.0;
        self.velocity = Velocity::default();
        self.release_day = release_day;
        self.history = History::new();
        self.history.push(HistorySample {
            day: release_day,
            x,
            y,
            depth: 0.0,
        });
    }

    pub fn mass_threshold(&self) -> f64 {
        1e-3 * self.initial_mass_bq
    }

    pub fn below_mass_threshold(&self) -> bool {
        self.mass_bq < self.mass_threshold()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_ring_bounded() {
        let mut h = History::new();
        for i in 0..12 {
            h.push(HistorySample {
                day: i as f64,
                x: 0.0,
                y: 0.0,
                depth: 0.0,
            });
        }
        assert_eq!(h.len(), HISTORY_CAPACITY);
        assert!(h.is_monotone());
        // oldest entries (days 0..=3) were evicted
        assert_eq!(h.as_vec()[0].day, 4.0);
    }

    #[test]
    fn last_n_returns_most_recent() {
        let mut h = History::new();
        for i in 0..8 {
            h.push(HistorySample {
                day: i as f64,
                x: 0.0,
                y: 0.0,
                depth: 0.0,
            });
        }
        let last5 = h.last_n(5);
        assert_eq!(last5.len(), 5);
        assert_eq!(last5[0].day, 3.0);
        assert_eq!(last5[4].day, 7.0);
    }

    #[test]
    fn activation_sets_invariants() {
        let mut p = ParticleRecord::inactive(0, "Cs-137");
        p.activate(1.0, 2.0, 1_000.0, 5.0);
        assert!(p.active);
        assert_eq!(p.depth, 0.0);
        assert_eq!(p.age_days, 0.0);
        assert_eq!(p.history.len(), 1);
        assert!(!p.below_mass_threshold());
    }
}
