//! Playback over a recorded snapshot list, with the interpolation rules
//! from `SPEC_FULL.md` §4.6.

use crate::bake::recorder::{ParticleSnapshot, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Playing,
    Paused,
}

/// One interpolated frame, emitted by `seek`/`advance_wallclock`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub day: f64,
    pub particles: Vec<ParticleSnapshot>,
}

/// Holds a recorded snapshot list and replays it with linear (or
/// log-linear, for concentration) interpolation between frames.
pub struct Player {
    snapshots: Vec<Snapshot>,
    current_day: f64,
    playback_speed: f64,
    state: PlayerState,
}

impl Player {
    pub fn new(snapshots: Vec<Snapshot>) -> Self {
        let current_day = snapshots.first().map(|s| s.day).unwrap_or(0.0);
        Player {
            snapshots,
            current_day,
            playback_speed: 1.0,
            state: PlayerState::Idle,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn current_day(&self) -> f64 {
        self.current_day
    }

    pub fn set_playback_speed(&mut self, speed: f64) {
        self.playback_speed = speed;
    }

    pub fn play(&mut self) {
        if self.state != PlayerState::Playing {
            self.state = PlayerState::Playing;
        }
    }

    pub fn pause(&mut self) {
        self.state = PlayerState::Paused;
    }

    /// Advances `current_day` by `wall_seconds * playback_speed`, clamping
    /// at the last snapshot's day and pausing there. Returns `None` when not
    /// `Playing`.
    pub fn advance_wallclock(&mut self, wall_seconds: f64) -> Option<Frame> {
        if self.state != PlayerState::Playing {
            return None;
        }
        let last_day = self.snapshots.last()?.day;
        self.current_day += wall_seconds * self.playback_speed;
        if self.current_day >= last_day {
            self.current_day = last_day;
            self.state = PlayerState::Paused;
        }
        Some(self.seek(self.current_day))
    }

    /// Locates the bracketing interval `(S_i, S_{i+1})` and interpolates the
    /// ensemble at `day` per §4.6's field-by-field rules.
    pub fn seek(&mut self, day: f64) -> Frame {
        self.current_day = day;
        if self.snapshots.is_empty() {
            return Frame { day, particles: Vec::new() };
        }
        if day <= self.snapshots[0].day {
            return Frame {
                day: self.snapshots[0].day,
                particles: self.snapshots[0].particles.clone(),
            };
        }
        let last = self.snapshots.len() - 1;
        if day >= self.snapshots[last].day {
            return Frame {
                day: self.snapshots[last].day,
                particles: self.snapshots[last].particles.clone(),
            };
        }

        let idx = self
            .snapshots
            .windows(2)
            .position(|w| w[0].day <= day && day <= w[1].day)
            .expect("day falls within the snapshot span");
        let (s_i, s_j) = (&self.snapshots[idx], &self.snapshots[idx + 1]);
        let span = s_j.day - s_i.day;
        let t = if span.abs() < 1e-12 { 0.0 } else { (day - s_i.day) / span };

        let n = s_i.particles.len().min(s_j.particles.len());
        let mut particles = Vec::with_capacity(n);
        for k in 0..n {
            particles.push(interpolate_particle(&s_i.particles[k], &s_j.particles[k], t));
        }
        Frame { day, particles }
    }
}

fn interpolate_particle(a: &ParticleSnapshot, b: &ParticleSnapshot, t: f64) -> ParticleSnapshot {
    let lerp = |x: f64, y: f64| x + (y - x) * t;
    let concentration = if a.concentration_bq_m3 > 0.0 && b.concentration_bq_m3 > 0.0 {
        let log_a = a.concentration_bq_m3.ln();
        let log_b = b.concentration_bq_m3.ln();
        (log_a + (log_b - log_a) * t).exp()
    } else {
        lerp(a.concentration_bq_m3, b.concentration_bq_m3)
    };
    let history = if t < 0.5 { a.history.clone() } else { b.history.clone() };

    ParticleSnapshot {
        id: a.id,
        active: if t < 0.5 { a.active } else { b.active },
        x: lerp(a.x, b.x),
        y: lerp(a.y, b.y),
        depth: lerp(a.depth, b.depth),
        concentration_bq_m3: concentration,
        mass_bq: lerp(a.mass_bq, b.mass_bq),
        age_days: lerp(a.age_days, b.age_days),
        history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineStats;
    use crate::particle::HistorySample;

    fn snapshot(day: f64, x: f64, concentration: f64) -> Snapshot {
        let particle = ParticleSnapshot {
            id: 0,
            active: true,
            x,
            y: 0.0,
            depth: 0.1,
            concentration_bq_m3: concentration,
            mass_bq: 100.0,
            age_days: day,
            history: vec![HistorySample { day, x, y: 0.0, depth: 0.1 }],
        };
        Snapshot {
            day,
            particle_count: 1,
            stats: EngineStats::new(),
            particles: vec![particle],
        }
    }

    #[test]
    fn seek_interpolates_linearly_for_position() {
        let mut player = Player::new(vec![snapshot(0.0, 0.0, 1.0), snapshot(10.0, 100.0, 1.0)]);
        let frame = player.seek(5.0);
        assert!((frame.particles[0].x - 50.0).abs() < 1e-9);
    }

    #[test]
    fn seek_clamps_to_snapshot_bounds() {
        let mut player = Player::new(vec![snapshot(0.0, 0.0, 1.0), snapshot(10.0, 100.0, 1.0)]);
        assert_eq!(player.seek(-5.0).particles[0].x, 0.0);
        assert_eq!(player.seek(50.0).particles[0].x, 100.0);
    }

    #[test]
    fn seek_reproduces_stored_snapshot_exactly_at_its_day() {
        let mut player = Player::new(vec![snapshot(0.0, 10.0, 2.0), snapshot(5.0, 20.0, 4.0)]);
        let frame = player.seek(5.0);
        assert_eq!(frame.particles[0].x, 20.0);
        assert_eq!(frame.particles[0].concentration_bq_m3, 4.0);
    }

    #[test]
    fn concentration_interpolates_log_linearly_when_positive() {
        let mut player = Player::new(vec![snapshot(0.0, 0.0, 1.0), snapshot(10.0, 0.0, 100.0)]);
        let frame = player.seek(5.0);
        // log-linear midpoint of 1 and 100 is sqrt(100) = 10
        assert!((frame.particles[0].concentration_bq_m3 - 10.0).abs() < 1e-6);
    }

    #[test]
    fn history_snaps_to_nearer_endpoint() {
        let mut player = Player::new(vec![snapshot(0.0, 0.0, 1.0), snapshot(10.0, 100.0, 1.0)]);
        let early = player.seek(2.0);
        assert_eq!(early.particles[0].history[0].day, 0.0);
        let late = player.seek(8.0);
        assert_eq!(late.particles[0].history[0].day, 10.0);
    }
}
