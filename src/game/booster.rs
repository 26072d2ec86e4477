//! Boosters
//!
//! Timed effects driven by [`Scheduler`]. A booster that scales simulation
//! time expires on the unscaled level clock, never on the clock it slows.

use serde::{Deserialize, Serialize};

use crate::core::schedule::Scheduler;

/// Booster types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BoosterKind {
    /// Slows the belt and spawn timer.
    SlowMotion,
}

/// Booster tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterConfig {
    /// Time scale applied while slow motion is active.
    pub slow_motion_scale: f64,
    /// Slow-motion duration in unscaled seconds.
    pub slow_motion_duration: f64,
}

impl Default for BoosterConfig {
    fn default() -> Self {
        Self {
            slow_motion_scale: 0.5,
            slow_motion_duration: 5.0,
        }
    }
}

/// Active booster timers for one level.
#[derive(Clone, Debug, Default)]
pub struct BoosterTimers {
    config: BoosterConfig,
    expiries: Scheduler<BoosterKind>,
    active: Vec<BoosterKind>,
}

impl BoosterTimers {
    /// Create with no active boosters.
    pub fn new(config: BoosterConfig) -> Self {
        Self {
            config,
            expiries: Scheduler::new(),
            active: Vec::new(),
        }
    }

    /// Start a booster at unscaled time `now`. False if already running.
    pub fn activate(&mut self, kind: BoosterKind, now: f64) -> bool {
        if self.is_active(kind) {
            return false;
        }
        let duration = match kind {
            BoosterKind::SlowMotion => self.config.slow_motion_duration,
        };
        self.expiries.schedule(now + duration, kind);
        self.active.push(kind);
        true
    }

    /// Expire boosters whose unscaled deadline has passed.
    pub fn poll(&mut self, now: f64) -> Vec<BoosterKind> {
        let expired = self.expiries.poll(now);
        self.active.retain(|k| !expired.contains(k));
        expired
    }

    /// End everything immediately (level complete/restart).
    pub fn force_end_all(&mut self) -> Vec<BoosterKind> {
        self.active.clear();
        self.expiries.drain_all()
    }

    /// True while `kind` is running.
    pub fn is_active(&self, kind: BoosterKind) -> bool {
        self.active.contains(&kind)
    }

    /// Multiplier for simulation dt.
    pub fn time_scale(&self) -> f64 {
        if self.is_active(BoosterKind::SlowMotion) {
            self.config.slow_motion_scale
        } else {
            1.0
        }
    }

    /// Active boosters in activation order.
    pub fn active(&self) -> &[BoosterKind] {
        &self.active
    }
}
