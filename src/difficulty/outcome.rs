//! Outcome Tracker
//!
//! Sliding-window win/loss history with streak detection and a clamped
//! difficulty multiplier.

use std::collections::VecDeque;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Tracker tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeConfig {
    /// Results kept in the window.
    pub window_size: usize,
    /// Consecutive failures that flag a spike.
    pub spike_threshold: u32,
    /// Consecutive wins that trigger recovery.
    pub recovery_threshold: u32,
    /// Multiplier change on spike/recovery (half of it for drift).
    pub difficulty_step: f64,
    /// Lower clamp.
    pub min_difficulty: f64,
    /// Upper clamp.
    pub max_difficulty: f64,
    /// New-player starting multiplier, restored by `reset_stats`.
    pub base_difficulty: f64,
    /// Generic neutral multiplier used as the recovery baseline.
    pub neutral_difficulty: f64,
    /// Win rate above which the multiplier drifts up.
    pub high_win_rate: f64,
    /// Win rate below which the multiplier drifts down.
    pub low_win_rate: f64,
}

impl Default for OutcomeConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            spike_threshold: 3,
            recovery_threshold: 3,
            difficulty_step: 0.1,
            min_difficulty: 0.3,
            max_difficulty: 2.0,
            base_difficulty: 0.8,
            neutral_difficulty: 1.0,
            high_win_rate: 0.7,
            low_win_rate: 0.3,
        }
    }
}

/// Observations produced by the tracker, drained by the session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum OutcomeSignal {
    /// Multiplier changed to this value.
    DifficultyChanged(f64),
    /// Spike entered (true) or cleared by recovery (false).
    SpikeDetected(bool),
}

/// Win/loss history persisted across levels within a play session.
#[derive(Clone, Debug)]
pub struct OutcomeTracker {
    config: OutcomeConfig,
    window: VecDeque<bool>,
    win_rate: f64,
    consecutive_wins: u32,
    consecutive_failures: u32,
    difficulty_multiplier: f64,
    is_spiking: bool,
    is_recovering: bool,
    total_recorded: u64,
    signals: Vec<OutcomeSignal>,
}

impl OutcomeTracker {
    /// Create a tracker at the new-player baseline.
    pub fn new(config: OutcomeConfig) -> Self {
        let base = clamp_multiplier(&config, config.base_difficulty);
        Self {
            window: VecDeque::with_capacity(config.window_size),
            win_rate: 0.0,
            consecutive_wins: 0,
            consecutive_failures: 0,
            difficulty_multiplier: base,
            is_spiking: false,
            is_recovering: false,
            total_recorded: 0,
            signals: Vec::new(),
            config,
        }
    }

    /// Record a level result and run pattern detection.
    pub fn record_result(&mut self, is_win: bool) {
        if self.config.window_size > 0 {
            if self.window.len() >= self.config.window_size {
                self.window.pop_front();
            }
            self.window.push_back(is_win);
        }
        self.total_recorded += 1;

        let wins = self.window.iter().filter(|&&w| w).count();
        self.win_rate = if self.window.is_empty() {
            0.0
        } else {
            wins as f64 / self.window.len() as f64
        };

        if is_win {
            self.consecutive_wins += 1;
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
            self.consecutive_wins = 0;
            self.is_recovering = false;
        }

        debug!(
            is_win,
            win_rate = self.win_rate,
            wins = self.consecutive_wins,
            failures = self.consecutive_failures,
            "Outcome recorded"
        );

        self.detect_patterns();
    }

    fn detect_patterns(&mut self) {
        let step = self.config.difficulty_step;

        if self.consecutive_failures >= self.config.spike_threshold && !self.is_spiking {
            self.is_spiking = true;
            self.is_recovering = false;
            self.set_multiplier(self.difficulty_multiplier - step);
            self.signals.push(OutcomeSignal::SpikeDetected(true));
            info!(multiplier = self.difficulty_multiplier, "Difficulty spike detected");
        } else if self.consecutive_wins >= self.config.recovery_threshold
            && (self.is_spiking || self.difficulty_multiplier < self.config.neutral_difficulty)
        {
            self.is_spiking = false;
            self.is_recovering = true;
            self.set_multiplier(self.difficulty_multiplier + step);
            self.signals.push(OutcomeSignal::SpikeDetected(false));
            info!(multiplier = self.difficulty_multiplier, "Recovery detected");
        } else if self.win_rate > self.config.high_win_rate {
            self.set_multiplier(self.difficulty_multiplier + step * 0.5);
        } else if self.win_rate < self.config.low_win_rate {
            self.set_multiplier(self.difficulty_multiplier - step * 0.5);
        }
    }

    fn set_multiplier(&mut self, value: f64) {
        let clamped = clamp_multiplier(&self.config, value);
        if clamped != self.difficulty_multiplier {
            self.difficulty_multiplier = clamped;
            self.signals.push(OutcomeSignal::DifficultyChanged(clamped));
        }
    }

    /// Restore the window, streaks and multiplier to the configured base.
    pub fn reset_stats(&mut self) {
        self.window.clear();
        self.win_rate = 0.0;
        self.consecutive_wins = 0;
        self.consecutive_failures = 0;
        self.is_spiking = false;
        self.is_recovering = false;
        self.total_recorded = 0;
        self.set_multiplier(self.config.base_difficulty);
    }

    /// Wins over window length (0 with an empty window).
    pub fn win_rate(&self) -> f64 {
        self.win_rate
    }

    /// Signed distance of the win rate from a target.
    pub fn win_rate_deviation(&self, target: f64) -> f64 {
        self.win_rate - target
    }

    /// Current consecutive wins.
    pub fn consecutive_wins(&self) -> u32 {
        self.consecutive_wins
    }

    /// Current consecutive failures.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Current clamped multiplier.
    pub fn difficulty_multiplier(&self) -> f64 {
        self.difficulty_multiplier
    }

    /// True while a spike is flagged.
    pub fn is_spiking(&self) -> bool {
        self.is_spiking
    }

    /// True after recovery until the next failure.
    pub fn is_recovering(&self) -> bool {
        self.is_recovering
    }

    /// Results in the window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = bool> + '_ {
        self.window.iter().copied()
    }

    /// Results recorded since the last reset.
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    /// Tuning in use.
    pub fn config(&self) -> &OutcomeConfig {
        &self.config
    }

    /// Drain pending signals.
    pub fn take_signals(&mut self) -> Vec<OutcomeSignal> {
        std::mem::take(&mut self.signals)
    }
}

fn clamp_multiplier(config: &OutcomeConfig, value: f64) -> f64 {
    value.clamp(config.min_difficulty, config.max_difficulty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_spike_after_three_failures() {
        let mut tracker = OutcomeTracker::new(OutcomeConfig::default());
        tracker.record_result(false);
        tracker.record_result(false);
        let before = tracker.difficulty_multiplier();
        tracker.take_signals();

        tracker.record_result(false);
        assert!(tracker.is_spiking());
        let after = tracker.difficulty_multiplier();
        assert!((after - (before - 0.1)).abs() < EPS);
        assert_eq!(
            tracker.take_signals(),
            vec![
                OutcomeSignal::DifficultyChanged(after),
                OutcomeSignal::SpikeDetected(true),
            ]
        );

        // One win breaks the failure streak but does not clear the spike.
        tracker.record_result(true);
        assert_eq!(tracker.consecutive_failures(), 0);
        assert!(tracker.is_spiking());

        tracker.record_result(true);
        assert!(tracker.is_spiking());
        tracker.record_result(true);
        assert!(!tracker.is_spiking());
        assert!(tracker.is_recovering());
        assert!(tracker.take_signals().contains(&OutcomeSignal::SpikeDetected(false)));
    }

    #[test]
    fn test_win_rate_deviation() {
        let mut tracker = OutcomeTracker::new(OutcomeConfig::default());
        for result in [true, false, true, true] {
            tracker.record_result(result);
        }
        assert!((tracker.win_rate() - 0.75).abs() < EPS);
        assert!((tracker.win_rate_deviation(0.7) - 0.05).abs() < EPS);
        assert!((tracker.win_rate_deviation(0.85) + 0.1).abs() < EPS);
    }

    #[test]
    fn test_spike_not_reflagged() {
        let mut tracker = OutcomeTracker::new(OutcomeConfig::default());
        for _ in 0..3 {
            tracker.record_result(false);
        }
        tracker.take_signals();
        tracker.record_result(false);
        assert!(!tracker.take_signals().contains(&OutcomeSignal::SpikeDetected(true)));
    }

    #[test]
    fn test_spike_clamps_at_min() {
        let mut tracker = OutcomeTracker::new(OutcomeConfig {
            base_difficulty: 0.3,
            ..OutcomeConfig::default()
        });
        for _ in 0..3 {
            tracker.record_result(false);
        }
        assert!(tracker.is_spiking());
        assert_eq!(tracker.difficulty_multiplier(), 0.3);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut tracker = OutcomeTracker::new(OutcomeConfig {
            window_size: 4,
            ..OutcomeConfig::default()
        });
        for _ in 0..4 {
            tracker.record_result(false);
        }
        for _ in 0..2 {
            tracker.record_result(true);
        }
        assert_eq!(tracker.window().collect::<Vec<_>>(), vec![false, false, true, true]);
        assert_eq!(tracker.win_rate(), 0.5);
        assert_eq!(tracker.consecutive_wins(), 2);
        assert_eq!(tracker.total_recorded(), 6);
    }

    #[test]
    fn test_drift_up_on_high_win_rate() {
        let mut tracker = OutcomeTracker::new(OutcomeConfig {
            base_difficulty: 1.0,
            recovery_threshold: 100,
            ..OutcomeConfig::default()
        });
        tracker.record_result(true);
        assert!((tracker.difficulty_multiplier() - 1.05).abs() < EPS);
    }

    #[test]
    fn test_recovery_below_neutral_without_spike() {
        let mut tracker = OutcomeTracker::new(OutcomeConfig::default());
        tracker.record_result(true);
        tracker.record_result(true);
        let before = tracker.difficulty_multiplier();
        tracker.record_result(true);
        assert!(tracker.is_recovering());
        assert!((tracker.difficulty_multiplier() - (before + 0.1)).abs() < EPS);
    }

    #[test]
    fn test_reset_restores_base() {
        let mut tracker = OutcomeTracker::new(OutcomeConfig::default());
        for _ in 0..6 {
            tracker.record_result(true);
        }
        assert!(tracker.difficulty_multiplier() > 0.8);
        tracker.reset_stats();
        assert_eq!(tracker.difficulty_multiplier(), 0.8);
        assert_eq!(tracker.window().count(), 0);
        assert_eq!(tracker.consecutive_wins(), 0);
        assert!(!tracker.is_spiking());
    }

    proptest! {
        #[test]
        fn prop_multiplier_stays_clamped(results in proptest::collection::vec(any::<bool>(), 0..200)) {
            let config = OutcomeConfig::default();
            let mut tracker = OutcomeTracker::new(config.clone());
            for r in results {
                tracker.record_result(r);
                let m = tracker.difficulty_multiplier();
                prop_assert!(m >= config.min_difficulty && m <= config.max_difficulty);
                prop_assert!(tracker.consecutive_wins() == 0 || tracker.consecutive_failures() == 0);
            }
        }
    }
}
