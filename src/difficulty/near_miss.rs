//! Near-Miss Detector
//!
//! Records close-but-not-touching proximity events, tracks a time-windowed
//! streak with hysteresis, and reports a per-minute rate.

use std::collections::VecDeque;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::vec2::Vec2;

/// Detector tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NearMissConfig {
    /// Largest distance that still counts (inclusive).
    pub near_miss_distance: f64,
    /// Distances at or below this are hits, not near misses.
    pub epsilon: f64,
    /// Seconds an event stays in the recent window.
    pub time_window: f64,
    /// Session history bound; oldest events are dropped.
    pub max_session_events: usize,
    /// Recent events needed to start a streak.
    pub streak_count: usize,
    /// A streak ends once recent events fall below this.
    pub streak_clear_below: usize,
}

impl Default for NearMissConfig {
    fn default() -> Self {
        Self {
            near_miss_distance: 1.5,
            epsilon: 1e-3,
            time_window: 3.0,
            max_session_events: 256,
            streak_count: 3,
            streak_clear_below: 2,
        }
    }
}

/// One recorded near miss.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NearMissEvent {
    /// Position of the probing object.
    pub position: Vec2,
    /// Distance to the target that qualified.
    pub distance: f64,
    /// Session time in seconds.
    pub timestamp: f64,
    /// What produced the probe.
    pub source_label: String,
}

/// Observations produced by the detector, drained by the session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NearMissSignal {
    /// A near miss was recorded.
    Recorded(NearMissEvent),
    /// Streak started (true) or ended (false).
    Streak(bool),
}

/// Near-miss history persisted across levels within a play session.
#[derive(Clone, Debug)]
pub struct NearMissDetector {
    config: NearMissConfig,
    session: VecDeque<NearMissEvent>,
    recent: VecDeque<NearMissEvent>,
    total_count: u64,
    nearest_distance: Option<f64>,
    is_streak: bool,
    signals: Vec<NearMissSignal>,
}

impl NearMissDetector {
    /// Create an empty detector.
    pub fn new(config: NearMissConfig) -> Self {
        Self {
            config,
            session: VecDeque::new(),
            recent: VecDeque::new(),
            total_count: 0,
            nearest_distance: None,
            is_streak: false,
            signals: Vec::new(),
        }
    }

    /// True if `distance` is a near miss: `epsilon < distance <= near_miss_distance`.
    #[inline]
    pub fn qualifies(&self, distance: f64) -> bool {
        distance > self.config.epsilon && distance <= self.config.near_miss_distance
    }

    /// Check one target and record if it qualifies.
    pub fn check_near_miss(&mut self, object: Vec2, target: Vec2, label: &str, timestamp: f64) -> bool {
        let distance = object.distance(target);
        if !self.qualifies(distance) {
            return false;
        }
        self.record(object, distance, label, timestamp);
        true
    }

    /// Record only the closest qualifying target. Ties keep the earliest.
    pub fn check_near_misses(&mut self, object: Vec2, targets: &[Vec2], label: &str, timestamp: f64) -> bool {
        let mut best: Option<f64> = None;
        for target in targets {
            let distance = object.distance(*target);
            if self.qualifies(distance) && best.is_none_or(|b| distance < b) {
                best = Some(distance);
            }
        }
        match best {
            Some(distance) => {
                self.record(object, distance, label, timestamp);
                true
            }
            None => false,
        }
    }

    fn record(&mut self, position: Vec2, distance: f64, label: &str, timestamp: f64) {
        let event = NearMissEvent {
            position,
            distance,
            timestamp,
            source_label: label.to_string(),
        };

        self.total_count += 1;
        if self.nearest_distance.is_none_or(|d| distance < d) {
            self.nearest_distance = Some(distance);
        }

        if self.config.max_session_events > 0 {
            if self.session.len() >= self.config.max_session_events {
                self.session.pop_front();
            }
            self.session.push_back(event.clone());
        }
        self.recent.push_back(event.clone());
        self.signals.push(NearMissSignal::Recorded(event));

        debug!(distance, timestamp, label, "Near miss recorded");

        self.prune(timestamp);
        if !self.is_streak && self.recent.len() >= self.config.streak_count {
            self.is_streak = true;
            self.signals.push(NearMissSignal::Streak(true));
        }
    }

    /// Age out recent events relative to `now`.
    pub fn update(&mut self, now: f64) {
        self.prune(now);
    }

    fn prune(&mut self, now: f64) {
        let cutoff = now - self.config.time_window;
        while self.recent.front().is_some_and(|e| e.timestamp < cutoff) {
            self.recent.pop_front();
        }
        if self.is_streak && self.recent.len() < self.config.streak_clear_below {
            self.is_streak = false;
            self.signals.push(NearMissSignal::Streak(false));
        }
    }

    /// Events per minute across the session history.
    ///
    /// 0 with fewer than two events or a zero time span.
    pub fn near_miss_rate_per_minute(&self) -> f64 {
        let (Some(first), Some(last)) = (self.session.front(), self.session.back()) else {
            return 0.0;
        };
        if self.session.len() < 2 {
            return 0.0;
        }
        let span = last.timestamp - first.timestamp;
        if span <= 0.0 {
            return 0.0;
        }
        self.session.len() as f64 / (span / 60.0)
    }

    /// Near misses ever recorded.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Closest near miss seen.
    pub fn nearest_distance(&self) -> Option<f64> {
        self.nearest_distance
    }

    /// True while a streak is active.
    pub fn is_near_miss_streak(&self) -> bool {
        self.is_streak
    }

    /// Events in the recent window.
    pub fn recent_count(&self) -> usize {
        self.recent.len()
    }

    /// Bounded session history, oldest first.
    pub fn session_events(&self) -> impl Iterator<Item = &NearMissEvent> {
        self.session.iter()
    }

    /// Forget everything.
    pub fn reset_session(&mut self) {
        self.session.clear();
        self.recent.clear();
        self.total_count = 0;
        self.nearest_distance = None;
        self.is_streak = false;
    }

    /// Tuning in use.
    pub fn config(&self) -> &NearMissConfig {
        &self.config
    }

    /// Drain pending signals.
    pub fn take_signals(&mut self) -> Vec<NearMissSignal> {
        std::mem::take(&mut self.signals)
    }
}
