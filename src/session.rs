//! Play Session
//!
//! Owns everything that outlives a single level: engine config, the
//! outcome tracker, near-miss detector and adaptive coordinator, the event
//! bus, and the replay recorder for the level in progress.
//!
//! Per update the session runs one level tick, feeds placement probes to
//! the near-miss detector, records the outcome when the level ends, then
//! advances the adaptive cadence. Every resulting event is published in
//! that order.

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::difficulty::adaptive::AdaptiveCoordinator;
use crate::difficulty::near_miss::{NearMissDetector, NearMissSignal};
use crate::difficulty::outcome::{OutcomeSignal, OutcomeTracker};
use crate::game::events::{EventBus, EventObserver, GameEvent, GameEventData, LevelFailReason, SubscriptionId};
use crate::game::input::TapInput;
use crate::game::level::LevelDef;
use crate::game::state::{LevelPhase, LevelState};
use crate::game::tick::{tick, TickResult};
use crate::levelgen::builder::generate_level_with;
use crate::levelgen::validator::validate_level_with;
use crate::replay::record::{ReplayRecord, ReplayRecorder};
use crate::TICK_DT;

/// Session errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// No level has been started.
    #[error("No active level")]
    NoActiveLevel,

    /// A level is still being played.
    #[error("Level in progress")]
    LevelInProgress,

    /// The current level already ended.
    #[error("Level already ended")]
    LevelEnded,

    /// Level failed validation.
    #[error("Invalid level: {}", .0.join("; "))]
    InvalidLevel(Vec<String>),
}

/// Cross-level play context.
pub struct PlaySession {
    config: EngineConfig,
    outcome: OutcomeTracker,
    near_miss: NearMissDetector,
    adaptive: AdaptiveCoordinator,
    bus: EventBus,
    level: Option<LevelState>,
    recorder: Option<ReplayRecorder>,
    last_record: Option<ReplayRecord>,
    /// Unscaled session seconds at the start of the current level.
    level_clock_base: f64,
    levels_played: u32,
}

impl PlaySession {
    /// Create a session with fresh trackers.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            outcome: OutcomeTracker::new(config.outcome.clone()),
            near_miss: NearMissDetector::new(config.near_miss.clone()),
            adaptive: AdaptiveCoordinator::new(config.adaptive.clone()),
            bus: EventBus::new(),
            level: None,
            recorder: None,
            last_record: None,
            level_clock_base: 0.0,
            levels_played: 0,
            config,
        }
    }

    /// Register an event observer.
    pub fn subscribe(&mut self, observer: impl EventObserver + 'static) -> SubscriptionId {
        self.bus.subscribe(observer)
    }

    /// Remove an event observer.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Start a level with the current adaptive snapshot frozen into it.
    pub fn start_level(&mut self, def: &LevelDef) -> Result<&LevelState, SessionError> {
        if self.level.as_ref().is_some_and(|l| !l.is_ended()) {
            return Err(SessionError::LevelInProgress);
        }
        let validation = validate_level_with(def, &self.config.simulation.limits);
        if !validation.is_valid {
            warn!(level = def.level_id, errors = ?validation.errors, "Level rejected");
            return Err(SessionError::InvalidLevel(validation.errors));
        }
        for warning in &validation.warnings {
            warn!(level = def.level_id, %warning, "Level warning");
        }

        if let Some(previous) = &self.level {
            self.level_clock_base += previous.elapsed();
        }

        let snapshot = self.adaptive.snapshot();
        let mut state = LevelState::new(def, snapshot, &self.config.simulation);
        self.recorder = Some(ReplayRecorder::new(&state, &self.config.simulation));
        self.last_record = None;

        info!(
            level = def.level_id,
            seed = state.effective.seed,
            rating = validation.difficulty_rating,
            belt = snapshot.belt_speed,
            spawn = snapshot.spawn_rate,
            "Level started"
        );

        let events = state.take_events();
        self.bus.publish_all(&events);
        Ok(self.level.insert(state))
    }

    /// Generate level `level_number` from the current difficulty and start it.
    pub fn start_generated(&mut self, level_number: u32) -> Result<&LevelState, SessionError> {
        let generated = generate_level_with(
            self.outcome.difficulty_multiplier(),
            level_number,
            None,
            &self.config.simulation.limits,
        );
        self.start_level(&generated.def)
    }

    /// Run one tick of the current level with these inputs.
    ///
    /// The returned result carries every event published this update,
    /// session-level ones included.
    pub fn update(&mut self, inputs: &[TapInput]) -> Result<TickResult, SessionError> {
        let state = self.level.as_mut().ok_or(SessionError::NoActiveLevel)?;
        if state.is_ended() {
            return Err(SessionError::LevelEnded);
        }

        // 1. Record and tick
        if let Some(recorder) = self.recorder.as_mut() {
            for input in inputs {
                recorder.record_input(state.tick + 1, *input);
            }
        }
        let mut result = tick(state, inputs);
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.observe(state);
        }

        // 2. Near misses on the session clock
        let now = self.level_clock_base + state.elapsed();
        for probe in &result.probes {
            self.near_miss.check_near_misses(
                probe.position,
                &probe.targets,
                &probe.label,
                self.level_clock_base + probe.timestamp,
            );
        }
        self.near_miss.update(now);
        let tick_number = state.tick;
        for signal in self.near_miss.take_signals() {
            let data = match signal {
                NearMissSignal::Recorded(event) => GameEventData::NearMiss(event),
                NearMissSignal::Streak(active) => GameEventData::NearMissStreak { active },
            };
            result.events.push(GameEvent::new(tick_number, data));
        }

        // 3. Outcome
        if result.level_ended() {
            self.complete_level(&mut result.events);
        }

        // 4. Adaptive cadence
        if self.adaptive.update(TICK_DT, &self.outcome, &self.near_miss) {
            result.events.push(GameEvent::new(
                tick_number,
                GameEventData::MultipliersAdjusted {
                    belt_speed: self.adaptive.belt_speed(),
                    spawn_rate: self.adaptive.spawn_rate(),
                    obstacle_density: self.adaptive.obstacle_density(),
                },
            ));
        }

        self.bus.publish_all(&result.events);
        Ok(result)
    }

    /// Abandon the current level (counts as a loss) and start it again.
    pub fn restart_level(&mut self) -> Result<&LevelState, SessionError> {
        let def = self
            .level
            .as_ref()
            .map(|l| l.level.clone())
            .ok_or(SessionError::NoActiveLevel)?;
        if self.level.as_ref().is_some_and(|l| !l.is_ended()) {
            self.abandon_level()?;
        }
        self.start_level(&def)
    }

    /// End the current level as a failure.
    pub fn abandon_level(&mut self) -> Result<(), SessionError> {
        let state = self.level.as_mut().ok_or(SessionError::NoActiveLevel)?;
        if state.is_ended() {
            return Err(SessionError::LevelEnded);
        }
        state.finish(LevelPhase::Failed(LevelFailReason::Abandoned));
        let mut events = state.take_events();
        self.complete_level(&mut events);
        self.bus.publish_all(&events);
        Ok(())
    }

    /// Take the replay record of the last ended level.
    pub fn finish_replay(&mut self) -> Option<ReplayRecord> {
        self.last_record.take()
    }

    /// Toggle adaptive difficulty. Takes effect at the next level start.
    pub fn set_adaptive_enabled(&mut self, enabled: bool) {
        self.adaptive.set_enabled(enabled);
        info!(enabled, "Adaptive difficulty toggled");
    }

    /// Record the outcome, seal the replay, and turn tracker signals into events.
    fn complete_level(&mut self, events: &mut Vec<GameEvent>) {
        let Some(state) = self.level.as_ref() else {
            return;
        };
        let won = state.is_won();
        let tick_number = state.tick;

        self.levels_played += 1;
        self.outcome.record_result(won);
        if let Some(recorder) = self.recorder.take() {
            self.last_record = Some(recorder.finish(state));
        }

        info!(
            level = state.level.level_id,
            won,
            ticks = state.tick,
            progress = state.progress,
            moves = state.moves,
            chain = state.max_chain_depth,
            hash = %hex::encode(&state.compute_hash()[..8]),
            "Level ended"
        );

        for signal in self.outcome.take_signals() {
            let data = match signal {
                OutcomeSignal::DifficultyChanged(multiplier) => GameEventData::DifficultyChanged { multiplier },
                OutcomeSignal::SpikeDetected(spiking) => {
                    self.adaptive.on_spike(spiking);
                    GameEventData::SpikeDetected { spiking }
                }
            };
            events.push(GameEvent::new(tick_number, data));
        }
    }

    /// Current or last level.
    pub fn level(&self) -> Option<&LevelState> {
        self.level.as_ref()
    }

    /// Outcome tracker.
    pub fn outcome(&self) -> &OutcomeTracker {
        &self.outcome
    }

    /// Near-miss detector.
    pub fn near_miss(&self) -> &NearMissDetector {
        &self.near_miss
    }

    /// Adaptive coordinator.
    pub fn adaptive(&self) -> &AdaptiveCoordinator {
        &self.adaptive
    }

    /// Engine config.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Unscaled seconds played this session.
    pub fn clock(&self) -> f64 {
        self.level_clock_base + self.level.as_ref().map_or(0.0, LevelState::elapsed)
    }

    /// Levels finished (won, failed or abandoned).
    pub fn levels_played(&self) -> u32 {
        self.levels_played
    }
}

// ===== TESTS =====
