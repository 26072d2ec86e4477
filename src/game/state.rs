//! Level State
//!
//! Everything one level attempt owns: RNG, board, pockets, belt, boosters
//! and progress. Created at level start, discarded at win, fail or restart.

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::core::hash::{compute_state_hash, StateHash};
use crate::core::rng::SeededRandom;
use crate::core::vec2::Vec2;
use crate::difficulty::adaptive::AdaptiveSnapshot;
use crate::game::board::ClusterBoard;
use crate::game::booster::BoosterTimers;
use crate::game::conveyor::{ConveyorFeed, FeedParams};
use crate::game::events::{GameEvent, GameEventData, LevelFailReason};
use crate::game::level::LevelDef;
use crate::game::pocket::PocketBank;
use crate::TICK_DT;

// =============================================================================
// LEVEL PHASE
// =============================================================================

/// Where the attempt stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelPhase {
    /// Accepting input.
    #[default]
    Playing,
    /// Target reached.
    Won,
    /// Attempt lost.
    Failed(LevelFailReason),
}

impl LevelPhase {
    /// True once the attempt is over.
    pub fn is_ended(self) -> bool {
        !matches!(self, LevelPhase::Playing)
    }

    fn code(self) -> u8 {
        match self {
            LevelPhase::Playing => 0,
            LevelPhase::Won => 1,
            LevelPhase::Failed(LevelFailReason::PocketOverflow) => 2,
            LevelPhase::Failed(LevelFailReason::OutOfItems) => 3,
            LevelPhase::Failed(LevelFailReason::BoardFull) => 4,
            LevelPhase::Failed(LevelFailReason::Abandoned) => 5,
        }
    }
}

/// A placement that cleared nothing, to be checked against the near-miss
/// detector by the session.
#[derive(Clone, Debug, PartialEq)]
pub struct NearMissProbe {
    /// Placed cell centre.
    pub position: Vec2,
    /// Same-type cells not connected to the placement.
    pub targets: Vec<Vec2>,
    /// Probe source.
    pub label: String,
    /// Unscaled seconds since level start.
    pub timestamp: f64,
}

// =============================================================================
// LEVEL STATE
// =============================================================================

/// Complete state of one level attempt.
#[derive(Clone, Debug)]
pub struct LevelState {
    /// Ticks simulated so far.
    pub tick: u32,

    /// Current phase.
    pub phase: LevelPhase,

    /// Level as supplied.
    pub level: LevelDef,

    /// Level after the frozen adaptive snapshot was applied.
    pub effective: LevelDef,

    /// Adaptive values frozen for this attempt.
    pub snapshot: AdaptiveSnapshot,

    /// Deterministic RNG, seeded from the level.
    pub rng: SeededRandom,

    /// Placement grid.
    pub board: ClusterBoard,

    /// Item holding stacks.
    pub pockets: PocketBank,

    /// Spawner and belt.
    pub feed: ConveyorFeed,

    /// Timed effects.
    pub boosters: BoosterTimers,

    /// Gravity after clears.
    pub settle: bool,

    /// Cells cleared so far.
    pub progress: u32,

    /// Placements made.
    pub moves: u32,

    /// Deepest chain so far.
    pub max_chain_depth: u32,

    /// Scaled simulation seconds (slowed by boosters).
    pub sim_time: f64,

    pending_events: Vec<GameEvent>,
    pending_probes: Vec<NearMissProbe>,
}

impl LevelState {
    /// Build the attempt: apply the snapshot, seed obstacles, set up the
    /// pockets and belt.
    pub fn new(level: &LevelDef, snapshot: AdaptiveSnapshot, sim: &SimulationConfig) -> Self {
        let effective = level.with_adaptive(&snapshot, &sim.limits);
        let mut rng = SeededRandom::new(effective.seed);

        let mut board = ClusterBoard::new(
            effective.board_width,
            effective.board_height,
            effective.min_cluster,
            sim.catalog.clone(),
        );
        seed_obstacles(&mut board, &mut rng, effective.obstacle_count(), sim.settle);

        let pockets = PocketBank::new(effective.pocket_count, effective.pocket_capacity);
        let feed = ConveyorFeed::new(&FeedParams {
            spawn_interval: effective.spawn_interval,
            belt_speed: effective.conveyor_speed,
            belt_length: sim.belt_length,
            queue_capacity: sim.queue_capacity,
            max_spawn: effective.max_spawn,
            item_type_count: effective.item_type_count,
            tension_bias: snapshot.tension_bias,
        });

        let mut state = Self {
            tick: 0,
            phase: LevelPhase::Playing,
            level: level.clone(),
            effective,
            snapshot,
            rng,
            board,
            pockets,
            feed,
            boosters: BoosterTimers::new(sim.booster.clone()),
            settle: sim.settle,
            progress: 0,
            moves: 0,
            max_chain_depth: 0,
            sim_time: 0.0,
            pending_events: Vec::new(),
            pending_probes: Vec::new(),
        };
        state.push_event(GameEventData::LevelStarted {
            level_id: state.level.level_id,
            seed: state.effective.seed,
        });
        state
    }

    /// Unscaled seconds since level start.
    pub fn elapsed(&self) -> f64 {
        self.tick as f64 * TICK_DT
    }

    /// True once won or failed.
    pub fn is_ended(&self) -> bool {
        self.phase.is_ended()
    }

    /// True once won.
    pub fn is_won(&self) -> bool {
        self.phase == LevelPhase::Won
    }

    /// Fraction of the target reached, 0..=1.
    pub fn progress_ratio(&self) -> f64 {
        let target = self.effective.target_progress.max(1);
        (self.progress as f64 / target as f64).min(1.0)
    }

    /// End the attempt. Boosters are force-ended so nothing leaks into the
    /// next level. No-op if already ended.
    pub fn finish(&mut self, phase: LevelPhase) {
        if self.is_ended() || !phase.is_ended() {
            return;
        }
        self.phase = phase;
        for kind in self.boosters.force_end_all() {
            self.push_event(GameEventData::BoosterEnded { kind });
        }
        let level_id = self.level.level_id;
        match phase {
            LevelPhase::Won => self.push_event(GameEventData::LevelWon {
                level_id,
                progress: self.progress,
            }),
            LevelPhase::Failed(reason) => self.push_event(GameEventData::LevelFailed { level_id, reason }),
            LevelPhase::Playing => {}
        }
    }

    /// Queue an event stamped with the current tick.
    pub fn push_event(&mut self, data: GameEventData) {
        self.pending_events.push(GameEvent::new(self.tick, data));
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Queue a near-miss probe.
    pub fn push_probe(&mut self, probe: NearMissProbe) {
        self.pending_probes.push(probe);
    }

    /// Take pending near-miss probes.
    pub fn take_probes(&mut self) -> Vec<NearMissProbe> {
        std::mem::take(&mut self.pending_probes)
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.effective.seed, |hasher| {
            let [s0, s1] = self.rng.state();
            hasher.update_u64(s0);
            hasher.update_u64(s1);

            hasher.include(&self.board);
            hasher.include(&self.pockets);
            hasher.include(&self.feed);

            hasher.update_u8(self.phase.code());
            hasher.update_u32(self.progress);
            hasher.update_u32(self.moves);
            hasher.update_f64(self.sim_time);
            hasher.update_usize(self.boosters.active().len());
        })
    }
}

/// Fill `count` random cells with obstacles, chosen by a seeded shuffle.
fn seed_obstacles(board: &mut ClusterBoard, rng: &mut SeededRandom, count: usize, settle: bool) {
    if count == 0 {
        return;
    }
    let mut cells = board.empty_positions();
    rng.shuffle(&mut cells);
    let obstacle = board.catalog().obstacle;
    for pos in cells.into_iter().take(count) {
        board.set(pos.x, pos.y, obstacle);
    }
    if settle {
        board.settle();
    }
}

// ===== TESTS =====
