//! Simulation Tick
//!
//! The per-level game loop. Must be 100% deterministic: the same level,
//! snapshot and input log always produce the same states and events.
//!
//! Order within a tick is fixed:
//!
//! 1. expire boosters (unscaled clock)
//! 2. spawn
//! 3. route (belt arrivals, then player inputs)
//! 4. resolve placements and chains
//! 5. record (near-miss probes, win/fail checks)
//!
//! The session runs the adaptive cadence after the tick returns.

use std::collections::BTreeSet;

#[cfg(feature = "debug-tracing")]
use tracing::trace;

use crate::config::SimulationConfig;
use crate::difficulty::adaptive::AdaptiveSnapshot;
use crate::game::board::GridPos;
use crate::game::booster::BoosterKind;
use crate::game::conveyor::RouteOutcome;
use crate::game::events::{GameEvent, GameEventData, LevelFailReason};
use crate::game::input::{InputLog, TapInput};
use crate::game::item::ItemType;
use crate::game::level::LevelDef;
use crate::game::resolve::{near_miss_targets, place_and_resolve};
use crate::game::state::{LevelPhase, LevelState, NearMissProbe};
use crate::TICK_DT;

/// Label attached to near-miss probes from placements.
pub const PLACEMENT_PROBE: &str = "placement";

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Placements that cleared nothing
    pub probes: Vec<NearMissProbe>,
    /// Inputs that changed state
    pub accepted_inputs: usize,
    /// Phase after the tick
    pub phase: LevelPhase,
}

impl TickResult {
    /// True if the level is over.
    pub fn level_ended(&self) -> bool {
        self.phase.is_ended()
    }
}

/// What a single input did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InputOutcome {
    Accepted,
    Rejected,
    Overflow,
}

struct Placement {
    pos: GridPos,
    item: ItemType,
}

/// Run one simulation tick.
///
/// Inputs apply in slice order. An ended level is left untouched.
pub fn tick(state: &mut LevelState, inputs: &[TapInput]) -> TickResult {
    let mut result = TickResult::default();

    if state.is_ended() {
        result.phase = state.phase;
        return result;
    }

    // 0. Advance tick counter
    state.tick += 1;
    let now = state.elapsed();

    // 1. Expire boosters
    for kind in state.boosters.poll(now) {
        state.push_event(GameEventData::BoosterEnded { kind });
    }
    let dt = TICK_DT * state.boosters.time_scale();
    state.sim_time += dt;

    // 2. Spawn
    if let Some(item) = state.feed.update(dt, &mut state.rng, &state.board) {
        state.push_event(GameEventData::ItemSpawned { item });
    }

    // 3. Route
    let mut placements = Vec::new();
    if route(state, inputs, dt, &mut placements, &mut result) {
        // 4. Resolve
        resolve_placements(state, placements);

        // 5. Record
        check_end_conditions(state);
    }

    #[cfg(feature = "debug-tracing")]
    trace!(
        tick = state.tick,
        progress = state.progress,
        queue = state.feed.queue().len(),
        pockets = state.pockets.total_items(),
        "Level tick"
    );

    result.events = state.take_events();
    result.probes = state.take_probes();
    result.phase = state.phase;
    result
}

/// Belt arrivals then player inputs. False if the level failed here.
fn route(
    state: &mut LevelState,
    inputs: &[TapInput],
    dt: f64,
    placements: &mut Vec<Placement>,
    result: &mut TickResult,
) -> bool {
    for item in state.feed.advance_belt(dt) {
        match state.pockets.add_item(item) {
            Some(pocket) => state.push_event(GameEventData::ItemRouted { item, pocket }),
            None => {
                state.finish(LevelPhase::Failed(LevelFailReason::PocketOverflow));
                return false;
            }
        }
    }

    let mut reserved = BTreeSet::new();
    for input in inputs {
        match apply_input(state, input, &mut reserved, placements) {
            InputOutcome::Accepted => result.accepted_inputs += 1,
            InputOutcome::Rejected => {}
            InputOutcome::Overflow => {
                state.finish(LevelPhase::Failed(LevelFailReason::PocketOverflow));
                return false;
            }
        }
    }
    true
}

/// Apply one input. Placements are validated here and resolved later in
/// the tick; a cell can only be claimed once per tick.
fn apply_input(
    state: &mut LevelState,
    input: &TapInput,
    reserved: &mut BTreeSet<GridPos>,
    placements: &mut Vec<Placement>,
) -> InputOutcome {
    match *input {
        TapInput::Route { queue_index, pocket_index } => {
            let item = state.feed.queue().get(queue_index).map(|e| e.item);
            match state.feed.route_to_pocket(queue_index, pocket_index, &mut state.pockets) {
                RouteOutcome::Routed { pocket } => {
                    if let Some(item) = item {
                        state.push_event(GameEventData::ItemRouted { item, pocket });
                    }
                    InputOutcome::Accepted
                }
                RouteOutcome::Rejected => InputOutcome::Rejected,
                RouteOutcome::Overflow => InputOutcome::Overflow,
            }
        }
        TapInput::PlaceFromPocket { pocket_index, pos } => {
            if !can_place(state, pos, reserved) {
                return InputOutcome::Rejected;
            }
            match state.pockets.pop_top(pocket_index) {
                Some(item) => {
                    reserved.insert(pos);
                    placements.push(Placement { pos, item });
                    InputOutcome::Accepted
                }
                None => InputOutcome::Rejected,
            }
        }
        TapInput::PlaceFromQueue { queue_index, pos } => {
            if !can_place(state, pos, reserved) {
                return InputOutcome::Rejected;
            }
            match state.feed.take(queue_index) {
                Some(entry) => {
                    reserved.insert(pos);
                    placements.push(Placement { pos, item: entry.item });
                    InputOutcome::Accepted
                }
                None => InputOutcome::Rejected,
            }
        }
        TapInput::UndoToConveyor { pocket_index } => {
            if state.pockets.reenqueue(pocket_index, state.feed.queue_mut()) {
                InputOutcome::Accepted
            } else {
                InputOutcome::Rejected
            }
        }
        TapInput::SlowMotion => {
            let now = state.elapsed();
            if state.boosters.activate(BoosterKind::SlowMotion, now) {
                state.push_event(GameEventData::BoosterStarted {
                    kind: BoosterKind::SlowMotion,
                });
                InputOutcome::Accepted
            } else {
                InputOutcome::Rejected
            }
        }
    }
}

fn can_place(state: &LevelState, pos: GridPos, reserved: &BTreeSet<GridPos>) -> bool {
    state.board.is_empty(pos.x, pos.y) && !reserved.contains(&pos)
}

/// Resolve placements in input order.
///
/// A chain can settle an item into a cell claimed by a later placement;
/// that item goes back into the pockets instead.
fn resolve_placements(state: &mut LevelState, placements: Vec<Placement>) {
    for Placement { pos, item } in placements {
        if !state.board.is_empty(pos.x, pos.y) {
            match state.pockets.add_item(item) {
                Some(pocket) => state.push_event(GameEventData::ItemRouted { item, pocket }),
                None => {
                    state.finish(LevelPhase::Failed(LevelFailReason::PocketOverflow));
                    return;
                }
            }
            continue;
        }

        state.moves += 1;
        state.push_event(GameEventData::ItemPlaced { item, pos });

        let settle = state.settle;
        let report = place_and_resolve(&mut state.board, pos, item, settle);
        for cluster in state.board.take_found() {
            state.push_event(GameEventData::ClusterFound {
                item: cluster.item,
                cells: cluster.cells,
            });
        }

        if report.cleared_anything() {
            let cleared = report.cells_cleared();
            state.progress = state.progress.saturating_add(cleared as u32);
            state.max_chain_depth = state.max_chain_depth.max(report.chain_depth);
            state.push_event(GameEventData::ChainResolved {
                depth: report.chain_depth,
                cleared,
            });
        } else {
            let targets = near_miss_targets(&state.board, pos);
            if !targets.is_empty() {
                let probe = NearMissProbe {
                    position: pos.to_vec2(),
                    targets,
                    label: PLACEMENT_PROBE.to_string(),
                    timestamp: state.elapsed(),
                };
                state.push_probe(probe);
            }
        }
    }
}

/// Check if the level should end.
fn check_end_conditions(state: &mut LevelState) {
    if state.is_ended() {
        return;
    }

    if state.progress >= state.effective.target_progress {
        state.finish(LevelPhase::Won);
        return;
    }

    let nothing_left = state.feed.is_exhausted()
        && state.feed.queue().is_empty()
        && state.pockets.is_all_empty();
    if nothing_left {
        state.finish(LevelPhase::Failed(LevelFailReason::OutOfItems));
        return;
    }

    if state.board.empty_positions().is_empty() {
        state.finish(LevelPhase::Failed(LevelFailReason::BoardFull));
    }
}

/// Replay a level from recorded inputs.
///
/// Runs until the level ends or `max_ticks` ticks have been simulated.
/// Returns the final state and every event, level start included.
pub fn replay_level(
    level: &LevelDef,
    snapshot: AdaptiveSnapshot,
    sim: &SimulationConfig,
    inputs: &InputLog,
    max_ticks: u32,
) -> (LevelState, Vec<GameEvent>) {
    let mut state = LevelState::new(level, snapshot, sim);
    let mut all_events = state.take_events();

    while state.tick < max_ticks && !state.is_ended() {
        let taps: Vec<TapInput> = inputs.inputs_at(state.tick + 1).collect();
        let result = tick(&mut state, &taps);
        all_events.extend(result.events);
    }

    (state, all_events)
}

// ===== TESTS =====

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::item::{EMPTY, OBSTACLE_TYPE};

    fn level() -> LevelDef {
        LevelDef {
            seed: 42,
            board_width: 6,
            board_height: 8,
            min_cluster: 3,
            spawn_interval: 0.5,
            conveyor_speed: 1.0,
            target_progress: 6,
            max_spawn: 30,
            item_type_count: 3,
            pocket_count: 3,
            pocket_capacity: 4,
            ..LevelDef::default()
        }
    }

    fn new_state() -> LevelState {
        let mut state = LevelState::new(&level(), AdaptiveSnapshot::NEUTRAL, &SimulationConfig::default());
        state.take_events();
        state
    }

    fn run_idle(state: &mut LevelState, ticks: u32) -> Vec<GameEvent> {
        let mut events = Vec::new();
        for _ in 0..ticks {
            events.extend(tick(state, &[]).events);
        }
        events
    }

    #[test]
    fn test_tick_determinism() {
        let mut a = new_state();
        let mut b = new_state();
        for _ in 0..600 {
            tick(&mut a, &[]);
            tick(&mut b, &[]);
            assert_eq!(a.compute_hash(), b.compute_hash());
        }
        assert_eq!(a.feed.total_spawned(), b.feed.total_spawned());
    }

    #[test]
    fn test_spawn_on_interval() {
        let mut state = new_state();
        // 0.5s interval at 60 ticks/s
        let events = run_idle(&mut state, 31);
        let spawned = events
            .iter()
            .filter(|e| matches!(e.data, GameEventData::ItemSpawned { .. }))
            .count();
        assert_eq!(spawned, 1);
        assert_eq!(state.feed.queue().len(), 1);
    }

    #[test]
    fn test_belt_overflow_fails_level() {
        let mut def = level();
        def.pocket_count = 1;
        def.pocket_capacity = 1;
        def.conveyor_speed = 10.0;
        let mut state = LevelState::new(&def, AdaptiveSnapshot::NEUTRAL, &SimulationConfig::default());

        let mut last = TickResult::default();
        for _ in 0..600 {
            last = tick(&mut state, &[]);
            if last.level_ended() {
                break;
            }
        }
        assert_eq!(last.phase, LevelPhase::Failed(LevelFailReason::PocketOverflow));
        assert!(last.events.iter().any(|e| e.ends_level()));

        // Ended levels ignore further ticks.
        let tick_before = state.tick;
        let after = tick(&mut state, &[]);
        assert!(after.events.is_empty());
        assert_eq!(state.tick, tick_before);
    }

    #[test]
    fn test_place_from_queue_and_occupied_rejection() {
        let mut state = new_state();
        run_idle(&mut state, 31);
        let item = state.feed.queue().get(0).map(|e| e.item).unwrap();

        let pos = GridPos::new(0, 0);
        let result = tick(&mut state, &[TapInput::PlaceFromQueue { queue_index: 0, pos }]);
        assert_eq!(result.accepted_inputs, 1);
        assert_eq!(state.board.get(0, 0), item);
        assert_eq!(state.moves, 1);

        run_idle(&mut state, 35);
        assert_eq!(state.feed.queue().len(), 1);
        let result = tick(&mut state, &[TapInput::PlaceFromQueue { queue_index: 0, pos }]);
        assert_eq!(result.accepted_inputs, 0);
        assert_eq!(state.feed.queue().len(), 1);
        assert_eq!(state.board.get(0, 0), item);
    }

    #[test]
    fn test_same_cell_claimed_once_per_tick() {
        let mut state = new_state();
        run_idle(&mut state, 70);
        assert_eq!(state.feed.queue().len(), 2);

        let pos = GridPos::new(2, 0);
        let result = tick(
            &mut state,
            &[
                TapInput::PlaceFromQueue { queue_index: 0, pos },
                TapInput::PlaceFromQueue { queue_index: 0, pos },
            ],
        );
        assert_eq!(result.accepted_inputs, 1);
        assert_eq!(state.feed.queue().len(), 1);
    }

    #[test]
    fn test_route_and_undo() {
        let mut state = new_state();
        run_idle(&mut state, 31);
        let item = state.feed.queue().get(0).map(|e| e.item).unwrap();

        let result = tick(&mut state, &[TapInput::Route { queue_index: 0, pocket_index: 2 }]);
        assert!(result
            .events
            .iter()
            .any(|e| e.data == GameEventData::ItemRouted { item, pocket: 2 }));
        assert_eq!(state.pockets.peek_top(2), Some(item));

        let result = tick(&mut state, &[TapInput::UndoToConveyor { pocket_index: 2 }]);
        assert_eq!(result.accepted_inputs, 1);
        assert!(state.pockets.is_all_empty());
        assert_eq!(state.feed.queue().len(), 1);

        let result = tick(&mut state, &[TapInput::Route { queue_index: 5, pocket_index: 0 }]);
        assert_eq!(result.accepted_inputs, 0);
    }

    #[test]
    fn test_cracked_obstacles_count_as_progress() {
        let mut def = level();
        def.target_progress = 10;
        let mut state = LevelState::new(&def, AdaptiveSnapshot::NEUTRAL, &SimulationConfig::default());
        state.take_events();
        state.board.set(0, 0, 1);
        state.board.set(1, 0, 1);
        state.board.set(3, 0, OBSTACLE_TYPE);
        state.pockets.try_add_item(1);

        let result = tick(
            &mut state,
            &[TapInput::PlaceFromPocket {
                pocket_index: 0,
                pos: GridPos::new(2, 0),
            }],
        );
        assert_eq!(state.progress, 4);
        assert!(state.board.is_empty(3, 0));
        assert_eq!(result.phase, LevelPhase::Playing);
        assert!(result
            .events
            .iter()
            .any(|e| e.data == GameEventData::ChainResolved { depth: 1, cleared: 4 }));
    }

    #[test]
    fn test_placement_clears_and_wins() {
        let mut def = level();
        def.target_progress = 3;
        let mut state = LevelState::new(&def, AdaptiveSnapshot::NEUTRAL, &SimulationConfig::default());
        state.take_events();
        state.board.set(0, 0, 1);
        state.board.set(0, 1, 1);
        state.pockets.try_add_item(1);

        let result = tick(
            &mut state,
            &[TapInput::PlaceFromPocket {
                pocket_index: 0,
                pos: GridPos::new(1, 0),
            }],
        );
        assert_eq!(state.progress, 3);
        assert_eq!(result.phase, LevelPhase::Won);
        let found: Vec<_> = result
            .events
            .iter()
            .filter_map(|e| match &e.data {
                GameEventData::ClusterFound { cells, .. } => Some(cells.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(found, vec![vec![GridPos::new(1, 0), GridPos::new(0, 0), GridPos::new(0, 1)]]);
        assert_eq!(state.board.get(0, 0), EMPTY);
    }

    #[test]
    fn test_non_clearing_placement_probes() {
        let mut state = new_state();
        state.board.set(1, 1, 2);
        state.pockets.try_add_item(2);
        let result = tick(
            &mut state,
            &[TapInput::PlaceFromPocket {
                pocket_index: 0,
                pos: GridPos::new(0, 0),
            }],
        );
        assert_eq!(result.probes.len(), 1);
        assert_eq!(result.probes[0].targets, vec![GridPos::new(1, 1).to_vec2()]);
        assert_eq!(result.probes[0].label, PLACEMENT_PROBE);
    }

    #[test]
    fn test_slow_motion_scales_and_expires() {
        let mut state = new_state();
        let result = tick(&mut state, &[TapInput::SlowMotion]);
        assert_eq!(result.accepted_inputs, 1);
        assert_eq!(state.boosters.time_scale(), 0.5);

        // Just over 5 unscaled seconds later it has expired.
        let events = run_idle(&mut state, 310);
        assert!(events
            .iter()
            .any(|e| e.data == GameEventData::BoosterEnded { kind: BoosterKind::SlowMotion }));
        assert_eq!(state.boosters.time_scale(), 1.0);
        assert!(state.sim_time < state.elapsed());
    }

    #[test]
    fn test_out_of_items() {
        let mut def = level();
        def.max_spawn = 1;
        def.target_progress = 100;
        let mut state = LevelState::new(&def, AdaptiveSnapshot::NEUTRAL, &SimulationConfig::default());
        run_idle(&mut state, 31);
        let result = tick(
            &mut state,
            &[TapInput::PlaceFromQueue {
                queue_index: 0,
                pos: GridPos::new(3, 3),
            }],
        );
        assert_eq!(result.phase, LevelPhase::Failed(LevelFailReason::OutOfItems));
    }

    #[test]
    fn test_replay_matches_live_run() {
        let sim = SimulationConfig::default();
        let mut live = LevelState::new(&level(), AdaptiveSnapshot::NEUTRAL, &sim);
        let mut log = InputLog::new();
        let mut live_events = live.take_events();

        for t in 0..400u32 {
            let mut taps = Vec::new();
            if t % 40 == 35 && !live.feed.queue().is_empty() {
                if let Some(pos) = live.board.empty_positions().first().copied() {
                    taps.push(TapInput::PlaceFromQueue { queue_index: 0, pos });
                }
            }
            for tap in &taps {
                log.record(live.tick + 1, *tap);
            }
            let result = tick(&mut live, &taps);
            let ended = result.level_ended();
            live_events.extend(result.events);
            if ended {
                break;
            }
        }

        let (replayed, events) = replay_level(&level(), AdaptiveSnapshot::NEUTRAL, &sim, &log, live.tick);
        assert_eq!(replayed.compute_hash(), live.compute_hash());
        assert_eq!(events, live_events);
    }
}
