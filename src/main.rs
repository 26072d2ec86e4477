//! Pocket Cascade Demo
//!
//! Plays a run of generated levels with a greedy bot, lets the adaptive
//! layer react between levels, and verifies each level's replay.
//!
//! Usage: `pocket-cascade [config.json]`. Log level via `RUST_LOG`.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pocket_cascade::{
    game::{
        board::GridPos,
        resolve::place_and_resolve,
        events::{GameEvent, GameEventData},
        input::TapInput,
        item::ItemType,
        state::LevelState,
    },
    replay::verify_replay,
    EngineConfig, PlaySession, TICK_RATE, VERSION,
};

/// Levels played by the demo.
const DEMO_LEVELS: u32 = 12;

/// Ticks between bot decisions.
const DECISION_INTERVAL: u32 = 15;

/// Hard cap per level (3 minutes).
const MAX_LEVEL_TICKS: u32 = 180 * TICK_RATE;

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;

    info!("Pocket Cascade v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_path(&path)?,
        None => EngineConfig::default(),
    };

    demo_session(config)
}

#[derive(Debug, Default)]
struct EventTally {
    clusters: usize,
    near_misses: usize,
    spikes: usize,
}

/// Play generated levels through a session and verify every replay.
fn demo_session(config: EngineConfig) -> Result<()> {
    info!("=== Starting Demo Session ===");

    let mut session = PlaySession::new(config);
    let tally = Rc::new(RefCell::new(EventTally::default()));
    {
        let tally = Rc::clone(&tally);
        session.subscribe(move |event: &GameEvent| {
            let mut t = tally.borrow_mut();
            match &event.data {
                GameEventData::ClusterFound { .. } => t.clusters += 1,
                GameEventData::NearMiss(_) => t.near_misses += 1,
                GameEventData::SpikeDetected { spiking: true } => {
                    t.spikes += 1;
                    info!(tick = event.tick, "Spike detected, easing off");
                }
                GameEventData::DifficultyChanged { multiplier } => {
                    info!("Difficulty multiplier now {:.2}", multiplier);
                }
                _ => {}
            }
        });
    }

    let mut wins = 0;
    let mut intended_win_rate = 0.0;
    for level_number in 1..=DEMO_LEVELS {
        intended_win_rate += session.start_generated(level_number)?.level.target_win_rate;

        while let Some(state) = session.level().filter(|s| !s.is_ended()) {
            if state.tick >= MAX_LEVEL_TICKS {
                session.abandon_level()?;
                break;
            }
            let taps: Vec<TapInput> = if state.tick % DECISION_INTERVAL == 0 {
                choose_move(state).into_iter().collect()
            } else {
                Vec::new()
            };
            session.update(&taps)?;
        }

        if let Some(state) = session.level() {
            if state.is_won() {
                wins += 1;
            }
            info!(
                "Level {}: {:?} after {} ticks, {} cleared ({:.0}%) in {} moves",
                level_number,
                state.phase,
                state.tick,
                state.progress,
                state.progress_ratio() * 100.0,
                state.moves
            );
        }

        let Some(record) = session.finish_replay() else {
            bail!("level {level_number} ended without a replay record");
        };
        let bytes = record.to_bytes()?;
        let verified = verify_replay(&record)?;
        info!(
            "Replay: {} inputs, {} bytes, hash {}",
            record.input_count(),
            bytes.len(),
            hex::encode(verified.final_hash)
        );
    }

    // Print final results
    info!("=== Session Results ===");
    let t = tally.borrow();
    info!("Won {}/{} levels", wins, DEMO_LEVELS);
    let intended_win_rate = intended_win_rate / DEMO_LEVELS as f64;
    info!(
        "Intended win rate {:.2}, recent window off by {:+.2}",
        intended_win_rate,
        session.outcome().win_rate_deviation(intended_win_rate)
    );
    info!("Clusters: {}, near misses: {}, spikes: {}", t.clusters, t.near_misses, t.spikes);
    info!(
        "Difficulty {:.2}, win rate {:.2}, adaptive factor {:.2}",
        session.outcome().difficulty_multiplier(),
        session.outcome().win_rate(),
        session.adaptive().combined_difficulty_factor()
    );
    info!("Session time: {:.1}s", session.clock());

    Ok(())
}

/// Greedy bot: best clearing placement, else the cell with most same-type
/// neighbours, from the belt head or any pocket top.
fn choose_move(state: &LevelState) -> Option<TapInput> {
    let mut sources: Vec<(ItemType, Source)> = Vec::new();
    if let Some(entry) = state.feed.queue().get(0) {
        sources.push((entry.item, Source::Queue));
    }
    for pocket in 0..state.pockets.len() {
        if let Some(item) = state.pockets.peek_top(pocket) {
            sources.push((item, Source::Pocket(pocket)));
        }
    }

    let mut best: Option<(usize, TapInput)> = None;
    for pos in state.board.empty_positions() {
        for &(item, source) in &sources {
            let score = score_placement(state, pos, item);
            if best.as_ref().is_none_or(|(s, _)| score > *s) {
                best = Some((score, source.tap(pos)));
            }
        }
    }
    best.map(|(_, tap)| tap)
}

#[derive(Clone, Copy)]
enum Source {
    Queue,
    Pocket(usize),
}

impl Source {
    fn tap(self, pos: GridPos) -> TapInput {
        match self {
            Source::Queue => TapInput::PlaceFromQueue { queue_index: 0, pos },
            Source::Pocket(pocket_index) => TapInput::PlaceFromPocket { pocket_index, pos },
        }
    }
}

fn score_placement(state: &LevelState, pos: GridPos, item: ItemType) -> usize {
    let mut board = state.board.clone();
    let report = place_and_resolve(&mut board, pos, item, state.settle);
    if report.cleared_anything() {
        return 100 + report.cleared;
    }
    let group = board.scan_cluster(pos.x, pos.y).len();
    // Prefer low rows so settling does not scatter groups.
    group * 10 + (board.height() - pos.y).max(0) as usize
}
