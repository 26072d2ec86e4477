//! Game Logic Module
//!
//! All level simulation code. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `item`: Item type ids and capability catalog
//! - `board`: Placement grid, cluster search, settling
//! - `resolve`: Placement chain resolution
//! - `pocket`: Bounded holding stacks
//! - `conveyor`: Spawner, belt queue, routing
//! - `booster`: Timed effects
//! - `level`: Level definitions and limits
//! - `input`: Tap inputs and the per-level input log
//! - `state`: Level attempt state
//! - `tick`: Authoritative simulation loop
//! - `events`: Game events and the event bus

pub mod item;
pub mod board;
pub mod resolve;
pub mod pocket;
pub mod conveyor;
pub mod booster;
pub mod level;
pub mod input;
pub mod state;
pub mod tick;
pub mod events;

// Re-export key types
pub use item::{ItemCatalog, ItemKind, ItemType, EMPTY, OBSTACLE_TYPE};
pub use board::{Cluster, ClusterBoard, GridPos};
pub use resolve::{place_and_resolve, ResolveReport};
pub use pocket::{Pocket, PocketBank};
pub use conveyor::{ConveyorFeed, ConveyorItem, ConveyorQueue, RouteOutcome};
pub use booster::{BoosterConfig, BoosterKind, BoosterTimers};
pub use level::{LevelDef, LevelFlags, LevelLimits};
pub use input::{InputLog, TapInput, TimedInput};
pub use state::{LevelPhase, LevelState, NearMissProbe};
pub use tick::{replay_level, tick, TickResult};
pub use events::{EventBus, EventObserver, GameEvent, GameEventData, LevelFailReason, SubscriptionId};
