//! Game Logic Module
//!
//! Match lifecycle, players, gems and the session that ties them to the
//! weapon simulation.
//!
//! ## Module Structure
//!
//! - `events`: change notifications emitted by the match layer
//! - `effects`: audio/particle cues
//! - `coins`: fixed-capacity coin ledger
//! - `player`: armor, coins and the reset penalty
//! - `gems`: gem spawn tables and pickup
//! - `match_controller`: rounds, rest periods and results (authority)
//! - `match_view`: read-only mirror of the match for clients
//! - `game_state`: waiting / preparing / in progress / ended
//! - `session`: one arena, driven from a host tick

pub mod events;
pub mod effects;
pub mod coins;
pub mod player;
pub mod gems;
pub mod match_controller;
pub mod match_view;
pub mod game_state;
pub mod session;

// Re-export key types
pub use events::{EventPriority, GameEvent, GameEventData};
pub use effects::{EffectSink, RecordingEffects, SoundEffect};
pub use coins::{MatchPlayerCoins, PlayerCoinState, MAX_SUPPORTED_PLAYERS};
pub use player::{coin_penalty_deduction, ArenaPlayer, PlayerResetOptions, MAX_KNOCKBACK_STEPS};
pub use gems::{Gem, GemSettings, GemSpawner};
pub use match_controller::{ArenaTimer, ArenaWorld, MatchContext, MatchController, MatchResultsSummary, PlayerResult};
pub use match_view::{AllowedPlayerActions, MatchView};
pub use game_state::{GameStateContext, GameStateId, GameStateMachine};
pub use session::{ArenaEntities, ArenaSession, EntityChange};
