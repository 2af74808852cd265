//! # Arena Gem
//!
//! Authoritative gameplay core for a multiplayer arena shooter: hit-scan and
//! projectile weapons, the round/rest match loop, gem spawning and coin
//! scoring.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ARENA GEM                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Engine-neutral primitives                 │
//! │  ├── entity.rs   - Network entity and host frame ids         │
//! │  ├── math.rs     - Vec3 / Quat / Transform                   │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State digests for verification            │
//! │                                                              │
//! │  runtime/        - Single-threaded plumbing                  │
//! │  ├── timer.rs    - One-shot and periodic timers              │
//! │  └── bus.rs      - Ordered change notifications              │
//! │                                                              │
//! │  weapons/        - Firing and hit resolution                 │
//! │  ├── gather.rs   - Physics queries, lag-compensated          │
//! │  ├── trace.rs    - Hit-scan and travelling shots             │
//! │  ├── projectile.rs - Projectile launch and flight            │
//! │  └── predicted.rs  - Client prediction and replay            │
//! │                                                              │
//! │  game/           - Match layer                               │
//! │  ├── match_controller.rs - Rounds, rest, results             │
//! │  ├── game_state.rs       - Top-level match loop              │
//! │  ├── coins.rs / gems.rs  - Scoring                           │
//! │  └── session.rs          - One arena per host tick           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! Every random choice comes from a seeded [`DeterministicRng`] and every
//! keyed collection is a `BTreeMap`, so a session replayed with the same id
//! and inputs produces the same results digest.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod runtime;
pub mod weapons;
pub mod game;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use crate::core::{DeterministicRng, HostFrameId, NetEntityId, Quat, Transform, Vec3};
pub use config::GameConfig;
pub use error::{ConfigError, EncodeError, WeaponConfigError};
pub use game::{ArenaSession, GameEvent, GameStateId, MatchResultsSummary};
pub use weapons::{WeaponInput, WeaponsController};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Host simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;

/// Milliseconds per host tick at [`TICK_RATE`]
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;
