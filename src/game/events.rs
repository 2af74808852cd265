//! Game Events
//!
//! Change notifications published by the authoritative match layer. The game
//! state machine, the read-only match view and any host observers react to
//! these; none of them reach into the match controller directly.

use serde::{Serialize, Deserialize};

use crate::core::entity::NetEntityId;
use crate::core::math::Vec3;
use crate::game::game_state::GameStateId;
use crate::game::match_controller::MatchResultsSummary;

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Armor depletion (respawns, penalties) first
    ArmorDepleted = 0,
    /// Then coin changes
    CoinChange = 1,
    /// Then round and rest timing
    RoundTiming = 2,
    /// Then roster changes
    Roster = 3,
    /// Lowest priority
    Other = 255,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// A player joined the match
    PlayerJoined {
        /// Player entity
        player_id: NetEntityId,
        /// Generated display name
        name: String,
    },

    /// A player left the match
    PlayerLeft {
        /// Player entity
        player_id: NetEntityId,
    },

    /// Number of players in the match changed
    PlayerCountChanged {
        /// New count
        player_count: u16,
    },

    /// Seconds left in the round changed
    RoundTimeChanged {
        /// Seconds remaining
        round_time: f32,
    },

    /// Seconds left in the rest period changed
    RestTimeChanged {
        /// Seconds remaining
        rest_time: f32,
    },

    /// Host time at which the next match starts
    MatchStartTimeChanged {
        /// Host time in milliseconds
        start_time_ms: u64,
    },

    /// Round counter changed
    RoundNumberChanged {
        /// New round number (past the total once the match is over)
        round_number: u16,
    },

    /// A player's coin count changed
    CoinsChanged {
        /// Collector
        player_id: NetEntityId,
        /// New coin count
        coins: u16,
    },

    /// A player's armor changed
    ArmorChanged {
        /// Player entity
        player_id: NetEntityId,
        /// New armor
        armor: u16,
    },

    /// A player's armor reached zero
    ArmorDepleted {
        /// Player entity
        player_id: NetEntityId,
    },

    /// A gem was collected
    GemCollected {
        /// Collector
        player_id: NetEntityId,
        /// Gem entity
        gem_id: NetEntityId,
        /// Coins awarded
        value: u16,
    },

    /// The game state machine changed state
    GameStateChanged {
        /// Previous state
        old_state: GameStateId,
        /// New state
        new_state: GameStateId,
    },

    /// A player respawned
    PlayerRespawned {
        /// Player entity
        player_id: NetEntityId,
        /// Spawn position
        position: Vec3,
    },

    /// Final results, broadcast once per match
    MatchResults(MatchResultsSummary),
}

/// A game event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEvent {
    /// Host time when the event occurred
    pub time_ms: u64,

    /// Processing priority
    pub priority: EventPriority,

    /// Player involved (for tie-breaking)
    pub player_id: Option<NetEntityId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(time_ms: u64, priority: EventPriority, data: GameEventData) -> Self {
        let player_id = match &data {
            GameEventData::PlayerJoined { player_id, .. }
            | GameEventData::PlayerLeft { player_id }
            | GameEventData::CoinsChanged { player_id, .. }
            | GameEventData::ArmorChanged { player_id, .. }
            | GameEventData::ArmorDepleted { player_id }
            | GameEventData::GemCollected { player_id, .. }
            | GameEventData::PlayerRespawned { player_id, .. } => Some(*player_id),
            _ => None,
        };

        Self {
            time_ms,
            priority,
            player_id,
            data,
        }
    }

    /// Create player joined event.
    pub fn player_joined(time_ms: u64, player_id: NetEntityId, name: String) -> Self {
        Self::new(time_ms, EventPriority::Roster, GameEventData::PlayerJoined { player_id, name })
    }

    /// Create player left event.
    pub fn player_left(time_ms: u64, player_id: NetEntityId) -> Self {
        Self::new(time_ms, EventPriority::Roster, GameEventData::PlayerLeft { player_id })
    }

    /// Create player count changed event.
    pub fn player_count_changed(time_ms: u64, player_count: u16) -> Self {
        Self::new(time_ms, EventPriority::Roster, GameEventData::PlayerCountChanged { player_count })
    }

    /// Create round time changed event.
    pub fn round_time_changed(time_ms: u64, round_time: f32) -> Self {
        Self::new(time_ms, EventPriority::RoundTiming, GameEventData::RoundTimeChanged { round_time })
    }

    /// Create rest time changed event.
    pub fn rest_time_changed(time_ms: u64, rest_time: f32) -> Self {
        Self::new(time_ms, EventPriority::RoundTiming, GameEventData::RestTimeChanged { rest_time })
    }

    /// Create match start time changed event.
    pub fn match_start_time_changed(time_ms: u64, start_time_ms: u64) -> Self {
        Self::new(
            time_ms,
            EventPriority::RoundTiming,
            GameEventData::MatchStartTimeChanged { start_time_ms },
        )
    }

    /// Create round number changed event.
    pub fn round_number_changed(time_ms: u64, round_number: u16) -> Self {
        Self::new(time_ms, EventPriority::RoundTiming, GameEventData::RoundNumberChanged { round_number })
    }

    /// Create coins changed event.
    pub fn coins_changed(time_ms: u64, player_id: NetEntityId, coins: u16) -> Self {
        Self::new(time_ms, EventPriority::CoinChange, GameEventData::CoinsChanged { player_id, coins })
    }

    /// Create armor changed event.
    pub fn armor_changed(time_ms: u64, player_id: NetEntityId, armor: u16) -> Self {
        Self::new(time_ms, EventPriority::Other, GameEventData::ArmorChanged { player_id, armor })
    }

    /// Create armor depleted event.
    pub fn armor_depleted(time_ms: u64, player_id: NetEntityId) -> Self {
        Self::new(time_ms, EventPriority::ArmorDepleted, GameEventData::ArmorDepleted { player_id })
    }

    /// Create gem collected event.
    pub fn gem_collected(time_ms: u64, player_id: NetEntityId, gem_id: NetEntityId, value: u16) -> Self {
        Self::new(
            time_ms,
            EventPriority::CoinChange,
            GameEventData::GemCollected { player_id, gem_id, value },
        )
    }

    /// Create game state changed event.
    pub fn game_state_changed(time_ms: u64, old_state: GameStateId, new_state: GameStateId) -> Self {
        Self::new(
            time_ms,
            EventPriority::Other,
            GameEventData::GameStateChanged { old_state, new_state },
        )
    }

    /// Create player respawned event.
    pub fn player_respawned(time_ms: u64, player_id: NetEntityId, position: Vec3) -> Self {
        Self::new(
            time_ms,
            EventPriority::Other,
            GameEventData::PlayerRespawned { player_id, position },
        )
    }

    /// Create match results event.
    pub fn match_results(time_ms: u64, summary: MatchResultsSummary) -> Self {
        Self::new(time_ms, EventPriority::Other, GameEventData::MatchResults(summary))
    }
}

impl PartialEq for GameEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time_ms == other.time_ms
            && self.priority == other.priority
            && self.player_id == other.player_id
    }
}

impl Eq for GameEvent {}

impl PartialOrd for GameEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Sort by: time, then priority, then player_id
        self.time_ms
            .cmp(&other.time_ms)
            .then(self.priority.cmp(&other.priority))
            .then(self.player_id.cmp(&other.player_id))
    }
}
