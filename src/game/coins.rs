//! Match Coin Slots
//!
//! Per-player coin counts for the match scoreboard, kept in a fixed table of
//! [`MAX_SUPPORTED_PLAYERS`] slots. Slot positions are part of the replicated
//! layout, so players keep their slot for as long as they are active and
//! lookups are a linear scan rather than a map.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::entity::NetEntityId;

/// Slots in the coin table.
pub const MAX_SUPPORTED_PLAYERS: usize = 10;

/// One slot of the coin table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerCoinState {
    /// Occupant, or invalid for a free slot
    pub player_id: NetEntityId,
    /// Coins collected this match
    pub coins: u16,
}

impl PlayerCoinState {
    /// A free slot.
    pub const EMPTY: Self = Self {
        player_id: NetEntityId::INVALID,
        coins: 0,
    };

    /// Whether the slot is free.
    #[inline]
    pub fn is_free(&self) -> bool {
        !self.player_id.is_valid()
    }
}

/// Authoritative coin table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPlayerCoins {
    slots: [PlayerCoinState; MAX_SUPPORTED_PLAYERS],
}

impl Default for MatchPlayerCoins {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchPlayerCoins {
    /// Table with every slot free.
    pub fn new() -> Self {
        Self {
            slots: [PlayerCoinState::EMPTY; MAX_SUPPORTED_PLAYERS],
        }
    }

    /// Every slot, in replicated order.
    pub fn slots(&self) -> &[PlayerCoinState; MAX_SUPPORTED_PLAYERS] {
        &self.slots
    }

    /// Occupied slots.
    pub fn player_coin_counts(&self) -> Vec<PlayerCoinState> {
        self.slots.iter().filter(|slot| !slot.is_free()).copied().collect()
    }

    /// Slot index of a player.
    pub fn coin_state_index(&self, player_id: NetEntityId) -> Option<usize> {
        if !player_id.is_valid() {
            return None;
        }
        self.slots.iter().position(|slot| slot.player_id == player_id)
    }

    /// Coins of a player, if it has a slot.
    pub fn coins_of(&self, player_id: NetEntityId) -> Option<u16> {
        self.coin_state_index(player_id).map(|index| self.slots[index].coins)
    }

    /// Give a newly active collector the first free slot.
    ///
    /// Returns the slot index. A player that already has a slot keeps it.
    /// A full table drops the player's coin tracking.
    pub fn on_player_collector_activated(&mut self, player_id: NetEntityId) -> Option<usize> {
        if let Some(index) = self.coin_state_index(player_id) {
            return Some(index);
        }

        let Some(index) = self.slots.iter().position(PlayerCoinState::is_free) else {
            debug!(player = %player_id, capacity = MAX_SUPPORTED_PLAYERS, "coin table full, player not tracked");
            return None;
        };
        self.slots[index] = PlayerCoinState { player_id, coins: 0 };
        Some(index)
    }

    /// Release a collector's slot.
    pub fn on_player_collector_deactivated(&mut self, player_id: NetEntityId) {
        if let Some(index) = self.coin_state_index(player_id) {
            self.slots[index] = PlayerCoinState::EMPTY;
        }
    }

    /// Record a collector's new coin count. Unknown players are ignored.
    pub fn on_player_collected_coin_count_changed(&mut self, player_id: NetEntityId, coins: u16) {
        match self.coin_state_index(player_id) {
            Some(index) => self.slots[index].coins = coins,
            None => debug!(player = %player_id, coins, "coin update for player without a slot"),
        }
    }

    /// Zero every slot's coins, keeping occupants.
    pub fn reset_all_coins(&mut self) {
        for slot in &mut self.slots {
            slot.coins = 0;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
