//! Arena Player
//!
//! Authority-side gameplay state of one player: armor, collected coins and
//! position, plus the reset-with-penalty and knockback rules.
//!
//! ## Coin penalty
//!
//! A reset deducts `floor(coins * penalty / 100)` coins. The penalty is a
//! percentage; values above 100 are a caller bug (asserted in debug builds,
//! clamped to 100 otherwise).

use serde::{Serialize, Deserialize};

use crate::core::entity::NetEntityId;
use crate::core::math::Vec3;
use crate::game::effects::{EffectSink, SoundEffect};

/// Options for respawning or resetting a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerResetOptions {
    /// Restore armor to full
    pub reset_armor: bool,
    /// Percentage of coins lost (0..=100)
    pub coin_penalty: u8,
}

/// Coins deducted by a reset with `penalty_percent`.
pub fn coin_penalty_deduction(coins: u16, penalty_percent: u8) -> u16 {
    debug_assert!(penalty_percent <= 100, "coin penalty {penalty_percent} exceeds 100%");
    let penalty = u32::from(penalty_percent.min(100));
    // Integer floor, at most `coins`
    (u32::from(coins) * penalty / 100) as u16
}

/// Result of an armor change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArmorChange {
    /// Armor before
    pub previous: u16,
    /// Armor after
    pub current: u16,
}

impl ArmorChange {
    /// Whether the armor actually changed.
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }

    /// Whether this change depleted the armor.
    pub fn depleted(&self) -> bool {
        self.changed() && self.current == 0
    }
}

/// Authority-side player state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaPlayer {
    id: NetEntityId,
    name: String,
    position: Vec3,
    armor: u16,
    max_armor: u16,
    coins: u16,
}

impl ArenaPlayer {
    /// Player at `position` with full armor and no coins.
    pub fn new(id: NetEntityId, name: impl Into<String>, position: Vec3, max_armor: u16) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            armor: max_armor,
            max_armor,
            coins: 0,
        }
    }

    /// Entity id.
    pub fn id(&self) -> NetEntityId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// World position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Move without side effects.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Remaining armor.
    pub fn armor(&self) -> u16 {
        self.armor
    }

    /// Armor after a full reset.
    pub fn max_armor(&self) -> u16 {
        self.max_armor
    }

    /// Collected coins.
    pub fn coins(&self) -> u16 {
        self.coins
    }

    /// Set the armor, playing mend/ouch/breaking cues at the player.
    pub fn set_armor(&mut self, armor: u16, effects: &mut dyn EffectSink) -> ArmorChange {
        let previous = self.armor;
        let current = armor.min(self.max_armor);

        if current > previous {
            effects.on_positional_effect(SoundEffect::ArmorMend, self.position);
        } else if current < previous {
            let half = f32::from(self.max_armor) / 2.0;
            if f32::from(current) < half && f32::from(previous) > half {
                effects.on_positional_effect(SoundEffect::ArmorBreaking, self.position);
            }
            effects.on_positional_effect(SoundEffect::PlayerOuch, self.position);
        }

        self.armor = current;
        ArmorChange { previous, current }
    }

    /// Subtract `amount` armor (rounded, never below zero).
    pub fn apply_damage(&mut self, amount: f32, effects: &mut dyn EffectSink) -> ArmorChange {
        let damage = if amount.is_finite() { amount.max(0.0).round().min(f32::from(u16::MAX)) as u16 } else { 0 };
        self.set_armor(self.armor.saturating_sub(damage), effects)
    }

    /// Add collected coins. Returns the new total.
    pub fn add_coins(&mut self, value: u16) -> u16 {
        self.coins = self.coins.saturating_add(value);
        self.coins
    }

    /// Overwrite the coin total.
    pub fn set_coins(&mut self, coins: u16) {
        self.coins = coins;
    }

    /// Apply a reset. Returns the coins deducted.
    pub fn reset(&mut self, options: PlayerResetOptions, effects: &mut dyn EffectSink) -> u16 {
        if options.reset_armor {
            self.set_armor(self.max_armor, effects);
        }
        let deducted = coin_penalty_deduction(self.coins, options.coin_penalty);
        self.coins -= deducted;
        deducted
    }

    /// Push the player by `offset`, split into steps no longer than
    /// `largest_step`. Returns the number of steps taken.
    pub fn knockback(&mut self, offset: Vec3, largest_step: f32) -> u32 {
        let steps = knockback_steps(offset, largest_step);
        let step_fraction = 1.0 / steps as f32;
        for _ in 0..steps {
            self.position += offset * step_fraction;
        }
        steps
    }
}

/// Upper bound on the steps of one knockback. Longer pushes take longer steps.
pub const MAX_KNOCKBACK_STEPS: u32 = 64;

/// Steps a knockback of `offset` is spread over.
pub fn knockback_steps(offset: Vec3, largest_step: f32) -> u32 {
    if largest_step.is_nan() || largest_step <= 0.0 || !offset.is_finite() {
        return 1;
    }
    ((offset.length() / largest_step) as u32)
        .saturating_add(1)
        .min(MAX_KNOCKBACK_STEPS)
}

// =============================================================================
// TESTS
// =============================================================================
