//! Weapons Controller
//!
//! Owns the weapons carried by one entity and their replicated state, and
//! turns per-tick input into fire requests and activations.
//!
//! Each tick, for every weapon slot:
//! 1. a held fire button requests a shot ([`Weapon::try_start_fire`])
//! 2. the weapon cools down and advances its in-flight shots
//! 3. a weapon that is `Firing` with no cooldown left activates from the
//!    muzzle pose, aimed at its fire target

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::entity::NetEntityId;
use crate::core::math::{Quat, Transform, Vec3};
use crate::error::WeaponConfigError;
use crate::weapons::base::{create_weapon, ActivationFlags, Weapon, WeaponContext};
use crate::weapons::gather::NetEntityIdSet;
use crate::weapons::types::{
    projectile_net_entity_id, ActivateEvent, FireParams, WeaponIndex, WeaponParams, WeaponState,
    WeaponStatus, WeaponType, MAX_WEAPONS_PER_COMPONENT,
};

/// Replicated weapon state of every slot.
pub type WeaponStates = [WeaponState; MAX_WEAPONS_PER_COMPONENT];

/// One tick of weapon input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeaponInput {
    /// Weapon drawn (aiming)
    pub draw: bool,
    /// Fire button held, per slot
    pub firing: [bool; MAX_WEAPONS_PER_COMPONENT],
    /// Where the player is aiming
    pub target_position: Vec3,
}

impl WeaponInput {
    /// Input holding the fire button of `index`.
    pub fn fire(index: WeaponIndex, target_position: Vec3) -> Self {
        let mut input = Self {
            target_position,
            ..Default::default()
        };
        if let Some(slot) = input.firing.get_mut(index.0 as usize) {
            *slot = true;
        }
        input
    }

    /// Whether any fire button is held.
    pub fn any_firing(&self) -> bool {
        self.firing.iter().any(|held| *held)
    }
}

/// Weapons of one entity.
pub struct WeaponsController {
    owner_id: NetEntityId,
    weapons: [Option<Box<dyn Weapon>>; MAX_WEAPONS_PER_COMPONENT],
    states: WeaponStates,
    weapon_drawn: bool,
}

impl std::fmt::Debug for WeaponsController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeaponsController")
            .field("owner_id", &self.owner_id)
            .field("weapon_types", &self.weapon_types())
            .field("states", &self.states)
            .field("weapon_drawn", &self.weapon_drawn)
            .finish()
    }
}

impl WeaponsController {
    /// Build weapons from definitions, one per slot. Slots beyond
    /// [`MAX_WEAPONS_PER_COMPONENT`] are ignored; `WeaponType::None` leaves
    /// the slot empty.
    pub fn new(owner_id: NetEntityId, definitions: &[WeaponParams]) -> Result<Self, WeaponConfigError> {
        let mut weapons: [Option<Box<dyn Weapon>>; MAX_WEAPONS_PER_COMPONENT] = Default::default();
        for (slot, params) in definitions.iter().take(MAX_WEAPONS_PER_COMPONENT).enumerate() {
            if params.weapon_type == WeaponType::None {
                continue;
            }
            weapons[slot] = Some(create_weapon(WeaponIndex(slot as u8), owner_id, params.clone())?);
        }

        Ok(Self {
            owner_id,
            weapons,
            states: Default::default(),
            weapon_drawn: false,
        })
    }

    /// Entity carrying the weapons.
    pub fn owner_id(&self) -> NetEntityId {
        self.owner_id
    }

    /// Weapon in a slot.
    pub fn weapon(&self, index: WeaponIndex) -> Option<&dyn Weapon> {
        self.weapons.get(index.0 as usize)?.as_deref()
    }

    /// Weapon in a slot, mutable.
    pub fn weapon_mut(&mut self, index: WeaponIndex) -> Option<&mut (dyn Weapon + 'static)> {
        self.weapons.get_mut(index.0 as usize)?.as_deref_mut()
    }

    /// Type of each slot.
    pub fn weapon_types(&self) -> [WeaponType; MAX_WEAPONS_PER_COMPONENT] {
        std::array::from_fn(|slot| {
            self.weapons[slot]
                .as_ref()
                .map_or(WeaponType::None, |weapon| weapon.params().weapon_type)
        })
    }

    /// State of a slot.
    pub fn state(&self, index: WeaponIndex) -> Option<&WeaponState> {
        self.states.get(index.0 as usize)
    }

    /// State of every slot.
    pub fn states(&self) -> &WeaponStates {
        &self.states
    }

    /// Overwrite every slot's state (authoritative correction).
    pub fn restore_states(&mut self, states: WeaponStates) {
        self.states = states;
    }

    /// Restrict the hits every slot dispatches to `ids`. Empty lifts the restriction.
    pub fn set_client_hit_filter(&mut self, ids: &NetEntityIdSet) {
        for weapon in self.weapons.iter_mut().flatten() {
            weapon.base_mut().set_client_hit_filter(ids.clone());
        }
    }

    /// Whether the weapon is drawn.
    pub fn is_drawn(&self) -> bool {
        self.weapon_drawn
    }

    /// Request a shot from a slot.
    pub fn try_start_fire(&mut self, index: WeaponIndex, fire_params: FireParams) -> bool {
        let slot = index.0 as usize;
        match (self.weapons.get_mut(slot), self.states.get_mut(slot)) {
            (Some(Some(weapon)), Some(state)) => weapon.try_start_fire(state, fire_params),
            _ => {
                debug!(owner = %self.owner_id, weapon = index.0, "fire request for empty weapon slot");
                false
            }
        }
    }

    /// Apply one tick of input.
    pub fn process_input(
        &mut self,
        cx: &mut WeaponContext<'_>,
        muzzle: &Transform,
        input: &WeaponInput,
        delta_time: f32,
        flags: ActivationFlags,
    ) {
        self.weapon_drawn = input.draw;
        for slot in 0..MAX_WEAPONS_PER_COMPONENT {
            if input.firing[slot] {
                self.try_start_fire(
                    WeaponIndex(slot as u8),
                    FireParams {
                        target_position: input.target_position,
                        target_id: NetEntityId::INVALID,
                    },
                );
            }
        }
        self.update_weapon_firing(cx, muzzle, delta_time, flags);
    }

    /// Advance every weapon and activate those ready to fire.
    pub fn update_weapon_firing(
        &mut self,
        cx: &mut WeaponContext<'_>,
        muzzle: &Transform,
        delta_time: f32,
        flags: ActivationFlags,
    ) {
        for (weapon, state) in self.weapons.iter_mut().zip(self.states.iter_mut()) {
            let Some(weapon) = weapon else {
                continue;
            };

            weapon.update_weapon_state(cx, state, delta_time, flags);
            if state.status != WeaponStatus::Firing || state.cooldown_time > 0.0 {
                continue;
            }

            let target_position = weapon.base().fire_params().target_position;
            let position = muzzle.translation;
            let projectile_id = match weapon.params().weapon_type {
                WeaponType::Projectile => projectile_net_entity_id(
                    self.owner_id,
                    weapon.weapon_index(),
                    state.activation_count.wrapping_add(1),
                ),
                _ => NetEntityId::INVALID,
            };
            let event = ActivateEvent {
                initial_transform: Transform::new(Quat::from_look_direction(target_position - position), position),
                target_position,
                shooter_id: self.owner_id,
                projectile_id,
            };

            debug!(owner = %self.owner_id, weapon = weapon.weapon_index().0, replay = flags.is_replay(), "weapon activation");
            weapon.activate(cx, delta_time, state, &event, flags);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
