//! Client Prediction
//!
//! The autonomous client runs its own weapons immediately on input instead
//! of waiting for the authority. Every processed input is kept until the
//! authority acknowledges it. When authoritative weapon state arrives:
//!
//! 1. inputs up to and including the acknowledged one are dropped
//! 2. the weapon state is overwritten with the authority's
//! 3. the remaining inputs are replayed on top, with every side effect
//!    suppressed ([`ActivationFlags::REPLAY`])
//!
//! Projectiles the client launched speculatively are tracked until the
//! authority's projectile for the same id shows up, at which point the
//! predicted one is discarded.

use std::collections::{BTreeSet, VecDeque};
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use crate::core::entity::NetEntityId;
use crate::core::math::Transform;
use crate::weapons::base::{ActivationFlags, WeaponContext, WeaponListener};
use crate::weapons::controller::{WeaponInput, WeaponStates, WeaponsController};
use crate::weapons::projectile::{ProjectileLaunch, ProjectileSet};
use crate::weapons::types::{WeaponActivationInfo, WeaponHitInfo};

/// Inputs kept while waiting for acknowledgement.
pub const INPUT_HISTORY_LIMIT: usize = 128;

/// Client input sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct InputId(pub u32);

/// One processed input.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictedInput {
    /// Sequence number
    pub input_id: InputId,
    /// Muzzle pose when the input was processed
    pub muzzle: Transform,
    /// Buttons and aim
    pub input: WeaponInput,
    /// Tick length
    pub delta_time: f32,
}

/// Weapons of the locally controlled player.
#[derive(Debug)]
pub struct PredictedWeapons {
    controller: WeaponsController,
    history: VecDeque<PredictedInput>,
    predicted_projectiles: BTreeSet<NetEntityId>,
    last_acked: Option<InputId>,
}

impl PredictedWeapons {
    /// Wrap the local player's weapons.
    pub fn new(controller: WeaponsController) -> Self {
        Self {
            controller,
            history: VecDeque::new(),
            predicted_projectiles: BTreeSet::new(),
            last_acked: None,
        }
    }

    /// Underlying weapons.
    pub fn controller(&self) -> &WeaponsController {
        &self.controller
    }

    /// Inputs not yet acknowledged.
    pub fn pending_inputs(&self) -> usize {
        self.history.len()
    }

    /// Last input the authority acknowledged.
    pub fn last_acked(&self) -> Option<InputId> {
        self.last_acked
    }

    /// Projectiles launched locally and not yet confirmed.
    pub fn predicted_projectiles(&self) -> &BTreeSet<NetEntityId> {
        &self.predicted_projectiles
    }

    /// Run a new local input with full effects.
    ///
    /// Projectile launches reach the listener as usual; the host spawns them
    /// as predicted projectiles.
    pub fn process_local_input(&mut self, cx: &mut WeaponContext<'_>, input: PredictedInput) {
        if self.last_acked.is_some_and(|acked| input.input_id <= acked) {
            debug!(input = input.input_id.0, "ignoring already acknowledged input");
            return;
        }

        let mut tap = LaunchTap {
            inner: &mut *cx.listener,
            launched: Vec::new(),
        };
        let mut tapped = WeaponContext {
            gather: cx.gather,
            listener: &mut tap,
        };
        self.controller
            .process_input(&mut tapped, &input.muzzle, &input.input, input.delta_time, ActivationFlags::FRESH);
        self.predicted_projectiles.extend(tap.launched);

        if self.history.len() >= INPUT_HISTORY_LIMIT {
            warn!(limit = INPUT_HISTORY_LIMIT, "input history full, dropping oldest unacknowledged input");
            self.history.pop_front();
        }
        self.history.push_back(input);
    }

    /// Reconcile with the authority.
    ///
    /// `states` is the authority's weapon state after processing `acked`.
    /// Returns the number of inputs replayed.
    pub fn on_authoritative_state(
        &mut self,
        cx: &mut WeaponContext<'_>,
        acked: InputId,
        states: WeaponStates,
    ) -> usize {
        if self.last_acked.is_some_and(|last| acked < last) {
            debug!(acked = acked.0, "ignoring stale authoritative state");
            return 0;
        }
        self.last_acked = Some(acked);

        while self.history.front().is_some_and(|input| input.input_id <= acked) {
            self.history.pop_front();
        }

        self.controller.restore_states(states);
        for input in &self.history {
            self.controller
                .process_input(cx, &input.muzzle, &input.input, input.delta_time, ActivationFlags::REPLAY);
        }

        debug!(acked = acked.0, replayed = self.history.len(), "reconciled weapon state");
        self.history.len()
    }

    /// The authority's projectile `id` exists; drop the local prediction.
    pub fn on_projectile_confirmed(&mut self, id: NetEntityId, projectiles: &mut ProjectileSet) -> bool {
        if !self.predicted_projectiles.remove(&id) {
            return false;
        }
        projectiles.remove(id);
        true
    }
}

/// Forwards everything and remembers launched projectile ids.
struct LaunchTap<'a> {
    inner: &'a mut dyn WeaponListener,
    launched: Vec<NetEntityId>,
}

impl WeaponListener for LaunchTap<'_> {
    fn on_activate(&mut self, info: &WeaponActivationInfo) {
        self.inner.on_activate(info);
    }

    fn on_predict_hit(&mut self, info: &WeaponHitInfo) {
        self.inner.on_predict_hit(info);
    }

    fn on_confirm_hit(&mut self, info: &WeaponHitInfo) {
        self.inner.on_confirm_hit(info);
    }

    fn on_launch_projectile(&mut self, launch: &ProjectileLaunch) {
        self.launched.push(launch.projectile_id);
        self.inner.on_launch_projectile(launch);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::HostFrameId;
    use crate::core::math::Vec3;
    use crate::weapons::base::WeaponEventLog;
    use crate::weapons::gather::{GatherContext, NetworkTime};
    use crate::weapons::types::{GatherParams, WeaponIndex, WeaponParams, WeaponType};
    use crate::weapons::world::SimpleWorld;

    const PLAYER: NetEntityId = NetEntityId::new(1);

    fn weapons() -> PredictedWeapons {
        let definitions = [
            WeaponParams {
                weapon_type: WeaponType::Trace,
                cooldown_time_ms: 100.0,
                gather_params: GatherParams {
                    travel_speed: 10.0,
                    cast_distance: 5.0,
                    bullet_drop: false,
                    ..Default::default()
                },
                ..Default::default()
            },
            WeaponParams {
                weapon_type: WeaponType::Projectile,
                cooldown_time_ms: 1000.0,
                gather_params: GatherParams { travel_speed: 20.0, cast_distance: 40.0, ..Default::default() },
                ..Default::default()
            },
        ];
        PredictedWeapons::new(WeaponsController::new(PLAYER, &definitions).unwrap())
    }

    fn input(id: u32, index: WeaponIndex) -> PredictedInput {
        PredictedInput {
            input_id: InputId(id),
            muzzle: Transform::IDENTITY,
            input: WeaponInput::fire(index, Vec3::new(0.0, 50.0, 0.0)),
            delta_time: 0.1,
        }
    }

    fn context<'a>(world: &'a SimpleWorld, log: &'a mut WeaponEventLog) -> WeaponContext<'a> {
        WeaponContext {
            gather: GatherContext::new(world, NetworkTime::live(HostFrameId(0)), 3),
            listener: log,
        }
    }

    #[test]
    fn test_reconcile_with_matching_state_is_invisible() {
        let world = SimpleWorld::new();
        let mut log = WeaponEventLog::default();
        let mut predicted = weapons();

        predicted.process_local_input(&mut context(&world, &mut log), input(1, WeaponIndex::PRIMARY));
        let after_first = predicted.controller().states().clone();
        for id in 2..=4 {
            predicted.process_local_input(&mut context(&world, &mut log), input(id, WeaponIndex::PRIMARY));
        }
        let predicted_digest = predicted.controller().states()[0].digest();
        let effects_before = log.len();

        let replayed = predicted.on_authoritative_state(&mut context(&world, &mut log), InputId(1), after_first);

        assert_eq!(replayed, 3);
        assert_eq!(predicted.pending_inputs(), 3);
        assert_eq!(predicted.controller().states()[0].digest(), predicted_digest);
        assert_eq!(log.len(), effects_before);
    }

    #[test]
    fn test_reconcile_applies_authority_correction() {
        let world = SimpleWorld::new();
        let mut log = WeaponEventLog::default();
        let mut predicted = weapons();

        predicted.process_local_input(&mut context(&world, &mut log), input(1, WeaponIndex::PRIMARY));
        assert_eq!(predicted.controller().states()[0].activation_count, 1);

        // The authority never saw the shot
        let replayed = predicted.on_authoritative_state(&mut context(&world, &mut log), InputId(1), Default::default());

        assert_eq!(replayed, 0);
        assert_eq!(predicted.controller().states()[0].activation_count, 0);
        assert!(predicted.controller().states()[0].active_shots.is_empty());
    }

    #[test]
    fn test_stale_and_acknowledged_inputs_ignored() {
        let world = SimpleWorld::new();
        let mut log = WeaponEventLog::default();
        let mut predicted = weapons();

        predicted.process_local_input(&mut context(&world, &mut log), input(5, WeaponIndex::PRIMARY));
        let states = predicted.controller().states().clone();
        predicted.on_authoritative_state(&mut context(&world, &mut log), InputId(5), states.clone());
        assert_eq!(predicted.last_acked(), Some(InputId(5)));

        predicted.process_local_input(&mut context(&world, &mut log), input(5, WeaponIndex::PRIMARY));
        assert_eq!(predicted.pending_inputs(), 0);

        assert_eq!(predicted.on_authoritative_state(&mut context(&world, &mut log), InputId(3), states), 0);
        assert_eq!(predicted.last_acked(), Some(InputId(5)));
    }

    #[test]
    fn test_predicted_projectile_discarded_on_confirmation() {
        let world = SimpleWorld::new();
        let mut log = WeaponEventLog::default();
        let mut predicted = weapons();
        let mut projectiles = ProjectileSet::new();

        predicted.process_local_input(&mut context(&world, &mut log), input(1, WeaponIndex::SECONDARY));
        assert_eq!(log.launches.len(), 1);
        let id = log.launches[0].projectile_id;
        projectiles.spawn(log.launches[0].clone(), true);
        assert!(predicted.predicted_projectiles().contains(&id));

        assert!(predicted.on_projectile_confirmed(id, &mut projectiles));
        assert!(projectiles.is_empty());
        assert!(!predicted.on_projectile_confirmed(id, &mut projectiles));
    }

    #[test]
    fn test_history_is_bounded() {
        let world = SimpleWorld::new();
        let mut log = WeaponEventLog::default();
        let mut predicted = weapons();

        for id in 0..(INPUT_HISTORY_LIMIT as u32 + 5) {
            let idle = PredictedInput { input: WeaponInput::default(), ..input(id, WeaponIndex::PRIMARY) };
            predicted.process_local_input(&mut context(&world, &mut log), idle);
        }
        assert_eq!(predicted.pending_inputs(), INPUT_HISTORY_LIMIT);
    }
}
