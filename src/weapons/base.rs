//! Weapon Base
//!
//! Shared activation policy for every weapon variant, the [`Weapon`] trait
//! the variants implement, and the listener seam through which activations
//! and hits leave the weapon.
//!
//! ## Fresh activations and replays
//!
//! A fresh activation validates the replicated state (must be `Firing` with
//! no cooldown), advances it, and notifies listeners. A replay re-runs the
//! same state transition without validation and without notifying anyone,
//! so reconciliation never plays a sound or applies damage twice.

use tracing::debug;

use crate::core::entity::NetEntityId;
use crate::core::math::{Vec3, Transform};
use crate::error::WeaponConfigError;
use crate::weapons::gather::{self, GatherContext, IntersectResults, NetEntityIdSet, ShotResult};
use crate::weapons::projectile::{ProjectileLaunch, ProjectileWeapon};
use crate::weapons::trace::TraceWeapon;
use crate::weapons::types::{
    ActivateEvent, ActiveShot, FireParams, HitEntity, HitEvent, WeaponActivationInfo,
    WeaponHitInfo, WeaponIndex, WeaponParams, WeaponState, WeaponStatus, WeaponType,
    MAX_HIT_ENTITIES,
};

// =============================================================================
// LISTENER
// =============================================================================

/// Receives everything a weapon produces.
pub trait WeaponListener {
    /// A weapon activated (muzzle flash, fire sound).
    fn on_activate(&mut self, info: &WeaponActivationInfo);

    /// Locally predicted hits (impact effects, authority damage).
    fn on_predict_hit(&mut self, info: &WeaponHitInfo);

    /// Hits confirmed by the authority.
    fn on_confirm_hit(&mut self, info: &WeaponHitInfo);

    /// A projectile weapon wants a projectile entity spawned.
    fn on_launch_projectile(&mut self, _launch: &ProjectileLaunch) {}
}

/// Listener that keeps everything it receives, in order.
#[derive(Clone, Debug, Default)]
pub struct WeaponEventLog {
    /// Activations
    pub activations: Vec<WeaponActivationInfo>,
    /// Predicted hit batches
    pub predicted_hits: Vec<WeaponHitInfo>,
    /// Confirmed hit batches
    pub confirmed_hits: Vec<WeaponHitInfo>,
    /// Projectile spawn requests
    pub launches: Vec<ProjectileLaunch>,
}

impl WeaponEventLog {
    /// Total number of notifications received.
    pub fn len(&self) -> usize {
        self.activations.len() + self.predicted_hits.len() + self.confirmed_hits.len() + self.launches.len()
    }

    /// Whether nothing was received.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything received so far.
    pub fn clear(&mut self) {
        self.activations.clear();
        self.predicted_hits.clear();
        self.confirmed_hits.clear();
        self.launches.clear();
    }
}

impl WeaponListener for WeaponEventLog {
    fn on_activate(&mut self, info: &WeaponActivationInfo) {
        self.activations.push(info.clone());
    }

    fn on_predict_hit(&mut self, info: &WeaponHitInfo) {
        self.predicted_hits.push(info.clone());
    }

    fn on_confirm_hit(&mut self, info: &WeaponHitInfo) {
        self.confirmed_hits.push(info.clone());
    }

    fn on_launch_projectile(&mut self, launch: &ProjectileLaunch) {
        self.launches.push(launch.clone());
    }
}

// =============================================================================
// CONTEXT / FLAGS
// =============================================================================

/// Host collaborators for one weapon call.
pub struct WeaponContext<'a> {
    /// Physics and network time
    pub gather: GatherContext<'a>,
    /// Where activations and hits go
    pub listener: &'a mut dyn WeaponListener,
}

/// What an activation is allowed to emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivationFlags {
    /// Validate state and dispatch hits (false for replays)
    pub dispatch_hit_events: bool,
    /// Notify `on_activate`
    pub dispatch_activate_events: bool,
    /// Skip the instant gather (hits arrive from elsewhere)
    pub force_skip_gather: bool,
}

impl ActivationFlags {
    /// A new activation on the simulating host.
    pub const FRESH: Self = Self {
        dispatch_hit_events: true,
        dispatch_activate_events: true,
        force_skip_gather: false,
    };

    /// Re-simulation of an already processed input.
    pub const REPLAY: Self = Self {
        dispatch_hit_events: false,
        dispatch_activate_events: false,
        force_skip_gather: false,
    };

    /// Whether this is a replay.
    #[inline]
    pub fn is_replay(&self) -> bool {
        !self.dispatch_hit_events
    }
}

// =============================================================================
// WEAPON TRAIT
// =============================================================================

/// A weapon variant.
///
/// Runtime state lives in a [`WeaponState`] owned by the weapon-bearing
/// entity; the weapon itself holds only its definition and per-fire scratch.
pub trait Weapon {
    /// Shared data.
    fn base(&self) -> &BaseWeapon;

    /// Shared data, mutable.
    fn base_mut(&mut self) -> &mut BaseWeapon;

    /// Run one activation.
    fn activate(
        &mut self,
        cx: &mut WeaponContext<'_>,
        delta_time: f32,
        state: &mut WeaponState,
        event: &ActivateEvent,
        flags: ActivationFlags,
    );

    /// Advance in-flight shots.
    fn tick_active_shots(
        &mut self,
        cx: &mut WeaponContext<'_>,
        state: &mut WeaponState,
        delta_time: f32,
        flags: ActivationFlags,
    );

    /// Cool down and advance in-flight shots.
    fn update_weapon_state(
        &mut self,
        cx: &mut WeaponContext<'_>,
        state: &mut WeaponState,
        delta_time: f32,
        flags: ActivationFlags,
    ) {
        state.cooldown_time = (state.cooldown_time - delta_time).max(0.0);
        self.tick_active_shots(cx, state, delta_time, flags);
    }

    /// Slot on the owner.
    fn weapon_index(&self) -> WeaponIndex {
        self.base().weapon_index()
    }

    /// Static definition.
    fn params(&self) -> &WeaponParams {
        self.base().params()
    }

    /// Request a shot. See [`BaseWeapon::try_start_fire`].
    fn try_start_fire(&mut self, state: &mut WeaponState, fire_params: FireParams) -> bool {
        self.base_mut().try_start_fire(state, fire_params)
    }
}

/// Build the weapon for a definition.
pub fn create_weapon(
    weapon_index: WeaponIndex,
    owner_id: NetEntityId,
    params: WeaponParams,
) -> Result<Box<dyn Weapon>, WeaponConfigError> {
    params.validate()?;
    let base = BaseWeapon::new(weapon_index, owner_id, params);
    match base.params().weapon_type {
        WeaponType::Trace => Ok(Box::new(TraceWeapon::new(base))),
        WeaponType::Projectile => Ok(Box::new(ProjectileWeapon::new(base))),
        WeaponType::None => Err(WeaponConfigError::NoWeaponType),
    }
}

// =============================================================================
// BASE WEAPON
// =============================================================================

/// Data and policy shared by every weapon variant.
#[derive(Clone, Debug)]
pub struct BaseWeapon {
    weapon_index: WeaponIndex,
    owner_id: NetEntityId,
    params: WeaponParams,
    fire_params: FireParams,
    gathered_net_entity_ids: NetEntityIdSet,
    client_hit_filter: NetEntityIdSet,
}

impl BaseWeapon {
    /// Create the shared part of a weapon.
    pub fn new(weapon_index: WeaponIndex, owner_id: NetEntityId, params: WeaponParams) -> Self {
        Self {
            weapon_index,
            owner_id,
            params,
            fire_params: FireParams::default(),
            gathered_net_entity_ids: NetEntityIdSet::new(),
            client_hit_filter: NetEntityIdSet::new(),
        }
    }

    /// Slot on the owner.
    pub fn weapon_index(&self) -> WeaponIndex {
        self.weapon_index
    }

    /// Entity carrying the weapon.
    pub fn owner_id(&self) -> NetEntityId {
        self.owner_id
    }

    /// Static definition.
    pub fn params(&self) -> &WeaponParams {
        &self.params
    }

    /// Parameters of the last accepted fire request.
    pub fn fire_params(&self) -> &FireParams {
        &self.fire_params
    }

    /// Entities excluded from this weapon's gathers (always the owner).
    pub fn gathered_net_entity_ids(&self) -> &NetEntityIdSet {
        &self.gathered_net_entity_ids
    }

    /// Restrict dispatched hits to entities the client reported.
    ///
    /// Used by the authority when confirming a client's activation: a hit the
    /// client's own trace did not produce is dropped. An empty set disables
    /// the restriction.
    pub fn set_client_hit_filter(&mut self, ids: NetEntityIdSet) {
        self.client_hit_filter = ids;
    }

    /// Whether the weapon is ready for a transition requiring `required`.
    pub fn can_start_next_event(&self, state: &WeaponState, required: WeaponStatus) -> bool {
        state.status == required && state.cooldown_time <= 0.0
    }

    /// Accept a fire request when idle and cooled down.
    pub fn try_start_fire(&mut self, state: &mut WeaponState, fire_params: FireParams) -> bool {
        if !self.can_start_next_event(state, WeaponStatus::Idle) {
            debug!(
                weapon = self.weapon_index.0,
                status = ?state.status,
                cooldown = state.cooldown_time,
                "fire request rejected"
            );
            return false;
        }

        state.status = WeaponStatus::Firing;
        state.cooldown_time = 0.0;
        self.fire_params = fire_params;
        self.gathered_net_entity_ids.clear();
        self.gathered_net_entity_ids.insert(self.owner_id);
        true
    }

    /// Shared activation transition.
    ///
    /// With `validate`, requires `Firing` and no cooldown. On success starts
    /// the cooldown, returns to `Idle` and bumps the activation count.
    pub fn activate_internal(&mut self, state: &mut WeaponState, validate: bool) -> bool {
        if validate && !self.can_start_next_event(state, WeaponStatus::Firing) {
            debug!(
                weapon = self.weapon_index.0,
                status = ?state.status,
                cooldown = state.cooldown_time,
                "activation rejected"
            );
            return false;
        }

        // Replays arrive without a preceding fire request on this host
        if !self.gathered_net_entity_ids.contains(&self.owner_id) {
            self.gathered_net_entity_ids.insert(self.owner_id);
        }

        state.cooldown_time = self.params.cooldown_time_ms * 0.001;
        state.status = WeaponStatus::Idle;
        state.activation_count = state.activation_count.wrapping_add(1);
        true
    }

    /// Instant gather along the activation's aim.
    pub fn gather_entities(&self, ctx: &GatherContext<'_>, event: &ActivateEvent) -> IntersectResults {
        gather::gather_entities(ctx, &self.params.gather_params, event, &self.gathered_net_entity_ids)
    }

    /// Advance one travelling shot.
    pub fn gather_entities_multisegment(
        &self,
        ctx: &GatherContext<'_>,
        delta_time: f32,
        shot: &mut ActiveShot,
    ) -> ShotResult {
        gather::gather_entities_multisegment(
            ctx,
            &self.params.gather_params,
            &self.gathered_net_entity_ids,
            delta_time,
            shot,
        )
    }

    /// Package gather results as one hit batch and hand it to the listener.
    pub fn dispatch_hit_events(
        &self,
        listener: &mut dyn WeaponListener,
        results: &IntersectResults,
        initial_transform: &Transform,
        target_position: Vec3,
        shooter_id: NetEntityId,
    ) {
        let hit_entities: Vec<HitEntity> = results
            .iter()
            .filter(|hit| self.client_hit_filter.is_empty() || self.client_hit_filter.contains(&hit.entity_id))
            .take(MAX_HIT_ENTITIES)
            .map(|hit| HitEntity {
                hit_position: hit.position,
                hit_normal: hit.normal,
                hit_net_entity_id: hit.entity_id,
            })
            .collect();

        let info = WeaponHitInfo {
            weapon_index: self.weapon_index,
            damage_effect: self.params.damage_effect,
            gather_origin: initial_transform.translation,
            hit_event: HitEvent {
                hit_transform: Transform::new(initial_transform.rotation, target_position),
                shooter_id,
                projectile_id: NetEntityId::INVALID,
                hit_entities,
            },
        };
        listener.on_predict_hit(&info);
    }

    /// Notify the listener of an activation.
    pub fn dispatch_activate_event(&self, listener: &mut dyn WeaponListener, event: &ActivateEvent) {
        listener.on_activate(&WeaponActivationInfo {
            weapon_index: self.weapon_index,
            activate_event: *event,
        });
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn trace_params(cooldown_ms: f32) -> WeaponParams {
        WeaponParams {
            weapon_type: WeaponType::Trace,
            cooldown_time_ms: cooldown_ms,
            ..Default::default()
        }
    }

    #[test]
    fn test_try_start_fire_requires_idle_and_cooled_down() {
        let owner = NetEntityId::new(4);
        let mut weapon = BaseWeapon::new(WeaponIndex::PRIMARY, owner, trace_params(500.0));
        let mut state = WeaponState::default();

        assert!(weapon.try_start_fire(&mut state, FireParams::default()));
        assert_eq!(state.status, WeaponStatus::Firing);
        assert!(weapon.gathered_net_entity_ids().contains(&owner));

        // Already firing
        assert!(!weapon.try_start_fire(&mut state, FireParams::default()));

        assert!(weapon.activate_internal(&mut state, true));
        assert_eq!(state.status, WeaponStatus::Idle);
        assert!((state.cooldown_time - 0.5).abs() < 1.0e-6);

        // Cooling down
        assert!(!weapon.try_start_fire(&mut state, FireParams::default()));
    }

    #[test]
    fn test_activate_internal_validation() {
        let mut weapon = BaseWeapon::new(WeaponIndex::PRIMARY, NetEntityId::new(1), trace_params(0.0));
        let mut state = WeaponState::default();

        // Idle: validated activation refused, replay accepted
        assert!(!weapon.activate_internal(&mut state, true));
        assert_eq!(state.activation_count, 0);
        assert!(weapon.activate_internal(&mut state, false));
        assert_eq!(state.activation_count, 1);
    }

    #[test]
    fn test_activation_count_wraps() {
        let mut weapon = BaseWeapon::new(WeaponIndex::PRIMARY, NetEntityId::new(1), trace_params(0.0));
        let mut state = WeaponState { activation_count: u8::MAX, ..Default::default() };
        assert!(weapon.activate_internal(&mut state, false));
        assert_eq!(state.activation_count, 0);
    }

    #[test]
    fn test_dispatch_respects_client_hit_filter() {
        use crate::weapons::gather::IntersectResult;

        let mut weapon = BaseWeapon::new(WeaponIndex::SECONDARY, NetEntityId::new(1), trace_params(0.0));
        let results: IntersectResults = [2u64, 3]
            .into_iter()
            .map(|id| IntersectResult {
                position: Vec3::new(0.0, id as f32, 0.0),
                normal: -Vec3::Y,
                entity_id: NetEntityId::new(id),
                material: String::new(),
            })
            .collect();

        let mut log = WeaponEventLog::default();
        weapon.dispatch_hit_events(&mut log, &results, &Transform::IDENTITY, Vec3::Y * 10.0, NetEntityId::new(1));
        assert_eq!(log.predicted_hits[0].hit_event.hit_entities.len(), 2);

        weapon.set_client_hit_filter([NetEntityId::new(3)].into_iter().collect());
        weapon.dispatch_hit_events(&mut log, &results, &Transform::IDENTITY, Vec3::Y * 10.0, NetEntityId::new(1));
        let second = &log.predicted_hits[1];
        assert_eq!(second.hit_event.hit_entities.len(), 1);
        assert_eq!(second.hit_event.hit_entities[0].hit_net_entity_id, NetEntityId::new(3));
        assert_eq!(second.weapon_index, WeaponIndex::SECONDARY);
        assert_eq!(second.hit_event.hit_transform.translation, Vec3::Y * 10.0);
    }

    #[test]
    fn test_create_weapon_factory() {
        let owner = NetEntityId::new(1);
        let trace = create_weapon(WeaponIndex::PRIMARY, owner, trace_params(100.0)).unwrap();
        assert_eq!(trace.params().weapon_type, WeaponType::Trace);

        let projectile = WeaponParams {
            weapon_type: WeaponType::Projectile,
            ..trace_params(100.0)
        };
        assert!(create_weapon(WeaponIndex::SECONDARY, owner, projectile).is_ok());

        assert!(matches!(
            create_weapon(WeaponIndex::PRIMARY, owner, WeaponParams::default()),
            Err(WeaponConfigError::NoWeaponType)
        ));
    }
}
