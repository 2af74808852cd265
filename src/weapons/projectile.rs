//! Projectile Weapon
//!
//! A projectile weapon does not track shots itself. Each activation asks the
//! host (through [`WeaponListener::on_launch_projectile`]) to spawn an
//! independent [`Projectile`] entity that sweeps itself forward every tick
//! and reports a single confirmed hit on impact.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::entity::NetEntityId;
use crate::core::math::{Vec3, Transform};
use crate::weapons::base::{ActivationFlags, BaseWeapon, Weapon, WeaponContext, WeaponListener};
use crate::weapons::gather::{
    GatherContext, HitMultiple, IntersectFilter, IntersectShape, NetEntityIdSet, QueryType, SHOT_GRAVITY,
};
use crate::weapons::types::{
    projectile_net_entity_id, ActivateEvent, GatherParams, HitEffect, HitEntity, HitEvent, WeaponHitInfo,
    WeaponIndex, WeaponState, MAX_SHOT_LIFETIME_SEC,
};

// =============================================================================
// LAUNCH REQUEST
// =============================================================================

/// Request to spawn a projectile entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectileLaunch {
    /// Entity id the projectile will carry
    pub projectile_id: NetEntityId,
    /// Who fired it
    pub shooter_id: NetEntityId,
    /// Weapon slot that fired it
    pub weapon_index: WeaponIndex,
    /// Launch pose
    pub initial_transform: Transform,
    /// Launch velocity
    pub velocity: Vec3,
    /// Sweep configuration
    pub gather_params: GatherParams,
    /// Damage on impact
    pub damage_effect: HitEffect,
    /// Prefab to spawn
    pub asset: String,
}

// =============================================================================
// WEAPON
// =============================================================================

/// Weapon that launches projectile entities.
#[derive(Clone, Debug)]
pub struct ProjectileWeapon {
    base: BaseWeapon,
}

impl ProjectileWeapon {
    /// Wrap shared weapon data.
    pub fn new(base: BaseWeapon) -> Self {
        Self { base }
    }
}

impl Weapon for ProjectileWeapon {
    fn base(&self) -> &BaseWeapon {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseWeapon {
        &mut self.base
    }

    fn activate(
        &mut self,
        cx: &mut WeaponContext<'_>,
        _delta_time: f32,
        state: &mut WeaponState,
        event: &ActivateEvent,
        flags: ActivationFlags,
    ) {
        if !self.base.activate_internal(state, flags.dispatch_hit_events) {
            return;
        }

        // The projectile from the original activation already exists
        if flags.is_replay() {
            return;
        }

        if flags.dispatch_activate_events {
            self.base.dispatch_activate_event(cx.listener, event);
        }

        let projectile_id = if event.projectile_id.is_valid() {
            event.projectile_id
        } else {
            projectile_net_entity_id(event.shooter_id, self.base.weapon_index(), state.activation_count)
        };

        let params = self.base.params();
        let direction = (event.target_position - event.initial_transform.translation).normalize_or_zero();
        cx.listener.on_launch_projectile(&ProjectileLaunch {
            projectile_id,
            shooter_id: event.shooter_id,
            weapon_index: self.base.weapon_index(),
            initial_transform: event.initial_transform,
            velocity: direction * params.gather_params.travel_speed,
            gather_params: params.gather_params.clone(),
            damage_effect: params.damage_effect,
            asset: params.projectile_asset.clone(),
        });
    }

    fn tick_active_shots(
        &mut self,
        _cx: &mut WeaponContext<'_>,
        _state: &mut WeaponState,
        _delta_time: f32,
        _flags: ActivationFlags,
    ) {
        // Projectiles are entities that tick themselves
    }
}

// =============================================================================
// PROJECTILE ENTITY
// =============================================================================

/// Outcome of one projectile tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectileStatus {
    /// Still flying
    Flying,
    /// Hit something and is done
    Impacted,
    /// Reached its maximum lifetime without hitting anything
    Expired,
}

/// A self-simulating projectile.
#[derive(Clone, Debug)]
pub struct Projectile {
    launch: ProjectileLaunch,
    position: Vec3,
    velocity: Vec3,
    lifetime: f32,
    max_lifetime: f32,
    predicted: bool,
}

impl Projectile {
    /// Spawn from a launch request. A predicted projectile is visual only and
    /// never confirms hits.
    pub fn new(launch: ProjectileLaunch, predicted: bool) -> Self {
        let speed = launch.gather_params.travel_speed;
        let max_lifetime = if speed > 0.0 {
            (launch.gather_params.cast_distance / speed).min(MAX_SHOT_LIFETIME_SEC)
        } else {
            0.0
        };
        Self {
            position: launch.initial_transform.translation,
            velocity: launch.velocity,
            lifetime: 0.0,
            max_lifetime,
            predicted,
            launch,
        }
    }

    /// Entity id.
    pub fn id(&self) -> NetEntityId {
        self.launch.projectile_id
    }

    /// Current position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Seconds flown so far.
    pub fn lifetime(&self) -> f32 {
        self.lifetime
    }

    /// Whether this is a client-side prediction.
    pub fn is_predicted(&self) -> bool {
        self.predicted
    }

    /// The launch this projectile was spawned from.
    pub fn launch(&self) -> &ProjectileLaunch {
        &self.launch
    }

    /// Sweep forward by `delta_time`.
    pub fn tick(
        &mut self,
        ctx: &GatherContext<'_>,
        listener: &mut dyn WeaponListener,
        delta_time: f32,
    ) -> ProjectileStatus {
        let gravity = if self.launch.gather_params.bullet_drop { SHOT_GRAVITY } else { Vec3::ZERO };
        let next_velocity = self.velocity + gravity * delta_time;
        let next_position = self.position + (self.velocity + next_velocity) * (0.5 * delta_time);

        let mut excluded = NetEntityIdSet::new();
        excluded.insert(self.launch.shooter_id);
        excluded.insert(self.launch.projectile_id);

        let filter = IntersectFilter::new(
            Transform::new(self.launch.initial_transform.rotation, self.position),
            next_position - self.position,
            QueryType::StaticAndDynamic,
            HitMultiple::No,
            self.launch.gather_params.hit_mask,
            excluded,
            IntersectShape::from_gather(&self.launch.gather_params),
            &ctx.network_time,
        );

        let origin = self.position;
        let impact = ctx
            .physics
            .intersect(&filter)
            .into_iter()
            .filter(|hit| !filter.is_filtered(hit.entity_id))
            .min_by(|a, b| {
                a.position
                    .distance_squared(origin)
                    .total_cmp(&b.position.distance_squared(origin))
            });

        if let Some(hit) = impact {
            self.position = hit.position;
            if !self.predicted {
                listener.on_confirm_hit(&WeaponHitInfo {
                    weapon_index: self.launch.weapon_index,
                    damage_effect: self.launch.damage_effect,
                    gather_origin: self.launch.initial_transform.translation,
                    hit_event: HitEvent {
                        hit_transform: Transform::new(self.launch.initial_transform.rotation, hit.position),
                        shooter_id: self.launch.shooter_id,
                        projectile_id: self.launch.projectile_id,
                        hit_entities: vec![HitEntity {
                            hit_position: hit.position,
                            hit_normal: hit.normal,
                            hit_net_entity_id: hit.entity_id,
                        }],
                    },
                });
            }
            return ProjectileStatus::Impacted;
        }

        self.position = next_position;
        self.velocity = next_velocity;
        self.lifetime += delta_time;
        if self.lifetime >= self.max_lifetime {
            return ProjectileStatus::Expired;
        }
        ProjectileStatus::Flying
    }
}

/// Every live projectile on a host, keyed by entity id.
#[derive(Clone, Debug, Default)]
pub struct ProjectileSet {
    projectiles: BTreeMap<NetEntityId, Projectile>,
}

impl ProjectileSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a projectile. An id already in flight is replaced.
    pub fn spawn(&mut self, launch: ProjectileLaunch, predicted: bool) {
        let projectile = Projectile::new(launch, predicted);
        debug!(projectile = %projectile.id(), predicted, "projectile launched");
        self.projectiles.insert(projectile.id(), projectile);
    }

    /// Remove a projectile. Returns false if unknown.
    pub fn remove(&mut self, id: NetEntityId) -> bool {
        self.projectiles.remove(&id).is_some()
    }

    /// Look up a projectile.
    pub fn get(&self, id: NetEntityId) -> Option<&Projectile> {
        self.projectiles.get(&id)
    }

    /// Whether `id` is in flight.
    pub fn contains(&self, id: NetEntityId) -> bool {
        self.projectiles.contains_key(&id)
    }

    /// Projectiles in flight.
    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    /// Tick every projectile in id order, removing those that finished.
    /// Returns the finished ids with their final status.
    pub fn tick(
        &mut self,
        ctx: &GatherContext<'_>,
        listener: &mut dyn WeaponListener,
        delta_time: f32,
    ) -> Vec<(NetEntityId, ProjectileStatus)> {
        let mut finished = Vec::new();
        for (id, projectile) in self.projectiles.iter_mut() {
            let status = projectile.tick(ctx, listener, delta_time);
            if status != ProjectileStatus::Flying {
                finished.push((*id, status));
            }
        }
        for (id, _) in &finished {
            self.projectiles.remove(id);
        }
        finished
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::HostFrameId;
    use crate::weapons::base::WeaponEventLog;
    use crate::weapons::gather::NetworkTime;
    use crate::weapons::types::{FireParams, WeaponParams, WeaponType};
    use crate::weapons::world::SimpleWorld;

    const SHOOTER: NetEntityId = NetEntityId::new(1);

    fn launcher() -> ProjectileWeapon {
        let params = WeaponParams {
            weapon_type: WeaponType::Projectile,
            cooldown_time_ms: 500.0,
            projectile_asset: "energy_ball".into(),
            gather_params: GatherParams {
                travel_speed: 20.0,
                cast_distance: 10.0,
                bullet_drop: false,
                ..Default::default()
            },
            damage_effect: HitEffect { hit_magnitude: 25.0, ..Default::default() },
            ..Default::default()
        };
        ProjectileWeapon::new(BaseWeapon::new(WeaponIndex::SECONDARY, SHOOTER, params))
    }

    fn event() -> ActivateEvent {
        ActivateEvent {
            initial_transform: Transform::IDENTITY,
            target_position: Vec3::new(0.0, 10.0, 0.0),
            shooter_id: SHOOTER,
            projectile_id: NetEntityId::INVALID,
        }
    }

    #[test]
    fn test_activation_requests_launch() {
        let world = SimpleWorld::new();
        let mut log = WeaponEventLog::default();
        let mut state = WeaponState::default();
        let mut weapon = launcher();

        assert!(weapon.try_start_fire(&mut state, FireParams::default()));
        let mut cx = WeaponContext {
            gather: GatherContext::new(&world, NetworkTime::default(), 3),
            listener: &mut log,
        };
        weapon.activate(&mut cx, 0.1, &mut state, &event(), ActivationFlags::FRESH);

        assert_eq!(log.activations.len(), 1);
        assert_eq!(log.launches.len(), 1);
        let launch = &log.launches[0];
        assert_eq!(launch.projectile_id, projectile_net_entity_id(SHOOTER, WeaponIndex::SECONDARY, 1));
        assert!(launch.velocity.abs_diff_eq(Vec3::new(0.0, 20.0, 0.0), 1.0e-5));
        assert_eq!(launch.asset, "energy_ball");
        assert!(state.active_shots.is_empty());
    }

    #[test]
    fn test_replay_launches_nothing() {
        let world = SimpleWorld::new();
        let mut log = WeaponEventLog::default();
        let mut state = WeaponState::default();
        let mut weapon = launcher();

        let mut cx = WeaponContext {
            gather: GatherContext::new(&world, NetworkTime::default(), 3),
            listener: &mut log,
        };
        weapon.activate(&mut cx, 0.1, &mut state, &event(), ActivationFlags::REPLAY);

        assert!(log.is_empty());
        assert_eq!(state.activation_count, 1);
        assert!((state.cooldown_time - 0.5).abs() < 1.0e-6);
    }

    fn launch_at(world_target: NetEntityId) -> ProjectileLaunch {
        ProjectileLaunch {
            projectile_id: projectile_net_entity_id(SHOOTER, WeaponIndex::PRIMARY, 1),
            shooter_id: SHOOTER,
            weapon_index: WeaponIndex::PRIMARY,
            initial_transform: Transform::IDENTITY,
            velocity: Vec3::new(0.0, 10.0, 0.0),
            gather_params: GatherParams {
                travel_speed: 10.0,
                cast_distance: 5.0,
                bullet_drop: false,
                ..Default::default()
            },
            damage_effect: HitEffect { hit_magnitude: 10.0, ..Default::default() },
            asset: format!("ball-{}", world_target.0),
        }
    }

    #[test]
    fn test_projectile_impacts_first_non_owner_body() {
        let mut world = SimpleWorld::new();
        world.add_dynamic_sphere(SHOOTER, Vec3::ZERO, 0.5);
        let target = NetEntityId::new(7);
        world.add_dynamic_sphere(target, Vec3::new(0.0, 3.0, 0.0), 0.5);

        let ctx = GatherContext::new(&world, NetworkTime::live(HostFrameId(0)), 3);
        let mut log = WeaponEventLog::default();
        let mut set = ProjectileSet::new();
        set.spawn(launch_at(target), false);

        let mut finished = Vec::new();
        for _ in 0..10 {
            finished.extend(set.tick(&ctx, &mut log, 0.1));
        }

        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].1, ProjectileStatus::Impacted);
        assert!(set.is_empty());
        assert_eq!(log.confirmed_hits.len(), 1);
        let hit = &log.confirmed_hits[0].hit_event;
        assert_eq!(hit.hit_entities[0].hit_net_entity_id, target);
        assert_eq!(hit.projectile_id, launch_at(target).projectile_id);
    }

    #[test]
    fn test_predicted_projectile_never_confirms() {
        let mut world = SimpleWorld::new();
        let target = NetEntityId::new(7);
        world.add_dynamic_sphere(target, Vec3::new(0.0, 1.0, 0.0), 0.5);

        let ctx = GatherContext::new(&world, NetworkTime::default(), 3);
        let mut log = WeaponEventLog::default();
        let mut projectile = Projectile::new(launch_at(target), true);

        assert_eq!(projectile.tick(&ctx, &mut log, 0.1), ProjectileStatus::Impacted);
        assert!(log.is_empty());
    }

    #[test]
    fn test_projectile_expires_at_range() {
        let world = SimpleWorld::new();
        let ctx = GatherContext::new(&world, NetworkTime::default(), 3);
        let mut log = WeaponEventLog::default();
        let mut projectile = Projectile::new(launch_at(NetEntityId::new(0)), false);

        // 5 units at 10 u/s
        let mut ticks = 0;
        while projectile.tick(&ctx, &mut log, 0.1) == ProjectileStatus::Flying {
            ticks += 1;
            assert!(ticks < 100);
        }
        assert!((projectile.lifetime() - 0.5).abs() < 0.11);
        assert!(log.is_empty());
    }

    #[test]
    fn test_bullet_drop_curves_down() {
        let world = SimpleWorld::new();
        let ctx = GatherContext::new(&world, NetworkTime::default(), 3);
        let mut log = WeaponEventLog::default();
        let mut launch = launch_at(NetEntityId::new(0));
        launch.gather_params.bullet_drop = true;
        let mut projectile = Projectile::new(launch, false);

        projectile.tick(&ctx, &mut log, 0.1);
        assert!(projectile.position().z < 0.0);
        assert!((projectile.position().y - 1.0).abs() < 1.0e-5);
    }
}
