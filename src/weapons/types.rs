//! Weapon Data Types
//!
//! Definitions shared by every weapon variant: static parameters loaded from
//! settings, replicated runtime state, and the activation/hit payloads that
//! flow to listeners.

use serde::{Serialize, Deserialize};

use crate::core::entity::NetEntityId;
use crate::core::hash::{StateHasher, StateDigest};
use crate::core::math::{Vec3, Transform};
use crate::error::WeaponConfigError;
use crate::weapons::gather::IntersectResults;

/// Maximum weapons attached to one entity.
pub const MAX_WEAPONS_PER_COMPONENT: usize = 2;

/// Maximum entities a single shot can hit.
pub const MAX_HIT_ENTITIES: usize = 48;

/// Upper bound on a travelling shot's lifetime, seconds.
pub const MAX_SHOT_LIFETIME_SEC: f32 = 120.0;

/// Index of a weapon on its owning entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct WeaponIndex(pub u8);

impl WeaponIndex {
    /// Primary fire slot
    pub const PRIMARY: Self = Self(0);
    /// Secondary fire slot
    pub const SECONDARY: Self = Self(1);
}

// =============================================================================
// ENUMS
// =============================================================================

/// Weapon implementation selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponType {
    /// No weapon
    #[default]
    None,
    /// Hit-scan or travelling trace
    Trace,
    /// Spawns an independent projectile entity
    Projectile,
}

/// Replicated weapon status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeaponStatus {
    /// Ready for a fire request
    #[default]
    Idle,
    /// Fire requested, waiting for activation
    Firing,
}

/// Observable lifecycle phase of a weapon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeaponPhase {
    /// Nothing pending
    Idle,
    /// Fire accepted, activation not yet run
    Activating,
    /// At least one shot still travelling
    Travelling,
}

/// Primitive swept by a gather.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatherShape {
    /// Ray cast
    #[default]
    Point,
    /// Box cast
    Box,
    /// Sphere cast
    Sphere,
    /// Cylinder cast
    Cylinder,
    /// Capsule cast
    Capsule,
}

// =============================================================================
// STATIC PARAMETERS
// =============================================================================

/// How a weapon gathers hits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatherParams {
    /// Swept primitive
    pub shape: GatherShape,
    /// Cast distance, or maximum travel for travelling shots
    pub cast_distance: f32,
    /// Cast/gather angle
    pub cast_angle: f32,
    /// Size of the swept primitive (radius or half extent); ignored for points
    pub cast_radius: f32,
    /// Shot speed for target leading; 0 means instant hit
    pub travel_speed: f32,
    /// Keep gathering after the first hit
    pub multi_hit: bool,
    /// Follow a gravity arc
    pub bullet_drop: bool,
    /// Collision layers this weapon hits
    pub hit_mask: u64,
}

impl Default for GatherParams {
    fn default() -> Self {
        Self {
            shape: GatherShape::Point,
            cast_distance: 1.0,
            cast_angle: 0.0,
            cast_radius: 0.0,
            travel_speed: 0.0,
            multi_hit: false,
            bullet_drop: true,
            hit_mask: u64::MAX,
        }
    }
}

impl GatherParams {
    /// Whether shots travel across ticks instead of resolving instantly.
    #[inline]
    pub fn is_multi_segment(&self) -> bool {
        self.travel_speed > 0.0
    }
}

/// Damage distribution for hits.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitEffect {
    /// Base amount applied to hit entities
    pub hit_magnitude: f32,
    /// Distance scalar
    pub hit_falloff: f32,
    /// Falloff exponent (0 disables falloff)
    pub hit_exponent: f32,
}

impl Default for HitEffect {
    fn default() -> Self {
        Self {
            hit_magnitude: 0.0,
            hit_falloff: 1.0,
            hit_exponent: 0.0,
        }
    }
}

impl HitEffect {
    /// Amount applied to an entity `distance` away from the hit point.
    pub fn magnitude_at(&self, distance: f32) -> f32 {
        if self.hit_exponent == 0.0 {
            return self.hit_magnitude;
        }
        let scaled = 1.0 + self.hit_falloff.max(0.0) * distance.max(0.0);
        self.hit_magnitude / scaled.powf(self.hit_exponent)
    }
}

/// Static weapon definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponParams {
    /// Implementation selector
    pub weapon_type: WeaponType,
    /// Milliseconds before the weapon can activate again
    pub cooldown_time_ms: f32,
    /// Effect played on activation
    pub activate_fx: String,
    /// Effect played at the impact point
    pub impact_fx: String,
    /// Effect played per hit entity (authority only)
    pub damage_fx: String,
    /// Projectile prefab for projectile weapons
    pub projectile_asset: String,
    /// Gather configuration
    pub gather_params: GatherParams,
    /// Damage applied to hit entities
    pub damage_effect: HitEffect,
    /// Whether autonomous clients predict this weapon
    pub locally_predicted: bool,
}

impl Default for WeaponParams {
    fn default() -> Self {
        Self {
            weapon_type: WeaponType::None,
            cooldown_time_ms: 0.0,
            activate_fx: String::new(),
            impact_fx: String::new(),
            damage_fx: String::new(),
            projectile_asset: String::new(),
            gather_params: GatherParams::default(),
            damage_effect: HitEffect::default(),
            locally_predicted: true,
        }
    }
}

impl WeaponParams {
    /// Check the definition can be simulated.
    pub fn validate(&self) -> Result<(), WeaponConfigError> {
        if self.weapon_type == WeaponType::None {
            return Err(WeaponConfigError::NoWeaponType);
        }
        if !(self.cooldown_time_ms.is_finite() && self.cooldown_time_ms >= 0.0) {
            return Err(WeaponConfigError::InvalidCooldown(self.cooldown_time_ms));
        }
        let gather = &self.gather_params;
        if !(gather.travel_speed.is_finite() && gather.travel_speed >= 0.0) {
            return Err(WeaponConfigError::InvalidTravelSpeed(gather.travel_speed));
        }
        if !(gather.cast_distance.is_finite() && gather.cast_distance > 0.0) {
            return Err(WeaponConfigError::InvalidCastDistance(gather.cast_distance));
        }
        if gather.is_multi_segment() {
            let needed = gather.cast_distance / gather.travel_speed;
            if needed > MAX_SHOT_LIFETIME_SEC {
                return Err(WeaponConfigError::RangeExceedsLifetime {
                    needed,
                    limit: MAX_SHOT_LIFETIME_SEC,
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// RUNTIME STATE
// =============================================================================

/// One travelling shot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveShot {
    /// Pose at launch
    pub initial_transform: Transform,
    /// Aimed end position
    pub target_position: Vec3,
    /// Seconds travelled so far
    pub lifetime: f32,
    /// Hits gathered so far, dispatched together on termination
    pub gathered: IntersectResults,
}

impl ActiveShot {
    /// Shot leaving `initial_transform` toward `target_position`.
    pub fn new(initial_transform: Transform, target_position: Vec3) -> Self {
        Self {
            initial_transform,
            target_position,
            lifetime: 0.0,
            gathered: IntersectResults::new(),
        }
    }
}

/// Per-weapon runtime state owned by the weapon-bearing entity's controller.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct WeaponState {
    /// Activations so far (wraps)
    pub activation_count: u8,
    /// Seconds until the next activation may occur
    pub cooldown_time: f32,
    /// Replicated status
    pub status: WeaponStatus,
    /// In-flight shots; removal reorders the remaining shots
    pub active_shots: Vec<ActiveShot>,
}

impl WeaponState {
    /// Observable lifecycle phase.
    pub fn phase(&self) -> WeaponPhase {
        match self.status {
            WeaponStatus::Firing => WeaponPhase::Activating,
            WeaponStatus::Idle if !self.active_shots.is_empty() => WeaponPhase::Travelling,
            WeaponStatus::Idle => WeaponPhase::Idle,
        }
    }

    /// Digest over every field, including in-flight shots.
    pub fn digest(&self) -> StateDigest {
        let mut hasher = StateHasher::for_weapon_state();
        hasher.update_u8(self.activation_count);
        hasher.update_f32(self.cooldown_time);
        hasher.update_u8(self.status as u8);
        hasher.update_u32(self.active_shots.len() as u32);
        for shot in &self.active_shots {
            hasher.update_transform(&shot.initial_transform);
            hasher.update_vec3(shot.target_position);
            hasher.update_f32(shot.lifetime);
            hasher.update_u32(shot.gathered.len() as u32);
            for hit in &shot.gathered {
                hasher.update_u64(hit.entity_id.0);
                hasher.update_vec3(hit.position);
            }
        }
        hasher.finalize()
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Fire request parameters.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct FireParams {
    /// Where the shooter is aiming
    pub target_position: Vec3,
    /// Homing target, if any
    pub target_id: NetEntityId,
}

/// One weapon activation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivateEvent {
    /// Pose of the weapon muzzle
    pub initial_transform: Transform,
    /// Aimed position
    pub target_position: Vec3,
    /// Shooter
    pub shooter_id: NetEntityId,
    /// Spawned projectile, or invalid for trace weapons
    pub projectile_id: NetEntityId,
}

/// One entity hit by a shot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HitEntity {
    /// Where the entity was hit
    pub hit_position: Vec3,
    /// Surface normal at the hit
    pub hit_normal: Vec3,
    /// Entity that was hit
    pub hit_net_entity_id: NetEntityId,
}

/// A batch of hits from one shot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HitEvent {
    /// Pose of the hit (shot rotation at the aimed position)
    pub hit_transform: Transform,
    /// Shooter
    pub shooter_id: NetEntityId,
    /// Projectile, or invalid for trace weapons
    pub projectile_id: NetEntityId,
    /// Entities hit
    pub hit_entities: Vec<HitEntity>,
}

/// Activation delivered to listeners.
#[derive(Clone, Debug, PartialEq)]
pub struct WeaponActivationInfo {
    /// Weapon slot on the owner
    pub weapon_index: WeaponIndex,
    /// Activation payload
    pub activate_event: ActivateEvent,
}

/// Hit batch delivered to listeners.
#[derive(Clone, Debug, PartialEq)]
pub struct WeaponHitInfo {
    /// Weapon slot on the owner
    pub weapon_index: WeaponIndex,
    /// Damage distribution of the weapon
    pub damage_effect: HitEffect,
    /// Where the gather started
    pub gather_origin: Vec3,
    /// Hits
    pub hit_event: HitEvent,
}

/// Projectile entity id for an activation.
///
/// Derived from the shooter, slot and activation count so that a predicting
/// client and the authority name the same projectile identically.
pub fn projectile_net_entity_id(
    shooter_id: NetEntityId,
    weapon_index: WeaponIndex,
    activation_count: u8,
) -> NetEntityId {
    const PROJECTILE_ID_BIT: u64 = 1 << 62;
    let raw = (shooter_id.0 << 16) | ((weapon_index.0 as u64) << 8) | activation_count as u64;
    NetEntityId::new((raw & !(0b11 << 62)) | PROJECTILE_ID_BIT)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn trace_params() -> WeaponParams {
        WeaponParams {
            weapon_type: WeaponType::Trace,
            cooldown_time_ms: 250.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_phase_follows_status_and_shots() {
        let mut state = WeaponState::default();
        assert_eq!(state.phase(), WeaponPhase::Idle);

        state.status = WeaponStatus::Firing;
        assert_eq!(state.phase(), WeaponPhase::Activating);

        state.status = WeaponStatus::Idle;
        state.active_shots.push(ActiveShot::new(Transform::IDENTITY, Vec3::Y));
        assert_eq!(state.phase(), WeaponPhase::Travelling);
    }

    #[test]
    fn test_validate_rejects_unreachable_range() {
        let mut params = trace_params();
        assert!(params.validate().is_ok());

        params.gather_params.travel_speed = 1.0;
        params.gather_params.cast_distance = 500.0;
        assert!(matches!(
            params.validate(),
            Err(WeaponConfigError::RangeExceedsLifetime { .. })
        ));

        params.gather_params.travel_speed = -1.0;
        assert_eq!(params.validate(), Err(WeaponConfigError::InvalidTravelSpeed(-1.0)));
    }

    #[test]
    fn test_validate_rejects_none() {
        assert_eq!(WeaponParams::default().validate(), Err(WeaponConfigError::NoWeaponType));
    }

    #[test]
    fn test_hit_effect_falloff() {
        let flat = HitEffect { hit_magnitude: 20.0, ..Default::default() };
        assert_eq!(flat.magnitude_at(100.0), 20.0);

        let falling = HitEffect { hit_magnitude: 20.0, hit_falloff: 1.0, hit_exponent: 1.0 };
        assert_eq!(falling.magnitude_at(0.0), 20.0);
        assert_eq!(falling.magnitude_at(1.0), 10.0);
    }

    #[test]
    fn test_digest_tracks_shots() {
        let mut a = WeaponState::default();
        let b = a.clone();
        assert_eq!(a.digest(), b.digest());

        a.active_shots.push(ActiveShot::new(Transform::IDENTITY, Vec3::Y));
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_projectile_ids_are_distinct_per_activation() {
        let shooter = NetEntityId::new(7);
        let a = projectile_net_entity_id(shooter, WeaponIndex::PRIMARY, 1);
        let b = projectile_net_entity_id(shooter, WeaponIndex::PRIMARY, 2);
        let c = projectile_net_entity_id(shooter, WeaponIndex::SECONDARY, 1);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(a.is_valid());
        assert_eq!(a, projectile_net_entity_id(shooter, WeaponIndex::PRIMARY, 1));
    }
}
