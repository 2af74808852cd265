//! Weapon firing and hit resolution.
//!
//! - `types`: weapon definitions, replicated state and event payloads
//! - `gather`: physics queries for hit-scan and travelling shots
//! - `base` / `trace` / `projectile`: weapon variants
//! - `controller`: the weapons carried by one entity
//! - `predicted`: client-side speculative activation and reconciliation
//! - `world`: reference physics backend with pose history

pub mod types;
pub mod gather;
pub mod world;
pub mod base;
pub mod trace;
pub mod projectile;
pub mod controller;
pub mod predicted;

pub use types::{
    ActivateEvent, ActiveShot, FireParams, GatherParams, GatherShape, HitEffect, HitEntity, HitEvent,
    WeaponActivationInfo, WeaponHitInfo, WeaponIndex, WeaponParams, WeaponPhase, WeaponState,
    WeaponStatus, WeaponType, MAX_WEAPONS_PER_COMPONENT,
};
pub use gather::{
    GatherContext, IntersectFilter, IntersectResult, IntersectResults, NetEntityIdSet, NetworkTime,
    PhysicsQuery, ShotResult,
};
pub use world::SimpleWorld;
pub use base::{create_weapon, ActivationFlags, BaseWeapon, Weapon, WeaponContext, WeaponEventLog, WeaponListener};
pub use trace::TraceWeapon;
pub use projectile::{Projectile, ProjectileLaunch, ProjectileSet, ProjectileStatus, ProjectileWeapon};
pub use controller::{WeaponInput, WeaponStates, WeaponsController};
pub use predicted::{InputId, PredictedInput, PredictedWeapons};
