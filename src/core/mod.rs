//! Core primitives.
//!
//! Engine-neutral building blocks shared by the weapon and match modules.

pub mod entity;
pub mod math;
pub mod rng;
pub mod hash;

// Re-export core types
pub use entity::{NetEntityId, HostFrameId};
pub use math::{Vec3, Quat, Transform};
pub use rng::DeterministicRng;
pub use hash::{StateHasher, StateDigest};
