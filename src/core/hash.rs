//! State Digests
//!
//! SHA-256 digests of simulation state. Used to check that a replayed
//! activation leaves a weapon in exactly the state the fresh one did, and
//! to fingerprint results payloads in logs.

use sha2::{Sha256, Digest};
use super::math::{Vec3, Quat, Transform};

/// Digest output type (256 bits / 32 bytes)
pub type StateDigest = [u8; 32];

/// Incremental hasher for simulation state.
///
/// Order of updates is part of the digest.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Hasher for weapon runtime state.
    pub fn for_weapon_state() -> Self {
        Self::new(b"ARENA_GEM_WEAPON_V1")
    }

    /// Hasher for match results payloads.
    pub fn for_match_results() -> Self {
        Self::new(b"ARENA_GEM_RESULTS_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u16 value (little-endian).
    #[inline]
    pub fn update_u16(&mut self, value: u16) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with the exact bit pattern of an f32.
    #[inline]
    pub fn update_f32(&mut self, value: f32) {
        self.update_u32(value.to_bits());
    }

    /// Update with a vector.
    #[inline]
    pub fn update_vec3(&mut self, value: Vec3) {
        self.update_f32(value.x);
        self.update_f32(value.y);
        self.update_f32(value.z);
    }

    /// Update with a rotation.
    #[inline]
    pub fn update_quat(&mut self, value: Quat) {
        self.update_f32(value.x);
        self.update_f32(value.y);
        self.update_f32(value.z);
        self.update_f32(value.w);
    }

    /// Update with a pose.
    pub fn update_transform(&mut self, value: &Transform) {
        self.update_quat(value.rotation);
        self.update_vec3(value.translation);
    }

    /// Update with a string (length-prefixed).
    pub fn update_str(&mut self, value: &str) {
        self.update_u32(value.len() as u32);
        self.hasher.update(value.as_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> StateDigest {
        self.hasher.finalize().into()
    }
}

// =============================================================================
// TESTS
// =============================================================================
