//! Reference Physics Backend
//!
//! Sphere bodies with per-frame pose history. Enough to drive the weapon
//! engine headless (demo binary, tests, benchmarks) while a host engine
//! supplies its own [`PhysicsQuery`] in production.
//!
//! Dynamic bodies record their position each host frame via
//! [`SimpleWorld::record_frame`]. A query pinned to a rewind frame tests
//! each dynamic body at the latest recorded pose at or before that frame.

use std::collections::BTreeMap;

use crate::core::entity::{NetEntityId, HostFrameId};
use crate::core::math::Vec3;
use crate::weapons::gather::{HitMultiple, IntersectFilter, IntersectResult, IntersectResults, PhysicsQuery};

/// Frames of pose history kept per dynamic body.
pub const POSE_HISTORY_FRAMES: usize = 64;

/// Default collision layer for new bodies.
pub const DEFAULT_COLLISION_LAYER: u64 = 1;

/// Whether a body moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    /// World geometry
    Static,
    /// Players, projectiles, props
    Dynamic,
}

/// A sphere collider.
#[derive(Clone, Debug)]
pub struct WorldBody {
    /// Network identity reported on hit
    pub id: NetEntityId,
    /// Static or dynamic
    pub kind: BodyKind,
    /// Current centre
    pub position: Vec3,
    /// Sphere radius
    pub radius: f32,
    /// Collision layer bits
    pub collision_layer: u64,
    /// Material reported on hit
    pub material: String,
    history: BTreeMap<HostFrameId, Vec3>,
}

/// In-memory collision world.
#[derive(Clone, Debug, Default)]
pub struct SimpleWorld {
    bodies: BTreeMap<NetEntityId, WorldBody>,
}

impl SimpleWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a static sphere (walls, pillars).
    pub fn add_static_sphere(&mut self, id: NetEntityId, center: Vec3, radius: f32, material: &str) {
        self.insert(id, BodyKind::Static, center, radius, material);
    }

    /// Add a dynamic sphere (players).
    pub fn add_dynamic_sphere(&mut self, id: NetEntityId, center: Vec3, radius: f32) {
        self.insert(id, BodyKind::Dynamic, center, radius, "flesh");
    }

    fn insert(&mut self, id: NetEntityId, kind: BodyKind, position: Vec3, radius: f32, material: &str) {
        self.bodies.insert(
            id,
            WorldBody {
                id,
                kind,
                position,
                radius,
                collision_layer: DEFAULT_COLLISION_LAYER,
                material: material.to_string(),
                history: BTreeMap::new(),
            },
        );
    }

    /// Remove a body. Returns false if unknown.
    pub fn remove_body(&mut self, id: NetEntityId) -> bool {
        self.bodies.remove(&id).is_some()
    }

    /// Move a body. Returns false if unknown.
    pub fn set_position(&mut self, id: NetEntityId, position: Vec3) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.position = position;
                true
            }
            None => false,
        }
    }

    /// Set the collision layer of a body.
    pub fn set_collision_layer(&mut self, id: NetEntityId, layer: u64) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.collision_layer = layer;
                true
            }
            None => false,
        }
    }

    /// Look up a body.
    pub fn body(&self, id: NetEntityId) -> Option<&WorldBody> {
        self.bodies.get(&id)
    }

    /// Snapshot every dynamic body's pose for `frame`.
    pub fn record_frame(&mut self, frame: HostFrameId) {
        for body in self.bodies.values_mut() {
            if body.kind != BodyKind::Dynamic {
                continue;
            }
            body.history.insert(frame, body.position);
            while body.history.len() > POSE_HISTORY_FRAMES {
                body.history.pop_first();
            }
        }
    }

    fn pose_at(body: &WorldBody, rewind: Option<HostFrameId>) -> Vec3 {
        match (body.kind, rewind) {
            (BodyKind::Dynamic, Some(frame)) => body
                .history
                .range(..=frame)
                .next_back()
                .map(|(_, pos)| *pos)
                .unwrap_or(body.position),
            _ => body.position,
        }
    }
}

impl PhysicsQuery for SimpleWorld {
    fn intersect(&self, filter: &IntersectFilter) -> IntersectResults {
        let origin = filter.origin();
        let sweep = filter.sweep();
        let query = filter.query_type();
        let inflate = filter.shape().bounding_radius();

        let mut hits: Vec<(f32, IntersectResult)> = Vec::new();
        for body in self.bodies.values() {
            let tested = match body.kind {
                BodyKind::Static => query.hits_static(),
                BodyKind::Dynamic => query.hits_dynamic(),
            };
            if !tested || body.collision_layer & filter.collision_mask() == 0 || filter.is_filtered(body.id) {
                continue;
            }

            let center = Self::pose_at(body, filter.rewind_frame_id());
            if let Some(t) = segment_sphere(origin, sweep, center, body.radius + inflate) {
                let position = origin + sweep * t;
                hits.push((
                    t,
                    IntersectResult {
                        position,
                        normal: (position - center).normalize_or_zero(),
                        entity_id: body.id,
                        material: body.material.clone(),
                    },
                ));
            }
        }

        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        if filter.hit_multiple() == HitMultiple::No {
            hits.truncate(1);
        }
        hits.into_iter().map(|(_, hit)| hit).collect()
    }
}

/// Earliest fraction in `[0, 1]` at which the segment `origin + t * sweep`
/// touches the sphere. A segment starting inside reports 0.
fn segment_sphere(origin: Vec3, sweep: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let m = origin - center;
    let c = m.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }

    let a = sweep.length_squared();
    if a <= f32::EPSILON {
        return None;
    }

    let b = m.dot(sweep);
    let disc = b * b - a * c;
    if disc < 0.0 {
        return None;
    }

    let t = (-b - disc.sqrt()) / a;
    (0.0..=1.0).contains(&t).then_some(t)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::math::Transform;
    use crate::weapons::gather::{IntersectShape, NetEntityIdSet, NetworkTime, QueryType};

    fn ray(origin: Vec3, sweep: Vec3, multiple: HitMultiple, time: NetworkTime) -> IntersectFilter {
        IntersectFilter::new(
            Transform::from_translation(origin),
            sweep,
            QueryType::StaticAndDynamic,
            multiple,
            u64::MAX,
            NetEntityIdSet::new(),
            IntersectShape::Ray,
            &time,
        )
    }

    #[test]
    fn test_segment_sphere() {
        let hit = segment_sphere(Vec3::ZERO, Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, 5.0, 0.0), 1.0);
        assert!((hit.unwrap() - 0.4).abs() < 1.0e-6);

        assert_eq!(segment_sphere(Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, 5.0, 0.0), 1.0), None);
        assert_eq!(segment_sphere(Vec3::ZERO, Vec3::new(0.0, 10.0, 0.0), Vec3::new(5.0, 5.0, 0.0), 1.0), None);
        assert_eq!(segment_sphere(Vec3::ZERO, Vec3::Y, Vec3::ZERO, 1.0), Some(0.0));
    }

    #[test]
    fn test_closest_first_and_single_hit() {
        let mut world = SimpleWorld::new();
        world.add_dynamic_sphere(NetEntityId::new(2), Vec3::new(0.0, 8.0, 0.0), 0.5);
        world.add_dynamic_sphere(NetEntityId::new(1), Vec3::new(0.0, 4.0, 0.0), 0.5);
        let time = NetworkTime::live(HostFrameId(0));

        let all = world.intersect(&ray(Vec3::ZERO, Vec3::new(0.0, 20.0, 0.0), HitMultiple::Yes, time));
        let ids: Vec<u64> = all.iter().map(|h| h.entity_id.0).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(all[0].normal.abs_diff_eq(-Vec3::Y, 1.0e-5));

        let first = world.intersect(&ray(Vec3::ZERO, Vec3::new(0.0, 20.0, 0.0), HitMultiple::No, time));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].entity_id, NetEntityId::new(1));
    }

    #[test]
    fn test_rewind_uses_recorded_pose() {
        let mut world = SimpleWorld::new();
        let target = NetEntityId::new(9);
        world.add_dynamic_sphere(target, Vec3::new(0.0, 5.0, 0.0), 0.5);
        world.record_frame(HostFrameId(10));

        // Target steps out of the line of fire
        world.set_position(target, Vec3::new(5.0, 5.0, 0.0));
        world.record_frame(HostFrameId(11));

        let sweep = Vec3::new(0.0, 10.0, 0.0);
        let live = world.intersect(&ray(Vec3::ZERO, sweep, HitMultiple::No, NetworkTime::live(HostFrameId(11))));
        assert!(live.is_empty());

        let rewound = world.intersect(&ray(Vec3::ZERO, sweep, HitMultiple::No, NetworkTime::rewound_to(HostFrameId(10))));
        assert_eq!(rewound.len(), 1);
        assert_eq!(rewound[0].entity_id, target);
    }

    #[test]
    fn test_query_type_and_mask() {
        let mut world = SimpleWorld::new();
        world.add_static_sphere(NetEntityId::new(1), Vec3::new(0.0, 3.0, 0.0), 0.5, "stone");
        world.set_collision_layer(NetEntityId::new(1), 0b10);

        let filter = IntersectFilter::new(
            Transform::IDENTITY,
            Vec3::new(0.0, 10.0, 0.0),
            QueryType::StaticAndDynamic,
            HitMultiple::Yes,
            0b01,
            NetEntityIdSet::new(),
            IntersectShape::Ray,
            &NetworkTime::default(),
        );
        assert!(world.intersect(&filter).is_empty());

        let filter = IntersectFilter::new(
            Transform::IDENTITY,
            Vec3::new(0.0, 10.0, 0.0),
            QueryType::Dynamic,
            HitMultiple::Yes,
            u64::MAX,
            NetEntityIdSet::new(),
            IntersectShape::Ray,
            &NetworkTime::default(),
        );
        assert!(world.intersect(&filter).is_empty());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut world = SimpleWorld::new();
        world.add_dynamic_sphere(NetEntityId::new(1), Vec3::ZERO, 0.5);
        for frame in 0..(POSE_HISTORY_FRAMES as u32 + 10) {
            world.record_frame(HostFrameId(frame));
        }
        let body = world.body(NetEntityId::new(1)).unwrap();
        assert_eq!(body.history.len(), POSE_HISTORY_FRAMES);
    }
}
