//! Hit Gathering
//!
//! Turns a weapon's aim into world hits through an external physics backend.
//!
//! ## Rewind consistency
//!
//! When the host is re-simulating a historical input the network time is
//! rewound, and every [`IntersectFilter`] built during that time carries the
//! rewound host frame. The [`PhysicsQuery`] backend must evaluate dynamic
//! bodies at their pose for that frame, so a lag-compensated hit is judged
//! against the world the shooter actually saw.

use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};

use crate::core::entity::{NetEntityId, HostFrameId};
use crate::core::math::{Vec3, Transform};
use crate::weapons::types::{ActivateEvent, ActiveShot, GatherParams, GatherShape, MAX_SHOT_LIFETIME_SEC};

/// Gravity applied to travelling shots with bullet drop.
pub const SHOT_GRAVITY: Vec3 = Vec3::new(0.0, 0.0, -9.81);

/// Entities excluded from a gather.
pub type NetEntityIdSet = BTreeSet<NetEntityId>;

/// Ordered hits from a gather.
pub type IntersectResults = Vec<IntersectResult>;

// =============================================================================
// NETWORK TIME
// =============================================================================

/// The host's view of simulation time during a gather.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct NetworkTime {
    /// Frame currently being simulated
    pub host_frame_id: HostFrameId,
    /// Whether the host is re-simulating a past frame
    pub rewound: bool,
}

impl NetworkTime {
    /// Present-time simulation at `frame`.
    pub const fn live(frame: HostFrameId) -> Self {
        Self {
            host_frame_id: frame,
            rewound: false,
        }
    }

    /// Re-simulation of historical `frame`.
    pub const fn rewound_to(frame: HostFrameId) -> Self {
        Self {
            host_frame_id: frame,
            rewound: true,
        }
    }

    /// Frame that dynamic bodies must be re-posed to, if any.
    #[inline]
    pub fn rewind_frame(&self) -> Option<HostFrameId> {
        self.rewound.then_some(self.host_frame_id)
    }
}

// =============================================================================
// INTERSECT FILTER
// =============================================================================

/// Which bodies a query tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryType {
    /// Static geometry only
    Static,
    /// Dynamic bodies only
    Dynamic,
    /// Both
    StaticAndDynamic,
}

impl QueryType {
    /// Whether static bodies are tested.
    pub fn hits_static(self) -> bool {
        matches!(self, QueryType::Static | QueryType::StaticAndDynamic)
    }

    /// Whether dynamic bodies are tested.
    pub fn hits_dynamic(self) -> bool {
        matches!(self, QueryType::Dynamic | QueryType::StaticAndDynamic)
    }
}

/// Stop at the first hit or keep going.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitMultiple {
    /// Report only the closest hit
    No,
    /// Report every hit along the sweep
    Yes,
}

/// Primitive swept by a query.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum IntersectShape {
    /// Infinitely thin ray
    Ray,
    /// Sphere of `radius`
    Sphere {
        /// Radius
        radius: f32,
    },
    /// Axis-aligned box
    Box {
        /// Half extents
        half_extents: Vec3,
    },
    /// Vertical capsule
    Capsule {
        /// Radius
        radius: f32,
        /// Total height
        height: f32,
    },
}

impl IntersectShape {
    /// Shape for a weapon's gather parameters.
    pub fn from_gather(params: &GatherParams) -> Self {
        let r = params.cast_radius.max(0.0);
        match params.shape {
            GatherShape::Point => IntersectShape::Ray,
            GatherShape::Sphere => IntersectShape::Sphere { radius: r },
            GatherShape::Box => IntersectShape::Box {
                half_extents: Vec3::new(r, r, r),
            },
            GatherShape::Cylinder | GatherShape::Capsule => IntersectShape::Capsule {
                radius: r,
                height: 2.0 * r,
            },
        }
    }

    /// Radius of the sphere enclosing this shape.
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            IntersectShape::Ray => 0.0,
            IntersectShape::Sphere { radius } => radius,
            IntersectShape::Box { half_extents } => half_extents.length(),
            IntersectShape::Capsule { radius, height } => radius.max(height * 0.5),
        }
    }
}

/// One fully specified physics query.
///
/// Fields are private and there are no setters; a filter is built once and
/// read by the backend.
#[derive(Debug)]
pub struct IntersectFilter {
    initial_pose: Transform,
    sweep: Vec3,
    query_type: QueryType,
    hit_multiple: HitMultiple,
    collision_mask: u64,
    filtered_net_entity_ids: NetEntityIdSet,
    shape: IntersectShape,
    rewind_frame_id: Option<HostFrameId>,
}

impl IntersectFilter {
    /// Build a filter, capturing the rewind frame from `network_time`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        initial_pose: Transform,
        sweep: Vec3,
        query_type: QueryType,
        hit_multiple: HitMultiple,
        collision_mask: u64,
        filtered_net_entity_ids: NetEntityIdSet,
        shape: IntersectShape,
        network_time: &NetworkTime,
    ) -> Self {
        Self {
            initial_pose,
            sweep,
            query_type,
            hit_multiple,
            collision_mask,
            filtered_net_entity_ids,
            shape,
            rewind_frame_id: network_time.rewind_frame(),
        }
    }

    /// Pose at the start of the sweep.
    pub fn initial_pose(&self) -> &Transform {
        &self.initial_pose
    }

    /// Sweep start position.
    pub fn origin(&self) -> Vec3 {
        self.initial_pose.translation
    }

    /// Displacement swept by the query.
    pub fn sweep(&self) -> Vec3 {
        self.sweep
    }

    /// Which bodies are tested.
    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// Single or multiple hits.
    pub fn hit_multiple(&self) -> HitMultiple {
        self.hit_multiple
    }

    /// Collision layers tested.
    pub fn collision_mask(&self) -> u64 {
        self.collision_mask
    }

    /// Entities that must never be reported.
    pub fn filtered_net_entity_ids(&self) -> &NetEntityIdSet {
        &self.filtered_net_entity_ids
    }

    /// Whether `id` is excluded.
    pub fn is_filtered(&self, id: NetEntityId) -> bool {
        self.filtered_net_entity_ids.contains(&id)
    }

    /// Swept primitive.
    pub fn shape(&self) -> IntersectShape {
        self.shape
    }

    /// Historical frame dynamic bodies must be posed at, if rewound.
    pub fn rewind_frame_id(&self) -> Option<HostFrameId> {
        self.rewind_frame_id
    }
}

// =============================================================================
// RESULTS / BACKEND
// =============================================================================

/// One reported hit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntersectResult {
    /// Contact point
    pub position: Vec3,
    /// Surface normal
    pub normal: Vec3,
    /// Entity hit (invalid for world geometry without a network identity)
    pub entity_id: NetEntityId,
    /// Physics material name
    pub material: String,
}

/// External physics query backend.
///
/// Implementations must honour every field of the filter, in particular
/// re-posing dynamic bodies to [`IntersectFilter::rewind_frame_id`] before
/// testing them. Bodies that cannot be resolved are simply not reported.
pub trait PhysicsQuery {
    /// Run one sweep and return hits in backend order.
    fn intersect(&self, filter: &IntersectFilter) -> IntersectResults;
}

/// Everything a gather needs from the host.
#[derive(Clone, Copy)]
pub struct GatherContext<'a> {
    /// Physics backend
    pub physics: &'a dyn PhysicsQuery,
    /// Current network time
    pub network_time: NetworkTime,
    /// Sub-segments swept per tick by travelling shots
    pub multitrace_segments: u32,
}

impl<'a> GatherContext<'a> {
    /// Context for a live (non-rewound) tick.
    pub fn new(physics: &'a dyn PhysicsQuery, network_time: NetworkTime, multitrace_segments: u32) -> Self {
        Self {
            physics,
            network_time,
            multitrace_segments: multitrace_segments.max(1),
        }
    }
}

/// Outcome of advancing a travelling shot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShotResult {
    /// The shot is finished and its hits should be dispatched
    ShouldTerminate,
    /// Keep ticking
    DoNotTerminate,
}

// =============================================================================
// GATHERS
// =============================================================================

/// Instantaneous gather along the activation's aim.
pub fn gather_entities(
    ctx: &GatherContext<'_>,
    gather_params: &GatherParams,
    event: &ActivateEvent,
    filtered: &NetEntityIdSet,
) -> IntersectResults {
    let start = event.initial_transform;
    let sweep = event.target_position - start.translation;

    let filter = IntersectFilter::new(
        start,
        sweep,
        QueryType::StaticAndDynamic,
        hit_multiple(gather_params),
        gather_params.hit_mask,
        filtered.clone(),
        IntersectShape::from_gather(gather_params),
        &ctx.network_time,
    );

    run_query(ctx.physics, &filter, gather_params.multi_hit)
}

/// Advance a travelling shot by `delta_time`.
///
/// The tick is split into `ctx.multitrace_segments` sweeps. New hits are
/// appended to `shot.gathered`; entities already gathered are excluded from
/// later segments so a multi-hit shot reports each entity once. Terminates
/// on the first hit for single-hit weapons, once the shot has travelled past
/// its cast distance, or when it outlives [`MAX_SHOT_LIFETIME_SEC`].
pub fn gather_entities_multisegment(
    ctx: &GatherContext<'_>,
    gather_params: &GatherParams,
    filtered: &NetEntityIdSet,
    delta_time: f32,
    shot: &mut ActiveShot,
) -> ShotResult {
    debug_assert!(
        gather_params.travel_speed > 0.0,
        "multi-segment gather needs a positive travel speed"
    );

    let origin = shot.initial_transform.translation;
    let rotation = shot.initial_transform.rotation;
    let direction = (shot.target_position - origin).normalize_or_zero();
    let gravity = if gather_params.bullet_drop { SHOT_GRAVITY } else { Vec3::ZERO };

    let segments = ctx.multitrace_segments.max(1);
    let segment_tick_size = delta_time / segments as f32;
    let step_offset = direction * gather_params.travel_speed;
    let max_travel_distance_sq = gather_params.cast_distance * gather_params.cast_distance;
    let shape = IntersectShape::from_gather(gather_params);

    let position_at = |t: f32| origin + step_offset * t + gravity * (0.5 * t * t);

    let mut excluded = filtered.clone();
    excluded.extend(shot.gathered.iter().map(|hit| hit.entity_id).filter(|id| id.is_valid()));

    let mut result = ShotResult::DoNotTerminate;
    let mut segment_start_time = shot.lifetime;
    let mut segment_start = position_at(segment_start_time);

    for _ in 0..segments {
        let next_start_time = segment_start_time + segment_tick_size;
        let travel_distance = step_offset * next_start_time;
        let next_position = position_at(next_start_time);

        let filter = IntersectFilter::new(
            Transform::new(rotation, segment_start),
            next_position - segment_start,
            QueryType::StaticAndDynamic,
            hit_multiple(gather_params),
            gather_params.hit_mask,
            excluded.clone(),
            shape,
            &ctx.network_time,
        );

        let hits = run_query(ctx.physics, &filter, gather_params.multi_hit);
        excluded.extend(hits.iter().map(|hit| hit.entity_id).filter(|id| id.is_valid()));
        shot.gathered.extend(hits);

        let blocked = !shot.gathered.is_empty() && !gather_params.multi_hit;
        if blocked || travel_distance.length_squared() > max_travel_distance_sq {
            result = ShotResult::ShouldTerminate;
            break;
        }

        segment_start_time = next_start_time;
        segment_start = next_position;
    }

    shot.lifetime += delta_time;
    if shot.lifetime > MAX_SHOT_LIFETIME_SEC {
        result = ShotResult::ShouldTerminate;
    }

    result
}

fn hit_multiple(params: &GatherParams) -> HitMultiple {
    if params.multi_hit {
        HitMultiple::Yes
    } else {
        HitMultiple::No
    }
}

/// Query the backend, then normalise: drop filtered entities the backend
/// let through, order by distance along the sweep, and keep only the
/// closest hit for single-hit queries.
fn run_query(physics: &dyn PhysicsQuery, filter: &IntersectFilter, multi_hit: bool) -> IntersectResults {
    let mut hits = physics.intersect(filter);
    hits.retain(|hit| !filter.is_filtered(hit.entity_id));

    let origin = filter.origin();
    let direction = filter.sweep().normalize_or_zero();
    hits.sort_by(|a, b| {
        let da = (a.position - origin).dot(direction);
        let db = (b.position - origin).dot(direction);
        da.total_cmp(&db)
    });

    if !multi_hit {
        hits.truncate(1);
    }
    hits
}

// =============================================================================
// TESTS
// =============================================================================
