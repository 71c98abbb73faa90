//! Collision detection for 2D rigid bodies: a dynamic AABB tree broad phase,
//! GJK distance queries, conservative advancement casts
//! and contact manifolds with stable point identities.

/// Open a profiler zone that lasts until the end of the enclosing scope.
/// Compiles to a no-op unless the `tracy` feature is on and a profiler is connected.
macro_rules! tracy_span {
    ($name:literal, $fn_name:literal) => {
        tracy_client::Client::running()
            .map(|client| client.span_alloc(Some($name), $fn_name, file!(), line!(), 0))
    };
}

pub mod math;
pub use math::{uv, Angle, Rot, Sweep, Transform, Vec2};

pub mod settings;

pub mod collision;
pub use collision::{
    aabb::{RayCastInput, RayCastOutput, AABB},
    broadphase::BroadPhase,
    distance::{
        distance, shape_cast, test_overlap, DistanceInput, DistanceOutput, DistanceProxy,
        ShapeCastInput, ShapeCastOutput, SimplexCache,
    },
    manifold::{
        point_states, ContactFeature, ContactId, FeatureType, Manifold, ManifoldPoint,
        ManifoldType, PointState, WorldManifold,
    },
    narrowphase::{collide, pair_order, PairOrder},
    shape::{Chain, Circle, Edge, Polygon, Shape, ShapeType},
    toi::{time_of_impact, ToiInput, ToiOutput, ToiState},
    tree::{DynamicTree, ProxyId, TreeParams},
    CollisionError,
};
