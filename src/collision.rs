//! Collision detection: shapes, distance queries, contact manifolds
//! and the dynamic AABB tree used as the broad phase.

pub mod aabb;
pub use aabb::{RayCastInput, RayCastOutput, AABB};

pub mod shape;
pub use shape::{Chain, Circle, Edge, Polygon, Shape, ShapeType};

pub mod distance;
pub use distance::{DistanceProxy, SimplexCache};

pub mod toi;

pub mod manifold;
pub use manifold::{ContactId, Manifold, PointState, WorldManifold};

pub mod narrowphase;

pub mod tree;
pub use tree::{DynamicTree, ProxyId, TreeParams};

pub mod broadphase;
pub use broadphase::BroadPhase;

/// Errors from constructing shapes or querying with degenerate input.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CollisionError {
    #[error("Ray has zero length")]
    DegenerateRay,
    #[error("Polygon needs between 3 and {max} vertices, got {count}", max = crate::settings::MAX_POLYGON_VERTICES)]
    PolygonVertexCount { count: usize },
    #[error("Polygon points are too close together or collinear to form a hull")]
    DegeneratePolygon,
    #[error("Chain needs at least {min} vertices, got {count}")]
    ChainVertexCount { count: usize, min: usize },
    #[error("Chain vertices {index} and {} are too close together", .index + 1)]
    ChainVerticesTooClose { index: usize },
}
