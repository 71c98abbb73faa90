//! Global tolerances and limits shared by the collision algorithms.
//!
//! Lengths are in meters. The values are tuned for objects
//! roughly between 0.1 and 10 meters in size.

/// Machine epsilon used for near-zero checks.
pub const EPSILON: f64 = f64::EPSILON;

/// Collision and constraint tolerance.
/// Contacts are considered resolved when shapes overlap by this much.
pub const LINEAR_SLOP: f64 = 0.005;

/// The skin radius of polygons and edges.
/// Keeps polygons slightly apart so that GJK works on the cores
/// instead of having to deal with overlapping shapes.
pub const POLYGON_RADIUS: f64 = 2.0 * LINEAR_SLOP;

/// Maximum number of contact points between two convex shapes.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Maximum number of vertices on a convex polygon.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Fattening of AABBs stored in the dynamic tree,
/// so that small movements don't trigger reinsertion.
pub const AABB_MARGIN: f64 = 0.1;

/// How far ahead of a moving proxy its fat AABB is extended,
/// as a multiple of the displacement per step.
pub const AABB_MULTIPLIER: f64 = 4.0;

/// Iteration cap for the GJK distance and shape cast loops.
pub const MAX_GJK_ITERATIONS: usize = 20;

/// Iteration cap for the outer time of impact loop.
pub const MAX_TOI_ITERATIONS: usize = 20;

/// Iteration cap for the time of impact root finder.
pub const MAX_TOI_ROOT_ITERATIONS: usize = 50;
