//! Contact manifolds between pairs of shapes.
//!
//! Every function takes shape A and B with their transforms and returns
//! a manifold in the local frames of the shapes.
//! An empty manifold means the shapes don't touch.

use super::{
    manifold::{
        clip_segment_to_line, ClipVertex, ContactFeature, ContactId, FeatureType, Manifold,
        ManifoldPoint, ManifoldType,
    },
    shape::{Chain, Circle, Edge, Polygon, Shape, ShapeType},
};
use crate::{
    math::{self as m, Transform, Vec2},
    settings::{EPSILON, LINEAR_SLOP, MAX_MANIFOLD_POINTS, MAX_POLYGON_VERTICES, POLYGON_RADIUS},
};

//
// Dispatch
//

/// Which way round a pair of shape types must be passed to [`collide`][self::collide].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairOrder {
    /// Collide as given.
    Primary,
    /// Swap the shapes before colliding.
    Swapped,
    /// These shapes never generate contacts.
    Unsupported,
}

/// Check which order a pair of shape types needs to be in to collide.
///
/// Shapes without area (edges and chains) don't collide with each other.
pub fn pair_order(type_a: ShapeType, type_b: ShapeType) -> PairOrder {
    use ShapeType::*;
    match (type_a, type_b) {
        (Circle, Circle)
        | (Polygon, Circle)
        | (Polygon, Polygon)
        | (Edge, Circle)
        | (Edge, Polygon)
        | (Chain, Circle)
        | (Chain, Polygon) => PairOrder::Primary,
        (Circle, Polygon)
        | (Circle, Edge)
        | (Polygon, Edge)
        | (Circle, Chain)
        | (Polygon, Chain) => PairOrder::Swapped,
        (Edge | Chain, Edge | Chain) => PairOrder::Unsupported,
    }
}

/// Compute the manifold between child `child_a` of shape A and child `child_b` of shape B.
///
/// Returns `None` if the pair isn't in [`Primary`][PairOrder::Primary] order.
/// Use [`pair_order`][self::pair_order] to find out which way round to pass them.
pub fn collide(
    shape_a: &Shape,
    child_a: usize,
    xf_a: &Transform,
    shape_b: &Shape,
    _child_b: usize,
    xf_b: &Transform,
) -> Option<Manifold> {
    let _span = tracy_span!("collide", "collide");

    let manifold = match (shape_a, shape_b) {
        (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Circle(b)) => collide_polygon_and_circle(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
        (Shape::Edge(a), Shape::Circle(b)) => collide_edge_and_circle(a, xf_a, b, xf_b),
        (Shape::Edge(a), Shape::Polygon(b)) => collide_edge_and_polygon(a, xf_a, b, xf_b),
        (Shape::Chain(a), Shape::Circle(b)) => {
            collide_chain_and_circle(a, child_a, xf_a, b, xf_b)
        }
        (Shape::Chain(a), Shape::Polygon(b)) => {
            collide_chain_and_polygon(a, child_a, xf_a, b, xf_b)
        }
        _ => return None,
    };
    Some(manifold)
}

#[inline]
fn feature_id(index_a: usize, type_a: FeatureType, index_b: usize, type_b: FeatureType) -> ContactId {
    ContactId::new(ContactFeature {
        index_a: index_a as u8,
        index_b: index_b as u8,
        type_a,
        type_b,
    })
}

//
// CIRCLE <-> CIRCLE
//

pub fn collide_circles(
    circle_a: &Circle,
    xf_a: &Transform,
    circle_b: &Circle,
    xf_b: &Transform,
) -> Manifold {
    let p_a = xf_a.apply(circle_a.center);
    let p_b = xf_b.apply(circle_b.center);

    let dist_sq = (p_b - p_a).mag_sq();
    let radius = circle_a.radius + circle_b.radius;
    if dist_sq > radius * radius {
        return Manifold::default();
    }

    let mut manifold = Manifold::new(ManifoldType::Circles, Vec2::zero(), circle_a.center);
    manifold.push(ManifoldPoint::new(circle_b.center, ContactId::default()));
    manifold
}

//
// POLYGON <-> CIRCLE
//

pub fn collide_polygon_and_circle(
    polygon_a: &Polygon,
    xf_a: &Transform,
    circle_b: &Circle,
    xf_b: &Transform,
) -> Manifold {
    // circle center in the polygon's frame
    let c = xf_b.apply(circle_b.center);
    let c_local = xf_a.apply_inv(c);

    // find the edge with maximum separation
    let radius = polygon_a.radius + circle_b.radius;
    let vertices = polygon_a.vertices();
    let normals = polygon_a.normals();
    let count = polygon_a.count();

    let mut normal_index = 0;
    let mut separation = f64::MIN;
    for (i, (v, n)) in vertices.iter().zip(normals).enumerate() {
        let s = n.dot(c_local - *v);
        if s > radius {
            // early out
            return Manifold::default();
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    // vertices of the reference edge
    let vert_index1 = normal_index;
    let vert_index2 = (vert_index1 + 1) % count;
    let v1 = vertices[vert_index1];
    let v2 = vertices[vert_index2];

    let circle_point = |manifold: &mut Manifold| {
        manifold.push(ManifoldPoint::new(circle_b.center, ContactId::default()));
    };

    // center is inside the polygon
    if separation < EPSILON {
        let mut manifold = Manifold::new(ManifoldType::FaceA, normals[normal_index], 0.5 * (v1 + v2));
        circle_point(&mut manifold);
        return manifold;
    }

    // compute barycentric coordinates
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);
    let mut manifold = if u1 <= 0.0 {
        if (c_local - v1).mag_sq() > radius * radius {
            return Manifold::default();
        }
        Manifold::new(ManifoldType::FaceA, (c_local - v1).normalized(), v1)
    } else if u2 <= 0.0 {
        if (c_local - v2).mag_sq() > radius * radius {
            return Manifold::default();
        }
        Manifold::new(ManifoldType::FaceA, (c_local - v2).normalized(), v2)
    } else {
        let face_center = 0.5 * (v1 + v2);
        let s = (c_local - face_center).dot(normals[vert_index1]);
        if s > radius {
            return Manifold::default();
        }
        Manifold::new(ManifoldType::FaceA, normals[vert_index1], face_center)
    };
    circle_point(&mut manifold);
    manifold
}

//
// POLYGON <-> POLYGON
//

/// Find the max separation between `poly1` and `poly2` using the edge normals of `poly1`.
/// Returns the index of the best edge and its separation.
fn find_max_separation(
    poly1: &Polygon,
    xf1: &Transform,
    poly2: &Polygon,
    xf2: &Transform,
) -> (usize, f64) {
    let xf = xf2.mul_t(*xf1);

    let mut best_index = 0;
    let mut max_separation = f64::MIN;
    for (i, (n1, v1)) in poly1.normals().iter().zip(poly1.vertices()).enumerate() {
        // poly1's normal and vertex in poly2's frame
        let n = xf.q.rotate(*n1);
        let v1 = xf.apply(*v1);

        // find the deepest point for normal i
        let si = poly2
            .vertices()
            .iter()
            .map(|v2| n.dot(*v2 - v1))
            .fold(f64::MAX, f64::min);

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }

    (best_index, max_separation)
}

/// Find the edge of `poly2` most anti-parallel to the reference edge `edge1` of `poly1`,
/// in world space.
fn find_incident_edge(
    poly1: &Polygon,
    xf1: &Transform,
    edge1: usize,
    poly2: &Polygon,
    xf2: &Transform,
) -> [ClipVertex; 2] {
    debug_assert!(edge1 < poly1.count());

    // reference edge normal in poly2's frame
    let normal1 = xf2.q.inv_rotate(xf1.q.rotate(poly1.normals()[edge1]));

    // find the incident edge on poly2
    let mut index = 0;
    let mut min_dot = f64::MAX;
    for (i, n2) in poly2.normals().iter().enumerate() {
        let dot = normal1.dot(*n2);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = (i1 + 1) % poly2.count();
    let vertices2 = poly2.vertices();
    [
        ClipVertex {
            v: xf2.apply(vertices2[i1]),
            id: feature_id(edge1, FeatureType::Face, i1, FeatureType::Vertex),
        },
        ClipVertex {
            v: xf2.apply(vertices2[i2]),
            id: feature_id(edge1, FeatureType::Face, i2, FeatureType::Vertex),
        },
    ]
}

/// Collide two convex polygons.
///
/// - Find edge normal of max separation on A, return if a separating axis is found.
/// - Find edge normal of max separation on B, return if a separating axis is found.
/// - Choose the reference edge as min(minA, minB).
/// - Find the incident edge.
/// - Clip.
///
/// The normal points from 1 to 2.
pub fn collide_polygons(
    poly_a: &Polygon,
    xf_a: &Transform,
    poly_b: &Polygon,
    xf_b: &Transform,
) -> Manifold {
    let total_radius = poly_a.radius + poly_b.radius;

    let (edge_a, separation_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return Manifold::default();
    }

    let (edge_b, separation_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return Manifold::default();
    }

    // bias towards A so that nearly equal separations give the same result every step
    let tol = 0.1 * LINEAR_SLOP;
    let (poly1, xf1, poly2, xf2, edge1, kind, flip) = if separation_b > separation_a + tol {
        (poly_b, xf_b, poly_a, xf_a, edge_b, ManifoldType::FaceB, true)
    } else {
        (poly_a, xf_a, poly_b, xf_b, edge_a, ManifoldType::FaceA, false)
    };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let vertices1 = poly1.vertices();
    let iv1 = edge1;
    let iv2 = (edge1 + 1) % poly1.count();

    let mut v11 = vertices1[iv1];
    let mut v12 = vertices1[iv2];

    let local_tangent = (v12 - v11).normalized();
    let local_normal = m::cross_vs(local_tangent, 1.0);
    let plane_point = 0.5 * (v11 + v12);

    let tangent = xf1.q.rotate(local_tangent);
    let normal = m::cross_vs(tangent, 1.0);

    v11 = xf1.apply(v11);
    v12 = xf1.apply(v12);

    // face offset
    let front_offset = normal.dot(v11);

    // side offsets, extended by polytope skin thickness
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    // clip incident edge against the extruded edge1 side edges
    let (clip_points1, np) = clip_segment_to_line(&incident_edge, -tangent, side_offset1, iv1);
    if np < 2 {
        return Manifold::default();
    }
    let (clip_points2, np) = clip_segment_to_line(&clip_points1, tangent, side_offset2, iv2);
    if np < 2 {
        return Manifold::default();
    }

    let mut manifold = Manifold::new(kind, local_normal, plane_point);
    for cp in &clip_points2[..MAX_MANIFOLD_POINTS] {
        let separation = normal.dot(cp.v) - front_offset;
        if separation <= total_radius {
            let id = if flip {
                ContactId::new(cp.id.feature.swapped())
            } else {
                cp.id
            };
            manifold.push(ManifoldPoint::new(xf2.apply_inv(cp.v), id));
        }
    }
    manifold
}

//
// EDGE <-> CIRCLE
//

/// Collide an edge with a circle.
///
/// The circle is classified against the Voronoi regions of the edge:
/// the two end vertices and the face between them.
/// One-sided edges ignore circles behind them, and leave vertex contacts
/// to the neighbouring edge when the ghost vertices say it owns them.
pub fn collide_edge_and_circle(
    edge_a: &Edge,
    xf_a: &Transform,
    circle_b: &Circle,
    xf_b: &Transform,
) -> Manifold {
    // circle in the frame of the edge
    let q = xf_a.apply_inv(xf_b.apply(circle_b.center));

    let a = edge_a.v1;
    let b = edge_a.v2;
    let e = b - a;

    // normal points to the right for a CCW winding
    let mut n = m::right_normal(e);
    let offset = n.dot(q - a);

    if edge_a.one_sided && offset < 0.0 {
        return Manifold::default();
    }

    // barycentric coordinates
    let u = e.dot(b - q);
    let v = e.dot(q - a);

    let radius = POLYGON_RADIUS + circle_b.radius;

    let vertex_contact = |p: Vec2, index_a: usize| {
        let mut manifold = Manifold::new(ManifoldType::Circles, Vec2::zero(), p);
        manifold.push(ManifoldPoint::new(
            circle_b.center,
            feature_id(index_a, FeatureType::Vertex, 0, FeatureType::Vertex),
        ));
        manifold
    };

    // region A
    if v <= 0.0 {
        let p = a;
        if (q - p).mag_sq() > radius * radius {
            return Manifold::default();
        }

        // is there an edge connected to A?
        if edge_a.one_sided {
            let a1 = edge_a.v0;
            let b1 = a;
            let e1 = b1 - a1;
            let u1 = e1.dot(b1 - q);

            // is the circle in region AB of the previous edge?
            if u1 > 0.0 {
                return Manifold::default();
            }
        }

        return vertex_contact(p, 0);
    }

    // region B
    if u <= 0.0 {
        let p = b;
        if (q - p).mag_sq() > radius * radius {
            return Manifold::default();
        }

        // is there an edge connected to B?
        if edge_a.one_sided {
            let b2 = edge_a.v3;
            let a2 = b;
            let e2 = b2 - a2;
            let v2 = e2.dot(q - a2);

            // is the circle in region AB of the next edge?
            if v2 > 0.0 {
                return Manifold::default();
            }
        }

        return vertex_contact(p, 1);
    }

    // region AB
    let den = e.mag_sq();
    debug_assert!(den > 0.0);
    let p = (1.0 / den) * (u * a + v * b);
    if (q - p).mag_sq() > radius * radius {
        return Manifold::default();
    }

    if offset < 0.0 {
        n = -n;
    }
    n.normalize();

    let mut manifold = Manifold::new(ManifoldType::FaceA, n, a);
    manifold.push(ManifoldPoint::new(
        circle_b.center,
        feature_id(0, FeatureType::Face, 0, FeatureType::Vertex),
    ));
    manifold
}

//
// EDGE <-> POLYGON
//

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AxisKind {
    Unknown,
    EdgeA,
    EdgeB,
}

#[derive(Clone, Copy, Debug)]
struct SeparationAxis {
    kind: AxisKind,
    index: usize,
    separation: f64,
    normal: Vec2,
}

/// A polygon expressed in the frame of another shape.
struct TempPolygon {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
}

/// Reference face used for clipping.
struct ReferenceFace {
    i1: usize,
    i2: usize,
    v1: Vec2,
    normal: Vec2,
    side_normal1: Vec2,
    side_offset1: f64,
    side_normal2: Vec2,
    side_offset2: f64,
}

fn compute_edge_separation(poly_b: &TempPolygon, v1: Vec2, normal1: Vec2) -> SeparationAxis {
    let mut axis = SeparationAxis {
        kind: AxisKind::EdgeA,
        index: 0,
        separation: f64::MIN,
        normal: Vec2::zero(),
    };

    // find the axis with least overlap (min-max problem)
    for (j, axis_normal) in [normal1, -normal1].into_iter().enumerate() {
        // deepest polygon vertex along axis j
        let sj = poly_b.vertices[..poly_b.count]
            .iter()
            .map(|v| axis_normal.dot(*v - v1))
            .fold(f64::MAX, f64::min);

        if sj > axis.separation {
            axis.index = j;
            axis.separation = sj;
            axis.normal = axis_normal;
        }
    }

    axis
}

fn compute_polygon_separation(poly_b: &TempPolygon, v1: Vec2, v2: Vec2) -> SeparationAxis {
    let mut axis = SeparationAxis {
        kind: AxisKind::Unknown,
        index: 0,
        separation: f64::MIN,
        normal: Vec2::zero(),
    };

    for i in 0..poly_b.count {
        let n = -poly_b.normals[i];

        let s1 = n.dot(poly_b.vertices[i] - v1);
        let s2 = n.dot(poly_b.vertices[i] - v2);
        let s = s1.min(s2);

        if s > axis.separation {
            axis.kind = AxisKind::EdgeB;
            axis.index = i;
            axis.separation = s;
            axis.normal = n;
        }
    }

    axis
}

/// Collide an edge with a polygon.
///
/// Both the edge normal and the polygon normals are tried as separating axes.
/// For one-sided edges, contacts whose normal falls outside the range
/// allowed by the neighbouring edges (found through the ghost vertices)
/// are skipped, which removes bumps when sliding across edge joints.
pub fn collide_edge_and_polygon(
    edge_a: &Edge,
    xf_a: &Transform,
    polygon_b: &Polygon,
    xf_b: &Transform,
) -> Manifold {
    let xf = xf_a.mul_t(*xf_b);

    let centroid_b = xf.apply(polygon_b.centroid());

    let v1 = edge_a.v1;
    let v2 = edge_a.v2;

    let edge1 = (v2 - v1).normalized();

    // normal points to the right for a CCW winding
    let normal1 = m::right_normal(edge1);
    let offset1 = normal1.dot(centroid_b - v1);

    if edge_a.one_sided && offset1 < 0.0 {
        return Manifold::default();
    }

    // polygon B in the frame of A
    let mut temp_b = TempPolygon {
        vertices: [Vec2::zero(); MAX_POLYGON_VERTICES],
        normals: [Vec2::zero(); MAX_POLYGON_VERTICES],
        count: polygon_b.count(),
    };
    for (i, (v, n)) in polygon_b
        .vertices()
        .iter()
        .zip(polygon_b.normals())
        .enumerate()
    {
        temp_b.vertices[i] = xf.apply(*v);
        temp_b.normals[i] = xf.q.rotate(*n);
    }

    let radius = polygon_b.radius + POLYGON_RADIUS;

    let edge_axis = compute_edge_separation(&temp_b, v1, normal1);
    if edge_axis.separation > radius {
        return Manifold::default();
    }

    let polygon_axis = compute_polygon_separation(&temp_b, v1, v2);
    if polygon_axis.separation > radius {
        return Manifold::default();
    }

    // hysteresis for jitter reduction
    const RELATIVE_TOL: f64 = 0.98;
    const ABSOLUTE_TOL: f64 = 0.001;

    let mut primary_axis = if polygon_axis.separation - radius
        > RELATIVE_TOL * (edge_axis.separation - radius) + ABSOLUTE_TOL
    {
        polygon_axis
    } else {
        edge_axis
    };

    if edge_a.one_sided {
        // smooth collision against the neighbouring edges
        let edge0 = (v1 - edge_a.v0).normalized();
        let normal0 = m::right_normal(edge0);
        let convex1 = m::cross(edge0, edge1) >= 0.0;

        let edge2 = (edge_a.v3 - v2).normalized();
        let normal2 = m::right_normal(edge2);
        let convex2 = m::cross(edge1, edge2) >= 0.0;

        const SIN_TOL: f64 = 0.1;
        let side1 = primary_axis.normal.dot(edge1) <= 0.0;

        // check the Gauss map
        if side1 {
            if convex1 {
                if m::cross(primary_axis.normal, normal0) > SIN_TOL {
                    // skip region
                    return Manifold::default();
                }
                // admit region
            } else {
                // snap region
                primary_axis = edge_axis;
            }
        } else if convex2 {
            if m::cross(normal2, primary_axis.normal) > SIN_TOL {
                // skip region
                return Manifold::default();
            }
            // admit region
        } else {
            // snap region
            primary_axis = edge_axis;
        }
    }

    let count_b = temp_b.count;
    let (clip_points, kind, ref_face) = if primary_axis.kind == AxisKind::EdgeA {
        // search for the polygon normal most anti-parallel to the edge normal
        let mut best_index = 0;
        let mut best_value = primary_axis.normal.dot(temp_b.normals[0]);
        for i in 1..count_b {
            let value = primary_axis.normal.dot(temp_b.normals[i]);
            if value < best_value {
                best_value = value;
                best_index = i;
            }
        }

        let i1 = best_index;
        let i2 = (i1 + 1) % count_b;

        let clip_points = [
            ClipVertex {
                v: temp_b.vertices[i1],
                id: feature_id(0, FeatureType::Face, i1, FeatureType::Vertex),
            },
            ClipVertex {
                v: temp_b.vertices[i2],
                id: feature_id(0, FeatureType::Face, i2, FeatureType::Vertex),
            },
        ];

        let ref_face = ReferenceFace {
            i1: 0,
            i2: 1,
            v1,
            normal: primary_axis.normal,
            side_normal1: -edge1,
            side_offset1: (-edge1).dot(v1),
            side_normal2: edge1,
            side_offset2: edge1.dot(v2),
        };
        (clip_points, ManifoldType::FaceA, ref_face)
    } else {
        let clip_points = [
            ClipVertex {
                v: v2,
                id: feature_id(1, FeatureType::Vertex, primary_axis.index, FeatureType::Face),
            },
            ClipVertex {
                v: v1,
                id: feature_id(0, FeatureType::Vertex, primary_axis.index, FeatureType::Face),
            },
        ];

        let i1 = primary_axis.index;
        let i2 = (i1 + 1) % count_b;
        let rv1 = temp_b.vertices[i1];
        let rv2 = temp_b.vertices[i2];
        let normal = temp_b.normals[i1];
        // CCW winding
        let side_normal1 = m::right_normal(normal);
        let side_normal2 = -side_normal1;
        let ref_face = ReferenceFace {
            i1,
            i2,
            v1: rv1,
            normal,
            side_normal1,
            side_offset1: side_normal1.dot(rv1),
            side_normal2,
            side_offset2: side_normal2.dot(rv2),
        };
        (clip_points, ManifoldType::FaceB, ref_face)
    };

    // clip the incident edge against the reference face side planes
    let (clip_points1, np) = clip_segment_to_line(
        &clip_points,
        ref_face.side_normal1,
        ref_face.side_offset1,
        ref_face.i1,
    );
    if np < MAX_MANIFOLD_POINTS {
        return Manifold::default();
    }
    let (clip_points2, np) = clip_segment_to_line(
        &clip_points1,
        ref_face.side_normal2,
        ref_face.side_offset2,
        ref_face.i2,
    );
    if np < MAX_MANIFOLD_POINTS {
        return Manifold::default();
    }

    let mut manifold = if kind == ManifoldType::FaceA {
        Manifold::new(kind, ref_face.normal, ref_face.v1)
    } else {
        Manifold::new(
            kind,
            polygon_b.normals()[ref_face.i1],
            polygon_b.vertices()[ref_face.i1],
        )
    };

    for cp in &clip_points2 {
        let separation = ref_face.normal.dot(cp.v - ref_face.v1);
        if separation <= radius {
            let point = if kind == ManifoldType::FaceA {
                ManifoldPoint::new(xf.apply_inv(cp.v), cp.id)
            } else {
                ManifoldPoint::new(cp.v, ContactId::new(cp.id.feature.swapped()))
            };
            manifold.push(point);
        }
    }
    manifold
}

//
// CHAIN <-> CIRCLE, CHAIN <-> POLYGON
//

pub fn collide_chain_and_circle(
    chain_a: &Chain,
    child_index: usize,
    xf_a: &Transform,
    circle_b: &Circle,
    xf_b: &Transform,
) -> Manifold {
    let edge = chain_a.child_edge(child_index);
    collide_edge_and_circle(&edge, xf_a, circle_b, xf_b)
}

pub fn collide_chain_and_polygon(
    chain_a: &Chain,
    child_index: usize,
    xf_a: &Transform,
    polygon_b: &Polygon,
    xf_b: &Transform,
) -> Manifold {
    let edge = chain_a.child_edge(child_index);
    collide_edge_and_polygon(&edge, xf_a, polygon_b, xf_b)
}
