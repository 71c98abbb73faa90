//! The convex shapes collision detection works with,
//! plus chains of edges for static level geometry.

use itertools::Itertools;

use super::{
    aabb::{RayCastInput, RayCastOutput, AABB},
    CollisionError,
};
use crate::{
    math::{self as m, Transform, Vec2},
    settings::{EPSILON, LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS},
};

/// The kinds of shape, ordered the way contact dispatch expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeType {
    Circle,
    Edge,
    Polygon,
    Chain,
}

/// Any shape that can be collided.
#[derive(Clone, Debug)]
pub enum Shape {
    Circle(Circle),
    Edge(Edge),
    Polygon(Polygon),
    Chain(Chain),
}

impl Shape {
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Circle(_) => ShapeType::Circle,
            Shape::Edge(_) => ShapeType::Edge,
            Shape::Polygon(_) => ShapeType::Polygon,
            Shape::Chain(_) => ShapeType::Chain,
        }
    }

    /// The rounding radius around the shape's core.
    pub fn radius(&self) -> f64 {
        match self {
            Shape::Circle(c) => c.radius,
            Shape::Polygon(p) => p.radius,
            Shape::Edge(_) | Shape::Chain(_) => POLYGON_RADIUS,
        }
    }

    /// Number of convex children. Only chains have more than one.
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain(c) => c.child_count(),
            _ => 1,
        }
    }

    /// Bounding box of child `child_index` under the transform `xf`.
    pub fn compute_aabb(&self, xf: &Transform, child_index: usize) -> AABB {
        match self {
            Shape::Circle(c) => c.compute_aabb(xf),
            Shape::Edge(e) => e.compute_aabb(xf),
            Shape::Polygon(p) => p.compute_aabb(xf),
            Shape::Chain(c) => c.child_edge(child_index).compute_aabb(xf),
        }
    }

    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(c) => c.ray_cast(input, xf),
            Shape::Edge(e) => e.ray_cast(input, xf),
            Shape::Polygon(p) => p.ray_cast(input, xf),
            Shape::Chain(c) => {
                // chain edges can be hit from either side
                let mut edge = c.child_edge(child_index);
                edge.one_sided = false;
                edge.ray_cast(input, xf)
            }
        }
    }

    /// Check whether a world-space point is inside the shape.
    /// Edges and chains have no area and never contain points.
    pub fn test_point(&self, xf: &Transform, point: Vec2) -> bool {
        match self {
            Shape::Circle(c) => c.test_point(xf, point),
            Shape::Polygon(p) => p.test_point(xf, point),
            Shape::Edge(_) | Shape::Chain(_) => false,
        }
    }
}

impl From<Circle> for Shape {
    fn from(c: Circle) -> Self {
        Shape::Circle(c)
    }
}
impl From<Edge> for Shape {
    fn from(e: Edge) -> Self {
        Shape::Edge(e)
    }
}
impl From<Polygon> for Shape {
    fn from(p: Polygon) -> Self {
        Shape::Polygon(p)
    }
}
impl From<Chain> for Shape {
    fn from(c: Chain) -> Self {
        Shape::Chain(c)
    }
}

//
// Circle
//

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub struct Circle {
    /// Position in the owning body's local frame.
    pub center: Vec2,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Vec2, radius: f64) -> Self {
        Circle { center, radius }
    }

    pub fn compute_aabb(&self, xf: &Transform) -> AABB {
        AABB::from_points(xf.apply(self.center), xf.apply(self.center)).padded(self.radius)
    }

    pub fn test_point(&self, xf: &Transform, point: Vec2) -> bool {
        let center = xf.apply(self.center);
        (point - center).mag_sq() <= self.radius * self.radius
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        // solve |s + t*r| = radius for the smallest t
        let position = xf.apply(self.center);
        let s = input.p1 - position;
        let b = s.mag_sq() - self.radius * self.radius;

        let r = input.p2 - input.p1;
        let c = s.dot(r);
        let rr = r.mag_sq();
        let sigma = c * c - rr * b;

        if sigma < 0.0 || rr < EPSILON {
            return None;
        }

        let a = -(c + sigma.sqrt());
        if 0.0 <= a && a <= input.max_fraction * rr {
            let a = a / rr;
            Some(RayCastOutput {
                fraction: a,
                normal: (s + a * r).normalized(),
            })
        } else {
            None
        }
    }
}

//
// Edge
//

/// A line segment from `v1` to `v2`.
///
/// One-sided edges only collide on their front side,
/// which is to the right when walking from `v1` to `v2`.
/// The ghost vertices `v0` and `v3` are the neighbouring vertices of
/// the surrounding geometry and are used to smooth out collisions
/// at the joints between edges.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub struct Edge {
    pub v0: Vec2,
    pub v1: Vec2,
    pub v2: Vec2,
    pub v3: Vec2,
    pub one_sided: bool,
}

impl Edge {
    pub fn two_sided(v1: Vec2, v2: Vec2) -> Self {
        Edge {
            v0: v1,
            v1,
            v2,
            v3: v2,
            one_sided: false,
        }
    }

    pub fn one_sided(v0: Vec2, v1: Vec2, v2: Vec2, v3: Vec2) -> Self {
        Edge {
            v0,
            v1,
            v2,
            v3,
            one_sided: true,
        }
    }

    /// Unit normal of the front side in local space.
    pub fn normal(&self) -> Vec2 {
        m::right_normal(self.v2 - self.v1).normalized()
    }

    pub fn compute_aabb(&self, xf: &Transform) -> AABB {
        AABB::from_points(xf.apply(self.v1), xf.apply(self.v2)).padded(POLYGON_RADIUS)
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        // put the ray into the edge's frame
        let p1 = xf.apply_inv(input.p1);
        let p2 = xf.apply_inv(input.p2);
        let d = p2 - p1;

        let e = self.v2 - self.v1;
        let normal = m::right_normal(e).normalized();

        // q = p1 + t * d
        // dot(normal, q - v1) = 0
        let numerator = normal.dot(self.v1 - p1);
        if self.one_sided && numerator > 0.0 {
            // behind the edge
            return None;
        }

        let denominator = normal.dot(d);
        if denominator == 0.0 {
            return None;
        }

        let t = numerator / denominator;
        if t < 0.0 || input.max_fraction < t {
            return None;
        }

        let q = p1 + t * d;
        let rr = e.mag_sq();
        if rr == 0.0 {
            return None;
        }
        // is q within the segment
        let s = (q - self.v1).dot(e) / rr;
        if !(0.0..=1.0).contains(&s) {
            return None;
        }

        let world_normal = xf.q.rotate(normal);
        Some(RayCastOutput {
            fraction: t,
            normal: if numerator > 0.0 {
                -world_normal
            } else {
                world_normal
            },
        })
    }
}

//
// Polygon
//

/// A convex polygon with counter-clockwise winding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Polygon {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
    centroid: Vec2,
    pub radius: f64,
}

impl Polygon {
    /// Create the convex hull of a set of points.
    ///
    /// Points closer than half the linear slop to another point are merged,
    /// and points inside the hull or on its edges are dropped.
    pub fn new(points: &[Vec2]) -> Result<Self, CollisionError> {
        if points.len() < 3 || points.len() > MAX_POLYGON_VERTICES {
            return Err(CollisionError::PolygonVertexCount {
                count: points.len(),
            });
        }

        // weld close points
        let weld_dist_sq = (0.5 * LINEAR_SLOP) * (0.5 * LINEAR_SLOP);
        let mut welded = [Vec2::zero(); MAX_POLYGON_VERTICES];
        let mut n = 0;
        for &p in points {
            if welded[..n].iter().all(|w| (p - *w).mag_sq() >= weld_dist_sq) {
                welded[n] = p;
                n += 1;
            }
        }
        if n < 3 {
            return Err(CollisionError::DegeneratePolygon);
        }
        let ps = &welded[..n];

        // gift wrapping, starting from the rightmost (and lowest on ties) point
        let i0 = (1..n).fold(0, |best, i| {
            let (x, bx) = (ps[i].x, ps[best].x);
            if x > bx || (x == bx && ps[i].y < ps[best].y) {
                i
            } else {
                best
            }
        });

        let mut hull = [0usize; MAX_POLYGON_VERTICES];
        let mut m = 0;
        let mut ih = i0;
        loop {
            if m == MAX_POLYGON_VERTICES {
                return Err(CollisionError::DegeneratePolygon);
            }
            hull[m] = ih;

            let mut ie = 0;
            for j in 1..n {
                if ie == ih {
                    ie = j;
                    continue;
                }
                let r = ps[ie] - ps[hull[m]];
                let v = ps[j] - ps[hull[m]];
                let c = m::cross(r, v);
                if c < 0.0 {
                    ie = j;
                }
                // collinear, keep the farthest point
                if c == 0.0 && v.mag_sq() > r.mag_sq() {
                    ie = j;
                }
            }

            m += 1;
            ih = ie;
            if ie == i0 {
                break;
            }
        }

        if m < 3 {
            return Err(CollisionError::DegeneratePolygon);
        }

        let mut vertices = [Vec2::zero(); MAX_POLYGON_VERTICES];
        for (v, &h) in vertices.iter_mut().zip(&hull[..m]) {
            *v = ps[h];
        }
        Self::from_hull(&vertices[..m])
    }

    /// A box with half-widths `hx` and `hy` centered on the origin.
    pub fn new_box(hx: f64, hy: f64) -> Self {
        let mut vertices = [Vec2::zero(); MAX_POLYGON_VERTICES];
        let mut normals = [Vec2::zero(); MAX_POLYGON_VERTICES];
        vertices[..4].copy_from_slice(&[
            Vec2::new(-hx, -hy),
            Vec2::new(hx, -hy),
            Vec2::new(hx, hy),
            Vec2::new(-hx, hy),
        ]);
        normals[..4].copy_from_slice(&[
            Vec2::new(0.0, -1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(-1.0, 0.0),
        ]);
        Polygon {
            vertices,
            normals,
            count: 4,
            centroid: Vec2::zero(),
            radius: POLYGON_RADIUS,
        }
    }

    /// A box with half-widths `hx` and `hy`, positioned and rotated in the body frame.
    pub fn new_oriented_box(hx: f64, hy: f64, center: Vec2, angle: m::Angle) -> Self {
        let mut poly = Self::new_box(hx, hy);
        let xf = Transform::new(center, angle);
        for i in 0..poly.count {
            poly.vertices[i] = xf.apply(poly.vertices[i]);
            poly.normals[i] = xf.q.rotate(poly.normals[i]);
        }
        poly.centroid = center;
        poly
    }

    /// Build from vertices already known to be a counter-clockwise convex hull.
    fn from_hull(hull: &[Vec2]) -> Result<Self, CollisionError> {
        let count = hull.len();
        let mut vertices = [Vec2::zero(); MAX_POLYGON_VERTICES];
        let mut normals = [Vec2::zero(); MAX_POLYGON_VERTICES];
        vertices[..count].copy_from_slice(hull);

        for (i, (v1, v2)) in hull.iter().circular_tuple_windows().enumerate() {
            let edge = *v2 - *v1;
            if edge.mag_sq() <= EPSILON * EPSILON {
                return Err(CollisionError::DegeneratePolygon);
            }
            normals[i] = m::right_normal(edge).normalized();
        }

        Ok(Polygon {
            vertices,
            normals,
            count,
            centroid: compute_centroid(hull),
            radius: POLYGON_RADIUS,
        })
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    /// Outward unit normals, `normals()[i]` belonging to the edge
    /// from vertex `i` to vertex `i + 1`.
    #[inline]
    pub fn normals(&self) -> &[Vec2] {
        &self.normals[..self.count]
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    /// Check that the polygon is convex with counter-clockwise winding.
    pub fn validate(&self) -> bool {
        let vs = self.vertices();
        (0..self.count).all(|i| {
            let i2 = (i + 1) % self.count;
            let p = vs[i];
            let e = vs[i2] - p;
            vs.iter()
                .enumerate()
                .filter(|(j, _)| *j != i && *j != i2)
                .all(|(_, v)| m::cross(e, *v - p) >= 0.0)
        })
    }

    pub fn compute_aabb(&self, xf: &Transform) -> AABB {
        let first = xf.apply(self.vertices[0]);
        self.vertices()[1..]
            .iter()
            .fold(AABB::from_points(first, first), |aabb, v| {
                let v = xf.apply(*v);
                AABB::new(aabb.min.min_by_component(v), aabb.max.max_by_component(v))
            })
            .padded(self.radius)
    }

    pub fn test_point(&self, xf: &Transform, point: Vec2) -> bool {
        let local = xf.apply_inv(point);
        self.vertices()
            .iter()
            .zip(self.normals())
            .all(|(v, n)| n.dot(local - *v) <= 0.0)
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let p1 = xf.apply_inv(input.p1);
        let p2 = xf.apply_inv(input.p2);
        let d = p2 - p1;

        let mut lower = 0.0;
        let mut upper = input.max_fraction;
        let mut index = None;

        for (i, (v, n)) in self.vertices().iter().zip(self.normals()).enumerate() {
            // p = p1 + a * d
            // dot(normal, p - v) = 0
            // dot(normal, p1 - v) + a * dot(normal, d) = 0
            let numerator = n.dot(*v - p1);
            let denominator = n.dot(d);

            if denominator == 0.0 {
                if numerator < 0.0 {
                    return None;
                }
            } else if denominator < 0.0 && numerator < lower * denominator {
                // entering this half-space
                lower = numerator / denominator;
                index = Some(i);
            } else if denominator > 0.0 && numerator < upper * denominator {
                // exiting this half-space
                upper = numerator / denominator;
            }

            if upper < lower {
                return None;
            }
        }

        index.map(|i| RayCastOutput {
            fraction: lower,
            normal: xf.q.rotate(self.normals[i]),
        })
    }
}

fn compute_centroid(vs: &[Vec2]) -> Vec2 {
    // triangle fan around the first vertex, relative to it for precision
    let origin = vs[0];
    let mut c = Vec2::zero();
    let mut area = 0.0;
    for i in 1..vs.len() - 1 {
        let e1 = vs[i] - origin;
        let e2 = vs[i + 1] - origin;
        let tri_area = 0.5 * m::cross(e1, e2);
        area += tri_area;
        c += tri_area * (e1 + e2) / 3.0;
    }
    c / area + origin
}

//
// Chain
//

/// A chain of one-sided edges, either open with explicit ghost vertices
/// at both ends or closed into a loop.
///
/// Chains should not self-intersect. Each segment is a child shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Chain {
    /// For loops, the first vertex is repeated at the end.
    vertices: Vec<Vec2>,
    prev_vertex: Vec2,
    next_vertex: Vec2,
}

impl Chain {
    /// A closed loop through the given vertices.
    /// The edge from the last vertex back to the first is added automatically.
    pub fn new_loop(vertices: &[Vec2]) -> Result<Self, CollisionError> {
        if vertices.len() < 3 {
            return Err(CollisionError::ChainVertexCount {
                count: vertices.len(),
                min: 3,
            });
        }
        check_spacing(vertices.iter().circular_tuple_windows())?;

        let mut vs = vertices.to_vec();
        vs.push(vertices[0]);
        let count = vs.len();
        log::debug!("Created chain loop with {} edges", count - 1);
        Ok(Chain {
            prev_vertex: vs[count - 2],
            next_vertex: vs[1],
            vertices: vs,
        })
    }

    /// An open chain. `prev_vertex` and `next_vertex` are the ghost vertices
    /// before the first and after the last vertex, used to smooth collisions
    /// with whatever geometry the chain connects to.
    pub fn new_open(
        vertices: &[Vec2],
        prev_vertex: Vec2,
        next_vertex: Vec2,
    ) -> Result<Self, CollisionError> {
        if vertices.len() < 2 {
            return Err(CollisionError::ChainVertexCount {
                count: vertices.len(),
                min: 2,
            });
        }
        check_spacing(vertices.iter().tuple_windows())?;

        log::debug!("Created open chain with {} edges", vertices.len() - 1);
        Ok(Chain {
            vertices: vertices.to_vec(),
            prev_vertex,
            next_vertex,
        })
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    #[inline]
    pub fn child_count(&self) -> usize {
        self.vertices.len() - 1
    }

    /// The edge between vertices `index` and `index + 1`,
    /// with ghost vertices taken from its neighbours.
    pub fn child_edge(&self, index: usize) -> Edge {
        let vs = &self.vertices;
        let count = vs.len();
        assert!(index + 1 < count, "chain child index {index} out of range");

        let v0 = if index > 0 {
            vs[index - 1]
        } else {
            self.prev_vertex
        };
        let v3 = if index + 2 < count {
            vs[index + 2]
        } else {
            self.next_vertex
        };
        Edge::one_sided(v0, vs[index], vs[index + 1], v3)
    }
}

fn check_spacing<'a>(
    pairs: impl Iterator<Item = (&'a Vec2, &'a Vec2)>,
) -> Result<(), CollisionError> {
    let min_dist_sq = LINEAR_SLOP * LINEAR_SLOP;
    for (index, (v1, v2)) in pairs.enumerate() {
        if (*v2 - *v1).mag_sq() <= min_dist_sq {
            return Err(CollisionError::ChainVerticesTooClose { index });
        }
    }
    Ok(())
}
