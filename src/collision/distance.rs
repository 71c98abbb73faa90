//! Closest points between convex shapes with GJK,
//! and linear shape casts by conservative advancement.

use super::shape::Shape;
use crate::{
    math::{self as m, Transform, Vec2},
    settings::{EPSILON, LINEAR_SLOP, MAX_GJK_ITERATIONS, POLYGON_RADIUS},
};

//
// Proxy
//

/// The support vertices and rounding radius of a convex shape,
/// in the form the GJK algorithm works with.
#[derive(Clone, Copy, Debug)]
pub struct DistanceProxy<'a> {
    vertices: ProxyVertices<'a>,
    radius: f64,
}

#[derive(Clone, Copy, Debug)]
enum ProxyVertices<'a> {
    Borrowed(&'a [Vec2]),
    // circles and edges own their one or two vertices
    Inline([Vec2; 2], usize),
}

impl<'a> DistanceProxy<'a> {
    /// Wrap an arbitrary convex point set.
    pub fn new(vertices: &'a [Vec2], radius: f64) -> Self {
        debug_assert!(!vertices.is_empty());
        DistanceProxy {
            vertices: ProxyVertices::Borrowed(vertices),
            radius,
        }
    }

    /// The proxy for child `child_index` of a shape.
    pub fn from_shape(shape: &'a Shape, child_index: usize) -> Self {
        match shape {
            Shape::Circle(c) => DistanceProxy {
                vertices: ProxyVertices::Inline([c.center, Vec2::zero()], 1),
                radius: c.radius,
            },
            Shape::Polygon(p) => DistanceProxy {
                vertices: ProxyVertices::Borrowed(p.vertices()),
                radius: p.radius,
            },
            Shape::Edge(e) => DistanceProxy {
                vertices: ProxyVertices::Inline([e.v1, e.v2], 2),
                radius: POLYGON_RADIUS,
            },
            Shape::Chain(c) => {
                let edge = c.child_edge(child_index);
                DistanceProxy {
                    vertices: ProxyVertices::Inline([edge.v1, edge.v2], 2),
                    radius: POLYGON_RADIUS,
                }
            }
        }
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        match &self.vertices {
            ProxyVertices::Borrowed(vs) => vs,
            ProxyVertices::Inline(vs, count) => &vs[..*count],
        }
    }

    #[inline]
    pub fn vertex(&self, index: usize) -> Vec2 {
        self.vertices()[index]
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Index of the vertex furthest along direction `d`.
    pub fn support(&self, d: Vec2) -> usize {
        let vs = self.vertices();
        let mut best_index = 0;
        let mut best_value = vs[0].dot(d);
        for (i, v) in vs.iter().enumerate().skip(1) {
            let value = v.dot(d);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }

    #[inline]
    pub fn support_vertex(&self, d: Vec2) -> Vec2 {
        self.vertex(self.support(d))
    }
}

//
// Simplex
//

/// The result of a previous distance query,
/// used to warm start the next one between the same pair of shapes.
///
/// Start with `SimplexCache::default()` and keep passing in the same one.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimplexCache {
    /// Length or area of the cached simplex.
    pub metric: f64,
    pub count: usize,
    /// Vertex indices on shape A.
    pub index_a: [u8; 3],
    /// Vertex indices on shape B.
    pub index_b: [u8; 3],
}

#[derive(Clone, Copy, Debug, Default)]
struct SimplexVertex {
    /// Support point on proxy A.
    wa: Vec2,
    /// Support point on proxy B.
    wb: Vec2,
    /// wb - wa
    w: Vec2,
    /// Barycentric coordinate for the closest point.
    a: f64,
    index_a: usize,
    index_b: usize,
}

#[derive(Clone, Copy, Debug, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: &Transform,
        proxy_b: &DistanceProxy,
        xf_b: &Transform,
    ) -> Self {
        debug_assert!(cache.count <= 3);

        let mut simplex = Simplex {
            count: cache.count,
            ..Default::default()
        };
        for i in 0..simplex.count {
            let v = &mut simplex.v[i];
            v.index_a = cache.index_a[i] as usize;
            v.index_b = cache.index_b[i] as usize;
            v.wa = xf_a.apply(proxy_a.vertex(v.index_a));
            v.wb = xf_b.apply(proxy_b.vertex(v.index_b));
            v.w = v.wb - v.wa;
            // invalid until solved
            v.a = 0.0;
        }

        // flush the cache if the simplex changed shape too much since it was stored
        if simplex.count > 1 {
            let metric1 = cache.metric;
            let metric2 = simplex.metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < EPSILON {
                simplex.count = 0;
            }
        }

        if simplex.count == 0 {
            let v = &mut simplex.v[0];
            v.index_a = 0;
            v.index_b = 0;
            v.wa = xf_a.apply(proxy_a.vertex(0));
            v.wb = xf_b.apply(proxy_b.vertex(0));
            v.w = v.wb - v.wa;
            v.a = 1.0;
            simplex.count = 1;
        }

        simplex
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count;
        for (i, v) in self.vertices().iter().enumerate() {
            cache.index_a[i] = v.index_a as u8;
            cache.index_b[i] = v.index_b as u8;
        }
    }

    #[inline]
    fn vertices(&self) -> &[SimplexVertex] {
        &self.v[..self.count]
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = m::cross(e12, -self.v[0].w);
                if sgn > 0.0 {
                    // origin is left of e12
                    m::cross_sv(1.0, e12)
                } else {
                    m::cross_vs(e12, 1.0)
                }
            }
            _ => {
                debug_assert!(false, "no search direction for simplex of {}", self.count);
                Vec2::zero()
            }
        }
    }

    fn closest_point(&self) -> Vec2 {
        match self.count {
            1 => self.v[0].w,
            2 => self.v[0].a * self.v[0].w + self.v[1].a * self.v[1].w,
            3 => Vec2::zero(),
            _ => {
                debug_assert!(false, "empty simplex");
                Vec2::zero()
            }
        }
    }

    /// Closest points on proxies A and B.
    fn witness_points(&self) -> (Vec2, Vec2) {
        let [v1, v2, v3] = &self.v;
        match self.count {
            1 => (v1.wa, v1.wb),
            2 => (
                v1.a * v1.wa + v2.a * v2.wa,
                v1.a * v1.wb + v2.a * v2.wb,
            ),
            3 => {
                let p = v1.a * v1.wa + v2.a * v2.wa + v3.a * v3.wa;
                (p, p)
            }
            _ => {
                debug_assert!(false, "empty simplex");
                (Vec2::zero(), Vec2::zero())
            }
        }
    }

    fn metric(&self) -> f64 {
        let [v1, v2, v3] = &self.v;
        match self.count {
            1 => 0.0,
            2 => (v1.w - v2.w).mag(),
            3 => m::cross(v2.w - v1.w, v3.w - v1.w),
            _ => {
                debug_assert!(false, "empty simplex");
                0.0
            }
        }
    }

    /// Reduce a segment simplex to the feature closest to the origin,
    /// solving for barycentric coordinates `a1 + a2 = 1` with `dot(p, w2 - w1) = 0`.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    /// Reduce a triangle simplex to the vertex, edge or interior region
    /// containing the point closest to the origin.
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        // signed areas of the sub-triangles
        let n123 = m::cross(e12, e13);

        let d123_1 = n123 * m::cross(w2, w3);
        let d123_2 = n123 * m::cross(w3, w1);
        let d123_3 = n123 * m::cross(w1, w2);

        // w1 region
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // e12
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv_d12 = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv_d12;
            self.v[1].a = d12_2 * inv_d12;
            self.count = 2;
            return;
        }

        // e13
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv_d13 = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv_d13;
            self.v[2].a = d13_2 * inv_d13;
            self.count = 2;
            self.v[1] = self.v[2];
            return;
        }

        // w2 region
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // w3 region
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v[2].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[2];
            return;
        }

        // e23
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv_d23 = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv_d23;
            self.v[2].a = d23_2 * inv_d23;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        // origin is inside the triangle
        let inv_d123 = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv_d123;
        self.v[1].a = d123_2 * inv_d123;
        self.v[2].a = d123_3 * inv_d123;
        self.count = 3;
    }
}

//
// Distance
//

/// Input for [`distance`][self::distance].
#[derive(Clone, Copy, Debug)]
pub struct DistanceInput<'a> {
    pub proxy_a: DistanceProxy<'a>,
    pub proxy_b: DistanceProxy<'a>,
    pub transform_a: Transform,
    pub transform_b: Transform,
    /// Whether to measure between the rounded surfaces
    /// instead of between the cores.
    pub use_radii: bool,
}

/// Output of [`distance`][self::distance].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceOutput {
    /// Closest point on shape A, in world space.
    pub point_a: Vec2,
    /// Closest point on shape B, in world space.
    pub point_b: Vec2,
    pub distance: f64,
    /// Number of GJK iterations used.
    pub iterations: usize,
}

/// Compute the closest points between two convex shapes.
///
/// On the first call for a pair of shapes pass in a default cache.
/// The cache is updated with the final simplex so the next call
/// between the same shapes can start from where this one ended.
pub fn distance(input: &DistanceInput, cache: &mut SimplexCache) -> DistanceOutput {
    let _span = tracy_span!("gjk distance", "distance");

    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = input.transform_a;
    let xf_b = input.transform_b;

    let mut simplex = Simplex::read_cache(cache, proxy_a, &xf_a, proxy_b, &xf_b);

    // vertices of the last simplex, to detect cycling
    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    let mut iter = 0;
    while iter < MAX_GJK_ITERATIONS {
        let save_count = simplex.count;
        for (i, v) in simplex.vertices().iter().enumerate() {
            save_a[i] = v.index_a;
            save_b[i] = v.index_b;
        }

        match simplex.count {
            1 => {}
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => debug_assert!(false, "empty simplex"),
        }

        // origin is inside the triangle, so the shapes overlap
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();
        // the origin lies on the simplex, so the shapes overlap
        if d.mag_sq() < EPSILON * EPSILON {
            break;
        }

        let index_a = proxy_a.support(xf_a.q.inv_rotate(-d));
        let index_b = proxy_b.support(xf_b.q.inv_rotate(d));
        let vertex = &mut simplex.v[simplex.count];
        vertex.index_a = index_a;
        vertex.wa = xf_a.apply(proxy_a.vertex(index_a));
        vertex.index_b = index_b;
        vertex.wb = xf_b.apply(proxy_b.vertex(index_b));
        vertex.w = vertex.wb - vertex.wa;

        iter += 1;

        // no progress if the new support point is already in the simplex
        let duplicate = (0..save_count).any(|i| index_a == save_a[i] && index_b == save_b[i]);
        if duplicate {
            break;
        }

        simplex.count += 1;
    }

    if iter == MAX_GJK_ITERATIONS {
        log::trace!("GJK distance hit the iteration limit of {MAX_GJK_ITERATIONS}");
    }

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut dist = (point_b - point_a).mag();

    simplex.write_cache(cache);

    if input.use_radii {
        if dist < EPSILON {
            // shapes are too close to safely compute a normal
            let p = 0.5 * (point_a + point_b);
            point_a = p;
            point_b = p;
            dist = 0.0;
        } else {
            // the shapes aren't overlapping,
            // move the witness points to the outer surface
            let r_a = proxy_a.radius;
            let r_b = proxy_b.radius;
            let normal = (point_b - point_a).normalized();
            dist = (dist - r_a - r_b).max(0.0);
            point_a += r_a * normal;
            point_b -= r_b * normal;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations: iter,
    }
}

/// Check whether two shapes overlap, including their rounding radii.
pub fn test_overlap(
    shape_a: &Shape,
    child_a: usize,
    shape_b: &Shape,
    child_b: usize,
    xf_a: &Transform,
    xf_b: &Transform,
) -> bool {
    let input = DistanceInput {
        proxy_a: DistanceProxy::from_shape(shape_a, child_a),
        proxy_b: DistanceProxy::from_shape(shape_b, child_b),
        transform_a: *xf_a,
        transform_b: *xf_b,
        use_radii: true,
    };
    let mut cache = SimplexCache::default();
    let output = distance(&input, &mut cache);
    output.distance < 10.0 * EPSILON
}

//
// Shape cast
//

/// Input for [`shape_cast`][self::shape_cast].
#[derive(Clone, Copy, Debug)]
pub struct ShapeCastInput<'a> {
    pub proxy_a: DistanceProxy<'a>,
    pub proxy_b: DistanceProxy<'a>,
    pub transform_a: Transform,
    pub transform_b: Transform,
    /// Translation of shape B over the cast, with A staying put.
    pub translation_b: Vec2,
}

/// A shape cast hit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeCastOutput {
    /// Point of first contact, on the surface of shape A.
    pub point: Vec2,
    /// Contact normal, pointing from A to B.
    pub normal: Vec2,
    /// Fraction of the translation at which the shapes touch.
    pub lambda: f64,
    pub iterations: usize,
}

/// Sweep shape B along a translation and find when it first touches shape A.
///
/// Returns `None` if the shapes never get within the target separation
/// over the translation, or if they overlap at the start.
pub fn shape_cast(input: &ShapeCastInput) -> Option<ShapeCastOutput> {
    let _span = tracy_span!("shape cast", "shape_cast");

    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let radius_a = proxy_a.radius.max(POLYGON_RADIUS);
    let radius_b = proxy_b.radius.max(POLYGON_RADIUS);
    let radius = radius_a + radius_b;

    let xf_a = input.transform_a;
    let xf_b = input.transform_b;

    let r = input.translation_b;
    let mut n = Vec2::zero();
    let mut lambda = 0.0;

    let mut simplex = Simplex::default();

    // initial support points in the direction of motion
    let index_a = proxy_a.support(xf_a.q.inv_rotate(-r));
    let mut wa = xf_a.apply(proxy_a.vertex(index_a));
    let index_b = proxy_b.support(xf_b.q.inv_rotate(r));
    let mut wb = xf_b.apply(proxy_b.vertex(index_b));
    let mut v = wa - wb;

    // sigma is the target distance between the cores
    let sigma = POLYGON_RADIUS.max(radius - POLYGON_RADIUS);
    let tolerance = 0.5 * LINEAR_SLOP;

    let mut iter = 0;
    while iter < MAX_GJK_ITERATIONS && v.mag() - sigma > tolerance {
        debug_assert!(simplex.count < 3);

        // support in direction -v (A - B)
        let index_a = proxy_a.support(xf_a.q.inv_rotate(-v));
        wa = xf_a.apply(proxy_a.vertex(index_a));
        let index_b = proxy_b.support(xf_b.q.inv_rotate(v));
        wb = xf_b.apply(proxy_b.vertex(index_b));
        let p = wa - wb;

        // -v is a normal at p
        v.normalize();

        // intersect the ray with the plane
        let vp = v.dot(p);
        let vr = v.dot(r);
        if vp - sigma > lambda * vr {
            if vr <= 0.0 {
                // moving apart
                return None;
            }

            lambda = (vp - sigma) / vr;
            if lambda > 1.0 {
                // doesn't reach within the translation
                return None;
            }

            n = -v;
            simplex.count = 0;
        }

        // Reverse the simplex since it works with B - A.
        // Shift by lambda * r to get the closest point to the current clip point.
        // The support point p is not shifted because the plane equation
        // is formed in unshifted space.
        let vertex = &mut simplex.v[simplex.count];
        vertex.index_a = index_b;
        vertex.wa = wb + lambda * r;
        vertex.index_b = index_a;
        vertex.wb = wa;
        vertex.w = vertex.wb - vertex.wa;
        vertex.a = 1.0;
        simplex.count += 1;

        match simplex.count {
            1 => {}
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => debug_assert!(false, "empty simplex"),
        }

        // origin inside the triangle means overlap
        if simplex.count == 3 {
            return None;
        }

        v = simplex.closest_point();

        // the iteration count is the number of support point calls
        iter += 1;
    }

    if iter == 0 {
        // initially overlapping
        return None;
    }

    // vertices were stored reversed, so B comes first
    let (_point_b, point_a) = simplex.witness_points();

    if v.mag_sq() > 0.0 {
        n = (-v).normalized();
    }

    Some(ShapeCastOutput {
        point: point_a + radius_a * n,
        normal: n,
        lambda,
        iterations: iter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shape::{Circle, Polygon};

    fn square_input<'a>(a: &'a Shape, b: &'a Shape, pos_b: Vec2, use_radii: bool) -> DistanceInput<'a> {
        DistanceInput {
            proxy_a: DistanceProxy::from_shape(a, 0),
            proxy_b: DistanceProxy::from_shape(b, 0),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::from_position(pos_b),
            use_radii,
        }
    }

    #[test]
    fn distance_between_squares() {
        let square = Shape::from(Polygon::new_box(1.0, 1.0));
        let input = square_input(&square, &square, Vec2::new(4.0, 0.0), false);

        let mut cache = SimplexCache::default();
        let out = distance(&input, &mut cache);
        assert!((out.distance - 2.0).abs() < 0.001);
        assert!((out.point_a.x - 1.0).abs() < 0.001);
        assert!((out.point_b.x - 3.0).abs() < 0.001);
        assert!((out.point_a.y - out.point_b.y).abs() < 0.001);
        assert!(out.point_a.y.abs() <= 1.0);

        // with the skin radius both surfaces move closer
        let mut cache = SimplexCache::default();
        let rounded = distance(
            &square_input(&square, &square, Vec2::new(4.0, 0.0), true),
            &mut cache,
        );
        assert!((rounded.distance - (2.0 - 2.0 * POLYGON_RADIUS)).abs() < 0.001);
        assert!((rounded.point_a.x - (1.0 + POLYGON_RADIUS)).abs() < 0.001);
    }

    #[test]
    fn cache_warm_starts_next_query() {
        let square = Shape::from(Polygon::new_box(1.0, 1.0));
        let input = square_input(&square, &square, Vec2::new(4.0, 0.5), false);

        let mut cache = SimplexCache::default();
        let cold = distance(&input, &mut cache);
        assert!(cache.count > 0);
        let warm = distance(&input, &mut cache);
        assert!((cold.distance - warm.distance).abs() < 0.001);
        assert!(warm.iterations <= cold.iterations);
    }

    #[test]
    fn overlapping_shapes_have_zero_distance() {
        let square = Shape::from(Polygon::new_box(1.0, 1.0));
        let input = square_input(&square, &square, Vec2::new(0.5, 0.3), true);
        let out = distance(&input, &mut SimplexCache::default());
        assert_eq!(out.distance, 0.0);
        assert!(test_overlap(
            &square,
            0,
            &square,
            0,
            &Transform::IDENTITY,
            &Transform::from_position(Vec2::new(0.5, 0.3)),
        ));
        assert!(!test_overlap(
            &square,
            0,
            &square,
            0,
            &Transform::IDENTITY,
            &Transform::from_position(Vec2::new(2.5, 0.0)),
        ));
    }

    #[test]
    fn circle_distance_uses_radii() {
        let a = Shape::from(Circle::new(Vec2::zero(), 1.0));
        let b = Shape::from(Circle::new(Vec2::zero(), 0.5));
        let input = DistanceInput {
            proxy_a: DistanceProxy::from_shape(&a, 0),
            proxy_b: DistanceProxy::from_shape(&b, 0),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::from_position(Vec2::new(0.0, 3.0)),
            use_radii: true,
        };
        let out = distance(&input, &mut SimplexCache::default());
        assert!((out.distance - 1.5).abs() < 0.001);
        assert!((out.point_a - Vec2::new(0.0, 1.0)).mag() < 0.001);
        assert!((out.point_b - Vec2::new(0.0, 2.5)).mag() < 0.001);
    }

    #[test]
    fn circle_cast_stops_at_contact() {
        let a = Shape::from(Circle::new(Vec2::zero(), 0.5));
        let b = Shape::from(Circle::new(Vec2::zero(), 0.5));
        let gap = 5.0;
        let combined_radius = 1.0;
        let translation = Vec2::new(-10.0, 0.0);

        let input = ShapeCastInput {
            proxy_a: DistanceProxy::from_shape(&a, 0),
            proxy_b: DistanceProxy::from_shape(&b, 0),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::from_position(Vec2::new(gap, 0.0)),
            translation_b: translation,
        };
        let hit = shape_cast(&input).expect("circles should meet");
        let travelled = hit.lambda * translation.mag();
        // stops within the skin of touching
        assert!((travelled - (gap - combined_radius)).abs() <= POLYGON_RADIUS + LINEAR_SLOP);
        assert!((hit.normal - Vec2::new(1.0, 0.0)).mag() < 0.001);
        assert!((hit.point - Vec2::new(0.5, 0.0)).mag() < 0.001);

        // moving away never hits
        let away = ShapeCastInput {
            translation_b: -translation,
            ..input
        };
        assert!(shape_cast(&away).is_none());

        // too short to reach
        let short = ShapeCastInput {
            translation_b: Vec2::new(-3.0, 0.0),
            ..input
        };
        assert!(shape_cast(&short).is_none());
    }

    #[test]
    fn box_cast_onto_box() {
        let square = Shape::from(Polygon::new_box(0.5, 0.5));
        let input = ShapeCastInput {
            proxy_a: DistanceProxy::from_shape(&square, 0),
            proxy_b: DistanceProxy::from_shape(&square, 0),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::from_position(Vec2::new(0.0, 4.0)),
            translation_b: Vec2::new(0.0, -6.0),
        };
        let hit = shape_cast(&input).expect("boxes should meet");
        // core gap is 3, cores stop one skin radius apart
        let travelled = hit.lambda * 6.0;
        assert!((travelled - (3.0 - POLYGON_RADIUS)).abs() <= LINEAR_SLOP);
        assert!((hit.normal - Vec2::new(0.0, 1.0)).mag() < 0.001);
    }
}
