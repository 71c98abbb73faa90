//! Time of impact between two moving shapes by conservative advancement,
//! for continuous collision detection of fast bodies.

use super::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
use crate::{
    math::{self as m, Sweep, Transform, Vec2},
    settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES, MAX_TOI_ITERATIONS, MAX_TOI_ROOT_ITERATIONS},
};

/// Input for [`time_of_impact`][self::time_of_impact].
#[derive(Clone, Copy, Debug)]
pub struct ToiInput<'a> {
    pub proxy_a: DistanceProxy<'a>,
    pub proxy_b: DistanceProxy<'a>,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// End of the sweep interval, in `[0, 1]`.
    pub t_max: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToiState {
    Unknown,
    /// The root finder didn't converge.
    Failed,
    /// The shapes overlap at the start of the interval.
    Overlapped,
    /// The shapes come within the target separation at `t`.
    Touching,
    /// The shapes stay apart for the whole interval.
    Separated,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToiOutput {
    pub state: ToiState,
    pub t: f64,
    /// Number of outer iterations used.
    pub iterations: usize,
}

//
// Separating function
//

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SeparationKind {
    Points,
    FaceA,
    FaceB,
}

/// Signed distance between the shapes along a fixed axis,
/// as a function of time over the sweeps.
struct SeparationFunction<'a, 'p> {
    proxy_a: &'p DistanceProxy<'a>,
    proxy_b: &'p DistanceProxy<'a>,
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationKind,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a, 'p> SeparationFunction<'a, 'p> {
    fn new(
        cache: &SimplexCache,
        proxy_a: &'p DistanceProxy<'a>,
        sweep_a: Sweep,
        proxy_b: &'p DistanceProxy<'a>,
        sweep_b: Sweep,
        t1: f64,
    ) -> Self {
        debug_assert!(0 < cache.count && cache.count < 3);

        let xf_a = sweep_a.get_transform(t1);
        let xf_b = sweep_b.get_transform(t1);

        let mut f = SeparationFunction {
            proxy_a,
            proxy_b,
            sweep_a,
            sweep_b,
            kind: SeparationKind::Points,
            local_point: Vec2::zero(),
            axis: Vec2::zero(),
        };

        if cache.count == 1 {
            let local_point_a = proxy_a.vertex(cache.index_a[0] as usize);
            let local_point_b = proxy_b.vertex(cache.index_b[0] as usize);
            let point_a = xf_a.apply(local_point_a);
            let point_b = xf_b.apply(local_point_b);
            f.axis = (point_b - point_a).normalized();
        } else if cache.index_a[0] == cache.index_a[1] {
            // two points on B and one on A
            f.kind = SeparationKind::FaceB;
            let local_point_b1 = proxy_b.vertex(cache.index_b[0] as usize);
            let local_point_b2 = proxy_b.vertex(cache.index_b[1] as usize);

            f.axis = m::cross_vs(local_point_b2 - local_point_b1, 1.0).normalized();
            let normal = xf_b.q.rotate(f.axis);

            f.local_point = 0.5 * (local_point_b1 + local_point_b2);
            let point_b = xf_b.apply(f.local_point);

            let local_point_a = proxy_a.vertex(cache.index_a[0] as usize);
            let point_a = xf_a.apply(local_point_a);

            if (point_a - point_b).dot(normal) < 0.0 {
                f.axis = -f.axis;
            }
        } else {
            // two points on A and one or two points on B
            f.kind = SeparationKind::FaceA;
            let local_point_a1 = proxy_a.vertex(cache.index_a[0] as usize);
            let local_point_a2 = proxy_a.vertex(cache.index_a[1] as usize);

            f.axis = m::cross_vs(local_point_a2 - local_point_a1, 1.0).normalized();
            let normal = xf_a.q.rotate(f.axis);

            f.local_point = 0.5 * (local_point_a1 + local_point_a2);
            let point_a = xf_a.apply(f.local_point);

            let local_point_b = proxy_b.vertex(cache.index_b[0] as usize);
            let point_b = xf_b.apply(local_point_b);

            if (point_b - point_a).dot(normal) < 0.0 {
                f.axis = -f.axis;
            }
        }

        f
    }

    fn transforms(&self, t: f64) -> (Transform, Transform) {
        (self.sweep_a.get_transform(t), self.sweep_b.get_transform(t))
    }

    /// Find the deepest points along the axis at time `t`.
    /// Returns the separation and the vertex indices on A and B.
    /// The index on the face side is unused and reported as 0.
    fn find_min_separation(&self, t: f64) -> (f64, usize, usize) {
        let (xf_a, xf_b) = self.transforms(t);

        match self.kind {
            SeparationKind::Points => {
                let axis_a = xf_a.q.inv_rotate(self.axis);
                let axis_b = xf_b.q.inv_rotate(-self.axis);

                let index_a = self.proxy_a.support(axis_a);
                let index_b = self.proxy_b.support(axis_b);

                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));

                ((point_b - point_a).dot(self.axis), index_a, index_b)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.rotate(self.axis);
                let point_a = xf_a.apply(self.local_point);

                let axis_b = xf_b.q.inv_rotate(-normal);
                let index_b = self.proxy_b.support(axis_b);
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));

                ((point_b - point_a).dot(normal), 0, index_b)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.rotate(self.axis);
                let point_b = xf_b.apply(self.local_point);

                let axis_a = xf_a.q.inv_rotate(-normal);
                let index_a = self.proxy_a.support(axis_a);
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));

                ((point_a - point_b).dot(normal), index_a, 0)
            }
        }
    }

    /// Separation of the given vertices along the axis at time `t`.
    fn evaluate(&self, index_a: usize, index_b: usize, t: f64) -> f64 {
        let (xf_a, xf_b) = self.transforms(t);

        match self.kind {
            SeparationKind::Points => {
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(self.axis)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.rotate(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(normal)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.rotate(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                (point_a - point_b).dot(normal)
            }
        }
    }
}

//
// Time of impact
//

/// Compute the upper bound on time before two shapes penetrate.
///
/// Time is a fraction of the sweep interval, in `[0, t_max]`.
/// This uses a swept separating axis and may miss some intermediate,
/// non-tunneling collisions.
pub fn time_of_impact(input: &ToiInput) -> ToiOutput {
    let _span = tracy_span!("time of impact", "time_of_impact");

    let mut output = ToiOutput {
        state: ToiState::Unknown,
        t: input.t_max,
        iterations: 0,
    };

    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;
    // keep angles small for the root finder
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;

    let total_radius = proxy_a.radius() + proxy_b.radius();
    let target = LINEAR_SLOP.max(total_radius - 3.0 * LINEAR_SLOP);
    let tolerance = 0.25 * LINEAR_SLOP;
    debug_assert!(target > tolerance);

    let mut t1 = 0.0;
    let mut iter = 0;

    let mut cache = SimplexCache::default();
    let mut distance_input = DistanceInput {
        proxy_a: input.proxy_a,
        proxy_b: input.proxy_b,
        transform_a: Transform::IDENTITY,
        transform_b: Transform::IDENTITY,
        use_radii: false,
    };

    // each outer iteration picks a new separating axis from the closest points
    loop {
        let (xf_a, xf_b) = (sweep_a.get_transform(t1), sweep_b.get_transform(t1));

        distance_input.transform_a = xf_a;
        distance_input.transform_b = xf_b;
        let distance_output = distance(&distance_input, &mut cache);

        // overlapping at the start of the interval
        if distance_output.distance <= 0.0 {
            output.state = ToiState::Overlapped;
            output.t = 0.0;
            break;
        }

        if distance_output.distance < target + tolerance {
            output.state = ToiState::Touching;
            output.t = t1;
            break;
        }

        let fcn = SeparationFunction::new(&cache, proxy_a, sweep_a, proxy_b, sweep_b, t1);

        // advance along the axis one deepest point at a time
        let mut done = false;
        let mut t2 = t_max;
        let mut push_back_iter = 0;
        loop {
            let (mut s2, index_a, index_b) = fcn.find_min_separation(t2);

            // is the final configuration separated?
            if s2 > target + tolerance {
                output.state = ToiState::Separated;
                output.t = t_max;
                done = true;
                break;
            }

            if s2 > target - tolerance {
                t1 = t2;
                break;
            }

            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            // already too deep at t1, the root finder ran out of iterations earlier
            if s1 < target - tolerance {
                output.state = ToiState::Failed;
                output.t = t1;
                done = true;
                break;
            }

            if s1 <= target + tolerance {
                output.state = ToiState::Touching;
                output.t = t1;
                done = true;
                break;
            }

            // solve s(t) = target on [t1, t2]
            let mut root_iter = 0;
            let mut a1 = t1;
            let mut a2 = t2;
            loop {
                // alternate false position and bisection
                let t = if root_iter & 1 == 1 {
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    0.5 * (a1 + a2)
                };
                root_iter += 1;

                let s = fcn.evaluate(index_a, index_b, t);

                if (s - target).abs() < tolerance {
                    t2 = t;
                    break;
                }

                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }

                if root_iter == MAX_TOI_ROOT_ITERATIONS {
                    break;
                }
            }

            push_back_iter += 1;
            if push_back_iter == MAX_POLYGON_VERTICES {
                break;
            }
        }

        iter += 1;

        if done {
            break;
        }

        if iter == MAX_TOI_ITERATIONS {
            output.state = ToiState::Failed;
            output.t = t1;
            break;
        }
    }

    output.iterations = iter;
    if output.state == ToiState::Failed {
        log::debug!(
            "Time of impact failed to converge after {} iterations, t = {}",
            iter,
            output.t
        );
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shape::{Polygon, Shape};

    fn linear_sweep(from: Vec2, to: Vec2) -> Sweep {
        Sweep {
            local_center: Vec2::zero(),
            c0: from,
            c: to,
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        }
    }

    #[test]
    fn boxes_colliding_head_on() {
        let square = Shape::from(Polygon::new_box(0.5, 0.5));
        let input = ToiInput {
            proxy_a: DistanceProxy::from_shape(&square, 0),
            proxy_b: DistanceProxy::from_shape(&square, 0),
            sweep_a: linear_sweep(Vec2::zero(), Vec2::zero()),
            sweep_b: linear_sweep(Vec2::new(5.0, 0.0), Vec2::new(-5.0, 0.0)),
            t_max: 1.0,
        };
        let out = time_of_impact(&input);
        assert_eq!(out.state, ToiState::Touching);
        // cores are one unit apart plus the target separation at impact
        let target = LINEAR_SLOP.max(2.0 * crate::settings::POLYGON_RADIUS - 3.0 * LINEAR_SLOP);
        let expected = (5.0 - 1.0 - target) / 10.0;
        assert!((out.t - expected).abs() < 0.001, "t = {}", out.t);
    }

    #[test]
    fn boxes_passing_by() {
        let square = Shape::from(Polygon::new_box(0.5, 0.5));
        let input = ToiInput {
            proxy_a: DistanceProxy::from_shape(&square, 0),
            proxy_b: DistanceProxy::from_shape(&square, 0),
            sweep_a: linear_sweep(Vec2::zero(), Vec2::zero()),
            sweep_b: linear_sweep(Vec2::new(5.0, 3.0), Vec2::new(-5.0, 3.0)),
            t_max: 1.0,
        };
        let out = time_of_impact(&input);
        assert_eq!(out.state, ToiState::Separated);
        assert_eq!(out.t, 1.0);
    }

    #[test]
    fn initially_overlapping() {
        let square = Shape::from(Polygon::new_box(0.5, 0.5));
        let input = ToiInput {
            proxy_a: DistanceProxy::from_shape(&square, 0),
            proxy_b: DistanceProxy::from_shape(&square, 0),
            sweep_a: linear_sweep(Vec2::zero(), Vec2::zero()),
            sweep_b: linear_sweep(Vec2::new(0.2, 0.1), Vec2::new(3.0, 0.0)),
            t_max: 1.0,
        };
        let out = time_of_impact(&input);
        assert_eq!(out.state, ToiState::Overlapped);
        assert_eq!(out.t, 0.0);
    }

    #[test]
    fn rotating_bar_hits_box() {
        let bar = Shape::from(Polygon::new_box(2.0, 0.1));
        let square = Shape::from(Polygon::new_box(0.5, 0.5));
        // bar spins a quarter turn in place, the box sits in its path
        let sweep_a = Sweep {
            local_center: Vec2::zero(),
            c0: Vec2::zero(),
            c: Vec2::zero(),
            a0: 0.0,
            a: std::f64::consts::FRAC_PI_2,
            alpha0: 0.0,
        };
        let input = ToiInput {
            proxy_a: DistanceProxy::from_shape(&bar, 0),
            proxy_b: DistanceProxy::from_shape(&square, 0),
            sweep_a,
            sweep_b: linear_sweep(Vec2::new(1.0, 1.5), Vec2::new(1.0, 1.5)),
            t_max: 1.0,
        };
        let out = time_of_impact(&input);
        assert_eq!(out.state, ToiState::Touching);
        assert!(out.t > 0.0 && out.t < 1.0);

        // the shapes are apart just before the reported time
        let mut cache = SimplexCache::default();
        let before = distance(
            &DistanceInput {
                proxy_a: input.proxy_a,
                proxy_b: input.proxy_b,
                transform_a: sweep_a.get_transform(out.t),
                transform_b: input.sweep_b.get_transform(out.t),
                use_radii: false,
            },
            &mut cache,
        );
        assert!(before.distance > 0.0);
        assert!(before.distance < 2.0 * LINEAR_SLOP);
    }
}
