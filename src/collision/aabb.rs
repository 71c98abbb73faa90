//! Axis-aligned bounding boxes and the ray types used to cast against them.

use crate::math::{self as m, Vec2};

/// An axis-aligned bounding box.
///
/// A valid AABB has `min <= max` componentwise and finite corners.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub struct AABB {
    pub min: Vec2,
    pub max: Vec2,
}

impl AABB {
    #[inline]
    pub fn new(min: Vec2, max: Vec2) -> Self {
        AABB { min, max }
    }

    /// The smallest AABB containing both of the given points.
    #[inline]
    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        AABB {
            min: a.min_by_component(b),
            max: a.max_by_component(b),
        }
    }

    pub fn is_valid(&self) -> bool {
        let d = self.max - self.min;
        d.x >= 0.0 && d.y >= 0.0 && m::is_valid(self.min) && m::is_valid(self.max)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        0.5 * (self.min + self.max)
    }

    /// Half-widths of the box.
    #[inline]
    pub fn extents(&self) -> Vec2 {
        0.5 * (self.max - self.min)
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// The perimeter, which the dynamic tree uses as its cost metric.
    #[inline]
    pub fn perimeter(&self) -> f64 {
        2.0 * (self.width() + self.height())
    }

    /// The smallest AABB containing both `self` and `other`.
    #[inline]
    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            min: self.min.min_by_component(other.min),
            max: self.max.max_by_component(other.max),
        }
    }

    /// Grow the box by `r` in every direction.
    #[inline]
    pub fn padded(&self, r: f64) -> AABB {
        let r = Vec2::new(r, r);
        AABB {
            min: self.min - r,
            max: self.max + r,
        }
    }

    /// Check whether `other` lies entirely inside `self`.
    #[inline]
    pub fn contains(&self, other: &AABB) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    #[inline]
    pub fn contains_point(&self, p: Vec2) -> bool {
        self.min.x <= p.x && p.x <= self.max.x && self.min.y <= p.y && p.y <= self.max.y
    }

    /// Check whether two boxes overlap. Touching boxes count as overlapping.
    #[inline]
    pub fn overlaps(&self, other: &AABB) -> bool {
        !(other.min.x > self.max.x
            || other.min.y > self.max.y
            || self.min.x > other.max.x
            || self.min.y > other.max.y)
    }

    /// Intersect the box with a ray segment using the slab method.
    ///
    /// Returns `None` if the ray misses, starts inside the box,
    /// or only hits beyond `input.max_fraction`.
    pub fn ray_cast(&self, input: &RayCastInput) -> Option<RayCastOutput> {
        let p = input.p1;
        let d = input.p2 - input.p1;

        let mut t_min = f64::MIN;
        let mut t_max = f64::MAX;
        let mut normal = Vec2::zero();

        for (axis, (p_i, d_i, min_i, max_i)) in [
            (p.x, d.x, self.min.x, self.max.x),
            (p.y, d.y, self.min.y, self.max.y),
        ]
        .into_iter()
        .enumerate()
        {
            if d_i.abs() < crate::settings::EPSILON {
                // parallel to this slab
                if p_i < min_i || max_i < p_i {
                    return None;
                }
                continue;
            }

            let inv_d = 1.0 / d_i;
            let mut t1 = (min_i - p_i) * inv_d;
            let mut t2 = (max_i - p_i) * inv_d;
            // sign of the normal of the entry face
            let mut s = -1.0;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
                s = 1.0;
            }

            if t1 > t_min {
                normal = Vec2::zero();
                if axis == 0 {
                    normal.x = s;
                } else {
                    normal.y = s;
                }
                t_min = t1;
            }
            t_max = t_max.min(t2);

            if t_min > t_max {
                return None;
            }
        }

        if t_min < 0.0 || input.max_fraction < t_min {
            return None;
        }

        Some(RayCastOutput {
            normal,
            fraction: t_min,
        })
    }
}

/// A ray segment from `p1` towards `p2`,
/// considered up to `p1 + max_fraction * (p2 - p1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayCastInput {
    pub p1: Vec2,
    pub p2: Vec2,
    pub max_fraction: f64,
}

/// A ray hit: the surface normal at the hit point and the fraction
/// of `p2 - p1` travelled before hitting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayCastOutput {
    pub normal: Vec2,
    pub fraction: f64,
}

impl RayCastInput {
    /// The point at `fraction` along the ray.
    #[inline]
    pub fn point_at(&self, fraction: f64) -> Vec2 {
        self.p1 + fraction * (self.p2 - self.p1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aabb(min: [f64; 2], max: [f64; 2]) -> AABB {
        AABB::new(Vec2::from(min), Vec2::from(max))
    }

    #[test]
    fn overlap_is_symmetric() {
        let cases = [
            (aabb([0., 0.], [1., 1.]), aabb([2., 2.], [3., 3.]), false),
            (aabb([0., 0.], [2., 2.]), aabb([1., 1.], [3., 3.]), true),
            (aabb([0., 0.], [1., 1.]), aabb([1., 0.], [2., 1.]), true),
            (aabb([0., 0.], [1., 1.]), aabb([0., 1.5], [1., 2.]), false),
            (aabb([-5., -5.], [5., 5.]), aabb([-1., -1.], [1., 1.]), true),
        ];
        for (a, b, expected) in cases {
            assert_eq!(a.overlaps(&b), expected, "{a:?} vs {b:?}");
            assert_eq!(b.overlaps(&a), expected, "{b:?} vs {a:?}");
        }
    }

    #[test]
    fn union_contains_both() {
        let a = aabb([0., -1.], [1., 1.]);
        let b = aabb([3., 2.], [4., 5.]);
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert!(!a.contains(&u));
        assert_eq!(u, aabb([0., -1.], [4., 5.]));
        assert!((u.perimeter() - 2.0 * (4.0 + 6.0)).abs() < 0.001);
    }

    #[test]
    fn validity() {
        assert!(aabb([0., 0.], [1., 1.]).is_valid());
        assert!(aabb([1., 1.], [1., 1.]).is_valid());
        assert!(!aabb([1., 0.], [0., 1.]).is_valid());
        assert!(!aabb([0., 0.], [f64::INFINITY, 1.]).is_valid());
        assert!(!aabb([f64::NAN, 0.], [1., 1.]).is_valid());
    }

    #[test]
    fn ray_cast_slabs() {
        let b = aabb([1., -1.], [3., 1.]);

        // straight on from the left
        let hit = b
            .ray_cast(&RayCastInput {
                p1: Vec2::new(-1., 0.),
                p2: Vec2::new(3., 0.),
                max_fraction: 1.,
            })
            .expect("ray should hit");
        assert!((hit.fraction - 0.5).abs() < 0.001);
        assert_eq!(hit.normal, Vec2::new(-1., 0.));

        // diagonal from above, entering through the top face
        let hit = b
            .ray_cast(&RayCastInput {
                p1: Vec2::new(2., 3.),
                p2: Vec2::new(2.5, -1.),
                max_fraction: 1.,
            })
            .expect("ray should hit");
        assert!((hit.fraction - 0.5).abs() < 0.001);
        assert_eq!(hit.normal, Vec2::new(0., 1.));

        // too short
        assert!(b
            .ray_cast(&RayCastInput {
                p1: Vec2::new(-1., 0.),
                p2: Vec2::new(3., 0.),
                max_fraction: 0.4,
            })
            .is_none());

        // parallel and outside the slab
        assert!(b
            .ray_cast(&RayCastInput {
                p1: Vec2::new(-1., 2.),
                p2: Vec2::new(5., 2.),
                max_fraction: 1.,
            })
            .is_none());

        // starting inside doesn't count as a hit
        assert!(b
            .ray_cast(&RayCastInput {
                p1: Vec2::new(2., 0.),
                p2: Vec2::new(5., 0.),
                max_fraction: 1.,
            })
            .is_none());
    }
}
