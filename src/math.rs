//! Types, aliases and helper operations for doing 2D rigid-body math with `ultraviolet`.
use std::f64::consts::PI;
pub use ultraviolet as uv;

pub type Vec2 = uv::DVec2;

/// An angle in either degrees or radians.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub enum Angle {
    Rad(f64),
    Deg(f64),
}
impl Angle {
    /// Get the angle as degrees.
    #[inline]
    pub fn deg(&self) -> f64 {
        match self {
            Angle::Rad(rad) => rad * 180.0 / PI,
            Angle::Deg(deg) => *deg,
        }
    }

    /// Get the angle as radians.
    #[inline]
    pub fn rad(&self) -> f64 {
        match self {
            Angle::Rad(rad) => *rad,
            Angle::Deg(deg) => deg * PI / 180.0,
        }
    }
}
impl Default for Angle {
    fn default() -> Self {
        Angle::Rad(0.0)
    }
}
impl From<Angle> for Rot {
    #[inline]
    fn from(ang: Angle) -> Rot {
        Rot::from_angle(ang.rad())
    }
}
impl From<Rot> for Angle {
    #[inline]
    fn from(rot: Rot) -> Self {
        Angle::Rad(rot.angle())
    }
}

//
// Rotation
//

/// A rotation stored as its sine and cosine,
/// so that composing and applying it needs no trigonometry.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub struct Rot {
    pub s: f64,
    pub c: f64,
}

impl Rot {
    pub const IDENTITY: Rot = Rot { s: 0.0, c: 1.0 };

    #[inline]
    pub fn from_angle(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Rot { s, c }
    }

    #[inline]
    pub fn angle(&self) -> f64 {
        self.s.atan2(self.c)
    }

    #[inline]
    pub fn x_axis(&self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    #[inline]
    pub fn y_axis(&self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Rotate a vector by this rotation.
    #[inline]
    pub fn rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Rotate a vector by the inverse of this rotation.
    #[inline]
    pub fn inv_rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// Compose the inverse of `self` with `other`, i.e. `self⁻¹ * other`.
    #[inline]
    pub fn mul_t(&self, other: Rot) -> Rot {
        Rot {
            s: self.c * other.s - self.s * other.c,
            c: self.c * other.c + self.s * other.s,
        }
    }

    #[inline]
    pub fn inversed(&self) -> Rot {
        Rot {
            s: -self.s,
            c: self.c,
        }
    }
}

impl Default for Rot {
    fn default() -> Self {
        Rot::IDENTITY
    }
}

impl std::ops::Mul<Rot> for Rot {
    type Output = Rot;

    #[inline]
    fn mul(self, rhs: Rot) -> Rot {
        Rot {
            s: self.s * rhs.c + self.c * rhs.s,
            c: self.c * rhs.c - self.s * rhs.s,
        }
    }
}

impl std::ops::Mul<Vec2> for Rot {
    type Output = Vec2;

    #[inline]
    fn mul(self, rhs: Vec2) -> Vec2 {
        self.rotate(rhs)
    }
}

//
// Transform
//

/// A rigid transform: a rotation followed by a translation, no scaling.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub struct Transform {
    pub p: Vec2,
    pub q: Rot,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        p: Vec2 { x: 0.0, y: 0.0 },
        q: Rot::IDENTITY,
    };

    #[inline]
    pub fn new(position: Vec2, angle: impl Into<Angle>) -> Self {
        Transform {
            p: position,
            q: Rot::from(angle.into()),
        }
    }

    #[inline]
    pub fn from_position(position: Vec2) -> Self {
        Transform {
            p: position,
            q: Rot::IDENTITY,
        }
    }

    /// Transform a point from local space into the space this transform maps to.
    #[inline]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        self.q.rotate(v) + self.p
    }

    /// Transform a point back into the local space of this transform.
    #[inline]
    pub fn apply_inv(&self, v: Vec2) -> Vec2 {
        self.q.inv_rotate(v - self.p)
    }

    /// Compose the inverse of `self` with `other`, i.e. `self⁻¹ * other`.
    ///
    /// This re-expresses something positioned by `other`
    /// in the local frame of `self`.
    #[inline]
    pub fn mul_t(&self, other: Transform) -> Transform {
        Transform {
            p: self.q.inv_rotate(other.p - self.p),
            q: self.q.mul_t(other.q),
        }
    }

    #[inline]
    pub fn inversed(&self) -> Transform {
        let q = self.q.inversed();
        Transform {
            p: -q.rotate(self.p),
            q,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Transform::IDENTITY
    }
}

impl From<Angle> for Transform {
    fn from(angle: Angle) -> Self {
        Transform::new(Vec2::zero(), angle)
    }
}

impl From<Vec2> for Transform {
    fn from(position: Vec2) -> Self {
        Transform::from_position(position)
    }
}

impl std::ops::Mul<Transform> for Transform {
    type Output = Transform;

    #[inline]
    fn mul(self, rhs: Transform) -> Transform {
        Transform {
            p: self.q.rotate(rhs.p) + self.p,
            q: self.q * rhs.q,
        }
    }
}

impl std::ops::Mul<Vec2> for Transform {
    type Output = Vec2;

    #[inline]
    fn mul(self, rhs: Vec2) -> Vec2 {
        self.apply(rhs)
    }
}

//
// Sweep
//

/// The motion of a body over one time step, used for continuous collision.
///
/// Positions are of the center of mass, angles are in radians.
/// `alpha0` is the fraction of the step already consumed,
/// so `c0` and `a0` are the state at that fraction rather than at the start.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub struct Sweep {
    /// Center of mass in the body's local frame.
    pub local_center: Vec2,
    pub c0: Vec2,
    pub c: Vec2,
    pub a0: f64,
    pub a: f64,
    pub alpha0: f64,
}

impl Sweep {
    /// A sweep that stays at `xf` for the whole step.
    pub fn stationary(xf: Transform, local_center: Vec2) -> Self {
        let c = xf.apply(local_center);
        let a = xf.q.angle();
        Sweep {
            local_center,
            c0: c,
            c,
            a0: a,
            a,
            alpha0: 0.0,
        }
    }

    /// Get the body transform at a fraction `beta` of the step, in `[0, 1]`.
    pub fn get_transform(&self, beta: f64) -> Transform {
        let center = (1.0 - beta) * self.c0 + beta * self.c;
        let angle = (1.0 - beta) * self.a0 + beta * self.a;
        let q = Rot::from_angle(angle);
        Transform {
            p: center - q.rotate(self.local_center),
            q,
        }
    }

    /// Move the start of the sweep forward to `alpha`, keeping the end where it is.
    pub fn advance(&mut self, alpha: f64) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += beta * (self.c - self.c0);
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Wrap the start angle into `[0, 2π)`, shifting the end angle by the same amount.
    pub fn normalize(&mut self) {
        let two_pi = 2.0 * PI;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}

// Vec2 utils

#[inline]
pub fn left_normal(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}
#[inline]
pub fn right_normal(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

/// The z component of the 3D cross product of two vectors on the xy plane.
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Cross product of a vector and a scalar (a vector along the z axis).
#[inline]
pub fn cross_vs(v: Vec2, s: f64) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

/// Cross product of a scalar (a vector along the z axis) and a vector.
#[inline]
pub fn cross_sv(s: f64, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

#[inline]
pub fn is_valid(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

#[inline]
pub fn abs(v: Vec2) -> Vec2 {
    Vec2::new(v.x.abs(), v.y.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: Vec2, b: Vec2) -> bool {
        (a - b).mag() < 0.001
    }

    #[test]
    fn rotation_composes_as_angle_sum() {
        let (a, b) = (0.7, -2.1);
        let composed = Rot::from_angle(a) * Rot::from_angle(b);
        let direct = Rot::from_angle(a + b);
        assert!((composed.s - direct.s).abs() < 0.001);
        assert!((composed.c - direct.c).abs() < 0.001);

        let relative = Rot::from_angle(a).mul_t(Rot::from_angle(b));
        assert!((relative.angle() - (b - a)).abs() < 0.001);

        let v = Vec2::new(1.5, -0.5);
        assert!(approx_eq(
            Rot::from_angle(a).inv_rotate(Rot::from_angle(a).rotate(v)),
            v
        ));
    }

    #[test]
    fn inverse_composition_expresses_b_in_a() {
        let xf_a = Transform::new(Vec2::new(1.0, 2.0), Angle::Deg(30.0));
        let xf_b = Transform::new(Vec2::new(-3.0, 0.5), Angle::Deg(-75.0));
        let rel = xf_a.mul_t(xf_b);

        let local_b = Vec2::new(0.25, 4.0);
        let world = xf_b.apply(local_b);
        // the point in A's frame, computed two ways
        assert!(approx_eq(rel.apply(local_b), xf_a.apply_inv(world)));
        // composing back gives B again
        let back = xf_a * rel;
        assert!(approx_eq(back.p, xf_b.p));
        assert!((back.q.angle() - xf_b.q.angle()).abs() < 0.001);

        let inv = xf_a.inversed();
        assert!(approx_eq((inv * xf_a).p, Vec2::zero()));
        assert!(approx_eq(inv.apply(xf_a.apply(local_b)), local_b));
    }

    #[test]
    fn sweep_interpolates_around_local_center() {
        let mut sweep = Sweep {
            local_center: Vec2::new(1.0, 0.0),
            c0: Vec2::new(0.0, 0.0),
            c: Vec2::new(10.0, 0.0),
            a0: 0.0,
            a: PI,
            alpha0: 0.0,
        };
        let xf = sweep.get_transform(0.5);
        // the center of mass lands halfway
        assert!(approx_eq(xf.apply(sweep.local_center), Vec2::new(5.0, 0.0)));
        assert!((xf.q.angle() - PI / 2.0).abs() < 0.001);

        sweep.advance(0.5);
        assert!(approx_eq(sweep.c0, Vec2::new(5.0, 0.0)));
        assert!((sweep.a0 - PI / 2.0).abs() < 0.001);
        // the rest of the step still ends in the same place
        let end = sweep.get_transform(1.0);
        assert!(approx_eq(end.apply(sweep.local_center), Vec2::new(10.0, 0.0)));

        sweep.a0 = 5.0 * PI;
        sweep.a = 5.5 * PI;
        sweep.normalize();
        assert!((sweep.a0 - PI).abs() < 0.001);
        assert!((sweep.a - 1.5 * PI).abs() < 0.001);
    }
}
