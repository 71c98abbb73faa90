//! Contact manifolds: the points where two shapes touch,
//! with identities that stay stable from one step to the next.

use crate::{
    math::{Transform, Vec2},
    settings::{EPSILON, MAX_MANIFOLD_POINTS},
};

//
// Contact identity
//

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FeatureType {
    #[default]
    Vertex = 0,
    Face = 1,
}

/// The features of two shapes that intersect to form a contact point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct ContactFeature {
    /// Feature index on shape A.
    pub index_a: u8,
    /// Feature index on shape B.
    pub index_b: u8,
    pub type_a: FeatureType,
    pub type_b: FeatureType,
}

impl ContactFeature {
    /// The same contact seen from the other shape.
    #[inline]
    pub fn swapped(self) -> Self {
        ContactFeature {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

/// Identifies a contact point so that it can be matched
/// with the same point in the next step's manifold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct ContactId {
    pub feature: ContactFeature,
}

impl ContactId {
    #[inline]
    pub const fn new(feature: ContactFeature) -> Self {
        ContactId { feature }
    }

    /// All four feature fields packed into one integer.
    #[inline]
    pub const fn key(&self) -> u32 {
        let f = &self.feature;
        f.index_a as u32
            | (f.index_b as u32) << 8
            | (f.type_a as u32) << 16
            | (f.type_b as u32) << 24
    }
}

impl From<ContactFeature> for ContactId {
    fn from(feature: ContactFeature) -> Self {
        ContactId::new(feature)
    }
}

//
// Manifold
//

/// A contact point belonging to a manifold.
///
/// The meaning of `local_point` depends on the manifold type:
/// - [`Circles`][ManifoldType::Circles]: the local center of circle B
/// - [`FaceA`][ManifoldType::FaceA]: the local center of circle B or the clip point of polygon B
/// - [`FaceB`][ManifoldType::FaceB]: the clip point of polygon A
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ManifoldPoint {
    pub local_point: Vec2,
    /// Accumulated normal impulse from the solver.
    pub normal_impulse: f64,
    /// Accumulated friction impulse from the solver.
    pub tangent_impulse: f64,
    pub id: ContactId,
}

impl ManifoldPoint {
    pub(crate) fn new(local_point: Vec2, id: ContactId) -> Self {
        ManifoldPoint {
            local_point,
            normal_impulse: 0.0,
            tangent_impulse: 0.0,
            id,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ManifoldType {
    #[default]
    Circles,
    FaceA,
    FaceB,
}

/// The contact points between two touching convex shapes,
/// in the local frames of the shapes so they can be reused
/// as the bodies move slightly.
///
/// - [`Circles`][ManifoldType::Circles]: `local_point` is the center of circle A,
///   `local_normal` is unused
/// - [`FaceA`][ManifoldType::FaceA]: `local_point` and `local_normal` describe
///   the reference face on shape A
/// - [`FaceB`][ManifoldType::FaceB]: same, but the reference face is on shape B
///
/// An empty manifold (zero points) means the shapes aren't touching.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Manifold {
    points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    point_count: usize,
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub kind: ManifoldType,
}

impl Manifold {
    pub(crate) fn new(kind: ManifoldType, local_normal: Vec2, local_point: Vec2) -> Self {
        Manifold {
            kind,
            local_normal,
            local_point,
            ..Default::default()
        }
    }

    pub(crate) fn push(&mut self, point: ManifoldPoint) {
        debug_assert!(self.point_count < MAX_MANIFOLD_POINTS);
        self.points[self.point_count] = point;
        self.point_count += 1;
    }

    #[inline]
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    #[inline]
    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.point_count]
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }

    /// Copy accumulated impulses from the previous step's manifold
    /// onto the points whose contact IDs match, for warm starting.
    /// Points that are new in this manifold start from zero.
    pub fn carry_impulses(&mut self, old: &Manifold) {
        for point in self.points_mut() {
            point.normal_impulse = 0.0;
            point.tangent_impulse = 0.0;
            if let Some(old_point) = old.points().iter().find(|p| p.id.key() == point.id.key()) {
                point.normal_impulse = old_point.normal_impulse;
                point.tangent_impulse = old_point.tangent_impulse;
            }
        }
    }
}

/// A manifold in world space, with the surfaces of both shapes resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorldManifold {
    /// Points from A to B.
    pub normal: Vec2,
    /// Contact points, halfway between the surfaces.
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// Negative when the shapes overlap.
    pub separations: [f64; MAX_MANIFOLD_POINTS],
    pub point_count: usize,
}

impl WorldManifold {
    /// Evaluate a manifold with the given transforms and shape radii.
    pub fn new(
        manifold: &Manifold,
        xf_a: &Transform,
        radius_a: f64,
        xf_b: &Transform,
        radius_b: f64,
    ) -> Self {
        let mut wm = WorldManifold {
            point_count: manifold.point_count,
            ..Default::default()
        };
        if manifold.is_empty() {
            return wm;
        }

        match manifold.kind {
            ManifoldType::Circles => {
                let point_a = xf_a.apply(manifold.local_point);
                let point_b = xf_b.apply(manifold.points[0].local_point);
                wm.normal = Vec2::new(1.0, 0.0);
                if (point_b - point_a).mag_sq() > EPSILON * EPSILON {
                    wm.normal = (point_b - point_a).normalized();
                }

                let c_a = point_a + radius_a * wm.normal;
                let c_b = point_b - radius_b * wm.normal;
                wm.points[0] = 0.5 * (c_a + c_b);
                wm.separations[0] = (c_b - c_a).dot(wm.normal);
            }
            ManifoldType::FaceA => {
                wm.normal = xf_a.q.rotate(manifold.local_normal);
                let plane_point = xf_a.apply(manifold.local_point);

                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = xf_b.apply(mp.local_point);
                    let c_a = clip_point
                        + (radius_a - (clip_point - plane_point).dot(wm.normal)) * wm.normal;
                    let c_b = clip_point - radius_b * wm.normal;
                    wm.points[i] = 0.5 * (c_a + c_b);
                    wm.separations[i] = (c_b - c_a).dot(wm.normal);
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q.rotate(manifold.local_normal);
                let plane_point = xf_b.apply(manifold.local_point);

                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = xf_a.apply(mp.local_point);
                    let c_b =
                        clip_point + (radius_b - (clip_point - plane_point).dot(normal)) * normal;
                    let c_a = clip_point - radius_a * normal;
                    wm.points[i] = 0.5 * (c_a + c_b);
                    wm.separations[i] = (c_a - c_b).dot(normal);
                }

                // ensure the normal points from A to B
                wm.normal = -normal;
            }
        }

        wm
    }

    #[inline]
    pub fn points(&self) -> &[Vec2] {
        &self.points[..self.point_count]
    }
}

//
// Point states
//

/// How a contact point changed between two manifolds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointState {
    /// No point in this slot.
    #[default]
    Null,
    /// The point appeared in the new manifold.
    Add,
    /// The point exists in both manifolds.
    Persist,
    /// The point disappeared from the old manifold.
    Remove,
}

/// Compare the contact IDs of two manifolds of the same pair of shapes.
///
/// The first array describes the points of `m1` (`Persist` or `Remove`),
/// the second the points of `m2` (`Add` or `Persist`).
pub fn point_states(
    m1: &Manifold,
    m2: &Manifold,
) -> (
    [PointState; MAX_MANIFOLD_POINTS],
    [PointState; MAX_MANIFOLD_POINTS],
) {
    let mut state1 = [PointState::Null; MAX_MANIFOLD_POINTS];
    let mut state2 = [PointState::Null; MAX_MANIFOLD_POINTS];

    for (state, p1) in state1.iter_mut().zip(m1.points()) {
        let key = p1.id.key();
        *state = if m2.points().iter().any(|p2| p2.id.key() == key) {
            PointState::Persist
        } else {
            PointState::Remove
        };
    }

    for (state, p2) in state2.iter_mut().zip(m2.points()) {
        let key = p2.id.key();
        *state = if m1.points().iter().any(|p1| p1.id.key() == key) {
            PointState::Persist
        } else {
            PointState::Add
        };
    }

    (state1, state2)
}

//
// Clipping
//

/// A vertex of a segment being clipped, tagged with the features it came from.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClipVertex {
    pub v: Vec2,
    pub id: ContactId,
}

/// Clip a segment to the half-space `dot(normal, p) <= offset`.
///
/// Returns the clipped segment and how many of its vertices are valid.
/// A vertex created by clipping is tagged as a contact between
/// vertex `vertex_index_a` of the clipping shape and the face the segment came from.
pub fn clip_segment_to_line(
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f64,
    vertex_index_a: usize,
) -> ([ClipVertex; 2], usize) {
    let mut v_out = [ClipVertex::default(); 2];
    let mut count = 0;

    // distances of the end points to the line
    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    // points behind the plane are kept
    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    // the points are on different sides of the plane
    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        v_out[count] = ClipVertex {
            v: v_in[0].v + interp * (v_in[1].v - v_in[0].v),
            // VertexA is hitting edgeB
            id: ContactId::new(ContactFeature {
                index_a: vertex_index_a as u8,
                index_b: v_in[0].id.feature.index_b,
                type_a: FeatureType::Vertex,
                type_b: FeatureType::Face,
            }),
        };
        count += 1;
    }

    (v_out, count)
}
