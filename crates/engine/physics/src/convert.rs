//! glam <-> nalgebra conversions at the rapier boundary

use glam::{Mat4, Quat, Vec3};
use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::*;

pub(crate) fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

pub(crate) fn to_point(v: Vec3) -> Point<Real> {
    Point::new(v.x, v.y, v.z)
}

pub(crate) fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

pub(crate) fn to_rotation(rotation: Quat) -> UnitQuaternion<Real> {
    UnitQuaternion::from_quaternion(Quaternion::new(
        rotation.w, rotation.x, rotation.y, rotation.z,
    ))
}

pub(crate) fn from_rotation(rotation: &UnitQuaternion<Real>) -> Quat {
    Quat::from_xyzw(rotation.i, rotation.j, rotation.k, rotation.w)
}

pub(crate) fn to_isometry(rotation: Quat, translation: Vec3) -> Isometry<Real> {
    Isometry::from_parts(
        Translation3::new(translation.x, translation.y, translation.z),
        to_rotation(rotation),
    )
}

/// Rigid part of an affine matrix; scale is dropped
pub(crate) fn isometry_from_mat4(m: &Mat4) -> Isometry<Real> {
    to_isometry(rotation_of(m), translation_of(m))
}

pub(crate) fn rotation_of(m: &Mat4) -> Quat {
    let (_scale, rotation, _translation) = m.to_scale_rotation_translation();
    rotation.normalize()
}

pub(crate) fn translation_of(m: &Mat4) -> Vec3 {
    m.w_axis.truncate()
}

pub(crate) fn mat4_from_isometry(iso: &Isometry<Real>) -> Mat4 {
    Mat4::from_rotation_translation(
        from_rotation(&iso.rotation),
        from_vector(&iso.translation.vector),
    )
}
