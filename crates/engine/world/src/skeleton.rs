//! Skeletons of articulated entities
//!
//! A skeleton is an ordered list of bone tags forming a tree (parents always
//! precede their children). Every bone carries a body-part bit used to select
//! which parts take part in a correction or query pass.

use crate::mesh::BaseMesh;
use glam::Mat4;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};
use std::sync::Arc;
use thiserror::Error;

/// Bitmask partitioning a skeleton's bones into movement groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BodyParts(pub u32);

impl BodyParts {
    pub const NONE: Self = Self(0);

    pub const BODY_LOW: Self = Self(1 << 0);
    pub const BODY_UPPER: Self = Self(1 << 1);
    pub const HEAD: Self = Self(1 << 2);

    pub const LEFT_HAND_1: Self = Self(1 << 3);
    pub const LEFT_HAND_2: Self = Self(1 << 4);
    pub const LEFT_HAND_3: Self = Self(1 << 5);
    pub const RIGHT_HAND_1: Self = Self(1 << 6);
    pub const RIGHT_HAND_2: Self = Self(1 << 7);
    pub const RIGHT_HAND_3: Self = Self(1 << 8);

    pub const LEFT_LEG_1: Self = Self(1 << 9);
    pub const LEFT_LEG_2: Self = Self(1 << 10);
    pub const LEFT_LEG_3: Self = Self(1 << 11);
    pub const RIGHT_LEG_1: Self = Self(1 << 12);
    pub const RIGHT_LEG_2: Self = Self(1 << 13);
    pub const RIGHT_LEG_3: Self = Self(1 << 14);

    /// Main torso parts; these get the anti-tunneling treatment while moving.
    pub const TORSO: Self = Self(Self::BODY_LOW.0 | Self::BODY_UPPER.0);

    pub const HANDS: Self = Self(
        Self::LEFT_HAND_1.0
            | Self::LEFT_HAND_2.0
            | Self::LEFT_HAND_3.0
            | Self::RIGHT_HAND_1.0
            | Self::RIGHT_HAND_2.0
            | Self::RIGHT_HAND_3.0,
    );

    pub const LEGS: Self = Self(
        Self::LEFT_LEG_1.0
            | Self::LEFT_LEG_2.0
            | Self::LEFT_LEG_3.0
            | Self::RIGHT_LEG_1.0
            | Self::RIGHT_LEG_2.0
            | Self::RIGHT_LEG_3.0,
    );

    pub const ALL: Self = Self(u32::MAX);

    /// Check if all bits of `other` are set
    #[inline]
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if any bit of `other` is set
    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for BodyParts {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for BodyParts {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for BodyParts {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for BodyParts {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

/// One rigid segment of an articulated entity
#[derive(Debug, Clone)]
pub struct BoneTag {
    /// Index of the parent bone; `None` for the root
    pub parent: Option<u16>,
    pub body_part: BodyParts,
    /// Bone-to-model transform for the current animation frame
    pub full_transform: Mat4,
    /// Shared mesh; bones without a mesh get no collision body
    pub mesh: Option<Arc<BaseMesh>>,
}

impl BoneTag {
    pub fn new(parent: Option<u16>, body_part: BodyParts, mesh: Option<Arc<BaseMesh>>) -> Self {
        Self {
            parent,
            body_part,
            full_transform: Mat4::IDENTITY,
            mesh,
        }
    }

    pub fn with_transform(mut self, full_transform: Mat4) -> Self {
        self.full_transform = full_transform;
        self
    }
}

/// Errors raised while assembling a skeleton
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SkeletonError {
    #[error("skeleton has no bones")]
    Empty,
    #[error("bone {bone} has parent {parent}, which does not precede it")]
    InvalidParent { bone: u16, parent: u16 },
    #[error("root bone {0} must not have a parent")]
    ParentedRoot(u16),
    #[error("collision map entry {0} is not a bone index")]
    InvalidCollisionMapEntry(u16),
    #[error("too many bones: {0}")]
    TooManyBones(usize),
}

/// Ordered bones plus the order in which penetration resolution visits them
#[derive(Debug, Clone)]
pub struct Skeleton {
    bones: Vec<BoneTag>,
    collision_map: Vec<u16>,
}

impl Skeleton {
    /// Build a skeleton visiting bones in index order
    pub fn new(bones: Vec<BoneTag>) -> Result<Self, SkeletonError> {
        let count =
            u16::try_from(bones.len()).map_err(|_| SkeletonError::TooManyBones(bones.len()))?;
        Self::with_collision_map(bones, (0..count).collect())
    }

    /// Build a skeleton with an explicit resolution order
    ///
    /// The collision map may list priority bones first; it does not need to be
    /// in tree order. The first entry is treated as the root of the pass.
    pub fn with_collision_map(
        bones: Vec<BoneTag>,
        collision_map: Vec<u16>,
    ) -> Result<Self, SkeletonError> {
        if bones.is_empty() {
            return Err(SkeletonError::Empty);
        }
        if bones.len() > u16::MAX as usize {
            return Err(SkeletonError::TooManyBones(bones.len()));
        }
        if let Some(parent) = bones[0].parent {
            return Err(SkeletonError::ParentedRoot(parent));
        }

        for (i, bone) in bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent as usize >= i {
                    return Err(SkeletonError::InvalidParent {
                        bone: i as u16,
                        parent,
                    });
                }
            }
        }

        if let Some(&bad) = collision_map.iter().find(|&&m| m as usize >= bones.len()) {
            return Err(SkeletonError::InvalidCollisionMapEntry(bad));
        }

        Ok(Self {
            bones,
            collision_map,
        })
    }

    pub fn bones(&self) -> &[BoneTag] {
        &self.bones
    }

    pub fn bone(&self, index: usize) -> Option<&BoneTag> {
        self.bones.get(index)
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn collision_map(&self) -> &[u16] {
        &self.collision_map
    }

    /// Parent of a bone, if any
    pub fn parent(&self, index: usize) -> Option<&BoneTag> {
        self.bones
            .get(index)
            .and_then(|b| b.parent)
            .and_then(|p| self.bones.get(p as usize))
    }

    /// Set the animated bone-to-model transform of one bone
    ///
    /// Out of range indices are ignored.
    pub fn set_bone_transform(&mut self, index: usize, full_transform: Mat4) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.full_transform = full_transform;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_body_parts_ops() {
        let parts = BodyParts::BODY_LOW | BodyParts::HEAD;
        assert!(parts.intersects(BodyParts::TORSO));
        assert!(!parts.contains(BodyParts::TORSO));
        assert!(BodyParts::TORSO.contains(BodyParts::BODY_UPPER));
        assert!(!BodyParts::LEGS.intersects(BodyParts::HANDS));
        assert_eq!((parts & !BodyParts::HEAD), BodyParts::BODY_LOW);
    }

    #[test]
    fn test_skeleton_validation() {
        let root = BoneTag::new(None, BodyParts::BODY_LOW, None);
        let child = BoneTag::new(Some(0), BodyParts::BODY_UPPER, None);
        let forward = BoneTag::new(Some(2), BodyParts::HEAD, None);

        assert!(Skeleton::new(vec![root.clone(), child.clone()]).is_ok());
        assert_eq!(
            Skeleton::new(vec![root.clone(), forward]).unwrap_err(),
            SkeletonError::InvalidParent { bone: 1, parent: 2 }
        );
        assert_eq!(Skeleton::new(Vec::new()).unwrap_err(), SkeletonError::Empty);
        assert_eq!(
            Skeleton::with_collision_map(vec![root, child], vec![1, 0, 5]).unwrap_err(),
            SkeletonError::InvalidCollisionMapEntry(5)
        );
    }

    #[test]
    fn test_parent_lookup_and_pose_update() {
        let mut skeleton = Skeleton::new(vec![
            BoneTag::new(None, BodyParts::BODY_LOW, None),
            BoneTag::new(Some(0), BodyParts::BODY_UPPER, None),
        ])
        .unwrap();

        assert!(skeleton.parent(0).is_none());
        assert_eq!(skeleton.parent(1).unwrap().body_part, BodyParts::BODY_LOW);

        let pose = Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0));
        skeleton.set_bone_transform(1, pose);
        assert_eq!(skeleton.bone(1).unwrap().full_transform, pose);
        skeleton.set_bone_transform(9, pose);
    }
}
