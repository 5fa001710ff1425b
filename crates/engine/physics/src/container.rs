//! Containers: the link between collision objects and game objects
//!
//! Every collider (and rigid body) that takes part in room-aware filtering or
//! room-coherence tracking is tagged with exactly one [`Container`]. The tag
//! is packed into rapier's `user_data` field as a [`ColliderTag`].
//!
//! Containers never own anything. Their object and room references are weak
//! handles: whichever side is destroyed first must clear them, either by
//! removing the container ([`ContainerSet::remove`]) or by nulling the
//! reference ([`ContainerSet::forget_room`], [`ContainerSet::forget_object`]).

use catacomb_world::RoomId;
use std::collections::HashMap;

/// What kind of game object owns a collision object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectKind {
    /// Static room geometry (heightmaps, room statics)
    WorldGeometry,
    /// Kinematic body of one bone of an entity
    EntityBodyPart,
    /// Non-physical overlap probe
    GhostProbe,
    /// Free-floating dynamic object (thrown, dropped)
    MiscDynamic,
}

/// Weak reference to the owning game object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectRef {
    Entity(u32),
    Room(RoomId),
    Item(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Container {
    pub kind: ObjectKind,
    pub object: Option<ObjectRef>,
    pub room: Option<RoomId>,
}

impl Container {
    pub fn new(kind: ObjectKind, object: Option<ObjectRef>, room: Option<RoomId>) -> Self {
        Self { kind, object, room }
    }
}

/// Handle of a container inside the world's [`ContainerSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerHandle(pub u32);

/// Tag stored in the `user_data` of colliders and rigid bodies
///
/// Layout: the low 64 bits hold `container + 1` (zero means untagged), the
/// high 64 bits hold the integer index (bone index for entity parts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ColliderTag {
    pub container: Option<ContainerHandle>,
    pub index: u32,
}

impl ColliderTag {
    pub fn new(container: ContainerHandle, index: u32) -> Self {
        Self {
            container: Some(container),
            index,
        }
    }

    pub fn to_user_data(self) -> u128 {
        let low = self.container.map_or(0, |c| c.0 as u64 + 1);
        (low as u128) | ((self.index as u128) << 64)
    }

    pub fn from_user_data(data: u128) -> Self {
        let low = data as u64;
        let container = if low == 0 {
            None
        } else {
            u32::try_from(low - 1).ok().map(ContainerHandle)
        };
        Self {
            container,
            index: (data >> 64) as u32,
        }
    }
}

/// Storage for all containers of a physics world
///
/// Handles are never reused, so a stale handle simply resolves to nothing.
#[derive(Debug, Default)]
pub struct ContainerSet {
    containers: HashMap<ContainerHandle, Container>,
    next: u32,
}

impl ContainerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, container: Container) -> ContainerHandle {
        let handle = ContainerHandle(self.next);
        self.next += 1;
        self.containers.insert(handle, container);
        handle
    }

    pub fn remove(&mut self, handle: ContainerHandle) -> Option<Container> {
        self.containers.remove(&handle)
    }

    pub fn get(&self, handle: ContainerHandle) -> Option<&Container> {
        self.containers.get(&handle)
    }

    pub fn get_mut(&mut self, handle: ContainerHandle) -> Option<&mut Container> {
        self.containers.get_mut(&handle)
    }

    /// Resolve the container of a rapier `user_data` value
    pub fn from_user_data(&self, data: u128) -> Option<(ContainerHandle, &Container)> {
        let handle = ColliderTag::from_user_data(data).container?;
        self.get(handle).map(|c| (handle, c))
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Null every room reference to `room`
    pub fn forget_room(&mut self, room: RoomId) {
        for container in self.containers.values_mut() {
            if container.room == Some(room) {
                container.room = None;
            }
        }
    }

    /// Null every object reference to `object`
    pub fn forget_object(&mut self, object: ObjectRef) {
        for container in self.containers.values_mut() {
            if container.object == Some(object) {
                container.object = None;
            }
        }
    }
}
