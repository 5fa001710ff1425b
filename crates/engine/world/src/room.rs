//! Rooms and room adjacency
//!
//! The world is partitioned into rooms. Each room knows its bounds and the
//! rooms it can "see" (its near rooms). Topology is fixed once the
//! [`RoomSet`] is built; collision filtering and room-coherence tracking only
//! ever read it.

use crate::sector::{Sector, SectorTween};
use glam::Vec3;
use tracing::warn;

/// Index of a room inside its [`RoomSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoomId(pub u32);

/// A convex-ish partition of the world
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Room {
    pub id: RoomId,
    pub bb_min: Vec3,
    pub bb_max: Vec3,
    pub near_rooms: Vec<RoomId>,
    pub sectors: Vec<Sector>,
    pub tweens: Vec<SectorTween>,
}

impl Room {
    /// Create an empty room with the given bounds
    ///
    /// The id is assigned by [`RoomSet::new`].
    pub fn new(bb_min: Vec3, bb_max: Vec3) -> Self {
        Self {
            id: RoomId(0),
            bb_min,
            bb_max,
            near_rooms: Vec::new(),
            sectors: Vec::new(),
            tweens: Vec::new(),
        }
    }

    pub fn with_near_rooms(mut self, near: impl IntoIterator<Item = RoomId>) -> Self {
        self.near_rooms.extend(near);
        self
    }

    pub fn with_sectors(mut self, sectors: Vec<Sector>, tweens: Vec<SectorTween>) -> Self {
        self.sectors = sectors;
        self.tweens = tweens;
        self
    }

    /// Check whether a point lies inside the room bounds (inclusive)
    pub fn contains(&self, pos: Vec3) -> bool {
        pos.cmpge(self.bb_min).all() && pos.cmple(self.bb_max).all()
    }

    pub fn lists_near(&self, other: RoomId) -> bool {
        self.near_rooms.contains(&other)
    }
}

/// All rooms of a loaded level
#[derive(Debug, Clone, Default)]
pub struct RoomSet {
    rooms: Vec<Room>,
}

impl RoomSet {
    /// Build the room set
    ///
    /// Room ids are reassigned to their index. Adjacency is made symmetric:
    /// if room A lists B as near, B gets A as well. Self references and ids
    /// that point outside the set are dropped.
    pub fn new(mut rooms: Vec<Room>) -> Self {
        let count = rooms.len();
        for (i, room) in rooms.iter_mut().enumerate() {
            room.id = RoomId(i as u32);
        }

        let mut edges = Vec::new();
        for room in &rooms {
            for &near in &room.near_rooms {
                if near.0 as usize >= count {
                    warn!(room = room.id.0, near = near.0, "dropping near room outside the level");
                    continue;
                }
                if near != room.id {
                    edges.push((room.id, near));
                }
            }
        }

        for room in &mut rooms {
            room.near_rooms.clear();
        }
        for (a, b) in edges {
            for (from, to) in [(a, b), (b, a)] {
                let list = &mut rooms[from.0 as usize].near_rooms;
                if !list.contains(&to) {
                    list.push(to);
                }
            }
        }

        Self { rooms }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn get(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.iter()
    }

    /// Global search: first room whose bounds contain `pos`
    pub fn find_pos(&self, pos: Vec3) -> Option<RoomId> {
        self.rooms.iter().find(|r| r.contains(pos)).map(|r| r.id)
    }

    /// Find the room containing `pos`, starting from the last known room
    ///
    /// Checks the last room, then its near rooms, and only then falls back to
    /// a global search.
    pub fn find_pos_coherent(&self, pos: Vec3, last: Option<RoomId>) -> Option<RoomId> {
        let Some(last_room) = last.and_then(|id| self.get(id)) else {
            return self.find_pos(pos);
        };

        if last_room.contains(pos) {
            return Some(last_room.id);
        }

        last_room
            .near_rooms
            .iter()
            .filter_map(|&id| self.get(id))
            .find(|r| r.contains(pos))
            .map(|r| r.id)
            .or_else(|| self.find_pos(pos))
    }

    /// Whether two rooms may interact: identical or mutually near
    pub fn are_near(&self, a: RoomId, b: RoomId) -> bool {
        if a == b {
            return true;
        }
        let listed = |x: RoomId, y: RoomId| self.get(x).is_some_and(|r| r.lists_near(y));
        listed(a, b) || listed(b, a)
    }
}
