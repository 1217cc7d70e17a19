//! Door rotation tracking
//!
//! The mixer refines its occlusion model with door state, so the tracker
//! watches every rotating door and reports yaw transitions. The table is
//! seeded with a sentinel at round start; the first real observation after
//! a reseed therefore announces each door's actual rotation.

use std::collections::HashMap;

use crate::game::geometry::Vec3;
use crate::game::world::DoorView;

/// Sentinel rotation meaning "reset/unknown" (also reported for destroyed
/// doors)
pub const ROTATION_RESET: i32 = 999;

/// A rotation transition worth reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorEvent {
    pub key: String,
    pub rotation: i32,
}

/// Quantized world-position key for a door
pub fn door_key(origin: Vec3) -> String {
    format!(
        "{} {} {}",
        origin.x as i32, origin.y as i32, origin.z as i32
    )
}

#[derive(Default)]
pub struct DoorTable {
    rotations: HashMap<String, i32>,
}

impl DoorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything and seed each door with the sentinel. Called on
    /// round start.
    pub fn reseed(&mut self, doors: &[DoorView]) {
        self.rotations.clear();
        for door in doors {
            self.rotations.insert(door.key(), ROTATION_RESET);
        }
    }

    /// Record a door observation. Returns an event when the rotation
    /// changed since the last observation; doors seen for the first time
    /// outside a reseed are registered silently.
    pub fn observe(&mut self, door: &DoorView) -> Option<DoorEvent> {
        let key = door.key();
        let rotation = if door.broken {
            ROTATION_RESET
        } else {
            door.yaw.floor() as i32
        };

        match self.rotations.insert(key.clone(), rotation) {
            None => None,
            Some(previous) if previous == rotation => None,
            Some(_) => Some(DoorEvent { key, rotation }),
        }
    }

    pub fn len(&self) -> usize {
        self.rotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotations.is_empty()
    }
}

impl DoorView {
    pub fn key(&self) -> String {
        door_key(self.origin)
    }
}
