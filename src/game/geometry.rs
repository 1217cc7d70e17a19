//! Vector math for eye rays and lateral sound points
//!
//! Coordinates are engine units, Z up. Angles are degrees in the engine's
//! convention: yaw rotates in the X-Y plane (0 = +X), positive pitch aims
//! downward.

use std::ops::{Add, Mul, Sub};

/// A point or direction in world space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// View angles in degrees (roll is irrelevant to aim rays)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewAngles {
    pub pitch: f32,
    pub yaw: f32,
}

impl ViewAngles {
    pub fn new(pitch: f32, yaw: f32) -> Self {
        Self { pitch, yaw }
    }
}

/// Which side of the speaker-listener line a lateral point falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Unit forward vector for a set of view angles
pub fn forward(angles: ViewAngles) -> Vec3 {
    let (sp, cp) = angles.pitch.to_radians().sin_cos();
    let (sy, cy) = angles.yaw.to_radians().sin_cos();
    Vec3::new(cp * cy, cp * sy, -sp)
}

/// Project `origin` along the aim direction by `distance` units
pub fn project(origin: Vec3, angles: ViewAngles, distance: f32) -> Vec3 {
    origin + forward(angles) * distance
}

/// Euclidean distance between two points
pub fn distance(a: Vec3, b: Vec3) -> f32 {
    let d = a - b;
    (d.x * d.x + d.y * d.y + d.z * d.z).sqrt()
}

/// A point displaced `offset` units from `a`, perpendicular to the a-b line
/// in the horizontal plane. Height is kept from `a`. Degenerate pairs
/// (coincident in the horizontal plane) return `a` unchanged.
pub fn lateral_point(a: Vec3, b: Vec3, offset: f32, side: Side) -> Vec3 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;

    let n = (dx * dx + dy * dy).sqrt();
    if n == 0.0 {
        return a;
    }

    let mn = offset / n;
    match side {
        Side::Left => Vec3::new(a.x + mn * dy, a.y - mn * dx, a.z),
        Side::Right => Vec3::new(a.x - mn * dy, a.y + mn * dx, a.z),
    }
}
