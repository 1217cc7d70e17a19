//! Wire protocol for the mixer link
//!
//! Every frame is a MessagePack-encoded [`Frame`], externally tagged by its
//! kebab-case event name so the mixer can route on the tag without decoding
//! the payload. Struct payloads serialize positionally; field order is the
//! schema and must never change.

use serde::{Deserialize, Serialize};

use crate::game::geometry::Vec3;
use crate::game::world::AccountId;
use crate::settings::MixerSettings;

/// Fixed-point scale applied to coordinates on the wire
pub const POSITION_SCALE: f32 = 10_000.0;

/// Scale a world coordinate to its wire representation
pub fn scale_coord(v: f32) -> i32 {
    (v * POSITION_SCALE) as i32
}

/// Recover a world coordinate from its wire representation
pub fn unscale_coord(v: i32) -> f32 {
    v as f32 / POSITION_SCALE
}

/// One participant's streamed state
///
/// Schema order: identity, name, origin, look-at, team, alive,
/// spectating-device, admin tri-state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    pub account_id: AccountId,
    pub name: String,
    pub origin_x: i32,
    pub origin_y: i32,
    pub origin_z: i32,
    pub look_at_x: i32,
    pub look_at_y: i32,
    pub look_at_z: i32,
    pub team: u8,
    pub alive: bool,
    pub spectating_device: bool,
    /// `None` until permission resolution has run for this identity
    pub admin: Option<bool>,
}

impl ParticipantSnapshot {
    /// Build a snapshot from resolved world-space points
    pub fn from_points(
        account_id: AccountId,
        name: &str,
        origin: Vec3,
        look_at: Vec3,
        team: u8,
        alive: bool,
        spectating_device: bool,
    ) -> Self {
        Self {
            account_id,
            name: name.to_string(),
            origin_x: scale_coord(origin.x),
            origin_y: scale_coord(origin.y),
            origin_z: scale_coord(origin.z),
            look_at_x: scale_coord(look_at.x),
            look_at_y: scale_coord(look_at.y),
            look_at_z: scale_coord(look_at.z),
            team,
            alive,
            spectating_device,
            admin: None,
        }
    }

    /// World-space origin, descaled
    pub fn origin(&self) -> Vec3 {
        Vec3::new(
            unscale_coord(self.origin_x),
            unscale_coord(self.origin_y),
            unscale_coord(self.origin_z),
        )
    }

    /// World-space look-at point, descaled
    pub fn look_at(&self) -> Vec3 {
        Vec3::new(
            unscale_coord(self.look_at_x),
            unscale_coord(self.look_at_y),
            unscale_coord(self.look_at_z),
        )
    }
}

/// All messages crossing the mixer link, in either direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frame {
    /// Outbound: full batch of current snapshots
    PlayerPositions(Vec<ParticipantSnapshot>),
    /// Outbound: current map identifier
    CurrentMap(String),
    /// Both directions: full settings replica
    ServerConfig(MixerSettings),
    /// Outbound: a door's yaw changed; rotation 999 means reset/unknown
    DoorRotation { key: String, rotation: i32 },
    /// Inbound: the mixer service restarts in this many minutes
    ServerRestartWarning { minutes: f32 },
    /// Inbound: fatal application error; reconnection must stop
    Exception { code: i32, message: Option<String> },
}

/// Protocol encode/decode failures
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode frame: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Encode a frame for transmission
pub fn encode(frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
    Ok(rmp_serde::to_vec(frame)?)
}

/// Decode a received frame
pub fn decode(bytes: &[u8]) -> Result<Frame, ProtocolError> {
    Ok(rmp_serde::from_slice(bytes)?)
}
