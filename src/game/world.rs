//! Host-engine collaborator traits
//!
//! Everything the tracker needs from the game engine crosses one of two
//! seams: [`WorldQuery`] for entity/world state and [`RayTrace`] for
//! line-of-sight probes. Production hosts wrap the engine's native APIs;
//! the bundled simulation lobby and the test suites provide their own
//! implementations.

use crate::game::geometry::{Vec3, ViewAngles};

/// Stable numeric identity for a participant (platform account id)
pub type AccountId = u64;

/// Host-side connection slot. Only meaningful within a single session;
/// never used as a persistence key.
pub type Slot = u32;

/// Life state as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeState {
    Alive,
    Dying,
    Dead,
}

/// Observer camera mode for non-alive participants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverMode {
    None,
    /// First-person view through the observed participant's eyes
    InEye,
    /// Third-person chase camera behind the observed participant
    Chase,
    /// Free-flying camera detached from any body
    Roaming,
}

/// What an observing participant's camera is attached to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObservedTarget {
    /// A live participant's body. The host resolves the eye position and
    /// aim angles so the tracker never touches entity handles.
    Participant {
        slot: Slot,
        eye: Vec3,
        aim: ViewAngles,
    },
    /// A planted explosive device
    PlantedDevice { origin: Vec3 },
}

/// Per-participant state sampled by the host for one tick
#[derive(Debug, Clone)]
pub struct ParticipantView {
    pub slot: Slot,
    /// Verified platform identity; `None` until the host has authenticated
    /// the connection (bots never get one)
    pub account_id: Option<AccountId>,
    pub name: String,
    pub team: u8,
    /// False once the host considers the participant disconnected
    pub connected: bool,
    pub life: LifeState,
    /// World time of the most recent death; meaningless while alive
    pub death_time: f64,
    /// Body position, if a body currently exists
    pub body_origin: Option<Vec3>,
    /// Vertical offset from body origin to the eyes
    pub eye_height: f32,
    pub aim: ViewAngles,
    pub observer_mode: ObserverMode,
    pub observed: Option<ObservedTarget>,
    /// Free camera position, present while roaming
    pub free_cam_origin: Option<Vec3>,
}

/// A rotating door as seen by the host this frame
#[derive(Debug, Clone, Copy)]
pub struct DoorView {
    pub origin: Vec3,
    /// Current yaw in degrees
    pub yaw: f32,
    /// Set once the door has been destroyed
    pub broken: bool,
}

/// Interaction-layer bits for trace masks (engine values)
pub mod layers {
    pub const SOLID: u64 = 0x1;
    pub const WINDOW: u64 = 0x1000;
    pub const WORLD_GEOMETRY: u64 = 0x4000;
    pub const PLAYER: u64 = 0x4_0000;
    pub const NPC: u64 = 0x8_0000;
}

/// Filter for a single trace
#[derive(Debug, Clone, Copy)]
pub struct TraceFilter {
    /// Layers the trace collides with
    pub interacts_with: u64,
    /// Layers explicitly passed through even if in `interacts_with`
    pub interacts_exclude: u64,
    /// Participant whose body the trace ignores (the speaker)
    pub ignore: Option<Slot>,
}

impl TraceFilter {
    /// Sound probes collide with static world geometry only; bodies never
    /// occlude audio.
    pub fn sound_occlusion(ignore: Slot) -> Self {
        Self {
            interacts_with: layers::WORLD_GEOMETRY | layers::SOLID | layers::WINDOW,
            interacts_exclude: layers::PLAYER | layers::NPC,
            ignore: Some(ignore),
        }
    }
}

/// First blocking hit along a traced segment
#[derive(Debug, Clone, Copy)]
pub struct TraceHit {
    pub end: Vec3,
    /// Fraction of the segment travelled before the hit, in `[0, 1)`
    pub fraction: f32,
}

/// World/entity state queries answered by the host each frame
pub trait WorldQuery: Send + Sync {
    /// Monotonic world time in seconds
    fn world_time(&self) -> f64;

    fn map_name(&self) -> String;

    /// Increments every round start; drives door-table reseeding
    fn round_serial(&self) -> u64;

    /// All currently known participants, including ones mid-disconnect
    fn participants(&self) -> Vec<ParticipantView>;

    fn doors(&self) -> Vec<DoorView>;

    /// Whether the account holds the given permission flag or group
    fn has_permission(&self, account: AccountId, flag: &str) -> bool;
}

/// Segment trace against world geometry
pub trait RayTrace: Send + Sync {
    /// Trace from `from` to `to`, returning the first blocking hit or
    /// `None` when the segment is clear.
    fn trace_segment(&self, from: Vec3, to: Vec3, filter: &TraceFilter) -> Option<TraceHit>;
}
