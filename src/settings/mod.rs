//! Replicated mixer settings
//!
//! The mixing service and this tracker share one flat set of tunables.
//! Whichever side changes them pushes a full replica to the other, which
//! overwrites its local values unconditionally (last writer wins, no merge,
//! no range validation). Field order is the wire schema: `MixerSettings`
//! serializes positionally, so fields must never be reordered.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tunables replicated between tracker and mixer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerSettings {
    /// Seconds before a dead participant's voice is muted
    pub dead_player_mute_delay: f32,
    /// Whether dead teammates can hear each other
    pub allow_dead_team_voice: bool,
    /// Whether spectators of a planted device can talk
    pub allow_spectator_device_voice: bool,
    /// Occlusion filter cutoff when the listener is closest to the source
    pub occlusion_near: f32,
    /// Occlusion filter cutoff at `occlusion_end_dist` and beyond
    pub occlusion_far: f32,
    /// Distance at which occlusion fully reaches `occlusion_far`
    pub occlusion_end_dist: f32,
    /// Exponent shaping the occlusion falloff curve (1 = linear)
    pub occlusion_falloff_factor: f32,
    /// How quickly voices attenuate with distance
    pub volume_falloff_factor: f32,
    /// Maximum distance at which a voice is audible
    pub volume_max_distance: f32,
    /// Participants in view stay audible regardless of distance
    pub always_hear_visible_players: bool,
    /// High-pass filter frequency for dead voices (0 = disabled)
    pub dead_voice_filter_frequency: i32,
    /// Whether spectators may talk to alive participants
    pub spectators_can_talk: bool,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            dead_player_mute_delay: 1.0,
            allow_dead_team_voice: true,
            allow_spectator_device_voice: true,
            occlusion_near: 300.0,
            occlusion_far: 25.0,
            occlusion_end_dist: 2000.0,
            occlusion_falloff_factor: 3.0,
            volume_falloff_factor: 0.5,
            volume_max_distance: 2000.0,
            always_hear_visible_players: true,
            dead_voice_filter_frequency: 750,
            spectators_can_talk: false,
        }
    }
}

/// A single replicated setting value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Float(f32),
    Int(i32),
}

/// Compile-time accessor pair for one replicated field
pub struct SettingDescriptor {
    pub name: &'static str,
    pub get: fn(&MixerSettings) -> SettingValue,
    pub set: fn(&mut MixerSettings, SettingValue),
}

macro_rules! descriptor {
    ($name:ident, $variant:ident) => {
        SettingDescriptor {
            name: stringify!($name),
            get: |s| SettingValue::$variant(s.$name),
            set: |s, v| {
                if let SettingValue::$variant(v) = v {
                    s.$name = v;
                }
            },
        }
    };
}

/// Every field the remote side may overwrite. Inbound replicas are applied
/// through this table, so fields absent here can never be touched remotely.
pub const REPLICATED: &[SettingDescriptor] = &[
    descriptor!(dead_player_mute_delay, Float),
    descriptor!(allow_dead_team_voice, Bool),
    descriptor!(allow_spectator_device_voice, Bool),
    descriptor!(occlusion_near, Float),
    descriptor!(occlusion_far, Float),
    descriptor!(occlusion_end_dist, Float),
    descriptor!(occlusion_falloff_factor, Float),
    descriptor!(volume_falloff_factor, Float),
    descriptor!(volume_max_distance, Float),
    descriptor!(always_hear_visible_players, Bool),
    descriptor!(dead_voice_filter_frequency, Int),
    descriptor!(spectators_can_talk, Bool),
];

/// Shared handle to the live settings, safe to read from the tick loop
/// while the sync session applies inbound replicas.
#[derive(Clone)]
pub struct SettingsHandle {
    inner: Arc<RwLock<MixerSettings>>,
}

impl SettingsHandle {
    pub fn new(initial: MixerSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// Consistent copy of the full settings group
    pub fn snapshot(&self) -> MixerSettings {
        self.inner.read().clone()
    }

    /// Overwrite the whitelisted fields from a remote replica. All fields
    /// change under one write lock, so readers never observe a half-applied
    /// push.
    pub fn apply_remote(&self, incoming: &MixerSettings) {
        let mut local = self.inner.write();
        let mut changed = 0usize;
        for d in REPLICATED {
            let value = (d.get)(incoming);
            if (d.get)(&local) != value {
                (d.set)(&mut local, value);
                debug!(setting = d.name, "replicated setting updated");
                changed += 1;
            }
        }
        if changed > 0 {
            debug!(changed, "applied remote settings replica");
        }
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(MixerSettings::default())
    }
}
