//! Pairwise acoustic occlusion sampling
//!
//! For each speaker/listener pair, nine line-of-sight probes fan out over
//! lateral "ear" and "mouth" points so the mixer gets a graduated signal
//! instead of a single blocked/clear bit: a wall that blocks the direct
//! line but leaves a flank open reads as partial occlusion, not silence.

use crate::game::geometry::{lateral_point, Side, Vec3};
use crate::game::world::{RayTrace, Slot, TraceFilter};

/// Lateral displacement of ear/mouth points from the direct line
pub const EAR_OFFSET: f32 = 31.0;

/// Number of probes per pair
pub const PROBE_COUNT: usize = 9;

/// Coarse classification derived from the probe set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcclusionLevel {
    Clear,
    Partial,
    Full,
}

/// Per-probe results for one ordered (speaker, listener) pair
///
/// Probe order is fixed:
/// 0 direct, 1 left-left, 2 right-right, 3 left-direct, 4 right-direct,
/// 5 direct-left, 6 direct-right, 7 left-right, 8 right-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcclusionSample {
    pub blocked: [bool; PROBE_COUNT],
}

impl OcclusionSample {
    pub fn direct_blocked(&self) -> bool {
        self.blocked[0]
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.iter().filter(|b| **b).count()
    }

    pub fn level(&self) -> OcclusionLevel {
        if self.blocked_count() == PROBE_COUNT {
            OcclusionLevel::Full
        } else if self.direct_blocked() {
            OcclusionLevel::Partial
        } else {
            OcclusionLevel::Clear
        }
    }
}

/// Run the nine probes between a speaker and listener reference point.
///
/// `ignore` is the speaker's slot; their own body must never occlude their
/// voice. The filter already excludes other bodies, so only static world
/// geometry registers.
pub fn sample_pair(
    tracer: &dyn RayTrace,
    speaker: Vec3,
    listener: Vec3,
    ignore: Slot,
) -> OcclusionSample {
    let filter = TraceFilter::sound_occlusion(ignore);

    let mouth_left = lateral_point(speaker, listener, EAR_OFFSET, Side::Left);
    let mouth_right = lateral_point(speaker, listener, EAR_OFFSET, Side::Right);
    let ear_left = lateral_point(listener, speaker, EAR_OFFSET, Side::Left);
    let ear_right = lateral_point(listener, speaker, EAR_OFFSET, Side::Right);

    let segments: [(Vec3, Vec3); PROBE_COUNT] = [
        (speaker, listener),
        (mouth_left, ear_left),
        (mouth_right, ear_right),
        (mouth_left, listener),
        (mouth_right, listener),
        (speaker, ear_left),
        (speaker, ear_right),
        (mouth_left, ear_right),
        (mouth_right, ear_left),
    ];

    let mut blocked = [false; PROBE_COUNT];
    for (i, (from, to)) in segments.into_iter().enumerate() {
        blocked[i] = tracer.trace_segment(from, to, &filter).is_some();
    }

    OcclusionSample { blocked }
}
