//! Viewpoint resolution
//!
//! Maps a participant's life/observer state to the (origin, look-at) pair
//! the mixer positions their ears and voice at. Branches are evaluated in
//! strict priority order; the first one that produces a pose wins, and a
//! participant no branch can resolve is skipped for the tick so their
//! previous snapshot stays put.

use crate::game::geometry::{forward, project, Vec3, ViewAngles};
use crate::game::world::{LifeState, ObservedTarget, ObserverMode, ParticipantView};

/// How far the look-at point is projected along the aim ray
pub const AIM_RAY_LENGTH: f32 = 8192.0;

/// Seconds a dead participant keeps their body pose before the camera
/// snaps to whatever they are spectating
pub const DEATH_POSE_HOLD_SECS: f64 = 3.0;

/// Third-person camera distance behind a chased target's eyes
pub const CHASE_CAM_DISTANCE: f32 = 150.0;

/// Camera distance behind a planted device
pub const DEVICE_CAM_DISTANCE: f32 = 100.0;

/// Minimum height of the device camera above the device itself
pub const DEVICE_CAM_MIN_RISE: f32 = 25.0;

/// A resolved viewpoint for one participant, one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPose {
    pub origin: Vec3,
    pub look_at: Vec3,
    pub spectating_device: bool,
}

/// Resolve a participant's viewpoint, or `None` when no pose can be
/// produced this tick.
pub fn resolve(view: &ParticipantView, now: f64) -> Option<ResolvedPose> {
    let alive = view.life == LifeState::Alive;

    // Alive, or dead within the hold window: the body pose stands so the
    // voice doesn't teleport the instant someone dies.
    if alive || now - view.death_time < DEATH_POSE_HOLD_SECS {
        return body_pose(view);
    }

    if view.observer_mode == ObserverMode::Roaming {
        if let Some(origin) = view.free_cam_origin {
            return Some(ResolvedPose {
                origin,
                look_at: project(origin, view.aim, AIM_RAY_LENGTH),
                spectating_device: false,
            });
        }
    }

    if view.observer_mode == ObserverMode::Chase {
        if let Some(ObservedTarget::Participant { eye, .. }) = view.observed {
            // Camera hangs behind the target along the observer's own aim
            // and looks at what it is chasing.
            let origin = pull_back(eye, view.aim, CHASE_CAM_DISTANCE);
            return Some(ResolvedPose {
                origin,
                look_at: eye,
                spectating_device: false,
            });
        }
    }

    if let Some(ObservedTarget::PlantedDevice { origin: device }) = view.observed {
        let mut origin = pull_back(device, view.aim, DEVICE_CAM_DISTANCE);
        // Keep the camera from dipping under the floor the device sits on.
        let floor = device.z + DEVICE_CAM_MIN_RISE;
        if origin.z < floor {
            origin.z = floor;
        }
        return Some(ResolvedPose {
            origin,
            look_at: device,
            spectating_device: true,
        });
    }

    // Fallback: alive-style computation on whatever body is available,
    // preferring the observed one (covers in-eye spectating).
    if let Some(ObservedTarget::Participant { eye, aim, .. }) = view.observed {
        return Some(ResolvedPose {
            origin: eye,
            look_at: project(eye, aim, AIM_RAY_LENGTH),
            spectating_device: false,
        });
    }

    body_pose(view)
}

/// Eye position plus aim-ray projection from the participant's own body
fn body_pose(view: &ParticipantView) -> Option<ResolvedPose> {
    let body = view.body_origin?;
    let eye = Vec3::new(body.x, body.y, body.z + view.eye_height);
    Some(ResolvedPose {
        origin: eye,
        look_at: project(eye, view.aim, AIM_RAY_LENGTH),
        spectating_device: false,
    })
}

fn pull_back(anchor: Vec3, aim: ViewAngles, distance: f32) -> Vec3 {
    anchor - forward(aim) * distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::Slot;

    const EPS: f32 = 0.05;

    fn assert_close(a: Vec3, b: Vec3) {
        assert!(
            (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS && (a.z - b.z).abs() < EPS,
            "{a:?} != {b:?}"
        );
    }

    fn base_view() -> ParticipantView {
        ParticipantView {
            slot: 3,
            account_id: Some(76_561_198_000_000_042),
            name: "subject".into(),
            team: 2,
            connected: true,
            life: LifeState::Alive,
            death_time: 0.0,
            body_origin: Some(Vec3::new(100.0, 200.0, 0.0)),
            eye_height: 64.0,
            aim: ViewAngles::new(0.0, 0.0),
            observer_mode: ObserverMode::None,
            observed: None,
            free_cam_origin: None,
        }
    }

    fn observed_participant(slot: Slot, eye: Vec3, aim: ViewAngles) -> ObservedTarget {
        ObservedTarget::Participant { slot, eye, aim }
    }

    #[test]
    fn alive_look_at_is_aim_ray_projection() {
        // Cardinal axes and the 45-degree diagonals.
        let cases = [
            (0.0f32, 0.0f32),
            (0.0, 90.0),
            (0.0, 180.0),
            (0.0, 270.0),
            (0.0, 45.0),
            (45.0, 45.0),
            (-45.0, 225.0),
        ];

        for (pitch, yaw) in cases {
            let mut view = base_view();
            view.aim = ViewAngles::new(pitch, yaw);

            let pose = resolve(&view, 10.0).unwrap();
            let eye = Vec3::new(100.0, 200.0, 64.0);
            assert_close(pose.origin, eye);
            assert_close(pose.look_at, eye + forward(view.aim) * AIM_RAY_LENGTH);
            assert!(!pose.spectating_device);
        }
    }

    #[test]
    fn recently_dead_keeps_body_pose() {
        let mut view = base_view();
        view.life = LifeState::Dead;
        view.death_time = 100.0;
        view.observer_mode = ObserverMode::Chase;
        view.observed = Some(observed_participant(
            7,
            Vec3::new(900.0, 900.0, 64.0),
            ViewAngles::default(),
        ));

        // 2.9s after death: still the body pose, not the chase camera.
        let pose = resolve(&view, 102.9).unwrap();
        assert_close(pose.origin, Vec3::new(100.0, 200.0, 64.0));
    }

    #[test]
    fn dying_counts_as_dead_for_the_hold_window() {
        let mut view = base_view();
        view.life = LifeState::Dying;
        view.death_time = 100.0;

        // Inside the window the body pose holds even mid-death.
        let pose = resolve(&view, 101.0).unwrap();
        assert_close(pose.origin, Vec3::new(100.0, 200.0, 64.0));

        // Past it, with no observer state and no body, nothing resolves.
        view.body_origin = None;
        assert!(resolve(&view, 110.0).is_none());
    }

    #[test]
    fn free_roam_uses_camera_position() {
        let mut view = base_view();
        view.life = LifeState::Dead;
        view.death_time = 100.0;
        view.body_origin = None;
        view.observer_mode = ObserverMode::Roaming;
        view.free_cam_origin = Some(Vec3::new(-50.0, 75.0, 300.0));
        view.aim = ViewAngles::new(0.0, 90.0);

        let pose = resolve(&view, 110.0).unwrap();
        assert_close(pose.origin, Vec3::new(-50.0, 75.0, 300.0));
        assert_close(
            pose.look_at,
            Vec3::new(-50.0, 75.0 + AIM_RAY_LENGTH, 300.0),
        );
    }

    #[test]
    fn chase_cam_hangs_behind_target_along_observer_aim() {
        let mut view = base_view();
        view.life = LifeState::Dead;
        view.death_time = 100.0;
        // Non-axis-aligned aim: 30 degrees down, 45 degrees yaw.
        view.aim = ViewAngles::new(30.0, 45.0);
        view.observer_mode = ObserverMode::Chase;
        let target_eye = Vec3::new(500.0, -200.0, 96.0);
        view.observed = Some(observed_participant(9, target_eye, ViewAngles::default()));

        let pose = resolve(&view, 110.0).unwrap();

        assert_close(pose.look_at, target_eye);
        let expected = target_eye - forward(view.aim) * CHASE_CAM_DISTANCE;
        assert_close(pose.origin, expected);
        // Offset magnitude is exactly the chase distance.
        let d = pose.origin - target_eye;
        let len = (d.x * d.x + d.y * d.y + d.z * d.z).sqrt();
        assert!((len - CHASE_CAM_DISTANCE).abs() < EPS);
    }

    #[test]
    fn device_cam_clamps_height_above_device() {
        let mut view = base_view();
        view.life = LifeState::Dead;
        view.death_time = 100.0;
        // Aiming straight up drags the camera 100 units below the device;
        // the floor clamp must catch it.
        view.aim = ViewAngles::new(-90.0, 0.0);
        let device = Vec3::new(250.0, 250.0, 10.0);
        view.observed = Some(ObservedTarget::PlantedDevice { origin: device });

        let pose = resolve(&view, 110.0).unwrap();

        assert!(pose.spectating_device);
        assert_close(pose.look_at, device);
        assert!(pose.origin.z >= device.z + DEVICE_CAM_MIN_RISE - EPS);
        assert_close(
            pose.origin,
            Vec3::new(250.0, 250.0, device.z + DEVICE_CAM_MIN_RISE),
        );
    }

    #[test]
    fn device_cam_unclamped_when_above_floor() {
        let mut view = base_view();
        view.life = LifeState::Dead;
        view.death_time = 100.0;
        view.aim = ViewAngles::new(90.0, 0.0); // straight down at the device
        let device = Vec3::new(250.0, 250.0, 10.0);
        view.observed = Some(ObservedTarget::PlantedDevice { origin: device });

        let pose = resolve(&view, 110.0).unwrap();
        assert_close(pose.origin, Vec3::new(250.0, 250.0, 110.0));
    }

    #[test]
    fn in_eye_spectating_falls_back_to_observed_body() {
        let mut view = base_view();
        view.life = LifeState::Dead;
        view.death_time = 100.0;
        view.body_origin = None;
        view.observer_mode = ObserverMode::InEye;
        let target_eye = Vec3::new(40.0, 40.0, 64.0);
        let target_aim = ViewAngles::new(0.0, 180.0);
        view.observed = Some(observed_participant(5, target_eye, target_aim));

        let pose = resolve(&view, 110.0).unwrap();
        assert_close(pose.origin, target_eye);
        assert_close(pose.look_at, project(target_eye, target_aim, AIM_RAY_LENGTH));
    }

    #[test]
    fn unresolvable_participant_is_skipped() {
        let mut view = base_view();
        view.life = LifeState::Dead;
        view.death_time = 100.0;
        view.body_origin = None;
        view.observer_mode = ObserverMode::None;

        assert!(resolve(&view, 110.0).is_none());
    }
}
