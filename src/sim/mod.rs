//! Synthetic lobby
//!
//! A self-contained host implementation used by the binary for soak-testing
//! the mixer link without a game server: a handful of bots wander an open
//! field on a deterministic seed. Production deployments replace this with
//! adapters over the engine's query and trace APIs.

use std::f32::consts::TAU;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::game::geometry::{forward, Vec3, ViewAngles};
use crate::game::world::{
    AccountId, DoorView, LifeState, ObserverMode, ParticipantView, RayTrace, TraceFilter,
    TraceHit, WorldQuery,
};

const WANDER_SPEED: f32 = 250.0;
const SPAWN_RADIUS: f32 = 800.0;
const EYE_HEIGHT: f32 = 64.0;

struct SimBot {
    slot: u32,
    name: String,
    team: u8,
    origin: Vec3,
    yaw: f32,
}

struct SimState {
    time: f64,
    bots: Vec<SimBot>,
    rng: ChaCha8Rng,
}

/// Deterministic open-field lobby of wandering bots
pub struct SimLobby {
    state: Mutex<SimState>,
}

impl SimLobby {
    pub fn new(bot_count: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let bots = (0..bot_count)
            .map(|i| {
                let angle = rng.gen_range(0.0..TAU);
                let distance = rng.gen_range(100.0..SPAWN_RADIUS);
                SimBot {
                    slot: i as u32,
                    name: format!("Bot {:02}", i + 1),
                    team: if i % 2 == 0 { 2 } else { 3 },
                    origin: Vec3::new(angle.cos() * distance, angle.sin() * distance, 0.0),
                    yaw: rng.gen_range(0.0..360.0),
                }
            })
            .collect();

        Self {
            state: Mutex::new(SimState {
                time: 0.0,
                bots,
                rng,
            }),
        }
    }

    /// Advance the simulation by one frame: bots drift forward with a
    /// little random steering.
    pub fn advance(&self, dt: f64) {
        let mut state = self.state.lock();
        state.time += dt;

        // Split the borrow so the shared rng can steer each bot.
        let SimState { bots, rng, .. } = &mut *state;
        for bot in bots {
            bot.yaw = (bot.yaw + rng.gen_range(-4.0..4.0)).rem_euclid(360.0);
            let dir = forward(ViewAngles::new(0.0, bot.yaw));
            bot.origin = bot.origin + dir * (WANDER_SPEED * dt as f32);
        }
    }
}

impl WorldQuery for SimLobby {
    fn world_time(&self) -> f64 {
        self.state.lock().time
    }

    fn map_name(&self) -> String {
        "sim_open_field".to_string()
    }

    fn round_serial(&self) -> u64 {
        1
    }

    fn participants(&self) -> Vec<ParticipantView> {
        self.state
            .lock()
            .bots
            .iter()
            .map(|bot| ParticipantView {
                slot: bot.slot,
                // Bots are unverified; the tracker's fake-participant mode
                // assigns them synthetic identities.
                account_id: None,
                name: bot.name.clone(),
                team: bot.team,
                connected: true,
                life: LifeState::Alive,
                death_time: 0.0,
                body_origin: Some(bot.origin),
                eye_height: EYE_HEIGHT,
                aim: ViewAngles::new(0.0, bot.yaw),
                observer_mode: ObserverMode::None,
                observed: None,
                free_cam_origin: None,
            })
            .collect()
    }

    fn doors(&self) -> Vec<DoorView> {
        Vec::new()
    }

    fn has_permission(&self, _account: AccountId, _flag: &str) -> bool {
        false
    }
}

impl RayTrace for SimLobby {
    /// The open field has no geometry; every probe is clear.
    fn trace_segment(&self, _from: Vec3, _to: Vec3, _filter: &TraceFilter) -> Option<TraceHit> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_produces_same_lobby() {
        let a = SimLobby::new(4, 42);
        let b = SimLobby::new(4, 42);

        a.advance(0.1);
        b.advance(0.1);

        let va = a.participants();
        let vb = b.participants();
        assert_eq!(va.len(), 4);
        for (x, y) in va.iter().zip(&vb) {
            assert_eq!(x.body_origin.unwrap(), y.body_origin.unwrap());
            assert_eq!(x.aim, y.aim);
        }
    }

    #[test]
    fn bots_move_over_time() {
        let lobby = SimLobby::new(2, 7);
        let before = lobby.participants();
        for _ in 0..10 {
            lobby.advance(0.1);
        }
        let after = lobby.participants();

        assert!(lobby.world_time() > 0.9);
        assert_ne!(
            before[0].body_origin.unwrap(),
            after[0].body_origin.unwrap()
        );
    }
}
