//! Per-frame orchestration
//!
//! Driven once per host frame. Door transitions are checked every frame;
//! the expensive resolve + occlusion pass runs at a fixed sub-rate using a
//! next-eligible-time watermark so variable frame rates don't skew the
//! cadence.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::game::doors::DoorTable;
use crate::game::occlusion;
use crate::game::snapshot::SnapshotStore;
use crate::game::viewpoint::{self, ResolvedPose};
use crate::game::world::{AccountId, LifeState, ParticipantView, RayTrace, Slot, WorldQuery};
use crate::sync::session::SessionHandle;
use crate::util::time::RESOLVE_INTERVAL_SECS;

/// Base for synthetic identities handed to unverified participants in
/// fake-participant mode
pub const SYNTHETIC_ID_BASE: AccountId = 10_000_000_000_000_000;

pub struct TickOrchestrator {
    world: Arc<dyn WorldQuery>,
    tracer: Arc<dyn RayTrace>,
    store: Arc<SnapshotStore>,
    session: SessionHandle,
    doors: DoorTable,
    /// Unverified participants get persisted under synthetic identities
    /// when set; otherwise they are not written at all.
    fake_participants: bool,
    admin_flags: Vec<String>,
    next_resolve_at: f64,
    last_map: String,
    last_round: u64,
    synthetic_ids: HashMap<Slot, AccountId>,
    next_synthetic: u64,
}

impl TickOrchestrator {
    pub fn new(
        world: Arc<dyn WorldQuery>,
        tracer: Arc<dyn RayTrace>,
        store: Arc<SnapshotStore>,
        session: SessionHandle,
        fake_participants: bool,
        admin_flags: Vec<String>,
    ) -> Self {
        let last_map = world.map_name();
        let last_round = world.round_serial();
        let mut doors = DoorTable::new();
        doors.reseed(&world.doors());

        Self {
            world,
            tracer,
            store,
            session,
            doors,
            fake_participants,
            admin_flags,
            next_resolve_at: 0.0,
            last_map,
            last_round,
            synthetic_ids: HashMap::new(),
            next_synthetic: 0,
        }
    }

    /// One host frame. Never blocks; all network work happens on the sync
    /// session's tasks.
    pub fn on_frame(&mut self) {
        let now = self.world.world_time();

        self.check_map_transition();
        self.check_round_transition();
        self.scan_doors();

        if now < self.next_resolve_at {
            return;
        }
        self.next_resolve_at = now + RESOLVE_INTERVAL_SECS;

        self.resolve_participants(now);
    }

    fn check_map_transition(&mut self) {
        let map = self.world.map_name();
        if map == self.last_map {
            return;
        }

        info!(from = %self.last_map, to = %map, "map transition");
        // Everyone degrades to non-positional audio until they respawn on
        // the new map; identities stay tracked across the change.
        self.store.mark_map_transition();
        self.session.notify_map_change(&map);
        self.session.notify_settings_push();
        self.last_map = map;
    }

    fn check_round_transition(&mut self) {
        let round = self.world.round_serial();
        if round == self.last_round {
            return;
        }

        debug!(round, "round start; reseeding door table");
        self.doors.reseed(&self.world.doors());
        self.last_round = round;
    }

    fn scan_doors(&mut self) {
        for door in self.world.doors() {
            if let Some(event) = self.doors.observe(&door) {
                self.session
                    .notify_door_rotation(event.key, event.rotation);
            }
        }
    }

    /// Resolve every participant, refresh the store, update pairwise
    /// occlusion, and drop identities that have fully disconnected.
    fn resolve_participants(&mut self, now: f64) {
        let views = self.world.participants();
        let mut resolved: Vec<(AccountId, Slot, ResolvedPose)> = Vec::with_capacity(views.len());

        for view in &views {
            if !view.connected {
                if let Some(id) = self.identity_for(view) {
                    self.store.remove(id);
                }
                continue;
            }

            let Some(id) = self.identity_for(view) else {
                // Unverified and not in fake-participant mode.
                continue;
            };

            // Transient resolution failures skip the participant for this
            // tick; their previous snapshot stays live.
            let Some(pose) = viewpoint::resolve(view, now) else {
                continue;
            };

            let alive = view.life == LifeState::Alive;
            self.store.record(id, &view.name, &pose, view.team, alive);
            self.resolve_admin(id, view);

            resolved.push((id, view.slot, pose));
        }

        // Pairwise occlusion over this tick's poses only: both sides of a
        // pair always come from the same resolve pass.
        for (speaker_id, speaker_slot, speaker_pose) in &resolved {
            for (listener_id, _, listener_pose) in &resolved {
                if listener_id == speaker_id {
                    continue;
                }
                let sample = occlusion::sample_pair(
                    self.tracer.as_ref(),
                    speaker_pose.origin,
                    listener_pose.origin,
                    *speaker_slot,
                );
                self.store
                    .record_occlusion(*speaker_id, *listener_id, sample);
            }
        }
    }

    /// The persistence identity for a view: the verified account id, or a
    /// deterministic synthetic one in fake-participant mode.
    fn identity_for(&mut self, view: &ParticipantView) -> Option<AccountId> {
        if let Some(id) = view.account_id {
            return Some(id);
        }
        if !self.fake_participants {
            return None;
        }
        Some(match self.synthetic_ids.get(&view.slot) {
            Some(id) => *id,
            None => {
                self.next_synthetic += 1;
                let id = SYNTHETIC_ID_BASE + self.next_synthetic;
                self.synthetic_ids.insert(view.slot, id);
                id
            }
        })
    }

    /// Admin status is resolved once per identity and cached; permission
    /// changes mid-session are not picked up.
    fn resolve_admin(&self, id: AccountId, view: &ParticipantView) {
        if view.account_id.is_none() || !self.store.admin_unresolved(id) {
            return;
        }
        let admin = self
            .admin_flags
            .iter()
            .any(|flag| self.world.has_permission(id, flag));
        self.store.set_admin(id, admin);
    }
}
