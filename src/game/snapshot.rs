//! Authoritative snapshot store
//!
//! One entry per tracked identity, written only by the tick loop and read
//! concurrently by the sync session's broadcast task. Updates replace whole
//! entries, so a reader sees either the previous or the current tick's
//! state for a participant, never a mix.

use dashmap::DashMap;

use crate::game::occlusion::OcclusionSample;
use crate::game::viewpoint::ResolvedPose;
use crate::game::world::AccountId;
use crate::sync::protocol::ParticipantSnapshot;

pub struct SnapshotStore {
    participants: DashMap<AccountId, ParticipantSnapshot>,
    /// Latest per-pair occlusion, keyed (speaker, listener). Both sides of
    /// a pair are always sampled from the same tick's resolved poses.
    occlusion: DashMap<(AccountId, AccountId), OcclusionSample>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            participants: DashMap::new(),
            occlusion: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Write this tick's resolved state for an identity. The cached admin
    /// flag survives the rewrite; everything else is last-write-wins.
    pub fn record(
        &self,
        account_id: AccountId,
        name: &str,
        pose: &ResolvedPose,
        team: u8,
        alive: bool,
    ) {
        let admin = self
            .participants
            .get(&account_id)
            .and_then(|entry| entry.admin);

        let mut snapshot = ParticipantSnapshot::from_points(
            account_id,
            name,
            pose.origin,
            pose.look_at,
            team,
            alive,
            pose.spectating_device,
        );
        snapshot.admin = admin;

        self.participants.insert(account_id, snapshot);
    }

    /// Whether the identity is tracked but still awaiting permission
    /// resolution
    pub fn admin_unresolved(&self, account_id: AccountId) -> bool {
        self.participants
            .get(&account_id)
            .map(|entry| entry.admin.is_none())
            .unwrap_or(false)
    }

    pub fn set_admin(&self, account_id: AccountId, admin: bool) {
        if let Some(mut entry) = self.participants.get_mut(&account_id) {
            entry.admin = Some(admin);
        }
    }

    /// Drop an identity that has fully disconnected, along with any
    /// occlusion samples it appears in.
    pub fn remove(&self, account_id: AccountId) {
        self.participants.remove(&account_id);
        self.occlusion
            .retain(|(a, b), _| *a != account_id && *b != account_id);
    }

    /// Map transitions degrade everyone to non-positional audio without
    /// dropping them: identities usually survive the change.
    pub fn mark_map_transition(&self) {
        for mut entry in self.participants.iter_mut() {
            entry.alive = false;
            entry.team = 0;
        }
    }

    /// Clone of the current batch for broadcast
    pub fn batch(&self) -> Vec<ParticipantSnapshot> {
        self.participants
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn get(&self, account_id: AccountId) -> Option<ParticipantSnapshot> {
        self.participants
            .get(&account_id)
            .map(|entry| entry.value().clone())
    }

    pub fn record_occlusion(
        &self,
        speaker: AccountId,
        listener: AccountId,
        sample: OcclusionSample,
    ) {
        self.occlusion.insert((speaker, listener), sample);
    }

    pub fn occlusion_between(
        &self,
        speaker: AccountId,
        listener: AccountId,
    ) -> Option<OcclusionSample> {
        self.occlusion
            .get(&(speaker, listener))
            .map(|entry| *entry.value())
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
