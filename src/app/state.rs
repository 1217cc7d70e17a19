//! Application state shared across tasks

use std::sync::Arc;

use crate::config::Config;
use crate::game::snapshot::SnapshotStore;
use crate::settings::SettingsHandle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub settings: SettingsHandle,
    pub store: Arc<SnapshotStore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Replicated settings start at their local defaults until the mixer
        // pushes a replica.
        let settings = SettingsHandle::default();

        let store = Arc::new(SnapshotStore::new());

        Self {
            config,
            settings,
            store,
        }
    }
}
