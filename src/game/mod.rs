//! Tracking domain: world seams, viewpoint resolution, occlusion, state

pub mod doors;
pub mod geometry;
pub mod occlusion;
pub mod snapshot;
pub mod tick;
pub mod viewpoint;
pub mod world;

pub use snapshot::SnapshotStore;
pub use tick::TickOrchestrator;
pub use world::{RayTrace, WorldQuery};
