//! MEDIC Graph - Dependency Tracker
//!
//! The agent dependency graph as an immutable arena snapshot plus a tracker
//! that swaps snapshots on mutation. Cycle detection, deployment ordering and
//! impact analysis are pure functions of a snapshot.

mod snapshot;
mod tracker;

pub use snapshot::{
    Cycle, GraphProjection, GraphSnapshot, ImpactReport, NodeId, TopologicalOrder,
    MAX_REPORTED_CYCLES,
};
pub use tracker::DependencyTracker;
