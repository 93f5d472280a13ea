//! Per-engine replication source lifecycle (§4.5): generic start/stop/
//! status bookkeeping shared by every adapter's `ReplicationOperator`, plus
//! two reusable capture-mechanism helpers -- polling-diff (for engines with
//! no native CDC) and trigger-log replay (for trigger-based engines like
//! HANA). Native logical-replication sources (Postgres-style slots and
//! publications) talk to their engine's API directly and don't need a
//! helper here; they still share [`SourceState`]/[`SourceRegistry`].

pub mod lifecycle;
pub mod polling;
pub mod trigger_log;

pub use lifecycle::{make_handle, spawn_poll_loop, SourceRegistry, SourceState};
pub use polling::PollingDiffer;
pub use trigger_log::{changes_since, CdcLogRow};
