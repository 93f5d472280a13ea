use crate::config::{StreamPage, StreamParams};
use async_trait::async_trait;
use capability::Capability;
use db_errors::{CdcError, DatabaseError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use usm::{Table, UnifiedSchema};

pub type Row = BTreeMap<String, serde_json::Value>;

/// Discovers, creates, and introspects engine schema structure (§4.3
/// SchemaOperator).
#[async_trait]
pub trait SchemaOperator: Send + Sync {
    /// Visits the engine's system catalogs and populates the relevant USM
    /// categories. Partial per-object failures are recorded as warnings in
    /// the adapter's own logging and discovery continues; only a
    /// catastrophic introspection failure returns `Err`.
    async fn discover_schema(&self, ctx: CancellationToken) -> Result<UnifiedSchema, DatabaseError>;

    /// Idempotent where the engine allows it; otherwise returns
    /// `AlreadyExists`. Implementations create objects in dependency order
    /// (types -> sequences -> tables/collections -> indexes -> constraints
    /// (FKs last) -> views -> triggers -> functions) and silently skip
    /// categories the engine has no analogue for.
    async fn create_structure(&self, ctx: CancellationToken, schema: &UnifiedSchema) -> Result<(), DatabaseError>;

    async fn list_tables(&self, ctx: CancellationToken) -> Result<Vec<String>, DatabaseError>;
    async fn get_table_schema(&self, ctx: CancellationToken, name: &str) -> Result<Table, DatabaseError>;
}

/// Reads and writes engine data in a tabular projection (§4.3 DataOperator).
#[async_trait]
pub trait DataOperator: Send + Sync {
    async fn fetch(&self, ctx: CancellationToken, target: &str, limit: u32) -> Result<Vec<Row>, DatabaseError>;

    async fn fetch_with_columns(
        &self,
        ctx: CancellationToken,
        target: &str,
        columns: &[String],
        limit: u32,
    ) -> Result<Vec<Row>, DatabaseError>;

    /// Column set is taken from the first row; missing values in later rows
    /// are treated as NULL.
    async fn insert(&self, ctx: CancellationToken, target: &str, rows: &[Row]) -> Result<u64, DatabaseError>;

    /// `where_cols` form the match predicate; remaining columns form the
    /// SET list. A NULL match uses `IS NULL`.
    async fn update(
        &self,
        ctx: CancellationToken,
        target: &str,
        rows: &[Row],
        where_cols: &[String],
    ) -> Result<u64, DatabaseError>;

    /// Returns `UnsupportedOperation` rather than emulating a non-atomic
    /// upsert when the engine cannot do it atomically (§4.3).
    async fn upsert(
        &self,
        ctx: CancellationToken,
        target: &str,
        rows: &[Row],
        unique_cols: &[String],
    ) -> Result<u64, DatabaseError>;

    /// Rejects empty `conditions` with `InvalidData` to prevent accidental
    /// full-table deletes (§8 invariant 6); `Wipe` is the only way to clear
    /// everything.
    async fn delete(&self, ctx: CancellationToken, target: &str, conditions: &Row) -> Result<u64, DatabaseError>;

    async fn stream(&self, ctx: CancellationToken, params: StreamParams) -> Result<StreamPage, DatabaseError>;

    async fn execute_query(&self, ctx: CancellationToken, query: &str, args: &[serde_json::Value]) -> Result<Vec<Row>, DatabaseError>;
    async fn execute_count_query(&self, ctx: CancellationToken, query: &str) -> Result<i64, DatabaseError>;
    async fn get_row_count(&self, ctx: CancellationToken, target: &str, where_clause: Option<&str>) -> Result<(i64, bool), DatabaseError>;

    /// Truncates every user object in the current database scope; must not
    /// remove schema. Falls back to `DELETE FROM <t>` where `TRUNCATE` is
    /// unavailable or under-privileged.
    async fn wipe(&self, ctx: CancellationToken) -> Result<(), DatabaseError>;
}

/// Opaque, engine-reported facts about a database or server (§4.3
/// MetadataOperator). Absence of a conventional key means "unknown" to
/// callers, not an error.
#[async_trait]
pub trait MetadataOperator: Send + Sync {
    async fn collect_database_metadata(&self, ctx: CancellationToken) -> Result<BTreeMap<String, String>, DatabaseError>;
    async fn collect_instance_metadata(&self, ctx: CancellationToken) -> Result<BTreeMap<String, String>, DatabaseError>;
    async fn get_version(&self, ctx: CancellationToken) -> Result<String, DatabaseError>;
    async fn get_unique_identifier(&self, ctx: CancellationToken) -> Result<String, DatabaseError>;
    async fn get_database_size(&self, ctx: CancellationToken) -> Result<u64, DatabaseError>;
    async fn get_table_count(&self, ctx: CancellationToken) -> Result<u64, DatabaseError>;
    async fn execute_command(&self, ctx: CancellationToken, cmd: &str) -> Result<Vec<u8>, DatabaseError>;
}

/// The kind of change a CDC source observed (§6 CDC event shape).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

/// A normalized change event, identical in shape regardless of which
/// engine-native mechanism produced it (§4.5).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ReplicationChange {
    pub source_id: String,
    pub table: String,
    pub namespace: Option<String>,
    pub operation: ChangeOperation,
    pub data: Option<Row>,
    pub old_data: Option<Row>,
    /// Opaque engine-defined cursor (LSN, commit-id, poll-tick).
    pub position: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ReplicationConfig {
    pub source_id: String,
    pub target: String,
    pub poll_interval_secs: Option<u64>,
    pub options: BTreeMap<String, String>,
}

/// A running (or stopped) replication source; `status` is read without
/// blocking the capture loop (§5).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ReplicationStatus {
    pub source_id: String,
    pub running: bool,
    /// Set for mechanisms that cannot observe in-window churn (§9 open
    /// question: polling-diff CDC is documented as eventually-consistent,
    /// not emulated exactly).
    pub eventually_consistent: bool,
    pub last_position: Option<String>,
    pub last_error: Option<String>,
}

/// A handle to a started replication source returned by `connect` (§4.3).
/// Distinct from the [`ReplicationOperator`] itself so callers can hold it
/// independently of the adapter that created it.
pub struct ReplicationSource {
    pub source_id: String,
    pub stop: tokio::sync::watch::Sender<bool>,
}

impl ReplicationSource {
    /// Idempotent: repeated calls just re-send `true` to a single-slot
    /// watch channel (§4.5 "the signal is a single-slot channel so
    /// multiple Stop calls are idempotent").
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

/// Per-engine replication source lifecycle (§4.3 ReplicationOperator).
#[async_trait]
pub trait ReplicationOperator: Send + Sync {
    fn is_supported(&self) -> bool;
    fn capabilities(&self) -> Capability;
    fn get_supported_mechanisms(&self) -> Vec<&'static str>;

    async fn check_prerequisites(&self, ctx: CancellationToken) -> Result<(), CdcError>;

    async fn connect(
        &self,
        ctx: CancellationToken,
        config: ReplicationConfig,
        handler: CdcEventHandler,
    ) -> Result<ReplicationSource, CdcError>;

    async fn get_status(&self, source_id: &str) -> Result<ReplicationStatus, CdcError>;
    async fn get_lag(&self, source_id: &str) -> Result<Option<u64>, CdcError>;

    fn parse_event(&self, raw: &[u8]) -> Result<ReplicationChange, CdcError>;
    fn apply_cdc_event(&self, change: &ReplicationChange, target: &mut Row);
    fn transform_data(&self, change: ReplicationChange) -> ReplicationChange;
}

/// The callback a caller registers with [`ReplicationOperator::connect`];
/// invoked once per normalized change. Handlers MUST be idempotent because
/// delivery is at-least-once (§4.5).
pub type CdcEventHandler = std::sync::Arc<dyn Fn(ReplicationChange) + Send + Sync>;
