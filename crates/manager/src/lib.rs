//! The per-process router mapping `databaseId -> {DatabaseType, client}`
//! (§4.4). `DatabaseManager` centralizes the "which engine?" dispatch so
//! upstream callers never branch on `DatabaseType` themselves -- they ask
//! for a database id and an operation, and the manager forwards to the
//! right adapter's `DataOperator`.

use adapter::{Connection, Row};
use capability::DatabaseType;
use db_errors::{DatabaseError, ErrorKind};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

struct ManagedClient {
    db_type: DatabaseType,
    connection: Arc<dyn Connection>,
}

/// Holds every currently-opened connection, keyed by the caller's own
/// database id. The map itself is the only shared state (§5): reads take
/// a shared lock, `register`/`remove` take an exclusive one, and no lock
/// is held across the adapter call itself.
#[derive(Default)]
pub struct DatabaseManager {
    clients: RwLock<BTreeMap<String, ManagedClient>>,
}

impl DatabaseManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, database_id: impl Into<String>, connection: Arc<dyn Connection>) {
        let db_type = connection.db_type();
        self.clients.write().unwrap().insert(
            database_id.into(),
            ManagedClient { db_type, connection },
        );
    }

    pub fn remove(&self, database_id: &str) -> Option<()> {
        self.clients.write().unwrap().remove(database_id).map(|_| ())
    }

    fn lookup(&self, database_id: &str, op: &'static str) -> Result<Arc<dyn Connection>, DatabaseError> {
        let clients = self.clients.read().unwrap();
        let client = clients.get(database_id).ok_or_else(|| {
            DatabaseError::new(
                DatabaseType::PostgreSql,
                op,
                ErrorKind::NotFound,
                format!("no database registered with id {database_id}"),
            )
        })?;
        if !client.connection.is_connected() {
            return Err(DatabaseError::disconnected(client.db_type, op));
        }
        Ok(client.connection.clone())
    }

    pub async fn get_data_from_database(
        &self,
        ctx: CancellationToken,
        database_id: &str,
        target: &str,
        limit: u32,
    ) -> Result<Vec<Row>, DatabaseError> {
        let connection = self.lookup(database_id, "get_data")?;
        connection.data_operations().fetch(ctx, target, limit).await
    }

    pub async fn insert_data_to_database(
        &self,
        ctx: CancellationToken,
        database_id: &str,
        target: &str,
        rows: &[Row],
    ) -> Result<u64, DatabaseError> {
        let connection = self.lookup(database_id, "insert_data")?;
        connection.data_operations().insert(ctx, target, rows).await
    }

    pub async fn upsert_data_to_database(
        &self,
        ctx: CancellationToken,
        database_id: &str,
        target: &str,
        rows: &[Row],
        unique_cols: &[String],
    ) -> Result<u64, DatabaseError> {
        let connection = self.lookup(database_id, "upsert_data")?;
        connection
            .data_operations()
            .upsert(ctx, target, rows, unique_cols)
            .await
    }

    pub async fn update_data_in_database(
        &self,
        ctx: CancellationToken,
        database_id: &str,
        target: &str,
        rows: &[Row],
        where_cols: &[String],
    ) -> Result<u64, DatabaseError> {
        let connection = self.lookup(database_id, "update_data")?;
        connection
            .data_operations()
            .update(ctx, target, rows, where_cols)
            .await
    }

    pub async fn wipe_database(
        &self,
        ctx: CancellationToken,
        database_id: &str,
    ) -> Result<(), DatabaseError> {
        let connection = self.lookup(database_id, "wipe_database")?;
        connection.data_operations().wipe(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapter::{
        CdcEventHandler, ChangeOperation, DataOperator, MetadataOperator, ReplicationChange,
        ReplicationConfig, ReplicationOperator, ReplicationSource, ReplicationStatus,
        StreamPage, StreamParams,
    };
    use async_trait::async_trait;
    use capability::Capability;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubConnection {
        db_type: DatabaseType,
        connected: AtomicBool,
        data: Arc<StubData>,
    }

    #[derive(Default)]
    struct StubData {
        wiped: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl DataOperator for StubData {
        async fn fetch(&self, _ctx: CancellationToken, _t: &str, _l: u32) -> Result<Vec<Row>, DatabaseError> {
            Ok(vec![])
        }
        async fn fetch_with_columns(&self, _ctx: CancellationToken, _t: &str, _c: &[String], _l: u32) -> Result<Vec<Row>, DatabaseError> {
            Ok(vec![])
        }
        async fn insert(&self, _ctx: CancellationToken, _t: &str, rows: &[Row]) -> Result<u64, DatabaseError> {
            Ok(rows.len() as u64)
        }
        async fn update(&self, _ctx: CancellationToken, _t: &str, rows: &[Row], _w: &[String]) -> Result<u64, DatabaseError> {
            Ok(rows.len() as u64)
        }
        async fn upsert(&self, _ctx: CancellationToken, _t: &str, rows: &[Row], _u: &[String]) -> Result<u64, DatabaseError> {
            Ok(rows.len() as u64)
        }
        async fn delete(&self, _ctx: CancellationToken, _t: &str, conditions: &Row) -> Result<u64, DatabaseError> {
            if conditions.is_empty() {
                return Err(DatabaseError::invalid_data(self_db_type(), "delete", "empty conditions"));
            }
            Ok(1)
        }
        async fn stream(&self, _ctx: CancellationToken, _p: StreamParams) -> Result<StreamPage, DatabaseError> {
            Ok(StreamPage::default())
        }
        async fn execute_query(&self, _ctx: CancellationToken, _q: &str, _a: &[serde_json::Value]) -> Result<Vec<Row>, DatabaseError> {
            Ok(vec![])
        }
        async fn execute_count_query(&self, _ctx: CancellationToken, _q: &str) -> Result<i64, DatabaseError> {
            Ok(0)
        }
        async fn get_row_count(&self, _ctx: CancellationToken, _t: &str, _w: Option<&str>) -> Result<(i64, bool), DatabaseError> {
            Ok((0, true))
        }
        async fn wipe(&self, _ctx: CancellationToken) -> Result<(), DatabaseError> {
            self.wiped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn self_db_type() -> DatabaseType {
        DatabaseType::PostgreSql
    }

    struct StubMeta;
    #[async_trait]
    impl MetadataOperator for StubMeta {
        async fn collect_database_metadata(&self, _ctx: CancellationToken) -> Result<BTreeMap<String, String>, DatabaseError> { Ok(BTreeMap::new()) }
        async fn collect_instance_metadata(&self, _ctx: CancellationToken) -> Result<BTreeMap<String, String>, DatabaseError> { Ok(BTreeMap::new()) }
        async fn get_version(&self, _ctx: CancellationToken) -> Result<String, DatabaseError> { Ok("1.0".into()) }
        async fn get_unique_identifier(&self, _ctx: CancellationToken) -> Result<String, DatabaseError> { Ok("id".into()) }
        async fn get_database_size(&self, _ctx: CancellationToken) -> Result<u64, DatabaseError> { Ok(0) }
        async fn get_table_count(&self, _ctx: CancellationToken) -> Result<u64, DatabaseError> { Ok(0) }
        async fn execute_command(&self, _ctx: CancellationToken, _c: &str) -> Result<Vec<u8>, DatabaseError> { Ok(vec![]) }
    }

    struct StubReplication;
    #[async_trait]
    impl ReplicationOperator for StubReplication {
        fn is_supported(&self) -> bool { false }
        fn capabilities(&self) -> Capability { capability::must_get(self_db_type()).clone() }
        fn get_supported_mechanisms(&self) -> Vec<&'static str> { vec![] }
        async fn check_prerequisites(&self, _ctx: CancellationToken) -> Result<(), db_errors::CdcError> { Ok(()) }
        async fn connect(&self, _ctx: CancellationToken, _c: ReplicationConfig, _h: CdcEventHandler) -> Result<ReplicationSource, db_errors::CdcError> {
            Err(db_errors::CdcError::Unsupported { source_id: "n/a".into(), reason: "stub".into() })
        }
        async fn get_status(&self, source_id: &str) -> Result<ReplicationStatus, db_errors::CdcError> {
            Err(db_errors::CdcError::NotFound(source_id.to_string()))
        }
        async fn get_lag(&self, _source_id: &str) -> Result<Option<u64>, db_errors::CdcError> { Ok(None) }
        fn parse_event(&self, _raw: &[u8]) -> Result<ReplicationChange, db_errors::CdcError> {
            Err(db_errors::CdcError::Unsupported { source_id: "n/a".into(), reason: "stub".into() })
        }
        fn apply_cdc_event(&self, _change: &ReplicationChange, _target: &mut Row) {}
        fn transform_data(&self, change: ReplicationChange) -> ReplicationChange { change }
    }

    struct StubSchema;
    #[async_trait]
    impl adapter::SchemaOperator for StubSchema {
        async fn discover_schema(&self, _ctx: CancellationToken) -> Result<usm::UnifiedSchema, DatabaseError> {
            Ok(usm::UnifiedSchema::new(self_db_type()))
        }
        async fn create_structure(&self, _ctx: CancellationToken, _s: &usm::UnifiedSchema) -> Result<(), DatabaseError> { Ok(()) }
        async fn list_tables(&self, _ctx: CancellationToken) -> Result<Vec<String>, DatabaseError> { Ok(vec![]) }
        async fn get_table_schema(&self, _ctx: CancellationToken, name: &str) -> Result<usm::Table, DatabaseError> {
            Err(DatabaseError::not_found(self_db_type(), "get_table_schema", name))
        }
    }

    #[async_trait]
    impl Connection for StubConnection {
        fn id(&self) -> &str { "stub" }
        fn db_type(&self) -> DatabaseType { self.db_type }
        fn is_connected(&self) -> bool { self.connected.load(Ordering::SeqCst) }
        async fn ping(&self, _ctx: CancellationToken) -> Result<(), DatabaseError> { Ok(()) }
        fn close(&self) -> Result<(), DatabaseError> {
            if self.connected.swap(false, Ordering::SeqCst) {
                Ok(())
            } else {
                Err(DatabaseError::disconnected(self.db_type, "close"))
            }
        }
        fn schema_operations(&self) -> Arc<dyn adapter::SchemaOperator> { Arc::new(StubSchema) }
        fn data_operations(&self) -> Arc<dyn DataOperator> { self.data.clone() }
        fn replication_operations(&self) -> Arc<dyn ReplicationOperator> { Arc::new(StubReplication) }
        fn metadata_operations(&self) -> Arc<dyn MetadataOperator> { Arc::new(StubMeta) }
    }

    fn stub_connection() -> (Arc<StubConnection>, Arc<StubData>) {
        let data = Arc::new(StubData::default());
        let conn = Arc::new(StubConnection {
            db_type: DatabaseType::PostgreSql,
            connected: AtomicBool::new(true),
            data: data.clone(),
        });
        (conn, data)
    }

    #[tokio::test]
    async fn unknown_database_id_is_not_found() {
        let manager = DatabaseManager::new();
        let err = manager
            .get_data_from_database(CancellationToken::new(), "missing", "users", 10)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn disconnected_client_is_rejected_before_dispatch() {
        let manager = DatabaseManager::new();
        let (conn, _data) = stub_connection();
        conn.close().unwrap();
        manager.register("db-1", conn);

        let err = manager
            .get_data_from_database(CancellationToken::new(), "db-1", "users", 10)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Disconnected);
    }

    #[tokio::test]
    async fn wipe_dispatches_to_the_registered_adapter() {
        let manager = DatabaseManager::new();
        let (conn, data) = stub_connection();
        manager.register("db-1", conn);

        manager
            .wipe_database(CancellationToken::new(), "db-1")
            .await
            .expect("wipe succeeds");
        assert!(data.wiped.load(Ordering::SeqCst));
    }
}
