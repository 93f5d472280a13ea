use crate::config::AdminOptions;
use crate::operators::{DataOperator, MetadataOperator, ReplicationOperator, SchemaOperator};
use async_trait::async_trait;
use capability::DatabaseType;
use db_errors::DatabaseError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared state backing both `Connection` and `InstanceConnection`
/// implementations: the `connected` flag is an atomic so `close` races
/// safely with in-flight operations (§5).
#[derive(Debug)]
pub struct ConnectionState {
    pub id: String,
    pub db_type: DatabaseType,
    connected: AtomicBool,
}

impl ConnectionState {
    pub fn new(id: impl Into<String>, db_type: DatabaseType) -> Self {
        Self {
            id: id.into(),
            db_type,
            connected: AtomicBool::new(true),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Returns `Ok(())` the first time it transitions `true -> false`, and
    /// the `Disconnected` sentinel on every subsequent call -- the
    /// idempotence property required by §8 invariant 5.
    pub fn close(&self, op: &'static str) -> Result<(), DatabaseError> {
        if self.connected.swap(false, Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DatabaseError::disconnected(self.db_type, op))
        }
    }
}

/// A database-scoped connection handle (§3.5, §4.3).
#[async_trait]
pub trait Connection: Send + Sync {
    fn id(&self) -> &str;
    fn db_type(&self) -> DatabaseType;
    fn is_connected(&self) -> bool;
    async fn ping(&self, ctx: CancellationToken) -> Result<(), DatabaseError>;
    fn close(&self) -> Result<(), DatabaseError>;

    fn schema_operations(&self) -> Arc<dyn SchemaOperator>;
    fn data_operations(&self) -> Arc<dyn DataOperator>;
    fn replication_operations(&self) -> Arc<dyn ReplicationOperator>;
    fn metadata_operations(&self) -> Arc<dyn MetadataOperator>;
}

/// A server-scoped connection handle able to manage whole databases (§3.5).
#[async_trait]
pub trait InstanceConnection: Send + Sync {
    fn id(&self) -> &str;
    fn db_type(&self) -> DatabaseType;
    fn is_connected(&self) -> bool;
    async fn ping(&self, ctx: CancellationToken) -> Result<(), DatabaseError>;
    fn close(&self) -> Result<(), DatabaseError>;

    async fn list_databases(&self, ctx: CancellationToken) -> Result<Vec<String>, DatabaseError>;
    async fn create_database(
        &self,
        ctx: CancellationToken,
        name: &str,
        options: &AdminOptions,
    ) -> Result<(), DatabaseError>;
    async fn drop_database(
        &self,
        ctx: CancellationToken,
        name: &str,
        options: &AdminOptions,
    ) -> Result<(), DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_close_returns_disconnected_sentinel() {
        let state = ConnectionState::new("db-1", DatabaseType::PostgreSql);
        assert!(state.close("close").is_ok());
        let second = state.close("close").unwrap_err();
        assert_eq!(second.kind, db_errors::ErrorKind::Disconnected);
        assert!(!state.is_connected());
    }
}
