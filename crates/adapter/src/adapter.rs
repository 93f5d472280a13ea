use crate::config::{ConnectionConfig, InstanceConfig};
use crate::connection::{Connection, InstanceConnection};
use async_trait::async_trait;
use capability::{Capability, DatabaseType};
use db_errors::DatabaseError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The contract every per-engine driver implements (§4.3). A `DatabaseAdapter`
/// is stateless with respect to any one connection -- it is a factory,
/// registered once in the [`crate::registry::AdapterRegistry`] and used to
/// mint as many `Connection`/`InstanceConnection` values as callers need.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    fn db_type(&self) -> DatabaseType;
    fn capabilities(&self) -> Capability;

    async fn connect(
        &self,
        ctx: CancellationToken,
        config: ConnectionConfig,
    ) -> Result<Arc<dyn Connection>, DatabaseError>;

    async fn connect_instance(
        &self,
        ctx: CancellationToken,
        config: InstanceConfig,
    ) -> Result<Arc<dyn InstanceConnection>, DatabaseError>;
}
