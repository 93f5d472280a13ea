//! Concrete per-engine driver implementations of the `adapter` crate's
//! contracts (§4.3). Each submodule owns one engine's wire protocol and one
//! `ReplicationOperator` mechanism; `sql_common` holds the logic shared by
//! the two `sqlx::Any`-backed relational engines.

mod hana;
mod mongodb;
mod mysql;
mod neo4j;
mod object_storage;
mod postgres;
mod sql_common;
mod vector;

use adapter::DatabaseAdapter;
use std::sync::Arc;

pub use hana::HanaAdapter;
pub use mongodb::MongoAdapter;
pub use mysql::MySqlAdapter;
pub use neo4j::Neo4jAdapter;
pub use object_storage::ObjectStorageAdapter;
pub use postgres::PostgresAdapter;
pub use vector::VectorAdapter;

/// One instance of every engine this workspace ships a driver for, ready to
/// hand to [`adapter::registry::AdapterRegistry::build`]. Engines the
/// Capability Registry lists but this workspace doesn't implement a wire
/// driver for (Redis, Cassandra, Elasticsearch, Snowflake, ClickHouse) are
/// intentionally absent -- `AdapterRegistry::get` returns `None` for them,
/// which callers already treat as "no adapter installed" rather than a
/// panic.
pub fn register_defaults() -> Vec<Arc<dyn DatabaseAdapter>> {
    vec![
        Arc::new(PostgresAdapter),
        Arc::new(MySqlAdapter),
        Arc::new(MongoAdapter),
        Arc::new(Neo4jAdapter),
        Arc::new(ObjectStorageAdapter),
        Arc::new(VectorAdapter),
        Arc::new(HanaAdapter),
    ]
}
