//! Contracts for the per-engine driver plugin system (§3.4, §4.3): the
//! `DatabaseAdapter` factory trait, the `Connection`/`InstanceConnection`
//! handles it mints, the four operator traits those handles expose, and
//! the process-wide registry that looks adapters up by `DatabaseType`.
//!
//! This crate defines contracts only -- concrete per-engine implementations
//! live in the `adapters` crate.

pub mod adapter;
pub mod config;
pub mod connection;
pub mod operators;
pub mod registry;

pub use adapter::DatabaseAdapter;
pub use config::{AdminOptions, ConnectionConfig, InstanceConfig, StreamPage, StreamParams};
pub use connection::{Connection, ConnectionState, InstanceConnection};
pub use operators::{
    CdcEventHandler, ChangeOperation, DataOperator, MetadataOperator, ReplicationChange,
    ReplicationConfig, ReplicationOperator, ReplicationSource, ReplicationStatus, Row,
    SchemaOperator,
};
pub use registry::{get, install, registry, AdapterRegistry};
