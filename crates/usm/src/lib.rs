//! The Unified Schema Model: a single, paradigm-neutral, in-memory
//! container that can hold the schema metadata of any supported database
//! engine without collapsing distinctions between paradigms.
//!
//! `UnifiedSchema` is intentionally "dumb" -- it validates internal
//! well-formedness (e.g. [`primitives::Constraint::is_well_formed`]) but
//! never engine semantics. Discovery adapters populate it; the paradigm
//! analyzer and translator read it; `compare` diffs two snapshots of it.

pub mod compare;
pub mod containers;
pub mod executable;
pub mod extensions;
pub mod organization;
pub mod paradigm_specific;
pub mod primitives;
pub mod replication;
pub mod schema;
pub mod security;
pub mod storage;
pub mod views;

pub use compare::{compare, CompareResult};
pub use containers::{
    Cache, Catalog, Collection, Database, DbSchema, MemoryTable, Node, Table, TemporaryTable,
    TransientTable,
};
pub use executable::{
    Aggregate, DbOperator, EventTrigger, Function, FunctionArg, Macro, Method, Module, Package,
    Procedure, Rule, Trigger, TriggerTiming, WindowFunc,
};
pub use extensions::{
    AggregationOp, BufferPool, EnrichmentRef, Extension, Plugin, Projection, TransformationStep,
    TtlSetting,
};
pub use organization::{Keyspace, Namespace, Partition, Shard, SubPartition};
pub use paradigm_specific::{
    Blob, Document, EmbeddedDocument, Embedding, Graph, Path, Relationship, SearchDocument,
    SearchIndex, Vector, VectorIndex, VectorMetric,
};
pub use primitives::{
    AttrMap, Column, Constraint, ConstraintKind, DbType, Field, ForeignKeyReference, Identity,
    Index, PropertyKey, Sequence, UuidGenerator,
};
pub use replication::{FailoverGroup, Publication, ReplicationSlot, Subscription};
pub use schema::UnifiedSchema;
pub use security::{Grant, Policy, Role, User};
pub use storage::{Datafile, Extent, Filegroup, Page, Segment, Tablespace};
pub use views::{
    ExternalTable, ForeignTable, LiveView, MaterializedView, RefreshPolicy, View, WindowView,
};
