use crate::containers::*;
use crate::executable::*;
use crate::extensions::*;
use crate::organization::*;
use crate::paradigm_specific::*;
use crate::primitives::*;
use crate::replication::*;
use crate::security::*;
use crate::storage::*;
use crate::views::*;
use capability::DatabaseType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The paradigm-neutral, closed container for every schema object category
/// USM understands (§3.1). Every map is keyed by the object's own `name`
/// field (an invariant enforced by [`UnifiedSchema::insert_*`] helpers, not
/// by the type system); iteration order is always sorted-by-key because
/// every category is backed by a `BTreeMap`, which both matches the spec's
/// "insertion order is not significant" note and gives the Translator's
/// determinism requirement (§4.7) for free.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct UnifiedSchema {
    pub db_type: Option<DatabaseType>,

    // Containers
    pub catalogs: BTreeMap<String, Catalog>,
    pub databases: BTreeMap<String, Database>,
    pub schemas: BTreeMap<String, DbSchema>,
    pub tables: BTreeMap<String, Table>,
    pub collections: BTreeMap<String, Collection>,
    pub nodes: BTreeMap<String, Node>,
    pub memory_tables: BTreeMap<String, MemoryTable>,
    pub temporary_tables: BTreeMap<String, TemporaryTable>,
    pub transient_tables: BTreeMap<String, TransientTable>,
    pub caches: BTreeMap<String, Cache>,

    // Virtual containers
    pub views: BTreeMap<String, View>,
    pub live_views: BTreeMap<String, LiveView>,
    pub window_views: BTreeMap<String, WindowView>,
    pub materialized_views: BTreeMap<String, MaterializedView>,
    pub external_tables: BTreeMap<String, ExternalTable>,
    pub foreign_tables: BTreeMap<String, ForeignTable>,

    // Paradigm-specific containers
    pub graphs: BTreeMap<String, Graph>,
    pub vector_indexes: BTreeMap<String, VectorIndex>,
    pub search_indexes: BTreeMap<String, SearchIndex>,
    pub search_documents: BTreeMap<String, SearchDocument>,
    pub vectors: BTreeMap<String, Vector>,
    pub embeddings: BTreeMap<String, Embedding>,
    pub documents: BTreeMap<String, Document>,
    pub embedded_documents: BTreeMap<String, EmbeddedDocument>,
    pub relationships: BTreeMap<String, Relationship>,
    pub paths: BTreeMap<String, Path>,
    pub blobs: BTreeMap<String, Blob>,

    // Data organization
    pub partitions: BTreeMap<String, Partition>,
    pub sub_partitions: BTreeMap<String, SubPartition>,
    pub shards: BTreeMap<String, Shard>,
    pub keyspaces: BTreeMap<String, Keyspace>,
    pub namespaces: BTreeMap<String, Namespace>,

    // Structural primitives not owned by a container
    pub types: BTreeMap<String, DbType>,
    pub sequences: BTreeMap<String, Sequence>,
    pub identities: BTreeMap<String, Identity>,
    pub uuid_generators: BTreeMap<String, UuidGenerator>,

    // Executable
    pub functions: BTreeMap<String, Function>,
    pub procedures: BTreeMap<String, Procedure>,
    pub methods: BTreeMap<String, Method>,
    pub triggers: BTreeMap<String, Trigger>,
    pub event_triggers: BTreeMap<String, EventTrigger>,
    pub aggregates: BTreeMap<String, Aggregate>,
    pub operators: BTreeMap<String, DbOperator>,
    pub modules: BTreeMap<String, Module>,
    pub packages: BTreeMap<String, Package>,
    pub macros: BTreeMap<String, Macro>,
    pub rules: BTreeMap<String, Rule>,
    pub window_funcs: BTreeMap<String, WindowFunc>,

    // Security
    pub users: BTreeMap<String, User>,
    pub roles: BTreeMap<String, Role>,
    pub grants: BTreeMap<String, Grant>,
    pub policies: BTreeMap<String, Policy>,

    // Storage
    pub tablespaces: BTreeMap<String, Tablespace>,
    pub segments: BTreeMap<String, Segment>,
    pub extents: BTreeMap<String, Extent>,
    pub pages: BTreeMap<String, Page>,
    pub filegroups: BTreeMap<String, Filegroup>,
    pub datafiles: BTreeMap<String, Datafile>,

    // Extensions & analytics
    pub extensions: BTreeMap<String, Extension>,
    pub plugins: BTreeMap<String, Plugin>,
    pub ttl_settings: BTreeMap<String, TtlSetting>,
    pub projections: BTreeMap<String, Projection>,
    pub aggregation_ops: BTreeMap<String, AggregationOp>,
    pub transformation_steps: BTreeMap<String, TransformationStep>,
    pub enrichment_refs: BTreeMap<String, EnrichmentRef>,
    pub buffer_pools: BTreeMap<String, BufferPool>,

    // Replication descriptors
    pub publications: BTreeMap<String, Publication>,
    pub subscriptions: BTreeMap<String, Subscription>,
    pub replication_slots: BTreeMap<String, ReplicationSlot>,
    pub failover_groups: BTreeMap<String, FailoverGroup>,
}

impl UnifiedSchema {
    pub fn new(db_type: DatabaseType) -> Self {
        Self {
            db_type: Some(db_type),
            ..Default::default()
        }
    }

    pub fn insert_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn insert_collection(&mut self, collection: Collection) {
        self.collections.insert(collection.name.clone(), collection);
    }

    pub fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.name.clone(), node);
    }

    pub fn insert_relationship(&mut self, rel: Relationship) {
        self.relationships.insert(rel.name.clone(), rel);
    }

    pub fn insert_vector_index(&mut self, idx: VectorIndex) {
        self.vector_indexes.insert(idx.name.clone(), idx);
    }

    /// Returns every foreign-key constraint defined across every table,
    /// each paired with the name of its owning table.
    pub fn foreign_keys(&self) -> Vec<(&str, &Constraint)> {
        self.tables
            .values()
            .flat_map(|t| {
                t.constraints
                    .values()
                    .filter(|c| c.kind == ConstraintKind::ForeignKey)
                    .map(move |c| (t.name.as_str(), c))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_json_is_identity() {
        let mut schema = UnifiedSchema::new(DatabaseType::PostgreSql);
        let mut table = Table {
            name: "users".into(),
            ..Default::default()
        };
        table.columns.insert(
            "id".into(),
            Column {
                name: "id".into(),
                data_type: "integer".into(),
                nullable: false,
                is_primary_key: true,
                auto_increment: true,
                ..Default::default()
            },
        );
        schema.insert_table(table);
        schema.insert_vector_index(VectorIndex {
            name: "embeddings".into(),
            dimension: 384,
            metric: VectorMetric::Cosine,
            parameters: BTreeMap::new(),
        });

        let encoded = serde_json::to_string(&schema).expect("encode");
        let decoded: UnifiedSchema = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(schema, decoded);
    }

    #[test]
    fn foreign_keys_are_discoverable_across_tables() {
        let mut schema = UnifiedSchema::new(DatabaseType::PostgreSql);
        let mut orders = Table {
            name: "orders".into(),
            ..Default::default()
        };
        orders.constraints.insert(
            "orders_user_fk".into(),
            Constraint {
                name: "orders_user_fk".into(),
                kind: ConstraintKind::ForeignKey,
                columns: vec!["user_id".into()],
                reference: Some(ForeignKeyReference {
                    table: "users".into(),
                    columns: vec!["id".into()],
                    on_update: None,
                    on_delete: None,
                }),
                expression: None,
            },
        );
        schema.insert_table(orders);

        let fks = schema.foreign_keys();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].0, "orders");
    }
}
