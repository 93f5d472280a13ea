use crate::types::{Capability, DatabaseType, Paradigm};
use std::collections::BTreeMap;

/// A closed, immutable map from [`DatabaseType`] to [`Capability`]. Built
/// once via [`CapabilityRegistry::with_defaults`] and never mutated after
/// that -- there is no `insert` exposed outside the crate.
#[derive(Debug)]
pub struct CapabilityRegistry {
    entries: BTreeMap<DatabaseType, Capability>,
}

impl CapabilityRegistry {
    pub fn get(&self, db_type: DatabaseType) -> Option<&Capability> {
        self.entries.get(&db_type)
    }

    pub(crate) fn with_defaults() -> Self {
        use DatabaseType::*;
        use Paradigm::*;

        let mut entries = BTreeMap::new();
        let mut add = |cap: Capability| {
            entries.insert(cap.db_type, cap);
        };

        add(Capability {
            db_type: PostgreSql,
            paradigms: vec![Relational],
            supports_cdc: true,
            supports_transactions: true,
            supports_materialized_views: true,
            supports_schemas: true,
            supports_upsert: true,
            replication_mechanisms: vec!["logical_replication"],
        });
        add(Capability {
            db_type: MySql,
            paradigms: vec![Relational],
            supports_cdc: true,
            supports_transactions: true,
            supports_materialized_views: false,
            supports_schemas: true,
            supports_upsert: true,
            replication_mechanisms: vec!["binlog"],
        });
        add(Capability {
            db_type: MongoDb,
            paradigms: vec![Document],
            supports_cdc: true,
            supports_transactions: true,
            supports_materialized_views: false,
            supports_schemas: false,
            supports_upsert: true,
            replication_mechanisms: vec!["event-stream"],
        });
        add(Capability {
            db_type: Neo4j,
            paradigms: vec![Graph],
            supports_cdc: false,
            supports_transactions: true,
            supports_materialized_views: false,
            supports_schemas: false,
            supports_upsert: true,
            replication_mechanisms: vec![],
        });
        add(Capability {
            db_type: Redis,
            paradigms: vec![KeyValue],
            supports_cdc: true,
            supports_transactions: false,
            supports_materialized_views: false,
            supports_schemas: false,
            supports_upsert: true,
            replication_mechanisms: vec!["event-stream"],
        });
        add(Capability {
            db_type: Cassandra,
            paradigms: vec![WideColumn],
            supports_cdc: true,
            supports_transactions: false,
            supports_materialized_views: true,
            supports_schemas: true,
            supports_upsert: true,
            replication_mechanisms: vec!["polling"],
        });
        add(Capability {
            db_type: Elasticsearch,
            paradigms: vec![Document, SearchIndex],
            supports_cdc: false,
            supports_transactions: false,
            supports_materialized_views: false,
            supports_schemas: true,
            supports_upsert: true,
            replication_mechanisms: vec![],
        });
        add(Capability {
            db_type: Snowflake,
            paradigms: vec![Relational, Columnar],
            supports_cdc: false,
            supports_transactions: true,
            supports_materialized_views: true,
            supports_schemas: true,
            supports_upsert: true,
            replication_mechanisms: vec![],
        });
        add(Capability {
            db_type: ClickHouse,
            paradigms: vec![Columnar, TimeSeries],
            supports_cdc: false,
            supports_transactions: false,
            supports_materialized_views: true,
            supports_schemas: true,
            supports_upsert: false,
            replication_mechanisms: vec!["polling"],
        });
        add(Capability {
            db_type: Pinecone,
            paradigms: vec![Vector],
            supports_cdc: true,
            supports_transactions: false,
            supports_materialized_views: false,
            supports_schemas: false,
            supports_upsert: true,
            replication_mechanisms: vec!["polling"],
        });
        add(Capability {
            db_type: DatabaseType::ObjectStorage,
            paradigms: vec![Paradigm::ObjectStorage],
            supports_cdc: true,
            supports_transactions: false,
            supports_materialized_views: false,
            supports_schemas: false,
            supports_upsert: false,
            replication_mechanisms: vec!["polling", "event-stream"],
        });
        add(Capability {
            db_type: Hana,
            paradigms: vec![Relational],
            supports_cdc: true,
            supports_transactions: true,
            supports_materialized_views: true,
            supports_schemas: true,
            supports_upsert: true,
            replication_mechanisms: vec!["trigger-based"],
        });

        Self { entries }
    }
}

/// All recognized database type ids, in sorted order.
pub(crate) fn ids(registry: &CapabilityRegistry) -> Vec<DatabaseType> {
    registry.entries.keys().copied().collect()
}
