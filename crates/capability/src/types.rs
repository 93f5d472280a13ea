use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The closed set of engines the core knows how to address. Adding a new
/// engine means adding a variant here, a registry entry, and an adapter --
/// there is no dynamic registration of new paradigms or types at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseType {
    PostgreSql,
    MySql,
    MongoDb,
    Neo4j,
    Redis,
    Cassandra,
    Elasticsearch,
    Snowflake,
    ClickHouse,
    Pinecone,
    ObjectStorage,
    Hana,
}

impl std::str::FromStr for DatabaseType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgresql" | "postgres" => Ok(DatabaseType::PostgreSql),
            "mysql" => Ok(DatabaseType::MySql),
            "mongodb" => Ok(DatabaseType::MongoDb),
            "neo4j" => Ok(DatabaseType::Neo4j),
            "redis" => Ok(DatabaseType::Redis),
            "cassandra" => Ok(DatabaseType::Cassandra),
            "elasticsearch" => Ok(DatabaseType::Elasticsearch),
            "snowflake" => Ok(DatabaseType::Snowflake),
            "clickhouse" => Ok(DatabaseType::ClickHouse),
            "pinecone" => Ok(DatabaseType::Pinecone),
            "object_storage" | "s3" => Ok(DatabaseType::ObjectStorage),
            "hana" => Ok(DatabaseType::Hana),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl std::convert::AsRef<str> for DatabaseType {
    fn as_ref(&self) -> &str {
        match *self {
            DatabaseType::PostgreSql => "postgresql",
            DatabaseType::MySql => "mysql",
            DatabaseType::MongoDb => "mongodb",
            DatabaseType::Neo4j => "neo4j",
            DatabaseType::Redis => "redis",
            DatabaseType::Cassandra => "cassandra",
            DatabaseType::Elasticsearch => "elasticsearch",
            DatabaseType::Snowflake => "snowflake",
            DatabaseType::ClickHouse => "clickhouse",
            DatabaseType::Pinecone => "pinecone",
            DatabaseType::ObjectStorage => "object_storage",
            DatabaseType::Hana => "hana",
        }
    }
}

/// A data-model family. An engine may belong to more than one paradigm
/// (e.g. Elasticsearch is both document and search-index).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Paradigm {
    Relational,
    Document,
    KeyValue,
    Graph,
    Columnar,
    WideColumn,
    SearchIndex,
    Vector,
    TimeSeries,
    ObjectStorage,
}

/// The engine's supported paradigms plus feature flags, as registered for
/// the life of the process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Capability {
    pub db_type: DatabaseType,
    pub paradigms: Vec<Paradigm>,
    pub supports_cdc: bool,
    pub supports_transactions: bool,
    pub supports_materialized_views: bool,
    pub supports_schemas: bool,
    pub supports_upsert: bool,
    /// Replication mechanisms this engine's `ReplicationOperator` can offer,
    /// e.g. "logical_replication", "trigger-based", "polling", "event-stream".
    pub replication_mechanisms: Vec<&'static str>,
}

impl Capability {
    /// Convenience accessor for ad hoc feature probing beyond the named
    /// booleans above (kept small and explicit rather than a generic
    /// string-keyed bag, per the spec's closed Capability shape).
    pub fn feature(&self, name: &str) -> bool {
        match name {
            "cdc" => self.supports_cdc,
            "transactions" => self.supports_transactions,
            "materialized_views" => self.supports_materialized_views,
            "schemas" => self.supports_schemas,
            "upsert" => self.supports_upsert,
            _ => false,
        }
    }

    pub fn has_paradigm(&self, p: Paradigm) -> bool {
        self.paradigms.contains(&p)
    }
}
