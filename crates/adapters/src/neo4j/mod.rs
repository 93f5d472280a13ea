//! Neo4j adapter: schema/data/metadata over Bolt via `neo4rs`, Cypher
//! instead of SQL. The Capability Registry carries `supports_cdc: false`
//! for this engine (no wire-level change feed ships in the edition this
//! workspace targets), so [`Neo4jReplication::is_supported`] returns
//! `false` and `connect` fails fast rather than approximating one.

use adapter::config::{AdminOptions, ConnectionConfig, InstanceConfig, StreamPage, StreamParams};
use adapter::{
    CdcEventHandler, Connection, DataOperator, DatabaseAdapter, InstanceConnection, MetadataOperator,
    ReplicationChange, ReplicationConfig, ReplicationOperator, ReplicationSource, ReplicationStatus, Row,
    SchemaOperator,
};
use async_trait::async_trait;
use capability::{Capability, DatabaseType};
use db_errors::{CdcError, DatabaseError, ErrorKind};
use neo4rs::{query, Graph, Node as BoltNode};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use usm::{Node as UsmNode, PropertyKey, Table, UnifiedSchema};

fn bolt_node_to_row(node: &BoltNode) -> Row {
    let mut row = Row::new();
    for key in node.keys() {
        if let Ok(value) = node.get::<serde_json::Value>(key) {
            row.insert(key.to_string(), value);
        }
    }
    row
}

fn neo4j_error(op: &'static str, err: neo4rs::Error) -> DatabaseError {
    DatabaseError::wrap(DatabaseType::Neo4j, op, ErrorKind::Internal, err.into())
}

pub struct Neo4jAdapter;

#[async_trait]
impl DatabaseAdapter for Neo4jAdapter {
    fn db_type(&self) -> DatabaseType {
        DatabaseType::Neo4j
    }

    fn capabilities(&self) -> Capability {
        capability::must_get(DatabaseType::Neo4j).clone()
    }

    async fn connect(&self, _ctx: CancellationToken, config: ConnectionConfig) -> Result<Arc<dyn Connection>, DatabaseError> {
        let uri = format!("{}:{}", config.host, config.port);
        let graph = Graph::new(&uri, &config.username, &config.password)
            .await
            .map_err(|e| DatabaseError::wrap(DatabaseType::Neo4j, "connect", ErrorKind::Connection, e.into()))?;
        Ok(Arc::new(Neo4jConnection::new(config.database_id, graph)))
    }

    async fn connect_instance(&self, _ctx: CancellationToken, config: InstanceConfig) -> Result<Arc<dyn InstanceConnection>, DatabaseError> {
        let uri = format!("{}:{}", config.host, config.port);
        let graph = Graph::new(&uri, &config.username, &config.password)
            .await
            .map_err(|e| DatabaseError::wrap(DatabaseType::Neo4j, "connect_instance", ErrorKind::Connection, e.into()))?;
        Ok(Arc::new(Neo4jInstance {
            state: adapter::ConnectionState::new(config.instance_id, DatabaseType::Neo4j),
            graph,
        }))
    }
}

struct Neo4jConnection {
    state: adapter::ConnectionState,
    operators: Arc<Neo4jOperators>,
    replication: Arc<Neo4jReplication>,
}

impl Neo4jConnection {
    fn new(id: String, graph: Graph) -> Self {
        let operators = Arc::new(Neo4jOperators { graph });
        let replication = Arc::new(Neo4jReplication);
        Self { state: adapter::ConnectionState::new(id, DatabaseType::Neo4j), operators, replication }
    }
}

#[async_trait]
impl Connection for Neo4jConnection {
    fn id(&self) -> &str {
        &self.state.id
    }
    fn db_type(&self) -> DatabaseType {
        DatabaseType::Neo4j
    }
    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
    async fn ping(&self, _ctx: CancellationToken) -> Result<(), DatabaseError> {
        self.operators.graph.run(query("RETURN 1")).await.map_err(|e| neo4j_error("ping", e))
    }
    fn close(&self) -> Result<(), DatabaseError> {
        self.state.close("close")
    }
    fn schema_operations(&self) -> Arc<dyn SchemaOperator> {
        self.operators.clone()
    }
    fn data_operations(&self) -> Arc<dyn DataOperator> {
        self.operators.clone()
    }
    fn replication_operations(&self) -> Arc<dyn ReplicationOperator> {
        self.replication.clone()
    }
    fn metadata_operations(&self) -> Arc<dyn MetadataOperator> {
        self.operators.clone()
    }
}

struct Neo4jInstance {
    state: adapter::ConnectionState,
    graph: Graph,
}

#[async_trait]
impl InstanceConnection for Neo4jInstance {
    fn id(&self) -> &str {
        &self.state.id
    }
    fn db_type(&self) -> DatabaseType {
        DatabaseType::Neo4j
    }
    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
    async fn ping(&self, _ctx: CancellationToken) -> Result<(), DatabaseError> {
        self.graph.run(query("RETURN 1")).await.map_err(|e| neo4j_error("ping", e))
    }
    fn close(&self) -> Result<(), DatabaseError> {
        self.state.close("close")
    }
    async fn list_databases(&self, _ctx: CancellationToken) -> Result<Vec<String>, DatabaseError> {
        let mut result = self.graph.execute(query("SHOW DATABASES YIELD name")).await.map_err(|e| neo4j_error("list_databases", e))?;
        let mut names = Vec::new();
        while let Ok(Some(row)) = result.next().await {
            if let Ok(name) = row.get::<String>("name") {
                names.push(name);
            }
        }
        Ok(names)
    }
    async fn create_database(&self, _ctx: CancellationToken, name: &str, _options: &AdminOptions) -> Result<(), DatabaseError> {
        self.graph
            .run(query(&format!("CREATE DATABASE `{name}` IF NOT EXISTS")))
            .await
            .map_err(|e| neo4j_error("create_database", e))
    }
    async fn drop_database(&self, _ctx: CancellationToken, name: &str, _options: &AdminOptions) -> Result<(), DatabaseError> {
        self.graph
            .run(query(&format!("DROP DATABASE `{name}` IF EXISTS")))
            .await
            .map_err(|e| neo4j_error("drop_database", e))
    }
}

struct Neo4jOperators {
    graph: Graph,
}

#[async_trait]
impl SchemaOperator for Neo4jOperators {
    async fn discover_schema(&self, ctx: CancellationToken) -> Result<UnifiedSchema, DatabaseError> {
        let mut schema = UnifiedSchema::new(DatabaseType::Neo4j);
        for label in self.list_tables(ctx).await? {
            if let Ok(table) = self.get_table_schema(CancellationToken::new(), &label).await {
                let mut node = UsmNode { name: table.name.clone(), ..Default::default() };
                for (name, column) in table.columns {
                    node.properties.insert(name.clone(), PropertyKey { name, data_type: column.data_type });
                }
                schema.insert_node(node);
            }
        }
        Ok(schema)
    }

    async fn create_structure(&self, _ctx: CancellationToken, schema: &UnifiedSchema) -> Result<(), DatabaseError> {
        for name in schema.nodes.keys() {
            self.graph
                .run(query(&format!("CREATE CONSTRAINT IF NOT EXISTS FOR (n:`{name}`) REQUIRE n.id IS UNIQUE")))
                .await
                .map_err(|e| neo4j_error("create_structure", e))?;
        }
        for relationship in schema.relationships.values() {
            self.graph
                .run(query(&format!(
                    "MERGE (:`{}`)-[:`{}`]->(:`{}`)",
                    relationship.from_node, relationship.name, relationship.to_node
                )))
                .await
                .ok();
        }
        Ok(())
    }

    async fn list_tables(&self, _ctx: CancellationToken) -> Result<Vec<String>, DatabaseError> {
        let mut result = self.graph.execute(query("CALL db.labels()")).await.map_err(|e| neo4j_error("list_tables", e))?;
        let mut labels = Vec::new();
        while let Ok(Some(row)) = result.next().await {
            if let Ok(label) = row.get::<String>("label") {
                labels.push(label);
            }
        }
        Ok(labels)
    }

    async fn get_table_schema(&self, _ctx: CancellationToken, name: &str) -> Result<Table, DatabaseError> {
        let mut result = self
            .graph
            .execute(query(&format!("MATCH (n:`{name}`) RETURN n LIMIT 1")))
            .await
            .map_err(|e| neo4j_error("get_table_schema", e))?;
        let mut table = Table { name: name.to_string(), ..Default::default() };
        if let Ok(Some(row)) = result.next().await {
            if let Ok(node) = row.get::<BoltNode>("n") {
                for (key, value) in bolt_node_to_row(&node) {
                    let data_type = match value {
                        serde_json::Value::Number(n) if n.is_i64() => "integer",
                        serde_json::Value::Number(_) => "float",
                        serde_json::Value::Bool(_) => "boolean",
                        _ => "string",
                    };
                    table.columns.insert(key.clone(), usm::Column { name: key, data_type: data_type.to_string(), nullable: true, ..Default::default() });
                }
            }
        }
        Ok(table)
    }
}

#[async_trait]
impl DataOperator for Neo4jOperators {
    async fn fetch(&self, _ctx: CancellationToken, target: &str, limit: u32) -> Result<Vec<Row>, DatabaseError> {
        let mut result = self
            .graph
            .execute(query(&format!("MATCH (n:`{target}`) RETURN n LIMIT $limit")).param("limit", limit as i64))
            .await
            .map_err(|e| neo4j_error("fetch", e))?;
        let mut rows = Vec::new();
        while let Ok(Some(row)) = result.next().await {
            if let Ok(node) = row.get::<BoltNode>("n") {
                rows.push(bolt_node_to_row(&node));
            }
        }
        Ok(rows)
    }

    async fn fetch_with_columns(&self, ctx: CancellationToken, target: &str, columns: &[String], limit: u32) -> Result<Vec<Row>, DatabaseError> {
        let rows = self.fetch(ctx, target, limit).await?;
        Ok(rows.into_iter().map(|row| row.into_iter().filter(|(k, _)| columns.iter().any(|c| c == k)).collect()).collect())
    }

    async fn insert(&self, _ctx: CancellationToken, target: &str, rows: &[Row]) -> Result<u64, DatabaseError> {
        let mut count = 0u64;
        for row in rows {
            let props: BTreeMap<String, serde_json::Value> = row.clone();
            let mut q = query(&format!("CREATE (n:`{target}`) SET n = $props"));
            q = q.param("props", serde_json::to_string(&props).unwrap_or_default());
            self.graph.run(q).await.map_err(|e| neo4j_error("insert", e))?;
            count += 1;
        }
        Ok(count)
    }

    async fn update(&self, _ctx: CancellationToken, target: &str, rows: &[Row], where_cols: &[String]) -> Result<u64, DatabaseError> {
        let mut count = 0u64;
        for row in rows {
            let predicate: Vec<String> = where_cols.iter().map(|c| format!("n.`{c}` = ${c}")).collect();
            if predicate.is_empty() {
                continue;
            }
            let mut q = query(&format!("MATCH (n:`{target}`) WHERE {} SET n += $row", predicate.join(" AND ")));
            for (key, value) in row {
                q = q.param(key, value.to_string());
            }
            q = q.param("row", serde_json::to_string(row).unwrap_or_default());
            self.graph.run(q).await.map_err(|e| neo4j_error("update", e))?;
            count += 1;
        }
        Ok(count)
    }

    async fn upsert(&self, _ctx: CancellationToken, target: &str, rows: &[Row], unique_cols: &[String]) -> Result<u64, DatabaseError> {
        let mut count = 0u64;
        for row in rows {
            let predicate: Vec<String> = unique_cols.iter().map(|c| format!("`{c}`: ${c}")).collect();
            let mut q = query(&format!("MERGE (n:`{target}` {{{}}}) SET n += $row", predicate.join(", ")));
            for key in unique_cols {
                if let Some(value) = row.get(key) {
                    q = q.param(key, value.to_string());
                }
            }
            q = q.param("row", serde_json::to_string(row).unwrap_or_default());
            self.graph.run(q).await.map_err(|e| neo4j_error("upsert", e))?;
            count += 1;
        }
        Ok(count)
    }

    async fn delete(&self, _ctx: CancellationToken, target: &str, conditions: &Row) -> Result<u64, DatabaseError> {
        if conditions.is_empty() {
            return Err(DatabaseError::invalid_data(DatabaseType::Neo4j, "delete", "delete requires at least one condition"));
        }
        let predicate: Vec<String> = conditions.keys().map(|c| format!("n.`{c}` = ${c}")).collect();
        let mut q = query(&format!("MATCH (n:`{target}`) WHERE {} DETACH DELETE n", predicate.join(" AND ")));
        for (key, value) in conditions {
            q = q.param(key, value.to_string());
        }
        self.graph.run(q).await.map_err(|e| neo4j_error("delete", e))?;
        Ok(1)
    }

    async fn stream(&self, _ctx: CancellationToken, params: StreamParams) -> Result<StreamPage, DatabaseError> {
        let skip: i64 = params.cursor.as_deref().and_then(|c| c.parse().ok()).unwrap_or(0);
        let mut result = self
            .graph
            .execute(
                query(&format!("MATCH (n:`{}`) RETURN n SKIP $skip LIMIT $limit", params.target))
                    .param("skip", skip)
                    .param("limit", params.batch_size as i64 + 1),
            )
            .await
            .map_err(|e| neo4j_error("stream", e))?;
        let mut rows = Vec::new();
        while let Ok(Some(row)) = result.next().await {
            if let Ok(node) = row.get::<BoltNode>("n") {
                rows.push(bolt_node_to_row(&node));
            }
        }
        let has_more = rows.len() as u32 > params.batch_size;
        rows.truncate(params.batch_size as usize);
        let next_cursor = has_more.then(|| (skip + params.batch_size as i64).to_string());
        Ok(StreamPage { rows, has_more, next_cursor })
    }

    async fn execute_query(&self, _ctx: CancellationToken, query_text: &str, _args: &[serde_json::Value]) -> Result<Vec<Row>, DatabaseError> {
        let mut result = self.graph.execute(query(query_text)).await.map_err(|e| neo4j_error("execute_query", e))?;
        let mut rows = Vec::new();
        while let Ok(Some(row)) = result.next().await {
            if let Ok(node) = row.get::<BoltNode>("n") {
                rows.push(bolt_node_to_row(&node));
            }
        }
        Ok(rows)
    }

    async fn execute_count_query(&self, _ctx: CancellationToken, query_text: &str) -> Result<i64, DatabaseError> {
        let mut result = self.graph.execute(query(query_text)).await.map_err(|e| neo4j_error("execute_count_query", e))?;
        if let Ok(Some(row)) = result.next().await {
            return Ok(row.get::<i64>("count").unwrap_or(0));
        }
        Ok(0)
    }

    async fn get_row_count(&self, _ctx: CancellationToken, target: &str, _where_clause: Option<&str>) -> Result<(i64, bool), DatabaseError> {
        let mut result = self
            .graph
            .execute(query(&format!("MATCH (n:`{target}`) RETURN count(n) AS count")))
            .await
            .map_err(|e| neo4j_error("get_row_count", e))?;
        let count = match result.next().await {
            Ok(Some(row)) => row.get::<i64>("count").unwrap_or(0),
            _ => 0,
        };
        Ok((count, true))
    }

    async fn wipe(&self, _ctx: CancellationToken) -> Result<(), DatabaseError> {
        self.graph.run(query("MATCH (n) DETACH DELETE n")).await.map_err(|e| neo4j_error("wipe", e))
    }
}

#[async_trait]
impl MetadataOperator for Neo4jOperators {
    async fn collect_database_metadata(&self, _ctx: CancellationToken) -> Result<BTreeMap<String, String>, DatabaseError> {
        Ok(BTreeMap::new())
    }
    async fn collect_instance_metadata(&self, _ctx: CancellationToken) -> Result<BTreeMap<String, String>, DatabaseError> {
        Ok(BTreeMap::new())
    }
    async fn get_version(&self, _ctx: CancellationToken) -> Result<String, DatabaseError> {
        let mut result = self
            .graph
            .execute(query("CALL dbms.components() YIELD versions RETURN versions[0] AS version"))
            .await
            .map_err(|e| neo4j_error("get_version", e))?;
        match result.next().await {
            Ok(Some(row)) => Ok(row.get::<String>("version").unwrap_or_else(|_| "unknown".to_string())),
            _ => Ok("unknown".to_string()),
        }
    }
    async fn get_unique_identifier(&self, _ctx: CancellationToken) -> Result<String, DatabaseError> {
        let mut result = self.graph.execute(query("CALL dbms.info() YIELD id RETURN id")).await.map_err(|e| neo4j_error("get_unique_identifier", e))?;
        match result.next().await {
            Ok(Some(row)) => Ok(row.get::<String>("id").unwrap_or_else(|_| "unknown".to_string())),
            _ => Ok("unknown".to_string()),
        }
    }
    async fn get_database_size(&self, _ctx: CancellationToken) -> Result<u64, DatabaseError> {
        Ok(0)
    }
    async fn get_table_count(&self, ctx: CancellationToken) -> Result<u64, DatabaseError> {
        Ok(self.list_tables(ctx).await?.len() as u64)
    }
    async fn execute_command(&self, _ctx: CancellationToken, cmd: &str) -> Result<Vec<u8>, DatabaseError> {
        let mut result = self.graph.execute(query(cmd)).await.map_err(|e| neo4j_error("execute_command", e))?;
        let mut rows = Vec::new();
        while let Ok(Some(row)) = result.next().await {
            if let Ok(node) = row.get::<BoltNode>("n") {
                rows.push(bolt_node_to_row(&node));
            }
        }
        serde_json::to_vec(&rows).map_err(|e| DatabaseError::wrap(DatabaseType::Neo4j, "execute_command", ErrorKind::Internal, e.into()))
    }
}

struct Neo4jReplication;

#[async_trait]
impl ReplicationOperator for Neo4jReplication {
    fn is_supported(&self) -> bool {
        false
    }
    fn capabilities(&self) -> Capability {
        capability::must_get(DatabaseType::Neo4j).clone()
    }
    fn get_supported_mechanisms(&self) -> Vec<&'static str> {
        Vec::new()
    }

    async fn check_prerequisites(&self, _ctx: CancellationToken) -> Result<(), CdcError> {
        Err(CdcError::Unsupported { source_id: "neo4j".into(), reason: "this engine has no change-capture mechanism".to_string() })
    }

    async fn connect(&self, _ctx: CancellationToken, config: ReplicationConfig, _handler: CdcEventHandler) -> Result<ReplicationSource, CdcError> {
        Err(CdcError::Unsupported { source_id: config.source_id, reason: "Neo4j CDC is not supported in this edition".to_string() })
    }

    async fn get_status(&self, source_id: &str) -> Result<ReplicationStatus, CdcError> {
        Err(CdcError::NotFound(source_id.to_string()))
    }

    async fn get_lag(&self, source_id: &str) -> Result<Option<u64>, CdcError> {
        Err(CdcError::NotFound(source_id.to_string()))
    }

    fn parse_event(&self, _raw: &[u8]) -> Result<ReplicationChange, CdcError> {
        Err(CdcError::Unsupported { source_id: "neo4j".into(), reason: "no event format to parse".to_string() })
    }

    fn apply_cdc_event(&self, _change: &ReplicationChange, _target: &mut Row) {}

    fn transform_data(&self, change: ReplicationChange) -> ReplicationChange {
        change
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replication_reports_unsupported_rather_than_a_polling_mechanism() {
        let replication = Neo4jReplication;
        assert!(!replication.is_supported());
        assert!(replication.get_supported_mechanisms().is_empty());
    }

    #[tokio::test]
    async fn check_prerequisites_fails_fast() {
        let replication = Neo4jReplication;
        let err = replication.check_prerequisites(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, CdcError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn connect_fails_fast_instead_of_approximating_cdc() {
        let replication = Neo4jReplication;
        let config = ReplicationConfig {
            source_id: "src-1".to_string(),
            target: "people".to_string(),
            poll_interval_secs: None,
            options: BTreeMap::new(),
        };
        let handler: CdcEventHandler = Arc::new(|_| {});
        let err = replication.connect(CancellationToken::new(), config, handler).await.unwrap_err();
        assert!(matches!(err, CdcError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn status_for_unknown_source_is_not_found() {
        let replication = Neo4jReplication;
        let err = replication.get_status("src-1").await.unwrap_err();
        assert!(matches!(err, CdcError::NotFound(_)));
    }
}
