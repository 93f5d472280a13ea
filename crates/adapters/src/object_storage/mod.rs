//! Object storage adapter (S3-compatible): "tables" are key prefixes,
//! "rows" are one JSON object per key. CDC is poll-diff over a prefix
//! listing (§4.3 "polling CDC/ObjectStorage") since this workspace does not
//! wire up S3 event notifications (SNS/SQS) as a push source.

use adapter::config::{AdminOptions, ConnectionConfig, InstanceConfig, StreamPage, StreamParams};
use adapter::{
    CdcEventHandler, Connection, DataOperator, DatabaseAdapter, InstanceConnection, MetadataOperator,
    ReplicationChange, ReplicationConfig, ReplicationOperator, ReplicationSource, ReplicationStatus, Row,
    SchemaOperator,
};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use capability::{Capability, DatabaseType};
use db_errors::{CdcError, DatabaseError, ErrorKind};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use usm::{Collection, Field, Table, UnifiedSchema};

fn key_for(prefix: &str, row_id: &str) -> String {
    format!("{prefix}/{row_id}.json")
}

fn row_id(row: &Row) -> String {
    row.get("id").map(|v| v.to_string().trim_matches('"').to_string()).unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn s3_error(op: &'static str, err: impl std::error::Error + Send + Sync + 'static) -> DatabaseError {
    DatabaseError::wrap(DatabaseType::ObjectStorage, op, ErrorKind::Internal, err.into())
}

pub struct ObjectStorageAdapter;

#[async_trait]
impl DatabaseAdapter for ObjectStorageAdapter {
    fn db_type(&self) -> DatabaseType {
        DatabaseType::ObjectStorage
    }

    fn capabilities(&self) -> Capability {
        capability::must_get(DatabaseType::ObjectStorage).clone()
    }

    async fn connect(&self, _ctx: CancellationToken, config: ConnectionConfig) -> Result<Arc<dyn Connection>, DatabaseError> {
        let shared_config = aws_config::load_from_env().await;
        let client = S3Client::new(&shared_config);
        let bucket = config.extra.get("bucket").cloned().unwrap_or_else(|| config.database_name.clone());
        Ok(Arc::new(ObjectStorageConnection::new(config.database_id, client, bucket)))
    }

    async fn connect_instance(&self, _ctx: CancellationToken, config: InstanceConfig) -> Result<Arc<dyn InstanceConnection>, DatabaseError> {
        let shared_config = aws_config::load_from_env().await;
        let client = S3Client::new(&shared_config);
        Ok(Arc::new(ObjectStorageInstance {
            state: adapter::ConnectionState::new(config.instance_id, DatabaseType::ObjectStorage),
            client,
        }))
    }
}

struct ObjectStorageConnection {
    state: adapter::ConnectionState,
    operators: Arc<ObjectStorageOperators>,
    replication: Arc<ObjectStorageReplication>,
}

impl ObjectStorageConnection {
    fn new(id: String, client: S3Client, bucket: String) -> Self {
        let operators = Arc::new(ObjectStorageOperators { client: client.clone(), bucket: bucket.clone() });
        let replication = Arc::new(ObjectStorageReplication { client, bucket, sources: cdc::SourceRegistry::new() });
        Self { state: adapter::ConnectionState::new(id, DatabaseType::ObjectStorage), operators, replication }
    }
}

#[async_trait]
impl Connection for ObjectStorageConnection {
    fn id(&self) -> &str {
        &self.state.id
    }
    fn db_type(&self) -> DatabaseType {
        DatabaseType::ObjectStorage
    }
    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
    async fn ping(&self, _ctx: CancellationToken) -> Result<(), DatabaseError> {
        self.operators.client.head_bucket().bucket(&self.operators.bucket).send().await.map(|_| ()).map_err(|e| s3_error("ping", e))
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

struct ObjectStorageInstance {
    state: adapter::ConnectionState,
    client: S3Client,
}

#[async_trait]
impl InstanceConnection for ObjectStorageInstance {
    fn id(&self) -> &str {
        &self.state.id
    }
    fn db_type(&self) -> DatabaseType {
        DatabaseType::ObjectStorage
    }
    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
    async fn ping(&self, _ctx: CancellationToken) -> Result<(), DatabaseError> {
        self.client.list_buckets().send().await.map(|_| ()).map_err(|e| s3_error("ping", e))
    }
    fn close(&self) -> Result<(), DatabaseError> {
        self.state.close("close")
    }
    async fn list_databases(&self, _ctx: CancellationToken) -> Result<Vec<String>, DatabaseError> {
        let output = self.client.list_buckets().send().await.map_err(|e| s3_error("list_databases", e))?;
        Ok(output.buckets().iter().filter_map(|b| b.name().map(String::from)).collect())
    }
    async fn create_database(&self, _ctx: CancellationToken, name: &str, _options: &AdminOptions) -> Result<(), DatabaseError> {
        self.client.create_bucket().bucket(name).send().await.map(|_| ()).map_err(|e| s3_error("create_database", e))
    }
    async fn drop_database(&self, _ctx: CancellationToken, name: &str, _options: &AdminOptions) -> Result<(), DatabaseError> {
        self.client.delete_bucket().bucket(name).send().await.map(|_| ()).map_err(|e| s3_error("drop_database", e))
    }
}

struct ObjectStorageOperators {
    client: S3Client,
    bucket: String,
}

impl ObjectStorageOperators {
    async fn get_object_json(&self, key: &str) -> Result<Option<Row>, DatabaseError> {
        match self.client.get_object().bucket(&self.bucket).key(key).send().await {
            Ok(output) => {
                let bytes = output.body.collect().await.map_err(|e| s3_error("fetch", e))?.into_bytes();
                serde_json::from_slice(&bytes).map(Some).map_err(|e| DatabaseError::wrap(DatabaseType::ObjectStorage, "fetch", ErrorKind::Internal, e.into()))
            }
            Err(aws_sdk_s3::error::SdkError::ServiceError(e)) if e.err().is_no_such_key() => Ok(None),
            Err(e) => Err(s3_error("fetch", e)),
        }
    }
}

#[async_trait]
impl SchemaOperator for ObjectStorageOperators {
    async fn discover_schema(&self, ctx: CancellationToken) -> Result<UnifiedSchema, DatabaseError> {
        let mut schema = UnifiedSchema::new(DatabaseType::ObjectStorage);
        for prefix in self.list_tables(ctx).await? {
            schema.insert_collection(Collection { name: prefix, ..Default::default() });
        }
        Ok(schema)
    }

    async fn create_structure(&self, _ctx: CancellationToken, _schema: &UnifiedSchema) -> Result<(), DatabaseError> {
        // Prefixes have no independent existence in S3; they materialize on
        // first PutObject, so there is nothing to create up front.
        Ok(())
    }

    async fn list_tables(&self, _ctx: CancellationToken) -> Result<Vec<String>, DatabaseError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .delimiter("/")
            .send()
            .await
            .map_err(|e| s3_error("list_tables", e))?;
        Ok(output.common_prefixes().iter().filter_map(|p| p.prefix().map(|s| s.trim_end_matches('/').to_string())).collect())
    }

    async fn get_table_schema(&self, _ctx: CancellationToken, name: &str) -> Result<Table, DatabaseError> {
        let mut table = Table { name: name.to_string(), ..Default::default() };
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(format!("{name}/"))
            .max_keys(1)
            .send()
            .await
            .map_err(|e| s3_error("get_table_schema", e))?;
        if let Some(object) = output.contents().first() {
            if let Some(row) = self.get_object_json(object.key().unwrap_or_default()).await? {
                for (key, _) in row {
                    table.columns.insert(key.clone(), usm::Column { name: key, data_type: "string".to_string(), nullable: true, ..Default::default() });
                }
            }
        }
        Ok(table)
    }
}

#[async_trait]
impl DataOperator for ObjectStorageOperators {
    async fn fetch(&self, _ctx: CancellationToken, target: &str, limit: u32) -> Result<Vec<Row>, DatabaseError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(format!("{target}/"))
            .max_keys(limit as i32)
            .send()
            .await
            .map_err(|e| s3_error("fetch", e))?;
        let mut rows = Vec::new();
        for object in output.contents() {
            if let Some(key) = object.key() {
                if let Some(row) = self.get_object_json(key).await? {
                    rows.push(row);
                }
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
            let id = row_id(row);
            let body = serde_json::to_vec(row).map_err(|e| DatabaseError::wrap(DatabaseType::ObjectStorage, "insert", ErrorKind::Internal, e.into()))?;
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key_for(target, &id))
                .body(ByteStream::from(body))
                .send()
                .await
                .map_err(|e| s3_error("insert", e))?;
            count += 1;
        }
        Ok(count)
    }

    async fn update(&self, ctx: CancellationToken, target: &str, rows: &[Row], _where_cols: &[String]) -> Result<u64, DatabaseError> {
        // Objects are content-addressed by id; "update" is a full overwrite
        // of the object at that key, identical to insert.
        self.insert(ctx, target, rows).await
    }

    async fn upsert(&self, ctx: CancellationToken, target: &str, rows: &[Row], _unique_cols: &[String]) -> Result<u64, DatabaseError> {
        self.insert(ctx, target, rows).await
    }

    async fn delete(&self, _ctx: CancellationToken, target: &str, conditions: &Row) -> Result<u64, DatabaseError> {
        if conditions.is_empty() {
            return Err(DatabaseError::invalid_data(DatabaseType::ObjectStorage, "delete", "delete requires at least one condition"));
        }
        let id = conditions.get("id").map(|v| v.to_string().trim_matches('"').to_string()).ok_or_else(|| {
            DatabaseError::invalid_data(DatabaseType::ObjectStorage, "delete", "delete requires an 'id' condition for object storage")
        })?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key_for(target, &id))
            .send()
            .await
            .map_err(|e| s3_error("delete", e))?;
        Ok(1)
    }

    async fn stream(&self, _ctx: CancellationToken, params: StreamParams) -> Result<StreamPage, DatabaseError> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(format!("{}/", params.target))
            .max_keys(params.batch_size as i32);
        if let Some(cursor) = &params.cursor {
            request = request.continuation_token(cursor);
        }
        let output = request.send().await.map_err(|e| s3_error("stream", e))?;
        let mut rows = Vec::new();
        for object in output.contents() {
            if let Some(key) = object.key() {
                if let Some(row) = self.get_object_json(key).await? {
                    rows.push(row);
                }
            }
        }
        Ok(StreamPage {
            rows,
            has_more: output.is_truncated().unwrap_or(false),
            next_cursor: output.next_continuation_token().map(String::from),
        })
    }

    async fn execute_query(&self, _ctx: CancellationToken, _query: &str, _args: &[serde_json::Value]) -> Result<Vec<Row>, DatabaseError> {
        Err(DatabaseError::unsupported(DatabaseType::ObjectStorage, "execute_query", "object storage has no query language"))
    }

    async fn execute_count_query(&self, _ctx: CancellationToken, _query: &str) -> Result<i64, DatabaseError> {
        Err(DatabaseError::unsupported(DatabaseType::ObjectStorage, "execute_count_query", "object storage has no query language"))
    }

    async fn get_row_count(&self, _ctx: CancellationToken, target: &str, _where_clause: Option<&str>) -> Result<(i64, bool), DatabaseError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(format!("{target}/"))
            .send()
            .await
            .map_err(|e| s3_error("get_row_count", e))?;
        Ok((output.contents().len() as i64, !output.is_truncated().unwrap_or(false)))
    }

    async fn wipe(&self, _ctx: CancellationToken) -> Result<(), DatabaseError> {
        let output = self.client.list_objects_v2().bucket(&self.bucket).send().await.map_err(|e| s3_error("wipe", e))?;
        for object in output.contents() {
            if let Some(key) = object.key() {
                self.client.delete_object().bucket(&self.bucket).key(key).send().await.map_err(|e| s3_error("wipe", e))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataOperator for ObjectStorageOperators {
    async fn collect_database_metadata(&self, _ctx: CancellationToken) -> Result<BTreeMap<String, String>, DatabaseError> {
        let mut meta = BTreeMap::new();
        meta.insert("bucket".to_string(), self.bucket.clone());
        Ok(meta)
    }
    async fn collect_instance_metadata(&self, _ctx: CancellationToken) -> Result<BTreeMap<String, String>, DatabaseError> {
        Ok(BTreeMap::new())
    }
    async fn get_version(&self, _ctx: CancellationToken) -> Result<String, DatabaseError> {
        Ok("s3-compatible".to_string())
    }
    async fn get_unique_identifier(&self, _ctx: CancellationToken) -> Result<String, DatabaseError> {
        Ok(self.bucket.clone())
    }
    async fn get_database_size(&self, _ctx: CancellationToken) -> Result<u64, DatabaseError> {
        let output = self.client.list_objects_v2().bucket(&self.bucket).send().await.map_err(|e| s3_error("get_database_size", e))?;
        Ok(output.contents().iter().map(|o| o.size().unwrap_or(0) as u64).sum())
    }
    async fn get_table_count(&self, ctx: CancellationToken) -> Result<u64, DatabaseError> {
        Ok(self.list_tables(ctx).await?.len() as u64)
    }
    async fn execute_command(&self, _ctx: CancellationToken, _cmd: &str) -> Result<Vec<u8>, DatabaseError> {
        Err(DatabaseError::unsupported(DatabaseType::ObjectStorage, "execute_command", "object storage has no admin command surface"))
    }
}

struct ObjectStorageReplication {
    client: S3Client,
    bucket: String,
    sources: cdc::SourceRegistry,
}

#[async_trait]
impl ReplicationOperator for ObjectStorageReplication {
    fn is_supported(&self) -> bool {
        true
    }
    fn capabilities(&self) -> Capability {
        capability::must_get(DatabaseType::ObjectStorage).clone()
    }
    fn get_supported_mechanisms(&self) -> Vec<&'static str> {
        vec!["polling", "event-stream"]
    }

    async fn check_prerequisites(&self, _ctx: CancellationToken) -> Result<(), CdcError> {
        Ok(())
    }

    async fn connect(&self, _ctx: CancellationToken, config: ReplicationConfig, handler: CdcEventHandler) -> Result<ReplicationSource, CdcError> {
        let state = cdc::SourceState::new(config.source_id.clone(), true);
        self.sources.register(state.clone());
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let prefix = config.target.clone();
        let source_id = config.source_id.clone();
        let poll_interval = std::time::Duration::from_secs(config.poll_interval_secs.unwrap_or(30));
        let differ = Arc::new(Mutex::new(cdc::PollingDiffer::new(config.source_id.clone(), prefix.clone())));

        cdc::spawn_poll_loop(state.clone(), handler, poll_interval, move || {
            let client = client.clone();
            let bucket = bucket.clone();
            let prefix = prefix.clone();
            let source_id = source_id.clone();
            let differ = differ.clone();
            tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(async move {
                    let output = client
                        .list_objects_v2()
                        .bucket(&bucket)
                        .prefix(format!("{prefix}/"))
                        .send()
                        .await
                        .map_err(|e| CdcError::Transient { source_id: source_id.clone(), cause: e.into() })?;

                    let mut snapshot = BTreeMap::new();
                    for object in output.contents() {
                        let Some(key) = object.key() else { continue };
                        let mut row = Row::new();
                        row.insert("key".to_string(), serde_json::Value::String(key.to_string()));
                        row.insert("etag".to_string(), serde_json::Value::String(object.e_tag().unwrap_or_default().to_string()));
                        row.insert("size".to_string(), serde_json::Value::Number(object.size().unwrap_or(0).into()));
                        snapshot.insert(key.to_string(), row);
                    }

                    Ok::<Vec<ReplicationChange>, CdcError>(differ.lock().unwrap().diff(snapshot))
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
        serde_json::from_slice(raw).map_err(|e| CdcError::Fatal { source_id: "object_storage".into(), cause: e.into() })
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
    use serde_json::json;

    #[test]
    fn key_for_nests_row_under_the_prefix_as_json() {
        assert_eq!(key_for("users", "42"), "users/42.json");
    }

    #[test]
    fn row_id_uses_the_id_field_when_present() {
        let mut row = Row::new();
        row.insert("id".into(), json!("abc-1"));
        assert_eq!(row_id(&row), "abc-1");
    }

    #[test]
    fn row_id_generates_a_uuid_when_missing() {
        let row = Row::new();
        let id = row_id(&row);
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }
}

