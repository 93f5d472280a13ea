//! MongoDB adapter: schema/data/metadata through the official `mongodb`
//! driver, CDC through native change streams (§4.3 "event-stream CDC/
//! MongoDb") rather than the poll-diff fallback used where no push
//! mechanism exists.

use adapter::config::{AdminOptions, ConnectionConfig, InstanceConfig, StreamPage, StreamParams};
use adapter::{
    CdcEventHandler, ChangeOperation, Connection, DataOperator, DatabaseAdapter, InstanceConnection,
    MetadataOperator, ReplicationChange, ReplicationConfig, ReplicationOperator, ReplicationSource,
    ReplicationStatus, Row, SchemaOperator,
};
use async_trait::async_trait;
use bson::{doc, Document};
use capability::{Capability, DatabaseType};
use db_errors::{CdcError, DatabaseError, ErrorKind};
use futures_util::stream::TryStreamExt;
use mongodb::change_stream::event::OperationType;
use mongodb::options::{ClientOptions, FindOptions, UpdateOptions};
use mongodb::{Client, Collection, Database};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use usm::{Collection as UsmCollection, Field, Table, UnifiedSchema};

fn row_to_document(row: &Row) -> Document {
    let mut doc = Document::new();
    for (key, value) in row {
        if let Ok(bson_value) = bson::to_bson(value) {
            doc.insert(key.clone(), bson_value);
        }
    }
    doc
}

fn document_to_row(doc: &Document) -> Row {
    doc.iter()
        .map(|(key, value)| (key.clone(), serde_json::to_value(value).unwrap_or(serde_json::Value::Null)))
        .collect()
}

fn mongo_error(op: &'static str, err: mongodb::error::Error) -> DatabaseError {
    DatabaseError::wrap(DatabaseType::MongoDb, op, ErrorKind::Internal, err.into())
}

pub struct MongoAdapter;

#[async_trait]
impl DatabaseAdapter for MongoAdapter {
    fn db_type(&self) -> DatabaseType {
        DatabaseType::MongoDb
    }

    fn capabilities(&self) -> Capability {
        capability::must_get(DatabaseType::MongoDb).clone()
    }

    async fn connect(&self, _ctx: CancellationToken, config: ConnectionConfig) -> Result<Arc<dyn Connection>, DatabaseError> {
        let url = config.connection_string.clone().unwrap_or_else(|| {
            format!("mongodb://{}:{}@{}:{}", config.username, config.password, config.host, config.port)
        });
        let options = ClientOptions::parse(&url)
            .await
            .map_err(|e| DatabaseError::wrap(DatabaseType::MongoDb, "connect", ErrorKind::Connection, e.into()))?;
        let client = Client::with_options(options)
            .map_err(|e| DatabaseError::wrap(DatabaseType::MongoDb, "connect", ErrorKind::Connection, e.into()))?;
        let db = client.database(&config.database_name);
        Ok(Arc::new(MongoConnection::new(config.database_id, client, db)))
    }

    async fn connect_instance(&self, _ctx: CancellationToken, config: InstanceConfig) -> Result<Arc<dyn InstanceConnection>, DatabaseError> {
        let url = config
            .connection_string
            .clone()
            .unwrap_or_else(|| format!("mongodb://{}:{}@{}:{}", config.username, config.password, config.host, config.port));
        let options = ClientOptions::parse(&url)
            .await
            .map_err(|e| DatabaseError::wrap(DatabaseType::MongoDb, "connect_instance", ErrorKind::Connection, e.into()))?;
        let client = Client::with_options(options)
            .map_err(|e| DatabaseError::wrap(DatabaseType::MongoDb, "connect_instance", ErrorKind::Connection, e.into()))?;
        Ok(Arc::new(MongoInstance {
            state: adapter::ConnectionState::new(config.instance_id, DatabaseType::MongoDb),
            client,
        }))
    }
}

struct MongoConnection {
    state: adapter::ConnectionState,
    operators: Arc<MongoOperators>,
    replication: Arc<MongoReplication>,
}

impl MongoConnection {
    fn new(id: String, client: Client, db: Database) -> Self {
        let operators = Arc::new(MongoOperators { db: db.clone() });
        let replication = Arc::new(MongoReplication { db, sources: cdc::SourceRegistry::new() });
        let _ = client;
        Self { state: adapter::ConnectionState::new(id, DatabaseType::MongoDb), operators, replication }
    }
}

#[async_trait]
impl Connection for MongoConnection {
    fn id(&self) -> &str {
        &self.state.id
    }
    fn db_type(&self) -> DatabaseType {
        DatabaseType::MongoDb
    }
    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
    async fn ping(&self, _ctx: CancellationToken) -> Result<(), DatabaseError> {
        self.operators.db.run_command(doc! {"ping": 1}, None).await.map(|_| ()).map_err(|e| mongo_error("ping", e))
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

struct MongoInstance {
    state: adapter::ConnectionState,
    client: Client,
}

#[async_trait]
impl InstanceConnection for MongoInstance {
    fn id(&self) -> &str {
        &self.state.id
    }
    fn db_type(&self) -> DatabaseType {
        DatabaseType::MongoDb
    }
    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
    async fn ping(&self, _ctx: CancellationToken) -> Result<(), DatabaseError> {
        self.client.database("admin").run_command(doc! {"ping": 1}, None).await.map(|_| ()).map_err(|e| mongo_error("ping", e))
    }
    fn close(&self) -> Result<(), DatabaseError> {
        self.state.close("close")
    }
    async fn list_databases(&self, _ctx: CancellationToken) -> Result<Vec<String>, DatabaseError> {
        self.client.list_database_names(None, None).await.map_err(|e| mongo_error("list_databases", e))
    }
    async fn create_database(&self, _ctx: CancellationToken, name: &str, _options: &AdminOptions) -> Result<(), DatabaseError> {
        // Mongo creates databases lazily on first write; materialize it with a
        // throwaway collection so `list_databases` sees it immediately.
        self.client
            .database(name)
            .create_collection("_flowcore_init", None)
            .await
            .map(|_| ())
            .map_err(|e| mongo_error("create_database", e))
    }
    async fn drop_database(&self, _ctx: CancellationToken, name: &str, _options: &AdminOptions) -> Result<(), DatabaseError> {
        self.client.database(name).drop(None).await.map_err(|e| mongo_error("drop_database", e))
    }
}

struct MongoOperators {
    db: Database,
}

#[async_trait]
impl SchemaOperator for MongoOperators {
    async fn discover_schema(&self, ctx: CancellationToken) -> Result<UnifiedSchema, DatabaseError> {
        let mut schema = UnifiedSchema::new(DatabaseType::MongoDb);
        for name in self.list_tables(ctx).await? {
            if let Ok(table) = self.get_table_schema(CancellationToken::new(), &name).await {
                let mut collection = UsmCollection { name: table.name.clone(), ..Default::default() };
                for (field_name, column) in table.columns {
                    collection.fields.insert(field_name.clone(), Field { name: field_name, data_type: column.data_type, nullable: true, is_array: false });
                }
                schema.insert_collection(collection);
            }
        }
        Ok(schema)
    }

    async fn create_structure(&self, _ctx: CancellationToken, schema: &UnifiedSchema) -> Result<(), DatabaseError> {
        for name in schema.collections.keys() {
            match self.db.create_collection(name, None).await {
                Ok(()) => {}
                Err(e) if e.to_string().contains("already exists") => {}
                Err(e) => return Err(mongo_error("create_structure", e)),
            }
        }
        Ok(())
    }

    async fn list_tables(&self, _ctx: CancellationToken) -> Result<Vec<String>, DatabaseError> {
        self.db.list_collection_names(None).await.map_err(|e| mongo_error("list_tables", e))
    }

    async fn get_table_schema(&self, _ctx: CancellationToken, name: &str) -> Result<Table, DatabaseError> {
        let collection: Collection<Document> = self.db.collection(name);
        let sample = collection.find_one(None, None).await.map_err(|e| mongo_error("get_table_schema", e))?;
        let mut table = Table { name: name.to_string(), ..Default::default() };
        if let Some(doc) = sample {
            for (key, value) in document_to_row(&doc) {
                let data_type = match value {
                    serde_json::Value::Number(n) if n.is_i64() => "long",
                    serde_json::Value::Number(_) => "double",
                    serde_json::Value::Bool(_) => "bool",
                    serde_json::Value::Array(_) => "array",
                    serde_json::Value::Object(_) => "object",
                    _ => "string",
                };
                table.columns.insert(
                    key.clone(),
                    usm::Column { name: key, data_type: data_type.to_string(), nullable: true, ..Default::default() },
                );
            }
        }
        Ok(table)
    }
}

#[async_trait]
impl DataOperator for MongoOperators {
    async fn fetch(&self, _ctx: CancellationToken, target: &str, limit: u32) -> Result<Vec<Row>, DatabaseError> {
        let collection: Collection<Document> = self.db.collection(target);
        let options = FindOptions::builder().limit(limit as i64).build();
        let mut cursor = collection.find(None, options).await.map_err(|e| mongo_error("fetch", e))?;
        let mut rows = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(|e| mongo_error("fetch", e))? {
            rows.push(document_to_row(&doc));
        }
        Ok(rows)
    }

    async fn fetch_with_columns(&self, ctx: CancellationToken, target: &str, columns: &[String], limit: u32) -> Result<Vec<Row>, DatabaseError> {
        let rows = self.fetch(ctx, target, limit).await?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().filter(|(key, _)| columns.iter().any(|c| c == key)).collect())
            .collect())
    }

    async fn insert(&self, _ctx: CancellationToken, target: &str, rows: &[Row]) -> Result<u64, DatabaseError> {
        let collection: Collection<Document> = self.db.collection(target);
        let docs: Vec<Document> = rows.iter().map(row_to_document).collect();
        if docs.is_empty() {
            return Ok(0);
        }
        let result = collection.insert_many(docs, None).await.map_err(|e| mongo_error("insert", e))?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn update(&self, _ctx: CancellationToken, target: &str, rows: &[Row], where_cols: &[String]) -> Result<u64, DatabaseError> {
        let collection: Collection<Document> = self.db.collection(target);
        let mut total = 0u64;
        for row in rows {
            let filter: Document = row.iter().filter(|(k, _)| where_cols.iter().any(|w| &w == k)).map(|(k, v)| (k.clone(), bson::to_bson(v).unwrap_or(bson::Bson::Null))).collect();
            let set: Document = row.iter().filter(|(k, _)| !where_cols.iter().any(|w| &w == k)).map(|(k, v)| (k.clone(), bson::to_bson(v).unwrap_or(bson::Bson::Null))).collect();
            let result = collection.update_many(filter, doc! {"$set": set}, None).await.map_err(|e| mongo_error("update", e))?;
            total += result.modified_count;
        }
        Ok(total)
    }

    async fn upsert(&self, _ctx: CancellationToken, target: &str, rows: &[Row], unique_cols: &[String]) -> Result<u64, DatabaseError> {
        let collection: Collection<Document> = self.db.collection(target);
        let options = UpdateOptions::builder().upsert(true).build();
        let mut total = 0u64;
        for row in rows {
            let filter: Document = row.iter().filter(|(k, _)| unique_cols.iter().any(|u| &u == k)).map(|(k, v)| (k.clone(), bson::to_bson(v).unwrap_or(bson::Bson::Null))).collect();
            let set = row_to_document(row);
            let result = collection
                .update_one(filter, doc! {"$set": set}, options.clone())
                .await
                .map_err(|e| mongo_error("upsert", e))?;
            total += result.modified_count + result.upserted_id.map_or(0, |_| 1);
        }
        Ok(total)
    }

    async fn delete(&self, _ctx: CancellationToken, target: &str, conditions: &Row) -> Result<u64, DatabaseError> {
        if conditions.is_empty() {
            return Err(DatabaseError::invalid_data(DatabaseType::MongoDb, "delete", "delete requires at least one condition"));
        }
        let collection: Collection<Document> = self.db.collection(target);
        let filter = row_to_document(conditions);
        let result = collection.delete_many(filter, None).await.map_err(|e| mongo_error("delete", e))?;
        Ok(result.deleted_count)
    }

    async fn stream(&self, _ctx: CancellationToken, params: StreamParams) -> Result<StreamPage, DatabaseError> {
        let collection: Collection<Document> = self.db.collection(&params.target);
        let skip: u64 = params.cursor.as_deref().and_then(|c| c.parse().ok()).unwrap_or(0);
        let options = FindOptions::builder().skip(skip).limit(params.batch_size as i64 + 1).build();
        let mut cursor = collection.find(None, options).await.map_err(|e| mongo_error("stream", e))?;
        let mut rows = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(|e| mongo_error("stream", e))? {
            rows.push(document_to_row(&doc));
        }
        let has_more = rows.len() as u32 > params.batch_size;
        rows.truncate(params.batch_size as usize);
        let next_cursor = has_more.then(|| (skip + params.batch_size as u64).to_string());
        Ok(StreamPage { rows, has_more, next_cursor })
    }

    async fn execute_query(&self, _ctx: CancellationToken, query: &str, _args: &[serde_json::Value]) -> Result<Vec<Row>, DatabaseError> {
        let command: Document = serde_json::from_str::<serde_json::Value>(query)
            .ok()
            .and_then(|v| bson::to_document(&v).ok())
            .ok_or_else(|| DatabaseError::invalid_data(DatabaseType::MongoDb, "execute_query", "query must be a JSON command document"))?;
        let result = self.db.run_command(command, None).await.map_err(|e| mongo_error("execute_query", e))?;
        Ok(vec![document_to_row(&result)])
    }

    async fn execute_count_query(&self, _ctx: CancellationToken, query: &str) -> Result<i64, DatabaseError> {
        let filter: Document = serde_json::from_str::<serde_json::Value>(query)
            .ok()
            .and_then(|v| bson::to_document(&v).ok())
            .unwrap_or_default();
        let name = filter.get_str("_collection").unwrap_or_default().to_string();
        let collection: Collection<Document> = self.db.collection(&name);
        collection.count_documents(None, None).await.map(|c| c as i64).map_err(|e| mongo_error("execute_count_query", e))
    }

    async fn get_row_count(&self, _ctx: CancellationToken, target: &str, _where_clause: Option<&str>) -> Result<(i64, bool), DatabaseError> {
        let collection: Collection<Document> = self.db.collection(target);
        let count = collection.estimated_document_count(None).await.map_err(|e| mongo_error("get_row_count", e))?;
        Ok((count as i64, true))
    }

    async fn wipe(&self, _ctx: CancellationToken) -> Result<(), DatabaseError> {
        for name in self.db.list_collection_names(None).await.map_err(|e| mongo_error("wipe", e))? {
            let collection: Collection<Document> = self.db.collection(&name);
            collection.delete_many(doc! {}, None).await.map_err(|e| mongo_error("wipe", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataOperator for MongoOperators {
    async fn collect_database_metadata(&self, _ctx: CancellationToken) -> Result<BTreeMap<String, String>, DatabaseError> {
        let stats = self.db.run_command(doc! {"dbStats": 1}, None).await.map_err(|e| mongo_error("collect_database_metadata", e))?;
        Ok(document_to_row(&stats).into_iter().map(|(k, v)| (k, v.to_string())).collect())
    }

    async fn collect_instance_metadata(&self, _ctx: CancellationToken) -> Result<BTreeMap<String, String>, DatabaseError> {
        let status = self.db.run_command(doc! {"serverStatus": 1}, None).await.map_err(|e| mongo_error("collect_instance_metadata", e))?;
        Ok(document_to_row(&status).into_iter().map(|(k, v)| (k, v.to_string())).collect())
    }

    async fn get_version(&self, _ctx: CancellationToken) -> Result<String, DatabaseError> {
        let info = self.db.run_command(doc! {"buildInfo": 1}, None).await.map_err(|e| mongo_error("get_version", e))?;
        Ok(info.get_str("version").unwrap_or("unknown").to_string())
    }

    async fn get_unique_identifier(&self, _ctx: CancellationToken) -> Result<String, DatabaseError> {
        let status = self.db.run_command(doc! {"serverStatus": 1}, None).await.map_err(|e| mongo_error("get_unique_identifier", e))?;
        Ok(status.get_str("host").unwrap_or("unknown").to_string())
    }

    async fn get_database_size(&self, _ctx: CancellationToken) -> Result<u64, DatabaseError> {
        let stats = self.db.run_command(doc! {"dbStats": 1}, None).await.map_err(|e| mongo_error("get_database_size", e))?;
        Ok(stats.get_f64("dataSize").unwrap_or(0.0) as u64)
    }

    async fn get_table_count(&self, _ctx: CancellationToken) -> Result<u64, DatabaseError> {
        Ok(self.db.list_collection_names(None).await.map_err(|e| mongo_error("get_table_count", e))?.len() as u64)
    }

    async fn execute_command(&self, _ctx: CancellationToken, cmd: &str) -> Result<Vec<u8>, DatabaseError> {
        let command: Document = serde_json::from_str::<serde_json::Value>(cmd)
            .ok()
            .and_then(|v| bson::to_document(&v).ok())
            .ok_or_else(|| DatabaseError::invalid_data(DatabaseType::MongoDb, "execute_command", "command must be a JSON document"))?;
        let result = self.db.run_command(command, None).await.map_err(|e| mongo_error("execute_command", e))?;
        serde_json::to_vec(&document_to_row(&result)).map_err(|e| DatabaseError::wrap(DatabaseType::MongoDb, "execute_command", ErrorKind::Internal, e.into()))
    }
}

struct MongoReplication {
    db: Database,
    sources: cdc::SourceRegistry,
}

#[async_trait]
impl ReplicationOperator for MongoReplication {
    fn is_supported(&self) -> bool {
        true
    }
    fn capabilities(&self) -> Capability {
        capability::must_get(DatabaseType::MongoDb).clone()
    }
    fn get_supported_mechanisms(&self) -> Vec<&'static str> {
        vec!["event-stream"]
    }

    async fn check_prerequisites(&self, _ctx: CancellationToken) -> Result<(), CdcError> {
        // Change streams require a replica set or sharded cluster; a
        // standalone `hello` response with no `setName` means they're
        // unavailable.
        let hello = self
            .db
            .run_command(doc! {"hello": 1}, None)
            .await
            .map_err(|e| CdcError::Transient { source_id: "mongodb".into(), cause: e.into() })?;
        if hello.get_str("setName").is_err() {
            return Err(CdcError::PrerequisiteNotMet {
                source_id: "mongodb".into(),
                reason: "change streams require a replica set; this deployment is standalone".to_string(),
            });
        }
        Ok(())
    }

    async fn connect(&self, _ctx: CancellationToken, config: ReplicationConfig, handler: CdcEventHandler) -> Result<ReplicationSource, CdcError> {
        let collection: Collection<Document> = self.db.collection(&config.target);
        let mut cursor = collection
            .watch(None, None)
            .await
            .map_err(|e| CdcError::PrerequisiteNotMet { source_id: config.source_id.clone(), reason: e.to_string() })?;

        let state = cdc::SourceState::new(config.source_id.clone(), false);
        self.sources.register(state.clone());
        let poll_interval = std::time::Duration::from_millis(250);
        let source_id = config.source_id.clone();
        let target = config.target.clone();

        cdc::spawn_poll_loop(state.clone(), handler, poll_interval, move || {
            let source_id = source_id.clone();
            let target = target.clone();
            tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(async {
                    let mut changes = Vec::new();
                    while let Some(event) = cursor
                        .try_next()
                        .await
                        .map_err(|e| CdcError::Transient { source_id: source_id.clone(), cause: e.into() })?
                    {
                        let operation = match event.operation_type {
                            OperationType::Insert => ChangeOperation::Insert,
                            OperationType::Delete => ChangeOperation::Delete,
                            _ => ChangeOperation::Update,
                        };
                        let data = event.full_document.map(|doc| document_to_row(&doc));
                        let position = format!("{:?}", event.id);
                        changes.push(ReplicationChange {
                            source_id: source_id.clone(),
                            table: target.clone(),
                            namespace: None,
                            operation,
                            data,
                            old_data: None,
                            position,
                        });
                    }
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
        serde_json::from_slice(raw).map_err(|e| CdcError::Fatal { source_id: "mongodb".into(), cause: e.into() })
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
    fn row_to_document_and_back_round_trips_scalar_fields() {
        let mut row = Row::new();
        row.insert("name".into(), json!("ada"));
        row.insert("age".into(), json!(37));
        row.insert("active".into(), json!(true));

        let doc = row_to_document(&row);
        let round_tripped = document_to_row(&doc);

        assert_eq!(round_tripped.get("name"), Some(&json!("ada")));
        assert_eq!(round_tripped.get("age"), Some(&json!(37)));
        assert_eq!(round_tripped.get("active"), Some(&json!(true)));
    }

    #[test]
    fn document_to_row_preserves_field_names() {
        let doc = doc! { "a": 1, "b": "x" };
        let row = document_to_row(&doc);
        assert_eq!(row.len(), 2);
        assert!(row.contains_key("a"));
        assert!(row.contains_key("b"));
    }
}
