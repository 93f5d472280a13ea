//! Shared plumbing for the two relational adapters built on `sqlx`'s
//! database-agnostic `Any` driver (§4.3 SchemaOperator/DataOperator/
//! MetadataOperator): Postgres and MySQL differ only in identifier quoting,
//! placeholder syntax, and a handful of system-catalog queries, so both
//! wrap this one generic implementation rather than duplicating it.

use adapter::config::{StreamPage, StreamParams};
use adapter::operators::{DataOperator, MetadataOperator, Row, SchemaOperator};
use async_trait::async_trait;
use capability::DatabaseType;
use db_errors::{DatabaseError, ErrorKind};
use serde_json::Value;
use sqlx::any::{AnyPool, AnyRow};
use sqlx::{Column, Row as _, TypeInfo};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use usm::{Table, UnifiedSchema};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
}

impl Dialect {
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
        }
    }

    /// Positional placeholder for the `n`th (1-based) bound parameter.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::MySql => "?".to_string(),
        }
    }
}

fn sql_error(db_type: DatabaseType, op: &'static str, err: sqlx::Error) -> DatabaseError {
    DatabaseError::wrap(db_type, op, ErrorKind::Internal, anyhow::Error::new(err))
}

/// Decodes one result row into the engine-neutral [`Row`] shape, trying
/// progressively looser scalar types per column since the `Any` driver
/// erases the concrete wire type down to `AnyTypeInfo`.
pub fn any_row_to_row(row: &AnyRow) -> Row {
    let mut out = Row::new();
    for column in row.columns() {
        let name = column.name().to_string();
        let idx = column.ordinal();
        let value = if let Ok(v) = row.try_get::<i64, _>(idx) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<f64, _>(idx) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<bool, _>(idx) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<String, _>(idx) {
            Value::from(v)
        } else {
            Value::Null
        };
        out.insert(name, value);
    }
    out
}

fn value_to_sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

/// Shared engine for Postgres and MySQL, parameterized by [`Dialect`] for
/// the handful of places syntax diverges. Connection pooling, schema
/// discovery, and row-shaped reads/writes are otherwise identical.
pub struct SqlOperators {
    pub pool: AnyPool,
    pub dialect: Dialect,
    pub db_type: DatabaseType,
}

#[async_trait]
impl SchemaOperator for SqlOperators {
    async fn discover_schema(&self, _ctx: CancellationToken) -> Result<UnifiedSchema, DatabaseError> {
        let mut schema = UnifiedSchema::new(self.db_type);
        for name in self.list_tables(CancellationToken::new()).await? {
            match self.get_table_schema(CancellationToken::new(), &name).await {
                Ok(table) => schema.insert_table(table),
                Err(err) => tracing::warn!(table = %name, error = %err, "skipping table during schema discovery"),
            }
        }
        Ok(schema)
    }

    async fn create_structure(&self, _ctx: CancellationToken, schema: &UnifiedSchema) -> Result<(), DatabaseError> {
        for table in schema.tables.values() {
            let columns: Vec<String> = table
                .columns
                .values()
                .map(|c| {
                    let mut def = format!("{} {}", self.dialect.quote(&c.name), c.data_type);
                    if !c.nullable {
                        def.push_str(" NOT NULL");
                    }
                    def
                })
                .collect();
            if columns.is_empty() {
                continue;
            }
            let ddl = format!("CREATE TABLE IF NOT EXISTS {} ({})", self.dialect.quote(&table.name), columns.join(", "));
            sqlx::query(&ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| sql_error(self.db_type, "create_structure", e))?;
        }
        Ok(())
    }

    async fn list_tables(&self, _ctx: CancellationToken) -> Result<Vec<String>, DatabaseError> {
        let sql = match self.dialect {
            Dialect::Postgres => "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public'",
            Dialect::MySql => "SELECT table_name FROM information_schema.tables WHERE table_schema = DATABASE()",
        };
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| sql_error(self.db_type, "list_tables", e))?;
        Ok(rows.iter().filter_map(|r| r.try_get::<String, _>(0).ok()).collect())
    }

    async fn get_table_schema(&self, _ctx: CancellationToken, name: &str) -> Result<Table, DatabaseError> {
        let sql = match self.dialect {
            Dialect::Postgres => {
                "SELECT column_name, data_type, is_nullable FROM information_schema.columns WHERE table_name = $1"
            }
            Dialect::MySql => {
                "SELECT column_name, data_type, is_nullable FROM information_schema.columns WHERE table_name = ?"
            }
        };
        let rows = sqlx::query(sql)
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| sql_error(self.db_type, "get_table_schema", e))?;

        let mut table = Table {
            name: name.to_string(),
            ..Default::default()
        };
        for row in &rows {
            let column_name: String = row.try_get(0).unwrap_or_default();
            let data_type: String = row.try_get(1).unwrap_or_default();
            let nullable: String = row.try_get(2).unwrap_or_else(|_| "YES".to_string());
            table.columns.insert(
                column_name.clone(),
                usm::Column {
                    name: column_name,
                    data_type,
                    nullable: nullable.eq_ignore_ascii_case("YES"),
                    ..Default::default()
                },
            );
        }
        Ok(table)
    }
}

#[async_trait]
impl DataOperator for SqlOperators {
    async fn fetch(&self, ctx: CancellationToken, target: &str, limit: u32) -> Result<Vec<Row>, DatabaseError> {
        self.fetch_with_columns(ctx, target, &[], limit).await
    }

    async fn fetch_with_columns(
        &self,
        _ctx: CancellationToken,
        target: &str,
        columns: &[String],
        limit: u32,
    ) -> Result<Vec<Row>, DatabaseError> {
        let projection = if columns.is_empty() {
            "*".to_string()
        } else {
            columns.iter().map(|c| self.dialect.quote(c)).collect::<Vec<_>>().join(", ")
        };
        let sql = format!("SELECT {projection} FROM {} LIMIT {limit}", self.dialect.quote(target));
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| sql_error(self.db_type, "fetch", e))?;
        Ok(rows.iter().map(any_row_to_row).collect())
    }

    async fn insert(&self, _ctx: CancellationToken, target: &str, rows: &[Row]) -> Result<u64, DatabaseError> {
        let Some(first) = rows.first() else { return Ok(0) };
        let columns: Vec<&String> = first.keys().collect();
        let column_list = columns.iter().map(|c| self.dialect.quote(c)).collect::<Vec<_>>().join(", ");
        let mut affected = 0u64;
        for row in rows {
            let values = columns
                .iter()
                .map(|c| value_to_sql_literal(row.get(*c).unwrap_or(&Value::Null)))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!("INSERT INTO {} ({column_list}) VALUES ({values})", self.dialect.quote(target));
            let result = sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(|e| sql_error(self.db_type, "insert", e))?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    async fn update(
        &self,
        _ctx: CancellationToken,
        target: &str,
        rows: &[Row],
        where_cols: &[String],
    ) -> Result<u64, DatabaseError> {
        let mut affected = 0u64;
        for row in rows {
            let set_clause = row
                .iter()
                .filter(|(k, _)| !where_cols.contains(k))
                .map(|(k, v)| format!("{} = {}", self.dialect.quote(k), value_to_sql_literal(v)))
                .collect::<Vec<_>>()
                .join(", ");
            if set_clause.is_empty() {
                continue;
            }
            let predicate = where_clause(self.dialect, row, where_cols);
            let sql = format!("UPDATE {} SET {set_clause} WHERE {predicate}", self.dialect.quote(target));
            let result = sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(|e| sql_error(self.db_type, "update", e))?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    async fn upsert(
        &self,
        _ctx: CancellationToken,
        target: &str,
        rows: &[Row],
        unique_cols: &[String],
    ) -> Result<u64, DatabaseError> {
        if self.dialect != Dialect::Postgres {
            return Err(DatabaseError::unsupported(
                self.db_type,
                "upsert",
                "MySQL upsert is not implemented through the generic SQL path; use ON DUPLICATE KEY UPDATE at the caller",
            ));
        }
        let Some(first) = rows.first() else { return Ok(0) };
        let columns: Vec<&String> = first.keys().collect();
        let column_list = columns.iter().map(|c| self.dialect.quote(c)).collect::<Vec<_>>().join(", ");
        let conflict_cols = unique_cols.iter().map(|c| self.dialect.quote(c)).collect::<Vec<_>>().join(", ");
        let mut affected = 0u64;
        for row in rows {
            let values = columns
                .iter()
                .map(|c| value_to_sql_literal(row.get(*c).unwrap_or(&Value::Null)))
                .collect::<Vec<_>>()
                .join(", ");
            let update_clause = columns
                .iter()
                .filter(|c| !unique_cols.contains(c))
                .map(|c| format!("{} = EXCLUDED.{}", self.dialect.quote(c), self.dialect.quote(c)))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO {} ({column_list}) VALUES ({values}) ON CONFLICT ({conflict_cols}) DO UPDATE SET {update_clause}",
                self.dialect.quote(target)
            );
            let result = sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(|e| sql_error(self.db_type, "upsert", e))?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    async fn delete(&self, _ctx: CancellationToken, target: &str, conditions: &Row) -> Result<u64, DatabaseError> {
        if conditions.is_empty() {
            return Err(DatabaseError::invalid_data(
                self.db_type,
                "delete",
                "refusing to delete with an empty condition set; use wipe() to clear a table",
            ));
        }
        let keys: Vec<String> = conditions.keys().cloned().collect();
        let predicate = where_clause(self.dialect, conditions, &keys);
        let sql = format!("DELETE FROM {} WHERE {predicate}", self.dialect.quote(target));
        let result = sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| sql_error(self.db_type, "delete", e))?;
        Ok(result.rows_affected())
    }

    async fn stream(&self, _ctx: CancellationToken, params: StreamParams) -> Result<StreamPage, DatabaseError> {
        let offset: i64 = params.cursor.as_deref().and_then(|c| c.parse().ok()).unwrap_or(0);
        let sql = format!(
            "SELECT * FROM {} LIMIT {} OFFSET {offset}",
            self.dialect.quote(&params.target),
            params.batch_size as i64 + 1
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| sql_error(self.db_type, "stream", e))?;
        let has_more = rows.len() as u32 > params.batch_size;
        let page: Vec<Row> = rows.iter().take(params.batch_size as usize).map(any_row_to_row).collect();
        let next_cursor = has_more.then(|| (offset + params.batch_size as i64).to_string());
        Ok(StreamPage { rows: page, has_more, next_cursor })
    }

    async fn execute_query(&self, _ctx: CancellationToken, query: &str, args: &[Value]) -> Result<Vec<Row>, DatabaseError> {
        let mut q = sqlx::query(query);
        for arg in args {
            q = match arg {
                Value::String(s) => q.bind(s.clone()),
                Value::Bool(b) => q.bind(*b),
                Value::Number(n) if n.is_i64() => q.bind(n.as_i64().unwrap()),
                Value::Number(n) => q.bind(n.as_f64().unwrap_or_default()),
                _ => q.bind(arg.to_string()),
            };
        }
        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| sql_error(self.db_type, "execute_query", e))?;
        Ok(rows.iter().map(any_row_to_row).collect())
    }

    async fn execute_count_query(&self, _ctx: CancellationToken, query: &str) -> Result<i64, DatabaseError> {
        let row = sqlx::query(query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| sql_error(self.db_type, "execute_count_query", e))?;
        row.try_get::<i64, _>(0).map_err(|e| sql_error(self.db_type, "execute_count_query", e))
    }

    async fn get_row_count(&self, _ctx: CancellationToken, target: &str, where_clause: Option<&str>) -> Result<(i64, bool), DatabaseError> {
        let sql = match where_clause {
            Some(clause) => format!("SELECT COUNT(*) FROM {} WHERE {clause}", self.dialect.quote(target)),
            None => format!("SELECT COUNT(*) FROM {}", self.dialect.quote(target)),
        };
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| sql_error(self.db_type, "get_row_count", e))?;
        let count = row.try_get::<i64, _>(0).map_err(|e| sql_error(self.db_type, "get_row_count", e))?;
        Ok((count, true))
    }

    async fn wipe(&self, _ctx: CancellationToken) -> Result<(), DatabaseError> {
        let schema = self.discover_schema(CancellationToken::new()).await?;
        for name in schema.tables.keys() {
            let sql = format!("TRUNCATE TABLE {}", self.dialect.quote(name));
            if sqlx::query(&sql).execute(&self.pool).await.is_err() {
                let fallback = format!("DELETE FROM {}", self.dialect.quote(name));
                sqlx::query(&fallback)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| sql_error(self.db_type, "wipe", e))?;
            }
        }
        Ok(())
    }
}

fn where_clause(dialect: Dialect, row: &Row, cols: &[String]) -> String {
    cols.iter()
        .map(|c| match row.get(c) {
            Some(Value::Null) | None => format!("{} IS NULL", dialect.quote(c)),
            Some(v) => format!("{} = {}", dialect.quote(c), value_to_sql_literal(v)),
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[async_trait]
impl MetadataOperator for SqlOperators {
    async fn collect_database_metadata(&self, _ctx: CancellationToken) -> Result<BTreeMap<String, String>, DatabaseError> {
        let mut meta = BTreeMap::new();
        meta.insert("table_count".to_string(), self.get_table_count(CancellationToken::new()).await?.to_string());
        Ok(meta)
    }

    async fn collect_instance_metadata(&self, ctx: CancellationToken) -> Result<BTreeMap<String, String>, DatabaseError> {
        let mut meta = BTreeMap::new();
        meta.insert("version".to_string(), self.get_version(ctx).await?);
        Ok(meta)
    }

    async fn get_version(&self, _ctx: CancellationToken) -> Result<String, DatabaseError> {
        let sql = match self.dialect {
            Dialect::Postgres => "SELECT version()",
            Dialect::MySql => "SELECT VERSION()",
        };
        let row = sqlx::query(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| sql_error(self.db_type, "get_version", e))?;
        row.try_get::<String, _>(0).map_err(|e| sql_error(self.db_type, "get_version", e))
    }

    async fn get_unique_identifier(&self, _ctx: CancellationToken) -> Result<String, DatabaseError> {
        let sql = match self.dialect {
            Dialect::Postgres => "SELECT system_identifier::text FROM pg_control_system()",
            Dialect::MySql => "SELECT @@server_uuid",
        };
        let row = sqlx::query(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| sql_error(self.db_type, "get_unique_identifier", e))?;
        row.try_get::<String, _>(0).map_err(|e| sql_error(self.db_type, "get_unique_identifier", e))
    }

    async fn get_database_size(&self, _ctx: CancellationToken) -> Result<u64, DatabaseError> {
        let sql = match self.dialect {
            Dialect::Postgres => "SELECT pg_database_size(current_database())",
            Dialect::MySql => {
                "SELECT SUM(data_length + index_length) FROM information_schema.tables WHERE table_schema = DATABASE()"
            }
        };
        let row = sqlx::query(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| sql_error(self.db_type, "get_database_size", e))?;
        let size: i64 = row.try_get(0).unwrap_or(0);
        Ok(size.max(0) as u64)
    }

    async fn get_table_count(&self, ctx: CancellationToken) -> Result<u64, DatabaseError> {
        Ok(self.list_tables(ctx).await?.len() as u64)
    }

    async fn execute_command(&self, _ctx: CancellationToken, cmd: &str) -> Result<Vec<u8>, DatabaseError> {
        let rows = sqlx::query(cmd)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| sql_error(self.db_type, "execute_command", e))?;
        let decoded: Vec<Row> = rows.iter().map(any_row_to_row).collect();
        serde_json::to_vec(&decoded).map_err(|e| DatabaseError::wrap(self.db_type, "execute_command", ErrorKind::Internal, e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dialect_quoting_differs_by_engine() {
        assert_eq!(Dialect::Postgres.quote("users"), "\"users\"");
        assert_eq!(Dialect::MySql.quote("users"), "`users`");
        assert_eq!(Dialect::Postgres.quote("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn dialect_placeholders_differ_by_engine() {
        assert_eq!(Dialect::Postgres.placeholder(1), "$1");
        assert_eq!(Dialect::Postgres.placeholder(2), "$2");
        assert_eq!(Dialect::MySql.placeholder(1), "?");
        assert_eq!(Dialect::MySql.placeholder(2), "?");
    }

    #[test]
    fn value_to_sql_literal_quotes_strings_and_escapes_quotes() {
        assert_eq!(value_to_sql_literal(&json!("o'brien")), "'o''brien'");
        assert_eq!(value_to_sql_literal(&Value::Null), "NULL");
        assert_eq!(value_to_sql_literal(&json!(42)), "42");
        assert_eq!(value_to_sql_literal(&json!(true)), "true");
    }

    #[test]
    fn where_clause_handles_null_and_non_null_conditions() {
        let mut row = Row::new();
        row.insert("id".into(), json!(1));
        row.insert("deleted_at".into(), Value::Null);
        let cols = vec!["id".to_string(), "deleted_at".to_string()];

        let clause = where_clause(Dialect::Postgres, &row, &cols);
        assert_eq!(clause, "\"id\" = 1 AND \"deleted_at\" IS NULL");
    }

    #[test]
    fn where_clause_treats_missing_column_as_null() {
        let row = Row::new();
        let clause = where_clause(Dialect::MySql, &row, &["missing".to_string()]);
        assert_eq!(clause, "`missing` IS NULL");
    }
}
