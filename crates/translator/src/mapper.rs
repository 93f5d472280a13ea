use crate::type_conversion::convert_column_type;
use capability::DatabaseType;
use usm::{Table, UnifiedSchema};

/// Same-paradigm Object Mapper (§4.7 step 3, `same-paradigm` branch):
/// source and target already agree on structure, so translation is a
/// straight object-for-object copy with column types rewritten to the
/// target engine's spelling. Everything that isn't a `Table` carries
/// across untouched -- non-relational containers (collections, nodes,
/// vector indexes, ...) don't need type rewriting between two engines
/// that already share the same paradigm.
pub fn map_schema(
    source: DatabaseType,
    target: DatabaseType,
    source_schema: &UnifiedSchema,
) -> (UnifiedSchema, Vec<String>) {
    let mut target_schema = source_schema.clone();
    target_schema.db_type = Some(target);
    let mut warnings = Vec::new();

    for (name, table) in &source_schema.tables {
        let (mapped, mut table_warnings) = map_table(source, target, table);
        warnings.append(&mut table_warnings);
        target_schema.tables.insert(name.clone(), mapped);
    }

    (target_schema, warnings)
}

fn map_table(source: DatabaseType, target: DatabaseType, table: &Table) -> (Table, Vec<String>) {
    let mut warnings = Vec::new();
    let mut mapped = table.clone();

    for (name, column) in mapped.columns.iter_mut() {
        let (converted, warning) = convert_column_type(source, target, &column.data_type);
        if let Some(warning) = warning {
            warnings.push(format!("{}.{}: {}", table.name, name, warning));
        }
        column.data_type = converted;
    }

    (mapped, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use usm::Column;

    fn users_table() -> Table {
        let mut table = Table {
            name: "users".into(),
            ..Default::default()
        };
        table.columns.insert(
            "id".into(),
            Column {
                name: "id".into(),
                data_type: "integer".into(),
                is_primary_key: true,
                auto_increment: true,
                nullable: false,
                ..Default::default()
            },
        );
        table.columns.insert(
            "email".into(),
            Column {
                name: "email".into(),
                data_type: "varchar(255)".into(),
                nullable: false,
                ..Default::default()
            },
        );
        table
    }

    #[test]
    fn postgres_users_table_maps_to_mysql_preserving_auto_increment() {
        let mut schema = UnifiedSchema::new(DatabaseType::PostgreSql);
        schema.insert_table(users_table());

        let (mapped, warnings) = map_schema(DatabaseType::PostgreSql, DatabaseType::MySql, &schema);

        assert!(warnings.is_empty());
        let table = mapped.tables.get("users").unwrap();
        let id = table.columns.get("id").unwrap();
        assert_eq!(id.data_type, "int");
        assert!(id.auto_increment);
        assert!(id.is_primary_key);
        let email = table.columns.get("email").unwrap();
        assert_eq!(email.data_type, "varchar(255)");
    }
}
