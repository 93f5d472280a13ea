use capability::DatabaseType;
use enrichment::{classify_table, StructuralClass};
use usm::{Collection, Constraint, ConstraintKind, Field, Node, PropertyKey, Relationship, Table, UnifiedSchema};

use crate::types::UnsupportedFeature;

/// Cross-paradigm Structure Transformer (§4.7 step 3, `cross-paradigm`
/// branch). Dispatches on the target paradigm's shape rather than trying to
/// be one generic transform: relational -> document denormalizes, relational
/// -> graph decomposes. Both read [`StructuralClass`] off each table to
/// decide how it participates in the target structure.
pub fn transform(
    _source: DatabaseType,
    target: DatabaseType,
    source_schema: &UnifiedSchema,
) -> (UnifiedSchema, Vec<String>, Vec<UnsupportedFeature>) {
    let target_capability = capability::must_get(target);
    if target_capability.has_paradigm(capability::Paradigm::Graph) {
        decompose_to_graph(target, source_schema)
    } else {
        denormalize_to_documents(target, source_schema)
    }
}

/// Embeds child rows under their parent per FK direction: an entity table
/// becomes a top-level `Collection`; a table whose FK columns make up its
/// whole primary key (a junction table) is folded into both endpoints as an
/// embedded array field rather than kept as its own collection, since
/// document engines model many-to-many via embedding or linking, not a
/// third top-level container.
fn denormalize_to_documents(
    target: DatabaseType,
    source_schema: &UnifiedSchema,
) -> (UnifiedSchema, Vec<String>, Vec<UnsupportedFeature>) {
    let mut target_schema = UnifiedSchema::new(target);
    let mut warnings = Vec::new();
    let mut unsupported = Vec::new();

    for table in source_schema.tables.values() {
        if classify_table(table) == StructuralClass::Junction {
            continue;
        }
        target_schema.insert_collection(table_to_collection(table));
    }

    for table in source_schema.tables.values() {
        if classify_table(table) != StructuralClass::Junction {
            continue;
        }
        let endpoints: Vec<&str> = table
            .constraints
            .values()
            .filter(|c| c.kind == ConstraintKind::ForeignKey)
            .filter_map(|c| c.reference.as_ref().map(|r| r.table.as_str()))
            .collect();

        if endpoints.len() != 2 {
            unsupported.push(UnsupportedFeature {
                feature_type: "junction_table".to_string(),
                object_type: "table".to_string(),
                object_name: table.name.clone(),
                description: "junction table does not reference exactly two tables; cannot embed as a linking array"
                    .to_string(),
                alternatives: vec!["model as a top-level collection with manual reference fields".to_string()],
            });
            continue;
        }

        for (side, other) in [(endpoints[0], endpoints[1]), (endpoints[1], endpoints[0])] {
            if let Some(collection) = target_schema.collections.get_mut(side) {
                let field_name = format!("{other}_refs");
                collection.fields.insert(
                    field_name.clone(),
                    Field {
                        name: field_name,
                        data_type: "array<string>".to_string(),
                        nullable: true,
                        is_array: true,
                    },
                );
            } else {
                warnings.push(format!(
                    "junction table {} references unknown table {side}; link field dropped",
                    table.name
                ));
            }
        }
    }

    for (name, child) in &source_schema.tables {
        let class = classify_table(child);
        if class == StructuralClass::Junction {
            continue;
        }
        for constraint in child.constraints.values() {
            if constraint.kind != ConstraintKind::ForeignKey {
                continue;
            }
            let Some(reference) = &constraint.reference else { continue };
            if class == StructuralClass::Lookup {
                // Lookup tables are small and referenced widely; inline them
                // under every table that points at them instead of nesting
                // the parent under the lookup.
                continue;
            }
            if let Some(parent) = target_schema.collections.get_mut(&reference.table) {
                let field_name = format!("{name}_embedded");
                parent.fields.insert(
                    field_name.clone(),
                    Field {
                        name: field_name,
                        data_type: "array<object>".to_string(),
                        nullable: true,
                        is_array: true,
                    },
                );
            }
        }
    }

    (target_schema, warnings, unsupported)
}

fn table_to_collection(table: &Table) -> Collection {
    let mut collection = Collection {
        name: table.name.clone(),
        ..Default::default()
    };
    for (name, column) in &table.columns {
        collection.fields.insert(
            name.clone(),
            Field {
                name: column.name.clone(),
                data_type: column.data_type.clone(),
                nullable: column.nullable,
                is_array: false,
            },
        );
    }
    collection
}

/// Every entity and lookup table becomes a `Node` label; every foreign key
/// becomes a `Relationship` between the owning and referenced labels.
/// Junction tables collapse entirely into a single relationship carrying
/// their non-key columns as edge properties, since a pure many-to-many
/// linking row has no identity of its own in a property graph.
fn decompose_to_graph(
    target: DatabaseType,
    source_schema: &UnifiedSchema,
) -> (UnifiedSchema, Vec<String>, Vec<UnsupportedFeature>) {
    let mut target_schema = UnifiedSchema::new(target);
    let warnings = Vec::new();
    let mut unsupported = Vec::new();

    for (name, table) in &source_schema.tables {
        if classify_table(table) == StructuralClass::Junction {
            continue;
        }
        target_schema.insert_node(table_to_node(name, table));
    }

    for (name, table) in &source_schema.tables {
        match classify_table(table) {
            StructuralClass::Junction => {
                if let Some(relationship) = junction_to_relationship(name, table) {
                    target_schema.insert_relationship(relationship);
                } else {
                    unsupported.push(UnsupportedFeature {
                        feature_type: "junction_table".to_string(),
                        object_type: "table".to_string(),
                        object_name: name.clone(),
                        description: "junction table does not reference exactly two tables; cannot fold into a single relationship"
                            .to_string(),
                        alternatives: vec!["model as an intermediate node with two relationships".to_string()],
                    });
                }
            }
            _ => {
                for constraint in table.constraints.values() {
                    if constraint.kind != ConstraintKind::ForeignKey {
                        continue;
                    }
                    if let Some(reference) = &constraint.reference {
                        target_schema.insert_relationship(Relationship {
                            name: format!("{name}_{}", constraint.name),
                            from_node: name.clone(),
                            to_node: reference.table.clone(),
                            properties: Default::default(),
                        });
                    }
                }
            }
        }
    }

    (target_schema, warnings, unsupported)
}

fn table_to_node(name: &str, table: &Table) -> Node {
    let mut node = Node {
        name: name.to_string(),
        ..Default::default()
    };
    for (col_name, column) in &table.columns {
        node.properties.insert(
            col_name.clone(),
            PropertyKey {
                name: column.name.clone(),
                data_type: column.data_type.clone(),
            },
        );
    }
    node
}

fn junction_to_relationship(name: &str, table: &Table) -> Option<Relationship> {
    let fk_constraints: Vec<&Constraint> = table
        .constraints
        .values()
        .filter(|c| c.kind == ConstraintKind::ForeignKey)
        .collect();
    if fk_constraints.len() != 2 {
        return None;
    }
    let from_node = fk_constraints[0].reference.as_ref()?.table.clone();
    let to_node = fk_constraints[1].reference.as_ref()?.table.clone();

    let fk_columns: std::collections::BTreeSet<&str> =
        fk_constraints.iter().flat_map(|c| c.columns.iter().map(String::as_str)).collect();
    let properties = table
        .columns
        .values()
        .filter(|c| !fk_columns.contains(c.name.as_str()))
        .map(|c| (c.name.clone(), c.data_type.clone()))
        .collect();

    Some(Relationship {
        name: name.to_string(),
        from_node,
        to_node,
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use usm::{Column, ForeignKeyReference};

    fn orders_and_users_schema() -> UnifiedSchema {
        let mut schema = UnifiedSchema::new(DatabaseType::PostgreSql);
        let mut users = Table {
            name: "users".into(),
            ..Default::default()
        };
        users.columns.insert(
            "id".into(),
            Column {
                name: "id".into(),
                data_type: "integer".into(),
                is_primary_key: true,
                ..Default::default()
            },
        );
        schema.insert_table(users);

        let mut orders = Table {
            name: "orders".into(),
            ..Default::default()
        };
        orders.columns.insert(
            "id".into(),
            Column {
                name: "id".into(),
                data_type: "integer".into(),
                is_primary_key: true,
                ..Default::default()
            },
        );
        orders.columns.insert(
            "user_id".into(),
            Column {
                name: "user_id".into(),
                data_type: "integer".into(),
                ..Default::default()
            },
        );
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
        schema
    }

    #[test]
    fn relational_to_document_embeds_orders_under_users() {
        let schema = orders_and_users_schema();
        let (mapped, warnings, unsupported) = denormalize_to_documents(DatabaseType::MongoDb, &schema);
        assert!(warnings.is_empty());
        assert!(unsupported.is_empty());
        let users = mapped.collections.get("users").unwrap();
        assert!(users.fields.contains_key("orders_embedded"));
    }

    #[test]
    fn relational_to_graph_produces_a_node_per_table_and_a_relationship_per_fk() {
        let schema = orders_and_users_schema();
        let (mapped, _warnings, unsupported) = decompose_to_graph(DatabaseType::Neo4j, &schema);
        assert!(unsupported.is_empty());
        assert!(mapped.nodes.contains_key("users"));
        assert!(mapped.nodes.contains_key("orders"));
        let relationship = mapped.relationships.get("orders_orders_user_fk").unwrap();
        assert_eq!(relationship.from_node, "orders");
        assert_eq!(relationship.to_node, "users");
    }
}
