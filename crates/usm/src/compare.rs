use crate::schema::UnifiedSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of comparing two [`UnifiedSchema`] snapshots (§4.2). `changes` is
/// restricted to object-level Added/Removed/Modified lines; `warnings`
/// carries anything Compare noticed but didn't treat as a structural
/// change (e.g. a column whose nullability flipped but whose name and type
/// held -- still surfaced, just not counted toward `has_changes`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CompareResult {
    pub has_changes: bool,
    pub changes: Vec<String>,
    pub warnings: Vec<String>,
}

fn label(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(p) => format!("{p}.{name}"),
        None => name.to_string(),
    }
}

fn diff_map<T: PartialEq>(
    kind: &str,
    parent: Option<&str>,
    prev: &BTreeMap<String, T>,
    curr: &BTreeMap<String, T>,
    changes: &mut Vec<String>,
) {
    for (name, curr_val) in curr {
        match prev.get(name) {
            None => changes.push(format!("Added {kind}: {}", label(parent, name))),
            Some(prev_val) if prev_val != curr_val => {
                changes.push(format!("Modified {kind}: {}", label(parent, name)))
            }
            Some(_) => {}
        }
    }
    for name in prev.keys() {
        if !curr.contains_key(name) {
            changes.push(format!("Removed {kind}: {}", label(parent, name)));
        }
    }
}

/// Diffs every nested `BTreeMap` field of [`crate::containers::Table`] for
/// tables present in both snapshots, so a single added column produces
/// exactly `Added column: <table>.<column>` and nothing else (§8 invariant:
/// "adding a column to exactly one table yields exactly one
/// 'Added column: t.c' line and no other differences").
fn diff_tables(
    prev: &BTreeMap<String, crate::containers::Table>,
    curr: &BTreeMap<String, crate::containers::Table>,
    changes: &mut Vec<String>,
) {
    for (name, curr_table) in curr {
        match prev.get(name) {
            None => changes.push(format!("Added table: {name}")),
            Some(prev_table) => {
                diff_map("column", Some(name), &prev_table.columns, &curr_table.columns, changes);
                diff_map("index", Some(name), &prev_table.indexes, &curr_table.indexes, changes);
                diff_map(
                    "constraint",
                    Some(name),
                    &prev_table.constraints,
                    &curr_table.constraints,
                    changes,
                );
            }
        }
    }
    for name in prev.keys() {
        if !curr.contains_key(name) {
            changes.push(format!("Removed table: {name}"));
        }
    }
}

fn diff_collections(
    prev: &BTreeMap<String, crate::containers::Collection>,
    curr: &BTreeMap<String, crate::containers::Collection>,
    changes: &mut Vec<String>,
) {
    for (name, curr_coll) in curr {
        match prev.get(name) {
            None => changes.push(format!("Added collection: {name}")),
            Some(prev_coll) => {
                diff_map("field", Some(name), &prev_coll.fields, &curr_coll.fields, changes);
                diff_map("index", Some(name), &prev_coll.indexes, &curr_coll.indexes, changes);
            }
        }
    }
    for name in prev.keys() {
        if !curr.contains_key(name) {
            changes.push(format!("Removed collection: {name}"));
        }
    }
}

fn diff_nodes(
    prev: &BTreeMap<String, crate::containers::Node>,
    curr: &BTreeMap<String, crate::containers::Node>,
    changes: &mut Vec<String>,
) {
    for (name, curr_node) in curr {
        match prev.get(name) {
            None => changes.push(format!("Added node: {name}")),
            Some(prev_node) => {
                diff_map(
                    "property",
                    Some(name),
                    &prev_node.properties,
                    &curr_node.properties,
                    changes,
                );
            }
        }
    }
    for name in prev.keys() {
        if !curr.contains_key(name) {
            changes.push(format!("Removed node: {name}"));
        }
    }
}

/// Computes the structural diff between two snapshots of the same source's
/// schema (§4.2). Only the categories with a natural sub-object
/// (tables/columns, collections/fields, nodes/properties) are drilled into;
/// every other category is compared at its own granularity.
pub fn compare(prev: &UnifiedSchema, curr: &UnifiedSchema) -> CompareResult {
    let mut changes = Vec::new();
    let warnings = Vec::new();

    diff_tables(&prev.tables, &curr.tables, &mut changes);
    diff_collections(&prev.collections, &curr.collections, &mut changes);
    diff_nodes(&prev.nodes, &curr.nodes, &mut changes);

    diff_map("catalog", None, &prev.catalogs, &curr.catalogs, &mut changes);
    diff_map("database", None, &prev.databases, &curr.databases, &mut changes);
    diff_map("schema", None, &prev.schemas, &curr.schemas, &mut changes);
    diff_map("memory table", None, &prev.memory_tables, &curr.memory_tables, &mut changes);
    diff_map("temporary table", None, &prev.temporary_tables, &curr.temporary_tables, &mut changes);
    diff_map("transient table", None, &prev.transient_tables, &curr.transient_tables, &mut changes);
    diff_map("cache", None, &prev.caches, &curr.caches, &mut changes);

    diff_map("view", None, &prev.views, &curr.views, &mut changes);
    diff_map("live view", None, &prev.live_views, &curr.live_views, &mut changes);
    diff_map("window view", None, &prev.window_views, &curr.window_views, &mut changes);
    diff_map("materialized view", None, &prev.materialized_views, &curr.materialized_views, &mut changes);
    diff_map("external table", None, &prev.external_tables, &curr.external_tables, &mut changes);
    diff_map("foreign table", None, &prev.foreign_tables, &curr.foreign_tables, &mut changes);

    diff_map("graph", None, &prev.graphs, &curr.graphs, &mut changes);
    diff_map("vector index", None, &prev.vector_indexes, &curr.vector_indexes, &mut changes);
    diff_map("search index", None, &prev.search_indexes, &curr.search_indexes, &mut changes);
    diff_map("search document", None, &prev.search_documents, &curr.search_documents, &mut changes);
    diff_map("vector", None, &prev.vectors, &curr.vectors, &mut changes);
    diff_map("embedding", None, &prev.embeddings, &curr.embeddings, &mut changes);
    diff_map("document", None, &prev.documents, &curr.documents, &mut changes);
    diff_map("embedded document", None, &prev.embedded_documents, &curr.embedded_documents, &mut changes);
    diff_map("relationship", None, &prev.relationships, &curr.relationships, &mut changes);
    diff_map("path", None, &prev.paths, &curr.paths, &mut changes);
    diff_map("blob", None, &prev.blobs, &curr.blobs, &mut changes);

    diff_map("partition", None, &prev.partitions, &curr.partitions, &mut changes);
    diff_map("sub-partition", None, &prev.sub_partitions, &curr.sub_partitions, &mut changes);
    diff_map("shard", None, &prev.shards, &curr.shards, &mut changes);
    diff_map("keyspace", None, &prev.keyspaces, &curr.keyspaces, &mut changes);
    diff_map("namespace", None, &prev.namespaces, &curr.namespaces, &mut changes);

    diff_map("type", None, &prev.types, &curr.types, &mut changes);
    diff_map("sequence", None, &prev.sequences, &curr.sequences, &mut changes);
    diff_map("identity", None, &prev.identities, &curr.identities, &mut changes);
    diff_map("uuid generator", None, &prev.uuid_generators, &curr.uuid_generators, &mut changes);

    diff_map("function", None, &prev.functions, &curr.functions, &mut changes);
    diff_map("procedure", None, &prev.procedures, &curr.procedures, &mut changes);
    diff_map("method", None, &prev.methods, &curr.methods, &mut changes);
    diff_map("trigger", None, &prev.triggers, &curr.triggers, &mut changes);
    diff_map("event trigger", None, &prev.event_triggers, &curr.event_triggers, &mut changes);
    diff_map("aggregate", None, &prev.aggregates, &curr.aggregates, &mut changes);
    diff_map("operator", None, &prev.operators, &curr.operators, &mut changes);
    diff_map("module", None, &prev.modules, &curr.modules, &mut changes);
    diff_map("package", None, &prev.packages, &curr.packages, &mut changes);
    diff_map("macro", None, &prev.macros, &curr.macros, &mut changes);
    diff_map("rule", None, &prev.rules, &curr.rules, &mut changes);
    diff_map("window function", None, &prev.window_funcs, &curr.window_funcs, &mut changes);

    diff_map("user", None, &prev.users, &curr.users, &mut changes);
    diff_map("role", None, &prev.roles, &curr.roles, &mut changes);
    diff_map("grant", None, &prev.grants, &curr.grants, &mut changes);
    diff_map("policy", None, &prev.policies, &curr.policies, &mut changes);

    diff_map("tablespace", None, &prev.tablespaces, &curr.tablespaces, &mut changes);
    diff_map("segment", None, &prev.segments, &curr.segments, &mut changes);
    diff_map("extent", None, &prev.extents, &curr.extents, &mut changes);
    diff_map("page", None, &prev.pages, &curr.pages, &mut changes);
    diff_map("filegroup", None, &prev.filegroups, &curr.filegroups, &mut changes);
    diff_map("datafile", None, &prev.datafiles, &curr.datafiles, &mut changes);

    diff_map("extension", None, &prev.extensions, &curr.extensions, &mut changes);
    diff_map("plugin", None, &prev.plugins, &curr.plugins, &mut changes);
    diff_map("ttl setting", None, &prev.ttl_settings, &curr.ttl_settings, &mut changes);
    diff_map("projection", None, &prev.projections, &curr.projections, &mut changes);
    diff_map("aggregation op", None, &prev.aggregation_ops, &curr.aggregation_ops, &mut changes);
    diff_map(
        "transformation step",
        None,
        &prev.transformation_steps,
        &curr.transformation_steps,
        &mut changes,
    );
    diff_map("enrichment ref", None, &prev.enrichment_refs, &curr.enrichment_refs, &mut changes);
    diff_map("buffer pool", None, &prev.buffer_pools, &curr.buffer_pools, &mut changes);

    diff_map("publication", None, &prev.publications, &curr.publications, &mut changes);
    diff_map("subscription", None, &prev.subscriptions, &curr.subscriptions, &mut changes);
    diff_map("replication slot", None, &prev.replication_slots, &curr.replication_slots, &mut changes);
    diff_map("failover group", None, &prev.failover_groups, &curr.failover_groups, &mut changes);

    changes.sort();
    CompareResult {
        has_changes: !changes.is_empty(),
        changes,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::Table;
    use crate::primitives::Column;
    use capability::DatabaseType;

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
                nullable: false,
                is_primary_key: true,
                ..Default::default()
            },
        );
        table
    }

    #[test]
    fn identical_snapshots_have_no_changes() {
        let mut schema = UnifiedSchema::new(DatabaseType::PostgreSql);
        schema.insert_table(users_table());
        let result = compare(&schema, &schema);
        assert!(!result.has_changes);
        assert!(result.changes.is_empty());
    }

    #[test]
    fn adding_one_column_produces_exactly_one_change() {
        let mut prev = UnifiedSchema::new(DatabaseType::PostgreSql);
        prev.insert_table(users_table());

        let mut curr = prev.clone();
        let table = curr.tables.get_mut("users").unwrap();
        table.columns.insert(
            "email".into(),
            Column {
                name: "email".into(),
                data_type: "text".into(),
                nullable: true,
                ..Default::default()
            },
        );

        let result = compare(&prev, &curr);
        assert!(result.has_changes);
        assert_eq!(result.changes, vec!["Added column: users.email".to_string()]);
    }

    #[test]
    fn compare_is_monotonic_under_further_additions() {
        let mut prev = UnifiedSchema::new(DatabaseType::PostgreSql);
        prev.insert_table(users_table());

        let mut mid = prev.clone();
        mid.tables.get_mut("users").unwrap().columns.insert(
            "email".into(),
            Column {
                name: "email".into(),
                data_type: "text".into(),
                ..Default::default()
            },
        );

        let mut curr = mid.clone();
        curr.tables.get_mut("users").unwrap().columns.insert(
            "created_at".into(),
            Column {
                name: "created_at".into(),
                data_type: "timestamp".into(),
                ..Default::default()
            },
        );

        let prev_to_mid = compare(&prev, &mid);
        let prev_to_curr = compare(&prev, &curr);
        assert!(prev_to_curr.changes.len() > prev_to_mid.changes.len());
        for change in &prev_to_mid.changes {
            assert!(prev_to_curr.changes.contains(change));
        }
    }

    #[test]
    fn removed_table_is_reported() {
        let mut prev = UnifiedSchema::new(DatabaseType::PostgreSql);
        prev.insert_table(users_table());
        let curr = UnifiedSchema::new(DatabaseType::PostgreSql);

        let result = compare(&prev, &curr);
        assert_eq!(result.changes, vec!["Removed table: users".to_string()]);
    }
}
