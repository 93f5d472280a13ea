use crate::types::TableCategory;
use usm::{ConstraintKind, Table};

/// The three structural shapes the cross-paradigm transformer distinguishes
/// (§4.7: "Enrichment Analyzer classifies tables (entity/junction/lookup)").
/// This is a structural heuristic, not the classification subsystem proper
/// (that scorer lives outside the core per §1) -- it looks only at the
/// table's own columns and constraints, never at data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructuralClass {
    Entity,
    Junction,
    Lookup,
}

/// Heuristically classifies a table by its key structure alone: a table
/// whose primary key is composed entirely of foreign-key columns (and has
/// at least two FK columns) is a junction table; a table with very few
/// non-key columns and no outbound foreign keys is a lookup table;
/// everything else is treated as an entity.
pub fn classify_table(table: &Table) -> StructuralClass {
    let fk_columns: std::collections::BTreeSet<&str> = table
        .constraints
        .values()
        .filter(|c| c.kind == ConstraintKind::ForeignKey)
        .flat_map(|c| c.columns.iter().map(String::as_str))
        .collect();

    let pk_columns: Vec<&str> = table
        .columns
        .values()
        .filter(|c| c.is_primary_key)
        .map(|c| c.name.as_str())
        .collect();

    let pk_is_all_fk = !pk_columns.is_empty()
        && pk_columns.iter().all(|c| fk_columns.contains(c));

    if pk_is_all_fk && fk_columns.len() >= 2 {
        return StructuralClass::Junction;
    }

    if fk_columns.is_empty() && table.columns.len() <= 3 {
        return StructuralClass::Lookup;
    }

    StructuralClass::Entity
}

impl From<StructuralClass> for TableCategory {
    fn from(class: StructuralClass) -> Self {
        match class {
            StructuralClass::Entity => TableCategory::Transactional,
            StructuralClass::Junction => TableCategory::Junction,
            StructuralClass::Lookup => TableCategory::Reference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usm::{Column, Constraint, ForeignKeyReference};

    fn pk_column(name: &str) -> Column {
        Column {
            name: name.into(),
            data_type: "integer".into(),
            is_primary_key: true,
            ..Default::default()
        }
    }

    #[test]
    fn table_with_composite_fk_primary_key_is_a_junction() {
        let mut table = Table {
            name: "order_items".into(),
            ..Default::default()
        };
        table.columns.insert("order_id".into(), pk_column("order_id"));
        table.columns.insert("product_id".into(), pk_column("product_id"));
        for (name, ref_table) in [("order_id", "orders"), ("product_id", "products")] {
            table.constraints.insert(
                format!("{name}_fk"),
                Constraint {
                    name: format!("{name}_fk"),
                    kind: ConstraintKind::ForeignKey,
                    columns: vec![name.to_string()],
                    reference: Some(ForeignKeyReference {
                        table: ref_table.into(),
                        columns: vec!["id".into()],
                        on_update: None,
                        on_delete: None,
                    }),
                    expression: None,
                },
            );
        }

        assert_eq!(classify_table(&table), StructuralClass::Junction);
    }

    #[test]
    fn small_table_with_no_foreign_keys_is_a_lookup() {
        let mut table = Table {
            name: "status_codes".into(),
            ..Default::default()
        };
        table.columns.insert("id".into(), pk_column("id"));
        table.columns.insert(
            "label".into(),
            Column {
                name: "label".into(),
                data_type: "text".into(),
                ..Default::default()
            },
        );

        assert_eq!(classify_table(&table), StructuralClass::Lookup);
    }

    #[test]
    fn wide_table_with_single_fk_is_an_entity() {
        let mut table = Table {
            name: "orders".into(),
            ..Default::default()
        };
        table.columns.insert("id".into(), pk_column("id"));
        table.columns.insert(
            "user_id".into(),
            Column {
                name: "user_id".into(),
                data_type: "integer".into(),
                ..Default::default()
            },
        );
        table.columns.insert(
            "total".into(),
            Column {
                name: "total".into(),
                data_type: "numeric".into(),
                ..Default::default()
            },
        );
        table.constraints.insert(
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

        assert_eq!(classify_table(&table), StructuralClass::Entity);
    }
}
