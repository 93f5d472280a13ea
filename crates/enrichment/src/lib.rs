//! Advisory, per-object metadata kept separate from the Unified Schema
//! Model it describes (§3.2). Enrichment never participates in USM
//! equality or the `compare` diff -- it guides translation decisions and
//! is carried along as context where the target paradigm has room for it.

pub mod analyzer;
pub mod types;

pub use analyzer::{classify_table, StructuralClass};
pub use types::{
    AccessPattern, ColumnEnrichment, DataSensitivity, EnrichmentKey, HintPriority,
    PerformanceHint, QueryComplexity, RiskLevel, TableCategory, TableEnrichment,
};

use std::collections::BTreeMap;

/// The full enrichment record for one schema snapshot, addressed by
/// `EnrichmentKey`. Tables and columns are keyed by the same names used in
/// the USM they annotate (`"table"` and `"table.column"` respectively);
/// there is no referential check against the USM -- a stale or missing
/// reference is simply ignored by consumers.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct EnrichmentModel {
    pub tables: BTreeMap<String, TableEnrichment>,
    pub columns: BTreeMap<String, ColumnEnrichment>,
    pub performance_hints: Vec<PerformanceHint>,
}

impl EnrichmentModel {
    pub fn table(&self, name: &str) -> Option<&TableEnrichment> {
        self.tables.get(name)
    }

    /// Columns are keyed `"<table>.<column>"`, matching the `compare`
    /// change-string convention (§4.2).
    pub fn column(&self, table: &str, column: &str) -> Option<&ColumnEnrichment> {
        self.columns.get(&format!("{table}.{column}"))
    }

    pub fn privileged_columns_of(&self, table: &str) -> Vec<&str> {
        self.table(table)
            .map(|t| t.privileged_columns.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_lookup_is_keyed_by_table_dot_column() {
        let mut model = EnrichmentModel::default();
        model.columns.insert(
            "users.email".into(),
            ColumnEnrichment {
                is_privileged: true,
                data_category: Some("email".into()),
                ..Default::default()
            },
        );

        let found = model.column("users", "email").expect("present");
        assert!(found.is_privileged);
        assert!(model.column("users", "name").is_none());
    }

    #[test]
    fn missing_table_enrichment_yields_no_privileged_columns() {
        let model = EnrichmentModel::default();
        assert!(model.privileged_columns_of("users").is_empty());
    }
}
