use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The dominant role a table plays in the schema, as scored by the adjacent
/// classification subsystem. The core only consumes this value -- it never
/// computes it (§1 Out of scope: "A classification subsystem ... is
/// specified only via the interface the translator consumes").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TableCategory {
    Transactional,
    Reference,
    Junction,
    Audit,
    Staging,
    Unknown,
}

impl Default for TableCategory {
    fn default() -> Self {
        TableCategory::Unknown
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccessPattern {
    ReadHeavy,
    WriteHeavy,
    Balanced,
    Append,
    Unknown,
}

impl Default for AccessPattern {
    fn default() -> Self {
        AccessPattern::Unknown
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataSensitivity {
    Public,
    Internal,
    Confidential,
    Restricted,
}

impl Default for DataSensitivity {
    fn default() -> Self {
        DataSensitivity::Internal
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QueryComplexity {
    Simple,
    Moderate,
    Complex,
}

impl Default for QueryComplexity {
    fn default() -> Self {
        QueryComplexity::Simple
    }
}

/// Per-table advisory metadata (§3.2). `category_scores` is a ranked list
/// of `(category, score)` pairs; `category` is always `category_scores[0]`
/// when `category_scores` is non-empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TableEnrichment {
    pub category: TableCategory,
    pub confidence: f64,
    pub category_scores: Vec<(TableCategory, f64)>,
    pub access_pattern: AccessPattern,
    pub has_privileged_data: bool,
    pub privileged_columns: Vec<String>,
    pub sensitivity: DataSensitivity,
    pub related_tables: Vec<String>,
    pub dependent_tables: Vec<String>,
    pub business_purpose: Option<String>,
    pub tags: Vec<String>,
    pub context: BTreeMap<String, String>,
    pub estimated_rows: Option<u64>,
    pub growth_rate: Option<f64>,
    pub query_complexity: QueryComplexity,
    pub retention: Option<String>,
}

impl TableEnrichment {
    pub fn is_well_formed(&self) -> bool {
        (0.0..=1.0).contains(&self.confidence)
            && self
                .category_scores
                .first()
                .map(|(cat, _)| *cat == self.category)
                .unwrap_or(true)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Low
    }
}

/// Per-column advisory metadata (§3.2).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ColumnEnrichment {
    pub is_privileged: bool,
    pub data_category: Option<String>,
    pub sub_category: Option<String>,
    pub risk_level: RiskLevel,
    pub value_patterns: Vec<String>,
    pub sample_values: Vec<String>,
    pub is_searchable: bool,
    pub is_filterable: bool,
    pub is_sortable: bool,
    pub recommended_index_type: Option<String>,
    pub requires_encryption: bool,
    pub requires_masking: bool,
    pub inferred_foreign_key: Option<String>,
    pub business_meaning: Option<String>,
    pub compliance_frameworks: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HintPriority {
    Low,
    Medium,
    High,
}

impl Default for HintPriority {
    fn default() -> Self {
        HintPriority::Medium
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PerformanceHint {
    pub priority: HintPriority,
    pub hint: String,
    pub object_path: String,
    pub estimated_benefit: Option<String>,
}

/// Identifies a generation run so enrichment can be versioned independently
/// of the USM it annotates (§3.2).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EnrichmentKey {
    pub schema_id: String,
    pub enrichment_version: u32,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub generated_by: String,
}
