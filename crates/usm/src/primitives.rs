use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A relational column. `data_type` is an opaque, engine-native string
/// (e.g. `"varchar(255)"`, `"integer"`) -- USM never parses or normalizes
/// it; that's the translator's job when crossing engines.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_partition_key: bool,
    #[serde(default)]
    pub is_clustering_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub default_expression: Option<String>,
    #[serde(default)]
    pub generated_expression: Option<String>,
    #[serde(default)]
    pub collation: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A field of a document collection (Mongo-style). Unlike `Column`,
/// presence/nullability is advisory rather than enforced by the engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Field {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub is_array: bool,
}

/// A graph property key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PropertyKey {
    pub name: String,
    pub data_type: String,
}

/// A user-defined or engine-native type (enum, composite, domain, ...).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DbType {
    pub name: String,
    pub category: String,
    /// Opaque definition payload -- e.g. the enum labels, composite field
    /// list, or domain check, serialized however the source engine exposed it.
    pub definition: serde_json::Value,
}

/// The kind of a [`crate::Constraint`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Unique,
    Check,
    NotNull,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ForeignKeyReference {
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub on_update: Option<String>,
    #[serde(default)]
    pub on_delete: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Constraint {
    pub name: String,
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
    #[serde(default)]
    pub reference: Option<ForeignKeyReference>,
    #[serde(default)]
    pub expression: Option<String>,
}

impl Constraint {
    /// `Constraint.Reference` is non-empty iff `Constraint.Type = foreign-key`.
    pub fn is_well_formed(&self) -> bool {
        matches!(
            (&self.kind, &self.reference),
            (ConstraintKind::ForeignKey, Some(_)) | (ConstraintKind::PrimaryKey, None)
                | (ConstraintKind::Unique, None)
                | (ConstraintKind::Check, None)
                | (ConstraintKind::NotNull, None)
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Index {
    pub name: String,
    pub index_type: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub predicate: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Sequence {
    pub name: String,
    pub start: i64,
    pub increment: i64,
    pub min: i64,
    pub max: i64,
    pub cache: i64,
    pub cycle: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Identity {
    pub name: String,
    pub column: String,
    pub always: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct UuidGenerator {
    pub name: String,
    pub version: u8,
}

/// A typed key→value attribute bag reused for "context maps" across the
/// enrichment model and translator report.
pub type AttrMap = BTreeMap<String, String>;
