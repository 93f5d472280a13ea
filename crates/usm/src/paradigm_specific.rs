use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Graph {
    pub name: String,
    pub node_labels: Vec<String>,
    pub relationship_types: Vec<String>,
}

/// A similarity metric recognized by vector engines. Engine adapters reject
/// unknown metrics only at create time (§3.1) -- USM itself never validates
/// this beyond requiring it be one of the closed set at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VectorMetric {
    L2,
    Cosine,
    Dot,
    Hamming,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct VectorIndex {
    pub name: String,
    pub dimension: u32,
    pub metric: VectorMetric,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl VectorIndex {
    pub fn is_valid(&self) -> bool {
        self.dimension > 0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchIndex {
    pub name: String,
    pub fields: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchDocument {
    pub name: String,
    pub source_index: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Vector {
    pub name: String,
    pub dimension: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Embedding {
    pub name: String,
    pub model: String,
    pub dimension: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Document {
    pub name: String,
    pub shape: serde_json::Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EmbeddedDocument {
    pub name: String,
    pub parent: String,
    pub shape: serde_json::Value,
}

/// An edge between two node labels, carried as a first-class USM object
/// when a schema targets a graph paradigm (see Translator §4.7 decomposition).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Relationship {
    pub name: String,
    pub from_node: String,
    pub to_node: String,
    pub properties: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Path {
    pub name: String,
    pub node_sequence: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Blob {
    pub name: String,
    pub content_type: Option<String>,
}
