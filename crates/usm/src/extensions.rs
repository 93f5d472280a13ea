use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Extension {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Plugin {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TtlSetting {
    pub name: String,
    pub table: String,
    pub ttl_seconds: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Projection {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AggregationOp {
    pub name: String,
    pub definition: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TransformationStep {
    pub name: String,
    pub definition: String,
}

/// A lightweight pointer into the enrichment model, carried inline on the
/// USM when an adapter chooses to annotate an object at discovery time.
/// The enrichment crate's richer records are the source of truth; this is
/// advisory only, per §3.2.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EnrichmentRef {
    pub name: String,
    pub object_path: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BufferPool {
    pub name: String,
    pub size_bytes: u64,
    pub parameters: BTreeMap<String, String>,
}
