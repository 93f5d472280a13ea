use capability::Paradigm;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    Identical,
    Compatible,
    Partial,
    Incompatible,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Approach {
    SameParadigm,
    CrossParadigm,
    MultiStep,
    Impossible,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Trivial,
    Simple,
    Moderate,
    Complex,
    Impossible,
}

/// One of the transformation approaches the translator can apply, ordered
/// by preference within an [`Approach`] (§4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Direct,
    Transform,
    Normalization,
    Denormalization,
    Decomposition,
    Aggregation,
    Hybrid,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ParadigmAnalysisResult {
    pub source_paradigms: Vec<Paradigm>,
    pub target_paradigms: Vec<Paradigm>,
    pub compatibility: Compatibility,
    pub approach: Approach,
    pub complexity: Complexity,
    pub requires_enrichment: bool,
    pub required_enrichment_types: Vec<String>,
    pub available_strategies: Vec<Strategy>,
    pub recommended_strategy: Option<Strategy>,
    pub estimated_success_rate: f64,
    pub unsupported_features: Vec<String>,
    pub recommendations: Vec<String>,
}
