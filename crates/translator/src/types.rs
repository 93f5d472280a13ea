use capability::DatabaseType;
use enrichment::EnrichmentModel;
use paradigm::Strategy;
use serde::{Deserialize, Serialize};
use usm::UnifiedSchema;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TranslationPreferences {
    pub preferred_strategy: Option<Strategy>,
    pub accept_data_loss: bool,
}

/// The translator's sole input (§4.7). The translator never consults the
/// source engine -- it operates entirely on `source_schema`, the USM an
/// adapter already discovered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TranslationRequest {
    pub source_type: DatabaseType,
    pub target_type: DatabaseType,
    pub source_schema: UnifiedSchema,
    pub enrichment: Option<EnrichmentModel>,
    pub preferences: TranslationPreferences,
}

/// A feature the translator could not carry across the conversion,
/// structured rather than dropped silently (§4.7).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct UnsupportedFeature {
    pub feature_type: String,
    pub object_type: String,
    pub object_name: String,
    pub description: String,
    pub alternatives: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TranslationReport {
    pub strategies_used: Vec<Strategy>,
    pub summary: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TranslationResult {
    pub target_schema: UnifiedSchema,
    pub report: TranslationReport,
    pub user_decisions: Vec<String>,
    pub warnings: Vec<String>,
    pub unsupported_features: Vec<UnsupportedFeature>,
    pub processing_time_ms: u64,
    pub success: bool,
    pub failure_reason: Option<String>,
}

impl TranslationResult {
    /// Two translator runs over the same request are "equal" modulo wall
    /// clock time (§8 invariant 8: "Translate(req) = Translate(req) under
    /// pointer-independent equality of outputs" -- `processing_time_ms`
    /// is observably non-deterministic and excluded by construction).
    pub fn deterministically_eq(&self, other: &Self) -> bool {
        self.target_schema == other.target_schema
            && self.report == other.report
            && self.user_decisions == other.user_decisions
            && self.warnings == other.warnings
            && self.unsupported_features == other.unsupported_features
            && self.success == other.success
            && self.failure_reason == other.failure_reason
    }
}

/// Returned by the `AnalyzeTranslation` entrypoint (steps 1-2 only), used
/// by callers to gate expensive runs (§4.7).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TranslationAnalysis {
    pub analysis: paradigm::ParadigmAnalysisResult,
    pub projected_success_rate: f64,
    pub warnings: Vec<String>,
}
