//! Drives schema translation between two engines under the Paradigm
//! Analyzer's guidance (§4.7). The translator never talks to a live
//! database; its sole input is a [`TranslationRequest`] carrying the
//! source's already-discovered [`usm::UnifiedSchema`].

mod mapper;
mod transformer;
mod type_conversion;
mod types;
mod validate;

pub use types::{
    TranslationAnalysis, TranslationPreferences, TranslationReport, TranslationRequest, TranslationResult,
    UnsupportedFeature,
};

use capability::DatabaseType;
use db_errors::TranslationError;
use paradigm::Approach;

/// Steps 1-2 of the pipeline only, for callers that want to gate an
/// expensive run (or surface a compatibility estimate to a user) without
/// producing a target schema.
pub fn analyze_translation(
    source: DatabaseType,
    target: DatabaseType,
) -> Result<TranslationAnalysis, TranslationError> {
    if capability::get(source).is_none() {
        return Err(TranslationError::UnrecognizedType(source.to_string()));
    }
    if capability::get(target).is_none() {
        return Err(TranslationError::UnrecognizedType(target.to_string()));
    }

    let analysis = paradigm::analyze(source, target);
    let mut warnings = Vec::new();
    if matches!(analysis.approach, Approach::Impossible) {
        warnings.push(format!("no known conversion path from {source} to {target}"));
    }

    Ok(TranslationAnalysis {
        projected_success_rate: analysis.estimated_success_rate,
        analysis,
        warnings,
    })
}

/// The full four-step pipeline: Validate, Analyze, Dispatch, Produce (§4.7).
pub fn translate(request: TranslationRequest) -> Result<TranslationResult, TranslationError> {
    validate::validate(&request)?;

    let analysis = paradigm::analyze(request.source_type, request.target_type);

    match analysis.approach {
        Approach::SameParadigm => Ok(run_same_paradigm(&request)),
        Approach::CrossParadigm => Ok(run_cross_paradigm(&request)),
        Approach::MultiStep => run_multi_step(&request),
        Approach::Impossible => Ok(failure(
            format!(
                "no conversion path exists from {} to {}",
                request.source_type, request.target_type
            ),
            Vec::new(),
        )),
    }
}

fn run_same_paradigm(request: &TranslationRequest) -> TranslationResult {
    let (target_schema, warnings) = mapper::map_schema(request.source_type, request.target_type, &request.source_schema);
    success(target_schema, vec![paradigm::Strategy::Direct], warnings, Vec::new())
}

fn run_cross_paradigm(request: &TranslationRequest) -> TranslationResult {
    let (target_schema, mut warnings, unsupported_features) =
        transformer::transform(request.source_type, request.target_type, &request.source_schema);

    if request.enrichment.is_none() {
        warnings.push(
            "no enrichment model supplied; entity/junction/lookup classification used structural heuristics only"
                .to_string(),
        );
    }

    let strategy = if capability::must_get(request.target_type).has_paradigm(capability::Paradigm::Graph) {
        paradigm::Strategy::Decomposition
    } else {
        paradigm::Strategy::Denormalization
    };

    success(target_schema, vec![strategy], warnings, unsupported_features)
}

/// Multi-step translation runs source -> relational -> target as two chained
/// same/cross-paradigm translations and concatenates their reports, since
/// there is no direct matrix entry between the two paradigms (§4.7 step 4).
fn run_multi_step(request: &TranslationRequest) -> Result<TranslationResult, TranslationError> {
    let hop = DatabaseType::PostgreSql;
    if hop == request.source_type || hop == request.target_type {
        return Ok(failure(
            "multi-step chaining requires a distinct relational hop".to_string(),
            Vec::new(),
        ));
    }

    let first_leg = TranslationRequest {
        source_type: request.source_type,
        target_type: hop,
        source_schema: request.source_schema.clone(),
        enrichment: request.enrichment.clone(),
        preferences: request.preferences.clone(),
    };
    let first_result = translate(first_leg)?;
    if !first_result.success {
        return Ok(first_result);
    }

    let second_leg = TranslationRequest {
        source_type: hop,
        target_type: request.target_type,
        source_schema: first_result.target_schema,
        enrichment: request.enrichment.clone(),
        preferences: request.preferences.clone(),
    };
    let second_result = translate(second_leg)?;

    let mut strategies = first_result.report.strategies_used;
    strategies.extend(second_result.report.strategies_used);
    let mut warnings = first_result.warnings;
    warnings.extend(second_result.warnings);
    let mut unsupported_features = first_result.unsupported_features;
    unsupported_features.extend(second_result.unsupported_features);

    Ok(if second_result.success {
        success(second_result.target_schema, strategies, warnings, unsupported_features)
    } else {
        failure(
            second_result.failure_reason.unwrap_or_else(|| "second leg of multi-step translation failed".to_string()),
            warnings,
        )
    })
}

fn success(
    target_schema: usm::UnifiedSchema,
    strategies_used: Vec<paradigm::Strategy>,
    warnings: Vec<String>,
    unsupported_features: Vec<UnsupportedFeature>,
) -> TranslationResult {
    TranslationResult {
        report: TranslationReport {
            summary: format!("translated to {:?} using {} object(s)", target_schema.db_type, strategies_used.len()),
            strategies_used,
        },
        target_schema,
        user_decisions: Vec::new(),
        warnings,
        unsupported_features,
        processing_time_ms: 0,
        success: true,
        failure_reason: None,
    }
}

fn failure(reason: String, warnings: Vec<String>) -> TranslationResult {
    TranslationResult {
        target_schema: usm::UnifiedSchema::default(),
        report: TranslationReport::default(),
        user_decisions: Vec::new(),
        warnings,
        unsupported_features: Vec::new(),
        processing_time_ms: 0,
        success: false,
        failure_reason: Some(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usm::{Column, Table, UnifiedSchema};

    fn users_schema(db_type: DatabaseType) -> UnifiedSchema {
        let mut schema = UnifiedSchema::new(db_type);
        let mut table = Table {
            name: "users".into(),
            ..Default::default()
        };
        table.columns.insert(
            "id".into(),
            Column {
                name: "id".into(),
                data_type: "integer".into(),
                is_primary_key: true,
                auto_increment: true,
                ..Default::default()
            },
        );
        table.columns.insert(
            "email".into(),
            Column {
                name: "email".into(),
                data_type: "varchar(255)".into(),
                ..Default::default()
            },
        );
        schema.insert_table(table);
        schema
    }

    fn request(source: DatabaseType, target: DatabaseType) -> TranslationRequest {
        TranslationRequest {
            source_type: source,
            target_type: target,
            source_schema: users_schema(source),
            enrichment: None,
            preferences: TranslationPreferences::default(),
        }
    }

    #[test]
    fn same_paradigm_translation_preserves_auto_increment_and_converts_types() {
        let result = translate(request(DatabaseType::PostgreSql, DatabaseType::MySql)).unwrap();
        assert!(result.success);
        let table = result.target_schema.tables.get("users").unwrap();
        assert_eq!(table.columns.get("id").unwrap().data_type, "int");
        assert!(table.columns.get("id").unwrap().auto_increment);
    }

    #[test]
    fn cross_paradigm_translation_to_document_produces_a_collection() {
        let result = translate(request(DatabaseType::PostgreSql, DatabaseType::MongoDb)).unwrap();
        assert!(result.success);
        assert!(result.target_schema.collections.contains_key("users"));
        assert_eq!(result.report.strategies_used, vec![paradigm::Strategy::Denormalization]);
    }

    #[test]
    fn cross_paradigm_translation_to_graph_produces_a_node() {
        let result = translate(request(DatabaseType::PostgreSql, DatabaseType::Neo4j)).unwrap();
        assert!(result.success);
        assert!(result.target_schema.nodes.contains_key("users"));
        assert_eq!(result.report.strategies_used, vec![paradigm::Strategy::Decomposition]);
    }

    #[test]
    fn translation_is_deterministic_across_repeated_runs() {
        let first = translate(request(DatabaseType::PostgreSql, DatabaseType::MongoDb)).unwrap();
        let second = translate(request(DatabaseType::PostgreSql, DatabaseType::MongoDb)).unwrap();
        assert!(first.deterministically_eq(&second));
    }

    #[test]
    fn unreachable_pair_reports_failure_not_an_error() {
        let result = translate(request(DatabaseType::ObjectStorage, DatabaseType::Pinecone)).unwrap();
        assert!(!result.success);
        assert!(result.failure_reason.is_some());
    }
}
