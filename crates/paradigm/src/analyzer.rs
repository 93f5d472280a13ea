use crate::matrix;
use crate::types::{Approach, Compatibility, Complexity, ParadigmAnalysisResult, Strategy};
use capability::{DatabaseType, Paradigm};
use std::collections::BTreeSet;

fn paradigms_of(db_type: DatabaseType) -> Vec<Paradigm> {
    capability::must_get(db_type).paradigms.clone()
}

/// Classifies a source -> target conversion and selects a strategy (§4.6).
/// Never fails: every `DatabaseType` passed in is assumed already validated
/// against the Capability Registry (callers that haven't done so should
/// reject the request before reaching here, as the translator does in its
/// own Validate step).
pub fn analyze(source: DatabaseType, target: DatabaseType) -> ParadigmAnalysisResult {
    let source_paradigms = paradigms_of(source);
    let target_paradigms = paradigms_of(target);

    let source_set: BTreeSet<Paradigm> = source_paradigms.iter().copied().collect();
    let target_set: BTreeSet<Paradigm> = target_paradigms.iter().copied().collect();

    if source_set == target_set {
        return same_paradigm_result(
            source_paradigms,
            target_paradigms,
            Compatibility::Identical,
            Complexity::Trivial,
            vec![Strategy::Direct],
        );
    }

    if !source_set.is_disjoint(&target_set) {
        return same_paradigm_result(
            source_paradigms,
            target_paradigms,
            Compatibility::Compatible,
            Complexity::Simple,
            vec![Strategy::Direct, Strategy::Transform],
        );
    }

    // Step 3: consult the static cross-paradigm compatibility matrix.
    for &sp in &source_paradigms {
        for &tp in &target_paradigms {
            if let Some(strategies) = matrix::lookup(sp, tp) {
                return ParadigmAnalysisResult {
                    source_paradigms,
                    target_paradigms,
                    compatibility: Compatibility::Partial,
                    approach: Approach::CrossParadigm,
                    complexity: Complexity::Moderate,
                    requires_enrichment: true,
                    required_enrichment_types: vec!["TableEnrichment".to_string()],
                    estimated_success_rate: 0.7,
                    recommended_strategy: strategies.first().copied(),
                    available_strategies: strategies,
                    unsupported_features: Vec::new(),
                    recommendations: vec![
                        "provide enrichment so the transformer can classify entity/junction/lookup tables".to_string(),
                    ],
                };
            }
        }
    }

    // Step 4: probe a multi-step path through relational.
    let source_reaches_relational =
        source_set.contains(&Paradigm::Relational) || matrix_reaches(&source_paradigms, Paradigm::Relational);
    let target_reaches_relational =
        target_set.contains(&Paradigm::Relational) || matrix_reaches(&target_paradigms, Paradigm::Relational);

    if source_reaches_relational && target_reaches_relational {
        return ParadigmAnalysisResult {
            source_paradigms,
            target_paradigms,
            compatibility: Compatibility::Partial,
            approach: Approach::MultiStep,
            complexity: Complexity::Complex,
            requires_enrichment: true,
            required_enrichment_types: vec!["TableEnrichment".to_string()],
            available_strategies: vec![Strategy::Hybrid],
            recommended_strategy: Some(Strategy::Hybrid),
            estimated_success_rate: 0.4,
            unsupported_features: Vec::new(),
            recommendations: vec!["run source -> relational, then relational -> target as two chained translations".to_string()],
        };
    }

    // Step 5: impossible.
    ParadigmAnalysisResult {
        source_paradigms,
        target_paradigms,
        compatibility: Compatibility::Incompatible,
        approach: Approach::Impossible,
        complexity: Complexity::Impossible,
        requires_enrichment: false,
        required_enrichment_types: Vec::new(),
        available_strategies: Vec::new(),
        recommended_strategy: None,
        estimated_success_rate: 0.0,
        unsupported_features: Vec::new(),
        recommendations: vec!["no known conversion path".to_string()],
    }
}

fn matrix_reaches(paradigms: &[Paradigm], target: Paradigm) -> bool {
    paradigms.iter().any(|&p| matrix::lookup(p, target).is_some())
}

fn same_paradigm_result(
    source_paradigms: Vec<Paradigm>,
    target_paradigms: Vec<Paradigm>,
    compatibility: Compatibility,
    complexity: Complexity,
    available_strategies: Vec<Strategy>,
) -> ParadigmAnalysisResult {
    ParadigmAnalysisResult {
        source_paradigms,
        target_paradigms,
        compatibility,
        approach: Approach::SameParadigm,
        complexity,
        requires_enrichment: false,
        required_enrichment_types: Vec::new(),
        recommended_strategy: available_strategies.first().copied(),
        available_strategies,
        estimated_success_rate: 0.95,
        unsupported_features: Vec::new(),
        recommendations: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_paradigm_pair_is_identical_and_trivial() {
        let result = analyze(DatabaseType::PostgreSql, DatabaseType::MySql);
        assert_eq!(result.compatibility, Compatibility::Identical);
        assert_eq!(result.approach, Approach::SameParadigm);
    }

    #[test]
    fn relational_to_document_is_cross_paradigm() {
        let result = analyze(DatabaseType::PostgreSql, DatabaseType::MongoDb);
        assert_eq!(result.approach, Approach::CrossParadigm);
        assert!(result.available_strategies.contains(&Strategy::Denormalization));
    }

    #[test]
    fn relational_to_graph_is_cross_paradigm_decomposition() {
        let result = analyze(DatabaseType::PostgreSql, DatabaseType::Neo4j);
        assert_eq!(result.approach, Approach::CrossParadigm);
        assert_eq!(result.recommended_strategy, Some(Strategy::Decomposition));
    }

    #[test]
    fn analyze_is_symmetric_for_identical_pairs() {
        let forward = analyze(DatabaseType::PostgreSql, DatabaseType::MySql);
        let backward = analyze(DatabaseType::MySql, DatabaseType::PostgreSql);
        assert_eq!(forward.compatibility, backward.compatibility);
    }

    #[test]
    fn unreachable_pair_is_impossible() {
        // object storage has no matrix entry and no paradigm overlap with vector.
        let result = analyze(DatabaseType::ObjectStorage, DatabaseType::Pinecone);
        assert_eq!(result.approach, Approach::Impossible);
    }
}
