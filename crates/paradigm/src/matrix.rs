use crate::types::Strategy;
use capability::Paradigm;
use std::collections::BTreeMap;

/// The static cross-paradigm compatibility matrix (§4.6 step 3): pairs of
/// paradigms with no paradigm in common but a known transformation path,
/// each with its ordered list of candidate strategies (first = most
/// preferred). Stored unordered (`a <= b`) since the matrix is symmetric --
/// whichever side is "source" only affects which strategy direction makes
/// sense, not whether a path exists at all.
pub fn compatibility_matrix() -> BTreeMap<(Paradigm, Paradigm), Vec<Strategy>> {
    use Paradigm::*;
    use Strategy::*;

    let pairs: &[(Paradigm, Paradigm, &[Strategy])] = &[
        (Relational, Document, &[Denormalization, Normalization]),
        (Relational, Graph, &[Decomposition, Aggregation]),
        (Relational, KeyValue, &[Transform, Denormalization]),
        (Relational, Columnar, &[Transform]),
        (Relational, WideColumn, &[Transform, Denormalization]),
        (Document, Graph, &[Decomposition, Aggregation]),
        (Document, KeyValue, &[Transform]),
        (Document, SearchIndex, &[Transform]),
        (Document, Vector, &[Transform]),
        (Graph, KeyValue, &[Aggregation, Transform]),
        (Columnar, TimeSeries, &[Transform]),
    ];

    let mut matrix = BTreeMap::new();
    for (a, b, strategies) in pairs {
        matrix.insert(key(*a, *b), strategies.to_vec());
    }
    matrix
}

fn key(a: Paradigm, b: Paradigm) -> (Paradigm, Paradigm) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

pub fn lookup(a: Paradigm, b: Paradigm) -> Option<Vec<Strategy>> {
    compatibility_matrix().get(&key(a, b)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_symmetric() {
        assert_eq!(
            lookup(Paradigm::Relational, Paradigm::Graph),
            lookup(Paradigm::Graph, Paradigm::Relational)
        );
    }

    #[test]
    fn unlisted_pair_has_no_entry() {
        assert!(lookup(Paradigm::Vector, Paradigm::TimeSeries).is_none());
    }
}
