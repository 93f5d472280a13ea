use crate::types::TranslationRequest;
use db_errors::TranslationError;

/// Step 1 of `Translate` (§4.7): "non-empty types, types recognized, types
/// different, schema present". Critical failures abort via `Err`; nothing
/// here accumulates warnings because every condition checked is a hard
/// precondition, not a quality signal.
pub fn validate(request: &TranslationRequest) -> Result<(), TranslationError> {
    if request.source_type == request.target_type {
        return Err(TranslationError::InvalidRequest(format!(
            "source and target types are both {}",
            request.source_type
        )));
    }

    if capability::get(request.source_type).is_none() {
        return Err(TranslationError::UnrecognizedType(request.source_type.to_string()));
    }
    if capability::get(request.target_type).is_none() {
        return Err(TranslationError::UnrecognizedType(request.target_type.to_string()));
    }

    if schema_is_empty(&request.source_schema) {
        return Err(TranslationError::InvalidRequest(
            "source schema has no objects to translate".to_string(),
        ));
    }

    Ok(())
}

fn schema_is_empty(schema: &usm::UnifiedSchema) -> bool {
    schema.tables.is_empty()
        && schema.collections.is_empty()
        && schema.nodes.is_empty()
        && schema.vector_indexes.is_empty()
        && schema.search_indexes.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TranslationPreferences;
    use capability::DatabaseType;
    use usm::UnifiedSchema;

    fn request(source: DatabaseType, target: DatabaseType, schema: UnifiedSchema) -> TranslationRequest {
        TranslationRequest {
            source_type: source,
            target_type: target,
            source_schema: schema,
            enrichment: None,
            preferences: TranslationPreferences::default(),
        }
    }

    #[test]
    fn identical_source_and_target_is_rejected() {
        let schema = UnifiedSchema::new(DatabaseType::PostgreSql);
        let err = validate(&request(DatabaseType::PostgreSql, DatabaseType::PostgreSql, schema)).unwrap_err();
        assert!(matches!(err, TranslationError::InvalidRequest(_)));
    }

    #[test]
    fn empty_schema_is_rejected() {
        let schema = UnifiedSchema::new(DatabaseType::PostgreSql);
        let err = validate(&request(DatabaseType::PostgreSql, DatabaseType::MySql, schema)).unwrap_err();
        assert!(matches!(err, TranslationError::InvalidRequest(_)));
    }

    #[test]
    fn populated_schema_with_distinct_types_is_accepted() {
        let mut schema = UnifiedSchema::new(DatabaseType::PostgreSql);
        schema.insert_table(usm::Table {
            name: "users".into(),
            ..Default::default()
        });
        assert!(validate(&request(DatabaseType::PostgreSql, DatabaseType::MySql, schema)).is_ok());
    }
}
