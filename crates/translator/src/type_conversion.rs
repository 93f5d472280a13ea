use capability::DatabaseType;
use std::collections::BTreeMap;

/// A canonical, engine-neutral scalar type name used as the join key
/// between a source engine's spelling and a target engine's spelling.
/// Anything not recognized as an alias of one of these passes through
/// verbatim with a warning (§4.7 "Type conversion is table-driven;
/// precision/scale loss is warned, not silently coerced").
fn canonicalize(data_type: &str) -> Option<&'static str> {
    match data_type.trim().to_ascii_lowercase().as_str() {
        "integer" | "int" | "int4" => Some("integer"),
        "bigint" | "int8" => Some("bigint"),
        "smallint" | "int2" => Some("smallint"),
        "boolean" | "bool" => Some("boolean"),
        "text" => Some("text"),
        "timestamp" | "timestamptz" | "timestamp with time zone" | "timestamp without time zone" => {
            Some("timestamp")
        }
        _ => None,
    }
}

fn target_spelling(target: DatabaseType, canonical: &str) -> Option<&'static str> {
    let table: BTreeMap<&str, &str> = match target {
        DatabaseType::MySql => [
            ("integer", "int"),
            ("bigint", "bigint"),
            ("smallint", "smallint"),
            ("boolean", "tinyint(1)"),
            ("text", "text"),
            ("timestamp", "datetime"),
        ]
        .into_iter()
        .collect(),
        DatabaseType::PostgreSql | DatabaseType::Hana => [
            ("integer", "integer"),
            ("bigint", "bigint"),
            ("smallint", "smallint"),
            ("boolean", "boolean"),
            ("text", "text"),
            ("timestamp", "timestamp"),
        ]
        .into_iter()
        .collect(),
        _ => return None,
    };
    table.get(canonical).copied()
}

/// Converts a varchar-family type's length parameter across engines that
/// share the `varchar(n)` spelling; returns the length, lowercased prefix
/// preserved, if `data_type` parses as one.
fn varchar_length(data_type: &str) -> Option<&str> {
    let lower = data_type.trim();
    let lower_ci = lower.to_ascii_lowercase();
    if lower_ci.starts_with("varchar(") && lower_ci.ends_with(')') {
        Some(&lower[lower_ci.find('(').unwrap() + 1..lower.len() - 1])
    } else {
        None
    }
}

/// Converts one column's data type from `source` to `target`'s spelling.
/// Returns the converted type plus an optional warning; a `None` warning
/// means the conversion is lossless and well-known.
pub fn convert_column_type(
    source: DatabaseType,
    target: DatabaseType,
    data_type: &str,
) -> (String, Option<String>) {
    if let Some(len) = varchar_length(data_type) {
        return (format!("varchar({len})"), None);
    }

    match canonicalize(data_type) {
        Some(canonical) => match target_spelling(target, canonical) {
            Some(converted) => (converted.to_string(), None),
            None => (
                data_type.to_string(),
                Some(format!(
                    "no {target} spelling known for canonical type '{canonical}' (from {source} '{data_type}'); copied verbatim"
                )),
            ),
        },
        None => (
            data_type.to_string(),
            Some(format!(
                "no conversion rule for {source} type '{data_type}'; copied verbatim, verify compatibility with {target}"
            )),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_integer_becomes_mysql_int() {
        let (converted, warning) = convert_column_type(DatabaseType::PostgreSql, DatabaseType::MySql, "integer");
        assert_eq!(converted, "int");
        assert!(warning.is_none());
    }

    #[test]
    fn varchar_length_is_preserved_across_engines() {
        let (converted, warning) =
            convert_column_type(DatabaseType::PostgreSql, DatabaseType::MySql, "varchar(255)");
        assert_eq!(converted, "varchar(255)");
        assert!(warning.is_none());
    }

    #[test]
    fn unknown_type_passes_through_with_a_warning() {
        let (converted, warning) =
            convert_column_type(DatabaseType::PostgreSql, DatabaseType::MySql, "tsvector");
        assert_eq!(converted, "tsvector");
        assert!(warning.is_some());
    }
}
