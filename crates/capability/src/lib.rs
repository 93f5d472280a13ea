//! The Capability Registry: a process-lifetime, write-once catalog mapping each
//! recognized [`DatabaseType`] to its [`Capability`] (supported paradigms plus
//! feature flags). Populated once at process start and read-only thereafter.

mod registry;
mod types;

pub use registry::CapabilityRegistry;
pub use types::{Capability, DatabaseType, Paradigm};

use std::sync::OnceLock;

static REGISTRY: OnceLock<CapabilityRegistry> = OnceLock::new();

fn registry() -> &'static CapabilityRegistry {
    REGISTRY.get_or_init(CapabilityRegistry::with_defaults)
}

/// Look up a database type's capability. Returns `None` for an unrecognized
/// type; callers at a public boundary should treat that as a client error.
pub fn get(db_type: DatabaseType) -> Option<&'static Capability> {
    registry().get(db_type)
}

/// Look up a database type's capability, panicking if it is absent.
///
/// Only call this where the type has already been validated against the
/// registry (e.g. it was deserialized from a closed wire enum) -- an
/// unrecognized type here is a programming error, not a client error.
pub fn must_get(db_type: DatabaseType) -> &'static Capability {
    registry()
        .get(db_type)
        .unwrap_or_else(|| panic!("database type {db_type:?} missing from capability registry"))
}

/// All recognized database type ids, in a stable (sorted) order.
pub fn ids() -> Vec<DatabaseType> {
    registry::ids(registry())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_is_deterministic() {
        let a = get(DatabaseType::PostgreSql).expect("postgresql is registered");
        let b = get(DatabaseType::PostgreSql).expect("postgresql is registered");
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_type_is_absent() {
        // Every variant of the closed enum is registered; there is no way to
        // construct an "unknown" DatabaseType from within the crate. Callers
        // at the wire boundary that fail to parse a type string never reach
        // this registry at all -- that's enforced by the enum itself.
        for t in ids() {
            assert!(get(t).is_some());
        }
    }

    #[test]
    fn postgres_supports_cdc_and_transactions() {
        let cap = must_get(DatabaseType::PostgreSql);
        assert!(cap.supports_cdc);
        assert!(cap.supports_transactions);
        assert!(cap.paradigms.contains(&Paradigm::Relational));
    }

    #[test]
    fn object_storage_is_not_relational() {
        let cap = must_get(DatabaseType::ObjectStorage);
        assert!(!cap.paradigms.contains(&Paradigm::Relational));
        assert!(cap.paradigms.contains(&Paradigm::ObjectStorage));
    }
}
