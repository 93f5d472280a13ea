use crate::adapter::DatabaseAdapter;
use capability::DatabaseType;
use db_errors::{DatabaseError, ErrorKind};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// The process-wide `DatabaseType -> DatabaseAdapter` map (§3.4). Built
/// once from the full set of adapters a binary links in, then published
/// read-only: after [`install`] succeeds, [`get`] never takes a lock (§5
/// "Adapter Registry is write-once at process start; after initialization
/// it is read-only and lock-free").
pub struct AdapterRegistry {
    entries: BTreeMap<DatabaseType, Arc<dyn DatabaseAdapter>>,
}

impl AdapterRegistry {
    /// Registration is single-phase: duplicate registration for the same
    /// type fails fast rather than silently overwriting (§3.4).
    pub fn build(adapters: Vec<Arc<dyn DatabaseAdapter>>) -> Result<Self, DatabaseError> {
        let mut entries = BTreeMap::new();
        for adapter in adapters {
            let db_type = adapter.db_type();
            if entries.insert(db_type, adapter).is_some() {
                return Err(DatabaseError::new(
                    db_type,
                    "register",
                    ErrorKind::AlreadyExists,
                    format!("adapter for {db_type} already registered"),
                ));
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, db_type: DatabaseType) -> Option<Arc<dyn DatabaseAdapter>> {
        self.entries.get(&db_type).cloned()
    }

    pub fn ids(&self) -> Vec<DatabaseType> {
        self.entries.keys().copied().collect()
    }
}

static REGISTRY: OnceLock<AdapterRegistry> = OnceLock::new();

/// Publishes the process-wide registry. Must be called exactly once,
/// before any call to [`registry`] or [`get`]; a second call is a no-op
/// (the [`OnceLock`] keeps whatever was installed first) which callers
/// should treat as a startup bug, not a runtime condition to recover from.
pub fn install(registry: AdapterRegistry) {
    let _ = REGISTRY.set(registry);
}

/// Panics if [`install`] was never called -- a bug in process startup, not
/// a condition any caller can recover from.
pub fn registry() -> &'static AdapterRegistry {
    REGISTRY
        .get()
        .expect("adapter registry accessed before install() was called")
}

pub fn get(db_type: DatabaseType) -> Option<Arc<dyn DatabaseAdapter>> {
    registry().get(db_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, InstanceConfig};
    use crate::connection::{Connection, InstanceConnection};
    use async_trait::async_trait;
    use capability::Capability;
    use tokio_util::sync::CancellationToken;

    struct StubAdapter(DatabaseType);

    #[async_trait]
    impl DatabaseAdapter for StubAdapter {
        fn db_type(&self) -> DatabaseType {
            self.0
        }

        fn capabilities(&self) -> Capability {
            capability::must_get(self.0).clone()
        }

        async fn connect(
            &self,
            _ctx: CancellationToken,
            _config: ConnectionConfig,
        ) -> Result<Arc<dyn Connection>, DatabaseError> {
            unimplemented!("stub")
        }

        async fn connect_instance(
            &self,
            _ctx: CancellationToken,
            _config: InstanceConfig,
        ) -> Result<Arc<dyn InstanceConnection>, DatabaseError> {
            unimplemented!("stub")
        }
    }

    #[test]
    fn duplicate_registration_fails_fast() {
        let adapters: Vec<Arc<dyn DatabaseAdapter>> = vec![
            Arc::new(StubAdapter(DatabaseType::PostgreSql)),
            Arc::new(StubAdapter(DatabaseType::PostgreSql)),
        ];
        let err = AdapterRegistry::build(adapters).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyExists);
    }

    #[test]
    fn distinct_types_register_cleanly() {
        let adapters: Vec<Arc<dyn DatabaseAdapter>> = vec![
            Arc::new(StubAdapter(DatabaseType::PostgreSql)),
            Arc::new(StubAdapter(DatabaseType::MySql)),
        ];
        let registry = AdapterRegistry::build(adapters).expect("builds");
        assert!(registry.get(DatabaseType::PostgreSql).is_some());
        assert!(registry.get(DatabaseType::MongoDb).is_none());
        assert_eq!(registry.ids().len(), 2);
    }
}
