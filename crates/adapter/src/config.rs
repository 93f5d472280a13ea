use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Connection parameters for a single database (§6 Configuration).
/// `password` is carried ciphertext-side; adapters decrypt it through the
/// external `DecryptPassword(tenantId, ciphertext)` collaborator (§9) before
/// handing it to the vendor driver -- that collaborator is out of scope for
/// this workspace and is injected by the caller as a plain string already
/// resolved, or left encrypted for adapters that defer decryption to the
/// driver itself.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ConnectionConfig {
    pub database_id: String,
    pub tenant_id: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database_name: String,
    pub ssl: bool,
    pub ssl_mode: Option<String>,
    pub connection_string: Option<String>,
    /// Engine-specific keys not common enough to promote to a field
    /// (e.g. Cassandra's `local_datacenter`, object storage's `region`).
    pub extra: BTreeMap<String, String>,
}

/// Same shape as [`ConnectionConfig`] minus `database_name`, plus an
/// instance id and optional default database for administrative
/// connections (creating/dropping databases) (§6).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InstanceConfig {
    pub instance_id: String,
    pub tenant_id: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub default_database: Option<String>,
    pub ssl: bool,
    pub ssl_mode: Option<String>,
    pub connection_string: Option<String>,
    pub extra: BTreeMap<String, String>,
}

/// Options passed to `ListDatabases`/`CreateDatabase`/`DropDatabase`; the
/// recognized keys are engine-defined (§4.3).
pub type AdminOptions = BTreeMap<String, String>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StreamParams {
    pub target: String,
    pub batch_size: u32,
    pub cursor: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StreamPage {
    pub rows: Vec<BTreeMap<String, serde_json::Value>>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}
