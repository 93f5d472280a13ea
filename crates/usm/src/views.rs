use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct View {
    pub name: String,
    pub definition: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct LiveView {
    pub name: String,
    pub definition: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WindowView {
    pub name: String,
    pub definition: String,
    pub window: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    OnCommit,
    Manual,
    Scheduled,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        RefreshPolicy::Manual
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct MaterializedView {
    pub name: String,
    pub definition: String,
    pub columns: BTreeMap<String, String>,
    pub refresh_policy: RefreshPolicy,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ExternalTable {
    pub name: String,
    pub location: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ForeignTable {
    pub name: String,
    pub foreign_server: String,
}
