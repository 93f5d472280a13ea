use crate::primitives::{Column, Constraint, Field, Index};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A relational (or relational-like) table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Table {
    pub name: String,
    pub columns: BTreeMap<String, Column>,
    pub indexes: BTreeMap<String, Index>,
    pub constraints: BTreeMap<String, Constraint>,
}

/// A document collection (Mongo-style).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Collection {
    pub name: String,
    pub fields: BTreeMap<String, Field>,
    pub indexes: BTreeMap<String, Index>,
}

/// A graph node label and its property keys.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Node {
    pub name: String,
    pub properties: BTreeMap<String, crate::primitives::PropertyKey>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct MemoryTable {
    pub name: String,
    pub columns: BTreeMap<String, Column>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TemporaryTable {
    pub name: String,
    pub columns: BTreeMap<String, Column>,
    /// "session" or "transaction", per the engine's temp-table scope.
    pub scope: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TransientTable {
    pub name: String,
    pub columns: BTreeMap<String, Column>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Cache {
    pub name: String,
    pub ttl_seconds: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Catalog {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Database {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DbSchema {
    pub name: String,
}
