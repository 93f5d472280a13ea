use adapter::{ChangeOperation, ReplicationChange, Row};
use std::collections::BTreeMap;

/// Snapshots entities by primary key for engines with no native CDC (e.g.
/// vector stores) and diffs consecutive snapshots to synthesize
/// INSERT/UPDATE/DELETE events (§4.5). Value equality is the row's own
/// `PartialEq` via `serde_json::Value` comparison, i.e. normalized
/// structural equality, not byte-identity of the source payload.
///
/// This is "best-effort" CDC: writes that happen and are overwritten
/// between two polls are invisible (§9 open question, "eventually
/// consistent CDC").
pub struct PollingDiffer {
    source_id: String,
    table: String,
    last_snapshot: BTreeMap<String, Row>,
    tick: u64,
}

impl PollingDiffer {
    pub fn new(source_id: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            table: table.into(),
            last_snapshot: BTreeMap::new(),
            tick: 0,
        }
    }

    /// Diffs `snapshot` (current entity state keyed by primary key) against
    /// the previously recorded snapshot and returns synthetic change
    /// events in (added, changed, removed) order for a single tick.
    pub fn diff(&mut self, snapshot: BTreeMap<String, Row>) -> Vec<ReplicationChange> {
        self.tick += 1;
        let position = self.tick.to_string();
        let mut changes = Vec::new();

        for (key, row) in &snapshot {
            match self.last_snapshot.get(key) {
                None => changes.push(ReplicationChange {
                    source_id: self.source_id.clone(),
                    table: self.table.clone(),
                    namespace: None,
                    operation: ChangeOperation::Insert,
                    data: Some(row.clone()),
                    old_data: None,
                    position: position.clone(),
                }),
                Some(old) if old != row => changes.push(ReplicationChange {
                    source_id: self.source_id.clone(),
                    table: self.table.clone(),
                    namespace: None,
                    operation: ChangeOperation::Update,
                    data: Some(row.clone()),
                    old_data: Some(old.clone()),
                    position: position.clone(),
                }),
                Some(_) => {}
            }
        }

        for (key, old) in &self.last_snapshot {
            if !snapshot.contains_key(key) {
                changes.push(ReplicationChange {
                    source_id: self.source_id.clone(),
                    table: self.table.clone(),
                    namespace: None,
                    operation: ChangeOperation::Delete,
                    data: None,
                    old_data: Some(old.clone()),
                    position: position.clone(),
                });
            }
        }

        self.last_snapshot = snapshot;
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: &str, value: &str) -> Row {
        let mut r = Row::new();
        r.insert("id".into(), json!(id));
        r.insert("value".into(), json!(value));
        r
    }

    #[test]
    fn full_lifecycle_produces_insert_update_delete() {
        let mut differ = PollingDiffer::new("src-1", "vectors");

        let mut snap = BTreeMap::new();
        snap.insert("v1".to_string(), row("v1", "a"));
        let inserts = differ.diff(snap.clone());
        assert_eq!(inserts.len(), 1);
        assert_eq!(inserts[0].operation, ChangeOperation::Insert);

        snap.insert("v1".to_string(), row("v1", "b"));
        let updates = differ.diff(snap.clone());
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].operation, ChangeOperation::Update);

        let deletes = differ.diff(BTreeMap::new());
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].operation, ChangeOperation::Delete);
        assert_eq!(deletes[0].old_data.as_ref().unwrap().get("id"), Some(&json!("v1")));
    }

    #[test]
    fn unchanged_rows_produce_no_events() {
        let mut differ = PollingDiffer::new("src-1", "vectors");
        let mut snap = BTreeMap::new();
        snap.insert("v1".to_string(), row("v1", "a"));
        differ.diff(snap.clone());
        assert!(differ.diff(snap).is_empty());
    }
}
