use adapter::{ChangeOperation, ReplicationChange, Row};

/// One row of a trigger-maintained shadow log table, e.g. HANA's
/// `<T>_CDC_LOG` with original columns plus `CDC_OPERATION`,
/// `CDC_TIMESTAMP`, and a monotonic `CDC_COMMIT_ID` (§4.3 "Trigger-based
/// CDC"). The adapter is responsible for creating the shadow table and its
/// AFTER-INSERT/UPDATE/DELETE triggers; this type only models reading it
/// back.
#[derive(Clone, Debug, PartialEq)]
pub struct CdcLogRow {
    pub commit_id: u64,
    pub operation: ChangeOperation,
    pub data: Row,
}

/// Turns a batch of shadow-log rows (assumed already fetched in commit-id
/// order, e.g. `SELECT * FROM T_CDC_LOG WHERE CDC_COMMIT_ID > ? ORDER BY
/// CDC_COMMIT_ID`) into normalized changes plus the new high-water mark.
/// Rows at or below `since_commit_id` are ignored defensively even if the
/// caller's query already filtered them.
pub fn changes_since(
    source_id: &str,
    table: &str,
    log_rows: &[CdcLogRow],
    since_commit_id: u64,
) -> (Vec<ReplicationChange>, u64) {
    let mut high_water = since_commit_id;
    let mut changes = Vec::with_capacity(log_rows.len());

    for row in log_rows {
        if row.commit_id <= since_commit_id {
            continue;
        }
        high_water = high_water.max(row.commit_id);
        let (data, old_data) = match row.operation {
            ChangeOperation::Delete => (None, Some(row.data.clone())),
            _ => (Some(row.data.clone()), None),
        };
        changes.push(ReplicationChange {
            source_id: source_id.to_string(),
            table: table.to_string(),
            namespace: None,
            operation: row.operation,
            data,
            old_data,
            position: row.commit_id.to_string(),
        });
    }

    (changes, high_water)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(commit_id: u64, op: ChangeOperation, a: i64, b: &str) -> CdcLogRow {
        let mut data = Row::new();
        data.insert("a".into(), json!(a));
        data.insert("b".into(), json!(b));
        CdcLogRow { commit_id, operation: op, data }
    }

    #[test]
    fn insert_update_delete_round_trip_in_order() {
        let rows = vec![
            row(1, ChangeOperation::Insert, 1, "x"),
            row(2, ChangeOperation::Update, 1, "y"),
            row(3, ChangeOperation::Delete, 1, "y"),
        ];

        let (changes, high_water) = changes_since("src-1", "T", &rows, 0);
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].operation, ChangeOperation::Insert);
        assert_eq!(changes[1].operation, ChangeOperation::Update);
        assert_eq!(changes[2].operation, ChangeOperation::Delete);
        assert_eq!(high_water, 3);

        let (next_changes, next_high_water) = changes_since("src-1", "T", &rows, high_water);
        assert!(next_changes.is_empty());
        assert_eq!(next_high_water, high_water);
    }
}
