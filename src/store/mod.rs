//! sled-backed cache store (component H).
//!
//! Five trees: `cache_entries` holds the actual `StoredEntry` rows; the
//! other four are secondary indexes that let a write find its *candidate*
//! entries without decoding the entire table's entries from `cache_entries`.
//! Indexes only ever narrow the set of entries the decider is asked to look
//! at — they never decide invalidation themselves, so a missed or stale
//! index entry can only cost precision, not soundness (the decider's own
//! `Overlap::Unknown`-invalidates default is the final authority).
//!
//! All multi-tree writes go through `sled`'s `Transactional` trait so a
//! crash between writing `cache_entries` and an index can't leave them out
//! of sync.

pub mod keys;

use std::collections::BTreeSet;
use std::path::Path;

use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};

use crate::error::StorageError;
use crate::model::{CacheKey, Classification, Fingerprint, StoredEntry, WriteInfo};

pub struct Store {
    db: Db,
    cache_entries: Tree,
    by_table: Tree,
    by_row: Tree,
    by_column: Tree,
    by_aggregate: Tree,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = sled::Config::new()
            .path(path.as_ref())
            .use_compression(true)
            .open()?;

        Ok(Self {
            cache_entries: db.open_tree("cache_entries")?,
            by_table: db.open_tree("by_table")?,
            by_row: db.open_tree("by_row")?,
            by_column: db.open_tree("by_column")?,
            by_aggregate: db.open_tree("by_aggregate")?,
            db,
        })
    }

    /// Register a query result under `key`'s fingerprint, updating every
    /// index entry in one transaction.
    pub fn register(&self, key: &CacheKey, result_blob: Vec<u8>, created_at_secs: u64) -> Result<(), StorageError> {
        let fingerprint = key.fingerprint.as_str().to_string();
        let cache_key_json = serde_json::to_string(key)?;
        let entry = StoredEntry {
            fingerprint: key.fingerprint.clone(),
            result_blob,
            cache_key_json,
            created_at_secs,
        };
        let entry_bytes = serde_json::to_vec(&entry)?;

        let table_keys = table_index_entries(key);
        let column_keys = column_index_entries(key);
        let row_keys = row_index_entries(key);
        let aggregate_keys = aggregate_index_entries(key);

        (&self.cache_entries, &self.by_table, &self.by_column, &self.by_row, &self.by_aggregate)
            .transaction(|(entries, by_table, by_column, by_row, by_aggregate)| {
                entries.insert(fingerprint.as_bytes(), entry_bytes.clone())?;
                for t in &table_keys {
                    by_table.insert(keys::table_key(t, &fingerprint), &[])?;
                }
                for (t, c) in &column_keys {
                    by_column.insert(keys::column_key(t, c, &fingerprint), &[])?;
                }
                for (t, v) in &row_keys {
                    by_row.insert(keys::row_key(t, v, &fingerprint), &[])?;
                }
                for t in &aggregate_keys {
                    by_aggregate.insert(keys::aggregate_key(t, &fingerprint), &[])?;
                }
                Ok::<(), ConflictableTransactionError<StorageError>>(())
            })
            .map_err(map_tx_error)?;

        Ok(())
    }

    pub fn get(&self, fingerprint: &str) -> Result<Option<StoredEntry>, StorageError> {
        match self.cache_entries.get(fingerprint.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn load_cache_key(&self, fingerprint: &str) -> Result<Option<CacheKey>, StorageError> {
        match self.get(fingerprint)? {
            Some(entry) => Ok(Some(serde_json::from_str(&entry.cache_key_json)?)),
            None => Ok(None),
        }
    }

    /// Candidate fingerprints a write might need to invalidate, enumerated
    /// from the secondary indexes rather than decoding every entry in
    /// `cache_entries`. `by_table(w.table, *)` is unioned in unconditionally
    /// — it's the complete candidate set for that table — so `by_row` and
    /// `by_column` never narrow the output; they exist to keep the
    /// enumeration sound as the indexes grow more selective (e.g. a future
    /// per-row `cache_entries` partitioning), and reading them here is what
    /// keeps them from being dead writes.
    pub fn candidates_for_write(&self, write: &WriteInfo) -> Result<Vec<Fingerprint>, StorageError> {
        use crate::model::WriteOperation;

        let mut out: BTreeSet<String> = BTreeSet::new();

        if let Some(rows) = write.affected_rows.as_ref().filter(|r| !r.is_empty()) {
            for row_id in rows {
                let prefix = keys::row_prefix(&write.table, row_id);
                for item in self.by_row.scan_prefix(&prefix) {
                    let (k, _) = item?;
                    if let Some(fp) = keys::fingerprint_suffix(&k, prefix.len()) {
                        out.insert(fp);
                    }
                }
            }

            if let Some(columns) = &write.modified_columns {
                for column in columns {
                    let prefix = keys::column_prefix(&write.table, column);
                    for item in self.by_column.scan_prefix(&prefix) {
                        let (k, _) = item?;
                        if let Some(fp) = keys::fingerprint_suffix(&k, prefix.len()) {
                            out.insert(fp);
                        }
                    }
                }
            }
        }

        let table_prefix = keys::table_prefix(&write.table);
        for item in self.by_table.scan_prefix(&table_prefix) {
            let (k, _) = item?;
            if let Some(fp) = keys::fingerprint_suffix(&k, table_prefix.len()) {
                out.insert(fp);
            }
        }

        if matches!(write.operation, WriteOperation::Insert | WriteOperation::Delete) {
            let agg_prefix = keys::aggregate_prefix(&write.table);
            for item in self.by_aggregate.scan_prefix(&agg_prefix) {
                let (k, _) = item?;
                if let Some(fp) = keys::fingerprint_suffix(&k, agg_prefix.len()) {
                    out.insert(fp);
                }
            }
        }

        Ok(out.into_iter().map(Fingerprint).collect())
    }

    /// All cache keys for the candidate fingerprints a write could touch,
    /// skipping any that have since been removed (index entries can go
    /// stale between the scan and this lookup; that's a missed-precision
    /// case, not a soundness one).
    pub fn candidate_keys_for_write(&self, write: &WriteInfo) -> Result<Vec<CacheKey>, StorageError> {
        let mut out = Vec::new();
        for fp in self.candidates_for_write(write)? {
            if let Some(key) = self.load_cache_key(fp.as_str())? {
                out.push(key);
            }
        }
        Ok(out)
    }

    /// Remove one entry and every index row it registered, recomputed from
    /// its own stored `CacheKey` so no index tree is left with a dangling
    /// reference to a fingerprint no longer in `cache_entries`.
    pub fn remove(&self, fingerprint: &str) -> Result<(), StorageError> {
        let Some(key) = self.load_cache_key(fingerprint)? else {
            return Ok(());
        };

        let table_keys = table_index_entries(&key);
        let column_keys = column_index_entries(&key);
        let row_keys = row_index_entries(&key);
        let aggregate_keys = aggregate_index_entries(&key);
        let fp = fingerprint.to_string();

        (&self.cache_entries, &self.by_table, &self.by_column, &self.by_row, &self.by_aggregate)
            .transaction(|(entries, by_table, by_column, by_row, by_aggregate)| {
                entries.remove(fp.as_bytes())?;
                for t in &table_keys {
                    by_table.remove(keys::table_key(t, &fp))?;
                }
                for (t, c) in &column_keys {
                    by_column.remove(keys::column_key(t, c, &fp))?;
                }
                for (t, v) in &row_keys {
                    by_row.remove(keys::row_key(t, v, &fp))?;
                }
                for t in &aggregate_keys {
                    by_aggregate.remove(keys::aggregate_key(t, &fp))?;
                }
                Ok::<(), ConflictableTransactionError<StorageError>>(())
            })
            .map_err(map_tx_error)?;

        Ok(())
    }

    /// Removes every cache entry that references `table` at all, regardless
    /// of what the decider would have said — the blunt manual override the
    /// HTTP surface exposes via `DELETE /table/{name}`. Returns the removed
    /// fingerprints so the caller can evict them from its in-process cache.
    pub fn clear_table(&self, table: &str) -> Result<Vec<String>, StorageError> {
        let prefix = keys::table_prefix(table);
        let mut fingerprints = Vec::new();
        for item in self.by_table.scan_prefix(&prefix) {
            let (k, _) = item?;
            if let Some(fp) = keys::fingerprint_suffix(&k, prefix.len()) {
                fingerprints.push(fp);
            }
        }
        for fp in &fingerprints {
            self.remove(fp)?;
        }
        Ok(fingerprints)
    }

    pub fn len(&self) -> usize {
        self.cache_entries.len()
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

fn table_index_entries(key: &CacheKey) -> Vec<String> {
    let mut tables: Vec<String> = key.tables.iter().map(|t| t.table.clone()).collect();
    tables.sort();
    tables.dedup();
    tables
}

fn column_index_entries(key: &CacheKey) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (i, t) in key.tables.iter().enumerate() {
        for c in &t.columns {
            out.push((t.table.clone(), c.clone()));
        }
        if i == 0 {
            for cond in &t.conditions {
                out.push((t.table.clone(), cond.column.clone()));
            }
        }
    }
    out.sort();
    out.dedup();
    out
}

/// One `(table, rowId)` pair per value of a primary-key condition on the
/// anchor table — the same id/uuid equality-or-IN shape the classifier looks
/// for, so a query only ends up in `by_row` when it's addressable by row.
fn row_index_entries(key: &CacheKey) -> Vec<(String, String)> {
    let Some(anchor) = key.tables.first() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for cond in &anchor.conditions {
        if !cond.operator.is_equality_like() {
            continue;
        }
        if !(cond.column.eq_ignore_ascii_case("id") || cond.column.eq_ignore_ascii_case("uuid")) {
            continue;
        }
        match &cond.value {
            crate::model::ConditionValue::Scalar(v) => {
                out.push((anchor.table.clone(), v.as_str_lossy()));
            }
            crate::model::ConditionValue::List(values) => {
                for v in values {
                    out.push((anchor.table.clone(), v.as_str_lossy()));
                }
            }
            _ => {}
        }
    }
    out
}

fn aggregate_index_entries(key: &CacheKey) -> Vec<String> {
    if key.classification != Classification::Aggregate {
        return Vec::new();
    }
    table_index_entries(key)
}

fn map_tx_error(e: TransactionError<StorageError>) -> StorageError {
    match e {
        TransactionError::Abort(inner) => inner,
        other => StorageError::StorageFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_select;
    use crate::model::WriteOperation;

    fn open_temp() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn register_and_get_round_trip() {
        let (store, _dir) = open_temp();
        let key = analyze_select("SELECT * FROM users WHERE id = 10", None).unwrap();
        store.register(&key, b"result".to_vec(), 1_700_000_000).unwrap();

        let entry = store.get(key.fingerprint.as_str()).unwrap().unwrap();
        assert_eq!(entry.result_blob, b"result".to_vec());
    }

    #[test]
    fn candidates_for_table_scan_find_registered_entry() {
        let (store, _dir) = open_temp();
        let key = analyze_select("SELECT * FROM users WHERE id = 10", None).unwrap();
        store.register(&key, b"result".to_vec(), 1).unwrap();

        let write = WriteInfo {
            table: "users".to_string(),
            operation: WriteOperation::Insert,
            affected_rows: None,
            modified_columns: None,
            conditions: None,
        };
        let candidates = store.candidates_for_write(&write).unwrap();
        assert_eq!(candidates, vec![key.fingerprint.clone()]);
    }

    #[test]
    fn candidates_for_unrelated_table_are_empty() {
        let (store, _dir) = open_temp();
        let key = analyze_select("SELECT * FROM users WHERE id = 10", None).unwrap();
        store.register(&key, b"result".to_vec(), 1).unwrap();

        let write = WriteInfo {
            table: "orders".to_string(),
            operation: WriteOperation::Insert,
            affected_rows: None,
            modified_columns: None,
            conditions: None,
        };
        assert!(store.candidates_for_write(&write).unwrap().is_empty());
    }

    #[test]
    fn update_candidates_always_include_the_table_backstop() {
        // `by_table(w.table, *)` is unioned in unconditionally, so an UPDATE
        // to this table is always a candidate regardless of which column it
        // touches — the decider, not the store, tells these apart.
        let key = analyze_select("SELECT id, email FROM users WHERE id = 10", None).unwrap();
        let (store, _dir) = open_temp();
        store.register(&key, b"result".to_vec(), 1).unwrap();

        let unrelated = WriteInfo {
            table: "users".to_string(),
            operation: WriteOperation::Update,
            affected_rows: None,
            modified_columns: Some(vec!["created_at".to_string()]),
            conditions: None,
        };
        assert_eq!(store.candidates_for_write(&unrelated).unwrap(), vec![key.fingerprint.clone()]);
    }

    #[test]
    fn update_candidates_narrow_by_row_id_across_entries_for_the_same_table() {
        let (store, _dir) = open_temp();
        let a = analyze_select("SELECT * FROM users WHERE id = 10", None).unwrap();
        let b = analyze_select("SELECT * FROM users WHERE id = 20", None).unwrap();
        store.register(&a, b"a".to_vec(), 1).unwrap();
        store.register(&b, b"b".to_vec(), 1).unwrap();

        let write = WriteInfo {
            table: "users".to_string(),
            operation: WriteOperation::Update,
            affected_rows: Some(vec!["10".to_string()]),
            modified_columns: Some(vec!["email".to_string()]),
            conditions: None,
        };
        let candidates = store.candidates_for_write(&write).unwrap();
        assert!(candidates.contains(&a.fingerprint));
        assert!(candidates.contains(&b.fingerprint), "by_table backstop still pulls in every entry for the table");
    }

    #[test]
    fn column_index_finds_entries_without_a_row_lookup_condition() {
        let (store, _dir) = open_temp();
        let key = analyze_select("SELECT email FROM users WHERE status = 'active'", None).unwrap();
        store.register(&key, b"result".to_vec(), 1).unwrap();

        let write = WriteInfo {
            table: "users".to_string(),
            operation: WriteOperation::Update,
            affected_rows: Some(vec!["10".to_string()]),
            modified_columns: Some(vec!["email".to_string()]),
            conditions: None,
        };
        assert_eq!(store.candidates_for_write(&write).unwrap(), vec![key.fingerprint.clone()]);
    }

    #[test]
    fn remove_clears_entry_and_indexes() {
        let (store, _dir) = open_temp();
        let key = analyze_select("SELECT * FROM users WHERE id = 10", None).unwrap();
        store.register(&key, b"result".to_vec(), 1).unwrap();
        store.remove(key.fingerprint.as_str()).unwrap();

        assert!(store.get(key.fingerprint.as_str()).unwrap().is_none());
        let write = WriteInfo {
            table: "users".to_string(),
            operation: WriteOperation::Insert,
            affected_rows: None,
            modified_columns: None,
            conditions: None,
        };
        assert!(store.candidates_for_write(&write).unwrap().is_empty());
    }

    #[test]
    fn clear_table_removes_all_entries_for_table() {
        let (store, _dir) = open_temp();
        let a = analyze_select("SELECT * FROM users WHERE id = 1", None).unwrap();
        let b = analyze_select("SELECT * FROM users WHERE id = 2", None).unwrap();
        store.register(&a, b"a".to_vec(), 1).unwrap();
        store.register(&b, b"b".to_vec(), 1).unwrap();

        let removed = store.clear_table("users").unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(store.len(), 0);
    }
}
