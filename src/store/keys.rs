//! Composite key encoding for the four secondary index trees (component H).
//!
//! sled trees are plain byte-ordered maps, so a "by X" index is just a tree
//! whose keys are `<X>\0<fingerprint>` and whose values are empty — lookup
//! by `X` is a prefix scan ending at the trailing `\0`, which keeps
//! `"orders"` from matching a prefix scan for `"order"`.

pub fn table_key(table: &str, fingerprint: &str) -> Vec<u8> {
    format!("{}\0{}", table, fingerprint).into_bytes()
}

pub fn table_prefix(table: &str) -> Vec<u8> {
    format!("{}\0", table).into_bytes()
}

pub fn column_key(table: &str, column: &str, fingerprint: &str) -> Vec<u8> {
    format!("{}\0{}\0{}", table, column, fingerprint).into_bytes()
}

pub fn column_prefix(table: &str, column: &str) -> Vec<u8> {
    format!("{}\0{}\0", table, column).into_bytes()
}

pub fn row_key(table: &str, row_id: &str, fingerprint: &str) -> Vec<u8> {
    format!("{}\0{}\0{}", table, row_id, fingerprint).into_bytes()
}

pub fn row_prefix(table: &str, row_id: &str) -> Vec<u8> {
    format!("{}\0{}\0", table, row_id).into_bytes()
}

pub fn aggregate_key(table: &str, fingerprint: &str) -> Vec<u8> {
    format!("{}\0{}", table, fingerprint).into_bytes()
}

pub fn aggregate_prefix(table: &str) -> Vec<u8> {
    format!("{}\0", table).into_bytes()
}

/// Strips a `<prefix>\0...\0<fingerprint>` index key down to the trailing
/// fingerprint, given the already-known prefix byte length.
pub fn fingerprint_suffix(key: &[u8], prefix_len: usize) -> Option<String> {
    key.get(prefix_len..)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}
