//! Key-value store adapter boundary
//!
//! The engine consumes the backing store through a narrow row/column
//! interface: cell get, row get, cell put, atomic counter increment, and an
//! ordered range scan with an exclusive stop key. Durability, replication,
//! and per-row atomicity are entirely the backend's concern.
//!
//! Two logical tables are used:
//! - `Meta`: the namespace tree (root, branch, and leaf rows) plus the
//!   tier-id counter row
//! - `Data`: fixed-size slot records keyed by `(tier_id, slot_index)`

mod memory;

pub use memory::MemoryKvStore;

use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Row key of the distinguished namespace root node.
pub const ROOT_ROW: &[u8] = b"ROOT";
/// Row key of the tier-id counter.
pub const COUNTER_ROW: &[u8] = b"CTR";
/// Column of the tier-id counter.
pub const COUNTER_COLUMN: &str = "CTR";
/// Column holding a leaf's metadata record.
pub const INFO_COLUMN: &str = "INFO";
/// Column holding a slot record in the data table.
pub const DATA_COLUMN: &str = "d";
/// Column-name prefix for a branch's child links.
pub const CHILD_PREFIX: &str = "c_";
/// Row-key prefix for metric rows.
pub const METRIC_PREFIX: &str = "m_";

/// Logical tables the engine reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    /// Namespace tree and metric metadata
    Meta,
    /// Slot records
    Data,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Meta => "meta",
            Table::Data => "data",
        }
    }
}

/// A row returned by a range scan: key plus the requested columns.
pub type ScannedRow = (Vec<u8>, BTreeMap<String, Vec<u8>>);

/// Key-value store interface
///
/// This trait abstracts the backing sparse-column store, allowing different
/// backends (in-memory for dev/test, a wide-column store in production).
/// Implementations must provide per-row atomicity for `put_cell` and
/// `atomic_increment`; the engine performs no locking of its own.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a single cell. `None` if the row or column is absent.
    async fn get_cell(&self, table: Table, row: &[u8], column: &str) -> Result<Option<Vec<u8>>>;

    /// Read all columns of a row. Empty map if the row is absent.
    async fn get_row(&self, table: Table, row: &[u8]) -> Result<BTreeMap<String, Vec<u8>>>;

    /// Write a single cell, creating the row if needed.
    async fn put_cell(&self, table: Table, row: &[u8], column: &str, value: Vec<u8>) -> Result<()>;

    /// Atomically add `delta` to an integer cell and return the new value.
    ///
    /// An absent cell counts as zero. The cell is stored as an 8-byte
    /// big-endian integer.
    async fn atomic_increment(
        &self,
        table: Table,
        row: &[u8],
        column: &str,
        delta: i64,
    ) -> Result<i64>;

    /// Scan rows in `[start, stop)` in ascending key order, returning only
    /// the requested columns. Rows holding none of the columns are skipped.
    async fn scan_range(
        &self,
        table: Table,
        start: &[u8],
        stop: &[u8],
        columns: &[&str],
    ) -> Result<Vec<ScannedRow>>;
}

/// Derive the metadata row key for a metric path.
pub fn metric_row_key(path: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(METRIC_PREFIX.len() + path.len());
    key.extend_from_slice(METRIC_PREFIX.as_bytes());
    key.extend_from_slice(path.as_bytes());
    key
}

/// Recover the metric path from a metadata row key, if it has the prefix.
pub fn path_from_row_key(key: &[u8]) -> Option<String> {
    let rest = key.strip_prefix(METRIC_PREFIX.as_bytes())?;
    String::from_utf8(rest.to_vec()).ok()
}

/// Derive the child-link column name for a path segment.
pub fn child_column(segment: &str) -> String {
    format!("{}{}", CHILD_PREFIX, segment)
}
