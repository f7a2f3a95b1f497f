//! In-memory key-value store for development and testing

use super::{KvStore, ScannedRow, Table};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

type Row = BTreeMap<String, Vec<u8>>;

/// In-memory store backend
///
/// Holds each table as an ordered map so range scans walk keys in the same
/// order a wide-column store would. Suitable for development, testing, and
/// single-process embedding; data does not survive the process.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    meta: RwLock<BTreeMap<Vec<u8>, Row>>,
    data: RwLock<BTreeMap<Vec<u8>, Row>>,
}

impl MemoryKvStore {
    /// Create an empty store with both logical tables.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, table: Table) -> &RwLock<BTreeMap<Vec<u8>, Row>> {
        match table {
            Table::Meta => &self.meta,
            Table::Data => &self.data,
        }
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get_cell(&self, table: Table, row: &[u8], column: &str) -> Result<Option<Vec<u8>>> {
        let guard = self.table(table).read();
        Ok(guard.get(row).and_then(|r| r.get(column)).cloned())
    }

    async fn get_row(&self, table: Table, row: &[u8]) -> Result<Row> {
        let guard = self.table(table).read();
        Ok(guard.get(row).cloned().unwrap_or_default())
    }

    async fn put_cell(&self, table: Table, row: &[u8], column: &str, value: Vec<u8>) -> Result<()> {
        let mut guard = self.table(table).write();
        guard
            .entry(row.to_vec())
            .or_default()
            .insert(column.to_string(), value);
        Ok(())
    }

    async fn atomic_increment(
        &self,
        table: Table,
        row: &[u8],
        column: &str,
        delta: i64,
    ) -> Result<i64> {
        // Whole mutation under the write lock, matching per-row atomicity.
        let mut guard = self.table(table).write();
        let cell = guard.entry(row.to_vec()).or_default();
        let current = match cell.get(column) {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    Error::Corrupt(format!(
                        "counter cell {}:{} holds {} bytes, expected 8",
                        table.as_str(),
                        column,
                        bytes.len()
                    ))
                })?;
                i64::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = current + delta;
        cell.insert(column.to_string(), next.to_be_bytes().to_vec());
        Ok(next)
    }

    async fn scan_range(
        &self,
        table: Table,
        start: &[u8],
        stop: &[u8],
        columns: &[&str],
    ) -> Result<Vec<ScannedRow>> {
        if start >= stop {
            return Ok(Vec::new());
        }
        let guard = self.table(table).read();
        let mut out = Vec::new();
        for (key, row) in guard.range(start.to_vec()..stop.to_vec()) {
            let mut selected: Row = BTreeMap::new();
            for col in columns {
                if let Some(value) = row.get(*col) {
                    selected.insert((*col).to_string(), value.clone());
                }
            }
            if !selected.is_empty() {
                out.push((key.clone(), selected));
            }
        }
        Ok(out)
    }
}
