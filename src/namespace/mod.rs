//! Hierarchical namespace index
//!
//! Metric paths (`a.b.c`) are materialized as a tree of linked rows in the
//! meta table, rooted at the `ROOT` sentinel row. A branch row carries one
//! `c_<segment>` column per child, valued with the child's row key; a leaf
//! row carries the metric's `INFO` record and no children. Every ancestor of
//! a leaf gets a branch row, created lazily when the metric is created.

use crate::archive::MetricInfo;
use crate::pattern::match_entries;
use crate::store::{
    child_column, metric_row_key, path_from_row_key, KvStore, Table, CHILD_PREFIX, INFO_COLUMN,
    ROOT_ROW,
};
use crate::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// A decoded namespace row.
#[derive(Debug, Clone)]
pub enum NamespaceNode {
    /// Container row: child segment name to child row key.
    Branch { children: BTreeMap<String, Vec<u8>> },
    /// Terminal row holding the metric's metadata record.
    Leaf { info: MetricInfo },
}

/// One discovery result from [`NamespaceIndex::find_paths`].
#[derive(Debug, Clone)]
pub enum PathMatch {
    Leaf { path: String, info: MetricInfo },
    Branch { path: String },
}

impl PathMatch {
    pub fn path(&self) -> &str {
        match self {
            PathMatch::Leaf { path, .. } => path,
            PathMatch::Branch { path } => path,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, PathMatch::Leaf { .. })
    }
}

/// Namespace tree index over the meta table.
pub struct NamespaceIndex {
    store: Arc<dyn KvStore>,
}

impl NamespaceIndex {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Ensure every parent→child link along `path` exists.
    ///
    /// Walks prefixes from the root and writes only the missing links, so
    /// re-running for an existing path performs no writes. Link values are
    /// deterministic, which makes concurrent creation of overlapping paths
    /// idempotent in outcome. Never touches a leaf's `INFO` column.
    pub async fn ensure_path(&self, path: &str) -> Result<()> {
        let mut prior = String::new();
        for segment in path.split('.') {
            let (parent_key, child_key) = if prior.is_empty() {
                prior = segment.to_string();
                (ROOT_ROW.to_vec(), metric_row_key(segment))
            } else {
                let parent = metric_row_key(&prior);
                prior.push('.');
                prior.push_str(segment);
                (parent, metric_row_key(&prior))
            };

            let column = child_column(segment);
            let link = self
                .store
                .get_cell(Table::Meta, &parent_key, &column)
                .await?;
            if link.is_none() {
                debug!(path, segment, "creating namespace link");
                self.store
                    .put_cell(Table::Meta, &parent_key, &column, child_key)
                    .await?;
            }
        }
        Ok(())
    }

    /// Fetch and decode a single namespace row. `None` if the row is absent.
    pub async fn get_node(&self, row_key: &[u8]) -> Result<Option<NamespaceNode>> {
        let row = self.store.get_row(Table::Meta, row_key).await?;
        if row.is_empty() {
            return Ok(None);
        }
        if let Some(bytes) = row.get(INFO_COLUMN) {
            return Ok(Some(NamespaceNode::Leaf {
                info: MetricInfo::decode(bytes)?,
            }));
        }
        Ok(Some(NamespaceNode::Branch {
            children: children_of(&row),
        }))
    }

    /// Find all paths matching a dot-separated glob pattern.
    ///
    /// Descends the tree with an explicit work stack (depth-first, matched
    /// child order), filtering each level's child names through the pattern
    /// matcher. Non-terminal segments descend only into branches; the final
    /// segment yields a [`PathMatch`] per matching child. Missing rows prune
    /// silently. Each call is an independent traversal.
    pub async fn find_paths(&self, pattern: &str) -> Result<Vec<PathMatch>> {
        let cleaned = pattern.replace('\\', "");
        let segments: Vec<&str> = cleaned.split('.').collect();

        let mut results = Vec::new();
        // (row key, index of the segment to match against its children)
        let mut stack: Vec<(Vec<u8>, usize)> = vec![(ROOT_ROW.to_vec(), 0)];

        while let Some((row_key, seg_idx)) = stack.pop() {
            let row = self.store.get_row(Table::Meta, &row_key).await?;
            if row.is_empty() {
                continue;
            }

            let children = children_of(&row);
            let names: Vec<String> = children.keys().cloned().collect();
            let matched = match_entries(&names, segments[seg_idx]);

            if seg_idx + 1 < segments.len() {
                // More segments remain: descend into matching branches only.
                // Reverse push keeps depth-first order aligned with matched
                // child order.
                for name in matched.iter().rev() {
                    let child_key = &children[name];
                    let child_row = self.store.get_row(Table::Meta, child_key).await?;
                    if child_row.is_empty() || child_row.contains_key(INFO_COLUMN) {
                        continue;
                    }
                    stack.push((child_key.clone(), seg_idx + 1));
                }
            } else {
                // Final segment: yield a result per matching child.
                for name in &matched {
                    let child_key = &children[name];
                    let child_row = self.store.get_row(Table::Meta, child_key).await?;
                    if child_row.is_empty() {
                        continue;
                    }
                    let Some(path) = path_from_row_key(child_key) else {
                        continue;
                    };
                    match child_row.get(INFO_COLUMN) {
                        Some(bytes) => results.push(PathMatch::Leaf {
                            path,
                            info: MetricInfo::decode(bytes)?,
                        }),
                        None => results.push(PathMatch::Branch { path }),
                    }
                }
            }
        }

        Ok(results)
    }
}

fn children_of(row: &BTreeMap<String, Vec<u8>>) -> BTreeMap<String, Vec<u8>> {
    row.iter()
        .filter_map(|(column, value)| {
            column
                .strip_prefix(CHILD_PREFIX)
                .map(|segment| (segment.to_string(), value.clone()))
        })
        .collect()
}
