//! Top-level storage engine handle
//!
//! Composes the catalog, write engine, read engine, and namespace index over
//! one shared store and clock. All operations are independent calls against
//! the backing store; the handle itself keeps no state worth protecting, so
//! it can be shared freely across tasks.

use crate::archive::{
    Aggregation, AppendOutcome, Catalog, FetchResponse, MetricInfo, Reader, TierSpec, Writer,
};
use crate::clock::{Clock, SystemClock};
use crate::namespace::PathMatch;
use crate::store::KvStore;
use crate::Result;
use std::sync::Arc;

/// Multi-resolution time-series storage engine over a key-value store.
pub struct Tsdb {
    catalog: Arc<Catalog>,
    writer: Writer,
    reader: Arc<Reader>,
}

impl Tsdb {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        let catalog = Arc::new(Catalog::new(store.clone()));
        let reader = Arc::new(Reader::new(store.clone(), clock.clone()));
        let writer = Writer::new(store, clock, catalog.clone(), reader.clone());
        Self {
            catalog,
            writer,
            reader,
        }
    }

    /// Build an engine on the wall clock.
    pub fn with_system_clock(store: Arc<dyn KvStore>) -> Self {
        Self::new(store, Arc::new(SystemClock::new()))
    }

    /// Create a metric with the given tiers, declared finest-first.
    pub async fn create(
        &self,
        path: &str,
        tiers: &[TierSpec],
        x_files_factor: f64,
        aggregation: Aggregation,
    ) -> Result<MetricInfo> {
        self.catalog
            .create(path, tiers, x_files_factor, aggregation)
            .await
    }

    /// Fetch a metric's metadata record.
    pub async fn info(&self, path: &str) -> Result<MetricInfo> {
        self.catalog.info(path).await
    }

    /// True iff a namespace row exists for the path.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        self.catalog.exists(path).await
    }

    /// Reconfigure a metric's aggregation method and, optionally, its
    /// completeness threshold.
    pub async fn set_aggregation(
        &self,
        path: &str,
        aggregation: Aggregation,
        x_files_factor: Option<f64>,
    ) -> Result<MetricInfo> {
        self.catalog
            .set_aggregation(path, aggregation, x_files_factor)
            .await
    }

    /// Append samples to a metric and cascade rollups.
    pub async fn append(&self, path: &str, samples: &[(u32, f64)]) -> Result<AppendOutcome> {
        self.writer.append_samples(path, samples).await
    }

    /// Read a metric over `[from, until]`; `until` defaults to now.
    pub async fn fetch(
        &self,
        path: &str,
        from: u32,
        until: Option<u32>,
    ) -> Result<Option<FetchResponse>> {
        let info = self.catalog.info(path).await?;
        self.reader.fetch(&info, from, until).await
    }

    /// Discover metric paths matching a dot-separated glob pattern.
    pub async fn find_paths(&self, pattern: &str) -> Result<Vec<PathMatch>> {
        self.catalog.namespace().find_paths(pattern).await
    }
}
