//! Metric metadata manager
//!
//! Owns the per-metric `INFO` record: tier definitions, aggregation method,
//! and completeness threshold. Tier ids come from the shared atomic counter
//! row, one increment per tier, never reused.

use super::{Aggregation, MetricInfo, Tier, TierSpec};
use crate::namespace::NamespaceIndex;
use crate::store::{metric_row_key, KvStore, Table, COUNTER_COLUMN, COUNTER_ROW, INFO_COLUMN};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::info;

/// Archive metadata manager.
pub struct Catalog {
    store: Arc<dyn KvStore>,
    namespace: NamespaceIndex,
}

impl Catalog {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        let namespace = NamespaceIndex::new(store.clone());
        Self { store, namespace }
    }

    /// Create a metric with the given tiers.
    ///
    /// Tier ids are assigned in declaration order; callers declare tiers
    /// finest-first (retention strictly increasing is established by
    /// construction, not re-validated). Each tier needs a nonzero step and
    /// point count and a retention that fits `u32`, or the whole create is a
    /// `Config` error with nothing written. Writes the metadata record, then
    /// links the path into the namespace tree. Fails with `AlreadyExists`
    /// before any counter increment if the metric already has a record;
    /// reconfiguration goes through [`Catalog::set_aggregation`].
    pub async fn create(
        &self,
        path: &str,
        tier_specs: &[TierSpec],
        x_files_factor: f64,
        aggregation: Aggregation,
    ) -> Result<MetricInfo> {
        if path.is_empty() {
            return Err(Error::Config("metric path cannot be empty".to_string()));
        }
        if tier_specs.is_empty() {
            return Err(Error::Config(format!(
                "metric '{}' needs at least one tier",
                path
            )));
        }
        for spec in tier_specs {
            if spec.step_seconds == 0 || spec.num_points == 0 {
                return Err(Error::Config(format!(
                    "metric '{}': tier {}s x {} points needs a nonzero step and point count",
                    path, spec.step_seconds, spec.num_points
                )));
            }
            if spec.step_seconds.checked_mul(spec.num_points).is_none() {
                return Err(Error::Config(format!(
                    "metric '{}': tier retention {}s x {} points overflows",
                    path, spec.step_seconds, spec.num_points
                )));
            }
        }

        let row_key = metric_row_key(path);
        let existing = self
            .store
            .get_cell(Table::Meta, &row_key, INFO_COLUMN)
            .await?;
        if existing.is_some() {
            return Err(Error::AlreadyExists(path.to_string()));
        }

        let mut tiers = Vec::with_capacity(tier_specs.len());
        for spec in tier_specs {
            let tier_id = self
                .store
                .atomic_increment(Table::Meta, COUNTER_ROW, COUNTER_COLUMN, 1)
                .await? as u32;
            tiers.push(Tier {
                tier_id,
                step_seconds: spec.step_seconds,
                num_points: spec.num_points,
                retention: spec.retention(),
            });
        }

        let max_retention = tiers.iter().map(|t| t.retention).max().unwrap_or(0);
        let record = MetricInfo {
            aggregation_method: aggregation,
            max_retention,
            x_files_factor,
            tiers,
        };

        self.store
            .put_cell(Table::Meta, &row_key, INFO_COLUMN, record.encode()?)
            .await?;
        self.namespace.ensure_path(path).await?;

        info!(
            path,
            tiers = record.tiers.len(),
            max_retention,
            method = aggregation.as_str(),
            "created metric"
        );
        Ok(record)
    }

    /// Fetch and decode a metric's metadata record.
    pub async fn info(&self, path: &str) -> Result<MetricInfo> {
        let cell = self
            .store
            .get_cell(Table::Meta, &metric_row_key(path), INFO_COLUMN)
            .await?;
        match cell {
            Some(bytes) => MetricInfo::decode(&bytes),
            None => Err(Error::NotFound(path.to_string())),
        }
    }

    /// Change a metric's aggregation method and, when given, its
    /// completeness threshold. The tier list is preserved unchanged.
    pub async fn set_aggregation(
        &self,
        path: &str,
        aggregation: Aggregation,
        x_files_factor: Option<f64>,
    ) -> Result<MetricInfo> {
        let mut record = self.info(path).await?;
        record.aggregation_method = aggregation;
        if let Some(xff) = x_files_factor {
            record.x_files_factor = xff;
        }
        self.store
            .put_cell(
                Table::Meta,
                &metric_row_key(path),
                INFO_COLUMN,
                record.encode()?,
            )
            .await?;
        Ok(record)
    }

    /// True iff a namespace row exists for the path, branch or leaf.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        let row = self
            .store
            .get_row(Table::Meta, &metric_row_key(path))
            .await?;
        Ok(!row.is_empty())
    }

    pub fn namespace(&self) -> &NamespaceIndex {
        &self.namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKvStore;

    fn catalog() -> Catalog {
        Catalog::new(Arc::new(MemoryKvStore::new()))
    }

    #[tokio::test]
    async fn create_then_info_round_trips() {
        let catalog = catalog();
        let created = catalog
            .create(
                "a.b.c",
                &[TierSpec::new(60, 1440), TierSpec::new(3600, 168)],
                0.5,
                Aggregation::Sum,
            )
            .await
            .unwrap();

        let fetched = catalog.info("a.b.c").await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.max_retention, 3600 * 168);
        assert_eq!(fetched.tiers[0].retention, 60 * 1440);
    }

    #[tokio::test]
    async fn tier_ids_are_unique_and_follow_declaration_order() {
        let catalog = catalog();
        let first = catalog
            .create(
                "m.one",
                &[TierSpec::new(10, 10), TierSpec::new(100, 10)],
                0.5,
                Aggregation::Average,
            )
            .await
            .unwrap();
        let second = catalog
            .create("m.two", &[TierSpec::new(10, 10)], 0.5, Aggregation::Average)
            .await
            .unwrap();

        assert_eq!(first.tiers[1].tier_id, first.tiers[0].tier_id + 1);
        assert_eq!(second.tiers[0].tier_id, first.tiers[1].tier_id + 1);
    }

    #[tokio::test]
    async fn info_missing_metric_is_not_found() {
        let catalog = catalog();
        match catalog.info("no.such.metric").await {
            Err(Error::NotFound(path)) => assert_eq!(path, "no.such.metric"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn create_twice_fails() {
        let catalog = catalog();
        catalog
            .create("a.b", &[TierSpec::new(60, 60)], 0.5, Aggregation::Sum)
            .await
            .unwrap();
        match catalog
            .create("a.b", &[TierSpec::new(60, 60)], 0.5, Aggregation::Sum)
            .await
        {
            Err(Error::AlreadyExists(path)) => assert_eq!(path, "a.b"),
            other => panic!("expected AlreadyExists, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn create_rejects_empty_tier_list() {
        let catalog = catalog();
        assert!(matches!(
            catalog.create("a.b", &[], 0.5, Aggregation::Sum).await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn create_rejects_zero_step_and_zero_points() {
        let catalog = catalog();
        assert!(matches!(
            catalog
                .create("m.zero", &[TierSpec::new(0, 10)], 0.5, Aggregation::Sum)
                .await,
            Err(Error::Config(_))
        ));
        assert!(matches!(
            catalog
                .create("m.zero", &[TierSpec::new(10, 0)], 0.5, Aggregation::Sum)
                .await,
            Err(Error::Config(_))
        ));
        // Rejected before any record or counter write.
        assert!(matches!(
            catalog.info("m.zero").await,
            Err(Error::NotFound(_))
        ));
        let ok = catalog
            .create("m.ok", &[TierSpec::new(10, 10)], 0.5, Aggregation::Sum)
            .await
            .unwrap();
        assert_eq!(ok.tiers[0].tier_id, 1);
    }

    #[tokio::test]
    async fn create_rejects_retention_overflow() {
        let catalog = catalog();
        assert!(matches!(
            catalog
                .create("m.wide", &[TierSpec::new(u32::MAX, 2)], 0.5, Aggregation::Sum)
                .await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn set_aggregation_preserves_tiers() {
        let catalog = catalog();
        let created = catalog
            .create("a.b", &[TierSpec::new(60, 60)], 0.5, Aggregation::Sum)
            .await
            .unwrap();

        let updated = catalog
            .set_aggregation("a.b", Aggregation::Max, None)
            .await
            .unwrap();
        assert_eq!(updated.aggregation_method, Aggregation::Max);
        assert_eq!(updated.x_files_factor, 0.5);
        assert_eq!(updated.tiers, created.tiers);

        let updated = catalog
            .set_aggregation("a.b", Aggregation::Max, Some(0.9))
            .await
            .unwrap();
        assert_eq!(updated.x_files_factor, 0.9);
        assert_eq!(updated.tiers, created.tiers);
    }

    #[tokio::test]
    async fn exists_covers_branches_and_leaves() {
        let catalog = catalog();
        catalog
            .create("a.b.c", &[TierSpec::new(60, 60)], 0.5, Aggregation::Sum)
            .await
            .unwrap();

        assert!(catalog.exists("a.b.c").await.unwrap());
        assert!(catalog.exists("a.b").await.unwrap());
        assert!(!catalog.exists("a.z").await.unwrap());
    }
}
