//! Archive write and propagation engine
//!
//! Turns incoming samples into slot writes on the tier that can still retain
//! them, then cascades threshold-gated rollups into coarser tiers. Slot
//! writes are unconditional overwrites; concurrent appenders to the same
//! slot race last-write-wins by design, relying on the store's per-row
//! atomicity.

use super::{encode_slot_value, slot_key, Catalog, MetricInfo, Reader, Tier};
use crate::clock::Clock;
use crate::store::{KvStore, Table, DATA_COLUMN};
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// What an append actually did.
///
/// Dropped samples and an early cascade stop are normal outcomes, not
/// errors; they are surfaced here so callers can observe them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Slot records written from the input samples (after alignment dedup).
    pub written: usize,
    /// Samples discarded because no tier's retention covers their age.
    pub dropped: usize,
    /// Rollup records written across all coarser tiers.
    pub propagated: usize,
    /// Tier id at which the most recent cascade stopped, if any tier had no
    /// interval meet the completeness threshold.
    pub cascade_stopped_at: Option<u32>,
}

/// Archive write/propagation engine.
///
/// Holds shared handles to the catalog (for metadata lookups) and the read
/// engine (for interval read-backs during propagation) rather than building
/// its own.
pub struct Writer {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    catalog: Arc<Catalog>,
    reader: Arc<Reader>,
}

impl Writer {
    pub fn new(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        catalog: Arc<Catalog>,
        reader: Arc<Reader>,
    ) -> Self {
        Self {
            store,
            clock,
            catalog,
            reader,
        }
    }

    /// Append `(timestamp, value)` samples to a metric.
    ///
    /// Samples are partitioned by age against tier retention, walking tiers
    /// finest to coarsest; the tier cursor never rewinds, so inputs are
    /// expected youngest-first. Samples too old for every tier are silently
    /// dropped and counted. Fails with `NotFound` if the metric has no
    /// metadata record; a store failure aborts remaining processing with no
    /// rollback.
    pub async fn append_samples(
        &self,
        path: &str,
        samples: &[(u32, f64)],
    ) -> Result<AppendOutcome> {
        let info = self.catalog.info(path).await?;
        let now = self.clock.now_epoch();
        let mut outcome = AppendOutcome::default();

        let mut batches: Vec<Vec<(u32, f64)>> = vec![Vec::new(); info.tiers.len()];
        let mut cursor = 0usize;
        for &(timestamp, value) in samples {
            let age = now.saturating_sub(timestamp);
            while cursor < info.tiers.len() && info.tiers[cursor].retention < age {
                cursor += 1;
            }
            if cursor == info.tiers.len() {
                outcome.dropped += 1;
                continue;
            }
            batches[cursor].push((timestamp, value));
        }

        for (index, batch) in batches.iter().enumerate() {
            if batch.is_empty() {
                continue;
            }
            self.update_tier(&info, index, batch, &mut outcome).await?;
        }

        if outcome.dropped > 0 {
            warn!(
                path,
                dropped = outcome.dropped,
                "samples older than every tier's retention were discarded"
            );
        }
        Ok(outcome)
    }

    /// Write one tier's batch and cascade rollups to coarser tiers.
    async fn update_tier(
        &self,
        info: &MetricInfo,
        tier_index: usize,
        batch: &[(u32, f64)],
        outcome: &mut AppendOutcome,
    ) -> Result<()> {
        let tier = &info.tiers[tier_index];

        // Align to the step; on collision the later input sample wins.
        let mut aligned: BTreeMap<u32, f64> = BTreeMap::new();
        for &(timestamp, value) in batch {
            aligned.insert(tier.align(timestamp), value);
        }

        for (&timestamp, &value) in &aligned {
            let slot = tier.slot(timestamp);
            debug!(
                tier_id = tier.tier_id,
                timestamp, slot, value, "writing slot record"
            );
            self.store
                .put_cell(
                    Table::Data,
                    &slot_key(tier.tier_id, slot),
                    DATA_COLUMN,
                    encode_slot_value(timestamp, value),
                )
                .await?;
        }
        outcome.written += aligned.len();

        // Cascade: each coarser tier aggregates the intervals touched by the
        // writes that just landed one level up. A tier where no interval met
        // the threshold stops the cascade entirely.
        let mut higher = tier;
        let mut just_written: Vec<u32> = aligned.keys().copied().collect();
        for lower in info
            .tiers
            .iter()
            .filter(|t| t.step_seconds > tier.step_seconds)
        {
            let intervals: BTreeSet<u32> =
                just_written.iter().map(|&ts| lower.align(ts)).collect();

            let mut landed = Vec::new();
            for &interval in &intervals {
                if self.propagate(info, interval, higher, lower).await? {
                    landed.push(interval);
                }
            }

            if landed.is_empty() {
                debug!(
                    tier_id = lower.tier_id,
                    "no interval met the completeness threshold; stopping cascade"
                );
                outcome.cascade_stopped_at = Some(lower.tier_id);
                break;
            }
            outcome.propagated += landed.len();
            just_written = landed;
            higher = lower;
        }

        Ok(())
    }

    /// Roll one coarse interval up from the next finer tier.
    ///
    /// Reads the finer slots covering `[interval, interval + step)`, and
    /// writes the aggregate iff the known fraction strictly exceeds the
    /// metric's completeness threshold. Returns whether a rollup landed.
    async fn propagate(
        &self,
        info: &MetricInfo,
        interval: u32,
        higher: &Tier,
        lower: &Tier,
    ) -> Result<bool> {
        let interval_end = interval + lower.step_seconds;
        let values = self.reader.fetch_range(higher, interval, interval_end).await?;
        if values.is_empty() {
            return Ok(false);
        }

        let known: Vec<f64> = values.iter().flatten().copied().collect();
        let fraction = known.len() as f64 / values.len() as f64;
        if fraction <= info.x_files_factor {
            return Ok(false);
        }

        let Some(aggregate) = info.aggregation_method.aggregate(&known) else {
            return Ok(false);
        };
        debug!(
            from_tier = higher.tier_id,
            to_tier = lower.tier_id,
            interval,
            fraction,
            aggregate,
            "propagating rollup"
        );
        self.store
            .put_cell(
                Table::Data,
                &slot_key(lower.tier_id, lower.slot(interval)),
                DATA_COLUMN,
                encode_slot_value(interval, aggregate),
            )
            .await?;
        Ok(true)
    }
}
