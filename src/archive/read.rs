//! Archive read engine
//!
//! Reconstructs an ordered, gap-filled value sequence from a tier's ring
//! buffer. Slots are content-addressed, so a scanned record may belong to an
//! older ring epoch; the stored timestamp decides whether it lands in the
//! output or reads as a gap.

use super::{decode_slot_value, slot_key, MetricInfo, Tier};
use crate::clock::Clock;
use crate::store::{KvStore, Table, DATA_COLUMN};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// A reconstructed time window.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    /// Aligned inclusive start of the window.
    pub from: u32,
    /// Aligned end of the window (exclusive for indexing purposes).
    pub until: u32,
    /// Seconds per value.
    pub step: u32,
    /// One entry per step; `None` marks a gap.
    pub values: Vec<Option<f64>>,
}

/// Archive read engine.
pub struct Reader {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl Reader {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Read one tier over `[from, until)`, both aligned down to the step.
    ///
    /// Output position `i` covers `[from + i*step, from + (i+1)*step)`. A
    /// wrapped slot range issues two scans; a window spanning the whole ring
    /// scans every slot. Records whose stored timestamp falls outside the
    /// window (a prior ring epoch, or a slot never written) are gaps.
    pub async fn fetch_range(&self, tier: &Tier, from: u32, until: u32) -> Result<Vec<Option<f64>>> {
        let from = tier.align(from);
        let until = tier.align(until);
        if until <= from {
            return Ok(Vec::new());
        }

        let num_slots = ((until - from) / tier.step_seconds) as usize;
        let mut values: Vec<Option<f64>> = vec![None; num_slots];

        let start_slot = tier.slot(from);
        let end_slot = tier.slot(until);
        let ranges: Vec<(u32, u32)> = if num_slots >= tier.num_points as usize {
            vec![(0, tier.num_points)]
        } else if start_slot > end_slot {
            // The window wraps the ring.
            vec![(0, end_slot + 1), (start_slot, tier.num_points)]
        } else {
            vec![(start_slot, end_slot + 1)]
        };

        for (lo, hi) in ranges {
            let start_key = slot_key(tier.tier_id, lo);
            let stop_key = slot_key(tier.tier_id, hi);
            let rows = self
                .store
                .scan_range(Table::Data, &start_key, &stop_key, &[DATA_COLUMN])
                .await?;
            for (_, columns) in rows {
                let Some(bytes) = columns.get(DATA_COLUMN) else {
                    continue;
                };
                let (timestamp, value) = decode_slot_value(bytes)?;
                if timestamp < from {
                    continue;
                }
                let index = ((timestamp - from) / tier.step_seconds) as usize;
                if index < num_slots {
                    values[index] = Some(value);
                }
            }
        }

        debug!(
            tier_id = tier.tier_id,
            from,
            until,
            known = values.iter().flatten().count(),
            slots = num_slots,
            "fetched range"
        );
        Ok(values)
    }

    /// Read a metric over `[from, until]`, choosing the tier.
    ///
    /// `until` defaults to now and is clamped to it; `from` is clamped to the
    /// oldest retained time. A window entirely in the future yields `None`.
    /// The finest tier whose retention covers `now - from` serves the read,
    /// falling back to the coarsest.
    pub async fn fetch(
        &self,
        info: &MetricInfo,
        from: u32,
        until: Option<u32>,
    ) -> Result<Option<FetchResponse>> {
        let now = self.clock.now_epoch();
        let until = until.unwrap_or(now).min(now);
        if from > until {
            return Err(Error::InvalidRange { from, until });
        }
        if from > now {
            return Ok(None);
        }

        let oldest = now.saturating_sub(info.max_retention);
        let from = from.max(oldest);
        let diff = now - from;
        let tier = info
            .tiers
            .iter()
            .find(|t| t.retention >= diff)
            .or_else(|| info.tiers.last())
            .ok_or_else(|| Error::Config("metric has no tiers".to_string()))?;

        let values = self.fetch_range(tier, from, until).await?;
        Ok(Some(FetchResponse {
            from: tier.align(from),
            until: tier.align(until),
            step: tier.step_seconds,
            values,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{encode_slot_value, Aggregation};
    use crate::clock::ManualClock;
    use crate::store::MemoryKvStore;

    fn tier() -> Tier {
        Tier {
            tier_id: 1,
            step_seconds: 10,
            num_points: 4,
            retention: 40,
        }
    }

    async fn put_point(store: &MemoryKvStore, tier: &Tier, ts: u32, value: f64) {
        store
            .put_cell(
                Table::Data,
                &slot_key(tier.tier_id, tier.slot(ts)),
                DATA_COLUMN,
                encode_slot_value(ts, value),
            )
            .await
            .unwrap();
    }

    fn reader(store: Arc<MemoryKvStore>, now: u32) -> Reader {
        Reader::new(store, Arc::new(ManualClock::new(now)))
    }

    #[tokio::test]
    async fn fetch_range_places_values_at_zero_based_positions() {
        let store = Arc::new(MemoryKvStore::new());
        let t = tier();
        put_point(&store, &t, 10, 2.0).await;
        put_point(&store, &t, 20, 3.0).await;

        let values = reader(store, 100).fetch_range(&t, 10, 40).await.unwrap();
        assert_eq!(values, vec![Some(2.0), Some(3.0), None]);
    }

    #[tokio::test]
    async fn wrapped_window_skips_prior_epoch_records() {
        let store = Arc::new(MemoryKvStore::new());
        let t = tier();
        // Slot 0 written at ts 0, then overwritten by the next epoch (ts 40).
        put_point(&store, &t, 0, 1.0).await;
        put_point(&store, &t, 10, 2.0).await;
        put_point(&store, &t, 20, 3.0).await;
        put_point(&store, &t, 40, 5.0).await;

        // start_slot 1 > end_slot 0: two scans. The scanned slot-0 record
        // carries ts 40, which indexes past the window and must stay a gap.
        let values = reader(store.clone(), 100)
            .fetch_range(&t, 10, 40)
            .await
            .unwrap();
        assert_eq!(values, vec![Some(2.0), Some(3.0), None]);

        // Window starting at the overwritten epoch: slot 0 reads as a gap,
        // never as the newer epoch's value.
        let values = reader(store, 100).fetch_range(&t, 0, 30).await.unwrap();
        assert_eq!(values, vec![None, Some(2.0), Some(3.0)]);
    }

    #[tokio::test]
    async fn full_ring_window_scans_every_slot() {
        let store = Arc::new(MemoryKvStore::new());
        let t = tier();
        put_point(&store, &t, 10, 2.0).await;
        put_point(&store, &t, 20, 3.0).await;
        put_point(&store, &t, 40, 5.0).await;

        let values = reader(store, 100).fetch_range(&t, 0, 40).await.unwrap();
        assert_eq!(values, vec![None, Some(2.0), Some(3.0), None]);
    }

    #[tokio::test]
    async fn fetch_range_aligns_ragged_bounds() {
        let store = Arc::new(MemoryKvStore::new());
        let t = tier();
        put_point(&store, &t, 10, 2.0).await;

        let values = reader(store, 100).fetch_range(&t, 13, 27).await.unwrap();
        // [13, 27) aligns to [10, 20): one slot.
        assert_eq!(values, vec![Some(2.0)]);
    }

    #[tokio::test]
    async fn empty_window_yields_no_values() {
        let store = Arc::new(MemoryKvStore::new());
        let t = tier();
        let values = reader(store, 100).fetch_range(&t, 20, 20).await.unwrap();
        assert!(values.is_empty());
    }

    fn two_tier_info() -> MetricInfo {
        MetricInfo {
            aggregation_method: Aggregation::Average,
            max_retention: 120,
            x_files_factor: 0.5,
            tiers: vec![
                Tier {
                    tier_id: 1,
                    step_seconds: 10,
                    num_points: 6,
                    retention: 60,
                },
                Tier {
                    tier_id: 2,
                    step_seconds: 30,
                    num_points: 4,
                    retention: 120,
                },
            ],
        }
    }

    #[tokio::test]
    async fn fetch_rejects_inverted_range() {
        let store = Arc::new(MemoryKvStore::new());
        let r = reader(store, 1000);
        match r.fetch(&two_tier_info(), 900, Some(800)).await {
            Err(Error::InvalidRange { from, until }) => {
                assert_eq!((from, until), (900, 800));
            }
            other => panic!("expected InvalidRange, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn fetch_future_window_is_no_data() {
        let store = Arc::new(MemoryKvStore::new());
        let r = reader(store, 1000);
        // until clamps to now, leaving from == until == now; a from strictly
        // beyond now yields no data.
        let resp = r.fetch(&two_tier_info(), 1000, Some(2000)).await.unwrap();
        assert!(resp.is_some());
        assert!(resp.unwrap().values.is_empty());
    }

    #[tokio::test]
    async fn fetch_selects_finest_tier_that_covers_the_window() {
        let store = Arc::new(MemoryKvStore::new());
        let r = reader(store, 1000);
        let info = two_tier_info();

        let resp = r.fetch(&info, 970, None).await.unwrap().unwrap();
        assert_eq!(resp.step, 10);

        let resp = r.fetch(&info, 900, None).await.unwrap().unwrap();
        assert_eq!(resp.step, 30);
    }

    #[tokio::test]
    async fn fetch_clamps_from_to_oldest_retained() {
        let store = Arc::new(MemoryKvStore::new());
        let r = reader(store, 1000);

        let resp = r.fetch(&two_tier_info(), 0, None).await.unwrap().unwrap();
        // now - maxRetention = 880, aligned to the coarse step.
        assert_eq!(resp.step, 30);
        assert_eq!(resp.from, 870);
        assert_eq!(resp.values.len(), ((resp.until - resp.from) / 30) as usize);
    }
}
