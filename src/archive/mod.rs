//! Multi-tier archive model
//!
//! A metric owns an ordered list of tiers, finest resolution first. Each tier
//! is a fixed-size ring buffer in the data table: a sample at timestamp `t`
//! lands in slot `(t / step) % num_points`, keyed by the tier's globally
//! unique id. Coarser tiers receive aggregated rollups from finer ones, gated
//! by the metric's completeness threshold (`xFilesFactor`).
//!
//! The binary layouts here are wire formats shared with other readers of the
//! store and must not change:
//! - slot key: big-endian `u32` tier id, then big-endian `u32` slot index
//! - slot value: big-endian `u32` timestamp, then big-endian `f64` value

mod catalog;
mod read;
mod write;

pub use catalog::Catalog;
pub use read::{FetchResponse, Reader};
pub use write::{AppendOutcome, Writer};

use crate::{Error, Result};
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

/// Length of a slot row key.
pub const SLOT_KEY_LEN: usize = 8;
/// Length of an encoded slot record.
pub const SLOT_VALUE_LEN: usize = 12;

/// Aggregation method used when propagating to coarser tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Average,
    Min,
    Max,
    Last,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Average => "average",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Last => "last",
        }
    }

    /// Aggregate the known values of a propagation interval.
    ///
    /// Values arrive in slot order, so `Last` is the newest known point in
    /// the interval. Returns `None` for an empty input.
    pub fn aggregate(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let out = match self {
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Average => values.iter().sum::<f64>() / values.len() as f64,
            Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Last => *values.last()?,
        };
        Some(out)
    }
}

impl std::str::FromStr for Aggregation {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "average" | "avg" => Ok(Aggregation::Average),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "last" => Ok(Aggregation::Last),
            other => Err(Error::Config(format!(
                "unknown aggregation method '{}'; expected one of sum, average, min, max, last",
                other
            ))),
        }
    }
}

/// Caller-declared tier shape: seconds per point and number of points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSpec {
    pub step_seconds: u32,
    pub num_points: u32,
}

impl TierSpec {
    pub fn new(step_seconds: u32, num_points: u32) -> Self {
        Self {
            step_seconds,
            num_points,
        }
    }

    pub fn retention(&self) -> u32 {
        self.step_seconds * self.num_points
    }
}

/// One fixed-resolution retention ring buffer of a metric.
///
/// Tier ids are assigned from the shared atomic counter in declaration order
/// and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub tier_id: u32,
    pub step_seconds: u32,
    pub num_points: u32,
    pub retention: u32,
}

impl Tier {
    /// Align a timestamp down to this tier's step boundary.
    pub fn align(&self, timestamp: u32) -> u32 {
        timestamp - (timestamp % self.step_seconds)
    }

    /// Ring-buffer slot index for a timestamp.
    pub fn slot(&self, timestamp: u32) -> u32 {
        (timestamp / self.step_seconds) % self.num_points
    }
}

/// Per-metric metadata record, stored as one JSON cell under the leaf row.
///
/// Field names are part of the stored format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricInfo {
    pub aggregation_method: Aggregation,
    pub max_retention: u32,
    pub x_files_factor: f64,
    pub tiers: Vec<Tier>,
}

impl MetricInfo {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Encode the data-table row key for a tier's slot.
pub fn slot_key(tier_id: u32, slot: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(SLOT_KEY_LEN);
    key.put_u32(tier_id);
    key.put_u32(slot);
    key
}

/// Encode a slot record.
pub fn encode_slot_value(timestamp: u32, value: f64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SLOT_VALUE_LEN);
    buf.put_u32(timestamp);
    buf.put_f64(value);
    buf
}

/// Decode a slot record into its stored timestamp and value.
pub fn decode_slot_value(mut bytes: &[u8]) -> Result<(u32, f64)> {
    if bytes.len() != SLOT_VALUE_LEN {
        return Err(Error::Corrupt(format!(
            "slot record holds {} bytes, expected {}",
            bytes.len(),
            SLOT_VALUE_LEN
        )));
    }
    let timestamp = bytes.get_u32();
    let value = bytes.get_f64();
    Ok((timestamp, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_key_is_big_endian_pair() {
        let key = slot_key(0x01020304, 0x0a0b0c0d);
        assert_eq!(key, vec![0x01, 0x02, 0x03, 0x04, 0x0a, 0x0b, 0x0c, 0x0d]);
    }

    #[test]
    fn slot_value_round_trips() {
        let encoded = encode_slot_value(1_700_000_000, -2.5);
        assert_eq!(encoded.len(), SLOT_VALUE_LEN);
        let (ts, value) = decode_slot_value(&encoded).unwrap();
        assert_eq!(ts, 1_700_000_000);
        assert_eq!(value, -2.5);
    }

    #[test]
    fn slot_value_rejects_wrong_length() {
        assert!(decode_slot_value(&[0u8; 11]).is_err());
    }

    #[test]
    fn tier_alignment_and_slot_arithmetic() {
        let tier = Tier {
            tier_id: 7,
            step_seconds: 60,
            num_points: 5,
            retention: 300,
        };
        assert_eq!(tier.align(119), 60);
        assert_eq!(tier.align(120), 120);
        assert_eq!(tier.slot(0), 0);
        assert_eq!(tier.slot(60), 1);
        // Same slot, next ring epoch.
        assert_eq!(tier.slot(300), 0);
    }

    #[test]
    fn aggregation_over_known_values() {
        let values = [1.0, 4.0, 2.0];
        assert_eq!(Aggregation::Sum.aggregate(&values), Some(7.0));
        assert_eq!(Aggregation::Average.aggregate(&values), Some(7.0 / 3.0));
        assert_eq!(Aggregation::Min.aggregate(&values), Some(1.0));
        assert_eq!(Aggregation::Max.aggregate(&values), Some(4.0));
        assert_eq!(Aggregation::Last.aggregate(&values), Some(2.0));
        assert_eq!(Aggregation::Sum.aggregate(&[]), None);
    }

    #[test]
    fn metric_info_json_uses_wire_field_names() {
        let info = MetricInfo {
            aggregation_method: Aggregation::Average,
            max_retention: 604800,
            x_files_factor: 0.5,
            tiers: vec![Tier {
                tier_id: 3,
                step_seconds: 60,
                num_points: 1440,
                retention: 86400,
            }],
        };
        let json: serde_json::Value =
            serde_json::from_slice(&info.encode().unwrap()).unwrap();
        assert_eq!(json["aggregationMethod"], "average");
        assert_eq!(json["maxRetention"], 604800);
        assert_eq!(json["xFilesFactor"], 0.5);
        assert_eq!(json["tiers"][0]["tierId"], 3);
        assert_eq!(json["tiers"][0]["stepSeconds"], 60);
        assert_eq!(json["tiers"][0]["numPoints"], 1440);
        assert_eq!(json["tiers"][0]["retention"], 86400);

        let decoded = MetricInfo::decode(&info.encode().unwrap()).unwrap();
        assert_eq!(decoded, info);
    }
}
