//! # tierstore
//!
//! A multi-resolution time-series storage engine layered over a generic
//! sparse-column key-value store.
//!
//! Metrics are named by dot-separated paths and carry one or more retention
//! tiers (e.g. "1-minute resolution for 1 day, then 1-hour resolution for a
//! week"). Each tier is a fixed-size ring buffer of slot records in the data
//! table; appends land in the finest tier that can still retain them and
//! cascade aggregated rollups into coarser tiers once an interval is
//! complete enough. Reads reconstruct an aligned, gap-filled value sequence
//! over an arbitrary window, handling ring-buffer wraparound.
//!
//! ## Architecture
//!
//! - **Store adapter** ([`store::KvStore`]): narrow row/column interface to
//!   the backing store; durability and replication live entirely behind it
//! - **Namespace index** ([`namespace::NamespaceIndex`]): tree of linked
//!   branch/leaf rows mapping paths to metadata, with glob discovery
//! - **Catalog** ([`archive::Catalog`]): per-metric tier definitions,
//!   aggregation method, and completeness threshold
//! - **Write engine** ([`archive::Writer`]): slot writes plus the
//!   threshold-gated propagation cascade
//! - **Read engine** ([`archive::Reader`]): window reconstruction and tier
//!   selection
//!
//! There is no process-local locking: concurrency correctness rests on the
//! backing store's per-row atomicity, and concurrent writers to the same
//! slot race last-write-wins by design.

pub mod archive;
pub mod clock;
pub mod config;
pub mod namespace;
pub mod pattern;
pub mod store;
pub mod telemetry;
pub mod tsdb;

mod error;

pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::archive::{
        Aggregation, AppendOutcome, Catalog, FetchResponse, MetricInfo, Reader, Tier, TierSpec,
        Writer,
    };
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::namespace::{NamespaceIndex, NamespaceNode, PathMatch};
    pub use crate::store::{KvStore, MemoryKvStore, Table};
    pub use crate::tsdb::Tsdb;
    pub use crate::{Error, Result};
}
