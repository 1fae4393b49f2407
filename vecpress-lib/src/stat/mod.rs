//! Epoch based statistics.
//!
//! An epoch moves through three states:
//! [`OpenEpoch`] (permits can be issued) → [`SealedEpoch`] (no new permits,
//! some might still be in flight) → [`EpochSummary`] (all permits finished).

mod epoch;
mod summary;

pub use self::{
    epoch::{OpenEpoch, Permit, SealedEpoch},
    summary::{EpochSummary, LatencyStats, percentile_index},
};
