#![cfg_attr(
    not(test),
    warn(clippy::print_stdout, clippy::dbg_macro),
    deny(clippy::unwrap_used, clippy::expect_used)
)]

//! Closed-loop load generation with epoch based statistics.
//!
//! A [`Presser`] mints permits at a fixed cadence, hands them to a fixed
//! size pool of workers through a bounded queue and aggregates the
//! outcome of each unit of [`Work`] into fixed size time windows
//! ([`stat::EpochSummary`]).

pub mod config;
pub mod press;
pub mod report;
pub mod stat;
pub mod utils;

pub use self::{
    config::{PressConfig, PressConfigError},
    press::{Presser, Work},
    report::{Reporter, RunTotals},
};
