//! Trivial node-count telemetry for the OpenProse DSL.
//!
//! `count_nodes` is the crate's single entry point. This is deliberately
//! not a full telemetry subsystem: no backend, no discretion-body
//! interpretation, no configuration — just a tally.

pub mod counter;

pub use counter::{count_nodes, NodeCounts};
