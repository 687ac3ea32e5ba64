//! Prediction aggregation.
//!
//! `engine` runs the concurrent fan-out; `stats` summarizes what came back.

pub mod engine;
pub mod stats;

pub use engine::{AggregatorOptions, PredictionAggregator};
pub use stats::*;
