// src/report/mod.rs

//! Coverage report fragments, their aggregation and output.

pub mod aggregator;
pub mod fragment;
pub mod writer;

pub use aggregator::{AggregatedReport, Counter, ReportAggregator};
pub use fragment::{CoverageRecord, Metric, ReportFragment};
pub use writer::{render, write_report};
