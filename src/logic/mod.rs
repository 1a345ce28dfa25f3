//! Core logic: collection, normalization, filtering, aggregation and reporting

pub mod record;
pub mod collector;
pub mod adapter;
pub mod filter;
pub mod aggregator;
pub mod report;
pub mod system_info;
pub mod config;
