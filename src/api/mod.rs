//! API Module
//!
//! - commands.rs: collection, report generation and inspection entry points

pub mod commands;

pub use commands::*;
