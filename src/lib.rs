//! Alpaca portfolio balance for Chainlink Functions.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod brokerage;
pub mod functions;
pub mod secrets;
