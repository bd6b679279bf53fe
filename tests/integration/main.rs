//! Integration tests: each flow end to end against mocked upstreams.

mod mock_brokerage;
mod mock_chain;
mod simulation;
mod upload;
