//! Market potential engine.
//!
//! Turns raw per-company records into per-segment market metrics and
//! per-channel go/no-go decisions. See `pipeline` for the execution order.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod filter;
pub mod loader;
pub mod pipeline;
pub mod record;
pub mod reference;
pub mod store;
pub mod types;
