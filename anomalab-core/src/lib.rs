//! Anomalab Core — rate-governed market data acquisition and anomaly signals.
//!
//! This crate contains the heart of the daily scanner:
//! - Domain types (raw/canonical price rows, news, universe, signal vectors)
//! - Sliding-window rate limiter shared across fetch workers
//! - Market data client with a structured error taxonomy
//! - Parallel per-symbol fetch orchestration with failure isolation
//! - Bronze (partitioned raw) and silver (canonical) parquet stores
//! - Signal engine producing a deterministic interestingness ranking

pub mod client;
pub mod domain;
pub mod fetch;
pub mod limiter;
pub mod signals;
pub mod store;
