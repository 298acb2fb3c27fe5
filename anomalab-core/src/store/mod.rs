//! Persistence — bronze (raw, partitioned) and silver (canonical) tables.

pub mod bronze;
pub mod silver;

pub use bronze::{BronzeStore, StoreError};
pub use silver::{dedupe_latest_wins, CanonicalBuilder, CanonicalTable};
