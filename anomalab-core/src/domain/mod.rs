//! Domain types: raw and canonical price rows, news, universe, signal vectors.

pub mod news;
pub mod price;
pub mod signal;
pub mod universe;

pub use news::RawNewsRecord;
pub use price::{CanonicalPriceRow, RawPriceRecord};
pub use signal::SignalVector;
pub use universe::UniverseRecord;
