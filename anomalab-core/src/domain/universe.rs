//! Universe membership — constituent rows as listed by the provider.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One constituent of the tradable universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseRecord {
    pub symbol: String,
    pub company_name: String,
    pub sector: String,
    pub sub_sector: String,
}

/// Sorted, deduplicated symbol list from a set of universe records.
pub fn active_symbols(records: &[UniverseRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.symbol.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
