//! News records attached to symbols as scan evidence.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One news item for a symbol. Immutable once persisted.
///
/// News is fetched and stored as supporting evidence for a ranking run; it
/// does not enter the signal computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNewsRecord {
    pub symbol: String,
    pub published_at: NaiveDateTime,
    pub headline: String,
    pub snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn serialization_roundtrip() {
        let rec = RawNewsRecord {
            symbol: "AAPL".into(),
            published_at: NaiveDate::from_ymd_opt(2025, 6, 2)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap(),
            headline: "Apple announces something".into(),
            snippet: "Details inside.".into(),
        };
        let json = serde_json::to_string(&rec).unwrap();
        let deser: RawNewsRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rec, deser);
    }
}
