//! Ordering of cache entries in listings.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::record::CachedRecord;

/// Attribute entries are ordered by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// File base name (the identifier).
    FileName,
    /// Display name, ties broken by identifier.
    Name,
    /// Creation time, ties broken by identifier.
    #[default]
    Timestamp,
}

impl SortKey {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FileName => "file_name",
            Self::Name => "name",
            Self::Timestamp => "timestamp",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file_name" | "filename" | "file" => Some(Self::FileName),
            "name" => Some(Self::Name),
            "timestamp" | "date" | "time" => Some(Self::Timestamp),
            _ => None,
        }
    }
}

/// Sort key plus direction. Newest first by default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SortOrder {
    pub key: SortKey,
    pub ascending: bool,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self { key: SortKey::Timestamp, ascending: false }
    }
}

impl SortOrder {
    pub fn new(key: SortKey, ascending: bool) -> Self {
        Self { key, ascending }
    }

    /// Total order over entries; descending reverses it wholesale.
    pub fn compare<C: CachedRecord>(&self, a: &C, b: &C) -> Ordering {
        let by_id = || a.identifier().cmp(b.identifier());
        let ord = match self.key {
            SortKey::FileName => by_id(),
            SortKey::Name => a.display_name().cmp(b.display_name()).then_with(by_id),
            SortKey::Timestamp => a.timestamp().cmp(&b.timestamp()).then_with(by_id),
        };
        if self.ascending { ord } else { ord.reverse() }
    }

    pub fn sort<C: CachedRecord>(&self, entries: &mut [C]) {
        entries.sort_by(|a, b| self.compare(a, b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ScanCache;
    use crate::util::clock;

    fn entries() -> Vec<ScanCache> {
        vec![
            ScanCache::new("b", "Beta", clock::from_micros(2_000)),
            ScanCache::new("a", "Alpha", clock::from_micros(3_000)),
            ScanCache::new("c", "Alpha", clock::from_micros(1_000)),
        ]
    }

    fn ids(entries: &[ScanCache]) -> Vec<&str> {
        entries.iter().map(|e| e.identifier.as_str()).collect()
    }

    #[test]
    fn test_orders() {
        let mut e = entries();
        SortOrder::default().sort(&mut e);
        assert_eq!(ids(&e), vec!["a", "b", "c"]);

        SortOrder::new(SortKey::Timestamp, true).sort(&mut e);
        assert_eq!(ids(&e), vec!["c", "b", "a"]);

        SortOrder::new(SortKey::Name, true).sort(&mut e);
        assert_eq!(ids(&e), vec!["a", "c", "b"]);

        SortOrder::new(SortKey::FileName, false).sort(&mut e);
        assert_eq!(ids(&e), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_serde() {
        let order = SortOrder::new(SortKey::FileName, true);
        let json = serde_json::to_string(&order).unwrap();
        assert_eq!(json, r#"{"key":"file_name","ascending":true}"#);
        let back: SortOrder = serde_json::from_str(r#"{"key":"name"}"#).unwrap();
        assert_eq!(back, SortOrder::new(SortKey::Name, false));
        assert_eq!(SortKey::parse("date"), Some(SortKey::Timestamp));
    }
}
