//! Record listing: filters, ordering and limit/offset paging.

use std::cmp::Ordering;
use std::str::FromStr;

use crate::entity::{Record, RecordType};

/// Sort order for record listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordOrder {
    #[default]
    IdAsc,
    IdDesc,
    KeyAsc,
    KeyDesc,
}

impl RecordOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordOrder::IdAsc => "id",
            RecordOrder::IdDesc => "-id",
            RecordOrder::KeyAsc => "key",
            RecordOrder::KeyDesc => "-key",
        }
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        match self {
            RecordOrder::IdAsc => a.id.cmp(&b.id),
            RecordOrder::IdDesc => b.id.cmp(&a.id),
            // Ties on key fall back to id so paging stays stable
            RecordOrder::KeyAsc => a.key.cmp(&b.key).then(a.id.cmp(&b.id)),
            RecordOrder::KeyDesc => b.key.cmp(&a.key).then(a.id.cmp(&b.id)),
        }
    }
}

impl FromStr for RecordOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(RecordOrder::IdAsc),
            "-id" => Ok(RecordOrder::IdDesc),
            "key" => Ok(RecordOrder::KeyAsc),
            "-key" => Ok(RecordOrder::KeyDesc),
            other => Err(format!(
                "Invalid order '{}', expected one of: id, -id, key, -key",
                other
            )),
        }
    }
}

/// Filters and paging for a record listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    /// Maximum number of records to return (None = all)
    pub limit: Option<usize>,
    /// Number of matching records to skip
    pub offset: usize,
    /// Only records owned by this playbook
    pub playbook: Option<u64>,
    /// Only records with exactly this key
    pub key: Option<String>,
    /// Only records with this type tag
    pub record_type: Option<RecordType>,
    pub order: RecordOrder,
}

impl RecordQuery {
    /// Returns true if `record` passes every filter.
    pub fn matches(&self, record: &Record) -> bool {
        self.playbook.map_or(true, |p| record.playbook == p)
            && self.key.as_deref().map_or(true, |k| record.key == k)
            && self.record_type.map_or(true, |t| record.record_type == t)
    }

    /// Filters, sorts and pages `records`.
    pub(crate) fn run<'a, I>(&self, records: I) -> Page<Record>
    where
        I: Iterator<Item = &'a Record>,
    {
        let mut matching: Vec<&Record> = records.filter(|r| self.matches(r)).collect();
        matching.sort_by(|a, b| self.order.compare(a, b));
        let count = matching.len();
        let items = matching
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Page { count, items }
    }
}

/// One page of a listing plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub count: usize,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Pages an already ordered sequence.
    pub(crate) fn from_ordered<I>(items: I, limit: Option<usize>, offset: usize) -> Self
    where
        I: ExactSizeIterator<Item = T>,
    {
        let count = items.len();
        let items = items
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        Page { count, items }
    }
}
