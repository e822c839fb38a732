//! Playbook and record entities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tag describing how consumers interpret a record's value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    #[default]
    Text,
    Url,
    Json,
    List,
    Dict,
}

impl RecordType {
    /// Every accepted tag, in the order they are listed in error messages.
    pub const ALL: [RecordType; 5] = [
        RecordType::Text,
        RecordType::Url,
        RecordType::Json,
        RecordType::List,
        RecordType::Dict,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Text => "text",
            RecordType::Url => "url",
            RecordType::Json => "json",
            RecordType::List => "list",
            RecordType::Dict => "dict",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown record type tag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("\"{0}\" is not a valid choice.")]
pub struct UnknownRecordType(pub String);

impl FromStr for RecordType {
    type Err = UnknownRecordType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownRecordType(s.to_string()))
    }
}

/// Parent entity that owns records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playbook {
    pub id: u64,
    pub name: Option<String>,
    pub path: String,
}

/// Fields for a playbook that has not been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPlaybook {
    pub name: Option<String>,
    pub path: String,
}

impl NewPlaybook {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            name: None,
            path: path.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A key/value/type tuple owned by exactly one playbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub playbook: u64,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
}

/// Validated fields for a record that has not been stored yet.
///
/// The store assigns the `id` on insert and checks that `playbook` exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub playbook: u64,
    pub key: String,
    pub value: String,
    pub record_type: RecordType,
}

impl NewRecord {
    /// Creates a text record with an empty value.
    pub fn new(playbook: u64, key: impl Into<String>) -> Self {
        Self {
            playbook,
            key: key.into(),
            value: String::new(),
            record_type: RecordType::default(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_type(mut self, record_type: RecordType) -> Self {
        self.record_type = record_type;
        self
    }

    pub(crate) fn into_record(self, id: u64) -> Record {
        Record {
            id,
            playbook: self.playbook,
            key: self.key,
            value: self.value,
            record_type: self.record_type,
        }
    }
}

/// Validated partial update. `None` leaves the stored field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordChanges {
    pub playbook: Option<u64>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub record_type: Option<RecordType>,
}

impl RecordChanges {
    pub fn is_empty(&self) -> bool {
        self.playbook.is_none()
            && self.key.is_none()
            && self.value.is_none()
            && self.record_type.is_none()
    }

    pub(crate) fn apply(self, record: &mut Record) {
        if let Some(playbook) = self.playbook {
            record.playbook = playbook;
        }
        if let Some(key) = self.key {
            record.key = key;
        }
        if let Some(value) = self.value {
            record.value = value;
        }
        if let Some(record_type) = self.record_type {
            record.record_type = record_type;
        }
    }
}
