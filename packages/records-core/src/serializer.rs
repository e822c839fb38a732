//! Conversion between wire payloads and stored entities.
//!
//! Incoming JSON bodies deserialize into payload structs that keep every
//! field as raw JSON, so that a missing, null or wrongly typed field surfaces
//! as a field-level validation message rather than a parse error. Fields the
//! resource does not define are collected too and reported the same way.
//! [`validate`] and [`validate_patch`] turn those payloads into the entity
//! types the store accepts. [`render`] produces the outgoing representation.

use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};

use crate::database::Database;
use crate::entity::{NewPlaybook, NewRecord, Playbook, Record, RecordChanges, RecordType};
use crate::error::{DbError, ValidationErrors};

/// Maximum length of a record key.
pub const MAX_KEY_LENGTH: usize = 255;
/// Maximum length of a playbook name.
pub const MAX_NAME_LENGTH: usize = 255;
/// Maximum length of a playbook path.
pub const MAX_PATH_LENGTH: usize = 3000;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const NULL: &str = "This field may not be null.";
const NOT_A_STRING: &str = "Not a valid string.";
const UNKNOWN_FIELD: &str = "This field is not recognized.";

/// Keeps an explicit `null` as `Some(Value::Null)`; only an absent field is
/// `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Record body for create and partial update requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordFields {
    #[serde(default, deserialize_with = "present")]
    pub playbook: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub key: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub value: Option<Value>,
    #[serde(rename = "type", default, deserialize_with = "present")]
    pub record_type: Option<Value>,
    /// Fields the record resource does not define
    #[serde(flatten)]
    pub unknown: Map<String, Value>,
}

/// Record body for create requests.
pub type RecordPayload = RecordFields;
/// Record body for partial update requests.
pub type RecordPatch = RecordFields;

/// Playbook body for create requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaybookPayload {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub path: Option<Value>,
    #[serde(flatten)]
    pub unknown: Map<String, Value>,
}

fn check_unknown(unknown: &Map<String, Value>, errors: &mut ValidationErrors) {
    for name in unknown.keys() {
        errors.add(name.as_str(), UNKNOWN_FIELD);
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Reads a string field. Numbers are accepted in their decimal form.
fn check_string(field: &str, value: Value, errors: &mut ValidationErrors) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => {
            errors.add(field, NULL);
            None
        }
        _ => {
            errors.add(field, NOT_A_STRING);
            None
        }
    }
}

/// Reads a playbook reference given as an integer or a numeric string.
fn check_playbook(value: Value, errors: &mut ValidationErrors) -> Option<u64> {
    let parsed = match &value {
        Value::Null => {
            errors.add("playbook", NULL);
            return None;
        }
        Value::Number(n) => match n.as_u64() {
            Some(id) => Ok(id),
            None if n.is_i64() => Err(format!("Invalid pk \"{}\" - object does not exist.", n)),
            None => Err(incorrect_pk_type(&value)),
        },
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| incorrect_pk_type(&value)),
        _ => Err(incorrect_pk_type(&value)),
    };
    match parsed {
        Ok(id) => Some(id),
        Err(message) => {
            errors.add("playbook", message);
            None
        }
    }
}

fn incorrect_pk_type(value: &Value) -> String {
    format!(
        "Incorrect type. Expected pk value, received {}.",
        json_type_name(value)
    )
}

fn check_key(value: Value, errors: &mut ValidationErrors) -> Option<String> {
    let key = check_string("key", value, errors)?;
    if key.trim().is_empty() {
        errors.add("key", BLANK);
        None
    } else if key.chars().count() > MAX_KEY_LENGTH {
        errors.add(
            "key",
            format!("Ensure this field has no more than {} characters.", MAX_KEY_LENGTH),
        );
        None
    } else {
        Some(key)
    }
}

fn check_type(value: Value, errors: &mut ValidationErrors) -> Option<RecordType> {
    let raw = match value {
        Value::Null => {
            errors.add("type", NULL);
            return None;
        }
        Value::String(s) => s,
        other => other.to_string(),
    };
    match raw.parse::<RecordType>() {
        Ok(t) => Some(t),
        Err(e) => {
            errors.add("type", e.to_string());
            None
        }
    }
}

fn check_length(field: &str, text: &str, max: usize, errors: &mut ValidationErrors) {
    if text.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", max),
        );
    }
}

/// Validates a create payload.
///
/// `key` and `playbook` are required. `value` defaults to an empty string and
/// `type` to `text`. An explicit `null` is rejected for every field. Every
/// problem is reported, not just the first.
pub fn validate(payload: RecordPayload) -> Result<NewRecord, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_unknown(&payload.unknown, &mut errors);

    let key = match payload.key {
        Some(value) => check_key(value, &mut errors),
        None => {
            errors.add("key", REQUIRED);
            None
        }
    };
    let playbook = match payload.playbook {
        Some(value) => check_playbook(value, &mut errors),
        None => {
            errors.add("playbook", REQUIRED);
            None
        }
    };
    let value = payload
        .value
        .map(|value| check_string("value", value, &mut errors));
    let record_type = payload
        .record_type
        .map(|value| check_type(value, &mut errors));

    match (playbook, key) {
        (Some(playbook), Some(key)) if errors.is_empty() => Ok(NewRecord {
            playbook,
            key,
            value: value.flatten().unwrap_or_default(),
            record_type: record_type.flatten().unwrap_or_default(),
        }),
        _ => Err(errors),
    }
}

/// Validates a partial update payload. Only supplied fields are checked.
pub fn validate_patch(patch: RecordPatch) -> Result<RecordChanges, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_unknown(&patch.unknown, &mut errors);

    let changes = RecordChanges {
        playbook: patch
            .playbook
            .and_then(|value| check_playbook(value, &mut errors)),
        key: patch.key.and_then(|value| check_key(value, &mut errors)),
        value: patch
            .value
            .and_then(|value| check_string("value", value, &mut errors)),
        record_type: patch
            .record_type
            .and_then(|value| check_type(value, &mut errors)),
    };
    errors.into_result(changes)
}

/// Validates a playbook payload. `name` may be null; `path` defaults to an
/// empty string.
pub fn validate_playbook(payload: PlaybookPayload) -> Result<NewPlaybook, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_unknown(&payload.unknown, &mut errors);

    let name = match payload.name {
        None | Some(Value::Null) => None,
        Some(value) => check_string("name", value, &mut errors),
    };
    if let Some(name) = &name {
        check_length("name", name, MAX_NAME_LENGTH, &mut errors);
    }
    let path = payload
        .path
        .and_then(|value| check_string("path", value, &mut errors))
        .unwrap_or_default();
    check_length("path", &path, MAX_PATH_LENGTH, &mut errors);

    errors.into_result(NewPlaybook { name, path })
}

/// Validates `payload` and stores the resulting record.
pub fn create(db: &Database, payload: RecordPayload) -> Result<Record, DbError> {
    let new_record = validate(payload)?;
    db.insert_record(new_record)
}

/// Validates `patch` and applies it to record `id`.
pub fn update(db: &Database, id: u64, patch: RecordPatch) -> Result<Record, DbError> {
    let changes = validate_patch(patch)?;
    db.update_record(id, changes)
}

/// Validates `payload` and stores the resulting playbook.
pub fn create_playbook(db: &Database, payload: PlaybookPayload) -> Result<Playbook, DbError> {
    let new_playbook = validate_playbook(payload)?;
    db.create_playbook(new_playbook)
}

/// Externally visible representation of a record.
pub fn render(record: &Record) -> Value {
    json!({
        "id": record.id,
        "key": record.key,
        "value": record.value,
        "type": record.record_type.as_str(),
        "playbook": record.playbook,
    })
}

/// Externally visible representation of a playbook.
pub fn render_playbook(playbook: &Playbook) -> Value {
    json!({
        "id": playbook.id,
        "name": playbook.name,
        "path": playbook.path,
    })
}
