//! Snapshot encoding: collect live module state into a [`Snapshot`], and
//! validate untrusted documents before anything is applied.

use super::registry::ModuleRegistry;
use super::{SchemaVersion, Snapshot};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

const FIELD_VERSION: &str = "versao";
const FIELD_TIMESTAMP: &str = "timestamp";
const FIELD_MODULES: &str = "dados";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Backup file is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("Backup must be a JSON object")]
    NotAnObject,

    #[error("Backup is missing the required field '{0}'")]
    MissingField(&'static str),

    #[error("Unsupported backup version: {0}")]
    UnsupportedVersion(String),

    #[error("Backup field '{field}' is invalid: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    #[error("Backup contains no module data")]
    EmptyModules,
}

/// Read every registered module into a new snapshot stamped `created_at`.
///
/// A module that fails to export, or exports something other than a JSON
/// object, is logged and left out; the rest of the snapshot is still built.
pub fn collect(registry: &ModuleRegistry, created_at: DateTime<Utc>) -> Snapshot {
    let mut modules = Map::new();

    for module in registry.iter() {
        match module.export_state() {
            Ok(Value::Object(state)) => {
                modules.insert(module.name().to_string(), Value::Object(state));
            }
            Ok(other) => {
                tracing::warn!(
                    module = %module.name(),
                    kind = json_kind(&other),
                    "Module state is not an object, omitting from backup"
                );
            }
            Err(e) => {
                tracing::error!(module = %module.name(), error = %e, "Failed to read module state, omitting from backup");
            }
        }
    }

    Snapshot::new(
        SchemaVersion::CURRENT,
        created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        modules,
    )
}

/// Check a decoded document and turn it into a [`Snapshot`].
///
/// Checks run in order: object shape, required fields, version allow-list,
/// then module map. The whole document is accepted or rejected.
pub fn validate(candidate: Value) -> Result<Snapshot, ValidationError> {
    let Value::Object(mut document) = candidate else {
        return Err(ValidationError::NotAnObject);
    };

    for field in [FIELD_VERSION, FIELD_TIMESTAMP, FIELD_MODULES] {
        if is_missing(document.get(field)) {
            return Err(ValidationError::MissingField(field));
        }
    }

    let version = match document.get(FIELD_VERSION) {
        Some(Value::String(v)) => {
            SchemaVersion::parse(v).ok_or_else(|| ValidationError::UnsupportedVersion(v.clone()))?
        }
        Some(other) => return Err(ValidationError::UnsupportedVersion(other.to_string())),
        None => return Err(ValidationError::MissingField(FIELD_VERSION)),
    };

    let created_at = match document.remove(FIELD_TIMESTAMP) {
        Some(Value::String(ts)) => ts,
        _ => {
            return Err(ValidationError::InvalidField {
                field: FIELD_TIMESTAMP,
                reason: "must be a string",
            })
        }
    };

    let modules = match document.remove(FIELD_MODULES) {
        Some(Value::Object(modules)) => modules,
        _ => {
            return Err(ValidationError::InvalidField {
                field: FIELD_MODULES,
                reason: "must be an object",
            })
        }
    };

    if modules.is_empty() {
        return Err(ValidationError::EmptyModules);
    }

    Ok(Snapshot::new(version, created_at, modules))
}

/// Decode raw bytes and [`validate`] them.
pub fn parse(bytes: &[u8]) -> Result<Snapshot, ValidationError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| ValidationError::MalformedJson(e.to_string()))?;
    validate(value)
}

/// Pretty-printed wire form of a snapshot.
pub fn to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(snapshot)
}

/// Name for a locally downloaded backup: `<base>_<YYYY-MM-DD>.json`.
pub fn export_file_name(base: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.json", base, at.format("%Y-%m-%d"))
}

/// Name for a remote backup: `<prefix>_<timestamp>.json` with `:` and `.`
/// in the timestamp replaced by `-`.
pub fn remote_file_name(prefix: &str, at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{}_{}.json", prefix, stamp)
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
