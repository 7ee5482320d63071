//! Versioned backup snapshots.
//!
//! A [`Snapshot`] is the union of every registered module's state at one
//! instant. [`codec`] builds and validates them, [`applier`] writes a
//! validated snapshot back into the [`registry`].

pub mod applier;
pub mod codec;
pub mod registry;

use serde::Serialize;
use serde_json::{Map, Value};

pub use applier::{apply, ApplyReport, SkipReason, SkippedModule};
pub use codec::ValidationError;
pub use registry::{JsonModule, ModuleError, ModuleRegistry, StateModule};

/// Snapshot schema versions this service reads. Acceptance is by exact
/// match; a newer version needs an explicit entry here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchemaVersion {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "1.1")]
    V1_1,
}

impl SchemaVersion {
    pub const CURRENT: SchemaVersion = SchemaVersion::V1_1;

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::V1_0 => "1.0",
            SchemaVersion::V1_1 => "1.1",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "1.0" => Some(SchemaVersion::V1_0),
            "1.1" => Some(SchemaVersion::V1_1),
            _ => None,
        }
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete, well-formed backup document.
///
/// Only [`codec::collect`] and [`codec::validate`] construct snapshots, so
/// holding one means it has passed validation. It is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    #[serde(rename = "versao")]
    schema_version: SchemaVersion,
    #[serde(rename = "timestamp")]
    created_at: String,
    #[serde(rename = "dados")]
    modules: Map<String, Value>,
}

impl Snapshot {
    pub(crate) fn new(
        schema_version: SchemaVersion,
        created_at: String,
        modules: Map<String, Value>,
    ) -> Self {
        Self {
            schema_version,
            created_at,
            modules,
        }
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.schema_version
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn modules(&self) -> &Map<String, Value> {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&Value> {
        self.modules.get(name)
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}
