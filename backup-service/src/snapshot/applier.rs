//! Writes a validated [`Snapshot`] into the registered modules.

use super::registry::ModuleRegistry;
use super::Snapshot;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The snapshot predates the module; its state was left alone.
    Absent,
    NotAnObject,
    Rejected { detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedModule {
    pub module: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub applied_modules: Vec<String>,
    pub skipped_modules: Vec<SkippedModule>,
    /// Present in the snapshot but not registered here.
    pub ignored_modules: Vec<String>,
}

impl ApplyReport {
    /// True when some module had data in the snapshot but could not take it.
    pub fn is_partial(&self) -> bool {
        self.skipped_modules
            .iter()
            .any(|s| s.reason != SkipReason::Absent)
    }

    fn skip(&mut self, module: &str, reason: SkipReason) {
        self.skipped_modules.push(SkippedModule {
            module: module.to_string(),
            reason,
        });
    }
}

/// Replace each registered module's state with its entry in `snapshot`.
///
/// Runs to completion for every module; a module that cannot take its
/// state is reported as skipped and the rest are still applied.
pub fn apply(snapshot: &Snapshot, registry: &ModuleRegistry) -> ApplyReport {
    let mut report = ApplyReport::default();

    for module in registry.iter() {
        let name = module.name();
        match snapshot.module(name) {
            None => {
                tracing::info!(module = %name, "Module absent from backup, keeping current state");
                report.skip(name, SkipReason::Absent);
            }
            Some(state @ Value::Object(_)) => match module.replace_state(state.clone()) {
                Ok(()) => report.applied_modules.push(name.to_string()),
                Err(e) => {
                    tracing::warn!(module = %name, error = %e, "Module rejected restored state");
                    report.skip(
                        name,
                        SkipReason::Rejected {
                            detail: e.to_string(),
                        },
                    );
                }
            },
            Some(_) => {
                tracing::warn!(module = %name, "Module state in backup is not an object");
                report.skip(name, SkipReason::NotAnObject);
            }
        }
    }

    report.ignored_modules = snapshot
        .module_names()
        .filter(|name| !registry.contains(name))
        .map(str::to_string)
        .collect();

    if !report.ignored_modules.is_empty() {
        tracing::info!(modules = ?report.ignored_modules, "Ignoring unregistered modules in backup");
    }

    report
}
