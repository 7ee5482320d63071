//! Module registration table.
//!
//! Each domain state container is registered once at startup under a stable
//! name. The codec reads through [`StateModule::export_state`] and the
//! applier writes through [`StateModule::replace_state`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    #[error("Module '{0}' is already registered")]
    Duplicate(String),

    #[error("Unknown module: {0}")]
    Unknown(String),

    #[error("Module '{name}' rejected the state: {reason}")]
    Rejected { name: String, reason: String },

    #[error("Module '{0}' is unavailable")]
    Unavailable(String),
}

/// One independently owned piece of application state.
pub trait StateModule: Send + Sync {
    fn name(&self) -> &str;

    fn export_state(&self) -> Result<Value, ModuleError>;

    /// Replace the module's whole state. On error the previous state is kept.
    fn replace_state(&self, state: Value) -> Result<(), ModuleError>;
}

/// State container holding a typed value, exchanged as JSON.
pub struct JsonModule<T> {
    name: String,
    state: RwLock<T>,
}

impl<T: Default> JsonModule<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_state(name, T::default())
    }
}

impl<T> JsonModule<T> {
    pub fn with_state(name: impl Into<String>, state: T) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(state),
        }
    }
}

impl<T: Clone> JsonModule<T> {
    pub fn current(&self) -> T {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T> StateModule for JsonModule<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn export_state(&self) -> Result<Value, ModuleError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_value(&*state).map_err(|e| ModuleError::Rejected {
            name: self.name.clone(),
            reason: e.to_string(),
        })
    }

    fn replace_state(&self, state: Value) -> Result<(), ModuleError> {
        // Decode before taking the lock so a bad value never touches state.
        let decoded: T = serde_json::from_value(state).map_err(|e| ModuleError::Rejected {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = decoded;
        Ok(())
    }
}

/// Registered modules, in registration order.
#[derive(Default, Clone)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn StateModule>>,
    index: HashMap<String, usize>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of untyped JSON-object modules, one per name.
    pub fn from_names<I, S>(names: I) -> Result<Self, ModuleError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for name in names {
            let module: JsonModule<serde_json::Map<String, Value>> = JsonModule::new(name);
            registry.register(Arc::new(module))?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, module: Arc<dyn StateModule>) -> Result<(), ModuleError> {
        let name = module.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ModuleError::Duplicate(name));
        }
        self.index.insert(name, self.modules.len());
        self.modules.push(module);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn StateModule>> {
        self.index.get(name).map(|&i| &self.modules[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn StateModule>> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Finances {
        balance: i64,
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = ModuleRegistry::from_names(["sono", "perfil", "sono"]);
        assert_eq!(result.unwrap_err(), ModuleError::Duplicate("sono".to_string()));
    }

    #[test]
    fn registration_order_is_preserved() {
        let registry = ModuleRegistry::from_names(["sono", "perfil", "financas"]).unwrap();
        assert_eq!(registry.names(), vec!["sono", "perfil", "financas"]);
        assert!(registry.contains("perfil"));
        assert!(registry.get("recipes").is_none());
    }

    #[test]
    fn typed_module_round_trips_through_json() {
        let module = JsonModule::<Finances>::new("financas");
        module.replace_state(json!({"balance": 100})).unwrap();

        assert_eq!(module.current(), Finances { balance: 100 });
        assert_eq!(module.export_state().unwrap(), json!({"balance": 100}));
    }

    #[test]
    fn rejected_state_leaves_previous_value() {
        let module = JsonModule::with_state("financas", Finances { balance: 7 });

        let err = module
            .replace_state(json!({"balance": "lots"}))
            .unwrap_err();

        assert!(matches!(err, ModuleError::Rejected { ref name, .. } if name == "financas"));
        assert_eq!(module.current(), Finances { balance: 7 });
    }

    #[test]
    fn untyped_modules_start_empty() {
        let registry = ModuleRegistry::from_names(["perfil"]).unwrap();
        let state = registry.get("perfil").unwrap().export_state().unwrap();
        assert_eq!(state, json!({}));
    }
}
