//! Persistent variables.
//!
//! Named values that outlive any single expansion pass. Variables are kept as
//! an ordered list under one storage key: setting an existing variable moves
//! it to the most-recently-set end while its initial value stays fixed, so
//! `reset` can always restore it.
//!
//! Every mutation is a single read-modify-write under the store's lock and is
//! written through to [`Storage`] immediately. Reads never fail: a missing
//! variable (or an unreadable backend) reads as the empty string.

mod ledger;
pub mod storage;

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, WeaveError};

pub use ledger::IdLedger;
pub use storage::{JsonFileStorage, MemoryStorage, Storage};

/// Storage key holding the variable list.
pub const VARIABLES_KEY: &str = "persistent-variables";

/// A durable named value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentVariable {
    pub name: String,
    /// Current value.
    pub value: String,
    /// Value the variable was created with; restored by `reset`.
    #[serde(rename = "initialValue")]
    pub initial_value: String,
}

/// Ordered store of [`PersistentVariable`]s over a [`Storage`] backend.
pub struct VariableStore {
    storage: Arc<dyn Storage>,
    lock: Mutex<()>,
}

impl VariableStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            lock: Mutex::new(()),
        }
    }

    /// Current value of `name`, or `""` if it does not exist.
    pub fn get(&self, name: &str) -> String {
        self.list()
            .into_iter()
            .find(|v| v.name == name)
            .map(|v| v.value)
            .unwrap_or_default()
    }

    /// All variables, least recently set first.
    pub fn list(&self) -> Vec<PersistentVariable> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        match self.read() {
            Ok(vars) => vars,
            Err(e) => {
                warn!(error = %e, "Failed to read persistent variables");
                Vec::new()
            }
        }
    }

    /// Variable names, least recently set first.
    pub fn names(&self) -> Vec<String> {
        self.list().into_iter().map(|v| v.name).collect()
    }

    /// Set `name` to `value`, creating it (with `value` as its initial value)
    /// if needed. The variable moves to the end of the list.
    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        self.update(|vars| {
            let variable = match vars.iter().position(|v| v.name == name) {
                Some(idx) => {
                    let mut existing = vars.remove(idx);
                    existing.value = value.to_string();
                    existing
                }
                None => PersistentVariable {
                    name: name.to_string(),
                    value: value.to_string(),
                    initial_value: value.to_string(),
                },
            };
            vars.push(variable);
            ((), true)
        })
    }

    /// Add one to the integer value of `name` and return the new value.
    pub fn increment(&self, name: &str) -> Result<i64> {
        self.add(name, 1)
    }

    /// Subtract one from the integer value of `name` and return the new value.
    pub fn decrement(&self, name: &str) -> Result<i64> {
        self.add(name, -1)
    }

    /// Restore `name` to its initial value. Returns the restored value, or
    /// `None` if the variable does not exist (nothing is written then).
    pub fn reset(&self, name: &str) -> Result<Option<String>> {
        self.update(|vars| match vars.iter().position(|v| v.name == name) {
            Some(idx) => {
                let mut variable = vars.remove(idx);
                variable.value = variable.initial_value.clone();
                let restored = variable.value.clone();
                vars.push(variable);
                (Some(restored), true)
            }
            None => (None, false),
        })
    }

    /// Remove `name`. Returns `true` if it existed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        self.update(|vars| match vars.iter().position(|v| v.name == name) {
            Some(idx) => {
                vars.remove(idx);
                (true, true)
            }
            None => (false, false),
        })
    }

    fn add(&self, name: &str, delta: i64) -> Result<i64> {
        self.update(|vars| {
            let mut variable = match vars.iter().position(|v| v.name == name) {
                Some(idx) => vars.remove(idx),
                None => PersistentVariable {
                    name: name.to_string(),
                    value: "0".to_string(),
                    initial_value: "0".to_string(),
                },
            };
            let current = variable.value.trim().parse::<i64>().unwrap_or(0);
            let next = current.saturating_add(delta);
            variable.value = next.to_string();
            vars.push(variable);
            (next, true)
        })
    }

    /// Locked read-modify-write. `f` returns its result and whether the list
    /// changed; unchanged lists are not written back.
    fn update<T>(&self, f: impl FnOnce(&mut Vec<PersistentVariable>) -> (T, bool)) -> Result<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| WeaveError::Storage(format!("Failed to acquire variable lock: {}", e)))?;

        let mut vars = self.read()?;
        let (out, changed) = f(&mut vars);
        if changed {
            let value = serde_json::to_value(&vars)?;
            self.storage.set(VARIABLES_KEY, value)?;
        }
        Ok(out)
    }

    fn read(&self) -> Result<Vec<PersistentVariable>> {
        match self.storage.get(VARIABLES_KEY)? {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value).map_err(|e| {
                WeaveError::Storage(format!("Failed to parse persistent variables: {}", e))
            }),
        }
    }
}
