//! Directive registry for PromptWeave
//!
//! This module provides the `DirectiveRegistry`, the ordered catalog the
//! engine runs directives from, and `RegistryCache`, which keeps one built
//! registry around until custom directive documents need to be re-read.
//!
//! Pattern keys are unique across the registry. Custom directives come
//! before built-ins so their output can itself contain built-in directives,
//! but a custom entry cannot take over a built-in key.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::error::{Result, WeaveError};

use super::builtin;
use super::custom::{self, CustomDirectiveSet};
use super::scanner;
use super::types::DirectiveDefinition;

/// Ordered, key-unique directive catalog.
///
/// # Example
///
/// ```rust
/// use promptweave::directives::DirectiveRegistry;
///
/// let registry = DirectiveRegistry::builtin().unwrap();
/// let found = registry.check_for_directives("Hi {{user}}, it is {{date}}");
/// let names: Vec<&str> = found.iter().map(|d| d.name.as_str()).collect();
/// assert_eq!(names, vec!["user", "date"]);
/// ```
#[derive(Debug, Clone)]
pub struct DirectiveRegistry {
    entries: Vec<DirectiveDefinition>,
    /// Map from pattern key to index in `entries`.
    keys: HashMap<String, usize>,
}

impl DirectiveRegistry {
    /// Registry holding only the built-in catalog.
    pub fn builtin() -> Result<Self> {
        Self::new(&CustomDirectiveSet::new())
    }

    /// Registry of `custom` directives followed by the built-in catalog.
    ///
    /// Custom entries whose key equals a built-in key are dropped. Only a
    /// broken built-in catalog is an error.
    pub fn new(custom: &CustomDirectiveSet) -> Result<Self> {
        let builtins = builtin::catalog()?;
        let builtin_keys: HashMap<&str, &str> = builtins
            .iter()
            .map(|d| (d.key.as_str(), d.name.as_str()))
            .collect();

        let mut entries = Vec::with_capacity(custom.len() + builtins.len());
        for (key, spec) in custom.iter() {
            if let Some(builtin) = builtin_keys.get(key.as_str()) {
                warn!(
                    key = %key,
                    directive = %spec.name,
                    builtin = %builtin,
                    "Custom directive shadows a built-in key, skipping"
                );
                continue;
            }
            match custom::to_definition(key, spec) {
                Ok(def) => entries.push(def),
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to build custom directive, skipping");
                }
            }
        }
        entries.extend(builtins);

        let keys = entries
            .iter()
            .enumerate()
            .map(|(i, d)| (d.key.clone(), i))
            .collect();

        Ok(Self { entries, keys })
    }

    /// Append a directive, typically one backed by an external evaluator.
    ///
    /// # Errors
    /// `WeaveError::Config` if another directive already uses the same key.
    pub fn register(&mut self, def: DirectiveDefinition) -> Result<()> {
        if let Some(&existing) = self.keys.get(&def.key) {
            return Err(WeaveError::Config(format!(
                "Directive key '{}' of '{}' conflicts with existing directive '{}'",
                def.key, def.name, self.entries[existing].name
            )));
        }

        info!(directive = %def.name, key = %def.key, "Registered directive");
        self.keys.insert(def.key.clone(), self.entries.len());
        self.entries.push(def);
        Ok(())
    }

    /// Look up a directive by pattern key.
    pub fn get(&self, key: &str) -> Option<&DirectiveDefinition> {
        self.keys.get(key).map(|&i| &self.entries[i])
    }

    /// Look up a directive by name. The first registered wins.
    pub fn find(&self, name: &str) -> Option<&DirectiveDefinition> {
        self.entries.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Directives in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &DirectiveDefinition> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|d| d.name.as_str()).collect()
    }

    /// Directives that would fire on `text`, without evaluating anything.
    ///
    /// Directives matched by their primary pattern come first, then those
    /// matched only through an alias; registry order within each group.
    pub fn check_for_directives(&self, text: &str) -> Vec<&DirectiveDefinition> {
        let spans = scanner::scan(text);
        let occurrences: Vec<&str> = spans.iter().map(|s| s.text(text)).collect();

        let mut primary = Vec::new();
        let mut alias_only = Vec::new();
        for def in &self.entries {
            if occurrences.iter().any(|o| def.matches_primary(o)) {
                primary.push(def);
            } else if occurrences.iter().any(|o| def.matches_alias(o)) {
                alias_only.push(def);
            }
        }

        primary.extend(alias_only);
        primary
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Holds a built registry until it is invalidated.
///
/// `current()` builds lazily on first use; `reload()` re-reads the custom
/// directive documents and swaps the registry in one step, so callers that
/// already hold an `Arc` keep a consistent catalog.
pub struct RegistryCache {
    files: Vec<PathBuf>,
    extra: Vec<DirectiveDefinition>,
    current: RwLock<Option<Arc<DirectiveRegistry>>>,
}

impl RegistryCache {
    /// Cache over the custom directive documents at `files`, read in order.
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            extra: Vec::new(),
            current: RwLock::new(None),
        }
    }

    /// Cache of the built-in catalog only.
    pub fn builtin() -> Self {
        Self::new(Vec::new())
    }

    /// Add a directive to every registry this cache builds.
    pub fn with_directive(mut self, def: DirectiveDefinition) -> Self {
        self.extra.push(def);
        self
    }

    /// The cached registry, building it if needed.
    pub fn current(&self) -> Result<Arc<DirectiveRegistry>> {
        {
            let guard = self.current.read().map_err(|e| {
                WeaveError::Config(format!("Failed to acquire registry lock: {}", e))
            })?;
            if let Some(registry) = guard.as_ref() {
                return Ok(Arc::clone(registry));
            }
        }
        self.reload()
    }

    /// Rebuild from the custom directive documents and replace the cache.
    pub fn reload(&self) -> Result<Arc<DirectiveRegistry>> {
        let load = custom::load_custom_files(&self.files);
        let mut registry = DirectiveRegistry::new(&load.directives)?;
        for def in &self.extra {
            registry.register(def.clone())?;
        }

        info!(
            directives = registry.len(),
            custom = load.directives.len(),
            problems = load.diagnostics.len(),
            "Loaded directive registry"
        );

        let registry = Arc::new(registry);
        let mut guard = self
            .current
            .write()
            .map_err(|e| WeaveError::Config(format!("Failed to acquire registry lock: {}", e)))?;
        *guard = Some(Arc::clone(&registry));
        Ok(registry)
    }

    /// Drop the cached registry; the next `current()` rebuilds it.
    pub fn invalidate(&self) {
        match self.current.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}
