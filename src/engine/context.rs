//! Expansion context and per-call limits.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::ExpansionConfig;
use crate::directives::Evaluation;

/// Context key of the caller's input text.
pub const INPUT_KEY: &str = "input";

/// Context key of the comma-separated selected file paths.
pub const SELECTED_FILES_KEY: &str = "selectedFiles";

/// String-keyed values shared by every directive in one `expand` call.
///
/// Seeded by the caller; each evaluation's updates are merged in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpansionContext {
    values: IndexMap<String, String>,
}

impl ExpansionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Whether `key` counts as already known. An empty `input` does not.
    pub fn satisfies(&self, key: &str) -> bool {
        match self.values.get(key) {
            Some(value) => !(key == INPUT_KEY && value.is_empty()),
            None => false,
        }
    }

    /// Record every update of `evaluation`, in order.
    pub fn merge(&mut self, evaluation: &Evaluation) {
        for (key, value) in &evaluation.updates {
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Selected file paths, trimmed, blanks dropped.
    pub fn selected_files(&self) -> Vec<String> {
        self.get(SELECTED_FILES_KEY)
            .map(split_paths)
            .unwrap_or_default()
    }

    pub fn into_map(self) -> IndexMap<String, String> {
        self.values
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExpansionContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Split a comma-separated path list.
pub fn split_paths(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Limits fixed for the duration of one `expand` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionLimits {
    /// Character budget for each selected file's contents.
    pub per_file_chars: usize,
    /// Deepest nesting whose bodies are still expanded.
    pub max_depth: usize,
}

impl ExpansionLimits {
    /// Divide the length budget across the files selected in `seed`.
    pub fn compute(config: &ExpansionConfig, seed: &ExpansionContext) -> Self {
        let files = seed.selected_files().len().max(1);
        Self {
            per_file_chars: config.length_limit / files,
            max_depth: config.max_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_applies_updates_in_order() {
        let mut ctx: ExpansionContext = [("a", "1")].into_iter().collect();
        let eval = Evaluation::stored("b", "2").with_update("a", "3");
        ctx.merge(&eval);
        assert_eq!(ctx.get("a"), Some("3"));
        assert_eq!(ctx.get("b"), Some("2"));
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_empty_input_is_not_satisfied() {
        let mut ctx = ExpansionContext::new();
        assert!(!ctx.satisfies("input"));
        ctx.insert("input", "");
        assert!(!ctx.satisfies("input"));
        ctx.insert("input", "text");
        assert!(ctx.satisfies("input"));
        ctx.insert("other", "");
        assert!(ctx.satisfies("other"));
    }

    #[test]
    fn test_selected_files() {
        let ctx: ExpansionContext = [(SELECTED_FILES_KEY, " /a.txt, ,/b/c.md ")]
            .into_iter()
            .collect();
        assert_eq!(ctx.selected_files(), vec!["/a.txt", "/b/c.md"]);
        assert!(ExpansionContext::new().selected_files().is_empty());
    }

    #[test]
    fn test_limits_split_budget() {
        let config = ExpansionConfig::default();
        let none = ExpansionLimits::compute(&config, &ExpansionContext::new());
        assert_eq!(none.per_file_chars, 2500);

        let ctx: ExpansionContext = [(SELECTED_FILES_KEY, "a,b,c,d")].into_iter().collect();
        let four = ExpansionLimits::compute(&config, &ctx);
        assert_eq!(four.per_file_chars, 625);
        assert_eq!(four.max_depth, 8);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let ctx: ExpansionContext = [("x", "1")].into_iter().collect();
        assert_eq!(serde_json::to_string(&ctx).unwrap(), r#"{"x":"1"}"#);
    }
}
