//! Custom directive documents
//!
//! Users extend the catalog with JSON documents mapping a pattern to a
//! template:
//!
//! ```json
//! {
//!   "{{greet ([a-zA-Z]+)}}": {
//!     "name": "greet",
//!     "value": "Hello, $1!",
//!     "description": "Greets someone by name",
//!     "example": "{{greet Ada}}"
//!   }
//! }
//! ```
//!
//! Documents are read in order and later documents override earlier ones on
//! the same pattern. Problems never abort loading: a broken document or entry
//! is skipped and reported as a [`Diagnostic`].

use std::fmt;
use std::fs;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, WeaveError};

use super::pattern;
use super::types::{DirectiveDefinition, DirectiveKind};

/// One entry of a custom directive document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDirectiveSpec {
    /// Directive name; the output is stored in the context under it.
    pub name: String,

    /// Output template. `$0` is the whole occurrence, `$1`.. the capture
    /// groups of the pattern.
    pub value: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub example: String,

    /// Short form shown in listings.
    #[serde(default)]
    pub hint: Option<String>,
}

/// Validated custom directives keyed by pattern, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomDirectiveSet {
    entries: IndexMap<String, CustomDirectiveSpec>,
}

impl CustomDirectiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or override the entry for `key`. An override keeps the
    /// position of the first entry.
    pub fn insert(&mut self, key: impl Into<String>, spec: CustomDirectiveSpec) {
        self.entries.insert(key.into(), spec);
    }

    pub fn get(&self, key: &str) -> Option<&CustomDirectiveSpec> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CustomDirectiveSpec)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge one document into the set. Returns the problems found; valid
    /// entries are kept even when siblings are not.
    pub fn merge_document(&mut self, source: &str, content: &str) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        let document: Value = match serde_json::from_str(content) {
            Ok(v) => v,
            Err(e) => {
                diagnostics.push(Diagnostic::document(
                    source,
                    format!("Invalid custom directives document: {}", e),
                ));
                return diagnostics;
            }
        };

        let Value::Object(entries) = document else {
            diagnostics.push(Diagnostic::document(
                source,
                "Custom directives document must be a JSON object",
            ));
            return diagnostics;
        };

        for (raw_key, raw_spec) in entries {
            let key = normalize_key(&raw_key);

            let spec: CustomDirectiveSpec = match serde_json::from_value(raw_spec) {
                Ok(spec) => spec,
                Err(e) => {
                    diagnostics.push(Diagnostic::entry(
                        source,
                        &raw_key,
                        format!("Invalid directive entry: {}", e),
                    ));
                    continue;
                }
            };

            if let Err(e) = validate_entry(&key, &spec) {
                diagnostics.push(Diagnostic::entry(source, &raw_key, e.to_string()));
                continue;
            }

            self.insert(key, spec);
        }

        diagnostics
    }
}

/// A problem found while loading custom directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// File path or other label of the document.
    pub source: String,
    /// Offending pattern, when the problem is one entry.
    pub key: Option<String>,
    pub message: String,
}

impl Diagnostic {
    fn document(source: &str, message: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            key: None,
            message: message.into(),
        }
    }

    fn entry(source: &str, key: &str, message: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            key: Some(key.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{} [{}]: {}", self.source, key, self.message),
            None => write!(f, "{}: {}", self.source, self.message),
        }
    }
}

/// Result of loading custom directive documents.
#[derive(Debug, Clone, Default)]
pub struct CustomLoad {
    pub directives: CustomDirectiveSet,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a single document held in memory.
pub fn parse_document(source: &str, content: &str) -> CustomLoad {
    let mut directives = CustomDirectiveSet::new();
    let diagnostics = directives.merge_document(source, content);
    log_diagnostics(&diagnostics);
    CustomLoad {
        directives,
        diagnostics,
    }
}

/// Load documents from `paths` in order. Missing files are skipped quietly;
/// unreadable or malformed ones are skipped with a diagnostic.
pub fn load_custom_files(paths: &[PathBuf]) -> CustomLoad {
    let mut load = CustomLoad::default();

    for path in paths {
        if !path.exists() {
            debug!(path = %path.display(), "Custom directives file does not exist, skipping");
            continue;
        }

        let source = path.display().to_string();
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                load.diagnostics.push(Diagnostic::document(
                    &source,
                    format!("Failed to read custom directives: {}", e),
                ));
                continue;
            }
        };

        if content.trim().is_empty() {
            continue;
        }

        let before = load.directives.len();
        let diagnostics = load.directives.merge_document(&source, &content);
        load.diagnostics.extend(diagnostics);

        info!(
            path = %source,
            added = load.directives.len() - before,
            "Loaded custom directives"
        );
    }

    log_diagnostics(&load.diagnostics);
    load
}

/// Build the registry entry for one custom directive. It is constant when
/// its pattern has no capture groups, since every occurrence then expands
/// identically.
pub fn to_definition(key: &str, spec: &CustomDirectiveSpec) -> Result<DirectiveDefinition> {
    let mut def = DirectiveDefinition::builder(
        spec.name.clone(),
        key,
        DirectiveKind::Custom {
            template: spec.value.clone(),
        },
    )
    .stores_result()
    .example(spec.example.clone())
    .description(spec.description.clone())
    .build()?;

    def.constant = def.capture_count() == 0;
    Ok(def)
}

/// Substitute `$N` placeholders in `template` with `captures[N]`. Higher
/// indices go first so `$10` is not read as `$1` followed by `0`.
pub fn render_template(template: &str, captures: &[String]) -> String {
    let mut out = template.to_string();
    for (index, value) in captures.iter().enumerate().rev() {
        out = out.replace(&format!("${}", index), value);
    }
    out
}

fn normalize_key(key: &str) -> String {
    let key = key.trim();
    if key.starts_with("{{") {
        key.to_string()
    } else {
        format!("{{{{{}}}}}", key)
    }
}

fn validate_entry(key: &str, spec: &CustomDirectiveSpec) -> Result<()> {
    if spec.name.trim().is_empty() {
        return Err(WeaveError::MalformedDirective(format!(
            "Directive '{}' has an empty name",
            key
        )));
    }

    pattern::compile(key).map_err(|e| {
        WeaveError::MalformedDirective(format!("Invalid pattern '{}': {}", key, e))
    })?;

    Ok(())
}

fn log_diagnostics(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        warn!(
            source = %d.source,
            key = d.key.as_deref().unwrap_or(""),
            "{}", d.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_valid_document() {
        let load = parse_document(
            "inline",
            r#"{
                "{{greet ([a-zA-Z]+)}}": {"name": "greet", "value": "Hello, $1!"},
                "{{sig}}": {"name": "sig", "value": "Regards", "description": "Signature"}
            }"#,
        );
        assert!(load.diagnostics.is_empty());
        assert_eq!(load.directives.len(), 2);
        let sig = load.directives.get("{{sig}}").unwrap();
        assert_eq!(sig.description, "Signature");
        assert!(sig.hint.is_none());
    }

    #[test]
    fn test_bare_key_is_wrapped() {
        let load = parse_document("inline", r#"{"sig": {"name": "sig", "value": "x"}}"#);
        assert!(load.directives.get("{{sig}}").is_some());
    }

    #[test]
    fn test_invalid_document_is_skipped() {
        let load = parse_document("broken.json", "{ nope");
        assert!(load.directives.is_empty());
        assert_eq!(load.diagnostics.len(), 1);
        assert!(load.diagnostics[0].key.is_none());
        assert!(load.diagnostics[0].to_string().starts_with("broken.json:"));
    }

    #[test]
    fn test_non_object_document_is_skipped() {
        let load = parse_document("list.json", r#"["a", "b"]"#);
        assert!(load.directives.is_empty());
        assert_eq!(load.diagnostics.len(), 1);
    }

    #[test]
    fn test_bad_entries_do_not_drop_siblings() {
        let load = parse_document(
            "inline",
            r#"{
                "{{bad(}}": {"name": "bad", "value": "x"},
                "{{anon}}": {"name": "  ", "value": "x"},
                "{{partial}}": {"value": "missing name"},
                "{{good}}": {"name": "good", "value": "ok"}
            }"#,
        );
        assert_eq!(load.directives.len(), 1);
        assert!(load.directives.get("{{good}}").is_some());
        assert_eq!(load.diagnostics.len(), 3);
        assert!(load.diagnostics.iter().all(|d| d.key.is_some()));
    }

    #[test]
    fn test_later_files_override_earlier() {
        let dir = TempDir::new().unwrap();
        let first = write(
            &dir,
            "first.json",
            r#"{"{{a}}": {"name": "a", "value": "one"}, "{{b}}": {"name": "b", "value": "two"}}"#,
        );
        let second = write(&dir, "second.json", r#"{"{{a}}": {"name": "a", "value": "uno"}}"#);

        let load = load_custom_files(&[first, dir.path().join("missing.json"), second]);
        assert!(load.diagnostics.is_empty());
        let keys: Vec<&String> = load.directives.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["{{a}}", "{{b}}"]);
        assert_eq!(load.directives.get("{{a}}").unwrap().value, "uno");
    }

    #[test]
    fn test_malformed_file_is_reported_and_skipped() {
        let dir = TempDir::new().unwrap();
        let bad = write(&dir, "bad.json", "{{{");
        let good = write(&dir, "good.json", r#"{"{{a}}": {"name": "a", "value": "x"}}"#);
        let load = load_custom_files(&[bad, good]);
        assert_eq!(load.directives.len(), 1);
        assert_eq!(load.diagnostics.len(), 1);
    }

    #[test]
    fn test_to_definition_constant_without_captures() {
        let spec = CustomDirectiveSpec {
            name: "sig".into(),
            value: "Regards".into(),
            description: String::new(),
            example: "{{sig}}".into(),
            hint: None,
        };
        let def = to_definition("{{sig}}", &spec).unwrap();
        assert!(def.constant);
        assert_eq!(def.result_keys, vec!["sig"]);
        assert_eq!(def.canonical, "{{sig}}");

        let spec = CustomDirectiveSpec {
            name: "greet".into(),
            value: "Hello, $1!".into(),
            description: String::new(),
            example: "{{greet Ada}}".into(),
            hint: None,
        };
        let def = to_definition("{{greet ([a-zA-Z]+)}}", &spec).unwrap();
        assert!(!def.constant);
        assert!(def.matches("{{greet Ada}}"));
    }

    #[test]
    fn test_render_template() {
        let caps: Vec<String> = (0..12).map(|i| format!("<{}>", i)).collect();
        assert_eq!(render_template("$1 and $10", &caps), "<1> and <10>");
        assert_eq!(render_template("whole: $0", &caps[..1]), "whole: <0>");
        assert_eq!(render_template("no args", &[]), "no args");
    }
}
