//! Directive types
//!
//! A [`DirectiveDefinition`] is one registry entry: its name, the patterns
//! that recognise its occurrences, the kind of evaluator behind it and the
//! flags the engine schedules it by.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;

use crate::engine::ExpansionContext;
use crate::error::Result;

use super::pattern;

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// One matched occurrence handed to an evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The occurrence text, delimiters included (body already expanded for
    /// directives that expand their body).
    pub raw: String,
    /// Capture groups of the matching pattern. Index 0 is the whole
    /// occurrence; groups that did not participate are empty.
    pub captures: Vec<String>,
}

impl Invocation {
    pub fn new(raw: impl Into<String>, captures: Vec<String>) -> Self {
        Self {
            raw: raw.into(),
            captures,
        }
    }

    /// Capture group `index`, or `""`.
    pub fn arg(&self, index: usize) -> &str {
        self.captures.get(index).map(String::as_str).unwrap_or("")
    }

    /// Capture groups after the whole-match group.
    pub fn args(&self) -> &[String] {
        self.captures.get(1..).unwrap_or(&[])
    }
}

/// What an evaluator produced: the replacement text and the context keys it
/// wants recorded, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub output: String,
    pub updates: IndexMap<String, String>,
}

impl Evaluation {
    /// Output with no context updates.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            updates: IndexMap::new(),
        }
    }

    /// Output that is also recorded under `key`.
    pub fn stored(key: &str, output: impl Into<String>) -> Self {
        let output = output.into();
        let mut updates = IndexMap::new();
        updates.insert(key.to_string(), output.clone());
        Self { output, updates }
    }

    /// Record one more context key.
    pub fn with_update(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.updates.insert(key.into(), value.into());
        self
    }
}

/// Evaluator for directives registered from outside the crate.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        invocation: &Invocation,
        context: &ExpansionContext,
    ) -> Result<Evaluation>;
}

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Operations of the persistent-variable family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableOp {
    Get,
    Set,
    Increment,
    Decrement,
    Reset,
    Delete,
    List,
}

/// Clock readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    Date,
    Day,
    Time,
}

/// Facts about the local machine and user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemValue {
    User,
    HomeDir,
    Hostname,
    Language,
}

/// File classes tested by the conditional directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Text,
    Image,
    Video,
    Audio,
    Pdf,
}

impl FileClass {
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            FileClass::Text => &[
                "txt", "md", "markdown", "rtf", "csv", "tsv", "json", "xml", "yaml", "yml",
                "toml", "ini", "log", "html", "htm", "css", "js", "ts", "tsx", "jsx", "py",
                "rs", "go", "java", "c", "h", "cpp", "hpp", "cs", "rb", "php", "swift", "kt",
                "sh", "zsh", "sql", "tex",
            ],
            FileClass::Image => &[
                "png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "webp", "heic", "svg", "ico",
            ],
            FileClass::Video => &["mp4", "mov", "avi", "mkv", "webm", "m4v", "wmv", "flv"],
            FileClass::Audio => &["mp3", "wav", "m4a", "aac", "flac", "ogg", "aiff", "wma"],
            FileClass::Pdf => &["pdf"],
        }
    }

    /// Whether `path` has one of this class's extensions (case-insensitive).
    pub fn matches(&self, path: &str) -> bool {
        Path::new(path.trim())
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_ascii_lowercase();
                self.extensions().contains(&e.as_str())
            })
            .unwrap_or(false)
    }
}

/// How a directive is evaluated.
#[derive(Clone)]
pub enum DirectiveKind {
    /// Persistent variable access.
    Variable(VariableOp),
    /// Value seeded by the caller under the directive name, else `""`.
    Seeded,
    /// Basenames of the selected files.
    FileNames,
    /// Text of the selected files, within the per-file budget.
    Contents,
    /// Delegated to the host collaborator by directive name.
    Host,
    Clock(Clock),
    System(SystemValue),
    /// A fresh identifier from the ledger.
    Uuid,
    /// Every identifier issued so far.
    UsedUuids,
    /// Success body when a selected file is of the class, else the
    /// optional `:else` body.
    FileCondition(FileClass),
    /// Leading characters of the body.
    Cutoff,
    /// Always `""`; the body is still expanded for its side effects.
    Ignore,
    /// The body, run through the model collaborator.
    SubPrompt,
    /// Output of a bounded shell script.
    Shell,
    /// Contents of a local file.
    ReadFile,
    /// User template with `$N` capture placeholders.
    Custom { template: String },
    External(Arc<dyn Evaluator>),
}

impl fmt::Debug for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveKind::Variable(op) => f.debug_tuple("Variable").field(op).finish(),
            DirectiveKind::Seeded => f.write_str("Seeded"),
            DirectiveKind::FileNames => f.write_str("FileNames"),
            DirectiveKind::Contents => f.write_str("Contents"),
            DirectiveKind::Host => f.write_str("Host"),
            DirectiveKind::Clock(c) => f.debug_tuple("Clock").field(c).finish(),
            DirectiveKind::System(s) => f.debug_tuple("System").field(s).finish(),
            DirectiveKind::Uuid => f.write_str("Uuid"),
            DirectiveKind::UsedUuids => f.write_str("UsedUuids"),
            DirectiveKind::FileCondition(c) => f.debug_tuple("FileCondition").field(c).finish(),
            DirectiveKind::Cutoff => f.write_str("Cutoff"),
            DirectiveKind::Ignore => f.write_str("Ignore"),
            DirectiveKind::SubPrompt => f.write_str("SubPrompt"),
            DirectiveKind::Shell => f.write_str("Shell"),
            DirectiveKind::ReadFile => f.write_str("ReadFile"),
            DirectiveKind::Custom { template } => f
                .debug_struct("Custom")
                .field("template", template)
                .finish(),
            DirectiveKind::External(_) => f.write_str("External(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// A registry entry.
#[derive(Debug, Clone)]
pub struct DirectiveDefinition {
    /// Directive name; also the context key its output is stored under.
    pub name: String,
    /// Source of the primary pattern. Unique within a registry.
    pub key: String,
    pub pattern: Regex,
    pub aliases: Vec<Regex>,
    pub kind: DirectiveKind,
    /// Context keys that, when all present, make evaluation unnecessary.
    pub result_keys: Vec<String>,
    /// Names of directives that must have run before this one.
    pub dependencies: Vec<String>,
    /// Evaluated at most once per pass.
    pub constant: bool,
    /// The body is expanded before this directive is evaluated.
    pub expand_body: bool,
    /// Member of the left-to-right persistent-variable stage.
    pub sequential: bool,
    /// Argument-free occurrence used when this directive runs as a
    /// dependency.
    pub canonical: String,
    pub example: String,
    pub description: String,
}

impl DirectiveDefinition {
    /// Start a definition. See [`DirectiveBuilder`].
    pub fn builder(
        name: impl Into<String>,
        key: impl Into<String>,
        kind: DirectiveKind,
    ) -> DirectiveBuilder {
        DirectiveBuilder::new(name, key, kind)
    }

    /// Start a definition backed by a caller-supplied evaluator.
    pub fn external(
        name: impl Into<String>,
        key: impl Into<String>,
        evaluator: Arc<dyn Evaluator>,
    ) -> DirectiveBuilder {
        DirectiveBuilder::new(name, key, DirectiveKind::External(evaluator))
    }

    /// Patterns in matching order: primary first, then aliases.
    pub fn variants(&self) -> impl Iterator<Item = &Regex> {
        std::iter::once(&self.pattern).chain(self.aliases.iter())
    }

    /// Whether `occurrence` is an occurrence of this directive.
    pub fn matches(&self, occurrence: &str) -> bool {
        self.variants().any(|re| re.is_match(occurrence))
    }

    pub fn matches_primary(&self, occurrence: &str) -> bool {
        self.pattern.is_match(occurrence)
    }

    pub fn matches_alias(&self, occurrence: &str) -> bool {
        self.aliases.iter().any(|re| re.is_match(occurrence))
    }

    /// Capture groups of the first variant matching `occurrence`.
    pub fn captures(&self, occurrence: &str) -> Option<Vec<String>> {
        self.variants().find_map(|re| {
            re.captures(occurrence).map(|caps| {
                caps.iter()
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect()
            })
        })
    }

    /// Number of capture groups in the primary pattern.
    pub fn capture_count(&self) -> usize {
        self.pattern.captures_len().saturating_sub(1)
    }
}

/// Builder for [`DirectiveDefinition`]. Patterns are compiled by `build`.
#[derive(Debug, Clone)]
pub struct DirectiveBuilder {
    name: String,
    key: String,
    aliases: Vec<String>,
    kind: DirectiveKind,
    result_keys: Vec<String>,
    dependencies: Vec<String>,
    constant: bool,
    expand_body: bool,
    sequential: bool,
    canonical: Option<String>,
    example: String,
    description: String,
}

impl DirectiveBuilder {
    pub fn new(name: impl Into<String>, key: impl Into<String>, kind: DirectiveKind) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            aliases: Vec::new(),
            kind,
            result_keys: Vec::new(),
            dependencies: Vec::new(),
            constant: false,
            expand_body: false,
            sequential: false,
            canonical: None,
            example: String::new(),
            description: String::new(),
        }
    }

    pub fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases.extend(aliases.iter().map(|a| a.to_string()));
        self
    }

    pub fn result_keys(mut self, keys: &[&str]) -> Self {
        self.result_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Record the output under the directive's own name.
    pub fn stores_result(mut self) -> Self {
        self.result_keys = vec![self.name.clone()];
        self
    }

    pub fn depends_on(mut self, names: &[&str]) -> Self {
        self.dependencies = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn constant(mut self) -> Self {
        self.constant = true;
        self
    }

    pub fn expand_body(mut self) -> Self {
        self.expand_body = true;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.sequential = true;
        self
    }

    pub fn canonical(mut self, canonical: impl Into<String>) -> Self {
        self.canonical = Some(canonical.into());
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example = example.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn build(self) -> Result<DirectiveDefinition> {
        let pattern = pattern::compile(&self.key)?;
        let aliases = self
            .aliases
            .iter()
            .map(|a| pattern::compile(a))
            .collect::<Result<Vec<_>>>()?;
        let canonical = self
            .canonical
            .unwrap_or_else(|| format!("{{{{{}}}}}", self.name));

        Ok(DirectiveDefinition {
            name: self.name,
            key: self.key,
            pattern,
            aliases,
            kind: self.kind,
            result_keys: self.result_keys,
            dependencies: self.dependencies,
            constant: self.constant,
            expand_body: self.expand_body,
            sequential: self.sequential,
            canonical,
            example: self.example,
            description: self.description,
        })
    }
}
