//! Expansion engine for PromptWeave
//!
//! The [`Expander`] rewrites a template by replacing every directive
//! occurrence with its output, threading one [`ExpansionContext`] through
//! the whole pass.
//!
//! # Pass structure
//!
//! 1. Context keys that name a directive are substituted first.
//! 2. Directives then run in registry order, one stage each. The persistent
//!    variable family forms a single stage swept left to right so writes are
//!    visible to later reads.
//! 3. Within a stage, a directive whose result keys are already in the
//!    context is substituted without evaluation. Otherwise its dependencies
//!    run first and each occurrence is evaluated, spliced and merged.
//! 4. Constant directives are evaluated once per pass.
//!
//! A failing evaluator yields `""` for its occurrence and the pass goes on.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use promptweave::config::Config;
//! use promptweave::directives::RegistryCache;
//! use promptweave::engine::{ExpansionContext, Expander};
//! use promptweave::host::Services;
//! use promptweave::variables::MemoryStorage;
//!
//! # tokio_test::block_on(async {
//! let services = Services::new(Arc::new(MemoryStorage::new()));
//! let expander = Expander::new(&Config::default(), RegistryCache::builtin(), services);
//! let text = expander
//!     .expand_text("{{cutoff 5:Hello World}}", ExpansionContext::new())
//!     .await
//!     .unwrap();
//! assert_eq!(text, "Hello");
//! # })
//! ```

pub mod clock;
pub mod context;
pub mod evaluate;

use std::collections::{HashMap, HashSet};

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{Config, ExpansionConfig};
use crate::directives::{scan, DirectiveDefinition, DirectiveRegistry, Invocation, RegistryCache, Span};
use crate::error::{Result, WeaveError};
use crate::host::Services;
use crate::runtime::ShellRunner;

pub use crate::directives::Evaluator;
pub use context::{split_paths, ExpansionContext, ExpansionLimits, INPUT_KEY, SELECTED_FILES_KEY};
pub use evaluate::Dispatcher;

/// Result of one `expand` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub text: String,
    /// The seed plus every value recorded during the pass.
    pub context: ExpansionContext,
}

/// Directive expansion entry point. `Send + Sync`; share it behind an `Arc`.
pub struct Expander {
    config: ExpansionConfig,
    registry: RegistryCache,
    dispatcher: Dispatcher,
}

impl Expander {
    pub fn new(config: &Config, registry: RegistryCache, services: Services) -> Self {
        Self {
            config: config.expansion.clone(),
            registry,
            dispatcher: Dispatcher::new(
                services,
                ShellRunner::from_config(&config.scripts),
                config.scripts.enabled,
            ),
        }
    }

    pub fn registry(&self) -> &RegistryCache {
        &self.registry
    }

    pub fn services(&self) -> &Services {
        self.dispatcher.services()
    }

    /// Expand every directive in `text`, starting from `seed`.
    ///
    /// # Errors
    /// Only when the directive registry cannot be built. Evaluation failures
    /// are recovered inside the pass.
    pub async fn expand(&self, text: &str, seed: ExpansionContext) -> Result<Expansion> {
        if !self.config.enabled {
            debug!("Directive processing is disabled");
            return Ok(Expansion {
                text: text.to_string(),
                context: seed,
            });
        }

        let registry = self.registry.current()?;
        let pass = Pass {
            dispatcher: &self.dispatcher,
            registry: &registry,
            stages: stages(&registry),
            limits: ExpansionLimits::compute(&self.config, &seed),
        };

        let mut context = seed;
        let mut state = PassState::default();
        let text = substitute_seeded(&registry, &context, text.to_string());
        let text = pass.run(&mut state, &mut context, text, 0).await;

        debug!(
            evaluated = state.ran.len(),
            context_keys = context.len(),
            "Expansion finished"
        );
        Ok(Expansion { text, context })
    }

    /// Like [`Expander::expand`], returning only the text.
    pub async fn expand_text(&self, text: &str, seed: ExpansionContext) -> Result<String> {
        Ok(self.expand(text, seed).await?.text)
    }

    /// Expand each string in `texts` in its own pass, every pass starting
    /// from `seed`.
    pub async fn expand_all(&self, texts: &[String], seed: ExpansionContext) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.expand_text(text, seed.clone()).await?);
        }
        Ok(out)
    }

    /// Expand every string leaf of a JSON document, walking arrays and
    /// objects. Keys and non-string leaves are kept as they are.
    ///
    /// ```rust
    /// # use std::sync::Arc;
    /// # use promptweave::config::Config;
    /// # use promptweave::directives::RegistryCache;
    /// # use promptweave::engine::{ExpansionContext, Expander};
    /// # use promptweave::host::Services;
    /// # use promptweave::variables::MemoryStorage;
    /// # tokio_test::block_on(async {
    /// # let services = Services::new(Arc::new(MemoryStorage::new()));
    /// # let expander = Expander::new(&Config::default(), RegistryCache::builtin(), services);
    /// let doc = serde_json::json!({"title": "{{cutoff 3:abcdef}}", "tags": ["{{input}}"], "n": 1});
    /// let seed: ExpansionContext = [("input", "x")].into_iter().collect();
    /// let doc = expander.expand_value(doc, seed).await.unwrap();
    /// assert_eq!(doc, serde_json::json!({"title": "abc", "tags": ["x"], "n": 1}));
    /// # })
    /// ```
    pub async fn expand_value(&self, value: Value, seed: ExpansionContext) -> Result<Value> {
        self.expand_leaves(value, &seed).await
    }

    fn expand_leaves<'a>(
        &'a self,
        value: Value,
        seed: &'a ExpansionContext,
    ) -> BoxFuture<'a, Result<Value>> {
        async move {
            match value {
                Value::String(text) => Ok(Value::String(self.expand_text(&text, seed.clone()).await?)),
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.expand_leaves(item, seed).await?);
                    }
                    Ok(Value::Array(out))
                }
                Value::Object(map) => {
                    let mut out = serde_json::Map::with_capacity(map.len());
                    for (key, item) in map {
                        let item = self.expand_leaves(item, seed).await?;
                        out.insert(key, item);
                    }
                    Ok(Value::Object(out))
                }
                other => Ok(other),
            }
        }
        .boxed()
    }
}

// ---------------------------------------------------------------------------
// Pass internals
// ---------------------------------------------------------------------------

enum Stage<'r> {
    Single(&'r DirectiveDefinition),
    /// Swept left to right as one unit.
    Sequential(Vec<&'r DirectiveDefinition>),
}

/// One stage per directive; sequential members share the stage at the first
/// member's position.
fn stages(registry: &DirectiveRegistry) -> Vec<Stage<'_>> {
    let mut stages = Vec::with_capacity(registry.len());
    let mut sequential_at: Option<usize> = None;

    for def in registry.iter() {
        if !def.sequential {
            stages.push(Stage::Single(def));
            continue;
        }
        match sequential_at {
            Some(idx) => {
                if let Stage::Sequential(members) = &mut stages[idx] {
                    members.push(def);
                }
            }
            None => {
                sequential_at = Some(stages.len());
                stages.push(Stage::Sequential(vec![def]));
            }
        }
    }
    stages
}

/// Mutable bookkeeping shared by a pass and its child passes.
#[derive(Default)]
struct PassState {
    /// Outputs of constant directives, by name.
    memo: HashMap<String, String>,
    /// Directives evaluated so far, by name.
    ran: HashSet<String>,
}

/// Everything fixed for the duration of one `expand` call.
struct Pass<'r> {
    dispatcher: &'r Dispatcher,
    registry: &'r DirectiveRegistry,
    stages: Vec<Stage<'r>>,
    limits: ExpansionLimits,
}

impl<'r> Pass<'r> {
    /// Run every stage over `text`. Child passes over directive bodies come
    /// back through here with `depth + 1`.
    fn run<'a>(
        &'a self,
        state: &'a mut PassState,
        ctx: &'a mut ExpansionContext,
        mut text: String,
        depth: usize,
    ) -> BoxFuture<'a, String> {
        async move {
            for stage in &self.stages {
                if !text.contains("{{") {
                    break;
                }
                text = match stage {
                    Stage::Single(def) => self.run_directive(state, ctx, def, text, depth).await,
                    Stage::Sequential(members) => {
                        self.run_sequential(state, ctx, members, text, depth).await
                    }
                };
            }
            text
        }
        .boxed()
    }

    async fn run_directive(
        &self,
        state: &mut PassState,
        ctx: &mut ExpansionContext,
        def: &DirectiveDefinition,
        text: String,
        depth: usize,
    ) -> String {
        if next_occurrence(&text, 0, |occ| def.matches(occ)).is_none() {
            return text;
        }

        if is_satisfied(def, ctx) {
            debug!(directive = %def.name, "Result already in context, substituting");
            let value = known_value(def, ctx);
            return substitute_all(text, def, &value);
        }

        let mut visiting = HashSet::new();
        self.run_dependencies(state, ctx, def, &mut visiting, depth)
            .await;

        let mut text = text;
        for variant in def.variants() {
            let mut cursor = 0;
            while let Some(span) = next_occurrence(&text, cursor, |occ| variant.is_match(occ)) {
                let occurrence = span.text(&text).to_string();
                let output = self
                    .occurrence_output(state, ctx, def, &occurrence, depth)
                    .await;
                text.replace_range(span.start..span.end, &output);
                cursor = span.start + output.len();
            }
        }

        state.ran.insert(def.name.clone());
        text
    }

    async fn run_sequential(
        &self,
        state: &mut PassState,
        ctx: &mut ExpansionContext,
        members: &[&DirectiveDefinition],
        text: String,
        depth: usize,
    ) -> String {
        let mut text = text;
        let mut cursor = 0;

        loop {
            let found = scan(&text)
                .into_iter()
                .filter(|span| span.start >= cursor)
                .find_map(|span| {
                    let occ = span.text(&text);
                    members
                        .iter()
                        .find(|def| def.matches(occ))
                        .map(|def| (span, *def))
                });
            let Some((span, def)) = found else {
                break;
            };

            let occurrence = span.text(&text).to_string();
            let output = if is_satisfied(def, ctx) {
                known_value(def, ctx)
            } else {
                if !state.ran.contains(&def.name) {
                    let mut visiting = HashSet::new();
                    self.run_dependencies(state, ctx, def, &mut visiting, depth)
                        .await;
                }
                let out = self
                    .occurrence_output(state, ctx, def, &occurrence, depth)
                    .await;
                state.ran.insert(def.name.clone());
                out
            };

            text.replace_range(span.start..span.end, &output);
            cursor = span.start + output.len();
        }

        text
    }

    /// Evaluate the dependencies of `def` that have not run and are not
    /// already known, deepest first. Cycles are cut with a warning.
    fn run_dependencies<'a>(
        &'a self,
        state: &'a mut PassState,
        ctx: &'a mut ExpansionContext,
        def: &'a DirectiveDefinition,
        visiting: &'a mut HashSet<String>,
        depth: usize,
    ) -> BoxFuture<'a, ()> {
        async move {
            if !visiting.insert(def.name.clone()) {
                let err = WeaveError::Recursion(format!("dependency cycle through '{}'", def.name));
                warn!(directive = %def.name, error = %err, "Skipping cyclic dependency");
                return;
            }

            for name in &def.dependencies {
                let Some(dep) = self.registry.find(name) else {
                    warn!(directive = %def.name, dependency = %name, "Unknown dependency");
                    continue;
                };
                if state.ran.contains(&dep.name) || is_satisfied(dep, ctx) {
                    continue;
                }

                self.run_dependencies(state, ctx, dep, visiting, depth)
                    .await;
                debug!(directive = %def.name, dependency = %dep.name, "Running dependency");
                self.occurrence_output(state, ctx, dep, &dep.canonical, depth)
                    .await;
                state.ran.insert(dep.name.clone());
            }

            visiting.remove(&def.name);
        }
        .boxed()
    }

    /// Output for one occurrence, memoized for constant directives.
    async fn occurrence_output(
        &self,
        state: &mut PassState,
        ctx: &mut ExpansionContext,
        def: &DirectiveDefinition,
        occurrence: &str,
        depth: usize,
    ) -> String {
        if def.constant {
            if let Some(out) = state.memo.get(&def.name) {
                return out.clone();
            }
        }

        let output = self
            .evaluate_occurrence(state, ctx, def, occurrence, depth)
            .await;

        if def.constant {
            state.memo.insert(def.name.clone(), output.clone());
        }
        output
    }

    async fn evaluate_occurrence(
        &self,
        state: &mut PassState,
        ctx: &mut ExpansionContext,
        def: &DirectiveDefinition,
        occurrence: &str,
        depth: usize,
    ) -> String {
        let mut raw = occurrence.to_string();

        if def.expand_body {
            let interior = occurrence
                .strip_prefix("{{")
                .and_then(|s| s.strip_suffix("}}"))
                .unwrap_or("");
            if interior.contains("{{") {
                if depth >= self.limits.max_depth {
                    let err = WeaveError::Recursion(format!("depth {}", depth));
                    warn!(
                        directive = %def.name,
                        error = %err,
                        "Nesting too deep, leaving body unexpanded"
                    );
                } else {
                    let expanded = self
                        .run(state, ctx, interior.to_string(), depth + 1)
                        .await;
                    raw = format!("{{{{{}}}}}", expanded);
                }
            }
        }

        let captures = def
            .captures(&raw)
            .or_else(|| def.captures(occurrence))
            .unwrap_or_else(|| vec![occurrence.to_string()]);
        let invocation = Invocation::new(raw, captures);

        match self
            .dispatcher
            .evaluate(def, &invocation, ctx, &self.limits)
            .await
        {
            Ok(evaluation) => {
                ctx.merge(&evaluation);
                evaluation.output
            }
            Err(e) => {
                warn!(
                    directive = %def.name,
                    error = %e,
                    "Directive evaluation failed, substituting empty text"
                );
                String::new()
            }
        }
    }
}

/// Whether every result key of `def` is already known.
fn is_satisfied(def: &DirectiveDefinition, ctx: &ExpansionContext) -> bool {
    !def.result_keys.is_empty() && def.result_keys.iter().all(|k| ctx.satisfies(k))
}

/// Known value of a satisfied directive: its own name, else its first key.
fn known_value(def: &DirectiveDefinition, ctx: &ExpansionContext) -> String {
    ctx.get(&def.name)
        .or_else(|| def.result_keys.first().and_then(|k| ctx.get(k)))
        .unwrap_or("")
        .to_string()
}

/// First occurrence starting at or after `from` whose text satisfies `pred`.
fn next_occurrence(text: &str, from: usize, pred: impl Fn(&str) -> bool) -> Option<Span> {
    scan(text)
        .into_iter()
        .find(|span| span.start >= from && pred(span.text(text)))
}

/// Replace every occurrence of `def` with `value`, never rescanning `value`.
fn substitute_all(mut text: String, def: &DirectiveDefinition, value: &str) -> String {
    let mut cursor = 0;
    while let Some(span) = next_occurrence(&text, cursor, |occ| def.matches(occ)) {
        text.replace_range(span.start..span.end, value);
        cursor = span.start + value.len();
    }
    text
}

/// Substitute directives named by a context key with the seeded value. An
/// empty `input` is left for its evaluator.
fn substitute_seeded(registry: &DirectiveRegistry, ctx: &ExpansionContext, text: String) -> String {
    let mut text = text;
    for (key, value) in ctx.iter() {
        if !ctx.satisfies(key) {
            continue;
        }
        if let Some(def) = registry.find(key) {
            text = substitute_all(text, def, value);
        }
    }
    text
}
