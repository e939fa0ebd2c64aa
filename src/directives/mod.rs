//! Directives for PromptWeave
//!
//! A directive is a `{{...}}` occurrence inside a template that expands to
//! text. This module holds everything needed to recognise them; evaluating
//! them is the engine's job.
//!
//! # Architecture
//!
//! - **pattern**: the directive pattern dialect and its translation to `regex`
//! - **scanner**: balanced `{{...}}` occurrence finder
//! - **types**: `DirectiveDefinition`, `DirectiveKind`, `Invocation`, `Evaluation`
//! - **builtin**: the built-in catalog, in registration order
//! - **custom**: user directive documents and their loader
//! - **registry**: the ordered catalog, the matcher and the registry cache
//!
//! # Usage
//!
//! ```rust
//! use promptweave::directives::DirectiveRegistry;
//!
//! let registry = DirectiveRegistry::builtin().unwrap();
//! for def in registry.check_for_directives("{{get counter}} at {{time}}") {
//!     println!("{} ({})", def.name, def.description);
//! }
//! ```

mod builtin;
pub mod custom;
pub mod pattern;
pub mod registry;
pub mod scanner;
pub mod types;

pub use custom::{
    load_custom_files, parse_document, CustomDirectiveSet, CustomDirectiveSpec, CustomLoad,
    Diagnostic,
};
pub use registry::{DirectiveRegistry, RegistryCache};
pub use scanner::{scan, Span};
pub use types::{
    Clock, DirectiveBuilder, DirectiveDefinition, DirectiveKind, Evaluation, Evaluator, FileClass,
    Invocation, SystemValue, VariableOp,
};
