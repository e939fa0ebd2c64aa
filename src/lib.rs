//! PromptWeave - Directive expansion engine for prompt templates
//!
//! Templates carry `{{...}}` directives that expand to context values, host
//! facts, persistent variables, file contents, script output and more.
//! [`engine::Expander`] runs the expansion; [`directives`] holds the
//! catalog it runs from.

pub mod config;
pub mod directives;
pub mod engine;
pub mod error;
pub mod host;
pub mod runtime;
pub mod variables;

pub use config::Config;
pub use directives::{DirectiveDefinition, DirectiveRegistry, RegistryCache};
pub use engine::{Expander, Expansion, ExpansionContext};
pub use error::{Result, WeaveError};
pub use host::{HostProvider, ModelRunner, Services};
