//! Script runtime for PromptWeave
//!
//! Runs the scripts behind `{{shell:...}}` directives with a bounded
//! execution time.

pub mod shell;

pub use shell::{ScriptOutput, ShellRunner};
