//! External collaborators
//!
//! Directives that reach outside the process (clipboard, frontmost
//! application, browser, calendar, network, nested prompts) do not carry
//! their own implementations. They delegate to a [`HostProvider`] or a
//! [`ModelRunner`] supplied by the embedding application. The defaults fail
//! every request, so those directives expand to an empty string.

use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::ExpansionContext;
use crate::error::{Result, WeaveError};
use crate::variables::{IdLedger, Storage, VariableStore};

/// Answers host-backed directives.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostProvider: Send + Sync {
    /// Resolve `directive` (its registry name) with the capture arguments of
    /// the occurrence. `context` holds everything recorded so far in the
    /// pass, including the outputs of declared dependencies.
    async fn query(
        &self,
        directive: &str,
        args: &[String],
        context: &ExpansionContext,
    ) -> Result<String>;
}

/// Runs nested prompts for `{{prompt:...}}`.
#[async_trait]
pub trait ModelRunner: Send + Sync {
    async fn run(&self, prompt: &str) -> Result<String>;
}

/// Host that cannot answer anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

#[async_trait]
impl HostProvider for NullHost {
    async fn query(
        &self,
        directive: &str,
        _args: &[String],
        _context: &ExpansionContext,
    ) -> Result<String> {
        Err(WeaveError::Host(format!(
            "No host available to resolve '{}'",
            directive
        )))
    }
}

#[async_trait]
impl ModelRunner for NullHost {
    async fn run(&self, _prompt: &str) -> Result<String> {
        Err(WeaveError::Host("No model available for nested prompts".into()))
    }
}

/// Everything evaluators need besides the context.
#[derive(Clone)]
pub struct Services {
    pub host: Arc<dyn HostProvider>,
    pub model: Arc<dyn ModelRunner>,
    pub variables: Arc<VariableStore>,
    pub ledger: Arc<IdLedger>,
}

impl Services {
    /// Services over `storage` with no host and no model.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            host: Arc::new(NullHost),
            model: Arc::new(NullHost),
            variables: Arc::new(VariableStore::new(Arc::clone(&storage))),
            ledger: Arc::new(IdLedger::new(storage)),
        }
    }

    pub fn with_host(mut self, host: Arc<dyn HostProvider>) -> Self {
        self.host = host;
        self
    }

    pub fn with_model(mut self, model: Arc<dyn ModelRunner>) -> Self {
        self.model = model;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::MemoryStorage;

    #[tokio::test]
    async fn test_null_host_fails() {
        let ctx = ExpansionContext::new();
        let err = NullHost.query("clipboardText", &[], &ctx).await.unwrap_err();
        assert!(matches!(err, WeaveError::Host(_)));
        assert!(err.to_string().contains("clipboardText"));
        assert!(NullHost.run("hi").await.is_err());
    }

    #[tokio::test]
    async fn test_services_use_supplied_host() {
        let mut host = MockHostProvider::new();
        host.expect_query()
            .withf(|name, args, _| name.to_string() == "currentAppName" && args.is_empty())
            .times(1)
            .returning(|_, _, _| Ok("Safari".to_string()));

        let services = Services::new(Arc::new(MemoryStorage::new())).with_host(Arc::new(host));
        let ctx = ExpansionContext::new();
        let answer = services.host.query("currentAppName", &[], &ctx).await.unwrap();
        assert_eq!(answer, "Safari");
    }
}
