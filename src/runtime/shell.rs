//! Bounded shell execution.
//!
//! A script runs under its interpreter with stdout captured and stderr
//! discarded. When the time budget runs out the child is killed and
//! whatever it printed so far is kept.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::ScriptConfig;
use crate::error::{Result, WeaveError};

/// What a script produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutput {
    pub stdout: String,
    /// `None` when the script was killed.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl ScriptOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs scripts with a default interpreter and a time budget.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(shell: impl Into<String>, timeout: Duration) -> Self {
        Self {
            shell: shell.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ScriptConfig) -> Self {
        Self::new(config.shell.clone(), config.timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `script` with `shell -c`. `interpreter` overrides the default
    /// shell when non-blank.
    ///
    /// # Errors
    /// `WeaveError::Directive` if the interpreter cannot be started or its
    /// output cannot be read. A non-zero exit or a timeout is not an error.
    pub async fn run(&self, script: &str, interpreter: Option<&str>) -> Result<ScriptOutput> {
        let shell = interpreter
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.shell);

        debug!(shell = %shell, "Running script");

        let mut child = Command::new(shell)
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WeaveError::Directive(format!("Failed to start {}: {}", shell, e)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| WeaveError::Directive("Script stdout was not captured".into()))?;

        let mut captured = Vec::new();
        let finished = tokio::time::timeout(self.timeout, async {
            let mut chunk = [0u8; 4096];
            loop {
                let n = stdout.read(&mut chunk).await?;
                if n == 0 {
                    break;
                }
                captured.extend_from_slice(&chunk[..n]);
            }
            child.wait().await
        })
        .await;

        match finished {
            Ok(status) => {
                let status = status.map_err(|e| {
                    WeaveError::Directive(format!("Failed to read script output: {}", e))
                })?;
                Ok(ScriptOutput {
                    stdout: String::from_utf8_lossy(&captured).into_owned(),
                    exit_code: status.code(),
                    timed_out: false,
                })
            }
            Err(_) => {
                warn!(
                    shell = %shell,
                    timeout_secs = self.timeout.as_secs(),
                    "Script timed out, keeping partial output"
                );
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill timed out script");
                }
                Ok(ScriptOutput {
                    stdout: String::from_utf8_lossy(&captured).into_owned(),
                    exit_code: None,
                    timed_out: true,
                })
            }
        }
    }
}
