// src/transform/command.rs

//! External process as the transform chain.
//!
//! Protocol:
//! - stdin receives `{"css": "...", "options": {...}}`.
//! - exit 0: stdout is a JSON [`TransformOutput`].
//! - non-zero exit: stdout (or stderr) is a JSON [`TransformError`]. Anything
//!   unparsable becomes a `CommandError` carrying the stderr text.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Output, Stdio};

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::engine::LOG_TARGET;

use super::{Transform, TransformError, TransformFuture, TransformOptions, TransformOutput};

const COMMAND_ERROR: &str = "CommandError";

#[derive(Serialize)]
struct ChainRequest<'a> {
    css: &'a str,
    options: &'a TransformOptions,
}

/// Runs `cmd` through the platform shell once per file.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    cmd: String,
    cwd: Option<PathBuf>,
}

impl CommandTransform {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            cwd: None,
        }
    }

    /// Working directory for the spawned process.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    async fn run(&self, content: &str, options: TransformOptions) -> Result<TransformOutput, TransformError> {
        let request = serde_json::to_vec(&ChainRequest {
            css: content,
            options: &options,
        })
        .map_err(|e| TransformError::new(COMMAND_ERROR, format!("encoding request: {e}")))?;

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(target: LOG_TARGET, cmd = %self.cmd, "spawning transform command");

        let mut child = cmd.spawn().map_err(|e| {
            TransformError::new(COMMAND_ERROR, format!("spawning `{}`: {e}", self.cmd))
        })?;

        let stdin = child.stdin.take();
        let write = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&request).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };

        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output.map_err(|e| {
            TransformError::new(COMMAND_ERROR, format!("waiting for `{}`: {e}", self.cmd))
        })?;

        // The chain may exit without reading its input; that is not an error.
        if let Err(e) = written {
            if e.kind() != ErrorKind::BrokenPipe {
                return Err(TransformError::new(
                    COMMAND_ERROR,
                    format!("writing to `{}`: {e}", self.cmd),
                ));
            }
        }

        if output.status.success() {
            serde_json::from_slice(&output.stdout).map_err(|e| {
                TransformError::new(COMMAND_ERROR, format!("invalid output from `{}`: {e}", self.cmd))
            })
        } else {
            Err(failure_from_output(&self.cmd, &output, &options))
        }
    }
}

impl Transform for CommandTransform {
    fn process<'a>(&'a self, content: &'a str, options: TransformOptions) -> TransformFuture<'a> {
        Box::pin(self.run(content, options))
    }
}

fn failure_from_output(cmd: &str, output: &Output, options: &TransformOptions) -> TransformError {
    let parsed = serde_json::from_slice::<TransformError>(&output.stdout)
        .or_else(|_| serde_json::from_slice::<TransformError>(&output.stderr));

    match parsed {
        Ok(err) => err,
        Err(_) => {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let mut err = TransformError::new(
                COMMAND_ERROR,
                format!("`{cmd}` exited with {code}: {stderr}"),
            );
            err.file = options.from.clone();
            err
        }
    }
}
