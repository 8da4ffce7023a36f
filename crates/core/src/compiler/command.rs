//! External-process compiler adapter.
//!
//! Runs the configured program with the schema source on stdin.
//!
//! - exit 0: stdout is JSON `{"js_src": ..., "schema_digest": ..., "metadata": {...}}`
//! - non-zero exit: every non-blank stderr line is a diagnostic
//! - spawn failure or timeout: a single diagnostic describing it

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{CompileFailure, CompileOutput, Compiler, Diagnostic, Metadata};

#[derive(Debug, Deserialize)]
struct WireOutput {
    js_src: String,
    schema_digest: String,
    #[serde(default)]
    metadata: Metadata,
}

/// Compiler that shells out to an external program.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandCompiler {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self { program: program.into(), args, timeout }
    }

    /// Build from a whitespace-separated command line such as
    /// `kumi compile --target js --json`.
    ///
    /// Returns None for a blank command line.
    pub fn from_command_line(command_line: &str, timeout: Duration) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect(), timeout))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Feed `source` to the program and collect its output, all within the
    /// timeout. A program that exits without reading stdin is judged by its
    /// exit status and stderr, not by the broken pipe.
    async fn run(&self, source: &str) -> Result<std::process::Output, String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to start compiler `{}`: {e}", self.program))?;

        let stdin = child.stdin.take();
        let input = source.as_bytes().to_vec();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&input).await {
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                result => result,
            }
        };

        let exchange = async move {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            let output = output.map_err(|e| format!("compiler did not complete: {e}"))?;
            if output.status.success() {
                fed.map_err(|e| format!("failed to send source to compiler: {e}"))?;
            }
            Ok(output)
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(format!("compiler timed out after {}ms", self.timeout.as_millis())),
        }
    }
}

#[async_trait]
impl Compiler for CommandCompiler {
    async fn compile(&self, source: &str) -> Result<CompileOutput, CompileFailure> {
        let start = Instant::now();
        let output = self
            .run(source)
            .await
            .map_err(|msg| CompileFailure::new(vec![Diagnostic::new(msg)]))?;

        tracing::debug!(
            program = %self.program,
            status = ?output.status.code(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "compiler finished"
        );

        if !output.status.success() {
            return Err(CompileFailure::from_text(&String::from_utf8_lossy(&output.stderr)));
        }

        let wire: WireOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| CompileFailure::new(vec![Diagnostic::new(format!("unreadable compiler output: {e}"))]))?;

        Ok(CompileOutput { artifact: wire.js_src, schema_digest: wire.schema_digest, metadata: wire.metadata })
    }
}
