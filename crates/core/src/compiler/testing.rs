//! Deterministic in-process compiler for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{CompileFailure, CompileOutput, Compiler, Diagnostic, Metadata};
use crate::digest;

/// Accepts any source that starts with `schema` and has balanced braces.
///
/// The schema digest is taken over the whitespace-normalised source, so
/// sources that differ only in layout share an artifact. Invocations are
/// counted so tests can observe cache hits.
#[derive(Debug, Clone, Default)]
pub struct StubCompiler {
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl StubCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` inside every compile, widening race windows.
    pub fn with_delay(delay: Duration) -> Self {
        Self { calls: Arc::default(), delay }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(source: &str) -> Result<String, Diagnostic> {
        let normalized = source.split_whitespace().collect::<Vec<_>>().join(" ");
        if !normalized.starts_with("schema") {
            return Err(Diagnostic::parse("expected `schema` at line=1, column=1"));
        }

        let mut depth = 0i32;
        for (line_no, line) in source.lines().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                match ch {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    _ => {}
                }
                if depth < 0 {
                    return Err(Diagnostic::parse(&format!(
                        "unexpected `}}` at line={}, column={}",
                        line_no + 1,
                        col + 1
                    )));
                }
            }
        }
        if depth != 0 {
            return Err(Diagnostic::new("unterminated block"));
        }

        Ok(normalized)
    }
}

#[async_trait]
impl Compiler for StubCompiler {
    async fn compile(&self, source: &str) -> Result<CompileOutput, CompileFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let normalized = Self::check(source).map_err(|d| CompileFailure::new(vec![d]))?;
        let schema_digest = digest::source_digest(&normalized);
        let artifact = format!(
            "// schema {schema_digest}\nexport class Schema {{\n  static source = {};\n}}\n",
            serde_json::Value::String(normalized)
        );

        let mut metadata = Metadata::new();
        metadata.insert("target".into(), "js".into());

        Ok(CompileOutput { artifact, schema_digest, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic() {
        let compiler = StubCompiler::new();
        let a = compiler.compile("schema { input: string name }").await.unwrap();
        let b = compiler.compile("schema { input: string name }").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(compiler.calls(), 2);
    }

    #[tokio::test]
    async fn test_layout_insensitive_digest() {
        let compiler = StubCompiler::new();
        let a = compiler.compile("schema { input: string name }").await.unwrap();
        let b = compiler.compile("schema {\n  input: string name\n}").await.unwrap();
        assert_eq!(a.schema_digest, b.schema_digest);
    }

    #[tokio::test]
    async fn test_rejects_invalid() {
        let compiler = StubCompiler::new();
        let failure = compiler.compile("invalid { syntax }").await.unwrap_err();
        assert_eq!(failure.diagnostics[0].line, Some(1));

        let failure = compiler.compile("schema {\n}}").await.unwrap_err();
        assert_eq!(failure.diagnostics[0].line, Some(2));
        assert_eq!(failure.diagnostics[0].column, Some(2));
    }
}
