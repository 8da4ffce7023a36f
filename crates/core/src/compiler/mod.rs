//! Compiler boundary.
//!
//! The schema compiler is an external collaborator. The cache only needs a
//! deterministic `source -> (artifact, schema digest, metadata)` function and
//! structured diagnostics when compilation fails.
//!
//! ### Diagnostics
//! Compilers that only report free-form text are scraped for a
//! `line=N, column=M` location. Messages without one keep `line`/`column`
//! unset.

pub mod command;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use command::CommandCompiler;

/// Free-form metadata the compiler attaches to a successful build.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Successful compiler output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileOutput {
    /// Generated JavaScript.
    pub artifact: String,
    /// Compiler-assigned fingerprint of the analysed schema.
    pub schema_digest: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// One compiler error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bline\s*[=:]\s*(\d+)\s*,?\s*col(?:umn)?\s*[=:]\s*(\d+)").expect("location pattern is valid")
});

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), line: None, column: None }
    }

    /// Build a diagnostic from compiler text, picking up an embedded
    /// `line=N, column=M` location when present.
    pub fn parse(text: &str) -> Self {
        let message = text.trim().to_string();
        match LOCATION.captures(&message) {
            Some(caps) => {
                let line = caps.get(1).and_then(|m| m.as_str().parse().ok());
                let column = caps.get(2).and_then(|m| m.as_str().parse().ok());
                Self { message, line, column }
            }
            None => Self { message, line: None, column: None },
        }
    }
}

/// Compiler rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileFailure {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileFailure {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    /// Parse each non-blank line of compiler output as a diagnostic.
    pub fn from_text(text: &str) -> Self {
        let diagnostics: Vec<Diagnostic> =
            text.lines().filter(|l| !l.trim().is_empty()).map(Diagnostic::parse).collect();
        if diagnostics.is_empty() {
            return Self::new(vec![Diagnostic::new("compiler reported failure without output")]);
        }
        Self::new(diagnostics)
    }
}

/// Deterministic schema compiler.
///
/// Identical input must yield a bit-identical artifact and the same schema
/// digest; the cache relies on it to treat racing writes as idempotent.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, source: &str) -> Result<CompileOutput, CompileFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location() {
        let d = Diagnostic::parse("unexpected token `}` at line=3, column=14");
        assert_eq!(d.line, Some(3));
        assert_eq!(d.column, Some(14));
        assert_eq!(d.message, "unexpected token `}` at line=3, column=14");
    }

    #[test]
    fn test_parse_location_colon_form() {
        let d = Diagnostic::parse("unknown type (line: 7 col: 2)");
        assert_eq!((d.line, d.column), (Some(7), Some(2)));
    }

    #[test]
    fn test_parse_without_location() {
        let d = Diagnostic::parse("  schema is empty \n");
        assert_eq!(d, Diagnostic::new("schema is empty"));
    }

    #[test]
    fn test_failure_from_text() {
        let failure = CompileFailure::from_text("first at line=1, column=1\n\nsecond\n");
        assert_eq!(failure.diagnostics.len(), 2);
        assert_eq!(failure.diagnostics[0].line, Some(1));
        assert_eq!(failure.diagnostics[1].message, "second");
    }

    #[test]
    fn test_failure_from_empty_text() {
        let failure = CompileFailure::from_text("   ");
        assert_eq!(failure.diagnostics.len(), 1);
    }

    #[test]
    fn test_diagnostic_serialization_skips_missing_location() {
        let json = serde_json::to_value(Diagnostic::new("boom")).unwrap();
        assert_eq!(json, serde_json::json!({ "message": "boom" }));
    }
}
