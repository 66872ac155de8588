//! Language diagnostics for the k13 pipeline.
//!
//! Every stage accumulates diagnostics as plain data instead of
//! raising them through control flow. Only hard I/O failures are
//! modeled as errors (see [`crate::error::CoreError`]).

use core::fmt;

/// Severity of a diagnostic, ordered from "blocks nothing" to
/// "blocks code generation".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Suspicious but legal; does not block any stage.
    Warning,
    /// A scope or type violation; blocks the emitter.
    SemanticError,
    /// A grammar or lexical mismatch; blocks the checker and the emitter.
    SyntaxError,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "Warning"),
            Severity::SemanticError => write!(f, "Semantic error"),
            Severity::SyntaxError => write!(f, "Syntax error"),
        }
    }
}

/// A single positioned, human-readable message.
///
/// Renders as `"<Severity> at line <N>: <message>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn syntax(line: u32, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::SyntaxError,
            line,
            message: message.into(),
        }
    }

    pub fn semantic(line: u32, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::SemanticError,
            line,
            message: message.into(),
        }
    }

    pub fn warning(line: u32, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            line,
            message: message.into(),
        }
    }

    /// Whether this diagnostic blocks downstream stages.
    pub fn is_error(&self) -> bool {
        !matches!(self.severity, Severity::Warning)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {}: {}", self.severity, self.line, self.message)
    }
}

/// True if any entry is an error, as opposed to a warning.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_severity_and_position() {
        let diag = Diagnostic::semantic(7, "Identifier x is not declared");
        assert_eq!(
            diag.to_string(),
            "Semantic error at line 7: Identifier x is not declared"
        );
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let diags = vec![Diagnostic::warning(1, "suspicious")];
        assert!(!has_errors(&diags));
        assert!(has_errors(&[Diagnostic::syntax(2, "bad")]));
    }
}
