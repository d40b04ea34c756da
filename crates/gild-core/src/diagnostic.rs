//! Non-fatal diagnostics emitted while transpiling a file.

use crate::position::Position;

/// A diagnostic message (error, warning, or info) with an original-source position.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[salsa::accumulator]
pub struct Diagnostic {
    pub message: String,
    pub position: Option<Position>,
    pub severity: DiagnosticSeverity,
    pub phase: CompilationPhase,
}

impl Diagnostic {
    pub fn warning(phase: CompilationPhase, position: Option<Position>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position,
            severity: DiagnosticSeverity::Warning,
            phase,
        }
    }

    pub fn error(phase: CompilationPhase, position: Option<Position>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position,
            severity: DiagnosticSeverity::Error,
            phase,
        }
    }
}

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// Stage where a diagnostic was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompilationPhase {
    Rewrite,
    Parsing,
    Discovery,
    Transform,
    Inject,
    Printing,
}

impl std::fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "ERROR"),
            DiagnosticSeverity::Warning => write!(f, "WARNING"),
            DiagnosticSeverity::Info => write!(f, "INFO"),
        }
    }
}
