//! Error types shared by every transpiler stage.

use derive_more::{Display, From};

use crate::diagnostic::CompilationPhase;
use crate::position::Position;

pub type TranspileResult<T> = Result<T, TranspileError>;

/// A fatal error for one file. Positions always refer to the original source.
#[derive(Clone, Display, Debug, From, PartialEq, Eq)]
#[display("{kind}")]
pub struct TranspileError {
    #[from]
    kind: Box<TranspileErrorKind>,
}

impl<E> From<E> for TranspileError
where
    TranspileErrorKind: From<E>,
{
    fn from(error: E) -> Self {
        TranspileError {
            kind: Box::new(TranspileErrorKind::from(error)),
        }
    }
}

impl TranspileError {
    pub fn syntax_rewrite(position: Position, message: impl std::fmt::Display) -> Self {
        TranspileErrorKind::SyntaxRewrite {
            position,
            message: message.to_string(),
        }
        .into()
    }

    pub fn limit_exceeded(position: Position, what: &'static str, limit: usize, actual: usize) -> Self {
        TranspileErrorKind::LimitExceeded {
            position,
            what,
            limit,
            actual,
        }
        .into()
    }

    pub fn plugin_dependency(plugins: Vec<String>, message: impl std::fmt::Display) -> Self {
        TranspileErrorKind::PluginDependency {
            plugins,
            message: message.to_string(),
        }
        .into()
    }

    pub fn parse(position: Position, message: impl std::fmt::Display) -> Self {
        TranspileErrorKind::Parse {
            position,
            message: message.to_string(),
        }
        .into()
    }

    pub fn discovery(plugin: &str, position: Position, cause: PassError) -> Self {
        TranspileErrorKind::Discovery {
            plugin: plugin.to_string(),
            position,
            cause,
        }
        .into()
    }

    pub fn transform(plugin: &str, position: Position, cause: PassError) -> Self {
        TranspileErrorKind::Transform {
            plugin: plugin.to_string(),
            position,
            cause,
        }
        .into()
    }

    pub fn inject(plugin: &str, declaration: &str, message: impl std::fmt::Display) -> Self {
        TranspileErrorKind::Inject {
            plugin: plugin.to_string(),
            declaration: declaration.to_string(),
            message: message.to_string(),
        }
        .into()
    }

    pub fn kind(&self) -> &TranspileErrorKind {
        &self.kind
    }

    /// Original-source position the error points at, if it has one.
    pub fn position(&self) -> Option<Position> {
        match &*self.kind {
            TranspileErrorKind::SyntaxRewrite { position, .. }
            | TranspileErrorKind::LimitExceeded { position, .. }
            | TranspileErrorKind::Parse { position, .. }
            | TranspileErrorKind::Discovery { position, .. }
            | TranspileErrorKind::Transform { position, .. } => Some(*position),
            TranspileErrorKind::PluginDependency { .. } | TranspileErrorKind::Inject { .. } => {
                None
            }
        }
    }

    /// The stage the error stopped the file in.
    pub fn phase(&self) -> CompilationPhase {
        match &*self.kind {
            TranspileErrorKind::SyntaxRewrite { .. } | TranspileErrorKind::LimitExceeded { .. } => {
                CompilationPhase::Rewrite
            }
            TranspileErrorKind::Parse { .. } => CompilationPhase::Parsing,
            TranspileErrorKind::PluginDependency { .. } | TranspileErrorKind::Discovery { .. } => {
                CompilationPhase::Discovery
            }
            TranspileErrorKind::Transform { .. } => CompilationPhase::Transform,
            TranspileErrorKind::Inject { .. } => CompilationPhase::Inject,
        }
    }

    /// The stage-2 cause, when a plugin failed.
    pub fn pass_error(&self) -> Option<&PassError> {
        match &*self.kind {
            TranspileErrorKind::Discovery { cause, .. }
            | TranspileErrorKind::Transform { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

#[derive(Clone, Display, Debug, PartialEq, Eq)]
pub enum TranspileErrorKind {
    #[display("{position}: syntax error: {message}")]
    SyntaxRewrite { position: Position, message: String },

    #[display("{position}: {what} limit exceeded ({actual} > {limit})")]
    LimitExceeded {
        position: Position,
        what: &'static str,
        limit: usize,
        actual: usize,
    },

    #[display("plugin dependency error: {message}")]
    PluginDependency {
        plugins: Vec<String>,
        message: String,
    },

    #[display("{position}: rewritten source does not parse: {message}")]
    Parse { position: Position, message: String },

    #[display("{position}: [{plugin}] discovery failed: {cause}")]
    Discovery {
        plugin: String,
        position: Position,
        cause: PassError,
    },

    #[display("{position}: [{plugin}] {cause}")]
    Transform {
        plugin: String,
        position: Position,
        cause: PassError,
    },

    #[display("[{plugin}] cannot inject `{declaration}`: {message}")]
    Inject {
        plugin: String,
        declaration: String,
        message: String,
    },
}

impl std::error::Error for TranspileError {}

/// Why a tree plugin gave up on a node.
#[derive(Clone, Display, Debug, PartialEq, Eq)]
pub enum PassError {
    #[display("type required but unavailable for `{_0}`")]
    TypeUnavailable(String),

    /// The first missing combination, one entry per column, and the guarded
    /// arm that would have covered it.
    #[display("non-exhaustive match: missing {}{}", format_combination(missing), guard_note(guarded))]
    Exhaustiveness {
        missing: Vec<String>,
        guarded: Option<Position>,
    },

    #[display("{what} limit exceeded ({actual} > {limit}); {hint}")]
    LimitExceeded {
        what: &'static str,
        limit: usize,
        actual: usize,
        hint: &'static str,
    },

    #[display("tree mutation is only allowed during the transform phase")]
    PhaseViolation,

    #[display("{_0}")]
    Invalid(String),
}

impl PassError {
    pub fn invalid(message: impl std::fmt::Display) -> Self {
        PassError::Invalid(message.to_string())
    }
}

fn guard_note(guarded: &Option<Position>) -> String {
    match guarded {
        Some(position) => format!(" (the arm at {position} has a guard and does not count)"),
        None => String::new(),
    }
}

/// `Circle` for one column, `(Circle, Rect)` for several.
pub fn format_combination(columns: &[String]) -> String {
    match columns {
        [single] => single.clone(),
        _ => format!("({})", columns.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = TranspileError::syntax_rewrite(Position::new(4, 2), "unbalanced `{`");
        assert_eq!(err.to_string(), "4:2: syntax error: unbalanced `{`");
        assert_eq!(err.position(), Some(Position::new(4, 2)));
    }

    #[test]
    fn test_exhaustiveness_names_missing_combination() {
        let err = TranspileError::transform(
            "match-exhaustiveness",
            Position::new(12, 5),
            PassError::Exhaustiveness {
                missing: vec!["B1".into(), "B2".into()],
                guarded: None,
            },
        );
        assert_eq!(
            err.to_string(),
            "12:5: [match-exhaustiveness] non-exhaustive match: missing (B1, B2)"
        );
        assert!(matches!(
            err.pass_error(),
            Some(PassError::Exhaustiveness { missing, .. }) if missing.len() == 2
        ));
    }

    #[test]
    fn test_guarded_arm_is_named() {
        let err = PassError::Exhaustiveness {
            missing: vec!["None".into()],
            guarded: Some(Position::new(7, 3)),
        };
        assert_eq!(
            err.to_string(),
            "non-exhaustive match: missing None (the arm at 7:3 has a guard and does not count)"
        );
    }

    #[test]
    fn test_dependency_error_has_no_position() {
        let err = TranspileError::plugin_dependency(vec!["a".into()], "cycle between a");
        assert_eq!(err.position(), None);
    }
}
