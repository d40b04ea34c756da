//! Shared data types for the Gild transpiler.
//!
//! Everything here is used by both the text rewrite stage and the tree
//! transform stage: positions, the mapping store, the error taxonomy,
//! diagnostics and configuration.

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod mapping;
pub mod marker;
pub mod names;
pub mod position;

pub use config::{ExhaustivenessMode, TranspileConfig};
pub use diagnostic::{CompilationPhase, Diagnostic, DiagnosticSeverity};
pub use error::{PassError, TranspileError, TranspileErrorKind, TranspileResult};
pub use mapping::{Mapping, MappingKind, MappingStore};
pub use marker::EnumMarker;
pub use names::FreshNames;
pub use position::{LineIndex, Position};
