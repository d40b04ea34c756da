//! Gild: Go with enums, exhaustive `match`, `?` and `let`.
//!
//! [`Transpiler`] runs the whole pipeline over one file; [`GildDatabase`]
//! caches it per file with salsa.

pub mod database;
pub mod diagnostics;
pub mod pipeline;

pub use database::{FileTranspile, GildDatabase, SourceFile, file_diagnostics, transpile_file};
pub use gild_core::{
    Diagnostic, DiagnosticSeverity, ExhaustivenessMode, MappingStore, PassError, Position,
    TranspileConfig, TranspileError, TranspileErrorKind, TranspileResult,
};
pub use pipeline::{TranspileOutput, Transpiler};
