//! Diagnostic formatting for the Gild CLI.

use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, Source};
use gild_core::{CompilationPhase, Diagnostic, DiagnosticSeverity, LineIndex, TranspileError};

/// Get the display color for a compilation phase.
pub fn phase_color(phase: CompilationPhase) -> Color {
    match phase {
        CompilationPhase::Rewrite => Color::Red,
        CompilationPhase::Parsing => Color::Red,
        CompilationPhase::Discovery => Color::Yellow,
        CompilationPhase::Transform => Color::Magenta,
        CompilationPhase::Inject => Color::Cyan,
        CompilationPhase::Printing => Color::Blue,
    }
}

fn report_kind(severity: DiagnosticSeverity) -> ReportKind<'static> {
    match severity {
        DiagnosticSeverity::Error => ReportKind::Error,
        DiagnosticSeverity::Warning => ReportKind::Warning,
        DiagnosticSeverity::Info => ReportKind::Advice,
    }
}

/// Normalize a span to ensure end > start (required by ariadne).
pub fn normalize_span(start: usize, end: usize) -> (usize, usize) {
    (start, end.max(start + 1))
}

/// The diagnostic for an error that stopped a file.
pub fn error_diagnostic(error: &TranspileError) -> Diagnostic {
    Diagnostic::error(error.phase(), error.position(), error.to_string())
}

fn build<'a>(diag: &Diagnostic, source: &str, file_path: &'a str, color: bool) -> Report<'a, (&'a str, std::ops::Range<usize>)> {
    let lines = LineIndex::new(source);
    let start = diag
        .position
        .and_then(|position| lines.offset(position))
        .unwrap_or(0);
    let (start, end) = normalize_span(start, start);

    Report::build(report_kind(diag.severity), (file_path, start..end))
        .with_config(Config::default().with_color(color).with_index_type(IndexType::Byte))
        .with_code(format!("{:?}", diag.phase))
        .with_message(&diag.message)
        .with_label(
            Label::new((file_path, start..end))
                .with_message(&diag.message)
                .with_color(phase_color(diag.phase)),
        )
        .finish()
}

/// Print a diagnostic to stderr using ariadne.
pub fn print_diagnostic(diag: &Diagnostic, source: &str, file_path: &str) {
    build(diag, source, file_path, true)
        .eprint((file_path, Source::from(source)))
        .ok();
}

/// Render a diagnostic without colors.
pub fn render_diagnostic(diag: &Diagnostic, source: &str, file_path: &str) -> String {
    let mut out = Vec::new();
    build(diag, source, file_path, false)
        .write((file_path, Source::from(source)), &mut out)
        .ok();
    String::from_utf8_lossy(&out).into_owned()
}
