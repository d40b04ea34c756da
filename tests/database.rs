//! The salsa database over files on disk.

use gild::{DiagnosticSeverity, GildDatabase, TranspileConfig, file_diagnostics, transpile_file};
use salsa::Setter as _;

#[test]
fn test_input_is_loaded_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.gild");
    std::fs::write(&path, "package main\n\nfunc main() {\n\tlet x = 1\n\t_ = x\n}\n").unwrap();

    let db = GildDatabase::default();
    let config = TranspileConfig::default();
    let file = db.input(&path, &config).unwrap();
    assert_eq!(db.input(&path, &config).unwrap(), file);

    let result = transpile_file(&db, file);
    insta::assert_snapshot!(result.code.unwrap(), @r"
    package main

    func main() {
    	x := 1
    	_ = x
    }
    ");
    assert!(file_diagnostics(&db, file).is_empty());
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = GildDatabase::default();
    assert!(db.input(&dir.path().join("absent.gild"), &TranspileConfig::default()).is_err());
}

#[test]
fn test_edit_reports_new_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.gild");
    std::fs::write(&path, "package main\n").unwrap();

    let mut db = GildDatabase::default();
    let file = db.input(&path, &TranspileConfig::default()).unwrap();
    assert!(transpile_file(&db, file).is_ok());

    file.set_text(&mut db).to("package main\n\nfunc f() {\n\tmatch x {\n\t\tBogus => f()\n\t}\n}\n".to_string());
    let result = transpile_file(&db, file);
    assert!(!result.is_ok());
    let diagnostics = file_diagnostics(&db, file);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Error);
    assert_eq!(diagnostics[0].position.map(|p| p.line), Some(5));
}
