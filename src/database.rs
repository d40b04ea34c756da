use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use gild_core::{Diagnostic, MappingStore, TranspileConfig, TranspileError};
use salsa::Accumulator;

use crate::pipeline::Transpiler;

/// A Gild source file and the settings it is transpiled with.
#[salsa::input(debug)]
pub struct SourceFile {
    #[returns(ref)]
    pub path: PathBuf,
    #[returns(deref)]
    pub text: String,
    #[returns(ref)]
    pub config: TranspileConfig,
}

/// Cached result of [`transpile_file`].
#[derive(Clone, Debug, PartialEq, Eq, salsa::Update)]
pub struct FileTranspile {
    /// Generated Go, absent when the file failed.
    pub code: Option<String>,
    pub mappings: MappingStore,
    pub error: Option<TranspileError>,
}

impl FileTranspile {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Transpile one file. Warnings, and the error that stopped the file, are
/// accumulated as [`Diagnostic`]s.
#[salsa::tracked]
pub fn transpile_file(db: &dyn salsa::Database, file: SourceFile) -> FileTranspile {
    let result = Transpiler::new(file.config(db).clone()).and_then(|t| t.transpile(file.text(db)));
    match result {
        Ok(output) => {
            for diagnostic in output.diagnostics {
                diagnostic.accumulate(db);
            }
            FileTranspile {
                code: Some(output.code),
                mappings: output.mappings,
                error: None,
            }
        }
        Err(error) => {
            tracing::debug!(path = %file.path(db).display(), %error, "transpile failed");
            Diagnostic::error(error.phase(), error.position(), error.to_string()).accumulate(db);
            FileTranspile {
                code: None,
                mappings: MappingStore::new(),
                error: Some(error),
            }
        }
    }
}

/// Diagnostics [`transpile_file`] accumulated for `file`.
pub fn file_diagnostics(db: &dyn salsa::Database, file: SourceFile) -> Vec<Diagnostic> {
    transpile_file::accumulated::<Diagnostic>(db, file)
        .into_iter()
        .cloned()
        .collect()
}

#[derive(Default, Clone)]
#[salsa::db]
pub struct GildDatabase {
    storage: salsa::Storage<Self>,
    files: Arc<DashMap<PathBuf, SourceFile>>,
}

#[salsa::db]
impl salsa::Database for GildDatabase {}

impl GildDatabase {
    /// Load `path` once; later calls return the same input.
    pub fn input(&self, path: &Path, config: &TranspileConfig) -> std::io::Result<SourceFile> {
        let path = path.canonicalize()?;
        match self.files.entry(path) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let text = std::fs::read_to_string(entry.key())?;
                let file = SourceFile::new(self, entry.key().clone(), text, config.clone());
                entry.insert(file);
                Ok(file)
            }
        }
    }

    /// Register in-memory text under `path`, replacing any earlier input.
    pub fn open(&self, path: impl Into<PathBuf>, text: String, config: &TranspileConfig) -> SourceFile {
        let path = path.into();
        let file = SourceFile::new(self, path.clone(), text, config.clone());
        self.files.insert(path, file);
        file
    }

    pub fn file(&self, path: &Path) -> Option<SourceFile> {
        self.files.get(path).map(|entry| *entry)
    }
}
