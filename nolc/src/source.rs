//! Source access for the converter
//!
//! The converter never reads files or parses text itself. It asks a
//! [`FileProvider`] for the text of a file and a [`SourceParser`] for its tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::ast::{Position, Program, Span};
use crate::error::{CompileError, Result};

/// Resolves file names (as written in include directives) to source text
pub trait FileProvider {
    fn resolve(&self, name: &str) -> Result<String>;
}

/// Turns source text into a nolol tree
pub trait SourceParser {
    fn parse(&self, name: &str, source: &str) -> Result<Program>;
}

/// Loads files relative to a base directory
#[derive(Debug, Clone)]
pub struct DiskFileProvider {
    dir: PathBuf,
}

impl DiskFileProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Provider rooted at the directory containing `file`
    pub fn for_file(file: &Path) -> Self {
        Self::new(file.parent().unwrap_or(Path::new(".")))
    }
}

impl FileProvider for DiskFileProvider {
    fn resolve(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        tracing::trace!(path = %path.display(), "loading source file");
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CompileError::file_not_found(name))
            }
            Err(e) => Err(CompileError::io_error(format!("{}: {e}", path.display()))),
        }
    }
}

/// In-memory files, keyed by name
#[derive(Debug, Clone, Default)]
pub struct MemoryFileProvider {
    files: HashMap<String, String>,
}

impl MemoryFileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.files.insert(name.into(), source.into());
    }
}

impl FileProvider for MemoryFileProvider {
    fn resolve(&self, name: &str) -> Result<String> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| CompileError::file_not_found(name))
    }
}

/// Reads trees that were serialized as JSON (the output of `nolc dump`)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTreeParser;

impl SourceParser for JsonTreeParser {
    fn parse(&self, name: &str, source: &str) -> Result<Program> {
        serde_json::from_str(source).map_err(|e| {
            let at = Position::new(e.line(), e.column());
            CompileError::parse(format!("{name}: {e}"), Span::new(at, at))
        })
    }
}
