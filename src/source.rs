//! Where file contents come from.
//!
//! The project model never reads files on its own: it asks a [`SourceProvider`]
//! for the editor's copy of a document first and falls back to the disk. The
//! server installs [`FileSystemSources`]; tests can install [`MemorySources`].

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::uri::FileUri;

/// A document as the editor currently holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorDocument {
    pub uri: FileUri,
    pub version: i32,
    pub text: Arc<str>,
}

impl EditorDocument {
    pub fn new(uri: FileUri, version: i32, text: impl Into<Arc<str>>) -> Self {
        Self {
            uri,
            version,
            text: text.into(),
        }
    }
}

pub trait SourceProvider: Send + Sync {
    /// The open editor buffer for `uri`, if any.
    fn open_document(&self, uri: &FileUri) -> Option<EditorDocument>;

    fn exists(&self, path: &Path) -> bool;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Open editor buffers, shared between the server and every project.
#[derive(Debug, Default, Clone)]
pub struct OpenDocuments {
    documents: Arc<RwLock<HashMap<FileUri, EditorDocument>>>,
}

impl OpenDocuments {
    pub fn insert(&self, document: EditorDocument) {
        let mut guard = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.insert(document.uri.clone(), document);
    }

    pub fn remove(&self, uri: &FileUri) -> Option<EditorDocument> {
        let mut guard = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.remove(uri)
    }

    pub fn get(&self, uri: &FileUri) -> Option<EditorDocument> {
        let guard = self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        guard.get(uri).cloned()
    }
}

/// Editor buffers backed by the real file system.
#[derive(Debug, Default, Clone)]
pub struct FileSystemSources {
    open: OpenDocuments,
}

impl FileSystemSources {
    pub fn new(open: OpenDocuments) -> Self {
        Self { open }
    }

    pub fn open_documents(&self) -> &OpenDocuments {
        &self.open
    }
}

impl SourceProvider for FileSystemSources {
    fn open_document(&self, uri: &FileUri) -> Option<EditorDocument> {
        self.open.get(uri)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// An in-memory file system, for embedding and tests.
#[derive(Debug, Default, Clone)]
pub struct MemorySources {
    files: Arc<RwLock<HashMap<PathBuf, String>>>,
    open: OpenDocuments,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        let mut guard = self.files.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(path.into(), contents.into());
    }

    pub fn remove(&self, path: &Path) {
        let mut guard = self.files.write().unwrap_or_else(PoisonError::into_inner);
        guard.remove(path);
    }

    pub fn open_documents(&self) -> &OpenDocuments {
        &self.open
    }
}

impl SourceProvider for MemorySources {
    fn open_document(&self, uri: &FileUri) -> Option<EditorDocument> {
        self.open.get(uri)
    }

    fn exists(&self, path: &Path) -> bool {
        let guard = self.files.read().unwrap_or_else(PoisonError::into_inner);
        guard.contains_key(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let guard = self.files.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sources_read_and_report_missing() {
        let sources = MemorySources::new();
        sources.insert("/proj/a.h", "A = 1\n");
        assert!(sources.exists(Path::new("/proj/a.h")));
        assert_eq!(
            sources.read_to_string(Path::new("/proj/a.h")).unwrap(),
            "A = 1\n"
        );
        let err = sources.read_to_string(Path::new("/proj/b.h")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn open_documents_are_shared_between_clones() {
        let sources = FileSystemSources::default();
        let view = sources.clone();
        let uri = FileUri::from_platform_path("/proj/main.asm");
        sources
            .open_documents()
            .insert(EditorDocument::new(uri.clone(), 3, "\tnop\n"));
        let doc = view.open_document(&uri).unwrap();
        assert_eq!(doc.version, 3);
        assert_eq!(&*doc.text, "\tnop\n");
        view.open_documents().remove(&uri);
        assert!(sources.open_document(&uri).is_none());
    }
}
