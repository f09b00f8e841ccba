//! The multi-file project model.
//!
//! A [`Project`] is rooted at one entry file and tracks everything that file
//! pulls in through `include`. Every content change flows through
//! [`files::ProjectFiles`], which re-resolves the include graph, and ends with
//! a fresh assembly whose result is announced on the project event channel.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tower_lsp::lsp_types::Range;
use tracing::{debug, error, info};

use crate::assembler::{Assembler, AssemblyResult};
use crate::source::{EditorDocument, SourceProvider};
use crate::uri::FileUri;

pub mod debounce;
pub mod files;
pub mod includes;
pub mod manager;
mod resolver;

pub use debounce::{Debouncer, DEFAULT_DEBOUNCE};
pub use files::{Dependency, FilesEvent, PendingUpdate, ProjectFiles, TrackedFile};
pub use manager::ProjectManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(u64);

impl ProjectId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectError {
    #[error("project has no entry file")]
    NoEntry,
    #[error("entry file has no content: {0}")]
    EntryNotLoaded(FileUri),
    #[error("include cycle: {}", format_chain(.chain))]
    IncludeCycle {
        /// Files along the cycle, starting and ending with the same file.
        chain: Vec<FileUri>,
        /// File holding the include that closes the cycle.
        file: FileUri,
        range: Range,
    },
}

fn format_chain(chain: &[FileUri]) -> String {
    chain
        .iter()
        .map(FileUri::file_name)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Notifications sent by projects to whoever publishes results.
#[derive(Debug, Clone)]
pub enum ProjectEvent {
    Assembled {
        project: ProjectId,
        result: Arc<AssemblyResult>,
    },
    AssemblyFailed {
        project: ProjectId,
        error: ProjectError,
    },
    FilesRemoved {
        project: ProjectId,
        uris: Vec<FileUri>,
    },
}

pub struct Project {
    id: ProjectId,
    files: ProjectFiles,
    assembler: Arc<dyn Assembler>,
    result: Option<Arc<AssemblyResult>>,
    events: UnboundedSender<ProjectEvent>,
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("id", &self.id)
            .field("files", &self.files)
            .field("assembled", &self.result.is_some())
            .finish()
    }
}

impl Project {
    pub fn new(
        id: ProjectId,
        sources: Arc<dyn SourceProvider>,
        assembler: Arc<dyn Assembler>,
        debounce: Duration,
        events: UnboundedSender<ProjectEvent>,
    ) -> Self {
        Self {
            id,
            files: ProjectFiles::new(sources, debounce),
            assembler,
            result: None,
            events,
        }
    }

    pub fn id(&self) -> ProjectId {
        self.id
    }

    /// Read-only view of the registry. Mutation goes through the methods below.
    pub fn files(&self) -> &ProjectFiles {
        &self.files
    }

    pub fn has_file(&self, uri: &FileUri) -> bool {
        self.files.has(uri)
    }

    pub fn entry_uri(&self) -> Option<&FileUri> {
        self.files.entry_uri()
    }

    /// Result of the latest assembly pass.
    pub fn result(&self) -> Option<&Arc<AssemblyResult>> {
        self.result.as_ref()
    }

    pub fn set_assembler(&mut self, assembler: Arc<dyn Assembler>) {
        self.assembler = assembler;
    }

    pub fn add_document(&mut self, document: EditorDocument) {
        self.files.add_from_document(document);
        self.settle();
    }

    pub fn update_from_editor(&mut self, document: EditorDocument) {
        self.files.update_from_editor(document);
        self.settle();
    }

    pub fn update_from_disk(&mut self, uri: &FileUri) {
        self.files.update_from_disk(uri);
        self.settle();
    }

    pub fn mark_saved(&mut self, document: &EditorDocument) {
        self.files.mark_saved(document);
        self.settle();
    }

    pub fn mark_closed(&mut self, document: &EditorDocument) {
        self.files.mark_closed(document);
        self.settle();
    }

    pub fn pending_generation(&self) -> Option<u64> {
        self.files.pending_generation()
    }

    /// Run the queued update armed for `generation`, if still current.
    pub fn flush_due(&mut self, generation: u64) -> bool {
        let flushed = self.files.flush_due(generation);
        self.settle();
        flushed
    }

    pub fn flush_pending(&mut self) -> bool {
        let flushed = self.files.flush_pending();
        self.settle();
        flushed
    }

    pub fn dispose(&mut self) {
        self.files.dispose();
    }

    /// Flatten the include tree and run the assembler over it.
    ///
    /// The stored result is replaced wholesale. A detected include cycle
    /// aborts the pass and is reported on the event channel.
    pub fn assemble(&mut self) -> Result<Arc<AssemblyResult>, ProjectError> {
        let entry = self.files.entry().ok_or(ProjectError::NoEntry)?;
        let source = entry
            .contents()
            .ok_or_else(|| ProjectError::EntryNotLoaded(entry.uri().clone()))?;

        let includes = match includes::flatten(&self.files) {
            Ok(includes) => includes,
            Err(err) => {
                error!("project {}: {err}", self.id);
                self.send(ProjectEvent::AssemblyFailed {
                    project: self.id,
                    error: err.clone(),
                });
                return Err(err);
            }
        };

        let started = Instant::now();
        let result = Arc::new(self.assembler.assemble(source, &includes));
        info!(
            "project {} assembled {} file(s) in {:?}, success: {}",
            self.id,
            includes.len() + 1,
            started.elapsed(),
            result.success
        );

        self.result = Some(result.clone());
        self.send(ProjectEvent::Assembled {
            project: self.id,
            result: result.clone(),
        });
        Ok(result)
    }

    /// React to registry changes accumulated by the last operation.
    fn settle(&mut self) {
        let mut changed = false;
        let mut removed = Vec::new();
        for event in self.files.drain_events() {
            match event {
                FilesEvent::Added(uri) => debug!("project {}: added {uri}", self.id),
                FilesEvent::Changed(_) => changed = true,
                FilesEvent::Removed(uri) => removed.push(uri),
            }
        }

        if !removed.is_empty() {
            self.send(ProjectEvent::FilesRemoved {
                project: self.id,
                uris: removed,
            });
        }
        if changed {
            if let Err(err) = self.assemble() {
                debug!("project {}: not assembled: {err}", self.id);
            }
        }
    }

    fn send(&self, event: ProjectEvent) {
        if self.events.send(event).is_err() {
            debug!("project {}: no event listener", self.id);
        }
    }
}
