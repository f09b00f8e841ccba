//! The file registry of a project.
//!
//! Every file reachable from the entry file through include directives is
//! tracked here together with its text and its include edges. All mutation
//! goes through the update methods, which feed the debouncer; edges are
//! recomputed and unreachable files collected whenever a file's text changes
//! (see `resolver.rs`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tower_lsp::lsp_types::Range;
use tracing::{debug, error};

use crate::scanner::split_lines;
use crate::source::{EditorDocument, SourceProvider};
use crate::uri::FileUri;

use super::debounce::Debouncer;

/// A file known to the project.
#[derive(Debug, Clone)]
pub struct TrackedFile {
    uri: FileUri,
    contents: Option<String>,
    lines: Vec<String>,
    version: i32,
    dirty: bool,
    dependencies: Vec<Dependency>,
    document: Option<EditorDocument>,
}

/// Version recorded for files loaded from disk.
pub const DISK_VERSION: i32 = -1;

impl TrackedFile {
    fn new(uri: FileUri) -> Self {
        Self {
            uri,
            contents: None,
            lines: Vec::new(),
            version: DISK_VERSION,
            dirty: false,
            dependencies: Vec::new(),
            document: None,
        }
    }

    pub fn uri(&self) -> &FileUri {
        &self.uri
    }

    /// Current text; `None` until loaded, or after a failed disk read.
    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line(&self, index: u32) -> Option<&str> {
        self.lines.get(index as usize).map(String::as_str)
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn document(&self) -> Option<&EditorDocument> {
        self.document.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.document.is_some()
    }

    pub(super) fn set_dependencies(&mut self, dependencies: Vec<Dependency>) {
        self.dependencies = dependencies;
    }

    fn set_contents(&mut self, contents: Option<String>) {
        self.lines = contents.as_deref().map(split_lines).unwrap_or_default();
        self.contents = contents;
    }
}

/// An include edge from `parent` to `uri`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub parent: FileUri,
    /// Include argument as written, quotes removed.
    pub name: String,
    pub uri: FileUri,
    /// Span of the include argument in the parent file.
    pub range: Range,
}

impl Dependency {
    /// The tracked file this edge points at. Lookup only; the registry owns files.
    pub fn file<'a>(&self, files: &'a ProjectFiles) -> Option<&'a TrackedFile> {
        files.get(&self.uri)
    }
}

/// A queued content refresh.
#[derive(Debug, Clone)]
pub enum PendingUpdate {
    Editor(EditorDocument),
    Disk(FileUri),
}

impl PendingUpdate {
    pub fn uri(&self) -> &FileUri {
        match self {
            PendingUpdate::Editor(doc) => &doc.uri,
            PendingUpdate::Disk(uri) => uri,
        }
    }
}

/// Registry changes, drained by the owning project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilesEvent {
    Added(FileUri),
    Changed(FileUri),
    Removed(FileUri),
}

pub struct ProjectFiles {
    pub(super) files: HashMap<FileUri, TrackedFile>,
    /// Insertion order, for stable iteration.
    pub(super) order: Vec<FileUri>,
    pub(super) entry: Option<FileUri>,
    pub(super) sources: Arc<dyn SourceProvider>,
    debouncer: Debouncer<FileUri, PendingUpdate>,
    events: Vec<FilesEvent>,
}

impl std::fmt::Debug for ProjectFiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectFiles")
            .field("entry", &self.entry)
            .field("files", &self.order)
            .field("debouncer", &self.debouncer)
            .finish()
    }
}

impl ProjectFiles {
    pub fn new(sources: Arc<dyn SourceProvider>, debounce: Duration) -> Self {
        Self {
            files: HashMap::new(),
            order: Vec::new(),
            entry: None,
            sources,
            debouncer: Debouncer::new(debounce),
            events: Vec::new(),
        }
    }

    /// Start tracking `uri`. The first file ever added becomes the entry file.
    ///
    /// Returns `false` if the file was already tracked.
    pub fn add_file(&mut self, uri: FileUri) -> bool {
        if self.files.contains_key(&uri) {
            return false;
        }
        debug!("tracking {uri}");
        if self.entry.is_none() {
            self.entry = Some(uri.clone());
        }
        self.files.insert(uri.clone(), TrackedFile::new(uri.clone()));
        self.order.push(uri.clone());
        self.events.push(FilesEvent::Added(uri));
        true
    }

    /// Track an editor document and queue its text.
    pub fn add_from_document(&mut self, document: EditorDocument) {
        self.add_file(document.uri.clone());
        self.update_from_editor(document);
    }

    /// Queue the editor's text for a tracked file.
    ///
    /// Ignored when the file already holds this version of the document.
    pub fn update_from_editor(&mut self, document: EditorDocument) {
        let Some(file) = self.files.get(&document.uri) else {
            return;
        };
        let current = file
            .document
            .as_ref()
            .is_some_and(|open| open.version == document.version)
            && file.contents.is_some();
        if current {
            return;
        }
        self.queue(PendingUpdate::Editor(document));
    }

    /// Queue a reload from disk for a tracked file.
    pub fn update_from_disk(&mut self, uri: &FileUri) {
        if self.files.contains_key(uri) {
            self.queue(PendingUpdate::Disk(uri.clone()));
        }
    }

    /// Record that the editor saved `document`.
    pub fn mark_saved(&mut self, document: &EditorDocument) {
        let changed = self
            .files
            .get(&document.uri)
            .is_some_and(|file| file.version != document.version);
        if changed {
            // A queued edit landing after this would mark the file dirty again.
            self.update_from_editor(document.clone());
            self.flush_pending();
        }
        if let Some(file) = self.files.get_mut(&document.uri) {
            file.dirty = false;
        }
    }

    /// Record that the editor closed `document`.
    pub fn mark_closed(&mut self, document: &EditorDocument) {
        let changed = self
            .files
            .get(&document.uri)
            .is_some_and(|file| file.version != document.version);
        if changed {
            self.update_from_editor(document.clone());
            // The buffer is going away, so its text has to land before the handle does.
            self.flush_pending();
        }
        if let Some(file) = self.files.get_mut(&document.uri) {
            file.document = None;
        }
    }

    pub fn has(&self, uri: &FileUri) -> bool {
        self.files.contains_key(uri)
    }

    pub fn get(&self, uri: &FileUri) -> Option<&TrackedFile> {
        self.files.get(uri)
    }

    pub fn entry_uri(&self) -> Option<&FileUri> {
        self.entry.as_ref()
    }

    pub fn entry(&self) -> Option<&TrackedFile> {
        self.entry.as_ref().and_then(|uri| self.files.get(uri))
    }

    pub fn is_entry(&self, uri: &FileUri) -> bool {
        self.entry.as_ref() == Some(uri)
    }

    /// Tracked files in the order they were added.
    pub fn all(&self) -> impl Iterator<Item = &TrackedFile> {
        self.order.iter().filter_map(|uri| self.files.get(uri))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Find the file an include directive named `name` points at.
    ///
    /// Searches the edges of `parent` only, or of every tracked file when no
    /// parent is given.
    pub fn get_by_dependency_uri(
        &self,
        parent: Option<&FileUri>,
        name: &str,
    ) -> Option<&TrackedFile> {
        let parents: Vec<&TrackedFile> = match parent {
            Some(uri) => self.files.get(uri).into_iter().collect(),
            None => self.all().collect(),
        };
        parents.into_iter().find_map(|file| {
            file.dependencies
                .iter()
                .find(|dep| dep.name == name)
                .and_then(|dep| self.files.get(&dep.uri))
        })
    }

    /// Resolve a file name reported by the assembler to a tracked file.
    ///
    /// `None` names the entry file. Otherwise the literal include argument is
    /// tried first, then a path-suffix match for names of nested includes.
    pub fn find_by_assembler_name(&self, name: Option<&str>) -> Option<&TrackedFile> {
        let Some(name) = name else {
            return self.entry();
        };
        self.get_by_dependency_uri(None, name)
            .or_else(|| self.all().find(|file| file.uri.ends_with_path(name)))
    }

    /// Generation of the queued update awaiting its timer, if any.
    pub fn pending_generation(&self) -> Option<u64> {
        self.debouncer.pending_generation()
    }

    pub fn debounce(&self) -> Duration {
        self.debouncer.delay()
    }

    /// Process the queued update if `generation` is still current.
    pub fn flush_due(&mut self, generation: u64) -> bool {
        match self.debouncer.take_due(generation) {
            Some(update) => {
                self.process(update);
                true
            }
            None => false,
        }
    }

    /// Process the queued update now, whatever its timer says.
    pub fn flush_pending(&mut self) -> bool {
        match self.debouncer.take_pending() {
            Some(update) => {
                self.process(update);
                true
            }
            None => false,
        }
    }

    /// Drop any queued update.
    pub fn dispose(&mut self) {
        self.debouncer.clear();
    }

    pub fn drain_events(&mut self) -> Vec<FilesEvent> {
        std::mem::take(&mut self.events)
    }

    pub(super) fn push_event(&mut self, event: FilesEvent) {
        self.events.push(event);
    }

    pub(super) fn queue(&mut self, update: PendingUpdate) {
        let key = update.uri().clone();
        for ready in self.debouncer.push(key, update) {
            self.process(ready);
        }
    }

    fn process(&mut self, update: PendingUpdate) {
        let uri = update.uri().clone();
        if !self.files.contains_key(&uri) {
            debug!("dropping update for {uri}: no longer tracked");
            return;
        }

        let loaded = match update {
            PendingUpdate::Editor(document) => {
                let text = document.text.to_string();
                Loaded {
                    contents: Some(text),
                    version: document.version,
                    dirty: true,
                    document: Some(document),
                }
            }
            PendingUpdate::Disk(uri) => self.read_from_disk(&uri),
        };

        if let Some(file) = self.files.get_mut(&uri) {
            // A document that was just opened matches what is on disk.
            let reopened = loaded.document.is_some() && file.document.is_none();
            file.set_contents(loaded.contents);
            file.version = loaded.version;
            file.dirty = loaded.dirty && !reopened;
            if loaded.document.is_some() {
                file.document = loaded.document;
            }
        }

        self.update_dependencies(&uri);
        self.events.push(FilesEvent::Changed(uri));
    }

    fn read_from_disk(&self, uri: &FileUri) -> Loaded {
        let text = uri
            .to_platform_path()
            .map_err(|err| err.to_string())
            .and_then(|path| {
                self.sources
                    .read_to_string(&path)
                    .map_err(|err| format!("{}: {err}", path.display()))
            });
        match text {
            Ok(text) => Loaded {
                contents: Some(text),
                version: DISK_VERSION,
                dirty: false,
                document: None,
            },
            Err(err) => {
                error!("failed to read {uri}: {err}");
                Loaded {
                    contents: None,
                    version: DISK_VERSION,
                    dirty: true,
                    document: None,
                }
            }
        }
    }
}

struct Loaded {
    contents: Option<String>,
    version: i32,
    dirty: bool,
    document: Option<EditorDocument>,
}
