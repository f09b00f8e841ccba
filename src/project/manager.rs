//! Maps editor lifecycle events onto projects.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::assembler::Assembler;
use crate::source::{EditorDocument, SourceProvider};
use crate::uri::FileUri;

use super::{Project, ProjectEvent, ProjectId};

/// Every open project, plus the document the user last touched.
///
/// A document that no project tracks becomes the entry file of a new project.
/// Documents already tracked (an entry or any file it includes) update every
/// project that tracks them.
pub struct ProjectManager {
    projects: Vec<Project>,
    current: Option<FileUri>,
    next_id: u64,
    sources: Arc<dyn SourceProvider>,
    assembler: Arc<dyn Assembler>,
    debounce: Duration,
    events: UnboundedSender<ProjectEvent>,
}

impl std::fmt::Debug for ProjectManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectManager")
            .field("projects", &self.projects)
            .field("current", &self.current)
            .field("debounce", &self.debounce)
            .finish()
    }
}

impl ProjectManager {
    pub fn new(
        sources: Arc<dyn SourceProvider>,
        assembler: Arc<dyn Assembler>,
        debounce: Duration,
        events: UnboundedSender<ProjectEvent>,
    ) -> Self {
        Self {
            projects: Vec::new(),
            current: None,
            next_id: 1,
            sources,
            assembler,
            debounce,
            events,
        }
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.iter().find(|project| project.id() == id)
    }

    pub fn current_document(&self) -> Option<&FileUri> {
        self.current.as_ref()
    }

    /// The project to answer requests about `uri` from.
    ///
    /// When several projects include the same file, the one holding the
    /// current document wins, then the oldest.
    pub fn project_for_file(&self, uri: &FileUri) -> Option<&Project> {
        self.current_project()
            .filter(|project| project.has_file(uri))
            .or_else(|| self.projects.iter().find(|project| project.has_file(uri)))
    }

    /// Project of the current document.
    pub fn current_project(&self) -> Option<&Project> {
        let current = self.current.as_ref()?;
        self.projects.iter().find(|project| project.has_file(current))
    }

    pub fn on_opened(&mut self, document: EditorDocument) {
        self.on_changed(document);
    }

    pub fn on_changed(&mut self, document: EditorDocument) {
        self.current = Some(document.uri.clone());
        let mut tracked = false;
        for project in self.projects_with(&document.uri) {
            project.update_from_editor(document.clone());
            tracked = true;
        }
        if !tracked {
            self.create_project(document);
        }
    }

    pub fn on_saved(&mut self, document: &EditorDocument) {
        self.current = Some(document.uri.clone());
        for project in self.projects_with(&document.uri) {
            project.mark_saved(document);
        }
    }

    pub fn on_closed(&mut self, document: &EditorDocument) {
        for project in self.projects_with(&document.uri) {
            project.mark_closed(document);
        }
        if self.current.as_ref() == Some(&document.uri) {
            self.current = None;
        }
    }

    /// A watched file changed on disk. Open buffers take precedence over disk.
    pub fn on_disk_changed(&mut self, uri: &FileUri) {
        let mut reloaded = 0;
        for project in self.projects_with(uri) {
            let open = project.files().get(uri).is_some_and(|file| file.is_open());
            if !open {
                project.update_from_disk(uri);
                reloaded += 1;
            }
        }
        if reloaded > 0 {
            debug!("reloaded {uri} from disk in {reloaded} project(s)");
        }
    }

    /// Run the queued update of `project` if its timer is still current.
    pub fn flush_due(&mut self, project: ProjectId, generation: u64) -> bool {
        self.projects
            .iter_mut()
            .find(|candidate| candidate.id() == project)
            .is_some_and(|project| project.flush_due(generation))
    }

    /// Process every queued update right away.
    pub fn flush_all(&mut self) {
        for project in &mut self.projects {
            project.flush_pending();
        }
    }

    /// Projects with a queued update, with the generation to arm a timer for.
    pub fn pending_timers(&self) -> Vec<(ProjectId, u64)> {
        self.projects
            .iter()
            .filter_map(|project| Some((project.id(), project.pending_generation()?)))
            .collect()
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Swap the assembler and rebuild every project with it.
    pub fn set_assembler(&mut self, assembler: Arc<dyn Assembler>) {
        self.assembler = assembler.clone();
        for project in &mut self.projects {
            project.set_assembler(assembler.clone());
            if let Err(err) = project.assemble() {
                debug!("project {}: not assembled: {err}", project.id());
            }
        }
    }

    pub fn dispose(&mut self) {
        for project in &mut self.projects {
            project.dispose();
        }
    }

    fn projects_with<'a>(&'a mut self, uri: &'a FileUri) -> impl Iterator<Item = &'a mut Project> {
        self.projects
            .iter_mut()
            .filter(move |project| project.has_file(uri))
    }

    fn create_project(&mut self, document: EditorDocument) {
        let id = ProjectId::new(self.next_id);
        self.next_id += 1;
        info!("project {id}: new project for {}", document.uri);
        let mut project = Project::new(
            id,
            self.sources.clone(),
            self.assembler.clone(),
            self.debounce,
            self.events.clone(),
        );
        project.add_document(document);
        self.projects.push(project);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tokio::sync::mpsc;

    use super::*;
    use crate::assembler::AssemblyResult;
    use crate::source::MemorySources;

    struct NoopAssembler;

    impl Assembler for NoopAssembler {
        fn assemble(&self, _source: &str, _includes: &BTreeMap<String, String>) -> AssemblyResult {
            AssemblyResult {
                success: true,
                ..AssemblyResult::default()
            }
        }
    }

    fn manager(sources: &MemorySources) -> ProjectManager {
        let (tx, _rx) = mpsc::unbounded_channel();
        ProjectManager::new(
            Arc::new(sources.clone()),
            Arc::new(NoopAssembler),
            Duration::ZERO,
            tx,
        )
    }

    fn doc(path: &str, version: i32, text: &str) -> EditorDocument {
        EditorDocument::new(FileUri::from_platform_path(path), version, text)
    }

    #[test]
    fn untracked_documents_start_projects() {
        let sources = MemorySources::new();
        let mut manager = manager(&sources);
        manager.on_opened(doc("/p/one.asm", 1, "\tnop\n"));
        manager.on_opened(doc("/p/two.asm", 1, "\tnop\n"));
        assert_eq!(manager.projects().len(), 2);
        assert_eq!(
            manager.current_document(),
            Some(&FileUri::from_platform_path("/p/two.asm"))
        );
    }

    #[test]
    fn included_document_joins_existing_project() {
        let sources = MemorySources::new();
        sources.insert("/p/a.h", "A = 1\n");
        let mut manager = manager(&sources);
        manager.on_opened(doc("/p/main.asm", 1, "\tinclude \"a.h\"\n"));
        manager.on_opened(doc("/p/a.h", 1, "A = 2\n"));

        assert_eq!(manager.projects().len(), 1);
        let a = FileUri::from_platform_path("/p/a.h");
        let project = manager.project_for_file(&a).unwrap();
        assert_eq!(project.files().get(&a).unwrap().contents(), Some("A = 2\n"));
    }

    #[test]
    fn disk_change_skips_open_buffers() {
        let sources = MemorySources::new();
        sources.insert("/p/a.h", "A = 1\n");
        let mut manager = manager(&sources);
        manager.on_opened(doc("/p/main.asm", 1, "\tinclude \"a.h\"\n"));

        let a = FileUri::from_platform_path("/p/a.h");
        sources.insert("/p/a.h", "A = 3\n");
        manager.on_disk_changed(&a);
        let file = manager.projects()[0].files().get(&a).unwrap();
        assert_eq!(file.contents(), Some("A = 3\n"));

        manager.on_opened(doc("/p/a.h", 5, "A = 4\n"));
        sources.insert("/p/a.h", "A = 5\n");
        manager.on_disk_changed(&a);
        let file = manager.projects()[0].files().get(&a).unwrap();
        assert_eq!(file.contents(), Some("A = 4\n"));
    }

    #[test]
    fn closing_current_document_clears_it() {
        let sources = MemorySources::new();
        let mut manager = manager(&sources);
        let main = doc("/p/main.asm", 1, "\tnop\n");
        manager.on_opened(main.clone());
        manager.on_closed(&main);
        assert_eq!(manager.current_document(), None);
        let uri = FileUri::from_platform_path("/p/main.asm");
        assert!(!manager.projects()[0].files().get(&uri).unwrap().is_open());
    }
}
