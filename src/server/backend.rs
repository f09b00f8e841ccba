use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use tokio::sync::{
    mpsc::{self, UnboundedReceiver},
    Mutex, RwLock,
};
use tower_lsp::lsp_types::{
    Diagnostic, DocumentLink, FileEvent, MessageType, TextDocumentContentChangeEvent, Url,
};
use tracing::{debug, info, warn};

use crate::{
    assembler::{Assembler, DasmAssembler},
    client::LanguageClient,
    diagnostics::{cycle_diagnostic, diagnostics_for_result},
    links::entry_file_links,
    project::{Project, ProjectEvent, ProjectId, ProjectManager},
    source::{EditorDocument, FileSystemSources, OpenDocuments, SourceProvider},
    uri::FileUri,
    ServerConfig,
};

#[derive(Debug, Clone)]
pub struct Backend<C = tower_lsp::Client> {
    pub(crate) client: C,
    pub(crate) open: OpenDocuments,
    pub(crate) state: Arc<Mutex<ProjectState>>,
    pub(crate) config: Arc<RwLock<ServerConfig>>,
}

/// Everything the project model owns, guarded by one lock.
#[derive(Debug)]
pub(crate) struct ProjectState {
    pub(crate) manager: ProjectManager,
    events: UnboundedReceiver<ProjectEvent>,
    /// Files each project last published diagnostics for.
    published: HashMap<ProjectId, HashSet<FileUri>>,
    /// Generation each project's debounce timer is armed for.
    armed: HashMap<ProjectId, u64>,
}

/// Something to tell the client once the project state settled.
#[derive(Debug)]
enum Notification {
    Diagnostics {
        uri: FileUri,
        diagnostics: Vec<Diagnostic>,
        version: Option<i32>,
    },
    Log {
        kind: MessageType,
        message: String,
    },
}

impl<C> Backend<C> {
    pub fn new(client: C) -> Self {
        Self::new_with_config(client, ServerConfig::default())
    }

    pub fn new_with_config(client: C, config: ServerConfig) -> Self {
        let assembler = Arc::new(DasmAssembler::new(config.dasm_path.clone()));
        Self::with_assembler(client, config, assembler)
    }

    /// Backend over the real file system with a custom assembler.
    pub fn with_assembler(client: C, config: ServerConfig, assembler: Arc<dyn Assembler>) -> Self {
        let open = OpenDocuments::default();
        let sources = Arc::new(FileSystemSources::new(open.clone()));
        Self::with_parts(client, config, open, sources, assembler)
    }

    /// Backend with every collaborator injected.
    ///
    /// `open` must be the open-document set `sources` consults, since the
    /// backend records editor buffers there.
    pub fn with_parts(
        client: C,
        config: ServerConfig,
        open: OpenDocuments,
        sources: Arc<dyn SourceProvider>,
        assembler: Arc<dyn Assembler>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = ProjectManager::new(sources, assembler, config.debounce, tx);
        Self {
            client,
            open,
            state: Arc::new(Mutex::new(ProjectState {
                manager,
                events: rx,
                published: HashMap::new(),
                armed: HashMap::new(),
            })),
            config: Arc::new(RwLock::new(config)),
        }
    }

    pub async fn snapshot_config(&self) -> ServerConfig {
        self.config.read().await.clone()
    }

    /// Run `f` against the project that answers requests about `uri`.
    pub(crate) async fn with_project<R>(
        &self,
        uri: &Url,
        f: impl FnOnce(&Project, &FileUri) -> R,
    ) -> Option<R> {
        let uri = FileUri::from_url(uri);
        let state = self.state.lock().await;
        let project = state.manager.project_for_file(&uri)?;
        Some(f(project, &uri))
    }

    /// Run `f` against every project.
    pub(crate) async fn with_projects<R>(&self, f: impl FnOnce(&[Project]) -> R) -> R {
        let state = self.state.lock().await;
        f(state.manager.projects())
    }

    /// Entry file of every project (`dasm/entryFiles`).
    pub async fn entry_files(&self) -> tower_lsp::jsonrpc::Result<Vec<DocumentLink>> {
        Ok(self
            .with_projects(|projects| entry_file_links(projects))
            .await)
    }

    pub async fn shutdown_projects(&self) {
        let mut state = self.state.lock().await;
        state.manager.dispose();
        state.armed.clear();
    }
}

impl<C> Backend<C>
where
    C: LanguageClient,
{
    pub async fn handle_open(&self, uri: Url, version: i32, text: String) {
        let document = EditorDocument::new(FileUri::from_url(&uri), version, text);
        self.open.insert(document.clone());
        self.update(|manager| manager.on_opened(document)).await;
    }

    /// Apply a full-document change. Only the last change event counts.
    pub async fn handle_change(
        &self,
        uri: Url,
        version: i32,
        changes: Vec<TextDocumentContentChangeEvent>,
    ) {
        let Some(change) = changes.into_iter().last() else {
            return;
        };
        if change.range.is_some() {
            warn!("ignoring ranged change for {uri}; full sync expected");
            return;
        }
        let document = EditorDocument::new(FileUri::from_url(&uri), version, change.text);
        self.open.insert(document.clone());
        self.update(|manager| manager.on_changed(document)).await;
    }

    pub async fn handle_save(&self, uri: Url) {
        let Some(document) = self.open.get(&FileUri::from_url(&uri)) else {
            debug!("save for unknown document {uri}");
            return;
        };
        self.update(|manager| manager.on_saved(&document)).await;
    }

    pub async fn handle_close(&self, uri: Url) {
        let Some(document) = self.open.remove(&FileUri::from_url(&uri)) else {
            debug!("close for unknown document {uri}");
            return;
        };
        self.update(|manager| manager.on_closed(&document)).await;
    }

    pub async fn handle_watched_change(&self, changes: Vec<FileEvent>) {
        let uris: Vec<FileUri> = changes
            .iter()
            .map(|change| FileUri::from_url(&change.uri))
            .collect();
        self.update(|manager| {
            for uri in &uris {
                manager.on_disk_changed(uri);
            }
        })
        .await;
    }

    /// Replace the assembler of every project and reassemble.
    pub async fn set_assembler(&self, assembler: Arc<dyn Assembler>) {
        self.update(|manager| manager.set_assembler(assembler)).await;
    }

    /// Process every queued update now instead of waiting for its timer.
    pub async fn flush_all(&self) {
        self.update(ProjectManager::flush_all).await;
    }

    pub(crate) async fn flush_due(&self, project: ProjectId, generation: u64) {
        self.update(|manager| {
            manager.flush_due(project, generation);
        })
        .await;
    }

    /// Mutate the projects, then publish whatever the change produced and
    /// arm timers for updates it queued.
    ///
    /// Notifications go out while the lock is held so that publishes from
    /// concurrent handlers cannot overtake each other.
    async fn update(&self, f: impl FnOnce(&mut ProjectManager)) {
        let mut state = self.state.lock().await;
        f(&mut state.manager);
        let notifications = state.drain_notifications();
        let timers = state.timers_to_arm();
        let delay = state.manager.debounce();
        self.arm_timers(timers, delay);
        for notification in notifications {
            self.notify(notification).await;
        }
    }

    fn arm_timers(&self, timers: Vec<(ProjectId, u64)>, delay: Duration) {
        for (project, generation) in timers {
            let backend = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                backend.flush_due(project, generation).await;
            });
        }
    }

    async fn notify(&self, notification: Notification) {
        match notification {
            Notification::Diagnostics {
                uri,
                diagnostics,
                version,
            } => match uri.to_url() {
                Ok(url) => {
                    self.client
                        .publish_diagnostics(url, diagnostics, version)
                        .await
                }
                Err(err) => debug!("not publishing diagnostics for {uri}: {err}"),
            },
            Notification::Log { kind, message } => self.client.log_message(kind, message).await,
        }
    }
}

impl ProjectState {
    /// Turn pending project events into client notifications.
    fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            match event {
                ProjectEvent::Assembled { project, result } => {
                    let Some(current) = self.manager.project(project) else {
                        continue;
                    };
                    let files = current.files();
                    let per_file = diagnostics_for_result(files, &result);
                    let reported: HashSet<FileUri> = per_file.keys().cloned().collect();
                    let previous = self.published.remove(&project).unwrap_or_default();

                    for stale in previous.difference(&reported) {
                        out.push(Notification::Diagnostics {
                            uri: stale.clone(),
                            diagnostics: Vec::new(),
                            version: None,
                        });
                    }
                    for (uri, diagnostics) in per_file {
                        let version = files
                            .get(&uri)
                            .and_then(|file| file.document())
                            .map(|document| document.version);
                        out.push(Notification::Diagnostics {
                            uri,
                            diagnostics,
                            version,
                        });
                    }
                    self.published.insert(project, reported);
                }
                ProjectEvent::AssemblyFailed { project, error } => {
                    if let Some((uri, diagnostic)) = cycle_diagnostic(&error) {
                        let version = self
                            .manager
                            .project(project)
                            .and_then(|p| p.files().get(&uri))
                            .and_then(|file| file.document())
                            .map(|document| document.version);
                        self.published
                            .entry(project)
                            .or_default()
                            .insert(uri.clone());
                        out.push(Notification::Diagnostics {
                            uri,
                            diagnostics: vec![diagnostic],
                            version,
                        });
                    }
                    out.push(Notification::Log {
                        kind: MessageType::ERROR,
                        message: format!("Assembly of project {project} aborted: {error}"),
                    });
                }
                ProjectEvent::FilesRemoved { project, uris } => {
                    let published = self.published.entry(project).or_default();
                    for uri in uris {
                        published.remove(&uri);
                        let tracked_elsewhere = self
                            .manager
                            .projects()
                            .iter()
                            .any(|other| other.has_file(&uri));
                        if tracked_elsewhere {
                            continue;
                        }
                        info!("clearing diagnostics of collected file {uri}");
                        out.push(Notification::Diagnostics {
                            uri,
                            diagnostics: Vec::new(),
                            version: None,
                        });
                    }
                }
            }
        }
        out
    }

    /// Pending updates whose generation has no timer yet.
    fn timers_to_arm(&mut self) -> Vec<(ProjectId, u64)> {
        let pending = self.manager.pending_timers();
        self.armed
            .retain(|id, _| pending.iter().any(|(pending_id, _)| pending_id == id));
        let mut out = Vec::new();
        for (project, generation) in pending {
            if self.armed.get(&project) != Some(&generation) {
                self.armed.insert(project, generation);
                out.push((project, generation));
            }
        }
        out
    }
}
