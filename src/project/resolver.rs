//! Keeps the include graph of a project consistent with file contents.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::scanner::{include_search_path, scan_includes};
use crate::uri::FileUri;

use super::files::{Dependency, FilesEvent, PendingUpdate, ProjectFiles};

impl ProjectFiles {
    /// Recompute the include edges of `uri` from its current text.
    ///
    /// Edges are diffed by resolved URI: an edge whose target is still
    /// included is kept (with its range refreshed), vanished targets are
    /// dropped and new ones appended. Newly discovered files are tracked and
    /// queued for loading, then unreachable files are collected.
    pub(super) fn update_dependencies(&mut self, uri: &FileUri) {
        let Some(file) = self.files.get(uri) else {
            return;
        };
        let links = scan_includes(file.lines());
        let search_path = include_search_path(file.lines());
        let base_dir = match uri.parent_dir() {
            Ok(dir) => dir,
            Err(err) => {
                debug!("not resolving includes of {uri}: {err}");
                PathBuf::new()
            }
        };

        let mut previous = file.dependencies().to_vec();
        let mut next: Vec<Dependency> = Vec::with_capacity(links.len());
        for link in links {
            let Some(target) = self.resolve_include(&base_dir, &search_path, &link.name) else {
                debug!("include {:?} of {uri} not found", link.name);
                continue;
            };
            if next.iter().any(|dep| dep.uri == target) {
                continue;
            }
            let dependency = match previous.iter().position(|dep| dep.uri == target) {
                Some(index) => {
                    let mut kept = previous.swap_remove(index);
                    kept.name = link.name;
                    kept.range = link.range;
                    kept
                }
                None => Dependency {
                    parent: uri.clone(),
                    name: link.name,
                    uri: target,
                    range: link.range,
                },
            };
            next.push(dependency);
        }

        let untracked: Vec<FileUri> = next
            .iter()
            .filter(|dep| !self.files.contains_key(&dep.uri))
            .map(|dep| dep.uri.clone())
            .collect();
        if let Some(file) = self.files.get_mut(uri) {
            file.set_dependencies(next);
        }

        for target in untracked {
            // Loading may have tracked it through a sibling edge already.
            if !self.add_file(target.clone()) {
                continue;
            }
            let update = match self.sources.open_document(&target) {
                Some(document) => PendingUpdate::Editor(document),
                None => PendingUpdate::Disk(target),
            };
            self.queue(update);
        }

        self.collect_garbage();
    }

    /// Find the first search directory holding `name`.
    ///
    /// An open editor buffer counts as existing even if it was never saved.
    fn resolve_include(&self, base_dir: &Path, search_path: &[String], name: &str) -> Option<FileUri> {
        let name = name.replace('\\', "/");
        if Path::new(&name).is_absolute() {
            let candidate = FileUri::from_platform_path(&name);
            return self.include_exists(&candidate).then_some(candidate);
        }
        search_path.iter().find_map(|dir| {
            let candidate = FileUri::from_platform_path(base_dir.join(dir).join(&name));
            self.include_exists(&candidate).then_some(candidate)
        })
    }

    fn include_exists(&self, candidate: &FileUri) -> bool {
        if self.files.get(candidate).is_some_and(|file| file.is_open())
            || self.sources.open_document(candidate).is_some()
        {
            return true;
        }
        candidate
            .to_platform_path()
            .is_ok_and(|path| self.sources.exists(&path))
    }

    /// Drop every file no longer reachable from the entry file.
    ///
    /// Returns the URIs that were removed.
    pub fn collect_garbage(&mut self) -> Vec<FileUri> {
        let Some(entry) = self.entry.clone() else {
            return Vec::new();
        };

        let mut reachable: HashSet<FileUri> = HashSet::new();
        let mut queue = VecDeque::from([entry]);
        while let Some(uri) = queue.pop_front() {
            if !reachable.insert(uri.clone()) {
                continue;
            }
            if let Some(file) = self.files.get(&uri) {
                queue.extend(file.dependencies().iter().map(|dep| dep.uri.clone()));
            }
        }

        let removed: Vec<FileUri> = self
            .order
            .iter()
            .filter(|uri| !reachable.contains(*uri))
            .cloned()
            .collect();
        if removed.is_empty() {
            return removed;
        }
        for uri in &removed {
            info!("no longer tracking {uri}");
            self.files.remove(uri);
            self.push_event(FilesEvent::Removed(uri.clone()));
        }
        self.order.retain(|uri| reachable.contains(uri));
        removed
    }
}
