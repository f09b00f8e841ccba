//! Document links for include directives.

use tower_lsp::lsp_types::{DocumentLink, Range};

use crate::project::{Project, ProjectFiles};
use crate::uri::FileUri;

/// One link per include edge of `uri`, spanning the include argument.
pub fn document_links(files: &ProjectFiles, uri: &FileUri) -> Vec<DocumentLink> {
    let Some(file) = files.get(uri) else {
        return Vec::new();
    };
    file.dependencies()
        .iter()
        .filter_map(|dep| {
            Some(DocumentLink {
                range: dep.range,
                target: Some(dep.uri.to_url().ok()?),
                tooltip: Some(dep.name.clone()),
                data: None,
            })
        })
        .collect()
}

/// The entry file of every project, each as a link with an empty range.
pub fn entry_file_links<'a>(projects: impl IntoIterator<Item = &'a Project>) -> Vec<DocumentLink> {
    projects
        .into_iter()
        .filter_map(|project| project.entry_uri()?.to_url().ok())
        .map(|url| DocumentLink {
            range: Range::default(),
            target: Some(url),
            tooltip: None,
            data: None,
        })
        .collect()
}
