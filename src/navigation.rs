//! Definition, references, rename and document highlight.
//!
//! All of these start from the assembled symbol under the cursor and are
//! answered from the project's last assembly plus the registry's text, never
//! from disk.

use tower_lsp::lsp_types::{
    DocumentChanges, DocumentHighlight, DocumentHighlightKind, Location, OneOf,
    OptionalVersionedTextDocumentIdentifier, Position, TextDocumentEdit, TextEdit, WorkspaceEdit,
};

use crate::attribution::{
    definition_location, find_occurrences, is_defined_in, project_occurrences, symbol_at,
    AttributionError, OccurrenceKind,
};
use crate::project::{Project, TrackedFile};
use crate::uri::FileUri;

/// Where the symbol under the cursor is defined.
pub fn definition(
    project: &Project,
    uri: &FileUri,
    position: Position,
) -> Result<Option<Location>, AttributionError> {
    let cursor = symbol_at(project, uri, position)?;
    Ok(definition_location(cursor.symbol, project.files()))
}

/// Every non-comment occurrence of the symbol under the cursor, across the project.
pub fn references(
    project: &Project,
    uri: &FileUri,
    position: Position,
    include_declaration: bool,
) -> Result<Vec<Location>, AttributionError> {
    let cursor = symbol_at(project, uri, position)?;
    let mut locations = Vec::new();
    for (file, occurrences) in project_occurrences(project, cursor.symbol) {
        let Ok(url) = file.uri().to_url() else {
            continue;
        };
        locations.extend(
            occurrences
                .into_iter()
                .filter(|occurrence| match occurrence.kind {
                    OccurrenceKind::Comment => false,
                    OccurrenceKind::Declaration => include_declaration,
                    OccurrenceKind::Reference => true,
                })
                .map(|occurrence| Location::new(url.clone(), occurrence.range)),
        );
    }
    Ok(locations)
}

/// Rename the symbol under the cursor everywhere outside comments.
///
/// Produces one versioned document edit per file that mentions the symbol.
pub fn rename(
    project: &Project,
    uri: &FileUri,
    position: Position,
    new_name: &str,
) -> Result<WorkspaceEdit, AttributionError> {
    let cursor = symbol_at(project, uri, position)?;
    let mut edits = Vec::new();
    for (file, occurrences) in project_occurrences(project, cursor.symbol) {
        let text_edits: Vec<OneOf<TextEdit, _>> = occurrences
            .into_iter()
            .filter(|occurrence| occurrence.kind != OccurrenceKind::Comment)
            .map(|occurrence| OneOf::Left(TextEdit::new(occurrence.range, new_name.to_string())))
            .collect();
        if text_edits.is_empty() {
            continue;
        }
        let Ok(url) = file.uri().to_url() else {
            continue;
        };
        edits.push(TextDocumentEdit {
            text_document: OptionalVersionedTextDocumentIdentifier {
                uri: url,
                version: document_version(file),
            },
            edits: text_edits,
        });
    }

    Ok(WorkspaceEdit {
        document_changes: Some(DocumentChanges::Edits(edits)),
        ..WorkspaceEdit::default()
    })
}

/// Highlights of the symbol under the cursor within its own file.
pub fn highlights(
    project: &Project,
    uri: &FileUri,
    position: Position,
) -> Result<Vec<DocumentHighlight>, AttributionError> {
    let cursor = symbol_at(project, uri, position)?;
    let Some(file) = project.files().get(uri) else {
        return Err(AttributionError::FileNotTracked(uri.clone()));
    };
    let defined_here = is_defined_in(cursor.symbol, project.files(), uri);
    Ok(find_occurrences(cursor.symbol, file.lines(), defined_here)
        .into_iter()
        .map(|occurrence| DocumentHighlight {
            range: occurrence.range,
            kind: Some(match occurrence.kind {
                OccurrenceKind::Comment => DocumentHighlightKind::TEXT,
                OccurrenceKind::Declaration => DocumentHighlightKind::WRITE,
                OccurrenceKind::Reference => DocumentHighlightKind::READ,
            }),
        })
        .collect())
}

/// Version to pin an edit to. Files not open in the editor have none.
fn document_version(file: &TrackedFile) -> Option<i32> {
    file.document().map(|document| document.version)
}
