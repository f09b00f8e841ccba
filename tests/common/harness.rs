//! Test harness for integration testing.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dasm_lsp::assembler::{Assembler, AssemblyResult, ListingLine, Symbol};
use dasm_lsp::client::LanguageClient;
use dasm_lsp::language;
use dasm_lsp::scanner::{remove_wrapping_quotes, strip_comment};
use dasm_lsp::server::Backend;
use dasm_lsp::source::MemorySources;
use dasm_lsp::ServerConfig;
use tokio::sync::Mutex;
use tower_lsp::lsp_types::{
    Diagnostic, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, DocumentHighlight, DocumentHighlightParams, DocumentLink,
    DocumentLinkParams, DocumentSymbolParams, DocumentSymbolResponse, GotoDefinitionParams,
    GotoDefinitionResponse, Hover, HoverParams, Location, MessageType, Position, ReferenceContext,
    ReferenceParams, RenameParams, SymbolInformation, TextDocumentContentChangeEvent,
    TextDocumentIdentifier, TextDocumentItem, TextDocumentPositionParams, Url,
    VersionedTextDocumentIdentifier, WorkspaceEdit, WorkspaceSymbolParams,
};
use tower_lsp::LanguageServer;

use super::fixtures::{file_url, find_position};

/// A recording LSP client that captures published diagnostics and log messages.
#[derive(Clone, Default)]
pub struct RecordingClient {
    published: Arc<Mutex<Vec<(Url, Vec<Diagnostic>, Option<i32>)>>>,
    logs: Arc<Mutex<Vec<(MessageType, String)>>>,
}

#[async_trait]
impl LanguageClient for RecordingClient {
    async fn publish_diagnostics(
        &self,
        uri: Url,
        diagnostics: Vec<Diagnostic>,
        version: Option<i32>,
    ) {
        let mut guard = self.published.lock().await;
        guard.push((uri, diagnostics, version));
    }

    async fn log_message(&self, kind: MessageType, message: String) {
        let mut guard = self.logs.lock().await;
        guard.push((kind, message));
    }
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all published diagnostics, clearing the internal buffer.
    pub async fn take_published(&self) -> Vec<(Url, Vec<Diagnostic>, Option<i32>)> {
        let mut guard = self.published.lock().await;
        guard.drain(..).collect()
    }

    /// The most recent diagnostics published for `uri`, or none if never published.
    pub async fn diagnostics_for(&self, uri: &Url) -> Option<Vec<Diagnostic>> {
        let guard = self.published.lock().await;
        guard
            .iter()
            .rev()
            .find(|(u, _, _)| u == uri)
            .map(|(_, d, _)| d.clone())
    }

    pub async fn logs(&self) -> Vec<(MessageType, String)> {
        self.logs.lock().await.clone()
    }
}

/// A stand-in for `dasm` that understands just enough of the syntax to
/// exercise result attribution.
///
/// * A name in column 0 defines a label, or a constant when followed by `=`
///   or `equ`.
/// * An indented mnemonic that is not an instruction or pseudo-op is an
///   `Unknown Mnemonic` error.
/// * An `include` of a file missing from the include map is an
///   `Unable to open` error.
#[derive(Clone, Default)]
pub struct FakeAssembler {
    calls: Arc<std::sync::Mutex<Vec<(String, BTreeMap<String, String>)>>>,
}

impl FakeAssembler {
    pub fn calls(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    /// Include map of the latest pass.
    pub fn last_includes(&self) -> BTreeMap<String, String> {
        self.calls()
            .last()
            .map(|(_, includes)| includes.clone())
            .unwrap_or_default()
    }
}

impl Assembler for FakeAssembler {
    fn assemble(&self, source: &str, includes: &BTreeMap<String, String>) -> AssemblyResult {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((source.to_string(), includes.clone()));

        let mut symbols = Vec::new();
        let mut listing = Vec::new();
        let mut address = 0xf000;
        let units = std::iter::once((None, source))
            .chain(includes.iter().map(|(name, text)| (Some(name.clone()), text.as_str())));
        for (filename, text) in units {
            for (idx, raw) in text.lines().enumerate() {
                let number = idx as u32 + 1;
                let code = strip_comment(raw);
                if code.trim().is_empty() {
                    continue;
                }
                if !code.starts_with(char::is_whitespace) {
                    let name: String = code
                        .chars()
                        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                        .collect();
                    if name.is_empty() {
                        continue;
                    }
                    let rest = code[name.len()..].trim_start_matches(':').trim();
                    let lower = rest.to_ascii_lowercase();
                    let constant = rest
                        .strip_prefix('=')
                        .or_else(|| lower.strip_prefix("equ").map(|_| &rest[3..]));
                    let (is_label, value) = match constant {
                        Some(value) => (false, parse_value(value.trim())),
                        None => {
                            address += 1;
                            (true, address)
                        }
                    };
                    symbols.push(Symbol {
                        name: name.clone(),
                        is_label,
                        value,
                        definition_filename: filename.clone(),
                        definition_line: number,
                        definition_column_start: 0,
                        definition_column_end: name.len() as u32,
                        ..Symbol::default()
                    });
                    continue;
                }

                let mut words = code.split_whitespace();
                let Some(mnemonic) = words.next() else {
                    continue;
                };
                let error_message = if mnemonic.eq_ignore_ascii_case("include") {
                    let target = remove_wrapping_quotes(words.next().unwrap_or_default());
                    let found = includes.keys().any(|key| key.ends_with(target));
                    (!found).then(|| format!("Unable to open '{target}'"))
                } else if language::instruction(mnemonic).is_none()
                    && language::pseudo_op(mnemonic).is_none()
                {
                    Some(format!("Unknown Mnemonic '{mnemonic}'."))
                } else {
                    None
                };
                if error_message.is_some() {
                    listing.push(ListingLine {
                        number,
                        filename: filename.clone(),
                        raw: raw.to_string(),
                        error_message,
                        ..ListingLine::default()
                    });
                }
            }
        }

        let success = listing.is_empty();
        AssemblyResult {
            listing: Some(listing),
            symbols: Some(symbols),
            exit_status: if success { 0 } else { 1 },
            success,
            ..AssemblyResult::default()
        }
    }
}

fn parse_value(text: &str) -> i64 {
    let text = text.trim_start_matches('#');
    if let Some(hex) = text.strip_prefix('$') {
        i64::from_str_radix(hex, 16).unwrap_or_default()
    } else if let Some(bin) = text.strip_prefix('%') {
        i64::from_str_radix(bin, 2).unwrap_or_default()
    } else {
        text.parse().unwrap_or_default()
    }
}

/// Test harness that wraps a Backend with a RecordingClient and in-memory files.
pub struct TestHarness {
    pub backend: Backend<RecordingClient>,
    pub client: RecordingClient,
    pub sources: MemorySources,
    pub assembler: FakeAssembler,
}

impl TestHarness {
    /// Create a harness that processes every update immediately.
    pub fn new() -> Self {
        Self::with_debounce(Duration::ZERO)
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        let client = RecordingClient::new();
        let sources = MemorySources::new();
        let assembler = FakeAssembler::default();
        let backend = Backend::with_parts(
            client.clone(),
            ServerConfig::builder().debounce(debounce).build(),
            sources.open_documents().clone(),
            Arc::new(sources.clone()),
            Arc::new(assembler.clone()),
        );
        Self {
            backend,
            client,
            sources,
            assembler,
        }
    }

    /// Put a file on the in-memory disk.
    pub fn write_file(&self, path: &str, contents: &str) -> Url {
        self.sources.insert(path, contents);
        file_url(path)
    }

    pub fn delete_file(&self, path: &str) {
        self.sources.remove(std::path::Path::new(path));
    }

    /// Open a document in the backend at version 1.
    pub async fn open(&self, path: &str, text: &str) -> Url {
        let uri = file_url(path);
        self.backend
            .did_open(DidOpenTextDocumentParams {
                text_document: TextDocumentItem {
                    uri: uri.clone(),
                    language_id: "dasm".into(),
                    version: 1,
                    text: text.to_string(),
                },
            })
            .await;
        uri
    }

    /// Replace the whole text of an open document.
    pub async fn change(&self, uri: &Url, version: i32, text: &str) {
        self.backend
            .did_change(DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier {
                    uri: uri.clone(),
                    version,
                },
                content_changes: vec![TextDocumentContentChangeEvent {
                    range: None,
                    range_length: None,
                    text: text.to_string(),
                }],
            })
            .await;
    }

    pub async fn close(&self, uri: &Url) {
        self.backend
            .did_close(DidCloseTextDocumentParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
            })
            .await;
    }

    /// Assert that the latest diagnostics published for a URI are empty.
    pub async fn assert_no_diagnostics(&self, uri: &Url) {
        let diags = self.client.diagnostics_for(uri).await.unwrap_or_default();
        assert!(
            diags.is_empty(),
            "expected no diagnostics for {}, got: {:?}",
            uri,
            diags
        );
    }

    /// Assert that a diagnostic message contains specific text.
    pub async fn assert_diagnostic_contains(&self, uri: &Url, text: &str) {
        let diags = self.client.diagnostics_for(uri).await.unwrap_or_default();
        let found = diags.iter().any(|d| d.message.contains(text));
        assert!(
            found,
            "expected diagnostic containing '{}' for {}, got: {:?}",
            text, uri, diags
        );
    }

    /// Perform goto definition and return the result.
    pub async fn goto_definition(&self, uri: &Url, position: Position) -> Option<Location> {
        let params = GotoDefinitionParams {
            text_document_position_params: position_params(uri, position),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        match self.backend.goto_definition(params).await.ok()? {
            Some(GotoDefinitionResponse::Scalar(loc)) => Some(loc),
            Some(GotoDefinitionResponse::Array(locs)) => locs.into_iter().next(),
            _ => None,
        }
    }

    /// Perform goto definition at a text needle.
    pub async fn goto_definition_at(
        &self,
        uri: &Url,
        text: &str,
        needle: &str,
    ) -> Option<Location> {
        self.goto_definition(uri, find_position(text, needle)).await
    }

    /// Find all references to a symbol at a position.
    pub async fn find_references(
        &self,
        uri: &Url,
        position: Position,
        include_declaration: bool,
    ) -> Vec<Location> {
        let params = ReferenceParams {
            text_document_position: position_params(uri, position),
            context: ReferenceContext {
                include_declaration,
            },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        self.backend
            .references(params)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    pub async fn rename(
        &self,
        uri: &Url,
        position: Position,
        new_name: &str,
    ) -> Option<WorkspaceEdit> {
        let params = RenameParams {
            text_document_position: position_params(uri, position),
            new_name: new_name.to_string(),
            work_done_progress_params: Default::default(),
        };
        self.backend.rename(params).await.ok().flatten()
    }

    pub async fn highlights(&self, uri: &Url, position: Position) -> Vec<DocumentHighlight> {
        let params = DocumentHighlightParams {
            text_document_position_params: position_params(uri, position),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        self.backend
            .document_highlight(params)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    /// Get hover information at a position.
    pub async fn hover(&self, uri: &Url, position: Position) -> Option<Hover> {
        let params = HoverParams {
            text_document_position_params: position_params(uri, position),
            work_done_progress_params: Default::default(),
        };
        self.backend.hover(params).await.ok().flatten()
    }

    /// Get hover information at a text needle.
    pub async fn hover_at(&self, uri: &Url, text: &str, needle: &str) -> Option<Hover> {
        self.hover(uri, find_position(text, needle)).await
    }

    pub async fn document_symbols(&self, uri: &Url) -> Vec<SymbolInformation> {
        let params = DocumentSymbolParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        match self.backend.document_symbol(params).await.ok().flatten() {
            Some(DocumentSymbolResponse::Flat(symbols)) => symbols,
            _ => Vec::new(),
        }
    }

    /// Search for workspace symbols.
    pub async fn workspace_symbols(&self, query: &str) -> Vec<SymbolInformation> {
        let params = WorkspaceSymbolParams {
            query: query.to_string(),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        self.backend
            .symbol(params)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    pub async fn document_links(&self, uri: &Url) -> Vec<DocumentLink> {
        let params = DocumentLinkParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        self.backend
            .document_link(params)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }
}

fn position_params(uri: &Url, position: Position) -> TextDocumentPositionParams {
    TextDocumentPositionParams {
        text_document: TextDocumentIdentifier { uri: uri.clone() },
        position,
    }
}

/// Markdown text of a hover.
pub fn hover_text(hover: &Hover) -> String {
    match &hover.contents {
        tower_lsp::lsp_types::HoverContents::Markup(markup) => markup.value.clone(),
        other => format!("{other:?}"),
    }
}
