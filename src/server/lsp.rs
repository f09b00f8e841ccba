use std::sync::Arc;

use tower_lsp::{
    jsonrpc::Result,
    lsp_types::{
        CompletionItem, CompletionOptions, CompletionParams, CompletionResponse,
        DidChangeConfigurationParams, DidChangeTextDocumentParams, DidChangeWatchedFilesParams,
        DidCloseTextDocumentParams, DidOpenTextDocumentParams, DidSaveTextDocumentParams,
        DocumentHighlight, DocumentHighlightParams, DocumentLink, DocumentLinkOptions,
        DocumentLinkParams, DocumentSymbolParams, DocumentSymbolResponse, GotoDefinitionParams,
        GotoDefinitionResponse, Hover, HoverParams, HoverProviderCapability, InitializeParams,
        InitializeResult, InitializedParams, Location, OneOf, ReferenceParams, RenameParams,
        ServerCapabilities, ServerInfo, SymbolInformation, TextDocumentSyncCapability,
        TextDocumentSyncKind, TextDocumentSyncOptions, TextDocumentSyncSaveOptions, Url,
        WorkspaceEdit, WorkspaceSymbolParams,
    },
    LanguageServer,
};
use tracing::{debug, info};

use crate::{
    assembler::DasmAssembler,
    attribution::AttributionError,
    client::LanguageClient,
    completion::{completion_items, resolve},
    hover::hover,
    links::document_links,
    navigation::{definition, highlights, references, rename},
    symbols::{document_symbols, workspace_symbols},
};

use super::backend::Backend;
use super::config::{extract_dasm_path, extract_prefer_uppercase};

#[tower_lsp::async_trait]
impl<C> LanguageServer for Backend<C>
where
    C: LanguageClient,
{
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        if let Some(options) = params.initialization_options.as_ref() {
            self.apply_settings(options).await;
        }

        let capabilities = ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                    ..Default::default()
                },
            )),
            hover_provider: Some(HoverProviderCapability::Simple(true)),
            completion_provider: Some(CompletionOptions {
                resolve_provider: Some(true),
                trigger_characters: Some(vec![".".to_string()]),
                ..Default::default()
            }),
            definition_provider: Some(OneOf::Left(true)),
            references_provider: Some(OneOf::Left(true)),
            document_highlight_provider: Some(OneOf::Left(true)),
            rename_provider: Some(OneOf::Left(true)),
            document_symbol_provider: Some(OneOf::Left(true)),
            workspace_symbol_provider: Some(OneOf::Left(true)),
            document_link_provider: Some(DocumentLinkOptions {
                resolve_provider: Some(true),
                work_done_progress_options: Default::default(),
            }),
            ..Default::default()
        };

        Ok(InitializeResult {
            capabilities,
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("DASM LSP initialized");
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        self.apply_settings(&params.settings).await;
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdown_projects().await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        self.handle_open(doc.uri, doc.version, doc.text).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        self.handle_change(uri, version, params.content_changes)
            .await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        self.handle_save(params.text_document.uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.handle_close(params.text_document.uri).await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        self.handle_watched_change(params.changes).await;
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let pos = params.text_document_position_params.position;
        let answer = self
            .with_project(&uri, |project, file| hover(project, file, pos))
            .await
            .flatten();
        if answer.is_none() {
            debug!("hover: nothing at {uri}:{}:{}", pos.line, pos.character);
        }
        Ok(answer)
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let prefer = self.snapshot_config().await.prefer_uppercase;
        let items = match self
            .with_project(&uri, |project, _| {
                completion_items(project.result().map(|result| &**result), prefer)
            })
            .await
        {
            Some(items) => items,
            None => completion_items(None, prefer),
        };
        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn completion_resolve(&self, item: CompletionItem) -> Result<CompletionItem> {
        Ok(resolve(item))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let pos = params.text_document_position_params.position;
        let result = self
            .with_project(&uri, |project, file| definition(project, file, pos))
            .await;
        Ok(found("goto_definition", &uri, result)
            .flatten()
            .map(GotoDefinitionResponse::Scalar))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let uri = params.text_document_position.text_document.uri;
        let pos = params.text_document_position.position;
        let include_declaration = params.context.include_declaration;
        let result = self
            .with_project(&uri, |project, file| {
                references(project, file, pos, include_declaration)
            })
            .await;
        Ok(found("references", &uri, result))
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        let uri = params.text_document_position.text_document.uri;
        let pos = params.text_document_position.position;
        let new_name = params.new_name;
        let result = self
            .with_project(&uri, |project, file| rename(project, file, pos, &new_name))
            .await;
        Ok(found("rename", &uri, result))
    }

    async fn document_highlight(
        &self,
        params: DocumentHighlightParams,
    ) -> Result<Option<Vec<DocumentHighlight>>> {
        let uri = params.text_document_position_params.text_document.uri;
        let pos = params.text_document_position_params.position;
        let result = self
            .with_project(&uri, |project, file| highlights(project, file, pos))
            .await;
        Ok(found("document_highlight", &uri, result))
    }

    async fn document_link(&self, params: DocumentLinkParams) -> Result<Option<Vec<DocumentLink>>> {
        let uri = params.text_document.uri;
        Ok(self
            .with_project(&uri, |project, file| document_links(project.files(), file))
            .await)
    }

    async fn document_link_resolve(&self, link: DocumentLink) -> Result<DocumentLink> {
        Ok(link)
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let uri = params.text_document.uri;
        Ok(self
            .with_project(&uri, |project, file| document_symbols(project, file))
            .await
            .map(DocumentSymbolResponse::Flat))
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> Result<Option<Vec<SymbolInformation>>> {
        let query = params.query;
        Ok(Some(
            self.with_projects(|projects| workspace_symbols(projects, &query))
                .await,
        ))
    }
}

impl<C> Backend<C>
where
    C: LanguageClient,
{
    /// Apply a `vscode-dasm` settings object. Absent keys keep their values.
    async fn apply_settings(&self, settings: &serde_json::Value) {
        let mut cfg = self.config.write().await;
        if let Some(prefer) = extract_prefer_uppercase(settings) {
            cfg.prefer_uppercase = prefer;
            info!("updated uppercase preference: {:?}", prefer);
        }
        let new_path = extract_dasm_path(settings).filter(|path| *path != cfg.dasm_path);
        if let Some(path) = &new_path {
            cfg.dasm_path = path.clone();
            info!("updated dasm executable: {}", path.display());
        }
        drop(cfg);

        if let Some(path) = new_path {
            self.set_assembler(Arc::new(DasmAssembler::new(path))).await;
        }
    }
}

/// Unwrap a request answer, logging why there is none.
fn found<T>(
    method: &str,
    uri: &Url,
    result: Option<std::result::Result<T, AttributionError>>,
) -> Option<T> {
    match result {
        Some(Ok(value)) => Some(value),
        Some(Err(e)) => {
            debug!("{method}: {e}");
            None
        }
        None => {
            debug!("{method}: {uri} is not part of any project");
            None
        }
    }
}
