use async_trait::async_trait;
use tower_lsp::{
    lsp_types::{Diagnostic, MessageType, Url},
    Client,
};

/// The part of the LSP client the backend talks to, so it can be tested without a real client.
#[async_trait]
pub trait LanguageClient: Clone + Send + Sync + 'static {
    async fn publish_diagnostics(
        &self,
        uri: Url,
        diagnostics: Vec<Diagnostic>,
        version: Option<i32>,
    );

    async fn log_message(&self, kind: MessageType, message: String);
}

#[async_trait]
impl LanguageClient for Client {
    async fn publish_diagnostics(
        &self,
        uri: Url,
        diagnostics: Vec<Diagnostic>,
        version: Option<i32>,
    ) {
        Client::publish_diagnostics(self, uri, diagnostics, version).await;
    }

    async fn log_message(&self, kind: MessageType, message: String) {
        Client::log_message(self, kind, message).await;
    }
}
