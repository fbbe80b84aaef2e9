//! HTML Language Server with embedded style and script regions.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService};

mod document;
mod error;
mod lsp;
mod module;
mod session;
mod settings;

pub use document::{
    languages, synthesize, tokenize, AppendContent, AttributeMatcher, ContentMatcher,
    Directive, DocumentRegions, DocumentStore, EmbeddedRegion, LanguageRange, LineIndex,
    Matchers, OpenDocument, RegionRole, RegionScanner, ScanResult, Token, TokenKind,
    VersionedCache, CSS_STYLE_RULE,
};
pub use error::Error;
pub use lsp::{
    EmbeddedDocumentParams, LanguageAtParams, LanguageAtResult, LanguageRangesParams,
    PublishDeclarationsParams, VirtualDocumentClosedParams, VirtualDocumentParams,
};
pub use module::{
    document_key, encoded_alias, module_key, DeclarationMap, DeclarationSink, FnLoader, FsLoader,
    GraphOptions, ImportSpecifier, LoaderOptions, Module, ModuleGraph, ModuleLoader, ModuleState,
    ScheduledTask, ScriptAst, TYPES_NAMESPACE,
};
pub use session::{virtual_uri, Session, VirtualChanges, VirtualDocument};
pub use settings::{
    discover_settings, load_settings, parse_settings, ContentSettings, DirectiveSettings,
    ModuleSettings, Settings,
};

use lsp::{ClientSink, DeclarationForwarder};

pub struct Backend {
    client: Client,
    session: Session,
    forwarder: Mutex<Option<DeclarationForwarder>>,
}

impl Backend {
    pub(crate) fn new(client: Client) -> Self {
        let (sink, forwarder) = ClientSink::new();
        Self {
            client,
            session: Session::new(Arc::new(sink)),
            forwarder: Mutex::new(Some(forwarder)),
        }
    }

    /// Push virtual document changes, skipping documents edited since.
    async fn publish(&self, changes: VirtualChanges) {
        for uri in changes.closed {
            self.client
                .send_notification::<lsp::VirtualDocumentClosed>(VirtualDocumentClosedParams { uri })
                .await;
        }
        for doc in changes.updated {
            if !self.session.documents().is_current(&doc.host, doc.version) {
                tracing::debug!(uri = %doc.uri, version = doc.version, "dropping stale virtual document");
                continue;
            }
            self.client
                .send_notification::<lsp::VirtualDocumentUpdated>(doc.into())
                .await;
        }
    }

    async fn embedded_document(&self, params: EmbeddedDocumentParams) -> Result<Option<String>> {
        Ok(lsp::embedded_document(&self.session, &params))
    }

    async fn language_at(&self, params: LanguageAtParams) -> Result<Option<LanguageAtResult>> {
        Ok(lsp::language_at(&self.session, &params))
    }

    async fn language_ranges(
        &self,
        params: LanguageRangesParams,
    ) -> Result<Option<Vec<LanguageRange>>> {
        Ok(lsp::language_ranges(&self.session, &params))
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let workspace_root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|f| f.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                params.root_uri.as_ref()?.to_file_path().ok()
            });

        match workspace_root {
            Some(root) => {
                let (settings, settings_dir) = settings::discover_settings(&root);
                tracing::info!(
                    root = %root.display(),
                    settings_dir = %settings_dir.display(),
                    "configuring workspace"
                );
                self.session.configure(&settings, &settings_dir);
            }
            None => self.session.configure(&Settings::default(), Path::new("")),
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        if let Some(forwarder) = self.forwarder.lock().take() {
            tokio::spawn(forwarder.run(self.client.clone()));
        }
        self.client
            .log_message(MessageType::INFO, "HTML language server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        self.session.shutdown();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        let changes = self
            .session
            .did_open(doc.uri, &doc.language_id, doc.text, doc.version);
        self.publish(changes).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // We use FULL sync, so there's exactly one change with the full text
        if let Some(change) = params.content_changes.into_iter().next() {
            let changes = self.session.did_change(
                &params.text_document.uri,
                change.text,
                params.text_document.version,
            );
            self.publish(changes).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let changes = self.session.did_close(&params.text_document.uri);
        self.publish(changes).await;
    }
}

pub fn create_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::build(Backend::new)
        .custom_method(lsp::EMBEDDED_DOCUMENT, Backend::embedded_document)
        .custom_method(lsp::LANGUAGE_AT, Backend::language_at)
        .custom_method(lsp::LANGUAGE_RANGES, Backend::language_ranges)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_can_be_created() {
        let (_service, _socket) = create_service();
    }
}
