//! Editing session.
//!
//! A [`Session`] owns everything derived from the open documents: the
//! projection cache, the module graph and the active matchers. Document
//! lifecycle hooks report which virtual documents changed so the caller can
//! forward them.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tower_lsp::lsp_types::{Position, Range, Url};

use crate::document::{
    languages, DocumentRegions, DocumentStore, EmbeddedRegion, LanguageRange, Matchers,
    OpenDocument, VersionedCache,
};
use crate::module::{document_key, DeclarationSink, GraphOptions, ModuleGraph};
use crate::settings::Settings;

/// A synthesized buffer for one embedded language of a host document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDocument {
    pub uri: Url,
    pub host: Url,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

/// Virtual documents affected by a lifecycle event.
#[derive(Debug, Default)]
pub struct VirtualChanges {
    pub updated: Vec<VirtualDocument>,
    pub closed: Vec<Url>,
}

impl VirtualChanges {
    pub fn extend(&mut self, other: VirtualChanges) {
        self.updated.extend(other.updated);
        self.closed.extend(other.closed);
    }
}

#[derive(Debug, Clone)]
struct Config {
    host_language: String,
    virtual_languages: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host_language: languages::HTML.to_string(),
            virtual_languages: vec![languages::CSS.to_string(), languages::JAVASCRIPT.to_string()],
        }
    }
}

/// Uri of the virtual document for `language` embedded in `host`.
pub fn virtual_uri(host: &Url, language: &str) -> Option<Url> {
    Url::parse(&format!("{}/{}", host.as_str().trim_end_matches('/'), language)).ok()
}

pub struct Session {
    documents: DocumentStore,
    projections: VersionedCache<DocumentRegions>,
    matchers: RwLock<Arc<Matchers>>,
    config: RwLock<Config>,
    modules: ModuleGraph,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &*self.config.read())
            .field("modules", &self.modules)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(sink: Arc<dyn DeclarationSink>) -> Self {
        Self {
            documents: DocumentStore::new(),
            projections: VersionedCache::new("regions"),
            matchers: RwLock::new(Arc::new(Matchers::default())),
            config: RwLock::new(Config::default()),
            modules: ModuleGraph::new(sink, GraphOptions::default()),
        }
    }

    /// Apply settings loaded from `settings_dir`, registering the filesystem
    /// module loader.
    pub fn configure(&self, settings: &Settings, settings_dir: &Path) {
        self.set_matchers(settings.matchers());
        *self.config.write() = Config {
            host_language: settings.host_language().to_string(),
            virtual_languages: settings.virtual_languages(),
        };
        self.modules.set_options(settings.graph_options());
        self.modules
            .register_loader(settings.loader_options(settings_dir));
        self.projections.clear();
    }

    /// Replace the matcher registration. Cached projections are dropped.
    pub fn set_matchers(&self, matchers: Matchers) {
        *self.matchers.write() = Arc::new(matchers);
        self.projections.clear();
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn modules(&self) -> &ModuleGraph {
        &self.modules
    }

    pub fn host_language(&self) -> String {
        self.config.read().host_language.clone()
    }

    fn is_host(&self, doc: &OpenDocument) -> bool {
        doc.language_id == self.config.read().host_language
    }

    /// Regions of the current version of a host document.
    pub fn project(&self, uri: &Url) -> Option<Arc<DocumentRegions>> {
        let doc = self.documents.get(uri)?;
        if !self.is_host(&doc) {
            return None;
        }
        Some(self.project_document(&doc))
    }

    fn project_document(&self, doc: &OpenDocument) -> Arc<DocumentRegions> {
        self.projections.get(doc.uri.as_str(), doc.version, || {
            let matchers = Arc::clone(&self.matchers.read());
            let host_language = self.host_language();
            DocumentRegions::scan(&doc.text, doc.version, &host_language, &matchers)
        })
    }

    pub fn embedded_document(
        &self,
        uri: &Url,
        language: &str,
        ignore_attribute_values: bool,
    ) -> Option<String> {
        Some(self.project(uri)?.embedded_document(language, ignore_attribute_values))
    }

    /// Language at `position`. `None` for unknown documents and for regions
    /// of unrecognized language.
    pub fn language_at(&self, uri: &Url, position: Position) -> Option<String> {
        self.project(uri)?
            .language_at_position(position)
            .map(str::to_string)
    }

    pub fn region_at(&self, uri: &Url, position: Position) -> Option<EmbeddedRegion> {
        self.project(uri)?.region_at_position(position).cloned()
    }

    pub fn language_ranges(&self, uri: &Url, range: Range) -> Option<Vec<LanguageRange>> {
        Some(self.project(uri)?.language_ranges(range))
    }

    fn virtual_documents(&self, doc: &OpenDocument) -> Vec<VirtualDocument> {
        let regions = self.project_document(doc);
        let languages = self.config.read().virtual_languages.clone();
        languages
            .into_iter()
            .filter_map(|language| {
                let uri = virtual_uri(&doc.uri, &language)?;
                Some(VirtualDocument {
                    uri,
                    host: doc.uri.clone(),
                    text: regions.embedded_document(&language, false),
                    language_id: language,
                    version: doc.version,
                })
            })
            .collect()
    }

    fn virtual_uris(&self, host: &Url) -> Vec<Url> {
        self.config
            .read()
            .virtual_languages
            .iter()
            .filter_map(|language| virtual_uri(host, language))
            .collect()
    }

    /// Track an opened document. Reopening an open document under another
    /// language id switches its language and then applies the new text.
    pub fn did_open(&self, uri: Url, language_id: &str, text: String, version: i32) -> VirtualChanges {
        let language_changed = self
            .documents
            .get(&uri)
            .is_some_and(|open| open.language_id != language_id);
        if language_changed {
            let mut changes = self.did_change_language(&uri, language_id);
            changes.extend(self.did_change(&uri, text, version));
            return changes;
        }

        let doc = self.documents.open(uri, language_id, text, version);
        tracing::debug!(uri = %doc.uri, language_id, version, "opened document");
        let mut changes = VirtualChanges::default();
        if self.is_host(&doc) {
            changes.updated = self.virtual_documents(&doc);
        } else if doc.is_script() {
            self.modules
                .open_document(&document_key(&doc.uri), doc.text.clone());
        }
        changes
    }

    pub fn did_change(&self, uri: &Url, text: String, version: i32) -> VirtualChanges {
        let Some(doc) = self.documents.update(uri, text, version) else {
            tracing::warn!(%uri, "change for unknown document");
            return VirtualChanges::default();
        };
        let mut changes = VirtualChanges::default();
        if self.is_host(&doc) {
            changes.updated = self.virtual_documents(&doc);
        } else if doc.is_script() {
            self.modules
                .edit_document(&document_key(&doc.uri), doc.text.clone());
        }
        changes
    }

    /// Forget a document: its projection, its virtual documents and its module.
    pub fn did_close(&self, uri: &Url) -> VirtualChanges {
        let mut changes = VirtualChanges::default();
        let Some(doc) = self.documents.close(uri) else {
            return changes;
        };
        self.projections.remove(uri.as_str());
        if self.is_host(&doc) {
            changes.closed = self.virtual_uris(uri);
        }
        if doc.is_script() {
            self.modules.remove_module(&document_key(uri));
        }
        tracing::debug!(%uri, "closed document");
        changes
    }

    pub fn did_change_language(&self, uri: &Url, language_id: &str) -> VirtualChanges {
        let mut changes = VirtualChanges::default();
        let Some((old, doc)) = self.documents.set_language(uri, language_id) else {
            return changes;
        };
        if old == language_id {
            return changes;
        }
        tracing::debug!(%uri, old, language_id, "document language changed");

        let key = document_key(uri);
        if languages::is_script(&old) {
            self.modules.remove_module(&key);
        }
        if doc.is_script() && !self.modules.contains(&key) {
            self.modules.create_module(&key, Some(doc.text.clone()));
        }

        let host_language = self.host_language();
        if old == host_language {
            self.projections.remove(uri.as_str());
            changes.closed = self.virtual_uris(uri);
        } else if self.is_host(&doc) {
            changes.updated = self.virtual_documents(&doc);
        }
        changes
    }

    /// Tear down derived state for every document.
    pub fn shutdown(&self) {
        self.projections.clear();
        self.modules.remove_modules();
        self.modules.unregister_loader();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Directive, RegionRole};
    use crate::module::{DeclarationMap, FnLoader, LoaderOptions, ModuleState};

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn session() -> (Session, Arc<DeclarationMap>) {
        let sink = Arc::new(DeclarationMap::new());
        (Session::new(sink.clone()), sink)
    }

    #[test]
    fn host_documents_publish_virtual_documents() {
        let (session, _) = session();
        let uri = url("file:///w/index.html");
        let changes = session.did_open(uri.clone(), "html", "<style>a{}</style>".into(), 1);

        let uris: Vec<&str> = changes.updated.iter().map(|d| d.uri.as_str()).collect();
        assert_eq!(uris, vec!["file:///w/index.html/css", "file:///w/index.html/javascript"]);
        assert_eq!(changes.updated[0].text, "       a{}        ");
        assert_eq!(changes.updated[1].text.trim(), "");
    }

    #[test]
    fn projection_is_cached_per_version() {
        let (session, _) = session();
        let uri = url("file:///w/index.html");
        session.did_open(uri.clone(), "html", "<p></p>".into(), 1);
        let first = session.project(&uri).unwrap();
        assert!(Arc::ptr_eq(&first, &session.project(&uri).unwrap()));

        session.did_change(&uri, "<p></p>".into(), 2);
        let second = session.project(&uri).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.version, 2);
    }

    #[test]
    fn queries_use_current_text() {
        let (session, _) = session();
        let uri = url("file:///w/index.html");
        session.did_open(uri.clone(), "html", "<p></p>".into(), 1);
        assert_eq!(session.language_at(&uri, Position::new(0, 1)).as_deref(), Some("html"));

        session.did_change(&uri, "<b onclick=\"f()\"></b>".into(), 2);
        assert_eq!(
            session.language_at(&uri, Position::new(0, 13)).as_deref(),
            Some("javascript")
        );
        let region = session.region_at(&uri, Position::new(0, 13)).unwrap();
        assert_eq!(region.role, RegionRole::AttributeValue);
        assert!(session.language_at(&url("file:///w/other.html"), Position::new(0, 0)).is_none());
    }

    #[test]
    fn matcher_changes_invalidate_projections() {
        let (session, _) = session();
        let uri = url("file:///w/index.html");
        let text = "<li k-for=\"x in xs\"></li>";
        session.did_open(uri.clone(), "html", text.into(), 1);
        assert_eq!(session.project(&uri).unwrap().regions().len(), 0);

        session.set_matchers(Matchers {
            directives: vec![Directive::exact("k-for", "javascript")],
            ..Default::default()
        });
        assert_eq!(session.project(&uri).unwrap().regions().len(), 1);
    }

    #[test]
    fn close_disposes_everything() {
        let (session, _) = session();
        let uri = url("file:///w/index.html");
        session.did_open(uri.clone(), "html", "<p></p>".into(), 1);
        session.project(&uri);

        let changes = session.did_close(&uri);
        assert_eq!(changes.closed.len(), 2);
        assert!(session.project(&uri).is_none());
        assert!(session.projections.is_empty());
        assert!(session.did_close(&uri).closed.is_empty());
    }

    #[tokio::test]
    async fn script_documents_feed_the_module_graph() {
        let (session, sink) = session();
        session.modules().register_loader(LoaderOptions::new(FnLoader(|_: &str| {
            Some("export const dep = 1;".to_string())
        })));
        let uri = url("file:///w/app.js");
        let changes = session.did_open(uri.clone(), "javascript", "import './dep.js';".into(), 1);
        assert!(changes.updated.is_empty());
        session.modules().wait_idle().await;

        assert_eq!(session.modules().state("file:///w/dep.js"), Some(ModuleState::Success));
        assert!(sink.contains("file:///w/app.js"));

        session.did_close(&uri);
        assert!(!session.modules().contains("file:///w/app.js"));
        assert!(!sink.contains("file:///w/app.js"));
    }

    #[tokio::test]
    async fn language_changes_move_documents_between_roles() {
        let (session, sink) = session();
        let uri = url("file:///w/page");
        session.did_open(uri.clone(), "html", "<p></p>".into(), 1);

        let changes = session.did_change_language(&uri, "javascript");
        assert_eq!(changes.closed.len(), 2);
        assert!(session.modules().contains("file:///w/page"));
        assert!(sink.contains("file:///w/page"));

        let changes = session.did_change_language(&uri, "html");
        assert_eq!(changes.updated.len(), 2);
        assert!(!session.modules().contains("file:///w/page"));
        assert!(session.did_change_language(&uri, "html").updated.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reopen_under_new_language_applies_new_text() {
        let (session, sink) = session();
        session.modules().register_loader(LoaderOptions::new(FnLoader(|_: &str| {
            Some("export const dep = 1;".to_string())
        })));
        let uri = url("file:///w/page");
        session.did_open(uri.clone(), "html", "<p></p>".into(), 1);

        let changes = session.did_open(uri.clone(), "javascript", "import './dep.js';".into(), 2);
        assert_eq!(changes.closed.len(), 2);
        assert!(changes.updated.is_empty());
        let doc = session.documents().get(&uri).unwrap();
        assert_eq!((doc.language_id.as_str(), doc.version), ("javascript", 2));
        let module = session.modules().get("file:///w/page").unwrap();
        assert_eq!(module.content(), Some("import './dep.js';"));
        assert!(sink.contains("file:///w/page"));

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        session.modules().wait_idle().await;
        assert_eq!(session.modules().state("file:///w/dep.js"), Some(ModuleState::Success));

        let changes = session.did_open(uri.clone(), "html", "<style>a{}</style>".into(), 3);
        assert!(!session.modules().contains("file:///w/page"));
        let css = changes
            .updated
            .iter()
            .filter(|d| d.uri.as_str().ends_with("/css"))
            .last()
            .unwrap();
        assert_eq!(css.text, "       a{}        ");
    }

    #[tokio::test]
    async fn shutdown_drops_modules_and_loader() {
        let (session, _) = session();
        session.modules().register_loader(LoaderOptions::new(FnLoader(|_: &str| {
            Some(String::new())
        })));
        let uri = url("file:///w/app.js");
        session.did_open(uri.clone(), "javascript", "import './a.js';".into(), 1);
        session.modules().wait_idle().await;
        assert!(session.modules().contains("file:///w/a.js"));

        session.shutdown();
        assert!(session.modules().is_empty());
        session.modules().open_document("file:///w/app.js", "import './b.js';".into());
        session.modules().wait_idle().await;
        assert!(!session.modules().contains("file:///w/b.js"));
    }

    #[test]
    fn virtual_uri_appends_language() {
        let host = url("file:///w/index.html");
        assert_eq!(
            virtual_uri(&host, "css").unwrap().as_str(),
            "file:///w/index.html/css"
        );
    }
}
