//! Open document state.

use std::sync::Arc;

use dashmap::DashMap;
use tower_lsp::lsp_types::Url;

use super::region::languages;

/// A document as last reported by the client.
#[derive(Debug, Clone)]
pub struct OpenDocument {
    pub uri: Url,
    pub language_id: String,
    /// Document version from the client.
    pub version: i32,
    pub text: String,
}

impl OpenDocument {
    pub fn is_script(&self) -> bool {
        languages::is_script(&self.language_id)
    }
}

/// Thread-safe storage for open documents, one slot per uri.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: DashMap<Url, Arc<OpenDocument>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Open or replace a document.
    pub fn open(&self, uri: Url, language_id: &str, text: String, version: i32) -> Arc<OpenDocument> {
        let doc = Arc::new(OpenDocument {
            uri: uri.clone(),
            language_id: language_id.to_string(),
            version,
            text,
        });
        self.documents.insert(uri, Arc::clone(&doc));
        doc
    }

    /// Replace the text of an open document, keeping its language.
    pub fn update(&self, uri: &Url, text: String, version: i32) -> Option<Arc<OpenDocument>> {
        let mut entry = self.documents.get_mut(uri)?;
        let doc = Arc::new(OpenDocument {
            uri: uri.clone(),
            language_id: entry.language_id.clone(),
            version,
            text,
        });
        *entry = Arc::clone(&doc);
        Some(doc)
    }

    /// Change a document's language, returning the previous language and the
    /// updated document.
    pub fn set_language(&self, uri: &Url, language_id: &str) -> Option<(String, Arc<OpenDocument>)> {
        let mut entry = self.documents.get_mut(uri)?;
        let old = entry.language_id.clone();
        let doc = Arc::new(OpenDocument {
            language_id: language_id.to_string(),
            ..OpenDocument::clone(&entry)
        });
        *entry = Arc::clone(&doc);
        Some((old, doc))
    }

    pub fn close(&self, uri: &Url) -> Option<Arc<OpenDocument>> {
        self.documents.remove(uri).map(|(_, doc)| doc)
    }

    pub fn get(&self, uri: &Url) -> Option<Arc<OpenDocument>> {
        self.documents.get(uri).map(|r| Arc::clone(&r))
    }

    /// Whether `uri` is still open at `version`.
    pub fn is_current(&self, uri: &Url, version: i32) -> bool {
        self.documents
            .get(uri)
            .is_some_and(|doc| doc.version == version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> Url {
        Url::parse("file:///site/index.html").unwrap()
    }

    #[test]
    fn update_keeps_language() {
        let store = DocumentStore::new();
        store.open(uri(), "html", "<p></p>".into(), 1);
        let doc = store.update(&uri(), "<div></div>".into(), 2).unwrap();
        assert_eq!(doc.language_id, "html");
        assert_eq!(doc.version, 2);
        assert!(store.is_current(&uri(), 2));
        assert!(!store.is_current(&uri(), 1));
    }

    #[test]
    fn update_of_unknown_document_is_ignored() {
        let store = DocumentStore::new();
        assert!(store.update(&uri(), "x".into(), 1).is_none());
    }

    #[test]
    fn set_language_reports_previous() {
        let store = DocumentStore::new();
        store.open(uri(), "html", "x".into(), 1);
        let (old, doc) = store.set_language(&uri(), "javascript").unwrap();
        assert_eq!(old, "html");
        assert!(doc.is_script());
        assert_eq!(doc.text, "x");
    }

    #[test]
    fn close_removes() {
        let store = DocumentStore::new();
        store.open(uri(), "html", "x".into(), 1);
        assert!(store.close(&uri()).is_some());
        assert!(store.get(&uri()).is_none());
        assert!(!store.is_current(&uri(), 1));
    }
}
