//! Destination for module type information.
//!
//! Loaded module content is published to the script language engine so it
//! can resolve imports. Retraction happens when a module is removed.

use dashmap::DashMap;

/// Receives declarations published for module uris.
pub trait DeclarationSink: Send + Sync {
    fn publish(&self, uri: &str, content: &str);
    fn retract(&self, uri: &str);
}

/// Keeps published declarations in memory.
#[derive(Debug, Default)]
pub struct DeclarationMap {
    declarations: DashMap<String, String>,
}

impl DeclarationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uri: &str) -> Option<String> {
        self.declarations.get(uri).map(|r| r.clone())
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.declarations.contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

impl DeclarationSink for DeclarationMap {
    fn publish(&self, uri: &str, content: &str) {
        self.declarations.insert(uri.to_string(), content.to_string());
    }

    fn retract(&self, uri: &str) {
        self.declarations.remove(uri);
    }
}
