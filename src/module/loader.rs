//! Module loaders.
//!
//! A loader turns a canonical module key into source text. Loaders must be
//! idempotent: the graph asks for each key at most once per registration.

use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use tower_lsp::lsp_types::Url;

use crate::error::{Error, Result};

use super::key::TYPES_NAMESPACE;

/// Resolves module keys to source text.
#[tower_lsp::async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Source for `key`, or `None` when the key cannot be resolved.
    async fn load(&self, key: &str) -> Result<Option<String>>;
}

/// Adapts a synchronous closure into a loader.
pub struct FnLoader<F>(pub F);

#[tower_lsp::async_trait]
impl<F> ModuleLoader for FnLoader<F>
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok((self.0)(key))
    }
}

/// A registered loader and how it is applied.
#[derive(Clone)]
pub struct LoaderOptions {
    /// Skip relative specifiers whose file name has no extension.
    pub only_emit_for_extensioned: bool,
    pub loader: Arc<dyn ModuleLoader>,
}

impl LoaderOptions {
    pub fn new(loader: impl ModuleLoader + 'static) -> Self {
        Self {
            only_emit_for_extensioned: false,
            loader: Arc::new(loader),
        }
    }

    pub fn only_emit_for_extensioned(mut self, enabled: bool) -> Self {
        self.only_emit_for_extensioned = enabled;
        self
    }
}

impl fmt::Debug for LoaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderOptions")
            .field("only_emit_for_extensioned", &self.only_emit_for_extensioned)
            .finish_non_exhaustive()
    }
}

/// Reads `file://` modules from disk.
///
/// Keys in the external declaration namespace are looked up under
/// `types_root`; without one they are unresolvable.
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    types_root: Option<PathBuf>,
}

impl FsLoader {
    pub fn new(types_root: Option<PathBuf>) -> Self {
        Self { types_root }
    }

    fn path_for(&self, key: &str) -> Result<Option<PathBuf>> {
        if let Some(rest) = key.strip_prefix(TYPES_NAMESPACE) {
            return Ok(self.types_root.as_ref().map(|root| root.join(rest)));
        }
        let url = Url::parse(key).map_err(|_| Error::InvalidUri(key.to_string()))?;
        if url.scheme() != "file" {
            return Ok(None);
        }
        url.to_file_path()
            .map(Some)
            .map_err(|_| Error::InvalidUri(key.to_string()))
    }
}

#[tower_lsp::async_trait]
impl ModuleLoader for FsLoader {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let Some(path) = self.path_for(key)? else {
            return Ok(None);
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
