//! Module registry and dependency resolution.
//!
//! Modules are keyed by canonical key. Resolving a module walks the import
//! specifiers of its AST and loads every dependency still in
//! [`ModuleState::Created`]. Each key leaves `Created` at most once, which is
//! what stops cycles and double loads.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Notify;

use crate::error::{Error, Result};

use super::imports::{ImportSpecifier, ScriptAst};
use super::key::{encoded_alias, has_extension, is_relative, module_key};
use super::loader::LoaderOptions;
use super::schedule::ScheduledTask;
use super::sink::DeclarationSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleState {
    Created,
    Loading,
    Success,
    Error,
}

/// A script module known to the graph.
#[derive(Debug, Clone)]
pub struct Module {
    uri: String,
    content: Option<String>,
    state: ModuleState,
    ast: Option<Arc<ScriptAst>>,
    generation: u64,
}

impl Module {
    fn new(uri: String, generation: u64) -> Self {
        Self {
            uri,
            content: None,
            state: ModuleState::Created,
            ast: None,
            generation,
        }
    }

    fn assign(&mut self, content: String, ast: Option<Arc<ScriptAst>>) {
        self.content = Some(content);
        self.ast = ast;
        self.state = ModuleState::Success;
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn ast(&self) -> Option<&ScriptAst> {
        self.ast.as_deref()
    }

    /// Import specifier values, empty without an AST.
    pub fn imports(&self) -> Vec<String> {
        self.ast()
            .map(|ast| ast.imports().iter().map(|s| s.value.clone()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct GraphOptions {
    /// Quiet period after an edit before dependencies are re-resolved.
    pub debounce: Duration,
    /// Let an edited importer retry dependencies that failed to load.
    pub retry_failed_on_edit: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1000),
            retry_failed_on_edit: false,
        }
    }
}

struct Inner {
    modules: DashMap<String, Module>,
    schedules: DashMap<String, ScheduledTask>,
    loader: RwLock<Option<LoaderOptions>>,
    options: RwLock<GraphOptions>,
    sink: Arc<dyn DeclarationSink>,
    generations: AtomicU64,
    pending: AtomicUsize,
    idle: Notify,
}

/// Registry of modules. Cloning shares the registry.
#[derive(Clone)]
pub struct ModuleGraph {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ModuleGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleGraph")
            .field("modules", &self.inner.modules.len())
            .field("pending", &self.inner.pending.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl ModuleGraph {
    pub fn new(sink: Arc<dyn DeclarationSink>, options: GraphOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                modules: DashMap::new(),
                schedules: DashMap::new(),
                loader: RwLock::new(None),
                options: RwLock::new(options),
                sink,
                generations: AtomicU64::new(0),
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    pub fn set_options(&self, options: GraphOptions) {
        *self.inner.options.write() = options;
    }

    /// Install the loader used for dependencies, replacing any previous one.
    pub fn register_loader(&self, loader: LoaderOptions) {
        tracing::debug!(?loader, "registered module loader");
        *self.inner.loader.write() = Some(loader);
    }

    pub fn unregister_loader(&self) {
        *self.inner.loader.write() = None;
    }

    fn next_generation(&self) -> u64 {
        self.inner.generations.fetch_add(1, Ordering::SeqCst)
    }

    /// Register `key`, replacing any module already there. With content the
    /// module is parsed and published right away.
    pub fn create_module(&self, key: &str, content: Option<String>) {
        let module = Module::new(key.to_string(), self.next_generation());
        self.inner.modules.insert(key.to_string(), module);
        tracing::trace!(key, "created module");
        if let Some(content) = content {
            self.set_content(key, content);
        }
    }

    /// Assign new content: re-parse, move to `Success` and publish.
    ///
    /// Returns false when `key` is not registered.
    pub fn set_content(&self, key: &str, content: String) -> bool {
        let ast = ScriptAst::parse(&content).map(Arc::new);
        {
            let Some(mut module) = self.inner.modules.get_mut(key) else {
                return false;
            };
            module.assign(content.clone(), ast);
        }
        self.publish(key, &content);
        true
    }

    fn publish(&self, key: &str, content: &str) {
        self.inner.sink.publish(key, content);
        if let Some(alias) = encoded_alias(key) {
            self.inner.sink.publish(&alias, content);
        }
    }

    fn retract(&self, key: &str) {
        self.inner.sink.retract(key);
        if let Some(alias) = encoded_alias(key) {
            self.inner.sink.retract(&alias);
        }
    }

    /// Track an opened script document and resolve its imports at once.
    pub fn open_document(&self, key: &str, content: String) {
        if !self.set_content(key, content.clone()) {
            self.create_module(key, Some(content));
        }
        self.resolve_modules(key);
    }

    /// Record an edit and schedule a debounced re-resolution.
    pub fn edit_document(&self, key: &str, content: String) {
        if !self.set_content(key, content.clone()) {
            self.create_module(key, Some(content));
        }
        self.schedule_resolution(key);
    }

    /// Re-resolve `key` once edits have been quiet for the debounce period.
    pub fn schedule_resolution(&self, key: &str) {
        let (delay, retry_failed) = {
            let options = self.inner.options.read();
            (options.debounce, options.retry_failed_on_edit)
        };
        let graph = self.clone();
        let owned = key.to_string();
        self.inner
            .schedules
            .entry(key.to_string())
            .or_default()
            .arm(delay, async move {
                graph.resolve(&owned, retry_failed);
            });
    }

    /// Load every dependency of `key` that is still unresolved.
    pub fn resolve_modules(&self, key: &str) {
        self.resolve(key, false);
    }

    fn resolve(&self, key: &str, retry_failed: bool) {
        let specifiers = match self.inner.modules.get(key) {
            Some(module) => module.imports(),
            None => return,
        };
        for specifier in specifiers {
            self.resolve_module(&specifier, key, retry_failed);
        }
    }

    fn resolve_module(&self, specifier: &str, importer: &str, retry_failed: bool) {
        let Some(key) = module_key(specifier, importer) else {
            return;
        };
        let Some(options) = self.inner.loader.read().clone() else {
            tracing::trace!(key, "no module loader registered");
            return;
        };

        let generation = {
            let mut module = self
                .inner
                .modules
                .entry(key.clone())
                .or_insert_with(|| Module::new(key.clone(), self.next_generation()));
            match module.state {
                ModuleState::Created => {}
                ModuleState::Error if retry_failed => {
                    tracing::debug!(key, "retrying failed module");
                }
                _ => return,
            }
            module.state = ModuleState::Loading;
            module.generation
        };

        if options.only_emit_for_extensioned && is_relative(specifier) && !has_extension(specifier) {
            tracing::debug!(key, specifier, "skipping specifier without extension");
            self.fail(&key, generation, &Error::load(&key, "specifier has no extension"));
            return;
        }

        tracing::debug!(key, importer, "loading module");
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        let graph = self.clone();
        tokio::spawn(async move {
            let result = options.loader.load(&key).await;
            graph.finish_load(&key, generation, result);
            graph.release();
        });
    }

    fn finish_load(&self, key: &str, generation: u64, result: Result<Option<String>>) {
        let content = match result {
            Ok(Some(content)) => content,
            Ok(None) => {
                self.fail(key, generation, &Error::load(key, "unresolvable"));
                return;
            }
            Err(e) => {
                self.fail(key, generation, &e);
                return;
            }
        };

        let ast = ScriptAst::parse(&content).map(Arc::new);
        {
            let Some(mut module) = self.live(key, generation) else {
                tracing::debug!(key, "discarding stale load result");
                return;
            };
            module.assign(content.clone(), ast);
        }
        tracing::debug!(key, "module loaded");
        self.publish(key, &content);
        self.resolve_modules(key);
    }

    fn fail(&self, key: &str, generation: u64, error: &Error) {
        match self.live(key, generation) {
            Some(mut module) => {
                tracing::warn!(key, error = %error, "module failed to load");
                module.state = ModuleState::Error;
            }
            None => tracing::debug!(key, "discarding stale load failure"),
        }
    }

    /// The module for `key` if it is the same registration that started the
    /// load and is still waiting on it.
    fn live(
        &self,
        key: &str,
        generation: u64,
    ) -> Option<dashmap::mapref::one::RefMut<'_, String, Module>> {
        self.inner
            .modules
            .get_mut(key)
            .filter(|m| m.generation == generation && m.state == ModuleState::Loading)
    }

    fn release(&self) {
        if self.inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }

    /// Wait until no loads are in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Drop `key`, cancel its pending resolution and retract its declarations.
    pub fn remove_module(&self, key: &str) -> bool {
        if let Some((_, mut task)) = self.inner.schedules.remove(key) {
            task.cancel();
        }
        if self.inner.modules.remove(key).is_none() {
            return false;
        }
        self.retract(key);
        tracing::trace!(key, "removed module");
        true
    }

    /// Drop every module.
    pub fn remove_modules(&self) {
        self.inner.schedules.clear();
        let keys: Vec<String> = self.keys();
        for key in keys {
            if self.inner.modules.remove(&key).is_some() {
                self.retract(&key);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Module> {
        self.inner.modules.get(key).map(|m| m.clone())
    }

    pub fn state(&self, key: &str) -> Option<ModuleState> {
        self.inner.modules.get(key).map(|m| m.state)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.modules.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.modules.iter().map(|m| m.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.modules.is_empty()
    }

    /// The import specifier of `key` enclosing `offset`.
    pub fn specifier_at(&self, key: &str, offset: usize) -> Option<ImportSpecifier> {
        let module = self.inner.modules.get(key)?;
        module.ast()?.specifier_at(offset).cloned()
    }
}
