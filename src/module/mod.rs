//! Script module tracking.
//!
//! - `key` normalizes specifiers into canonical module keys
//! - `imports` parses scripts and extracts import specifiers
//! - `loader` resolves keys to source text
//! - `sink` receives published declarations
//! - `graph` holds the registry and drives resolution

mod graph;
mod imports;
mod key;
mod loader;
mod schedule;
mod sink;

pub use graph::{GraphOptions, Module, ModuleGraph, ModuleState};
pub use imports::{ImportSpecifier, ScriptAst};
pub use key::{document_key, encoded_alias, module_key, TYPES_NAMESPACE};
pub use loader::{FnLoader, FsLoader, LoaderOptions, ModuleLoader};
pub use schedule::ScheduledTask;
pub use sink::{DeclarationMap, DeclarationSink};
