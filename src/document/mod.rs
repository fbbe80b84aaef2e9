//! Host document projection.
//!
//! This module provides:
//! - `LineIndex` for byte offset <-> LSP position conversion
//! - `RegionScanner` for finding embedded style and script regions in markup
//! - `synthesize` for building position-preserving virtual documents
//! - `DocumentRegions`, the cached projection answering language queries
//! - `VersionedCache` and `DocumentStore` for document lifecycle management

mod cache;
mod matcher;
mod projection;
mod region;
mod scanner;
mod state;
mod synthesize;
mod text;

pub use cache::VersionedCache;
pub use matcher::{AttributeMatcher, ContentMatcher, Directive, Matchers};
pub use projection::DocumentRegions;
pub use region::{languages, AppendContent, EmbeddedRegion, LanguageRange, RegionRole};
pub use scanner::{tokenize, RegionScanner, ScanResult, Token, TokenKind};
pub use state::{DocumentStore, OpenDocument};
pub use synthesize::{synthesize, CSS_STYLE_RULE};
pub use text::LineIndex;
