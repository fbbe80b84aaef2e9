//! LSP protocol surface.
//!
//! This module provides:
//! - Custom request and notification types under the `htmlsp/` namespace
//! - Transport-independent handlers for the custom requests
//! - A declaration sink forwarding module content to the client

mod declarations;
mod protocol;
mod requests;

pub use declarations::{ClientSink, DeclarationForwarder};
pub use protocol::*;
pub use requests::{embedded_document, language_at, language_ranges};
