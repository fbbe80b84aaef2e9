//! Custom protocol extensions.
//!
//! Requests let a client ask which language governs a position and fetch
//! virtual documents. Notifications push virtual documents and module
//! declarations to the client as they change.

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::{Position, Range, Url};

use crate::document::RegionRole;

pub const EMBEDDED_DOCUMENT: &str = "htmlsp/embeddedDocument";
pub const LANGUAGE_AT: &str = "htmlsp/languageAt";
pub const LANGUAGE_RANGES: &str = "htmlsp/languageRanges";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedDocumentParams {
    pub uri: Url,
    pub language_id: String,
    #[serde(default)]
    pub ignore_attribute_values: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageAtParams {
    pub uri: Url,
    pub position: Position,
}

/// Language governing a position. `role` is absent in host text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageAtResult {
    pub language_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<RegionRole>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageRangesParams {
    pub uri: Url,
    /// Whole document when absent.
    #[serde(default)]
    pub range: Option<Range>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualDocumentParams {
    pub uri: Url,
    pub host_uri: Url,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualDocumentClosedParams {
    pub uri: Url,
}

/// Module content for the script engine; empty content retracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishDeclarationsParams {
    pub uri: String,
    pub content: String,
}

pub enum VirtualDocumentUpdated {}

impl Notification for VirtualDocumentUpdated {
    type Params = VirtualDocumentParams;
    const METHOD: &'static str = "htmlsp/virtualDocument";
}

pub enum VirtualDocumentClosed {}

impl Notification for VirtualDocumentClosed {
    type Params = VirtualDocumentClosedParams;
    const METHOD: &'static str = "htmlsp/virtualDocumentClosed";
}

pub enum PublishDeclarations {}

impl Notification for PublishDeclarations {
    type Params = PublishDeclarationsParams;
    const METHOD: &'static str = "htmlsp/publishDeclarations";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_use_camel_case() {
        let params: EmbeddedDocumentParams = serde_json::from_value(serde_json::json!({
            "uri": "file:///a.html",
            "languageId": "css",
        }))
        .unwrap();
        assert_eq!(params.language_id, "css");
        assert!(!params.ignore_attribute_values);

        let result = LanguageAtResult {
            language_id: Some("css".into()),
            role: Some(RegionRole::AttributeValue),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({ "languageId": "css", "role": "attributeValue" })
        );
    }
}
