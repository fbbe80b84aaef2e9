//! Handlers for the custom requests, independent of the transport.

use crate::document::LanguageRange;
use crate::session::{Session, VirtualDocument};

use super::protocol::{
    EmbeddedDocumentParams, LanguageAtParams, LanguageAtResult, LanguageRangesParams,
    VirtualDocumentParams,
};

pub fn embedded_document(session: &Session, params: &EmbeddedDocumentParams) -> Option<String> {
    session.embedded_document(
        &params.uri,
        &params.language_id,
        params.ignore_attribute_values,
    )
}

pub fn language_at(session: &Session, params: &LanguageAtParams) -> Option<LanguageAtResult> {
    let regions = session.project(&params.uri)?;
    let offset = regions.line_index().offset_at_clamped(params.position);
    Some(match regions.region_at(offset) {
        Some(region) => LanguageAtResult {
            language_id: region.language_id.clone(),
            role: Some(region.role),
        },
        None => LanguageAtResult {
            language_id: Some(regions.host_language().to_string()),
            role: None,
        },
    })
}

pub fn language_ranges(
    session: &Session,
    params: &LanguageRangesParams,
) -> Option<Vec<LanguageRange>> {
    let regions = session.project(&params.uri)?;
    Some(match params.range {
        Some(range) => regions.language_ranges(range),
        None => regions.all_language_ranges(),
    })
}

impl From<VirtualDocument> for VirtualDocumentParams {
    fn from(doc: VirtualDocument) -> Self {
        Self {
            uri: doc.uri,
            host_uri: doc.host,
            language_id: doc.language_id,
            version: doc.version,
            text: doc.text,
        }
    }
}
