pub mod html;
pub mod tree;
pub mod xml;

pub use tree::{DocNode, DocTree, NodeId};

use crate::error::ParseError;
use crate::types::Dialect;

/// Build a navigable tree from raw bytes and a declared dialect.
pub fn parse(bytes: &[u8], dialect: Dialect) -> Result<DocTree, ParseError> {
    let text = decode_bytes(bytes);
    match dialect {
        Dialect::InstanceXml => xml::parse_instance(&text),
        Dialect::InlineHtml => Ok(html::parse_inline(&text)),
    }
}

/// Decode a byte buffer using charset detection, falling back to UTF-8.
pub fn decode_bytes(bytes: &[u8]) -> String {
    let charenc = chardet::detect(bytes).0;
    let encoding =
        encoding_rs::Encoding::for_label(charenc.as_bytes()).unwrap_or(encoding_rs::UTF_8);
    let (decoded, actual, had_errors) = encoding.decode(bytes);
    if had_errors {
        log::debug!("lossy decode from {}", actual.name());
    }
    decoded.into_owned()
}
