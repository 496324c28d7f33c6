use crate::parsing::tree::DocTree;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    /// No tree buildable even with recovery. `recovered` carries whatever
    /// partial tree the lenient pass managed to assemble.
    #[error("malformed document: {reason}")]
    MalformedDocument {
        reason: String,
        recovered: Option<DocTree>,
    },
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("profile store failure: {0}")]
    Store(String),
    #[error("profile serialization failure: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<sled::Error> for RegistryError {
    fn from(e: sled::Error) -> Self {
        RegistryError::Store(e.to_string())
    }
}
