//! Global index properties, stored as `properties.json`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::CodecKind;
use crate::error::{Error, Result};

/// Scalar properties of an index directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Properties {
    /// Number of documents in the collection.
    pub documents: u32,
    /// Total number of term occurrences across the collection.
    pub occurrences: u64,
    /// Postings per skip block in every block-encoded list.
    pub skip_block_size: u32,
    /// Average document length in tokens.
    pub avg_document_size: f64,
    /// Length of the longest term, in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_maxlen: Option<u32>,
    /// Codec used for posting blobs; varbyte when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
}

impl Properties {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Malformed(format!("properties.json: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::parse(&bytes)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Malformed(format!("properties.json: {}", e)))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// The posting-blob codec this index was built with.
    pub fn codec_kind(&self) -> Result<CodecKind> {
        match &self.codec {
            Some(name) => CodecKind::from_name(name),
            None => Ok(CodecKind::VarByte),
        }
    }
}
