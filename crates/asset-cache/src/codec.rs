//! Text-safe encoding of asset bytes and cache entries
//!
//! The store only accepts strings, so payloads travel as standard base64 inside
//! a JSON record `{ payload, createdAt, sourceUrl }`.

use crate::error::CodecError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Encode raw asset bytes as text
pub fn encode_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode text produced by [`encode_payload`]
pub fn decode_payload(text: &str) -> Result<Vec<u8>, CodecError> {
    Ok(STANDARD.decode(text)?)
}

/// The unit stored per cache key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Base64-encoded asset bytes
    pub payload: String,
    /// Write time in epoch milliseconds
    pub created_at: i64,
    pub source_url: String,
}

impl CacheEntry {
    pub fn new(bytes: &[u8], created_at: i64, source_url: &str) -> Self {
        Self {
            payload: encode_payload(bytes),
            created_at,
            source_url: source_url.to_string(),
        }
    }

    pub fn payload_bytes(&self) -> Result<Vec<u8>, CodecError> {
        decode_payload(&self.payload)
    }

    /// Serialize to the exact string that will be written to the store
    pub fn encode(&self) -> Result<EncodedEntry, CodecError> {
        Ok(EncodedEntry(serde_json::to_string(self)?))
    }

    pub fn decode(value: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(value)?)
    }
}

/// A serialized entry; its length is the size the store will account for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEntry(String);

impl EncodedEntry {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Size in bytes of the serialized value
    pub fn size(&self) -> u64 {
        self.0.len() as u64
    }
}
