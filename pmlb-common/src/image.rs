//! Image payload handling
//!
//! Decodes `data:<mime>;base64,<payload>` URLs into raw bytes and computes the
//! canonical content hash used as the deduplication key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

static DATA_URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^data:[^;]+;base64,.+").expect("data URL pattern is valid"));

static HASH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-f0-9]{32,128}$").expect("hash pattern is valid"));

/// Decoded image bytes with their MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    /// Canonical SHA-256 content hash of the decoded bytes
    pub fn content_hash(&self) -> String {
        content_hash(&self.bytes)
    }

    /// Re-encode as a base64 data URL
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// True when the string has the shape of a base64 data URL
pub fn is_data_url(value: &str) -> bool {
    DATA_URL_PATTERN.is_match(value)
}

/// True when the string looks like a hex content hash
pub fn is_content_hash(value: &str) -> bool {
    HASH_PATTERN.is_match(value)
}

/// Lowercase hex SHA-256 of raw image bytes
///
/// Depends only on the bytes, never on the data-URL header or encoding.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Parse and validate a base64 image data URL
///
/// **Algorithm:**
/// 1. Check the `data:<mime>;base64,` shape
/// 2. Decode the base64 part (surrounding whitespace tolerated)
/// 3. Require non-empty bytes that sniff as an image
pub fn parse_data_url(value: &str) -> Result<ImagePayload> {
    if !is_data_url(value) {
        return Err(Error::InvalidInput(
            "'imageDataUrl' must be a base64 data URL (data:<mime>;base64,...)".to_string(),
        ));
    }

    let (header, payload) = value
        .split_once(',')
        .ok_or_else(|| Error::InvalidInput("data URL has no payload".to_string()))?;

    let declared_mime = header
        .strip_prefix("data:")
        .and_then(|h| h.split(';').next())
        .map(str::trim)
        .unwrap_or_default();

    let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| Error::InvalidInput(format!("image payload is not valid base64: {}", e)))?;

    if bytes.is_empty() {
        return Err(Error::InvalidInput("image payload is empty".to_string()));
    }

    let sniffed = infer::get(&bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .ok_or_else(|| Error::InvalidInput("payload is not a recognised image format".to_string()))?;

    let mime = if declared_mime.is_empty() {
        sniffed.mime_type().to_string()
    } else {
        declared_mime.to_string()
    };

    tracing::debug!(mime = %mime, sniffed = sniffed.mime_type(), bytes = bytes.len(), "Decoded image payload");

    Ok(ImagePayload { mime, bytes })
}
