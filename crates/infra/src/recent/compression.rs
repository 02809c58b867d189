//! Compact payload encoding for the recent store.
//!
//! A degraded payload is gzip-compressed JSON, base64-encoded and prefixed
//! with [`COMPRESSED_MARKER`] so `load` can tell it apart from plain JSON.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Prefix of compressed payloads. Plain JSON payloads always start with `[`.
pub const COMPRESSED_MARKER: &str = "gz:";

/// Gzip encoder for recent-store payloads.
#[derive(Debug, Clone, Copy)]
pub struct PayloadCodec {
    level: u32,
}

impl PayloadCodec {
    /// Codec at gzip `level`, capped at 9.
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }

    /// Compress `json` into a marked, text-safe payload.
    pub fn compress(&self, json: &str) -> std::io::Result<String> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(json.as_bytes())?;
        let compressed = encoder.finish()?;

        let mut payload = String::with_capacity(COMPRESSED_MARKER.len() + compressed.len() * 4 / 3 + 4);
        payload.push_str(COMPRESSED_MARKER);
        STANDARD.encode_string(compressed, &mut payload);
        Ok(payload)
    }

    /// Return the JSON text of a payload, decompressing marked payloads.
    pub fn decode(&self, payload: &str) -> std::io::Result<String> {
        let Some(encoded) = payload.strip_prefix(COMPRESSED_MARKER) else {
            return Ok(payload.to_string());
        };

        let compressed = STANDARD
            .decode(encoded)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;

        let mut json = String::new();
        GzDecoder::new(compressed.as_slice()).read_to_string(&mut json)?;
        Ok(json)
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new(9)
    }
}
