//! Brotli codec for stored share blobs.

use std::io::Read;

use brotli::enc::BrotliEncoderParams;

use crate::Error;

const BUFFER_SIZE: usize = 4096;
const WINDOW_BITS: i32 = 22;

/// Default Brotli quality, the maximum.
pub const DEFAULT_QUALITY: u32 = 11;

/// Reversible byte compressor used for every share blob.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    quality: u32,
}

impl Default for Codec {
    fn default() -> Self {
        Self { quality: DEFAULT_QUALITY }
    }
}

impl Codec {
    pub fn new(quality: u32) -> Self {
        Self { quality: quality.min(DEFAULT_QUALITY) }
    }

    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>, Error> {
        let params = BrotliEncoderParams {
            quality: self.quality as i32,
            lgwin: WINDOW_BITS,
            size_hint: input.len(),
            ..Default::default()
        };
        let mut out = Vec::with_capacity(input.len() / 2 + 16);
        brotli::BrotliCompress(&mut &input[..], &mut out, &params)
            .map_err(|e| Error::Compression(format!("brotli: {e}")))?;
        Ok(out)
    }

    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(input.len() * 3);
        brotli::Decompressor::new(input, BUFFER_SIZE)
            .read_to_end(&mut out)
            .map_err(|e| Error::CorruptBlob(format!("brotli: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle_json() -> String {
        serde_json::json!({
            "v": 1,
            "format": "grid2d@1",
            "schema_src": "schema { input { string :name } }",
            "schema_hash": "abc123",
            "compiler_version": "1",
            "artifact_hash": "def456",
            "js_src": "console.log('test')",
            "metadata": { "palette": { "0": "#fff", "1": "#000" }, "cellSize": 10 }
        })
        .to_string()
    }

    #[test]
    fn test_roundtrip_empty() {
        let codec = Codec::default();
        let packed = codec.compress(b"").unwrap();
        assert!(!packed.is_empty());
        assert_eq!(codec.decompress(&packed).unwrap(), b"");
    }

    #[test]
    fn test_roundtrip_binary() {
        let codec = Codec::default();
        let binary: Vec<u8> = (0..=255u8).collect();
        assert_eq!(codec.decompress(&codec.compress(&binary).unwrap()).unwrap(), binary);
    }

    #[test]
    fn test_roundtrip_large_bundle() {
        let codec = Codec::new(5);
        let items: Vec<_> = (0..1000).map(|i| serde_json::json!({ "id": i, "data": "x".repeat(100) })).collect();
        let large = serde_json::json!({ "items": items }).to_string();
        assert_eq!(codec.decompress(&codec.compress(large.as_bytes()).unwrap()).unwrap(), large.as_bytes());
    }

    #[test]
    fn test_reduces_json_size() {
        let codec = Codec::default();
        let json = bundle_json();
        let packed = codec.compress(json.as_bytes()).unwrap();
        assert!(packed.len() < json.len(), "{} -> {}", json.len(), packed.len());

        let rows: Vec<_> = (0..50).map(|i| serde_json::json!({ "row": i, "cells": [0, 1, 0, 1, 1, 0] })).collect();
        let grid = serde_json::json!({ "format": "grid2d@1", "rows": rows }).to_string();
        let packed = codec.compress(grid.as_bytes()).unwrap();
        assert!(packed.len() * 10 <= grid.len() * 8, "{} -> {}", grid.len(), packed.len());
    }

    #[test]
    fn test_garbage_is_corrupt_blob() {
        let codec = Codec::default();
        assert!(matches!(codec.decompress(b"this is not brotli"), Err(Error::CorruptBlob(_))));

        let packed = codec.compress(bundle_json().as_bytes()).unwrap();
        let truncated = &packed[..packed.len() / 2];
        assert!(matches!(codec.decompress(truncated), Err(Error::CorruptBlob(_))));
    }

    #[test]
    fn test_quality_clamped() {
        let codec = Codec::new(99);
        assert_eq!(codec.quality, DEFAULT_QUALITY);
    }
}
