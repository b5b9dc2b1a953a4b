//! Per-frame arena for synthesized buffers.
//!
//! Decoded strings, decompressed bodies, and other transform outputs
//! produced while dissecting one frame are owned here and release together
//! when the frame's output is dropped. A view handed out by the arena holds
//! a refcount on its buffer, so nothing dangles if the caller keeps a node
//! alive longer than the arena itself.

use std::io::Read;

use bytes::Bytes;
use flate2::read::GzDecoder;

use super::ByteView;
use crate::error::DissectError;

/// Cap on a single inflated transform output. Crafted compressed data can
/// claim enormous expansion; stop decoding once the cap is hit.
const MAX_INFLATED_LEN: usize = 16 * 1024 * 1024;

/// Owns every buffer synthesized while dissecting one frame.
#[derive(Debug, Default)]
pub struct FrameArena {
    decoded: Vec<Bytes>,
}

impl FrameArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move decoded bytes into the arena and hand back a view over them.
    pub fn alloc(&mut self, data: Vec<u8>) -> ByteView {
        let bytes = Bytes::from(data);
        self.decoded.push(bytes.clone());
        ByteView::new(bytes)
    }

    /// Inflate a gzip-compressed region into a synthesized view.
    ///
    /// The output is bounded by an internal cap so adversarial input cannot
    /// force unbounded allocation; exceeding it is reported as malformed.
    pub fn alloc_gzip(
        &mut self,
        protocol: &'static str,
        compressed: &ByteView,
    ) -> Result<ByteView, DissectError> {
        let raw = compressed.get_bytes(0, compressed.captured_len())?;
        let mut decoder = GzDecoder::new(&raw[..]).take(MAX_INFLATED_LEN as u64 + 1);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| DissectError::Malformed {
                protocol,
                reason: format!("gzip decode failed: {e}"),
            })?;
        if out.len() > MAX_INFLATED_LEN {
            return Err(DissectError::Malformed {
                protocol,
                reason: format!("gzip output exceeds {MAX_INFLATED_LEN} byte cap"),
            });
        }
        Ok(self.alloc(out))
    }

    /// Total bytes currently held by the arena.
    pub fn decoded_bytes(&self) -> usize {
        self.decoded.iter().map(Bytes::len).sum()
    }

    /// Number of synthesized buffers.
    pub fn buffer_count(&self) -> usize {
        self.decoded.len()
    }

    /// Drop all buffers. Views handed out earlier stay valid through their
    /// own refcounts; the arena simply stops keeping them alive.
    pub fn reset(&mut self) {
        self.decoded.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_alloc_and_reset() {
        let mut arena = FrameArena::new();
        let view = arena.alloc(vec![1, 2, 3, 4]);
        assert_eq!(arena.buffer_count(), 1);
        assert_eq!(arena.decoded_bytes(), 4);

        arena.reset();
        assert_eq!(arena.buffer_count(), 0);
        // The view outlives the reset via its own refcount
        assert_eq!(view.get_u8(3).unwrap(), 4);
    }

    #[test]
    fn test_gzip_roundtrip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"decoded payload").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut arena = FrameArena::new();
        let view = ByteView::from_slice(&compressed);
        let inflated = arena.alloc_gzip("test", &view).unwrap();
        assert_eq!(
            &inflated.get_bytes(0, inflated.captured_len()).unwrap()[..],
            b"decoded payload"
        );
    }

    #[test]
    fn test_gzip_garbage_is_malformed_not_panic() {
        let mut arena = FrameArena::new();
        let view = ByteView::from_slice(&[0x1f, 0x8b, 0xff, 0xff, 0x00]);
        let err = arena.alloc_gzip("test", &view).unwrap_err();
        assert!(matches!(err, DissectError::Malformed { .. }));
    }
}
