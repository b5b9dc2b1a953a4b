//! Capture input: format sniffing, decompression and frame extraction.
//!
//! Components:
//! - [`Frame`]: one captured frame handed to dissection
//! - [`Compression`]: magic-byte detection for compressed captures
//! - [`FormatSniffer`] / [`OpenRoutine`]: priority-ordered format probing
//! - [`CaptureReader`]: pcap/pcapng frame stream over any `Read` source

mod reader;
mod sniff;

pub use reader::{CaptureFormat, CaptureReader};
pub use sniff::{FormatSniffer, OpenRoutine, Probe, SNIFF_HEAD_LEN};

use crate::buffer::ByteView;

/// One captured frame, ready for dissection.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame number within the capture, starting at 1.
    pub frame_number: u64,
    /// Capture timestamp in microseconds since the epoch.
    pub timestamp_micros: i64,
    /// Link-layer type from the capture header (e.g. 1 = Ethernet).
    pub link_type: u16,
    /// Frame bytes. `reported_len` carries the on-the-wire length when the
    /// capture was truncated by a snaplen.
    pub data: ByteView,
}

impl Frame {
    /// Bytes actually present in the capture.
    pub fn captured_len(&self) -> usize {
        self.data.captured_len()
    }

    /// Original on-the-wire length.
    pub fn reported_len(&self) -> usize {
        self.data.reported_len()
    }
}

/// Detected compression format of a capture file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression
    None,
    /// Gzip (.gz)
    Gzip,
}

impl Compression {
    /// Detect compression format from magic bytes.
    pub fn detect(data: &[u8]) -> Self {
        match data {
            // Gzip: 1f 8b
            [0x1f, 0x8b, ..] => Compression::Gzip,
            _ => Compression::None,
        }
    }

    pub fn is_compressed(&self) -> bool {
        !matches!(self, Compression::None)
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_no_compression() {
        // Legacy pcap magic
        let data = [0xd4, 0xc3, 0xb2, 0xa1, 0x00, 0x00];
        assert_eq!(Compression::detect(&data), Compression::None);
    }

    #[test]
    fn test_detect_gzip() {
        let data = [0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00];
        assert_eq!(Compression::detect(&data), Compression::Gzip);
    }

    #[test]
    fn test_detect_short_data() {
        let data = [0x1f];
        assert_eq!(Compression::detect(&data), Compression::None);
    }

    #[test]
    fn test_frame_lengths() {
        let view = ByteView::with_reported(bytes::Bytes::from_static(&[0; 60]), 1500);
        let frame = Frame {
            frame_number: 1,
            timestamp_micros: 0,
            link_type: 1,
            data: view,
        };
        assert_eq!(frame.captured_len(), 60);
        assert_eq!(frame.reported_len(), 1500);
    }
}
