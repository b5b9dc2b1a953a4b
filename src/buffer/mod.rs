//! Bounds-checked virtual buffers over packet bytes.
//!
//! This module provides [`ByteView`], the buffer abstraction every dissector
//! reads through. A view is backed by one of:
//!
//! - **Raw bytes** - the captured frame itself (refcounted, zero-copy)
//! - **A sub-range** of another view - shares the parent's backing
//! - **A composite** - discontiguous regions addressed as one buffer
//! - **Synthesized output** - decoded/decompressed bytes owned by the
//!   per-frame [`FrameArena`]
//!
//! A view tracks two lengths: `captured_len`, the bytes actually present,
//! and `reported_len >= captured_len`, the size the frame claimed on the
//! wire. Capture snapshot limits (snaplen) make the two diverge; dissectors
//! must consult both. Every read is validated against `captured_len` and
//! returns a typed [`BoundsError`] instead of panicking.
//!
//! ## Example
//!
//! ```rust
//! use dissect_core::buffer::ByteView;
//!
//! let view = ByteView::from_slice(&[0x08, 0x00, 0xde, 0xad]);
//! assert_eq!(view.get_u16_be(0).unwrap(), 0x0800);
//!
//! let payload = view.subset(2, 2).unwrap();
//! assert_eq!(payload.get_u8(0).unwrap(), 0xde);
//! // Out-of-range reads fail, they never panic
//! assert!(payload.get_u8(2).is_err());
//! ```

mod arena;
mod composite;

pub use arena::FrameArena;

use bytes::Bytes;

use crate::error::{BoundsError, ReportedLengthError};
use composite::CompositeBacking;
use std::sync::Arc;

/// Bounds-checked virtual buffer over packet bytes.
///
/// Cloning is cheap: contiguous views share a refcounted [`Bytes`] backing
/// and composite views share their member list. Views are immutable once
/// constructed and may be freely shared across readers.
#[derive(Debug, Clone)]
pub struct ByteView {
    backing: Backing,
    /// Claimed on-the-wire length. Always >= captured length; the excess is
    /// bytes lost to the capture snapshot.
    reported_len: usize,
    /// Absolute offset of this view's first byte within the original frame.
    /// Subsets propagate it so dispatch can key loop detection and tree
    /// nodes can reference frame ranges.
    frame_offset: usize,
}

#[derive(Debug, Clone)]
enum Backing {
    Contiguous(Bytes),
    Composite(Arc<CompositeBacking>),
}

impl ByteView {
    /// Create a view over owned bytes with `reported_len == captured_len`.
    pub fn new(data: Bytes) -> Self {
        let reported_len = data.len();
        Self {
            backing: Backing::Contiguous(data),
            reported_len,
            frame_offset: 0,
        }
    }

    /// Create a view by copying a slice. Test and fixture convenience.
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Create a view over a truncated capture: `data` holds the snapshot,
    /// `reported_len` the original on-the-wire size.
    ///
    /// `reported_len` is clamped up to the captured length; a frame can not
    /// claim fewer bytes than were captured.
    pub fn with_reported(data: Bytes, reported_len: usize) -> Self {
        let reported_len = reported_len.max(data.len());
        Self {
            backing: Backing::Contiguous(data),
            reported_len,
            frame_offset: 0,
        }
    }

    /// Logically concatenate discontiguous views into one addressable view.
    ///
    /// Captured and reported lengths are the sums of the members'. Reads
    /// within a single member stay zero-copy; reads spanning members copy.
    pub fn composite(members: Vec<ByteView>) -> Self {
        let backing = CompositeBacking::new(members);
        let reported_len = backing.reported_len();
        let frame_offset = backing.first_frame_offset();
        Self {
            backing: Backing::Composite(Arc::new(backing)),
            reported_len,
            frame_offset,
        }
    }

    /// Bytes actually present in this view.
    #[inline]
    pub fn captured_len(&self) -> usize {
        match &self.backing {
            Backing::Contiguous(b) => b.len(),
            Backing::Composite(c) => c.captured_len(),
        }
    }

    /// Claimed on-the-wire length. May exceed [`captured_len`] when the
    /// capture snapshot truncated the frame.
    ///
    /// [`captured_len`]: Self::captured_len
    #[inline]
    pub fn reported_len(&self) -> usize {
        self.reported_len
    }

    /// Whether the capture snapshot cut this view short.
    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.reported_len > self.captured_len()
    }

    /// Absolute offset of this view's first byte within the original frame.
    ///
    /// Composite views report their first member's offset; their later
    /// members are discontiguous by construction.
    #[inline]
    pub fn frame_offset(&self) -> usize {
        self.frame_offset
    }

    /// Validated read of `len` bytes at `offset`.
    ///
    /// Fails iff `offset + len > captured_len`. Zero-copy on contiguous
    /// views and on composite reads that fall within one member.
    pub fn get_bytes(&self, offset: usize, len: usize) -> Result<Bytes, BoundsError> {
        self.check(offset, len)?;
        match &self.backing {
            Backing::Contiguous(b) => Ok(b.slice(offset..offset + len)),
            Backing::Composite(c) => Ok(c.gather(offset, len)),
        }
    }

    /// Sub-range view sharing this view's backing. No copy on contiguous
    /// views. The child's reported length equals `len`.
    pub fn subset(&self, offset: usize, len: usize) -> Result<ByteView, BoundsError> {
        self.subset_with_reported(offset, len, len)
    }

    /// Sub-range view covering everything from `offset` to the end.
    ///
    /// The child's reported length is the parent's reported remainder, so
    /// truncation carries through: a payload cut short by snaplen still
    /// reports its full claimed size.
    pub fn subset_to_end(&self, offset: usize) -> Result<ByteView, BoundsError> {
        let captured = self.captured_len();
        if offset > captured {
            return Err(BoundsError {
                offset,
                len: 0,
                captured,
            });
        }
        let len = captured - offset;
        let reported = self.reported_len - offset.min(self.reported_len);
        self.subset_with_reported(offset, len, reported)
    }

    /// Sub-range view with an explicit reported length, for protocols whose
    /// headers claim a payload size past the captured bytes.
    pub fn subset_with_reported(
        &self,
        offset: usize,
        len: usize,
        reported_len: usize,
    ) -> Result<ByteView, BoundsError> {
        self.check(offset, len)?;
        let reported_len = reported_len.max(len);
        match &self.backing {
            Backing::Contiguous(b) => Ok(ByteView {
                backing: Backing::Contiguous(b.slice(offset..offset + len)),
                reported_len,
                frame_offset: self.frame_offset + offset,
            }),
            // A composite subset within one member delegates to that member
            // and stays zero-copy; one that spans members materializes.
            Backing::Composite(c) => {
                let mut child = c.subset(offset, len);
                child.reported_len = reported_len;
                Ok(child)
            }
        }
    }

    /// Classify an in-protocol length claim against the reported length.
    ///
    /// Returns [`ReportedLengthError`] when the packet's own length field
    /// asserts more bytes than the frame claimed on the wire. A claim that
    /// fits the reported length but not the captured bytes is ordinary
    /// truncation and passes this check; the subsequent read reports the
    /// [`BoundsError`].
    pub fn check_reported(
        &self,
        offset: usize,
        claimed: usize,
    ) -> Result<(), ReportedLengthError> {
        let fits = offset
            .checked_add(claimed)
            .map(|end| end <= self.reported_len)
            .unwrap_or(false);
        if !fits {
            return Err(ReportedLengthError {
                offset,
                claimed,
                reported: self.reported_len,
            });
        }
        Ok(())
    }

    /// Remaining captured bytes at and after `offset`.
    #[inline]
    pub fn remaining(&self, offset: usize) -> usize {
        self.captured_len().saturating_sub(offset)
    }

    #[inline]
    fn check(&self, offset: usize, len: usize) -> Result<(), BoundsError> {
        let captured = self.captured_len();
        match offset.checked_add(len) {
            Some(end) if end <= captured => Ok(()),
            _ => Err(BoundsError {
                offset,
                len,
                captured,
            }),
        }
    }

    #[inline]
    fn read_array<const N: usize>(&self, offset: usize) -> Result<[u8; N], BoundsError> {
        let bytes = self.get_bytes(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    /// Read one byte.
    #[inline]
    pub fn get_u8(&self, offset: usize) -> Result<u8, BoundsError> {
        Ok(self.read_array::<1>(offset)?[0])
    }

    /// Read a big-endian u16.
    #[inline]
    pub fn get_u16_be(&self, offset: usize) -> Result<u16, BoundsError> {
        Ok(u16::from_be_bytes(self.read_array(offset)?))
    }

    /// Read a little-endian u16.
    #[inline]
    pub fn get_u16_le(&self, offset: usize) -> Result<u16, BoundsError> {
        Ok(u16::from_le_bytes(self.read_array(offset)?))
    }

    /// Read a big-endian u24 into the low bits of a u32.
    #[inline]
    pub fn get_u24_be(&self, offset: usize) -> Result<u32, BoundsError> {
        let b = self.read_array::<3>(offset)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    /// Read a little-endian u24 into the low bits of a u32.
    #[inline]
    pub fn get_u24_le(&self, offset: usize) -> Result<u32, BoundsError> {
        let b = self.read_array::<3>(offset)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]))
    }

    /// Read a big-endian u32.
    #[inline]
    pub fn get_u32_be(&self, offset: usize) -> Result<u32, BoundsError> {
        Ok(u32::from_be_bytes(self.read_array(offset)?))
    }

    /// Read a little-endian u32.
    #[inline]
    pub fn get_u32_le(&self, offset: usize) -> Result<u32, BoundsError> {
        Ok(u32::from_le_bytes(self.read_array(offset)?))
    }

    /// Read a big-endian u64.
    #[inline]
    pub fn get_u64_be(&self, offset: usize) -> Result<u64, BoundsError> {
        Ok(u64::from_be_bytes(self.read_array(offset)?))
    }

    /// Read a little-endian u64.
    #[inline]
    pub fn get_u64_le(&self, offset: usize) -> Result<u64, BoundsError> {
        Ok(u64::from_le_bytes(self.read_array(offset)?))
    }
}

/// Equality is by content: captured bytes and reported length. Backing kind
/// and frame offset do not participate, so a composite compares equal to a
/// contiguous view holding the same bytes.
impl PartialEq for ByteView {
    fn eq(&self, other: &Self) -> bool {
        let len = self.captured_len();
        if len != other.captured_len() || self.reported_len != other.reported_len {
            return false;
        }
        match (&self.backing, &other.backing) {
            (Backing::Contiguous(a), Backing::Contiguous(b)) => a == b,
            _ => matches!(
                (self.get_bytes(0, len), other.get_bytes(0, len)),
                (Ok(a), Ok(b)) if a == b
            ),
        }
    }
}

impl Eq for ByteView {}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: reads succeed exactly within captured bounds
    #[test]
    fn test_bounds_exact() {
        let view = ByteView::from_slice(&[1, 2, 3, 4]);
        assert!(view.get_bytes(0, 4).is_ok());
        assert!(view.get_bytes(4, 0).is_ok());
        assert!(view.get_bytes(0, 5).is_err());
        assert!(view.get_bytes(5, 0).is_err());
        assert!(view.get_bytes(usize::MAX, 2).is_err()); // overflow-safe
    }

    // Test 2: captured vs reported divergence on truncated capture
    #[test]
    fn test_truncated_capture() {
        let view = ByteView::with_reported(Bytes::from_static(&[1, 2, 3]), 10);
        assert_eq!(view.captured_len(), 3);
        assert_eq!(view.reported_len(), 10);
        assert!(view.is_truncated());
        // Reads validate against captured, not reported
        assert!(view.get_bytes(0, 3).is_ok());
        assert!(view.get_bytes(0, 4).is_err());
    }

    // Test 3: subset returns exactly the parent's bytes for the range
    #[test]
    fn test_subset_bytes_match_parent() {
        let view = ByteView::from_slice(&[10, 20, 30, 40, 50]);
        let sub = view.subset(1, 3).unwrap();
        assert_eq!(sub.captured_len(), 3);
        assert_eq!(&sub.get_bytes(0, 3).unwrap()[..], &[20, 30, 40]);
        assert_eq!(
            &sub.get_bytes(0, 3).unwrap()[..],
            &view.get_bytes(1, 3).unwrap()[..]
        );
    }

    // Test 4: nested subsets keep bounds-checking and frame offsets
    #[test]
    fn test_nested_subset() {
        let view = ByteView::from_slice(&[0, 1, 2, 3, 4, 5, 6, 7]);
        let a = view.subset(2, 6).unwrap();
        let b = a.subset(2, 4).unwrap();
        assert_eq!(b.frame_offset(), 4);
        assert_eq!(b.get_u8(0).unwrap(), 4);
        assert!(b.get_u8(4).is_err());
    }

    // Test 5: subset_to_end carries truncation through
    #[test]
    fn test_subset_to_end_reported() {
        let view = ByteView::with_reported(Bytes::from_static(&[1, 2, 3, 4]), 20);
        let rest = view.subset_to_end(2).unwrap();
        assert_eq!(rest.captured_len(), 2);
        assert_eq!(rest.reported_len(), 18);
        assert!(rest.is_truncated());
    }

    // Test 6: endian accessors
    #[test]
    fn test_numeric_accessors() {
        let view = ByteView::from_slice(&[0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0]);
        assert_eq!(view.get_u8(0).unwrap(), 0x12);
        assert_eq!(view.get_u16_be(0).unwrap(), 0x1234);
        assert_eq!(view.get_u16_le(0).unwrap(), 0x3412);
        assert_eq!(view.get_u24_be(0).unwrap(), 0x123456);
        assert_eq!(view.get_u24_le(0).unwrap(), 0x563412);
        assert_eq!(view.get_u32_be(0).unwrap(), 0x12345678);
        assert_eq!(view.get_u32_le(0).unwrap(), 0x78563412);
        assert_eq!(view.get_u64_be(0).unwrap(), 0x123456789abcdef0);
        assert!(view.get_u64_be(1).is_err());
    }

    // Test 7: composite concatenates discontiguous regions
    #[test]
    fn test_composite_concatenation() {
        let a = ByteView::from_slice(&[1, 2, 3]);
        let b = ByteView::from_slice(&[4, 5]);
        let c = ByteView::from_slice(&[6, 7, 8, 9]);
        let all = ByteView::composite(vec![a, b, c]);

        assert_eq!(all.captured_len(), 9);
        // Within one member: zero-copy path
        assert_eq!(&all.get_bytes(5, 2).unwrap()[..], &[6, 7]);
        // Spanning members: gathered copy
        assert_eq!(&all.get_bytes(1, 5).unwrap()[..], &[2, 3, 4, 5, 6]);
        assert_eq!(&all.get_bytes(0, 9).unwrap()[..], &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert!(all.get_bytes(8, 2).is_err());
    }

    // Test 8: bounds hold recursively through subset-of-composite
    #[test]
    fn test_subset_of_composite() {
        let a = ByteView::from_slice(&[1, 2, 3]);
        let b = ByteView::from_slice(&[4, 5, 6]);
        let all = ByteView::composite(vec![a, b]);

        let sub = all.subset(2, 3).unwrap();
        assert_eq!(&sub.get_bytes(0, 3).unwrap()[..], &[3, 4, 5]);
        assert!(sub.get_bytes(1, 3).is_err());

        // Composite-of-composite still addresses correctly
        let outer = ByteView::composite(vec![all.clone(), ByteView::from_slice(&[7])]);
        assert_eq!(&outer.get_bytes(4, 3).unwrap()[..], &[5, 6, 7]);
    }

    // Test 9: composite reported length sums members' reported lengths
    #[test]
    fn test_composite_reported() {
        let a = ByteView::with_reported(Bytes::from_static(&[1, 2]), 6);
        let b = ByteView::from_slice(&[3, 4]);
        let all = ByteView::composite(vec![a, b]);
        assert_eq!(all.captured_len(), 4);
        assert_eq!(all.reported_len(), 8);
    }

    // Test 10: check_reported distinguishes malformed claims from truncation
    #[test]
    fn test_check_reported() {
        let view = ByteView::with_reported(Bytes::from_static(&[1, 2, 3]), 8);
        // Claim within reported (even past captured): truncation, not malformed
        assert!(view.check_reported(0, 8).is_ok());
        // Claim past reported: the packet lies about its own size
        let err = view.check_reported(2, 7).unwrap_err();
        assert_eq!(err.reported, 8);
        assert_eq!(err.claimed, 7);
        // Overflowing claim
        assert!(view.check_reported(usize::MAX, 2).is_err());
    }

    // Test 11: empty views behave
    #[test]
    fn test_empty_view() {
        let view = ByteView::from_slice(&[]);
        assert_eq!(view.captured_len(), 0);
        assert!(view.get_bytes(0, 0).is_ok());
        assert!(view.get_u8(0).is_err());
        let sub = view.subset(0, 0).unwrap();
        assert_eq!(sub.captured_len(), 0);
    }

    // Test 12: equality is by content, independent of backing kind
    #[test]
    fn test_content_equality() {
        let contiguous = ByteView::from_slice(&[1, 2, 3, 4]);
        let composite = ByteView::composite(vec![
            ByteView::from_slice(&[1, 2]),
            ByteView::from_slice(&[3, 4]),
        ]);
        assert_eq!(contiguous, composite);
        assert_ne!(contiguous, ByteView::from_slice(&[1, 2, 3, 5]));
        assert_ne!(contiguous, ByteView::from_slice(&[1, 2, 3]));
        // Same bytes, different reported length: not equal
        assert_ne!(
            contiguous,
            ByteView::with_reported(Bytes::from_static(&[1, 2, 3, 4]), 10)
        );
    }
}
