//! Composite backing: discontiguous member views addressed as one buffer.

use bytes::{Bytes, BytesMut};

use super::ByteView;

/// Ordered member views with cumulative start offsets for binary search.
#[derive(Debug)]
pub(super) struct CompositeBacking {
    members: Vec<ByteView>,
    /// starts[i] is the composite offset of members[i]'s first captured byte.
    starts: Vec<usize>,
    captured_len: usize,
    reported_len: usize,
}

impl CompositeBacking {
    pub(super) fn new(members: Vec<ByteView>) -> Self {
        let mut starts = Vec::with_capacity(members.len());
        let mut captured_len = 0usize;
        let mut reported_len = 0usize;
        for m in &members {
            starts.push(captured_len);
            captured_len += m.captured_len();
            reported_len += m.reported_len();
        }
        Self {
            members,
            starts,
            captured_len,
            reported_len,
        }
    }

    pub(super) fn captured_len(&self) -> usize {
        self.captured_len
    }

    pub(super) fn reported_len(&self) -> usize {
        self.reported_len
    }

    pub(super) fn first_frame_offset(&self) -> usize {
        self.members.first().map(ByteView::frame_offset).unwrap_or(0)
    }

    /// Index of the member containing composite offset `offset`.
    /// Caller guarantees `offset < captured_len`.
    fn member_at(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        }
    }

    /// Read `len` bytes at `offset`. Bounds were already validated by the
    /// owning view. Zero-copy when the range falls within one member.
    pub(super) fn gather(&self, offset: usize, len: usize) -> Bytes {
        if len == 0 {
            return Bytes::new();
        }
        let first = self.member_at(offset);
        let local = offset - self.starts[first];
        if local + len <= self.members[first].captured_len() {
            // Single-member read; the member validated its own bounds at
            // construction so this cannot fail.
            return self.members[first]
                .get_bytes(local, len)
                .expect("validated composite read");
        }

        let mut out = BytesMut::with_capacity(len);
        let mut idx = first;
        let mut local = local;
        let mut remaining = len;
        while remaining > 0 {
            let member = &self.members[idx];
            let take = remaining.min(member.captured_len() - local);
            let chunk = member
                .get_bytes(local, take)
                .expect("validated composite read");
            out.extend_from_slice(&chunk);
            remaining -= take;
            idx += 1;
            local = 0;
        }
        out.freeze()
    }

    /// Sub-view of the composite. Delegates to a single member when the
    /// range does not cross a member boundary, otherwise materializes a
    /// gathered copy.
    pub(super) fn subset(&self, offset: usize, len: usize) -> ByteView {
        if len > 0 {
            let first = self.member_at(offset);
            let local = offset - self.starts[first];
            if local + len <= self.members[first].captured_len() {
                return self.members[first]
                    .subset(local, len)
                    .expect("validated composite subset");
            }
        }
        ByteView::new(self.gather(offset, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_lookup() {
        let backing = CompositeBacking::new(vec![
            ByteView::from_slice(&[1, 2]),
            ByteView::from_slice(&[3]),
            ByteView::from_slice(&[4, 5, 6]),
        ]);
        assert_eq!(backing.member_at(0), 0);
        assert_eq!(backing.member_at(1), 0);
        assert_eq!(backing.member_at(2), 1);
        assert_eq!(backing.member_at(3), 2);
        assert_eq!(backing.member_at(5), 2);
    }

    #[test]
    fn test_gather_spanning() {
        let backing = CompositeBacking::new(vec![
            ByteView::from_slice(&[1, 2]),
            ByteView::from_slice(&[3]),
            ByteView::from_slice(&[4, 5]),
        ]);
        assert_eq!(&backing.gather(0, 5)[..], &[1, 2, 3, 4, 5]);
        assert_eq!(&backing.gather(1, 3)[..], &[2, 3, 4]);
        assert_eq!(&backing.gather(2, 0)[..], &[] as &[u8]);
    }

    #[test]
    fn test_subset_single_member_is_delegated() {
        let backing = CompositeBacking::new(vec![
            ByteView::from_slice(&[1, 2, 3]),
            ByteView::from_slice(&[4, 5]),
        ]);
        let sub = backing.subset(3, 2);
        assert_eq!(&sub.get_bytes(0, 2).unwrap()[..], &[4, 5]);
    }
}
