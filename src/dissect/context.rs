//! Per-frame dissection context.

use std::collections::HashSet;

use compact_str::CompactString;

use crate::buffer::FrameArena;
use crate::dissect::conversation::ConversationKey;
use crate::registry::ProtocolId;
use crate::tree::ProtoTree;

/// Hard bound on nested dispatch depth within one frame.
///
/// Combined with the visited set this is the only guard against a
/// pathological decoder chain; there is no wall-clock timeout inside
/// dispatch.
pub const MAX_RECURSION_DEPTH: usize = 100;

/// Why the engine refused to enter a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnterRefusal {
    /// The `(protocol, offset)` pair was already dissected in this frame.
    AlreadyVisited,
    /// The depth bound was reached.
    TooDeep,
}

/// Per-packet mutable bookkeeping threaded through every dissector call.
///
/// Carries the recursion guard state, the output tree under construction,
/// the per-frame arena, and the summary columns. One context lives exactly
/// as long as one frame's dissection pass; the caller consumes `tree` (and
/// with it the arena-backed values) afterwards.
#[derive(Debug)]
pub struct FrameContext {
    /// Frame sequence number within the capture.
    pub frame_number: u64,
    /// Capture timestamp in microseconds since the epoch.
    pub timestamp_micros: i64,
    /// Link-layer type of the frame (e.g. 1 = Ethernet).
    pub link_type: u16,

    /// Output tree under construction.
    pub tree: ProtoTree,
    /// Owns buffers synthesized during this pass.
    pub arena: FrameArena,

    /// Conversation this frame was assigned to, set by the transport layer
    /// so deeper layers can retrieve their session state.
    pub conversation: Option<ConversationKey>,

    depth: usize,
    visited: HashSet<(ProtocolId, usize)>,

    col_protocol: CompactString,
    col_info: String,
}

impl FrameContext {
    pub fn new(frame_number: u64, timestamp_micros: i64, link_type: u16) -> Self {
        Self {
            frame_number,
            timestamp_micros,
            link_type,
            tree: ProtoTree::new(),
            arena: FrameArena::new(),
            conversation: None,
            depth: 0,
            visited: HashSet::new(),
            col_protocol: CompactString::default(),
            col_info: String::new(),
        }
    }

    /// Current nesting depth of dispatch calls.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Record entry into a layer, refusing re-entry and over-deep nesting.
    pub(crate) fn enter(
        &mut self,
        protocol: ProtocolId,
        frame_offset: usize,
    ) -> Result<(), EnterRefusal> {
        if self.depth >= MAX_RECURSION_DEPTH {
            return Err(EnterRefusal::TooDeep);
        }
        if !self.visited.insert((protocol, frame_offset)) {
            return Err(EnterRefusal::AlreadyVisited);
        }
        self.depth += 1;
        Ok(())
    }

    /// Whether the pair was already dissected in this frame. Lets heuristic
    /// probing pass over a handle that `enter` would refuse anyway.
    pub(crate) fn was_visited(&self, protocol: ProtocolId, frame_offset: usize) -> bool {
        self.visited.contains(&(protocol, frame_offset))
    }

    /// Record a completed layer. The visited pair stays recorded for the
    /// rest of the frame, which is what makes re-entry detectable.
    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Record a layer that declined the bytes. The pair is forgotten so a
    /// different path may legitimately dissect the same protocol there.
    pub(crate) fn leave_declined(&mut self, protocol: ProtocolId, frame_offset: usize) {
        self.visited.remove(&(protocol, frame_offset));
        self.depth = self.depth.saturating_sub(1);
    }

    /// Replace the protocol summary column (last dissected layer wins).
    pub fn set_protocol_col(&mut self, name: &str) {
        self.col_protocol = CompactString::new(name);
    }

    /// Append to the info summary column.
    pub fn append_info(&mut self, text: &str) {
        if !self.col_info.is_empty() {
            self.col_info.push_str(", ");
        }
        self.col_info.push_str(text);
    }

    pub fn protocol_col(&self) -> &str {
        &self.col_protocol
    }

    pub fn info_col(&self) -> &str {
        &self.col_info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: enter/leave tracks depth and visited pairs
    #[test]
    fn test_enter_leave() {
        let mut ctx = FrameContext::new(1, 0, 1);
        assert!(ctx.enter(ProtocolId(0), 0).is_ok());
        assert_eq!(ctx.depth(), 1);
        assert!(ctx.enter(ProtocolId(1), 14).is_ok());
        assert_eq!(ctx.depth(), 2);

        ctx.leave();
        ctx.leave();
        assert_eq!(ctx.depth(), 0);

        // Pairs stay visited after leave
        assert_eq!(
            ctx.enter(ProtocolId(0), 0),
            Err(EnterRefusal::AlreadyVisited)
        );
    }

    // Test 2: same protocol at a different offset is fine
    #[test]
    fn test_same_protocol_different_offset() {
        let mut ctx = FrameContext::new(1, 0, 1);
        assert!(ctx.enter(ProtocolId(3), 14).is_ok());
        assert!(ctx.enter(ProtocolId(3), 34).is_ok());
    }

    // Test 3: declined layers are forgotten
    #[test]
    fn test_declined_forgets_pair() {
        let mut ctx = FrameContext::new(1, 0, 1);
        assert!(ctx.enter(ProtocolId(5), 20).is_ok());
        ctx.leave_declined(ProtocolId(5), 20);
        assert!(ctx.enter(ProtocolId(5), 20).is_ok());
    }

    // Test 4: depth bound
    #[test]
    fn test_depth_bound() {
        let mut ctx = FrameContext::new(1, 0, 1);
        for i in 0..MAX_RECURSION_DEPTH {
            assert!(ctx.enter(ProtocolId(0), i).is_ok());
        }
        assert_eq!(
            ctx.enter(ProtocolId(0), usize::MAX),
            Err(EnterRefusal::TooDeep)
        );
    }

    // Test 5: summary columns
    #[test]
    fn test_columns() {
        let mut ctx = FrameContext::new(1, 0, 1);
        ctx.set_protocol_col("TCP");
        ctx.append_info("443 → 51234");
        ctx.append_info("[ACK]");
        assert_eq!(ctx.protocol_col(), "TCP");
        assert_eq!(ctx.info_col(), "443 → 51234, [ACK]");
    }
}
