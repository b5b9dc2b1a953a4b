//! Fragment reassembly.
//!
//! This module accumulates fragments keyed by a caller-supplied
//! [`FragmentKey`] until a PDU is complete, then materializes one
//! contiguous [`ByteView`] for the next dissection phase.
//!
//! ## Contract
//!
//! - Fragments may arrive in any order; completion is order-independent.
//! - A PDU is complete when coverage is contiguous from offset 0 and either
//!   the total length is known and reached, or `is_last` closed the range.
//! - [`AddResult::Complete`] fires exactly once per key.
//! - Overlapping fragments with differing bytes at the same offset report
//!   [`AddResult::Conflict`]; the first-seen bytes are retained and survive
//!   into the eventual PDU. A conflict never crashes and never silently
//!   resolves.
//! - Per-entry memory is bounded by a declared maximum PDU size, so a
//!   crafted fragment stream cannot force unbounded allocation.
//! - Entries abandoned before completion stay queryable as incomplete;
//!   they are never silently dropped.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::buffer::ByteView;
use crate::error::ReassemblyError;

/// Default per-entry PDU bound (16 MiB).
pub const DEFAULT_MAX_PDU: usize = 16 * 1024 * 1024;

/// Caller-chosen key identifying one PDU under reassembly.
///
/// `conversation` ties the entry to a flow, `stream` separates concurrent
/// streams within it (e.g. direction), `id` names the PDU itself (e.g. an
/// IP identification field or message sequence number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    pub conversation: u64,
    pub stream: u32,
    pub id: u32,
}

/// Result of adding one fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum AddResult {
    /// Coverage is not yet contiguous or the range is still open.
    Incomplete,
    /// The PDU just became complete; one contiguous view over it.
    Complete(ByteView),
    /// The fragment overlapped already-held data with differing bytes at
    /// `offset`. First-seen bytes were retained; accumulation continues.
    Conflict { offset: usize },
}

/// One fragment as held by the table.
#[derive(Debug)]
struct Fragment {
    data: Bytes,
}

/// Accumulation state for one key.
#[derive(Debug, Default)]
struct Entry {
    /// Fragments keyed by offset within the PDU. Non-overlapping by
    /// construction: overlaps are trimmed against first-seen data.
    fragments: BTreeMap<usize, Fragment>,
    /// Total PDU length, once a closing fragment fixed it.
    total_len: Option<usize>,
    /// Bytes currently held (sum of fragment lengths).
    held: usize,
    /// A content conflict was observed at some point.
    conflicted: bool,
    /// Completion already fired.
    completed: bool,
}

impl Entry {
    /// Highest offset covered contiguously from 0.
    fn contiguous_end(&self) -> usize {
        let mut end = 0usize;
        for (&off, frag) in &self.fragments {
            if off > end {
                break;
            }
            end = end.max(off + frag.data.len());
        }
        end
    }

    fn is_complete(&self) -> bool {
        match self.total_len {
            Some(total) => self.contiguous_end() >= total,
            None => false,
        }
    }

    fn assemble(&self) -> Vec<u8> {
        let total = self.total_len.unwrap_or_else(|| self.contiguous_end());
        let mut out = Vec::with_capacity(total);
        for (&off, frag) in &self.fragments {
            if off >= total {
                break;
            }
            // Fragments are non-overlapping and sorted; contiguity was
            // checked before assembling.
            debug_assert_eq!(off, out.len());
            let take = frag.data.len().min(total - off);
            out.extend_from_slice(&frag.data[..take]);
        }
        out
    }
}

/// Snapshot of an incomplete entry, for callers inspecting abandoned
/// reassemblies at session end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPdu {
    /// Bytes held so far.
    pub held: usize,
    /// Contiguous coverage from offset 0.
    pub contiguous: usize,
    /// Total length, when a closing fragment declared it.
    pub total_len: Option<usize>,
    /// Whether a content conflict was observed.
    pub conflicted: bool,
}

/// Fragment table for one capture session.
#[derive(Debug)]
pub struct FragmentTable {
    entries: HashMap<FragmentKey, Entry>,
    max_pdu: usize,
}

impl FragmentTable {
    /// Table with the default per-entry PDU bound.
    pub fn new() -> Self {
        Self::with_max_pdu(DEFAULT_MAX_PDU)
    }

    /// Table with an explicit per-entry PDU bound.
    pub fn with_max_pdu(max_pdu: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_pdu,
        }
    }

    /// Add one fragment of a PDU.
    ///
    /// `offset` is the fragment's position within the reassembled PDU;
    /// `is_last` declares the PDU's total length as `offset + len`.
    /// Returns [`AddResult::Complete`] exactly once, on the first add that
    /// finds coverage contiguous through the declared end. A conflicting add
    /// reports [`AddResult::Conflict`] instead; if it also closed the
    /// coverage, the PDU is retrievable via [`FragmentTable::try_complete`]
    /// or completes on the next add for the key.
    pub fn add_fragment(
        &mut self,
        key: FragmentKey,
        offset: usize,
        view: &ByteView,
        is_last: bool,
    ) -> Result<AddResult, ReassemblyError> {
        let data = view
            .get_bytes(0, view.captured_len())
            .expect("full-view read is always in bounds");

        if self.entries.get(&key).is_some_and(|e| e.completed) {
            return Err(ReassemblyError::AlreadyComplete);
        }

        let end = offset.saturating_add(data.len());
        if end > self.max_pdu {
            warn!(?key, offset, end, max = self.max_pdu, "fragment rejected: PDU bound");
            return Err(ReassemblyError::PduTooLarge {
                offset,
                would_be: end,
                max: self.max_pdu,
            });
        }

        let entry = self.entries.entry(key).or_default();

        if is_last {
            // A shorter close wins ties with data already past it; the
            // assembled PDU is truncated to the declared total.
            entry.total_len = Some(match entry.total_len {
                Some(t) => t.min(end),
                None => end,
            });
        }

        let conflict_at = insert_trimmed(entry, offset, data);
        if let Some(at) = conflict_at {
            entry.conflicted = true;
            debug!(?key, offset = at, "fragment content conflict, first-seen bytes retained");
            return Ok(AddResult::Conflict { offset: at });
        }

        if entry.is_complete() {
            entry.completed = true;
            let pdu = entry.assemble();
            debug!(?key, len = pdu.len(), "PDU complete");
            // Held fragments are dropped; the entry stays to enforce
            // exactly-once completion.
            entry.fragments.clear();
            entry.held = 0;
            return Ok(AddResult::Complete(ByteView::new(Bytes::from(pdu))));
        }

        Ok(AddResult::Incomplete)
    }

    /// Materialize the PDU for a key whose coverage is already closed
    /// without adding another fragment.
    ///
    /// A conflicting add closes coverage without firing
    /// [`AddResult::Complete`]; this retrieves such a PDU directly.
    /// Counts as the key's one completion. Returns `None` when the entry
    /// is unknown, still open, or already completed.
    pub fn try_complete(&mut self, key: &FragmentKey) -> Option<ByteView> {
        let entry = self.entries.get_mut(key)?;
        if entry.completed || !entry.is_complete() {
            return None;
        }
        entry.completed = true;
        let pdu = entry.assemble();
        debug!(?key, len = pdu.len(), "PDU complete");
        entry.fragments.clear();
        entry.held = 0;
        Some(ByteView::new(Bytes::from(pdu)))
    }

    /// Inspect an entry that has not completed. Returns `None` for unknown
    /// or already-completed keys.
    pub fn pending(&self, key: &FragmentKey) -> Option<PendingPdu> {
        let entry = self.entries.get(key)?;
        if entry.completed {
            return None;
        }
        Some(PendingPdu {
            held: entry.held,
            contiguous: entry.contiguous_end(),
            total_len: entry.total_len,
            conflicted: entry.conflicted,
        })
    }

    /// Keys of all entries still incomplete (e.g. at session end).
    pub fn incomplete_keys(&self) -> impl Iterator<Item = &FragmentKey> {
        self.entries
            .iter()
            .filter(|(_, e)| !e.completed)
            .map(|(k, _)| k)
    }

    /// Drop an entry entirely (conversation torn down).
    pub fn remove(&mut self, key: &FragmentKey) {
        self.entries.remove(key);
    }

    /// Number of tracked entries, complete and incomplete.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FragmentTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert a fragment, trimming it against already-held data so fragments
/// stay non-overlapping and first-seen bytes win. Returns the offset of
/// the first differing overlapped byte, if any.
fn insert_trimmed(entry: &mut Entry, offset: usize, data: Bytes) -> Option<usize> {
    let mut conflict_at: Option<usize> = None;
    let mut pieces: Vec<(usize, Bytes)> = vec![(offset, data)];

    // Compare against each existing fragment that overlaps the new range.
    let existing: Vec<(usize, usize)> = entry
        .fragments
        .iter()
        .map(|(&off, f)| (off, f.data.len()))
        .collect();

    for (ex_off, ex_len) in existing {
        let ex_end = ex_off + ex_len;
        let mut next: Vec<(usize, Bytes)> = Vec::with_capacity(pieces.len() + 1);
        for (p_off, p_data) in pieces {
            let p_end = p_off + p_data.len();
            if p_end <= ex_off || p_off >= ex_end {
                next.push((p_off, p_data));
                continue;
            }
            // Overlapping region: [lo, hi)
            let lo = p_off.max(ex_off);
            let hi = p_end.min(ex_end);
            let held = &entry.fragments[&ex_off].data;
            for i in lo..hi {
                if p_data[i - p_off] != held[i - ex_off] {
                    conflict_at = Some(conflict_at.map_or(i, |c| c.min(i)));
                    break;
                }
            }
            // Keep only the non-overlapped head and tail of the new piece.
            if p_off < lo {
                next.push((p_off, p_data.slice(0..lo - p_off)));
            }
            if hi < p_end {
                next.push((hi, p_data.slice(hi - p_off..)));
            }
        }
        pieces = next;
    }

    for (p_off, p_data) in pieces {
        if p_data.is_empty() {
            continue;
        }
        entry.held += p_data.len();
        entry.fragments.insert(p_off, Fragment { data: p_data });
    }
    conflict_at
}
