//! Dispatch engine: resolves and recursively invokes dissectors.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::buffer::ByteView;
use crate::dissect::context::EnterRefusal;
use crate::dissect::conversation::ConversationMap;
use crate::dissect::table::{DissectorHandle, DissectorTable, TableKey, TableKind};
use crate::dissect::{FrameContext, Verdict};
use crate::error::InitError;
use crate::registry::Registry;
use crate::tree::{Anomaly, AnomalyKind, ByteRange};
use crate::value::FieldValue;

/// Result of a dispatch or call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A dissector claimed the bytes and consumed this many.
    Consumed(usize),
    /// No registered dissector claimed the bytes.
    NotHandled,
    /// Re-entry into an already-visited `(protocol, offset)` pair, or the
    /// depth bound was hit. The offending branch is abandoned; enclosing
    /// layers continue.
    LoopDetected,
    /// The dissector claimed the bytes but faulted; the fault was trapped
    /// and recorded as an annotated tree node.
    Malformed,
}

/// Owns the dissector tables and conversation state of one capture
/// session and drives recursive dissection.
///
/// Table registration happens during init; dispatch mutates only
/// conversation state. The shared [`Registry`] is read-only by
/// construction, so independent sessions can each own an engine over the
/// same registry without locking.
#[derive(Debug)]
pub struct DispatchEngine {
    registry: Arc<Registry>,
    tables: HashMap<&'static str, DissectorTable>,
    conversations: ConversationMap,
}

impl DispatchEngine {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            tables: HashMap::new(),
            conversations: ConversationMap::new(),
        }
    }

    /// The shared protocol/field catalog.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Conversation state of this session.
    pub fn conversations(&mut self) -> &mut ConversationMap {
        &mut self.conversations
    }

    /// Create a named dissector table. Duplicate names fail init.
    pub fn register_table(&mut self, name: &'static str, kind: TableKind) -> Result<(), InitError> {
        if self.tables.contains_key(name) {
            return Err(InitError::DuplicateTable {
                name: name.to_string(),
            });
        }
        self.tables.insert(name, DissectorTable::new(name, kind));
        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&DissectorTable> {
        self.tables.get(name)
    }

    /// Register a handle under an integer key. Last writer wins.
    pub fn add_uint(
        &mut self,
        table: &str,
        key: u32,
        handle: DissectorHandle,
    ) -> Result<(), InitError> {
        self.table_mut(table)?.add_uint(key, handle)
    }

    /// Register a handle under a string key. Last writer wins.
    pub fn add_string(
        &mut self,
        table: &str,
        key: &str,
        handle: DissectorHandle,
    ) -> Result<(), InitError> {
        self.table_mut(table)?.add_string(key, handle)
    }

    /// Append a heuristic handle. Registration order is the probe order.
    pub fn add_heuristic(&mut self, table: &str, handle: DissectorHandle) -> Result<(), InitError> {
        self.table_mut(table)?.add_heuristic(handle)
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut DissectorTable, InitError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| InitError::UnknownTable {
                name: name.to_string(),
            })
    }

    /// Resolve `key` in `table` and invoke the matching dissector(s).
    ///
    /// Exact-key tables do one O(1) lookup. Heuristic tables probe handles
    /// in registration order until one claims the bytes; handles after the
    /// first claimant are never invoked, and handles whose
    /// `(protocol, offset)` pair was already dissected in this frame are
    /// passed over. An unknown table or unmatched key is `NotHandled`,
    /// never a fault.
    pub fn dispatch(
        &mut self,
        table: &str,
        key: TableKey<'_>,
        view: &ByteView,
        ctx: &mut FrameContext,
    ) -> DispatchOutcome {
        let Some(entry) = self.tables.get(table) else {
            trace!(table, "dispatch against unknown table");
            return DispatchOutcome::NotHandled;
        };

        match entry.kind() {
            TableKind::Heuristic => {
                // Clone the handle list up front: handles are Arc-cheap and
                // the probed dissectors may recurse back into the engine.
                let handles: Vec<DissectorHandle> = entry.heuristics().to_vec();
                let offset = view.frame_offset();
                for handle in &handles {
                    // An already-visited pair could never claim; passing it
                    // over keeps the probe moving instead of recording a
                    // loop for a dissector that was merely being probed.
                    if ctx.was_visited(handle.protocol(), offset) {
                        trace!(
                            table,
                            dissector = handle.name(),
                            offset,
                            "heuristic probe skipped visited pair"
                        );
                        continue;
                    }
                    match self.call(handle, view, ctx) {
                        DispatchOutcome::NotHandled => continue,
                        claimed => {
                            trace!(table, dissector = handle.name(), "heuristic claimed");
                            return claimed;
                        }
                    }
                }
                DispatchOutcome::NotHandled
            }
            _ => match entry.find(key) {
                Some(handle) => self.call(&handle, view, ctx),
                None => {
                    trace!(table, ?key, "no dissector for key");
                    DispatchOutcome::NotHandled
                }
            },
        }
    }

    /// Invoke one dissector against a view, trapping any fault at this
    /// boundary so a single malformed layer cannot abort the rest of
    /// dissection.
    pub fn call(
        &mut self,
        handle: &DissectorHandle,
        view: &ByteView,
        ctx: &mut FrameContext,
    ) -> DispatchOutcome {
        let protocol = handle.protocol();
        let offset = view.frame_offset();

        if let Err(refusal) = ctx.enter(protocol, offset) {
            let reason = match refusal {
                EnterRefusal::AlreadyVisited => format!(
                    "re-entry into {} at offset {offset} refused",
                    handle.name()
                ),
                EnterRefusal::TooDeep => {
                    format!("dissection depth bound reached at {}", handle.name())
                }
            };
            warn!(
                frame = ctx.frame_number,
                dissector = handle.name(),
                offset,
                "loop detected: {reason}"
            );
            self.annotate_layer(ctx, handle, view, AnomalyKind::LoopDetected, reason);
            return DispatchOutcome::LoopDetected;
        }

        let result = handle.attempt(view, ctx, self);

        match result {
            Ok(Verdict::Consumed(n)) => {
                ctx.leave();
                let n = n.min(view.captured_len());
                trace!(
                    frame = ctx.frame_number,
                    dissector = handle.name(),
                    consumed = n,
                    "layer dissected"
                );
                DispatchOutcome::Consumed(n)
            }
            Ok(Verdict::NotHandled) => {
                // Declined layers must not poison the visited set.
                ctx.leave_declined(protocol, offset);
                DispatchOutcome::NotHandled
            }
            Err(err) => {
                ctx.leave();
                debug!(
                    frame = ctx.frame_number,
                    dissector = handle.name(),
                    error = %err,
                    "layer malformed"
                );
                let anomaly = Anomaly::from_dissect_error(&err);
                self.annotate_layer(ctx, handle, view, anomaly.kind, anomaly.reason);
                DispatchOutcome::Malformed
            }
        }
    }

    /// Record a reason-carrying node for a layer that produced no usable
    /// output of its own. Nodes already added by the failing dissector, and
    /// everything produced by ancestor layers, stay in the tree.
    fn annotate_layer(
        &self,
        ctx: &mut FrameContext,
        handle: &DissectorHandle,
        view: &ByteView,
        kind: AnomalyKind,
        reason: String,
    ) {
        let field = self
            .registry
            .protocol(handle.protocol())
            .map(|p| p.root_field)
            .unwrap_or(crate::registry::FieldId(0));
        let range = ByteRange::new(view.frame_offset(), view.captured_len());
        let node = ctx.tree.add_root(field, range, FieldValue::None);
        ctx.tree.mark(node, Anomaly { kind, reason });
    }

    /// Dissect one complete frame through a top-level table, producing the
    /// frame's context (tree, columns, arena) for the caller to consume.
    ///
    /// This is the per-frame entry point: one call per frame, sequential
    /// within a session. Cancellation, if needed, is polled by the caller
    /// between frames.
    pub fn dissect_frame(
        &mut self,
        frame_number: u64,
        timestamp_micros: i64,
        link_type: u16,
        table: &str,
        view: &ByteView,
    ) -> (FrameContext, DispatchOutcome) {
        let mut ctx = FrameContext::new(frame_number, timestamp_micros, link_type);
        let outcome = self.dispatch(table, TableKey::Uint(link_type as u32), view, &mut ctx);
        (ctx, outcome)
    }
}
