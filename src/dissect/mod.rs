//! Dissector registration and dispatch.
//!
//! This module provides:
//! - [`Dissector`] trait for implementing decoders
//! - [`DissectorHandle`] - cheap clonable handle to a registered decoder
//! - [`DissectorTable`] - keyed registry (uint / string / heuristic)
//! - [`DispatchEngine`] - resolves and recursively invokes decoders
//! - [`FrameContext`] - per-packet bookkeeping and the output tree
//! - [`Conversation`] tracking for stateful multi-packet decoders
//!
//! ## Dispatch contract
//!
//! A dissector is handed a bounds-checked [`ByteView`] and a mutable
//! [`FrameContext`] and returns a [`Verdict`]: how many bytes it consumed,
//! or that the bytes are not its protocol. Faults (`DissectError`) do not
//! unwind: the engine traps them at the call boundary, records an
//! annotated node, and lets enclosing and sibling layers continue.
//!
//! Exact-key tables resolve in O(1) with last-writer-wins registration.
//! Heuristic tables probe handles in registration order and stop at the
//! first claimant. Recursion is bounded by a depth limit plus a visited
//! `(protocol, offset)` set; re-entry yields
//! [`DispatchOutcome::LoopDetected`] instead of unbounded recursion.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use dissect_core::buffer::ByteView;
//! use dissect_core::dissect::{
//!     DispatchEngine, Dissector, DissectorHandle, FrameContext, TableKey, TableKind, Verdict,
//! };
//! use dissect_core::error::DissectError;
//! use dissect_core::registry::{ProtocolId, RegistryBuilder};
//!
//! struct Raw(ProtocolId);
//!
//! impl Dissector for Raw {
//!     fn name(&self) -> &'static str { "raw" }
//!     fn protocol(&self) -> ProtocolId { self.0 }
//!     fn attempt(
//!         &self,
//!         view: &ByteView,
//!         _ctx: &mut FrameContext,
//!         _engine: &mut DispatchEngine,
//!     ) -> Result<Verdict, DissectError> {
//!         Ok(Verdict::Consumed(view.captured_len()))
//!     }
//! }
//!
//! let mut builder = RegistryBuilder::new();
//! let raw = builder.register_protocol("Raw Data", "Raw", "raw").unwrap();
//! let mut engine = DispatchEngine::new(Arc::new(builder.build()));
//! engine.register_table("wtap.encap", TableKind::Uint).unwrap();
//! engine
//!     .add_uint("wtap.encap", 1, DissectorHandle::new(Raw(raw)))
//!     .unwrap();
//!
//! let view = ByteView::from_slice(&[1, 2, 3]);
//! let mut ctx = FrameContext::new(1, 0, 1);
//! let outcome = engine.dispatch("wtap.encap", TableKey::Uint(1), &view, &mut ctx);
//! ```

mod context;
mod conversation;
mod engine;
mod table;

pub use context::{FrameContext, MAX_RECURSION_DEPTH};
pub use conversation::{Conversation, ConversationKey, ConversationMap, Endpoint, Transport};
pub use engine::{DispatchEngine, DispatchOutcome};
pub use table::{DissectorHandle, DissectorTable, TableKey, TableKind};

use crate::buffer::ByteView;
use crate::error::DissectError;
use crate::registry::ProtocolId;

/// What a dissector reports for a view it was offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The bytes are this protocol; this many were consumed.
    Consumed(usize),
    /// The bytes are not this protocol. Heuristic tables move on to the
    /// next handle; exact-key dispatch reports `NotHandled`.
    NotHandled,
}

/// A unit of protocol-specific decoding logic.
///
/// Implementations decode one layer: read through `view`, append nodes to
/// `ctx.tree`, and recurse into encapsulated layers via
/// `engine.dispatch(...)`. All faults are returned, never panicked; the
/// engine converts them into annotated output at the call boundary.
pub trait Dissector: Send + Sync {
    /// Registered name of this dissector (e.g. "tcp").
    fn name(&self) -> &'static str;

    /// Protocol this dissector decodes, as registered at init.
    fn protocol(&self) -> ProtocolId;

    /// Attempt to decode `view`.
    ///
    /// Heuristic dissectors should inspect cheaply and return
    /// [`Verdict::NotHandled`] early when the bytes are not theirs; once a
    /// dissector starts emitting tree nodes it has claimed the layer and
    /// should report faults rather than decline.
    fn attempt(
        &self,
        view: &ByteView,
        ctx: &mut FrameContext,
        engine: &mut DispatchEngine,
    ) -> Result<Verdict, DissectError>;
}
