//! Convenient re-exports for common usage.
//!
//! A curated set of the most commonly used types from dissect-core,
//! importable with a single `use` statement.
//!
//! # Example
//!
//! ```rust
//! use dissect_core::prelude::*;
//!
//! let registry = RegistryBuilder::new().build();
//! assert_eq!(registry.protocol_count(), 0);
//! ```

// Buffer types
pub use crate::buffer::{ByteView, FrameArena};

// Registry types
pub use crate::registry::{Field, FieldId, FieldKind, Protocol, ProtocolId, Registry, RegistryBuilder};

// Output types
pub use crate::tree::{Anomaly, AnomalyKind, ByteRange, NodeId, ProtoTree, TreeNode};
pub use crate::value::FieldValue;

// Dispatch types
pub use crate::dissect::{
    Conversation, ConversationKey, DispatchEngine, DispatchOutcome, Dissector, DissectorHandle,
    Endpoint, FrameContext, TableKey, TableKind, Transport, Verdict,
};

// Reassembly types
pub use crate::reassembly::{AddResult, FragmentKey, FragmentTable};

// Capture types
pub use crate::capture::{CaptureFormat, CaptureReader, FormatSniffer, Frame, OpenRoutine, Probe};

// Error types. The crate's `Result` alias is deliberately not re-exported:
// a glob import would shadow `std::result::Result` in two-argument form.
pub use crate::error::{DissectError, Error, SniffError};
