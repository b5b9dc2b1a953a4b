//! # dissect-core
//!
//! Protocol dissection substrate: bounds-checked byte views, a protocol
//! and field registry, table-driven dissector dispatch, fragment
//! reassembly and capture format sniffing.
//!
//! The crate does not ship protocol decoders. It provides the machinery
//! decoders plug into: every read is bounds-checked, every fault a decoder
//! raises is trapped at the dispatch boundary and recorded on the output
//! tree, and a malformed or truncated capture can never take the process
//! down.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dissect_core::prelude::*;
//! use std::fs::File;
//! use std::sync::Arc;
//!
//! # fn main() -> dissect_core::Result<()> {
//! // Describe the protocols the session knows about
//! let mut builder = RegistryBuilder::new();
//! let _eth = builder.register_protocol("Ethernet", "Eth", "eth")?;
//! let registry = builder.build();
//!
//! // Wire dissectors into dispatch tables
//! let mut engine = DispatchEngine::new(Arc::new(registry));
//! engine.register_table("wtap.encap", TableKind::Uint)?;
//!
//! // Stream frames out of a capture and dissect each one
//! let mut reader = CaptureReader::open(File::open("capture.pcap")?)?;
//! while let Some(frame) = reader.next_frame()? {
//!     let (ctx, outcome) = engine.dissect_frame(
//!         frame.frame_number,
//!         frame.timestamp_micros,
//!         frame.link_type,
//!         "wtap.encap",
//!         &frame.data,
//!     );
//!     println!("frame {}: {:?}, {} nodes", frame.frame_number, outcome, ctx.tree.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                         dissect-core                                |
//! +---------------------------------------------------------------------+
//! |  buffer/     - ByteView, composite views, per-frame arena           |
//! |  registry    - Protocol and Field descriptors, init-time builder    |
//! |  value/tree  - FieldValue, ProtoTree output with anomaly markers    |
//! |  dissect/    - Dissector trait, tables, dispatch engine,            |
//! |                conversations, recursion guard                       |
//! |  reassembly/ - FragmentTable, order-independent PDU completion      |
//! |  capture/    - FormatSniffer, pcap/pcapng frame reader              |
//! |  error/      - Error taxonomy                                       |
//! +---------------------------------------------------------------------+
//! ```

pub mod buffer;
pub mod capture;
pub mod dissect;
pub mod error;
pub mod prelude;
pub mod reassembly;
pub mod registry;
pub mod tree;
pub mod value;

// Re-export commonly used types at crate root for convenience
pub use buffer::{ByteView, FrameArena};
pub use capture::{
    CaptureFormat, CaptureReader, Compression, FormatSniffer, Frame, OpenRoutine, Probe,
};
pub use dissect::{
    Conversation, ConversationKey, ConversationMap, DispatchEngine, DispatchOutcome, Dissector,
    DissectorHandle, DissectorTable, Endpoint, FrameContext, TableKey, TableKind, Transport,
    Verdict, MAX_RECURSION_DEPTH,
};
pub use error::{
    BoundsError, CaptureError, DissectError, Error, InitError, ReassemblyError,
    ReportedLengthError, Result, SniffError,
};
pub use reassembly::{AddResult, FragmentKey, FragmentTable, PendingPdu};
pub use registry::{Field, FieldId, FieldKind, Protocol, ProtocolId, Registry, RegistryBuilder};
pub use tree::{Anomaly, AnomalyKind, ByteRange, NodeId, ProtoTree, TreeNode};
pub use value::FieldValue;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
