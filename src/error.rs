//! Error types for dissect-core.
//!
//! This module provides structured error types for all dissect-core
//! operations:
//!
//! - [`enum@Error`] - Root error enum that wraps all error types
//! - [`BoundsError`] - A read past the bytes a view actually holds
//! - [`ReportedLengthError`] - An in-protocol length claim past the record
//! - [`InitError`] - Registry construction failures (fatal at startup only)
//! - [`DissectError`] - Faults raised inside a dissector call
//! - [`ReassemblyError`] - Fragment table failures
//! - [`SniffError`] - Capture format detection failures
//! - [`CaptureError`] - Capture stream decoding failures
//!
//! Bounds and reported-length faults are recoverable and local to the layer
//! that raised them; the dispatch engine converts them into annotated tree
//! nodes at the call boundary. Only [`InitError`] is permitted to abort the
//! process, and only during the explicit init phase.

use thiserror::Error;

/// Root error type for dissect-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A read exceeded the captured bytes of a view
    #[error(transparent)]
    Bounds(#[from] BoundsError),

    /// An in-protocol length field claimed more than the record holds
    #[error(transparent)]
    ReportedLength(#[from] ReportedLengthError),

    /// Registry construction failure (startup only)
    #[error(transparent)]
    Init(#[from] InitError),

    /// Fault raised during a dissector call
    #[error(transparent)]
    Dissect(#[from] DissectError),

    /// Fragment reassembly failure
    #[error(transparent)]
    Reassembly(#[from] ReassemblyError),

    /// Capture format detection failure
    #[error(transparent)]
    Sniff(#[from] SniffError),

    /// Capture stream decoding failure
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A requested range exceeds the bytes a view actually holds.
///
/// Recoverable and local to the current layer. Raised for reads past
/// `captured_len`, which covers both malformed offsets and snapshot
/// (snaplen) truncation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("read out of bounds: offset {offset} + length {len} > captured {captured}")]
pub struct BoundsError {
    /// Requested start offset.
    pub offset: usize,
    /// Requested length.
    pub len: usize,
    /// Bytes the view actually holds.
    pub captured: usize,
}

/// An in-protocol length field claims more bytes than the record holds.
///
/// Distinct from [`BoundsError`]: the packet itself asserts a size past its
/// own reported length, which is a malformation worth flagging in output
/// rather than a truncation artifact.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("reported length exceeded: offset {offset} + claimed {claimed} > reported {reported}")]
pub struct ReportedLengthError {
    /// Offset at which the claim starts.
    pub offset: usize,
    /// Length the protocol claims.
    pub claimed: usize,
    /// The view's reported (on-the-wire) length.
    pub reported: usize,
}

/// Registry construction failures.
///
/// Duplicate registration is a programming error and is fatal immediately
/// at init, never surfaced during packet processing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// A protocol name or filter name was registered twice
    #[error("duplicate protocol registration: {name}")]
    DuplicateProtocol { name: String },

    /// A field filter name was registered twice
    #[error("duplicate field registration: {filter_name}")]
    DuplicateField { filter_name: String },

    /// A field referenced a protocol id that was never registered
    #[error("field {filter_name} references unknown protocol id {protocol}")]
    UnknownProtocol { filter_name: String, protocol: u32 },

    /// A dissector table name was registered twice
    #[error("duplicate dissector table: {name}")]
    DuplicateTable { name: String },

    /// A registration targeted a table that was never created
    #[error("unknown dissector table: {name}")]
    UnknownTable { name: String },

    /// A registration used the wrong key kind for its table
    #[error("dissector table {name} does not take {given} keys")]
    TableKeyMismatch {
        name: String,
        given: &'static str,
    },
}

/// Faults raised while a single dissector decodes a single layer.
///
/// All variants are trapped at the dispatch boundary and converted into a
/// malformed marker on the output tree; none of them unwinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DissectError {
    /// Read past the view's captured bytes
    #[error(transparent)]
    Bounds(#[from] BoundsError),

    /// In-protocol length claim past the view's reported length
    #[error(transparent)]
    ReportedLength(#[from] ReportedLengthError),

    /// A decoder rejected the bytes with its own reason
    #[error("{protocol}: malformed: {reason}")]
    Malformed {
        protocol: &'static str,
        reason: String,
    },
}

/// Fragment reassembly failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyError {
    /// A fragment would grow the PDU past the declared maximum
    #[error("fragment at offset {offset} would exceed max PDU size {max} (pdu would be {would_be})")]
    PduTooLarge {
        offset: usize,
        would_be: usize,
        max: usize,
    },

    /// A fragment arrived for a key whose PDU already completed
    #[error("fragment added to already-completed PDU")]
    AlreadyComplete,
}

/// Capture format detection failures.
#[derive(Error, Debug)]
pub enum SniffError {
    /// No registered open routine claimed the input.
    ///
    /// This is a negative probe result, not a fault; callers decide
    /// whether to treat it as one.
    #[error("unrecognized capture format")]
    UnrecognizedFormat,

    /// I/O failure while probing. Aborts the probe sequence immediately.
    #[error("I/O error while probing capture format: {0}")]
    Io(#[from] std::io::Error),
}

/// Capture stream decoding failures.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The capture stream could not be parsed as its detected format
    #[error("malformed capture stream: {reason}")]
    Malformed { reason: String },

    /// I/O failure while reading the capture
    #[error("I/O error while reading capture: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our root Error type.
pub type Result<T> = std::result::Result<T, Error>;
