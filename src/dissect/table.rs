//! Dissector tables: keyed registries resolving bytes to decoders.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::buffer::ByteView;
use crate::dissect::{Dissector, FrameContext, Verdict};
use crate::error::{DissectError, InitError};
use crate::registry::ProtocolId;

/// Key kind a table accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Exact unsigned-integer keys (port numbers, ethertypes, ...).
    Uint,
    /// Exact string keys (media types, ALPN ids, ...).
    Str,
    /// No keys; handles are probed in registration order.
    Heuristic,
}

/// Lookup key for a dispatch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKey<'a> {
    Uint(u32),
    Str(&'a str),
    /// Heuristic tables take no key.
    Heuristic,
}

/// A registry mapping keys to one or more dissector handles.
///
/// Exact-key tables are last-writer-wins: re-registering a key replaces
/// the previous handle. Heuristic tables append and preserve registration
/// order; that order is the tie-break contract (first registered wins).
pub struct DissectorTable {
    name: &'static str,
    entries: Entries,
}

enum Entries {
    Uint(HashMap<u32, DissectorHandle>),
    Str(HashMap<String, DissectorHandle>),
    Heuristic(Vec<DissectorHandle>),
}

impl DissectorTable {
    pub(crate) fn new(name: &'static str, kind: TableKind) -> Self {
        let entries = match kind {
            TableKind::Uint => Entries::Uint(HashMap::new()),
            TableKind::Str => Entries::Str(HashMap::new()),
            TableKind::Heuristic => Entries::Heuristic(Vec::new()),
        };
        Self { name, entries }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> TableKind {
        match &self.entries {
            Entries::Uint(_) => TableKind::Uint,
            Entries::Str(_) => TableKind::Str,
            Entries::Heuristic(_) => TableKind::Heuristic,
        }
    }

    /// Register under an integer key. Last writer wins.
    pub(crate) fn add_uint(
        &mut self,
        key: u32,
        handle: DissectorHandle,
    ) -> Result<(), InitError> {
        match &mut self.entries {
            Entries::Uint(map) => {
                map.insert(key, handle);
                Ok(())
            }
            _ => Err(self.key_mismatch("uint")),
        }
    }

    /// Register under a string key. Last writer wins.
    pub(crate) fn add_string(
        &mut self,
        key: &str,
        handle: DissectorHandle,
    ) -> Result<(), InitError> {
        match &mut self.entries {
            Entries::Str(map) => {
                map.insert(key.to_string(), handle);
                Ok(())
            }
            _ => Err(self.key_mismatch("string")),
        }
    }

    /// Append a heuristic handle, preserving registration order.
    pub(crate) fn add_heuristic(&mut self, handle: DissectorHandle) -> Result<(), InitError> {
        match &mut self.entries {
            Entries::Heuristic(list) => {
                list.push(handle);
                Ok(())
            }
            _ => Err(self.key_mismatch("heuristic")),
        }
    }

    /// Exact lookup. Returns None for heuristic tables.
    pub(crate) fn find(&self, key: TableKey<'_>) -> Option<DissectorHandle> {
        match (&self.entries, key) {
            (Entries::Uint(map), TableKey::Uint(k)) => map.get(&k).cloned(),
            (Entries::Str(map), TableKey::Str(k)) => map.get(k).cloned(),
            _ => None,
        }
    }

    /// Heuristic handles in registration order. Empty for keyed tables.
    pub(crate) fn heuristics(&self) -> &[DissectorHandle] {
        match &self.entries {
            Entries::Heuristic(list) => list,
            _ => &[],
        }
    }

    /// Number of registered handles.
    pub fn len(&self) -> usize {
        match &self.entries {
            Entries::Uint(map) => map.len(),
            Entries::Str(map) => map.len(),
            Entries::Heuristic(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key_mismatch(&self, given: &'static str) -> InitError {
        InitError::TableKeyMismatch {
            name: self.name.to_string(),
            given,
        }
    }
}

impl fmt::Debug for DissectorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DissectorTable")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("len", &self.len())
            .finish()
    }
}

/// Cheap clonable handle to a registered dissector.
#[derive(Clone)]
pub struct DissectorHandle {
    inner: Arc<dyn Dissector>,
}

impl DissectorHandle {
    pub fn new(dissector: impl Dissector + 'static) -> Self {
        Self {
            inner: Arc::new(dissector),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    pub fn protocol(&self) -> ProtocolId {
        self.inner.protocol()
    }

    pub(crate) fn attempt(
        &self,
        view: &ByteView,
        ctx: &mut FrameContext,
        engine: &mut crate::dissect::DispatchEngine,
    ) -> Result<Verdict, DissectError> {
        self.inner.attempt(view, ctx, engine)
    }
}

impl fmt::Debug for DissectorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DissectorHandle")
            .field("name", &self.name())
            .field("protocol", &self.protocol())
            .finish()
    }
}
