//! Process-wide protocol and field catalog.
//!
//! The registry is the single source of truth mapping protocol and field
//! names to numeric ids. It is built once during an explicit init phase via
//! [`RegistryBuilder`] and immutable afterward; a built [`Registry`] is
//! shared by reference (typically `Arc`) into every dissection call, so no
//! locking is needed once init completes.
//!
//! Duplicate registration is a programming error: it fails the build with
//! [`InitError`] at startup and is never deferred to packet-processing
//! time.
//!
//! ## Example
//!
//! ```rust
//! use dissect_core::registry::{FieldKind, RegistryBuilder};
//!
//! let mut builder = RegistryBuilder::new();
//! let ip = builder
//!     .register_protocol("Internet Protocol Version 4", "IPv4", "ip")
//!     .unwrap();
//! let src = builder
//!     .register_field(ip, "Source Address", "ip.src", FieldKind::Ipv4)
//!     .unwrap();
//! let registry = builder.build();
//!
//! assert_eq!(registry.protocol(ip).unwrap().short_name, "IPv4");
//! assert_eq!(registry.field_by_filter("ip.src").unwrap().id, src);
//! ```

use std::collections::HashMap;

use crate::error::InitError;

/// Numeric identifier of a registered protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolId(pub u32);

/// Numeric identifier of a registered field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u32);

/// Wire type of a registered field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// No value; the node groups children (protocol roots, containers).
    None,
    Bool,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int64,
    /// Variable-length binary data.
    Bytes,
    /// UTF-8 text.
    String,
    /// IPv4 address.
    Ipv4,
    /// IPv6 address.
    Ipv6,
    /// 6-byte MAC address.
    Mac,
}

/// A registered protocol.
#[derive(Debug, Clone)]
pub struct Protocol {
    pub id: ProtocolId,
    /// Full display name, e.g. "Transmission Control Protocol".
    pub name: &'static str,
    /// Short display name, e.g. "TCP".
    pub short_name: &'static str,
    /// Filter-language name, e.g. "tcp".
    pub filter_name: &'static str,
    /// Field the protocol's own tree node carries.
    pub root_field: FieldId,
}

/// A registered field.
#[derive(Debug, Clone)]
pub struct Field {
    pub id: FieldId,
    pub protocol: ProtocolId,
    /// Display name, e.g. "Source Port".
    pub name: &'static str,
    /// Filter-language name, e.g. "tcp.srcport".
    pub filter_name: &'static str,
    pub kind: FieldKind,
    /// Mask isolating the field's bits within its container, 0 when the
    /// field covers whole bytes.
    pub bit_mask: u64,
}

/// Write-once catalog builder. Consumed by [`build`](Self::build).
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    protocols: Vec<Protocol>,
    fields: Vec<Field>,
    protocol_names: HashMap<&'static str, ProtocolId>,
    field_filters: HashMap<&'static str, FieldId>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a protocol. Both `filter_name` and `name` must be unique
    /// across all protocols; a duplicate fails init.
    ///
    /// A root field for the protocol node is registered implicitly under
    /// the protocol's filter name.
    pub fn register_protocol(
        &mut self,
        name: &'static str,
        short_name: &'static str,
        filter_name: &'static str,
    ) -> Result<ProtocolId, InitError> {
        if self.protocol_names.contains_key(filter_name) || self.protocol_names.contains_key(name) {
            return Err(InitError::DuplicateProtocol {
                name: filter_name.to_string(),
            });
        }
        if self.field_filters.contains_key(filter_name) {
            return Err(InitError::DuplicateField {
                filter_name: filter_name.to_string(),
            });
        }

        let id = ProtocolId(self.protocols.len() as u32);
        let root_field = FieldId(self.fields.len() as u32);
        self.fields.push(Field {
            id: root_field,
            protocol: id,
            name,
            filter_name,
            kind: FieldKind::None,
            bit_mask: 0,
        });
        self.field_filters.insert(filter_name, root_field);

        self.protocols.push(Protocol {
            id,
            name,
            short_name,
            filter_name,
            root_field,
        });
        self.protocol_names.insert(filter_name, id);
        self.protocol_names.insert(name, id);
        Ok(id)
    }

    /// Register a field under a protocol. `filter_name` must be unique
    /// across all fields.
    pub fn register_field(
        &mut self,
        protocol: ProtocolId,
        name: &'static str,
        filter_name: &'static str,
        kind: FieldKind,
    ) -> Result<FieldId, InitError> {
        self.register_field_masked(protocol, name, filter_name, kind, 0)
    }

    /// Register a bit-masked field (flags and sub-byte values).
    pub fn register_field_masked(
        &mut self,
        protocol: ProtocolId,
        name: &'static str,
        filter_name: &'static str,
        kind: FieldKind,
        bit_mask: u64,
    ) -> Result<FieldId, InitError> {
        if protocol.0 as usize >= self.protocols.len() {
            return Err(InitError::UnknownProtocol {
                filter_name: filter_name.to_string(),
                protocol: protocol.0,
            });
        }
        if self.field_filters.contains_key(filter_name) {
            return Err(InitError::DuplicateField {
                filter_name: filter_name.to_string(),
            });
        }

        let id = FieldId(self.fields.len() as u32);
        self.fields.push(Field {
            id,
            protocol,
            name,
            filter_name,
            kind,
            bit_mask,
        });
        self.field_filters.insert(filter_name, id);
        Ok(id)
    }

    /// Finish the init phase. The returned registry is immutable.
    pub fn build(self) -> Registry {
        Registry {
            protocols: self.protocols,
            fields: self.fields,
            protocol_names: self.protocol_names,
            field_filters: self.field_filters,
        }
    }
}

/// Immutable protocol and field catalog.
///
/// Safe to share across threads and sessions; all lookups are reads.
#[derive(Debug)]
pub struct Registry {
    protocols: Vec<Protocol>,
    fields: Vec<Field>,
    protocol_names: HashMap<&'static str, ProtocolId>,
    field_filters: HashMap<&'static str, FieldId>,
}

impl Registry {
    /// Look up a protocol by id.
    pub fn protocol(&self, id: ProtocolId) -> Option<&Protocol> {
        self.protocols.get(id.0 as usize)
    }

    /// Look up a protocol by filter name or full name.
    pub fn protocol_by_name(&self, name: &str) -> Option<&Protocol> {
        self.protocol_names
            .get(name)
            .and_then(|id| self.protocol(*id))
    }

    /// Look up a field by id.
    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(id.0 as usize)
    }

    /// Look up a field by filter name.
    pub fn field_by_filter(&self, filter_name: &str) -> Option<&Field> {
        self.field_filters
            .get(filter_name)
            .and_then(|id| self.field(*id))
    }

    /// All fields belonging to one protocol, in registration order.
    pub fn fields_of(&self, protocol: ProtocolId) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(move |f| f.protocol == protocol)
    }

    /// Number of registered protocols.
    pub fn protocol_count(&self) -> usize {
        self.protocols.len()
    }

    /// Number of registered fields (protocol roots included).
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}
