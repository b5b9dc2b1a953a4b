//! Decoded field values.
//!
//! [`FieldValue`] carries the decoded value a tree node displays. Values
//! are fully owned: byte payloads share the frame backing through
//! refcounted [`Bytes`] rather than borrowing, so tree nodes stay valid for
//! exactly as long as the caller keeps the frame's output alive.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::Bytes;
use compact_str::CompactString;

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// No value; the node groups children.
    None,
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Int64(i64),
    Bool(bool),
    /// IP address (v4 or v6).
    IpAddr(IpAddr),
    /// MAC address (6 bytes).
    MacAddr([u8; 6]),
    /// Constructed text. Uses CompactString for small-string optimization.
    Str(CompactString),
    /// Binary payload sharing the frame backing (no copy).
    Bytes(Bytes),
}

impl FieldValue {
    /// Constructed text value.
    pub fn text(s: impl AsRef<str>) -> Self {
        FieldValue::Str(CompactString::new(s.as_ref()))
    }

    /// MAC address from the first 6 bytes of a slice.
    pub fn mac(bytes: &[u8]) -> Self {
        if bytes.len() >= 6 {
            let mut mac = [0u8; 6];
            mac.copy_from_slice(&bytes[..6]);
            FieldValue::MacAddr(mac)
        } else {
            FieldValue::None
        }
    }

    /// IPv4 address from the first 4 bytes of a slice.
    pub fn ipv4(bytes: &[u8]) -> Self {
        if bytes.len() >= 4 {
            FieldValue::IpAddr(IpAddr::V4(Ipv4Addr::new(
                bytes[0], bytes[1], bytes[2], bytes[3],
            )))
        } else {
            FieldValue::None
        }
    }

    /// IPv6 address from the first 16 bytes of a slice.
    pub fn ipv6(bytes: &[u8]) -> Self {
        if bytes.len() >= 16 {
            let mut arr = [0u8; 16];
            arr.copy_from_slice(&bytes[..16]);
            FieldValue::IpAddr(IpAddr::V6(Ipv6Addr::from(arr)))
        } else {
            FieldValue::None
        }
    }

    /// Format a MAC address.
    pub fn format_mac(mac: &[u8; 6]) -> String {
        format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
        )
    }

    /// Try to get as u64 (any unsigned width).
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::UInt8(v) => Some(*v as u64),
            FieldValue::UInt16(v) => Some(*v as u64),
            FieldValue::UInt32(v) => Some(*v as u64),
            FieldValue::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Try to get as a byte slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Whether this carries no value.
    pub fn is_none(&self) -> bool {
        matches!(self, FieldValue::None)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::None => Ok(()),
            FieldValue::UInt8(v) => write!(f, "{v}"),
            FieldValue::UInt16(v) => write!(f, "{v}"),
            FieldValue::UInt32(v) => write!(f, "{v}"),
            FieldValue::UInt64(v) => write!(f, "{v}"),
            FieldValue::Int64(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::IpAddr(addr) => write!(f, "{addr}"),
            FieldValue::MacAddr(mac) => write!(f, "{}", Self::format_mac(mac)),
            FieldValue::Str(s) => write!(f, "{s}"),
            FieldValue::Bytes(b) => write!(f, "[{} bytes]", b.len()),
        }
    }
}
