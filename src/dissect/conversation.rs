//! Conversation tracking.
//!
//! A conversation is the state attached to an identified flow: two
//! endpoints plus a transport, normalized so both directions map to the
//! same key. Conversations are created lazily on first sight and persist
//! for the capture session, which is what gives stateful dissectors
//! (reassembly, multi-packet protocols) continuity across frames.

use std::any::Any;
use std::collections::HashMap;
use std::net::IpAddr;

use crate::registry::ProtocolId;

/// Transport discriminator of a conversation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Transport {
    Tcp,
    Udp,
    Sctp,
    /// Any other IP protocol number.
    Other(u8),
}

/// One side of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub addr: IpAddr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(addr: IpAddr, port: u16) -> Self {
        Self { addr, port }
    }
}

/// Normalized conversation key: the lexicographically smaller endpoint is
/// stored first so both directions of a flow share one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    a: Endpoint,
    b: Endpoint,
    transport: Transport,
}

impl ConversationKey {
    pub fn new(src: Endpoint, dst: Endpoint, transport: Transport) -> Self {
        if src <= dst {
            Self {
                a: src,
                b: dst,
                transport,
            }
        } else {
            Self {
                a: dst,
                b: src,
                transport,
            }
        }
    }

    pub fn endpoints(&self) -> (Endpoint, Endpoint) {
        (self.a, self.b)
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }
}

/// State attached to one flow for the lifetime of the capture session.
///
/// Dissectors hang their private state off the conversation keyed by their
/// protocol id; the slot is a type-erased box the owning dissector
/// downcasts back.
#[derive(Debug)]
pub struct Conversation {
    pub id: u64,
    key: ConversationKey,
    /// First and last frame numbers that touched this conversation.
    pub first_frame: u64,
    pub last_frame: u64,
    state: HashMap<ProtocolId, Box<dyn Any + Send>>,
}

impl Conversation {
    fn new(id: u64, key: ConversationKey, frame: u64) -> Self {
        Self {
            id,
            key,
            first_frame: frame,
            last_frame: frame,
            state: HashMap::new(),
        }
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Store dissector-private state, replacing any previous value.
    pub fn set_state<T: Any + Send>(&mut self, protocol: ProtocolId, state: T) {
        self.state.insert(protocol, Box::new(state));
    }

    /// Borrow dissector-private state.
    pub fn state<T: Any + Send>(&self, protocol: ProtocolId) -> Option<&T> {
        self.state.get(&protocol).and_then(|s| s.downcast_ref())
    }

    /// Mutably borrow dissector-private state.
    pub fn state_mut<T: Any + Send>(&mut self, protocol: ProtocolId) -> Option<&mut T> {
        self.state.get_mut(&protocol).and_then(|s| s.downcast_mut())
    }

    /// Borrow state, inserting a default-constructed value on first use.
    pub fn state_or_default<T: Any + Send + Default>(&mut self, protocol: ProtocolId) -> &mut T {
        self.state
            .entry(protocol)
            .or_insert_with(|| Box::<T>::default())
            .downcast_mut()
            .expect("conversation state slot holds the registering type")
    }
}

/// All conversations of one capture session.
///
/// Single-session dissection is sequential, so this is plain mutable
/// state owned by the engine; independent sessions own disjoint maps.
#[derive(Debug, Default)]
pub struct ConversationMap {
    map: HashMap<ConversationKey, Conversation>,
    next_id: u64,
}

impl ConversationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find or lazily create the conversation for `key`.
    pub fn get_or_create(&mut self, key: ConversationKey, frame: u64) -> &mut Conversation {
        let conv = self.map.entry(key).or_insert_with(|| {
            self.next_id += 1;
            Conversation::new(self.next_id, key, frame)
        });
        conv.last_frame = conv.last_frame.max(frame);
        conv
    }

    pub fn get(&self, key: &ConversationKey) -> Option<&Conversation> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &ConversationKey) -> Option<&mut Conversation> {
        self.map.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
