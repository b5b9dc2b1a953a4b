//! Output field tree.
//!
//! Dissection of one frame produces a [`ProtoTree`]: an ordered tree of
//! `(field, byte range, value)` nodes referencing ranges in the originating
//! frame. The tree is the contract renderers, exporters, and filter engines
//! consume; how nodes are displayed is out of scope here.
//!
//! Nodes are stored in an index-based arena and are append-only. A fault in
//! a nested layer annotates the failing subtree and never invalidates nodes
//! ancestors already produced.

use smallvec::SmallVec;

use crate::error::DissectError;
use crate::registry::FieldId;
use crate::value::FieldValue;

/// Byte range within the originating frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: usize,
    pub len: usize,
}

impl ByteRange {
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Why a subtree was flagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnomalyKind {
    /// Read past the captured bytes.
    Bounds,
    /// In-protocol length claim past the reported length.
    ReportedLength,
    /// Decoder rejected the bytes.
    Malformed,
    /// Dispatch refused re-entry into an already-visited layer.
    LoopDetected,
    /// Fragment content conflict observed during reassembly.
    FragmentConflict,
}

/// Reason-carrying annotation on a flagged node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub reason: String,
}

impl Anomaly {
    pub fn from_dissect_error(err: &DissectError) -> Self {
        let kind = match err {
            DissectError::Bounds(_) => AnomalyKind::Bounds,
            DissectError::ReportedLength(_) => AnomalyKind::ReportedLength,
            DissectError::Malformed { .. } => AnomalyKind::Malformed,
        };
        Self {
            kind,
            reason: err.to_string(),
        }
    }
}

/// Index of a node within its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One node of the output tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub field: FieldId,
    pub range: ByteRange,
    pub value: FieldValue,
    /// Set when this node or its subtree was cut short.
    pub anomaly: Option<Anomaly>,
    children: SmallVec<[NodeId; 8]>,
}

impl TreeNode {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Ordered field tree for one dissected frame.
#[derive(Debug, Default)]
pub struct ProtoTree {
    nodes: Vec<TreeNode>,
    roots: SmallVec<[NodeId; 8]>,
}

impl ProtoTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a top-level node (one per protocol layer, typically).
    pub fn add_root(&mut self, field: FieldId, range: ByteRange, value: FieldValue) -> NodeId {
        let id = self.push(field, range, value);
        self.roots.push(id);
        id
    }

    /// Append a child under `parent`. Insertion order is display order.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        field: FieldId,
        range: ByteRange,
        value: FieldValue,
    ) -> NodeId {
        let id = self.push(field, range, value);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Annotate a node. Existing annotations are kept; the first reason
    /// observed for a node wins.
    pub fn mark(&mut self, node: NodeId, anomaly: Anomaly) {
        let slot = &mut self.nodes[node.0].anomaly;
        if slot.is_none() {
            *slot = Some(anomaly);
        }
    }

    fn push(&mut self, field: FieldId, range: ByteRange, value: FieldValue) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode {
            field,
            range,
            value,
            anomaly: None,
            children: SmallVec::new(),
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    /// Top-level nodes in insertion order.
    pub fn roots(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.roots.iter().map(move |id| (*id, self.node(*id)))
    }

    /// All nodes in insertion order (parents precede their children).
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i), n))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes carrying an anomaly, in insertion order.
    pub fn anomalies(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.iter().filter(|(_, n)| n.anomaly.is_some())
    }
}
