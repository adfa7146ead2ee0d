use std::slice;
use std::vec;

use sxd_xpath::nodeset::{Node, Nodeset};

use crate::error::XPathError;
use crate::value::Object;

/// Read-only, ordered sequence of nodes handed to callers and extension functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodeList<'d> {
    nodes: Vec<Node<'d>>,
}

impl<'d> NodeList<'d> {
    pub const EMPTY: NodeList<'static> = NodeList { nodes: Vec::new() };

    pub fn new(nodes: Vec<Node<'d>>) -> Self {
        Self { nodes }
    }

    /// Snapshot of an engine node-set in document order.
    pub fn from_nodeset(nodeset: &Nodeset<'d>) -> Self {
        Self { nodes: nodeset.document_order() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn item(&self, index: usize) -> Option<Node<'d>> {
        self.nodes.get(index).copied()
    }

    pub fn first(&self) -> Option<Node<'d>> {
        self.nodes.first().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Node<'d>> + '_ {
        self.nodes.iter().copied()
    }

    pub fn as_slice(&self) -> &[Node<'d>] {
        &self.nodes
    }

    pub(crate) fn to_nodeset(&self) -> Nodeset<'d> {
        self.nodes.iter().copied().collect()
    }
}

impl<'d> TryFrom<Object<'d>> for NodeList<'d> {
    type Error = XPathError;

    fn try_from(value: Object<'d>) -> Result<Self, Self::Error> {
        match value {
            Object::Nodes(list) => Ok(list),
            Object::Collection(items) => items
                .into_iter()
                .map(|item| match item {
                    Object::Node(node) => Ok(node),
                    other => Err(not_a_node_list(&other)),
                })
                .collect(),
            other => Err(not_a_node_list(&other)),
        }
    }
}

fn not_a_node_list(value: &Object<'_>) -> XPathError {
    XPathError::InvalidArgument(format!("expected an ordered list of nodes, got {}", value.kind()))
}

impl<'d> FromIterator<Node<'d>> for NodeList<'d> {
    fn from_iter<I: IntoIterator<Item = Node<'d>>>(iter: I) -> Self {
        Self { nodes: iter.into_iter().collect() }
    }
}

impl<'d> From<Vec<Node<'d>>> for NodeList<'d> {
    fn from(nodes: Vec<Node<'d>>) -> Self {
        Self { nodes }
    }
}

impl<'d> IntoIterator for NodeList<'d> {
    type Item = Node<'d>;
    type IntoIter = vec::IntoIter<Node<'d>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

impl<'a, 'd> IntoIterator for &'a NodeList<'d> {
    type Item = &'a Node<'d>;
    type IntoIter = slice::Iter<'a, Node<'d>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
