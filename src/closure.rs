//! Localizable closure.
//!
//! For a root page, the set of reachable nodes that must be copied per
//! locale: every loaded node that is locale-sensitive itself, or that
//! structurally references a node that is. Membership is decided bottom-up
//! (post-order), so a node's children are settled before the node is.
//!
//! The replication order is a separate root-first walk restricted to
//! non-inline members: a node is always copied after every member that will
//! reference the copy.

use crate::classify::needs_localization;
use crate::graph::{ContentGraph, Edge, NodeId, Order};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct LocalizableClosure {
    pub root: NodeId,
    pub members: BTreeSet<NodeId>,
    /// Non-inline members, root first.
    pub pre_order: Vec<NodeId>,
}

impl LocalizableClosure {
    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Edges the closure follows: everything but links, redirects, source maps
/// and the bootstrapper.
pub fn follows(edge: &Edge) -> bool {
    edge.kind.is_structural()
}

pub fn build_closure(graph: &ContentGraph, root: NodeId) -> LocalizableClosure {
    let mut members = BTreeSet::new();
    for id in graph.traverse(root, follows, Order::Post) {
        let loaded = graph.node(id).is_some_and(|n| n.is_loaded());
        if !loaded {
            continue;
        }
        let depends_on_member = graph
            .outgoing(id)
            .iter()
            .filter_map(|e| graph.edge(*e))
            .any(|e| follows(e) && members.contains(&e.to));
        if depends_on_member || needs_localization(graph, id) {
            members.insert(id);
        }
    }

    let pre_order = graph
        .traverse(root, follows, Order::Pre)
        .into_iter()
        .filter(|id| members.contains(id))
        .filter(|id| graph.node(*id).is_some_and(|n| !n.is_inline()))
        .collect();

    LocalizableClosure {
        root,
        members,
        pre_order,
    }
}
