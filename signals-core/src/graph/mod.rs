//! Dependency Graph
//!
//! This module implements the graph that connects reactive values to the
//! computations that read them.
//!
//! # Overview
//!
//! - Nodes are signals (sources), computeds (cached derivations), effects
//!   (side effects) and scopes (owners of effects).
//! - Links are edges from a dependency to a subscriber. Each link is a member
//!   of two intrusive doubly-linked lists, so both directions can be walked
//!   and a link can be removed in O(1).
//!
//! Both nodes and links live in generational arenas. Nothing in this module
//! runs user code: evaluating getters and effect bodies is the runtime's job,
//! which lets the runtime drop its borrow of the graph around every call out.
//!
//! # Design Decisions
//!
//! 1. Distributed linked lists instead of per-node hash sets: re-reading the
//!    dependencies of the previous evaluation in the same order costs one
//!    pointer comparison per read.
//!
//! 2. Propagation and dirty checking walk the graph with explicit stacks, so
//!    deep or wide graphs never grow the call stack.

pub(crate) mod link;
pub(crate) mod node;
mod propagate;

use std::collections::VecDeque;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use link::Link;
use node::{Node, Role, Status};

pub use link::LinkId;
pub use node::{Freshness, NodeId, NodeKind};
pub(crate) use propagate::CheckStep;

/// Node and link counts of a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub signals: usize,
    pub computeds: usize,
    pub effects: usize,
    pub scopes: usize,
    pub links: usize,
}

impl GraphStats {
    /// Total number of live nodes.
    pub fn nodes(&self) -> usize {
        self.signals + self.computeds + self.effects + self.scopes
    }
}

/// The dependency graph of one runtime.
#[derive(Default)]
pub(crate) struct Graph {
    pub(crate) nodes: SlotMap<NodeId, Node>,
    pub(crate) links: SlotMap<LinkId, Link>,

    /// Effects (and scopes) waiting to be notified, in propagation order.
    pub(crate) queue: VecDeque<NodeId>,

    /// Effect callbacks of freed nodes. They may own handles whose drop
    /// re-enters the graph, so they are dropped after the borrow ends.
    pub(crate) released: Vec<Rc<dyn Fn()>>,
}

impl Graph {
    pub(crate) fn with_capacity(nodes: usize, links: usize) -> Self {
        Self {
            nodes: SlotMap::with_capacity_and_key(nodes),
            links: SlotMap::with_capacity_and_key(links),
            queue: VecDeque::new(),
            released: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, role: Role) -> NodeId {
        self.nodes.insert(Node::new(role))
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub(crate) fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(id).map(Node::kind)
    }

    pub(crate) fn status(&self, id: NodeId) -> Option<Status> {
        self.nodes.get(id).and_then(Node::status).copied()
    }

    pub(crate) fn status_mut(&mut self, id: NodeId) -> Option<&mut Status> {
        self.nodes.get_mut(id).and_then(Node::status_mut)
    }

    pub(crate) fn first_dep(&self, id: NodeId) -> Option<LinkId> {
        self.nodes.get(id).and_then(|node| node.deps)
    }

    pub(crate) fn first_sub(&self, id: NodeId) -> Option<LinkId> {
        self.nodes.get(id).and_then(|node| node.subs)
    }

    pub(crate) fn next_dep(&self, id: LinkId) -> Option<LinkId> {
        self.links.get(id).and_then(|link| link.next_dep)
    }

    pub(crate) fn dependency_count(&self, id: NodeId) -> usize {
        let mut count = 0;
        let mut cursor = self.first_dep(id);
        while let Some(link) = cursor {
            count += 1;
            cursor = self.links[link].next_dep;
        }
        count
    }

    pub(crate) fn subscriber_count(&self, id: NodeId) -> usize {
        let mut count = 0;
        let mut cursor = self.first_sub(id);
        while let Some(link) = cursor {
            count += 1;
            cursor = self.links[link].next_sub;
        }
        count
    }

    /// Effect callback of `id`, if it is a live effect.
    pub(crate) fn effect_body(&self, id: NodeId) -> Option<Rc<dyn Fn()>> {
        match self.nodes.get(id).map(|node| &node.role) {
            Some(Role::Effect { body, .. }) => Some(Rc::clone(body)),
            _ => None,
        }
    }

    pub(crate) fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            links: self.links.len(),
            ..GraphStats::default()
        };
        for node in self.nodes.values() {
            match node.kind() {
                NodeKind::Signal => stats.signals += 1,
                NodeKind::Computed => stats.computeds += 1,
                NodeKind::Effect => stats.effects += 1,
                NodeKind::Scope => stats.scopes += 1,
            }
        }
        stats
    }
}
