//! Graph Links
//!
//! A link is the edge between a dependency (the node being read) and a
//! subscriber (the node doing the reading). Every link sits in two
//! doubly-linked lists at once:
//!
//! - the subscriber's dependency list (`prev_dep` / `next_dep`), ordered by
//!   the order in which the subscriber read its dependencies;
//! - the dependency's subscriber list (`prev_sub` / `next_sub`), ordered by
//!   the order in which subscribers first read it.
//!
//! Links live in an arena and are freed through a single path
//! ([`Graph::clear_tracking`] or [`Graph::release`]), after being unlinked
//! from both lists.

use smallvec::{smallvec, SmallVec};

use super::node::{Freshness, NodeId, Role};
use super::Graph;

slotmap::new_key_type! {
    /// Identifier of a link in the link arena.
    pub struct LinkId;
}

/// An edge from `dep` to `sub`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Link {
    pub(crate) dep: NodeId,
    pub(crate) sub: NodeId,
    pub(crate) prev_dep: Option<LinkId>,
    pub(crate) next_dep: Option<LinkId>,
    pub(crate) prev_sub: Option<LinkId>,
    pub(crate) next_sub: Option<LinkId>,
}

impl Graph {
    /// Record that `sub` read `dep` during its current evaluation.
    ///
    /// Re-reading a dependency that is already in place is a no-op. A
    /// dependency left over from the previous evaluation is reused and moved
    /// up to the tracking cursor, so that everything up to the cursor is
    /// exactly what this evaluation read.
    pub(crate) fn link(&mut self, dep: NodeId, sub: NodeId) {
        if dep == sub || !self.nodes.contains_key(dep) {
            return;
        }
        let (tail, head) = match self.nodes.get(sub) {
            Some(node) => (node.deps_tail, node.deps),
            None => return,
        };

        if let Some(tail) = tail {
            if self.links[tail].dep == dep {
                return;
            }
        }

        let next = match tail {
            Some(tail) => self.links[tail].next_dep,
            None => head,
        };
        if let Some(next) = next {
            if self.links[next].dep == dep {
                self.nodes[sub].deps_tail = Some(next);
                return;
            }
        }

        // Slow path: the dependency may sit anywhere in the list.
        let mut cursor = head;
        let mut stale = tail.is_none();
        while let Some(id) = cursor {
            let link = self.links[id];
            if link.dep == dep {
                if stale {
                    self.detach_dep_side(id);
                    self.attach_after_tail(sub, id);
                }
                return;
            }
            if Some(id) == tail {
                stale = true;
            }
            cursor = link.next_dep;
        }

        let id = self.links.insert(Link {
            dep,
            sub,
            prev_dep: None,
            next_dep: None,
            prev_sub: None,
            next_sub: None,
        });
        self.attach_after_tail(sub, id);

        let dep_node = &mut self.nodes[dep];
        let last_sub = dep_node.subs_tail;
        dep_node.subs_tail = Some(id);
        match last_sub {
            Some(last) => self.links[last].next_sub = Some(id),
            None => dep_node.subs = Some(id),
        }
        self.links[id].prev_sub = last_sub;
    }

    /// Insert `id` into `sub`'s dependency list right after the tracking
    /// cursor and move the cursor onto it.
    fn attach_after_tail(&mut self, sub: NodeId, id: LinkId) {
        let node = &mut self.nodes[sub];
        let tail = node.deps_tail;
        let next = match tail {
            Some(tail) => self.links[tail].next_dep,
            None => node.deps,
        };
        node.deps_tail = Some(id);
        if tail.is_none() {
            node.deps = Some(id);
        }

        let link = &mut self.links[id];
        link.prev_dep = tail;
        link.next_dep = next;
        if let Some(tail) = tail {
            self.links[tail].next_dep = Some(id);
        }
        if let Some(next) = next {
            self.links[next].prev_dep = Some(id);
        }
    }

    /// Unlink `id` from its subscriber's dependency list.
    pub(crate) fn detach_dep_side(&mut self, id: LinkId) {
        let Link {
            sub,
            prev_dep,
            next_dep,
            ..
        } = self.links[id];

        match prev_dep {
            Some(prev) => self.links[prev].next_dep = next_dep,
            None => {
                if let Some(node) = self.nodes.get_mut(sub) {
                    node.deps = next_dep;
                }
            }
        }
        if let Some(next) = next_dep {
            self.links[next].prev_dep = prev_dep;
        }
        if let Some(node) = self.nodes.get_mut(sub) {
            if node.deps_tail == Some(id) {
                node.deps_tail = prev_dep;
            }
        }
    }

    /// Unlink `id` from its dependency's subscriber list.
    pub(crate) fn detach_sub_side(&mut self, id: LinkId) {
        let Link {
            dep,
            prev_sub,
            next_sub,
            ..
        } = self.links[id];

        match prev_sub {
            Some(prev) => self.links[prev].next_sub = next_sub,
            None => {
                if let Some(node) = self.nodes.get_mut(dep) {
                    node.subs = next_sub;
                }
            }
        }
        match next_sub {
            Some(next) => self.links[next].prev_sub = prev_sub,
            None => {
                if let Some(node) = self.nodes.get_mut(dep) {
                    node.subs_tail = prev_sub;
                }
            }
        }
    }

    /// Free a chain of dependency links that has already been cut out of
    /// its subscriber's list.
    ///
    /// A dependency left without subscribers can no longer hear about
    /// changes, so it is marked dirty and its own dependencies are cleared
    /// as well. Effects and scopes detached this way have lost their owner
    /// and are freed.
    pub(crate) fn clear_tracking(&mut self, first: LinkId) {
        let mut chains: SmallVec<[LinkId; 4]> = smallvec![first];

        while let Some(start) = chains.pop() {
            let mut cursor = Some(start);
            while let Some(id) = cursor {
                let Some(link) = self.links.get(id).copied() else {
                    break;
                };
                self.detach_sub_side(id);
                self.links.remove(id);
                cursor = link.next_dep;

                let Some(node) = self.nodes.get_mut(link.dep) else {
                    continue;
                };
                if node.subs.is_some() {
                    continue;
                }
                let owned = match &mut node.role {
                    Role::Signal => continue,
                    Role::Computed { status, .. } => {
                        status.freshness = Freshness::Dirty;
                        false
                    }
                    Role::Effect { status, .. } | Role::Scope { status } => {
                        status.freshness = Freshness::Dirty;
                        true
                    }
                };
                node.deps_tail = None;
                if let Some(deps) = node.deps.take() {
                    chains.push(deps);
                }
                if owned {
                    self.free(link.dep);
                }
            }
        }
    }

    /// Begin a (re-)evaluation of `sub`: rewind the tracking cursor and reset
    /// the propagation state.
    pub(crate) fn start_tracking(&mut self, sub: NodeId) {
        let Some(node) = self.nodes.get_mut(sub) else {
            return;
        };
        node.deps_tail = None;
        if let Some(status) = node.status_mut() {
            status.freshness = Freshness::Clean;
            status.notified = false;
            status.recursed = false;
            status.pending_inner = false;
            status.tracking = true;
        }
    }

    /// Finish an evaluation of `sub`: drop every dependency past the tracking
    /// cursor, i.e. everything this evaluation did not read.
    pub(crate) fn end_tracking(&mut self, sub: NodeId) {
        let Some(node) = self.nodes.get_mut(sub) else {
            return;
        };
        if let Some(status) = node.status_mut() {
            status.tracking = false;
        }
        let stale = match node.deps_tail {
            Some(tail) => self.links[tail].next_dep.take(),
            None => node.deps.take(),
        };
        if let Some(stale) = stale {
            self.links[stale].prev_dep = None;
            self.clear_tracking(stale);
        }
    }

    /// Whether `id` lies within the part of `sub`'s dependency list that the
    /// current evaluation has already read.
    pub(crate) fn is_tracked_link(&self, id: LinkId, sub: NodeId) -> bool {
        let Some(node) = self.nodes.get(sub) else {
            return false;
        };
        let Some(tail) = node.deps_tail else {
            return false;
        };
        let mut cursor = node.deps;
        while let Some(current) = cursor {
            if current == id {
                return true;
            }
            if current == tail {
                break;
            }
            cursor = self.links[current].next_dep;
        }
        false
    }

    /// Remove `id` from the graph: clear its dependencies, detach it from
    /// every subscriber and free the slot. Unknown ids are ignored.
    pub(crate) fn release(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let deps = node.deps.take();
        node.deps_tail = None;
        let mut cursor = node.subs.take();
        node.subs_tail = None;

        while let Some(link) = cursor {
            self.detach_dep_side(link);
            cursor = self.links.remove(link).and_then(|link| link.next_sub);
        }
        if let Some(deps) = deps {
            self.links[deps].prev_dep = None;
            self.clear_tracking(deps);
        }
        self.free(id);
    }

    /// Free the slot of a node that no longer has links.
    fn free(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(id) {
            if let Role::Effect { body, .. } = node.role {
                // Dropped by the runtime once the graph is no longer borrowed.
                self.released.push(body);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{Role, Status};

    fn subscriber(graph: &mut Graph) -> NodeId {
        graph.insert(Role::Scope {
            status: Status::default(),
        })
    }

    fn deps_of(graph: &Graph, sub: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = graph.nodes[sub].deps;
        while let Some(id) = cursor {
            out.push(graph.links[id].dep);
            cursor = graph.links[id].next_dep;
        }
        out
    }

    fn track(graph: &mut Graph, sub: NodeId, reads: &[NodeId]) {
        graph.start_tracking(sub);
        for &dep in reads {
            graph.link(dep, sub);
        }
        graph.end_tracking(sub);
    }

    #[test]
    fn relinking_the_same_dependency_is_a_noop() {
        let mut graph = Graph::default();
        let a = graph.insert(Role::Signal);
        let sub = subscriber(&mut graph);

        track(&mut graph, sub, &[a, a, a]);

        assert_eq!(deps_of(&graph, sub), vec![a]);
        assert_eq!(graph.subscriber_count(a), 1);
        assert_eq!(graph.links.len(), 1);
    }

    #[test]
    fn interleaved_rereads_do_not_duplicate_links() {
        let mut graph = Graph::default();
        let a = graph.insert(Role::Signal);
        let b = graph.insert(Role::Signal);
        let sub = subscriber(&mut graph);

        track(&mut graph, sub, &[a, b, a, b]);

        assert_eq!(deps_of(&graph, sub), vec![a, b]);
        assert_eq!(graph.links.len(), 2);
    }

    #[test]
    fn end_tracking_prunes_unread_dependencies() {
        let mut graph = Graph::default();
        let a = graph.insert(Role::Signal);
        let b = graph.insert(Role::Signal);
        let c = graph.insert(Role::Signal);
        let sub = subscriber(&mut graph);

        track(&mut graph, sub, &[a, b, c]);
        track(&mut graph, sub, &[a, c]);

        assert_eq!(deps_of(&graph, sub), vec![a, c]);
        assert_eq!(graph.subscriber_count(b), 0);
        assert_eq!(graph.links.len(), 2);
    }

    #[test]
    fn reordered_reads_reuse_existing_links() {
        let mut graph = Graph::default();
        let a = graph.insert(Role::Signal);
        let b = graph.insert(Role::Signal);
        let c = graph.insert(Role::Signal);
        let sub = subscriber(&mut graph);

        track(&mut graph, sub, &[a, b, c]);
        let before: Vec<_> = graph.links.keys().collect();

        track(&mut graph, sub, &[c, a, b]);

        assert_eq!(deps_of(&graph, sub), vec![c, a, b]);
        let mut after: Vec<_> = graph.links.keys().collect();
        let mut before = before;
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn release_detaches_both_directions() {
        let mut graph = Graph::default();
        let a = graph.insert(Role::Signal);
        let middle = subscriber(&mut graph);
        let sub = subscriber(&mut graph);

        track(&mut graph, middle, &[a]);
        track(&mut graph, sub, &[middle]);

        graph.release(middle);

        assert!(!graph.nodes.contains_key(middle));
        assert_eq!(graph.subscriber_count(a), 0);
        assert!(deps_of(&graph, sub).is_empty());
        assert!(graph.links.is_empty());
    }

    #[test]
    fn tracked_region_is_bounded_by_cursor() {
        let mut graph = Graph::default();
        let a = graph.insert(Role::Signal);
        let b = graph.insert(Role::Signal);
        let sub = subscriber(&mut graph);
        track(&mut graph, sub, &[a, b]);

        let first = graph.nodes[sub].deps.unwrap();
        let second = graph.links[first].next_dep.unwrap();

        graph.start_tracking(sub);
        graph.link(a, sub);
        assert!(graph.is_tracked_link(first, sub));
        assert!(!graph.is_tracked_link(second, sub));
        graph.end_tracking(sub);
    }
}
