//! Dependency graph module.
//!
//! Provides the `DependencyGraph` type: the arena that owns every node of a
//! sheet together with the directed acyclic "depends on" relation between
//! them. Edges point from a dependency to its dependent, so a node's
//! dependencies are its incoming neighbours and its dependents are its
//! outgoing neighbours. Both views come from the same edge, which keeps them
//! exact inverses of each other.

use crate::node::{Node, NodeId};
use petgraph::stable_graph::StableDiGraph;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Result of planning an update.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Propagation {
    /// Nodes to recompute, dependencies before dependents.
    pub(crate) order: Vec<NodeId>,
    /// Paused nodes the update stopped at.
    pub(crate) held: Vec<NodeId>,
}

/// Arena of nodes plus the acyclic dependency relation.
///
/// Indices are stable: removing a node never invalidates other handles,
/// and removing a node drops every edge touching it on both ends.
#[derive(Debug, Default)]
pub(crate) struct DependencyGraph {
    graph: StableDiGraph<Node, ()>,
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        Self {
            graph: StableDiGraph::new(),
        }
    }

    pub(crate) fn insert(&mut self, node: Node) -> NodeId {
        NodeId(self.graph.add_node(node))
    }

    /// Remove a node and every edge touching it.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.graph.remove_node(id.0)
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.graph.contains_node(id.0)
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.graph.node_weight(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.graph.node_weight_mut(id.0)
    }

    pub(crate) fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// All live nodes in creation order.
    pub(crate) fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.graph.node_indices().map(NodeId).collect();
        ids.sort();
        ids
    }

    /// Whether `dependent` directly depends on `dependency`.
    pub(crate) fn has_edge(&self, dependent: NodeId, dependency: NodeId) -> bool {
        self.graph.find_edge(dependency.0, dependent.0).is_some()
    }

    /// Whether `dependent` depends on `dependency`, directly or, when
    /// `recursive`, through any chain of dependencies.
    pub(crate) fn depends_on(&self, dependent: NodeId, dependency: NodeId, recursive: bool) -> bool {
        if !recursive {
            return self.has_edge(dependent, dependency);
        }
        dependent != dependency && self.path(dependency, dependent).is_some()
    }

    /// Shortest edge path `from -> ... -> to`, following dependent edges.
    fn path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        let mut previous: HashMap<NodeId, NodeId> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        let mut seen = BTreeSet::from([from]);

        while let Some(node) = queue.pop_front() {
            if node == to {
                let mut path = vec![to];
                let mut cursor = to;
                while let Some(&prev) = previous.get(&cursor) {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.dependents(node) {
                if seen.insert(next) {
                    previous.insert(next, node);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// The cycle that `dependent -> dependency` would close, if any.
    ///
    /// The path reads in "depends on" order and starts and ends with
    /// `dependent`.
    pub(crate) fn cycle_path(&self, dependent: NodeId, dependency: NodeId) -> Option<Vec<NodeId>> {
        if dependent == dependency {
            return Some(vec![dependent, dependent]);
        }
        // dependency already (transitively) depends on dependent
        let existing = self.path(dependent, dependency)?;
        let mut cycle = vec![dependent];
        cycle.extend(existing.into_iter().rev());
        Some(cycle)
    }

    /// Record that `dependent` depends on `dependency`.
    ///
    /// Returns `Ok(false)` if the edge already exists, or the cycle path if
    /// the edge would close a cycle. The graph is untouched on error.
    pub(crate) fn link(&mut self, dependent: NodeId, dependency: NodeId) -> Result<bool, Vec<NodeId>> {
        if self.has_edge(dependent, dependency) {
            return Ok(false);
        }
        if let Some(cycle) = self.cycle_path(dependent, dependency) {
            return Err(cycle);
        }
        self.graph.add_edge(dependency.0, dependent.0, ());
        Ok(true)
    }

    /// Drop the edge between `dependent` and `dependency` if present.
    pub(crate) fn unlink(&mut self, dependent: NodeId, dependency: NodeId) -> bool {
        match self.graph.find_edge(dependency.0, dependent.0) {
            Some(edge) => {
                self.graph.remove_edge(edge);
                true
            }
            None => false,
        }
    }

    /// Direct dependencies of `id`, in creation order.
    pub(crate) fn dependencies(&self, id: NodeId) -> Vec<NodeId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Direct dependents of `id`, in creation order.
    pub(crate) fn dependents(&self, id: NodeId) -> Vec<NodeId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: NodeId, direction: Direction) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .graph
            .neighbors_directed(id.0, direction)
            .map(NodeId)
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Plan the recompute order for an update starting at `origins`.
    ///
    /// Collects everything reachable from the origins without passing
    /// through paused nodes, then orders it with Kahn's algorithm restricted
    /// to that subgraph, so each node comes after all of its affected
    /// dependencies and appears exactly once.
    pub(crate) fn plan(&self, origins: &[NodeId]) -> Propagation {
        let mut affected: BTreeSet<NodeId> = BTreeSet::new();
        let mut held: BTreeSet<NodeId> = BTreeSet::new();
        let mut stack: Vec<NodeId> = origins
            .iter()
            .copied()
            .filter(|id| self.contains(*id))
            .collect();

        while let Some(node) = stack.pop() {
            if !affected.insert(node) {
                continue;
            }
            for next in self.dependents(node) {
                let paused = self.get(next).map(Node::is_paused).unwrap_or(false);
                if paused {
                    held.insert(next);
                } else if !affected.contains(&next) {
                    stack.push(next);
                }
            }
        }

        let mut in_degree: HashMap<NodeId, usize> = affected
            .iter()
            .map(|&node| {
                let count = self
                    .dependencies(node)
                    .into_iter()
                    .filter(|dep| affected.contains(dep))
                    .count();
                (node, count)
            })
            .collect();

        let mut queue: VecDeque<NodeId> = affected
            .iter()
            .copied()
            .filter(|node| in_degree[node] == 0)
            .collect();
        let mut order = Vec::with_capacity(affected.len());

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for next in self.dependents(node) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }

        Propagation {
            order,
            held: held.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(names: &[&str]) -> (DependencyGraph, Vec<NodeId>) {
        let mut graph = DependencyGraph::new();
        let ids = names
            .iter()
            .map(|name| graph.insert(Node::scalar(*name, 0.0)))
            .collect();
        (graph, ids)
    }

    #[test]
    fn test_link_records_both_directions() {
        let (mut graph, ids) = graph_with(&["STR", "ATK"]);
        let (str_id, atk) = (ids[0], ids[1]);

        // ATK depends on STR
        assert_eq!(graph.link(atk, str_id), Ok(true));
        assert_eq!(graph.dependencies(atk), vec![str_id]);
        assert_eq!(graph.dependents(str_id), vec![atk]);
        assert!(graph.dependencies(str_id).is_empty());
    }

    #[test]
    fn test_link_is_idempotent() {
        let (mut graph, ids) = graph_with(&["A", "B"]);
        assert_eq!(graph.link(ids[1], ids[0]), Ok(true));
        assert_eq!(graph.link(ids[1], ids[0]), Ok(false));
        assert_eq!(graph.dependents(ids[0]).len(), 1);
    }

    #[test]
    fn test_unlink_removes_both_directions() {
        let (mut graph, ids) = graph_with(&["A", "B"]);
        graph.link(ids[1], ids[0]).unwrap();
        assert!(graph.unlink(ids[1], ids[0]));
        assert!(!graph.unlink(ids[1], ids[0]));
        assert!(graph.dependents(ids[0]).is_empty());
        assert!(graph.dependencies(ids[1]).is_empty());
    }

    #[test]
    fn test_depends_on_recursive() {
        let (mut graph, ids) = graph_with(&["STR", "ATK", "DPS"]);
        graph.link(ids[1], ids[0]).unwrap();
        graph.link(ids[2], ids[1]).unwrap();

        assert!(graph.depends_on(ids[2], ids[0], true));
        assert!(!graph.depends_on(ids[2], ids[0], false));
        assert!(!graph.depends_on(ids[0], ids[2], true));
        assert!(!graph.depends_on(ids[0], ids[0], true));
    }

    #[test]
    fn test_self_cycle_rejected() {
        let (mut graph, ids) = graph_with(&["A"]);
        assert_eq!(graph.link(ids[0], ids[0]), Err(vec![ids[0], ids[0]]));
    }

    #[test]
    fn test_cycle_path_3_node() {
        let (mut graph, ids) = graph_with(&["A", "B", "C"]);
        let (a, b, c) = (ids[0], ids[1], ids[2]);

        // A depends on B, B depends on C
        graph.link(a, b).unwrap();
        graph.link(b, c).unwrap();

        // C depends on A would close A -> B -> C -> A
        let cycle = graph.link(c, a).unwrap_err();
        assert_eq!(cycle, vec![c, a, b, c]);
        // untouched
        assert!(graph.dependencies(c).is_empty());
    }

    #[test]
    fn test_cycle_path_excludes_non_cycle_nodes() {
        let (mut graph, ids) = graph_with(&["X", "A", "B"]);
        let (x, a, b) = (ids[0], ids[1], ids[2]);
        graph.link(a, x).unwrap();
        graph.link(b, a).unwrap();

        let cycle = graph.link(a, b).unwrap_err();
        assert_eq!(cycle, vec![a, b, a]);
        assert!(!cycle.contains(&x));
    }

    #[test]
    fn test_plan_orders_diamond_once() {
        //    base
        //   /    \
        // left  right
        //   \    /
        //    top
        let (mut graph, ids) = graph_with(&["base", "left", "right", "top"]);
        let (base, left, right, top) = (ids[0], ids[1], ids[2], ids[3]);
        graph.link(left, base).unwrap();
        graph.link(right, base).unwrap();
        graph.link(top, left).unwrap();
        graph.link(top, right).unwrap();

        let plan = graph.plan(&[base]);
        assert_eq!(plan.order.len(), 4);
        assert_eq!(plan.order[0], base);
        assert_eq!(plan.order[3], top);
        assert!(plan.held.is_empty());
    }

    #[test]
    fn test_plan_multiple_origins() {
        let (mut graph, ids) = graph_with(&["base", "offset", "mod", "other"]);
        graph.link(ids[2], ids[0]).unwrap();
        graph.link(ids[2], ids[1]).unwrap();

        let plan = graph.plan(&[ids[1], ids[0]]);
        assert_eq!(plan.order.len(), 3);
        assert_eq!(plan.order[2], ids[2]);
        assert!(!plan.order.contains(&ids[3]));
    }

    #[test]
    fn test_plan_stops_at_paused_nodes() {
        let (mut graph, ids) = graph_with(&["a", "b", "c"]);
        graph.link(ids[1], ids[0]).unwrap();
        graph.link(ids[2], ids[1]).unwrap();
        graph.get_mut(ids[1]).unwrap().pause_depth = 1;

        let plan = graph.plan(&[ids[0]]);
        assert_eq!(plan.order, vec![ids[0]]);
        assert_eq!(plan.held, vec![ids[1]]);
    }

    #[test]
    fn test_remove_severs_edges() {
        let (mut graph, ids) = graph_with(&["a", "b", "c"]);
        graph.link(ids[1], ids[0]).unwrap();
        graph.link(ids[2], ids[1]).unwrap();

        let removed = graph.remove(ids[1]).unwrap();
        assert_eq!(removed.name.as_str(), "b");
        assert!(!graph.contains(ids[1]));
        assert!(graph.dependents(ids[0]).is_empty());
        assert!(graph.dependencies(ids[2]).is_empty());
        assert_eq!(graph.ids(), vec![ids[0], ids[2]]);
    }
}
