//! Immutable dependency graph snapshot.
//!
//! Nodes live in an arena indexed by [`NodeId`], assigned in agent-name order so
//! every traversal below is deterministic. Edges point from the dependent to
//! the dependency. All algorithms here are pure functions over the snapshot.

use medic_core::{AgentName, DependencyEdge, DependencyType, ImpactThresholds, RiskLevel, SemVer};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, VecDeque};

/// Arena index of an agent within one snapshot.
pub type NodeId = usize;

/// A closed cycle: the first agent is repeated at the end.
pub type Cycle = Vec<AgentName>;

/// Upper bound on reported cycles for pathological graphs.
pub const MAX_REPORTED_CYCLES: usize = 1024;

/// Deployment order over a set of agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologicalOrder {
    /// Dependencies before dependents, followed by `unordered` in name order
    pub order: Vec<AgentName>,
    /// Agents on or behind a cycle that Kahn's algorithm could not place
    pub unordered: Vec<AgentName>,
}

/// Blast radius of updating one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub agent: AgentName,
    pub new_version: SemVer,
    pub direct_dependents: Vec<AgentName>,
    /// Transitive dependents, excluding direct ones
    pub indirect_dependents: Vec<AgentName>,
    pub total_affected: usize,
    pub risk_level: RiskLevel,
    /// The updated agent and everything affected, dependencies first
    pub deployment_order: Vec<AgentName>,
    pub unordered: Vec<AgentName>,
}

/// Full-graph view returned to external callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphProjection {
    pub edges: Vec<DependencyEdge>,
    pub cycles: Vec<Cycle>,
    pub topological_order: Vec<AgentName>,
    pub unordered: Vec<AgentName>,
}

#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    nodes: Vec<AgentName>,
    index: HashMap<AgentName, NodeId>,
    edges: Vec<DependencyEdge>,
    /// dependent -> dependencies over `requires` edges
    requires: Vec<Vec<NodeId>>,
    /// dependent -> dependencies over ordering edges
    dependencies: Vec<Vec<NodeId>>,
    /// dependency -> dependents over ordering edges
    dependents: Vec<Vec<NodeId>>,
}

impl GraphSnapshot {
    /// Build a snapshot from known agents and edges. Edge endpoints that are
    /// not in `agents` become nodes too.
    pub fn build(
        agents: impl IntoIterator<Item = AgentName>,
        edges: impl IntoIterator<Item = DependencyEdge>,
    ) -> Self {
        let mut edges: Vec<DependencyEdge> = edges.into_iter().collect();
        edges.sort_by(|a, b| {
            (&a.dependent, &a.dependency).cmp(&(&b.dependent, &b.dependency))
        });

        let mut names: BTreeSet<AgentName> = agents.into_iter().collect();
        for edge in &edges {
            names.insert(edge.dependent.clone());
            names.insert(edge.dependency.clone());
        }
        let nodes: Vec<AgentName> = names.into_iter().collect();
        let index: HashMap<AgentName, NodeId> = nodes
            .iter()
            .enumerate()
            .map(|(id, name)| (name.clone(), id))
            .collect();

        let n = nodes.len();
        let mut requires = vec![Vec::new(); n];
        let mut dependencies = vec![Vec::new(); n];
        let mut dependents = vec![Vec::new(); n];
        for edge in &edges {
            let (Some(&from), Some(&to)) = (index.get(&edge.dependent), index.get(&edge.dependency))
            else {
                continue;
            };
            if edge.dependency_type == DependencyType::Requires {
                requires[from].push(to);
            }
            if edge.dependency_type.implies_order() {
                dependencies[from].push(to);
                dependents[to].push(from);
            }
        }
        for list in requires
            .iter_mut()
            .chain(dependencies.iter_mut())
            .chain(dependents.iter_mut())
        {
            list.sort_unstable();
            list.dedup();
        }

        Self {
            nodes,
            index,
            edges,
            requires,
            dependencies,
            dependents,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn agents(&self) -> &[AgentName] {
        &self.nodes
    }

    pub fn contains(&self, agent: &AgentName) -> bool {
        self.index.contains_key(agent)
    }

    pub fn edge(&self, dependent: &AgentName, dependency: &AgentName) -> Option<&DependencyEdge> {
        self.edges
            .iter()
            .find(|e| &e.dependent == dependent && &e.dependency == dependency)
    }

    /// Edges where `agent` is the dependent.
    pub fn dependencies_of(&self, agent: &AgentName) -> Vec<&DependencyEdge> {
        self.edges.iter().filter(|e| &e.dependent == agent).collect()
    }

    /// Edges where `agent` is the dependency.
    pub fn dependents_of(&self, agent: &AgentName) -> Vec<&DependencyEdge> {
        self.edges.iter().filter(|e| &e.dependency == agent).collect()
    }

    /// Copy of this snapshot with `edge` inserted or replaced.
    pub fn with_edge(&self, edge: DependencyEdge) -> Self {
        let (dependent, dependency) = (edge.dependent.clone(), edge.dependency.clone());
        let edges = self
            .edges
            .iter()
            .filter(|e| !(e.dependent == dependent && e.dependency == dependency))
            .cloned()
            .chain(std::iter::once(edge));
        Self::build(self.nodes.iter().cloned(), edges)
    }

    /// Copy of this snapshot without the edge for the ordered pair.
    pub fn without_edge(&self, dependent: &AgentName, dependency: &AgentName) -> Self {
        let edges = self
            .edges
            .iter()
            .filter(|e| !(&e.dependent == dependent && &e.dependency == dependency))
            .cloned();
        Self::build(self.nodes.iter().cloned(), edges)
    }

    /// Copy of this snapshot with `agent` registered as a node.
    pub fn with_agent(&self, agent: AgentName) -> Self {
        Self::build(
            self.nodes.iter().cloned().chain(std::iter::once(agent)),
            self.edges.iter().cloned(),
        )
    }

    // ========================================================================
    // CYCLES
    // ========================================================================

    /// Every elementary cycle through `requires` edges, each closed and
    /// starting at its alphabetically smallest agent.
    ///
    /// Strongly connected components are found first so that acyclic regions
    /// cost a single linear pass; cycles are then enumerated only inside
    /// components with more than one agent.
    pub fn detect_cycles(&self) -> Vec<Cycle> {
        let components = strongly_connected_components(&self.requires);
        let mut component_size = vec![0usize; self.nodes.len()];
        for &c in &components {
            component_size[c] += 1;
        }

        let mut cycles = Vec::new();
        let mut path = Vec::new();
        let mut on_path = vec![false; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if component_size[components[start]] < 2 {
                continue;
            }
            path.push(start);
            on_path[start] = true;
            self.enumerate_cycles(start, start, &components, &mut path, &mut on_path, &mut cycles);
            on_path[start] = false;
            path.pop();
            if cycles.len() >= MAX_REPORTED_CYCLES {
                break;
            }
        }
        cycles
    }

    /// Depth-first search for simple paths from `start` back to itself that
    /// only visit nodes in the same component with an id above `start`.
    fn enumerate_cycles(
        &self,
        start: NodeId,
        node: NodeId,
        components: &[usize],
        path: &mut Vec<NodeId>,
        on_path: &mut [bool],
        cycles: &mut Vec<Cycle>,
    ) {
        for &next in &self.requires[node] {
            if cycles.len() >= MAX_REPORTED_CYCLES {
                return;
            }
            if components[next] != components[start] || next < start {
                continue;
            }
            if next == start {
                let mut cycle: Cycle = path.iter().map(|&id| self.nodes[id].clone()).collect();
                cycle.push(self.nodes[start].clone());
                cycles.push(cycle);
            } else if !on_path[next] {
                on_path[next] = true;
                path.push(next);
                self.enumerate_cycles(start, next, components, path, on_path, cycles);
                path.pop();
                on_path[next] = false;
            }
        }
    }

    // ========================================================================
    // ORDERING
    // ========================================================================

    /// Kahn's algorithm restricted to `members`. Ready nodes are taken in name
    /// order. Returns the placed nodes and the members left over.
    fn kahn(&self, members: &[bool]) -> (Vec<NodeId>, Vec<NodeId>) {
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        for node in (0..n).filter(|&v| members[v]) {
            indegree[node] = self.dependencies[node]
                .iter()
                .filter(|&&dep| members[dep])
                .count();
        }

        let mut ready: BinaryHeap<Reverse<NodeId>> = (0..n)
            .filter(|&v| members[v] && indegree[v] == 0)
            .map(Reverse)
            .collect();
        let mut order = Vec::new();
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &dependent in &self.dependents[node] {
                if !members[dependent] {
                    continue;
                }
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        let leftover = (0..n)
            .filter(|&v| members[v] && indegree[v] > 0)
            .collect();
        (order, leftover)
    }

    fn ordered(&self, members: &[bool]) -> TopologicalOrder {
        let (order, leftover) = self.kahn(members);
        let unordered: Vec<AgentName> = leftover.iter().map(|&id| self.nodes[id].clone()).collect();
        let order = order
            .into_iter()
            .map(|id| self.nodes[id].clone())
            .chain(unordered.iter().cloned())
            .collect();
        TopologicalOrder { order, unordered }
    }

    /// Deployment order of the whole graph.
    pub fn topological_order(&self) -> TopologicalOrder {
        self.ordered(&vec![true; self.nodes.len()])
    }

    // ========================================================================
    // IMPACT
    // ========================================================================

    /// Blast radius of moving `agent` to `new_version`.
    pub fn analyze_update_impact(
        &self,
        agent: &AgentName,
        new_version: SemVer,
        thresholds: &ImpactThresholds,
    ) -> ImpactReport {
        let Some(&root) = self.index.get(agent) else {
            return ImpactReport {
                agent: agent.clone(),
                new_version,
                direct_dependents: Vec::new(),
                indirect_dependents: Vec::new(),
                total_affected: 0,
                risk_level: thresholds.risk_level(0),
                deployment_order: vec![agent.clone()],
                unordered: Vec::new(),
            };
        };

        let n = self.nodes.len();
        let mut reached = vec![false; n];
        reached[root] = true;
        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            for &dependent in &self.dependents[node] {
                if !reached[dependent] {
                    reached[dependent] = true;
                    queue.push_back(dependent);
                }
            }
        }

        let direct: Vec<NodeId> = self.dependents[root]
            .iter()
            .copied()
            .filter(|&d| d != root)
            .collect();
        let indirect: Vec<NodeId> = (0..n)
            .filter(|&v| reached[v] && v != root && !direct.contains(&v))
            .collect();
        let total_affected = direct.len() + indirect.len();
        let order = self.ordered(&reached);

        ImpactReport {
            agent: agent.clone(),
            new_version,
            direct_dependents: direct.iter().map(|&id| self.nodes[id].clone()).collect(),
            indirect_dependents: indirect.iter().map(|&id| self.nodes[id].clone()).collect(),
            total_affected,
            risk_level: thresholds.risk_level(total_affected),
            deployment_order: order.order,
            unordered: order.unordered,
        }
    }

    /// Edges, cycles and full-graph order in one view.
    pub fn projection(&self) -> GraphProjection {
        let order = self.topological_order();
        GraphProjection {
            edges: self.edges.clone(),
            cycles: self.detect_cycles(),
            topological_order: order.order,
            unordered: order.unordered,
        }
    }
}

/// Kosaraju's algorithm with explicit stacks. Returns a component id per node.
fn strongly_connected_components(adjacency: &[Vec<NodeId>]) -> Vec<usize> {
    let n = adjacency.len();

    let mut visited = vec![false; n];
    let mut finish_order = Vec::with_capacity(n);
    for source in 0..n {
        if visited[source] {
            continue;
        }
        visited[source] = true;
        let mut stack = vec![(source, 0usize)];
        while let Some(top) = stack.last_mut() {
            let (node, next_edge) = *top;
            if next_edge < adjacency[node].len() {
                top.1 += 1;
                let next = adjacency[node][next_edge];
                if !visited[next] {
                    visited[next] = true;
                    stack.push((next, 0));
                }
            } else {
                finish_order.push(node);
                stack.pop();
            }
        }
    }

    let mut reverse = vec![Vec::new(); n];
    for (node, targets) in adjacency.iter().enumerate() {
        for &target in targets {
            reverse[target].push(node);
        }
    }

    let mut component = vec![usize::MAX; n];
    let mut next_component = 0;
    for &source in finish_order.iter().rev() {
        if component[source] != usize::MAX {
            continue;
        }
        component[source] = next_component;
        let mut stack = vec![source];
        while let Some(node) = stack.pop() {
            for &prev in &reverse[node] {
                if component[prev] == usize::MAX {
                    component[prev] = next_component;
                    stack.push(prev);
                }
            }
        }
        next_component += 1;
    }
    component
}

#[cfg(test)]
mod tests {
    use super::*;
    use medic_core::VersionConstraint;

    fn names(list: &[&str]) -> Vec<AgentName> {
        list.iter().map(|s| AgentName::from(*s)).collect()
    }

    fn graph(edges: &[(&str, &str)]) -> GraphSnapshot {
        GraphSnapshot::build(
            Vec::new(),
            edges.iter().map(|(a, b)| DependencyEdge::requires(*a, *b)),
        )
    }

    #[test]
    fn test_three_node_cycle_detected() {
        let g = graph(&[("A", "B"), ("B", "C"), ("C", "A")]);
        let cycles = g.detect_cycles();
        assert_eq!(cycles, vec![names(&["A", "B", "C", "A"])]);
    }

    #[test]
    fn test_overlapping_cycles_reported_separately() {
        let g = graph(&[("A", "B"), ("B", "A"), ("B", "C"), ("C", "B")]);
        let cycles = g.detect_cycles();
        assert_eq!(
            cycles,
            vec![names(&["A", "B", "A"]), names(&["B", "C", "B"])]
        );
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let g = graph(&[("web", "api"), ("api", "db"), ("worker", "db")]);
        assert!(g.detect_cycles().is_empty());
    }

    #[test]
    fn test_non_requires_edges_ignored_for_cycles() {
        let g = GraphSnapshot::build(
            Vec::new(),
            vec![
                DependencyEdge::requires("a", "b"),
                DependencyEdge::new(
                    "b",
                    "a",
                    VersionConstraint::Any,
                    DependencyType::Recommends,
                ),
            ],
        );
        assert!(g.detect_cycles().is_empty());
    }

    #[test]
    fn test_topological_order_puts_dependencies_first() {
        let g = graph(&[("web", "api"), ("api", "db"), ("worker", "db")]);
        let order = g.topological_order();
        assert_eq!(order.order, names(&["db", "api", "web", "worker"]));
        assert!(order.unordered.is_empty());
    }

    #[test]
    fn test_cycle_members_appended_in_name_order() {
        let g = graph(&[("b", "c"), ("c", "b"), ("b", "a")]);
        let order = g.topological_order();
        assert_eq!(order.order, names(&["a", "b", "c"]));
        assert_eq!(order.unordered, names(&["b", "c"]));
    }

    #[test]
    fn test_impact_analysis_direct_and_indirect() {
        // db <- api <- web, db <- worker, api <- admin
        let g = graph(&[
            ("api", "db"),
            ("worker", "db"),
            ("web", "api"),
            ("admin", "api"),
        ]);
        let report = g.analyze_update_impact(
            &AgentName::from("db"),
            SemVer::new(2, 0, 0),
            &ImpactThresholds::default(),
        );
        assert_eq!(report.direct_dependents, names(&["api", "worker"]));
        assert_eq!(report.indirect_dependents, names(&["admin", "web"]));
        assert_eq!(report.total_affected, 4);
        assert_eq!(report.risk_level, RiskLevel::Medium);
        assert_eq!(
            report.deployment_order,
            names(&["db", "api", "admin", "web", "worker"])
        );
    }

    #[test]
    fn test_impact_of_unknown_agent_is_empty() {
        let g = graph(&[("api", "db")]);
        let report = g.analyze_update_impact(
            &AgentName::from("ghost"),
            SemVer::new(1, 0, 0),
            &ImpactThresholds::default(),
        );
        assert_eq!(report.total_affected, 0);
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert_eq!(report.deployment_order, names(&["ghost"]));
    }

    #[test]
    fn test_with_and_without_edge() {
        let g = graph(&[("api", "db")]);
        let g2 = g.with_edge(DependencyEdge::requires("db", "api"));
        assert_eq!(g2.detect_cycles().len(), 1);
        let g3 = g2.without_edge(&AgentName::from("db"), &AgentName::from("api"));
        assert!(g3.detect_cycles().is_empty());
        // Nodes survive edge removal.
        assert_eq!(g3.node_count(), 2);
    }
}
