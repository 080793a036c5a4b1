//! Graph builder service
//!
//! Builds a `petgraph` DAG from a [`Queue`](crate::domain::entities::Queue),
//! exposing duplicate/cycle detection, submission-order-preserving
//! topological sort, transitive reduction, and an ASCII/UTF forest
//! renderer for `jobweaver show --graph`. Generalizes the
//! node-per-string/edge-per-dependency petgraph idiom previously used for
//! Control-M INCOND/CONTROL edges to arbitrary DAG jobs.

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::domain::entities::Queue;
use crate::domain::errors::{QueueError, QueueResult};

/// Node payload: the job's name and its position in submission order.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub name: String,
    pub submission_index: usize,
}

pub struct JobGraph {
    graph: DiGraph<NodeData, ()>,
    index_of: HashMap<String, NodeIndex>,
}

impl JobGraph {
    /// Builds the dependency graph for every job in `queue` (bookkeeping
    /// jobs included — they participate in ordering like any other node).
    /// Fails with [`QueueError::DuplicateJob`] on a repeated name (the
    /// queue itself already guards this at `submit` time; this is a
    /// second, standalone check for graphs assembled independently of a
    /// live `Queue`) and [`QueueError::CyclicGraph`] if the resulting
    /// graph is not acyclic.
    pub fn build(queue: &Queue) -> QueueResult<Self> {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();

        for (i, job) in queue.jobs.iter().enumerate() {
            if index_of.contains_key(&job.name) {
                return Err(QueueError::DuplicateJob { name: job.name.clone() });
            }
            let idx = graph.add_node(NodeData {
                name: job.name.clone(),
                submission_index: i,
            });
            index_of.insert(job.name.clone(), idx);
        }

        for job in &queue.jobs {
            let to_idx = index_of[&job.name];
            for dep in &job.depends {
                let Some(&from_idx) = index_of.get(dep) else {
                    return Err(QueueError::UnknownDependency {
                        job: job.name.clone(),
                        dependency: dep.clone(),
                    });
                };
                graph.add_edge(from_idx, to_idx, ());
            }
        }

        let built = Self { graph, index_of };
        built.check_acyclic()?;
        Ok(built)
    }

    fn check_acyclic(&self) -> QueueResult<()> {
        if petgraph::algo::toposort(&self.graph, None).is_err() {
            let sccs = petgraph::algo::kosaraju_scc(&self.graph);
            let cycle_names: Vec<String> = sccs
                .into_iter()
                .find(|scc| scc.len() > 1)
                .map(|scc| scc.iter().map(|&i| self.graph[i].name.clone()).collect())
                .unwrap_or_default();
            return Err(QueueError::CyclicGraph { cycle: cycle_names.join(" -> ") });
        }
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn name_of(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].name
    }

    pub fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.index_of.get(name).copied()
    }

    /// Nodes with out-degree 0.
    pub fn sinks(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph.edges_directed(idx, Direction::Outgoing).next().is_none())
            .map(|idx| self.graph[idx].name.as_str())
            .collect()
    }

    /// A topological ordering minimally rearranged from submission order:
    /// within each topological generation, submission order is preserved.
    /// Implemented as a stable variant of Kahn's algorithm
    /// that always picks the lowest-submission-index ready node.
    pub fn topological_order(&self) -> Vec<&str> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| (idx, self.graph.edges_directed(idx, Direction::Incoming).count()))
            .collect();

        let mut ready: BTreeMap<usize, NodeIndex> = in_degree
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&idx, _)| (self.graph[idx].submission_index, idx))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some((_, idx)) = ready.iter().next().map(|(&k, &v)| (k, v)) {
            ready.remove(&self.graph[idx].submission_index);
            order.push(self.graph[idx].name.as_str());
            for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
                let target = edge.target();
                let deg = in_degree.get_mut(&target).expect("target tracked");
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(self.graph[target].submission_index, target);
                }
            }
        }
        order
    }

    /// Transitive reduction: drops any edge `u -> v` for which a longer
    /// path from `u` to `v` already exists through another direct
    /// successor of `u`.
    pub fn reduced_graph(&self) -> DiGraph<NodeData, ()> {
        let mut redundant: HashSet<EdgeIndex> = HashSet::new();

        for u in self.graph.node_indices() {
            let successors: Vec<NodeIndex> =
                self.graph.edges_directed(u, Direction::Outgoing).map(|e| e.target()).collect();
            for &v in &successors {
                let reachable_via_other = successors
                    .iter()
                    .any(|&w| w != v && self.is_reachable(w, v));
                if reachable_via_other {
                    if let Some(edge) = self.graph.find_edge(u, v) {
                        redundant.insert(edge);
                    }
                }
            }
        }

        let mut reduced = self.graph.clone();
        reduced.retain_edges(|_, e| !redundant.contains(&e));
        reduced
    }

    fn is_reachable(&self, from: NodeIndex, to: NodeIndex) -> bool {
        if from == to {
            return true;
        }
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                if edge.target() == to {
                    return true;
                }
                stack.push(edge.target());
            }
        }
        false
    }

    /// Renders the graph as a depth-first forest diagram using UTF
    /// box-drawing connectors, a small-scale reimplementation of
    /// "network text" rendering. Nodes already printed
    /// along the current path are shown once and referenced again with
    /// an ellipsis rather than re-expanded, which keeps diamond-shaped
    /// dependency graphs readable.
    pub fn print_network_text(&self) -> String {
        let mut out = String::new();
        let mut printed: HashSet<NodeIndex> = HashSet::new();

        let mut roots: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&idx| self.graph.edges_directed(idx, Direction::Incoming).next().is_none())
            .collect();
        roots.sort_by_key(|&idx| self.graph[idx].submission_index);

        for (i, &root) in roots.iter().enumerate() {
            let is_last_root = i + 1 == roots.len();
            self.render_node(root, "", is_last_root, &mut printed, &mut out);
        }
        out
    }

    fn render_node(
        &self,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        printed: &mut HashSet<NodeIndex>,
        out: &mut String,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let already = printed.contains(&idx);
        out.push_str(prefix);
        out.push_str(connector);
        out.push_str(&self.graph[idx].name);
        if already {
            out.push_str(" ...");
        }
        out.push('\n');
        if already {
            return;
        }
        printed.insert(idx);

        let mut children: Vec<NodeIndex> =
            self.graph.edges_directed(idx, Direction::Outgoing).map(|e| e.target()).collect();
        children.sort_by_key(|&c| self.graph[c].submission_index);

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        for (i, &child) in children.iter().enumerate() {
            let child_is_last = i + 1 == children.len();
            self.render_node(child, &child_prefix, child_is_last, printed, out);
        }
    }
}
