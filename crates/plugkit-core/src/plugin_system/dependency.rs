use std::fmt;

use crate::plugin_system::descriptor::{DependencyKind, PluginDependency, PluginDescriptor, PluginState};

/// A matched dependency: `consumer` depends on `provider`.
///
/// Both ends are indices into the descriptor arena the graph was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyEdge {
    pub consumer: usize,
    pub provider: usize,
    pub kind: DependencyKind,
}

/// A dependency requirement no discovered descriptor satisfies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedDependency {
    pub consumer: usize,
    pub dependency: PluginDependency,
}

/// A dependency cycle, in traversal order. The first node depends on the
/// second, and so on; the last node depends on the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub nodes: Vec<usize>,
}

impl Cycle {
    /// Multi-line description naming every edge of the cycle:
    ///
    /// ```text
    /// Circular dependency detected:
    /// A(1.0) depends on
    /// B(1.0) depends on
    /// A(1.0)
    /// ```
    pub fn report(&self, descriptors: &[PluginDescriptor]) -> String {
        let mut report = String::from("Circular dependency detected:");
        for &node in &self.nodes {
            report.push('\n');
            report.push_str(&descriptors[node].display_name());
            report.push_str(" depends on");
        }
        if let Some(&first) = self.nodes.first() {
            report.push('\n');
            report.push_str(&descriptors[first].display_name());
        }
        report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Dependency graph over a descriptor arena.
///
/// Members are the descriptors that were not `Invalid` when the graph was
/// built, whatever their lifecycle state, so plugins added after startup can
/// depend on plugins that are already running. Edges point from consumer to
/// provider. The graph is not mutated after construction; every resolution
/// pass builds a new one.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Which arena slots take part in the graph
    members: Vec<bool>,
    /// consumer -> providers
    edges: Vec<Vec<DependencyEdge>>,
    /// provider -> consumers
    reverse_edges: Vec<Vec<DependencyEdge>>,
    unresolved: Vec<UnresolvedDependency>,
}

impl DependencyGraph {
    /// Matches every dependency of every member against the other members.
    /// The first match in discovery order wins.
    pub fn build(descriptors: &[PluginDescriptor]) -> Self {
        let members: Vec<bool> = descriptors
            .iter()
            .map(|d| d.state() != PluginState::Invalid)
            .collect();
        let mut edges = vec![Vec::new(); descriptors.len()];
        let mut reverse_edges = vec![Vec::new(); descriptors.len()];
        let mut unresolved = Vec::new();

        for (consumer, descriptor) in descriptors.iter().enumerate() {
            if !members[consumer] {
                continue;
            }
            for dependency in &descriptor.dependencies {
                let provider = (0..descriptors.len()).find(|&idx| {
                    members[idx] && descriptors[idx].provides(&dependency.name, &dependency.version)
                });
                match provider {
                    Some(provider) => {
                        let edge = DependencyEdge {
                            consumer,
                            provider,
                            kind: dependency.kind,
                        };
                        edges[consumer].push(edge);
                        reverse_edges[provider].push(edge);
                    }
                    None => unresolved.push(UnresolvedDependency {
                        consumer,
                        dependency: dependency.clone(),
                    }),
                }
            }
        }

        Self {
            members,
            edges,
            reverse_edges,
            unresolved,
        }
    }

    /// Number of arena slots the graph spans
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether the descriptor at `node` took part in the graph
    pub fn contains(&self, node: usize) -> bool {
        self.members.get(node).copied().unwrap_or(false)
    }

    /// Outgoing edges of `node`, i.e. what it depends on
    pub fn edges(&self, node: usize) -> &[DependencyEdge] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incoming edges of `node`, i.e. what depends on it
    pub fn dependents(&self, node: usize) -> &[DependencyEdge] {
        self.reverse_edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Providers of `node`, in declaration order
    pub fn providers(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges(node).iter().map(|edge| edge.provider)
    }

    /// Requirements that matched no descriptor, optional ones included
    pub fn unresolved(&self) -> &[UnresolvedDependency] {
        &self.unresolved
    }

    /// Every member node in arena order
    pub fn nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.members
            .iter()
            .enumerate()
            .filter_map(|(idx, member)| member.then_some(idx))
    }

    /// Finds dependency cycles with a depth-first walk that keeps the current
    /// path on a stack. Revisiting a node that is still on the stack closes a
    /// cycle, which is read back off the stack from that node.
    ///
    /// Nodes for which `skip` returns true are neither entered nor reported.
    /// Every back edge yields one cycle, so overlapping cycles may share
    /// nodes. Removing the nodes of all reported cycles leaves an acyclic
    /// graph.
    pub fn find_cycles(&self, skip: impl Fn(usize) -> bool) -> Vec<Cycle> {
        let mut marks = vec![Mark::Unvisited; self.len()];
        let mut stack = Vec::new();
        let mut cycles = Vec::new();

        for start in self.nodes() {
            if marks[start] == Mark::Unvisited && !skip(start) {
                self.visit(start, &skip, &mut marks, &mut stack, &mut cycles);
            }
        }
        cycles
    }

    fn visit(
        &self,
        node: usize,
        skip: &impl Fn(usize) -> bool,
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
        cycles: &mut Vec<Cycle>,
    ) {
        marks[node] = Mark::OnStack;
        stack.push(node);

        for provider in self.providers(node) {
            if skip(provider) {
                continue;
            }
            match marks[provider] {
                Mark::Unvisited => self.visit(provider, skip, marks, stack, cycles),
                Mark::OnStack => {
                    if let Some(start) = stack.iter().position(|&n| n == provider) {
                        cycles.push(Cycle {
                            nodes: stack[start..].to_vec(),
                        });
                    }
                }
                Mark::Done => {}
            }
        }

        stack.pop();
        marks[node] = Mark::Done;
    }
}

impl fmt::Display for UnresolvedDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dependency)
    }
}
