//! Computes the load order of a set of discovered descriptors.
//!
//! Resolution runs in four steps over the descriptors in state `Read`:
//!
//! 1. build the [`DependencyGraph`], matching requirements by name and version;
//! 2. invalidate every consumer with an unmatched required dependency;
//! 3. find cycles and invalidate every plugin taking part in one;
//! 4. invalidate the required dependents of everything invalidated so far.
//!
//! The survivors are sorted topologically (Kahn's algorithm) with ties broken
//! by discovery order, and move to `Resolved`. Failures are local: a plugin
//! that does not depend on a failed one resolves normally.
// crates/plugkit-core/src/plugin_system/resolver.rs
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use crate::plugin_system::dependency::DependencyGraph;
use crate::plugin_system::descriptor::{DependencyKind, PluginDescriptor, PluginState};
use crate::plugin_system::error::ResolutionError;

/// Topologically sorted arena indices: providers strictly precede consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOrder {
    order: Vec<usize>,
}

impl LoadOrder {
    pub fn as_slice(&self) -> &[usize] {
        &self.order
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, node: usize) -> bool {
        self.order.contains(&node)
    }

    /// Position of `node` in the load order
    pub fn position(&self, node: usize) -> Option<usize> {
        self.order.iter().position(|&n| n == node)
    }

    /// Appends the order of a later resolution pass
    pub fn extend(&mut self, later: LoadOrder) {
        for node in later.order {
            if !self.order.contains(&node) {
                self.order.push(node);
            }
        }
    }

    /// Plugin names in load order
    pub fn names<'a>(&self, descriptors: &'a [PluginDescriptor]) -> Vec<&'a str> {
        self.order
            .iter()
            .map(|&idx| descriptors[idx].name.as_str())
            .collect()
    }
}

impl From<Vec<usize>> for LoadOrder {
    fn from(order: Vec<usize>) -> Self {
        Self { order }
    }
}

/// Outcome of one resolution pass
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub load_order: LoadOrder,
    pub graph: DependencyGraph,
    /// One entry per invalidated plugin, in the order they were found
    pub errors: Vec<ResolutionError>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Resolves the dependencies of every descriptor in state `Read`.
///
/// Descriptors in any other state are left untouched, but those that are not
/// `Invalid` still satisfy requirements. Failed descriptors end up `Invalid`
/// with the failure recorded on them; the rest end up `Resolved` and in the
/// returned load order, which only holds the plugins resolved by this call.
pub fn resolve(descriptors: &mut [PluginDescriptor]) -> Resolution {
    let graph = DependencyGraph::build(descriptors);
    let mut errors = Vec::new();

    for unresolved in graph.unresolved() {
        let consumer = &mut descriptors[unresolved.consumer];
        if unresolved.dependency.kind == DependencyKind::Optional {
            log::debug!(
                "Plugin '{}': optional dependency {} is not available",
                consumer.name,
                unresolved.dependency
            );
            continue;
        }
        if consumer.state() != PluginState::Read {
            continue;
        }
        let error = ResolutionError::UnresolvedDependency {
            plugin: consumer.name.clone(),
            dependency: unresolved.dependency.to_string(),
        };
        consumer.fail(error.to_string());
        errors.push(error);
    }

    let cycles = graph.find_cycles(|node| descriptors[node].state() != PluginState::Read);
    for cycle in &cycles {
        let report = cycle.report(descriptors);
        for &node in &cycle.nodes {
            let descriptor = &mut descriptors[node];
            if descriptor.state() == PluginState::Invalid {
                continue;
            }
            let error = ResolutionError::CircularDependency {
                plugin: descriptor.name.clone(),
                report: report.clone(),
            };
            descriptor.fail(report.clone());
            errors.push(error);
        }
    }

    propagate_failures(descriptors, &graph, &mut errors);

    let order = topological_order(descriptors, &graph);
    for &node in &order {
        descriptors[node].set_state(PluginState::Resolved);
    }

    log::info!(
        "Resolved {} plugin(s), {} failed to resolve",
        order.len(),
        errors.len()
    );

    Resolution {
        load_order: LoadOrder::from(order),
        graph,
        errors,
    }
}

/// Invalidates, transitively, every `Read` member that requires an invalid
/// provider
fn propagate_failures(
    descriptors: &mut [PluginDescriptor],
    graph: &DependencyGraph,
    errors: &mut Vec<ResolutionError>,
) {
    let mut queue: VecDeque<usize> = graph
        .nodes()
        .filter(|&node| descriptors[node].state() == PluginState::Invalid)
        .collect();

    while let Some(provider) = queue.pop_front() {
        for edge in graph.dependents(provider) {
            if edge.kind != DependencyKind::Required {
                continue;
            }
            if descriptors[edge.consumer].state() != PluginState::Read {
                continue;
            }
            let error = ResolutionError::DependencyFailed {
                plugin: descriptors[edge.consumer].name.clone(),
                dependency: descriptors[provider].display_name(),
                reason: descriptors[provider]
                    .error_message()
                    .unwrap_or_default()
                    .to_string(),
            };
            descriptors[edge.consumer].fail(error.to_string());
            errors.push(error);
            queue.push_back(edge.consumer);
        }
    }
}

/// Kahn's algorithm over the remaining members. A min-heap keyed on arena
/// index keeps the order deterministic: among ready plugins the one
/// discovered first goes first.
fn topological_order(descriptors: &[PluginDescriptor], graph: &DependencyGraph) -> Vec<usize> {
    let alive = |node: usize| descriptors[node].state() == PluginState::Read;

    let mut pending = vec![0usize; graph.len()];
    let mut ready = BinaryHeap::new();
    for node in graph.nodes().filter(|&n| alive(n)) {
        pending[node] = graph.providers(node).filter(|&p| alive(p)).count();
        if pending[node] == 0 {
            ready.push(Reverse(node));
        }
    }

    let mut order = Vec::new();
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for edge in graph.dependents(node) {
            if !alive(edge.consumer) {
                continue;
            }
            pending[edge.consumer] -= 1;
            if pending[edge.consumer] == 0 {
                ready.push(Reverse(edge.consumer));
            }
        }
    }

    debug_assert_eq!(
        order.len(),
        graph.nodes().filter(|&n| alive(n)).count(),
        "dependency cycle survived cycle detection"
    );
    order
}
