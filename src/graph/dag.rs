//! Static "runs after" structure between models.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::error::GraphError;

/// Model name to the names of its direct upstream dependencies.
pub type EdgeMap = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnStack,
    Done,
}

/// Directed acyclic graph of model dependencies, keyed by model name.
///
/// Built once by [`DependencyGraph::build`]; all queries are reads.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyGraph {
    upstream: EdgeMap,
    downstream: EdgeMap,
    /// Every node, dependencies before dependants.
    order: Vec<String>,
}

impl DependencyGraph {
    /// Build a graph from a model-to-upstream mapping.
    ///
    /// Every key is a node. Repeated keys merge their dependency sets.
    ///
    /// # Errors
    ///
    /// * [`GraphError::UnknownNode`] if a dependency names a model that is not a key.
    /// * [`GraphError::Cycle`] if the dependencies loop back on themselves.
    pub fn build<I, K, D, V>(edges: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = (K, D)>,
        K: Into<String>,
        D: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let mut upstream = EdgeMap::new();
        for (name, deps) in edges {
            upstream
                .entry(name.into())
                .or_default()
                .extend(deps.into_iter().map(Into::<String>::into));
        }

        let mut downstream: EdgeMap = upstream.keys().map(|name| (name.clone(), BTreeSet::new())).collect();
        for (name, deps) in &upstream {
            for dep in deps {
                match downstream.get_mut(dep) {
                    Some(dependants) => {
                        dependants.insert(name.clone());
                    }
                    None => return Err(GraphError::UnknownNode(dep.clone())),
                }
            }
        }

        let order = topological_order(&upstream)?;
        log::debug!("Built dependency graph with {} models", order.len());

        Ok(Self {
            upstream,
            downstream,
            order,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.upstream.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.upstream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstream.is_empty()
    }

    /// All model names in name order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.upstream.keys().map(String::as_str)
    }

    /// Models with no upstream dependencies.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.upstream
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(name, _)| name.as_str())
    }

    /// Direct dependencies of `name`.
    pub fn upstream_of(&self, name: &str) -> Result<&BTreeSet<String>, GraphError> {
        self.upstream
            .get(name)
            .ok_or_else(|| GraphError::UnknownNode(name.to_string()))
    }

    /// Direct dependants of `name`.
    pub fn downstream_of(&self, name: &str) -> Result<&BTreeSet<String>, GraphError> {
        self.downstream
            .get(name)
            .ok_or_else(|| GraphError::UnknownNode(name.to_string()))
    }

    /// All transitive upstream dependencies of `name`, excluding `name` itself.
    pub fn sources_reachable_from(&self, name: &str) -> Result<BTreeSet<String>, GraphError> {
        self.upstream_of(name)?;
        let mut ancestors = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([name]);

        while let Some(current) = queue.pop_front() {
            for dep in &self.upstream[current] {
                if ancestors.insert(dep.clone()) {
                    queue.push_back(dep);
                }
            }
        }

        Ok(ancestors)
    }

    /// All nodes with dependencies before dependants.
    ///
    /// Independent nodes appear in name order, so the order is stable across builds.
    pub fn topological_order(&self) -> &[String] {
        &self.order
    }
}

/// Depth-first post-order over the upstream edges, failing on the first cycle.
fn topological_order(upstream: &EdgeMap) -> Result<Vec<String>, GraphError> {
    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(upstream.len());
    let mut order = Vec::with_capacity(upstream.len());

    for root in upstream.keys() {
        if marks.contains_key(root.as_str()) {
            continue;
        }

        marks.insert(root, Mark::OnStack);
        let mut stack = vec![(root.as_str(), upstream[root].iter())];

        loop {
            let Some((node, deps)) = stack.last_mut() else {
                break;
            };
            let node: &str = *node;

            match deps.next() {
                Some(dep) => match marks.get(dep.as_str()) {
                    Some(Mark::OnStack) => {
                        let start = stack.iter().position(|(n, _)| *n == dep.as_str()).unwrap_or(0);
                        let mut cycle: Vec<String> = stack[start..].iter().map(|(n, _)| n.to_string()).collect();
                        cycle.push(dep.clone());
                        return Err(GraphError::Cycle(cycle));
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(dep, Mark::OnStack);
                        stack.push((dep.as_str(), upstream[dep].iter()));
                    }
                },
                None => {
                    marks.insert(node, Mark::Done);
                    order.push(node.to_string());
                    stack.pop();
                }
            }
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> DependencyGraph {
        DependencyGraph::build([
            ("A", vec![]),
            ("B", vec!["A"]),
            ("C", vec!["A"]),
            ("D", vec!["B", "C"]),
        ])
        .unwrap()
    }

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn upstream_is_direct_only() {
        let graph = diamond();
        assert_eq!(names(graph.upstream_of("D").unwrap()), vec!["B", "C"]);
        assert!(graph.upstream_of("A").unwrap().is_empty());
    }

    #[test]
    fn downstream_is_the_reverse_edge() {
        let graph = diamond();
        assert_eq!(names(graph.downstream_of("A").unwrap()), vec!["B", "C"]);
        assert!(graph.downstream_of("D").unwrap().is_empty());
    }

    #[test]
    fn ancestors_are_transitive() {
        let graph = diamond();
        assert_eq!(names(&graph.sources_reachable_from("D").unwrap()), vec!["A", "B", "C"]);
        assert_eq!(names(&graph.sources_reachable_from("B").unwrap()), vec!["A"]);
        assert!(graph.sources_reachable_from("A").unwrap().is_empty());
    }

    #[test]
    fn unknown_query_name_fails() {
        let graph = diamond();
        assert!(matches!(graph.upstream_of("Z"), Err(GraphError::UnknownNode(n)) if n == "Z"));
        assert!(matches!(graph.sources_reachable_from("Z"), Err(GraphError::UnknownNode(_))));
    }

    #[test]
    fn topological_order_puts_dependencies_first() {
        let graph = diamond();
        assert_eq!(graph.topological_order(), ["A", "B", "C", "D"]);

        let chain = DependencyGraph::build([("z", vec!["y"]), ("y", vec!["x"]), ("x", vec![])]).unwrap();
        assert_eq!(chain.topological_order(), ["x", "y", "z"]);
    }

    #[test]
    fn sources_have_no_dependencies() {
        let graph = DependencyGraph::build([("a", vec![]), ("b", vec![]), ("c", vec!["a", "b"])]).unwrap();
        assert_eq!(graph.sources().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(graph.len(), 3);
        assert!(graph.contains("c"));
    }

    #[test]
    fn repeated_keys_merge() {
        let graph = DependencyGraph::build([("a", vec![]), ("b", vec![]), ("c", vec!["a"]), ("c", vec!["b"])]).unwrap();
        assert_eq!(names(graph.upstream_of("c").unwrap()), vec!["a", "b"]);
    }

    #[test]
    fn undefined_dependency_is_unknown_node() {
        let err = DependencyGraph::build([("a", vec!["ghost"])]).unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode(n) if n == "ghost"));
    }

    #[test]
    fn cycle_fails_at_build() {
        let err = DependencyGraph::build([("a", vec!["c"]), ("b", vec!["a"]), ("c", vec!["b"])]).unwrap_err();
        match err {
            GraphError::Cycle(members) => assert_eq!(members, vec!["a", "c", "b", "a"]),
            other => panic!("Expected Cycle, got {:?}", other),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = DependencyGraph::build([("a", vec!["a"])]).unwrap_err();
        assert!(matches!(err, GraphError::Cycle(members) if members == vec!["a", "a"]));
    }

    #[test]
    fn cycle_behind_acyclic_prefix_is_found() {
        let err = DependencyGraph::build([
            ("a", vec![]),
            ("b", vec!["a", "d"]),
            ("c", vec!["b"]),
            ("d", vec!["c"]),
        ])
        .unwrap_err();
        assert!(matches!(err, GraphError::Cycle(_)));
    }

    #[test]
    fn empty_graph_is_valid() {
        let graph = DependencyGraph::build(Vec::<(String, Vec<String>)>::new()).unwrap();
        assert!(graph.is_empty());
        assert!(graph.topological_order().is_empty());
    }
}
