// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Import dependency graph
//!
//! Nodes are script cache keys (`owner/name:tag`, component names, or the
//! root script). An edge `a -> b` means `a` imports or embeds `b`.

use ahash::AHashMap;
use std::collections::HashSet;

pub type ScriptId = String;

/// Node id of the script being run
pub const ROOT: &str = "<main>";

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Maps a script to the scripts it depends on
    children: AHashMap<ScriptId, Vec<ScriptId>>,
    /// Maps a script to the scripts that depend on it
    parents: AHashMap<ScriptId, Vec<ScriptId>>,
    nodes: HashSet<ScriptId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            children: AHashMap::new(),
            parents: AHashMap::new(),
            nodes: HashSet::new(),
        }
    }

    /// Record that `from` depends on `to`
    ///
    /// An edge that would close a cycle is rejected and the cycle path
    /// (`to ... from to`) is returned instead.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), Vec<ScriptId>> {
        if from == to {
            return Err(vec![from.to_string(), to.to_string()]);
        }
        if let Some(mut path) = self.path(to, from) {
            path.push(to.to_string());
            return Err(path);
        }

        self.nodes.insert(from.to_string());
        self.nodes.insert(to.to_string());
        let children = self.children.entry(from.to_string()).or_default();
        if !children.iter().any(|c| c == to) {
            children.push(to.to_string());
            self.parents
                .entry(to.to_string())
                .or_default()
                .push(from.to_string());
        }
        Ok(())
    }

    /// Dependency path from `start` to `goal`, if one exists
    fn path(&self, start: &str, goal: &str) -> Option<Vec<ScriptId>> {
        let mut visited = HashSet::new();
        let mut trail = Vec::new();
        self.search(start, goal, &mut visited, &mut trail)
            .then_some(trail)
    }

    fn search(
        &self,
        node: &str,
        goal: &str,
        visited: &mut HashSet<ScriptId>,
        trail: &mut Vec<ScriptId>,
    ) -> bool {
        if !visited.insert(node.to_string()) {
            return false;
        }
        trail.push(node.to_string());
        if node == goal {
            return true;
        }
        if let Some(children) = self.children.get(node) {
            for child in children {
                if self.search(child, goal, visited, trail) {
                    return true;
                }
            }
        }
        trail.pop();
        false
    }

    /// Every script reachable from `id` (depth-first)
    pub fn get_descendants(&self, id: &str) -> Vec<ScriptId> {
        let mut descendants = Vec::new();
        let mut visited = HashSet::new();
        self.collect(&self.children, id, &mut descendants, &mut visited);
        descendants
    }

    /// Every script that reaches `id`
    pub fn get_ancestors(&self, id: &str) -> Vec<ScriptId> {
        let mut ancestors = Vec::new();
        let mut visited = HashSet::new();
        self.collect(&self.parents, id, &mut ancestors, &mut visited);
        ancestors
    }

    fn collect(
        &self,
        edges: &AHashMap<ScriptId, Vec<ScriptId>>,
        id: &str,
        out: &mut Vec<ScriptId>,
        visited: &mut HashSet<ScriptId>,
    ) {
        if !visited.insert(id.to_string()) {
            return;
        }
        if let Some(next) = edges.get(id) {
            for n in next {
                if !visited.contains(n) {
                    out.push(n.clone());
                }
                self.collect(edges, n, out, visited);
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descendants_and_ancestors() {
        let mut graph = DependencyGraph::new();
        assert!(graph.add_edge(ROOT, "acme/Frame:latest").is_ok());
        assert!(graph.add_edge("acme/Frame:latest", "acme/Profile:latest").is_ok());
        assert!(graph.add_edge(ROOT, "acme/Profile:latest").is_ok());

        let descendants = graph.get_descendants(ROOT);
        assert_eq!(descendants.len(), 2);
        assert_eq!(
            graph.get_ancestors("acme/Profile:latest"),
            vec!["acme/Frame:latest".to_string(), ROOT.to_string()]
        );
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut graph = DependencyGraph::new();
        assert!(graph.add_edge("a", "b").is_ok());
        assert!(graph.add_edge("b", "c").is_ok());
        let cycle = graph.add_edge("c", "a");
        assert_eq!(cycle, Err(vec!["a".into(), "b".into(), "c".into(), "a".into()]));
        assert!(graph.add_edge("a", "a").is_err());
        assert!(!graph.get_descendants("c").contains(&"a".to_string()));
    }
}
