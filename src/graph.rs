// src/graph.rs

//! Dependency graph for build ordering
//!
//! Nodes are package or formula names. A node's children are the things it
//! depends on; its parents are the things that depend on it. Both edge
//! directions are kept in sync so the graph can be walked either way.
//!
//! # Example
//!
//! ```
//! use cellar::graph::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_node("libpng", ["zlib"], [] as [&str; 0]);
//! graph.add_node("app", ["libpng", "zlib"], [] as [&str; 0]);
//!
//! let mut order = Vec::new();
//! graph
//!     .traverse(&[], |name| {
//!         order.push(name.to_string());
//!         Ok(())
//!     })
//!     .unwrap();
//! assert_eq!(order, vec!["zlib", "libpng", "app"]);
//! ```
//!
//! # Cycles
//!
//! A traversal that reaches a node which is still being visited on the
//! current path fails with [`Error::Cycle`] naming the cycle.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A single node in the dependency graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyNode {
    pub name: String,
    /// Nodes this node depends on
    pub children: BTreeSet<String>,
    /// Nodes that depend on this node
    pub parents: BTreeSet<String>,
}

impl DependencyNode {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// A root has nothing depending on it
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Traversal-local visit state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// A directed graph of named nodes
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, DependencyNode>,
}

impl DependencyGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, merging with an existing node of the same name
    ///
    /// Children and parents are unioned into the existing edge sets. Any name
    /// that appears only as a child or parent is created with empty edges.
    pub fn add_node<C, P, S, T>(&mut self, name: &str, children: C, parents: P)
    where
        C: IntoIterator<Item = S>,
        P: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        self.ensure(name);

        for child in children {
            let child = child.as_ref();
            self.ensure(child);
            self.link(name, child);
        }

        for parent in parents {
            let parent = parent.as_ref();
            self.ensure(parent);
            self.link(parent, name);
        }
    }

    fn ensure(&mut self, name: &str) {
        if !self.nodes.contains_key(name) {
            self.nodes.insert(name.to_string(), DependencyNode::new(name));
        }
    }

    /// Record `parent -> child` (parent depends on child)
    fn link(&mut self, parent: &str, child: &str) {
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.insert(child.to_string());
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parents.insert(parent.to_string());
        }
    }

    /// Check if a node exists
    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Get a node by name
    pub fn get_node(&self, name: &str) -> Option<&DependencyNode> {
        self.nodes.get(name)
    }

    /// Number of nodes in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// All nodes that nothing depends on
    pub fn roots(&self) -> Vec<&DependencyNode> {
        self.nodes.values().filter(|n| n.is_root()).collect()
    }

    /// Depth-first post-order traversal
    ///
    /// Starts from each name in `start` (or every node when `start` is
    /// empty). Each node is handed to `callback` at most once, and only after
    /// all of its children have been handed over. Returns [`Error::Cycle`] if
    /// a node is reached again while it is still on the current path.
    pub fn traverse<F>(&self, start: &[&str], mut callback: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(self.nodes.len());
        let mut path: Vec<&str> = Vec::new();

        let starts: Vec<&str> = if start.is_empty() {
            self.nodes.keys().map(String::as_str).collect()
        } else {
            start.to_vec()
        };

        for name in starts {
            let Some((key, _)) = self.nodes.get_key_value(name) else {
                return Err(Error::FormulaNotFound {
                    name: name.to_string(),
                    searched: "dependency graph".to_string(),
                });
            };
            self.visit(key.as_str(), &mut marks, &mut path, &mut callback)?;
        }

        Ok(())
    }

    fn visit<'a, F>(
        &'a self,
        name: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
        callback: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                let start = path.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(name.to_string());
                return Err(Error::Cycle(cycle));
            }
            None => {}
        }

        marks.insert(name, Mark::InProgress);
        path.push(name);

        if let Some(node) = self.nodes.get(name) {
            for child in &node.children {
                self.visit(child, marks, path, callback)?;
            }
        }

        path.pop();
        marks.insert(name, Mark::Done);
        callback(name)
    }

    /// All nodes that transitively depend on `name`, excluding `name` itself
    pub fn required_by(&self, name: &str) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(name);
        self.collect_parents(name, &mut seen, &mut result);
        result
    }

    fn collect_parents<'a>(
        &'a self,
        name: &str,
        seen: &mut HashSet<&'a str>,
        result: &mut BTreeSet<String>,
    ) {
        let Some(node) = self.nodes.get(name) else {
            return;
        };
        for parent in &node.parents {
            if seen.insert(parent.as_str()) {
                result.insert(parent.clone());
                self.collect_parents(parent, seen, result);
            }
        }
    }

    /// All nodes `name` transitively depends on, excluding `name` itself
    pub fn depends_on(&self, name: &str) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        let mut stack: Vec<&str> = vec![name];

        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(current) {
                for child in &node.children {
                    if child != name && result.insert(child.clone()) {
                        stack.push(child);
                    }
                }
            }
        }

        result
    }
}
