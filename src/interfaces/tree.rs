//! Path-addressed registry of interface nodes.

use super::EventEmitter;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Interface nodes keyed by their dotted path. The root lives at `""`.
#[derive(Default)]
pub struct InterfaceTree {
    nodes: RwLock<HashMap<String, Arc<dyn EventEmitter>>>,
}

impl InterfaceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node, returning the node it replaced.
    pub fn insert(
        &self,
        path: impl Into<String>,
        node: Arc<dyn EventEmitter>,
    ) -> Option<Arc<dyn EventEmitter>> {
        self.nodes.write().insert(path.into(), node)
    }

    /// Detach a node.
    pub fn remove(&self, path: &str) -> Option<Arc<dyn EventEmitter>> {
        self.nodes.write().remove(path)
    }

    pub fn get(&self, path: &str) -> Option<Arc<dyn EventEmitter>> {
        self.nodes.read().get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.read().contains_key(path)
    }

    /// Paths strictly below `path`, deepest first.
    ///
    /// Every non-root path is a descendant of the root.
    pub fn descendants(&self, path: &str, delimiter: char) -> Vec<String> {
        let prefix = format!("{}{}", path, delimiter);
        let mut found: Vec<String> = self
            .nodes
            .read()
            .keys()
            .filter(|p| {
                if path.is_empty() {
                    !p.is_empty()
                } else {
                    p.starts_with(&prefix)
                }
            })
            .cloned()
            .collect();

        found.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        found
    }

    /// All attached paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.nodes.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::Emitter;

    fn node() -> Arc<dyn EventEmitter> {
        Arc::new(Emitter::new())
    }

    #[test]
    fn test_insert_replace_remove() {
        let tree = InterfaceTree::new();
        assert!(tree.insert("x", node()).is_none());
        assert!(tree.insert("x", node()).is_some());
        assert!(tree.contains("x"));

        assert!(tree.remove("x").is_some());
        assert!(tree.get("x").is_none());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_descendants() {
        let tree = InterfaceTree::new();
        for path in ["", "x", "x.y", "x.y.z", "xy", "a"] {
            tree.insert(path, node());
        }

        assert_eq!(tree.descendants("x", '.'), vec!["x.y.z", "x.y"]);
        assert!(tree.descendants("x.y.z", '.').is_empty());
        assert_eq!(tree.descendants("", '.').len(), 5);
    }
}
