//! Dotted-path resolution into the interface tree.

use crate::interfaces::{EventEmitter, InterfaceTree};
use crate::types::{SubscriptionKey, DEFAULT_PATH_DELIMITER};
use std::sync::Arc;

/// Splits `interface<delim>event` paths.
#[derive(Clone, Copy, Debug)]
pub struct PathResolver {
    delimiter: char,
}

impl PathResolver {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Split on the last delimiter.
    ///
    /// Without a delimiter the path names an event on the root interface. A
    /// delimiter in leading position does not split either, so `".x"` is the
    /// root event `".x"`.
    pub fn split<'a>(&self, path: &'a str) -> (&'a str, &'a str) {
        match path.rfind(self.delimiter) {
            Some(sep) if sep > 0 => (&path[..sep], &path[sep + self.delimiter.len_utf8()..]),
            _ => ("", path),
        }
    }

    pub fn resolve(&self, path: &str) -> SubscriptionKey {
        let (interface, event) = self.split(path);
        SubscriptionKey::new(interface, event)
    }

    /// Find the node a subscription key lives on.
    pub fn lookup(&self, tree: &InterfaceTree, interface: &str) -> Option<Arc<dyn EventEmitter>> {
        tree.get(interface)
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(DEFAULT_PATH_DELIMITER)
    }
}
