//! Hierarchical persistent repository contract
//!
//! Nodes are addressed by absolute `/`-separated paths. Writing a node
//! materializes its ancestors (with empty content) so every node is
//! reachable through `get_children_keys` from the root. There are no
//! multi-path transactions: callers sequence their writes and must tolerate
//! partial application.

use parking_lot::RwLock;
use shardmeta_common::Result;
use std::collections::BTreeMap;

/// Path-addressed key/value store with hierarchical children
pub trait PersistRepository: Send + Sync {
    /// Write `value` at `path`, creating missing ancestors
    fn persist(&self, path: &str, value: &str) -> Result<()>;

    /// Read the value at `path`, `None` if the node does not exist
    fn query(&self, path: &str) -> Result<Option<String>>;

    /// Names of the direct children of `path`, sorted by name
    fn get_children_keys(&self, path: &str) -> Result<Vec<String>>;

    /// Remove `path` and its whole subtree
    fn delete(&self, path: &str) -> Result<()>;
}

/// Prefix shared by every descendant of `path`
pub(crate) fn child_prefix(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Proper ancestors of `path`, outermost first, excluding the root
pub(crate) fn ancestors(path: &str) -> Vec<&str> {
    path.char_indices()
        .filter(|&(idx, c)| c == '/' && idx > 0)
        .map(|(idx, _)| &path[..idx])
        .collect()
}

/// Direct child name of `key` below `prefix`, if `key` is a direct child
pub(crate) fn direct_child<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    let rest = key.strip_prefix(prefix)?;
    (!rest.is_empty() && !rest.contains('/')).then_some(rest)
}

/// In-memory repository
///
/// Used by tests and single-process deployments; content is lost on restart.
#[derive(Default)]
pub struct MemoryRepository {
    nodes: RwLock<BTreeMap<String, String>>,
}

impl MemoryRepository {
    /// Create an empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes currently stored, directories included
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

impl PersistRepository for MemoryRepository {
    fn persist(&self, path: &str, value: &str) -> Result<()> {
        let mut nodes = self.nodes.write();
        for ancestor in ancestors(path) {
            nodes.entry(ancestor.to_string()).or_default();
        }
        nodes.insert(path.to_string(), value.to_string());
        Ok(())
    }

    fn query(&self, path: &str) -> Result<Option<String>> {
        Ok(self.nodes.read().get(path).cloned())
    }

    fn get_children_keys(&self, path: &str) -> Result<Vec<String>> {
        let prefix = child_prefix(path);
        let nodes = self.nodes.read();
        Ok(nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| direct_child(&prefix, key).map(str::to_string))
            .collect())
    }

    fn delete(&self, path: &str) -> Result<()> {
        let prefix = child_prefix(path);
        let mut nodes = self.nodes.write();
        nodes.remove(path);
        nodes.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestors() {
        assert_eq!(ancestors("/a/b/c"), vec!["/a", "/a/b"]);
        assert!(ancestors("/a").is_empty());
    }

    #[test]
    fn test_persist_materializes_parents() {
        let repo = MemoryRepository::new();
        repo.persist("/metadata/foo_db/schemas/public", "").unwrap();

        assert_eq!(repo.get_children_keys("/").unwrap(), vec!["metadata"]);
        assert_eq!(repo.get_children_keys("/metadata").unwrap(), vec!["foo_db"]);
        assert_eq!(repo.query("/metadata/foo_db").unwrap().as_deref(), Some(""));
    }

    #[test]
    fn test_children_are_direct_only() {
        let repo = MemoryRepository::new();
        repo.persist("/p/versions/0", "a").unwrap();
        repo.persist("/p/versions/1", "b").unwrap();
        repo.persist("/p/active_version", "0").unwrap();
        repo.persist("/px", "sibling").unwrap();

        assert_eq!(
            repo.get_children_keys("/p").unwrap(),
            vec!["active_version", "versions"]
        );
        assert_eq!(repo.get_children_keys("/p/versions").unwrap(), vec!["0", "1"]);
        assert!(repo.get_children_keys("/missing").unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_subtree_only() {
        let repo = MemoryRepository::new();
        repo.persist("/p/versions/0", "a").unwrap();
        repo.persist("/px", "sibling").unwrap();

        repo.delete("/p").unwrap();

        assert!(repo.query("/p").unwrap().is_none());
        assert!(repo.query("/p/versions/0").unwrap().is_none());
        assert_eq!(repo.query("/px").unwrap().as_deref(), Some("sibling"));
    }
}
