//! Persistent repository backed by redb.
//!
//! Every node lives in the single `nodes` table keyed by its absolute path.
//! Each call runs in its own write transaction (write + commit), so a node
//! and the ancestors it materializes become visible together, while
//! independent calls are never grouped.

use crate::repository::{PersistRepository, ancestors, child_prefix, direct_child};
use crate::tables;
use redb::{Database, ReadableTable};
use std::path::Path;
use tracing::debug;

/// Error type for redb-level failures
#[derive(Debug, thiserror::Error)]
pub enum RedbStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::TransactionError> for RedbStoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<RedbStoreError> for shardmeta_common::Error {
    fn from(e: RedbStoreError) -> Self {
        Self::Repository(e.to_string())
    }
}

pub type RedbStoreResult<T> = Result<T, RedbStoreError>;

/// Persistent repository backed by redb.
pub struct RedbRepository {
    db: Database,
}

impl RedbRepository {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> shardmeta_common::Result<Self> {
        Ok(Self::open_inner(path.as_ref())?)
    }

    fn open_inner(path: &Path) -> RedbStoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create the table eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::NODES)?;
        }
        write_txn.commit()?;

        debug!("Opened redb repository at {}", path.display());
        Ok(Self { db })
    }

    fn persist_inner(&self, path: &str, value: &str) -> RedbStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::NODES)?;
            for ancestor in ancestors(path) {
                if table.get(ancestor)?.is_none() {
                    table.insert(ancestor, "")?;
                }
            }
            table.insert(path, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn query_inner(&self, path: &str) -> RedbStoreResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::NODES)?;
        Ok(table.get(path)?.map(|v| v.value().to_string()))
    }

    fn children_inner(&self, path: &str) -> RedbStoreResult<Vec<String>> {
        let prefix = child_prefix(path);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::NODES)?;
        let mut result = Vec::new();
        for entry in table.range(prefix.as_str()..)? {
            let entry = entry?;
            let key = entry.0.value();
            if !key.starts_with(&prefix) {
                break;
            }
            if let Some(child) = direct_child(&prefix, key) {
                result.push(child.to_string());
            }
        }
        Ok(result)
    }

    fn delete_inner(&self, path: &str) -> RedbStoreResult<()> {
        let prefix = child_prefix(path);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::NODES)?;
            // Collect keys first, then remove
            let mut keys_to_delete = Vec::new();
            for entry in table.range(prefix.as_str()..)? {
                let entry = entry?;
                let key = entry.0.value();
                if !key.starts_with(&prefix) {
                    break;
                }
                keys_to_delete.push(key.to_string());
            }
            for key in &keys_to_delete {
                table.remove(key.as_str())?;
            }
            table.remove(path)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl PersistRepository for RedbRepository {
    fn persist(&self, path: &str, value: &str) -> shardmeta_common::Result<()> {
        Ok(self.persist_inner(path, value)?)
    }

    fn query(&self, path: &str) -> shardmeta_common::Result<Option<String>> {
        Ok(self.query_inner(path)?)
    }

    fn get_children_keys(&self, path: &str) -> shardmeta_common::Result<Vec<String>> {
        Ok(self.children_inner(path)?)
    }

    fn delete(&self, path: &str) -> shardmeta_common::Result<()> {
        Ok(self.delete_inner(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;

    fn exercise(repo: &dyn PersistRepository) -> Vec<String> {
        repo.persist("/metadata/foo_db/data_sources/units/ds_0/versions/0", "v0")
            .unwrap();
        repo.persist("/metadata/foo_db/data_sources/units/ds_0/active_version", "0")
            .unwrap();
        repo.persist("/metadata/foo_db/data_sources/units/ds_1/versions/0", "v0")
            .unwrap();
        repo.persist("/metadata/foo_db_2", "").unwrap();
        repo.delete("/metadata/foo_db/data_sources/units/ds_1").unwrap();

        let mut observed = repo.get_children_keys("/metadata").unwrap();
        observed.extend(
            repo.get_children_keys("/metadata/foo_db/data_sources/units")
                .unwrap(),
        );
        observed.extend(
            repo.query("/metadata/foo_db/data_sources/units/ds_0/versions/0")
                .unwrap(),
        );
        observed
    }

    #[test]
    fn test_redb_matches_memory_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let redb = RedbRepository::open(dir.path().join("meta.redb")).unwrap();
        let memory = MemoryRepository::new();

        let expected = vec!["foo_db", "foo_db_2", "ds_0", "v0"];
        assert_eq!(exercise(&redb), expected);
        assert_eq!(exercise(&memory), expected);
    }

    #[test]
    fn test_redb_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("meta.redb");
        {
            let repo = RedbRepository::open(&path).unwrap();
            repo.persist("/props/active_version", "3").unwrap();
        }
        let repo = RedbRepository::open(&path).unwrap();
        assert_eq!(repo.query("/props/active_version").unwrap().as_deref(), Some("3"));
        assert_eq!(repo.get_children_keys("/props").unwrap(), vec!["active_version"]);
    }

    #[test]
    fn test_redb_delete_missing_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let repo = RedbRepository::open(dir.path().join("meta.redb")).unwrap();
        repo.delete("/metadata/nothing").unwrap();
        assert!(repo.query("/metadata/nothing").unwrap().is_none());
    }
}
