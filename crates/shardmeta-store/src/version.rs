//! Active-version switching for versioned configuration items.
//!
//! A versioned item at `path` keeps immutable revisions under
//! `path/versions/{n}` and a pointer `path/active_version` naming the
//! authoritative one. Writers add a revision first and then flip the
//! pointer; the flip is the commit point. Superseded revisions are pruned
//! afterwards on a best-effort basis.

use crate::node_path;
use crate::repository::PersistRepository;
use shardmeta_common::{Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Revision number of the first write to a path
pub const DEFAULT_VERSION: u32 = 0;

/// One pending commit for a versioned configuration path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaDataVersion {
    path: String,
    current_active_version: u32,
    next_active_version: u32,
}

impl MetaDataVersion {
    pub fn new(path: impl Into<String>, current_active_version: u32, next_active_version: u32) -> Self {
        Self {
            path: path.into(),
            current_active_version,
            next_active_version,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Version recorded as active when the revision was written
    #[must_use]
    pub const fn current_active_version(&self) -> u32 {
        self.current_active_version
    }

    /// Version just written
    #[must_use]
    pub const fn next_active_version(&self) -> u32 {
        self.next_active_version
    }

    /// Whether committing this descriptor changes anything
    #[must_use]
    pub const fn is_switch_required(&self) -> bool {
        self.current_active_version != self.next_active_version
    }

    #[must_use]
    pub fn active_version_node_path(&self) -> String {
        node_path::active_version(&self.path)
    }

    #[must_use]
    pub fn versions_path(&self) -> String {
        node_path::versions(&self.path)
    }

    #[must_use]
    pub fn versions_node_path(&self, version: u32) -> String {
        node_path::version(&self.path, version)
    }
}

/// Meta data version persist service
#[derive(Clone)]
pub struct MetaDataVersionPersistService {
    repository: Arc<dyn PersistRepository>,
}

impl MetaDataVersionPersistService {
    pub fn new(repository: Arc<dyn PersistRepository>) -> Self {
        Self { repository }
    }

    /// Commit each descriptor by flipping its active pointer, then prune
    /// revisions older than the new active one.
    ///
    /// Descriptors are independent commits: a failure stops the batch but
    /// leaves already-flipped paths switched. Pruning failures are logged
    /// and never undo the flip.
    pub fn switch_active_version(&self, versions: &[MetaDataVersion]) -> Result<()> {
        for each in versions {
            if !each.is_switch_required() {
                continue;
            }
            self.repository.persist(
                &each.active_version_node_path(),
                &each.next_active_version().to_string(),
            )?;
            debug!(
                "Switched {} from version {} to {}",
                each.path(),
                each.current_active_version(),
                each.next_active_version()
            );
            self.prune_superseded(each);
        }
        Ok(())
    }

    fn prune_superseded(&self, version: &MetaDataVersion) {
        let existing = match self.get_versions(version.path()) {
            Ok(existing) => existing,
            Err(e) => {
                warn!("Failed to list versions of {} for pruning: {}", version.path(), e);
                return;
            }
        };
        for each in existing
            .into_iter()
            .filter(|each| *each < version.next_active_version())
        {
            if let Err(e) = self.repository.delete(&version.versions_node_path(each)) {
                warn!("Failed to prune version {} of {}: {}", each, version.path(), e);
            }
        }
    }

    /// Value stored at revision `active_version` of `path`
    pub fn get_version_path_by_active_version(
        &self,
        path: &str,
        active_version: u32,
    ) -> Result<Option<String>> {
        self.repository.query(&node_path::version(path, active_version))
    }

    /// Revision numbers present under `path`.
    ///
    /// More than two revisions means a stuck or leaked history; they are
    /// reported newest first and left in place.
    pub fn get_versions(&self, path: &str) -> Result<Vec<u32>> {
        let versions_path = node_path::versions(path);
        let mut result = self
            .repository
            .get_children_keys(&versions_path)?
            .into_iter()
            .map(|key| parse_version(&versions_path, &key))
            .collect::<Result<Vec<_>>>()?;
        if result.len() > 2 {
            warn!(
                "There are multiple versions of: {}, please check the configuration.",
                path
            );
            result.sort_unstable_by(|a, b| b.cmp(a));
        }
        Ok(result)
    }

    /// Currently active revision of `path`, `None` for a path never committed
    pub fn get_active_version(&self, path: &str) -> Result<Option<u32>> {
        let active_path = node_path::active_version(path);
        match self.repository.query(&active_path)? {
            Some(raw) if !raw.is_empty() => parse_version(&active_path, &raw).map(Some),
            _ => Ok(None),
        }
    }

    /// Value of the active revision of `path`
    pub fn load_active_value(&self, path: &str) -> Result<Option<String>> {
        match self.get_active_version(path)? {
            Some(active) => self.get_version_path_by_active_version(path, active),
            None => Ok(None),
        }
    }

    /// Write `value` as a new revision of `path` without committing it.
    ///
    /// A path without an active pointer gets one pointing at the new
    /// revision immediately, so the returned descriptor is a no-op for
    /// freshly created paths.
    pub fn persist_next_version(&self, path: &str, value: &str) -> Result<MetaDataVersion> {
        let next = self
            .get_versions(path)?
            .into_iter()
            .max()
            .map_or(DEFAULT_VERSION, |latest| latest + 1);
        self.repository.persist(&node_path::version(path, next), value)?;
        let current = match self.get_active_version(path)? {
            Some(active) => active,
            None => {
                self.repository
                    .persist(&node_path::active_version(path), &next.to_string())?;
                next
            }
        };
        Ok(MetaDataVersion::new(path, current, next))
    }

    /// Write a new revision of `path` and commit it right away
    pub fn persist_and_activate(&self, path: &str, value: &str) -> Result<MetaDataVersion> {
        let version = self.persist_next_version(path, value)?;
        self.switch_active_version(std::slice::from_ref(&version))?;
        Ok(version)
    }
}

fn parse_version(path: &str, raw: &str) -> Result<u32> {
    raw.parse().map_err(|_| Error::InvalidVersion {
        path: path.to_string(),
        value: raw.to_string(),
    })
}
