//! Database create/drop notifications for other cluster members

use shardmeta_common::{Error, Result};
use shardmeta_store::PersistRepository;
use shardmeta_store::node_path;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Event published when a database appears or disappears
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterDatabaseListenerCoordinatorType {
    Create,
    Drop,
}

impl ClusterDatabaseListenerCoordinatorType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Drop => "DROP",
        }
    }
}

impl fmt::Display for ClusterDatabaseListenerCoordinatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusterDatabaseListenerCoordinatorType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CREATE" => Ok(Self::Create),
            "DROP" => Ok(Self::Drop),
            other => Err(Error::Serialization(format!(
                "unknown database listener event: {other}"
            ))),
        }
    }
}

/// Publishes database lifecycle events to the cluster
pub trait DatabaseListenerNotifier: Send + Sync {
    fn notify(&self, database_name: &str, event: ClusterDatabaseListenerCoordinatorType) -> Result<()>;
}

/// Notifier writing events under the listener coordinator node, where
/// every member watches for them
#[derive(Clone)]
pub struct ClusterDatabaseListenerPersistCoordinator {
    repository: Arc<dyn PersistRepository>,
}

impl ClusterDatabaseListenerPersistCoordinator {
    pub fn new(repository: Arc<dyn PersistRepository>) -> Self {
        Self { repository }
    }

    pub fn persist(&self, database_name: &str, event: ClusterDatabaseListenerCoordinatorType) -> Result<()> {
        self.repository
            .persist(&node_path::listener_coordinator(database_name), event.as_str())?;
        info!("Published {} for database {}", event, database_name);
        Ok(())
    }

    /// Pending event of a database
    pub fn load(&self, database_name: &str) -> Result<Option<ClusterDatabaseListenerCoordinatorType>> {
        self.repository
            .query(&node_path::listener_coordinator(database_name))?
            .map(|raw| raw.parse())
            .transpose()
    }

    /// Clear a handled event
    pub fn delete(&self, database_name: &str) -> Result<()> {
        self.repository
            .delete(&node_path::listener_coordinator(database_name))
    }
}

impl DatabaseListenerNotifier for ClusterDatabaseListenerPersistCoordinator {
    fn notify(&self, database_name: &str, event: ClusterDatabaseListenerCoordinatorType) -> Result<()> {
        self.persist(database_name, event)
    }
}
