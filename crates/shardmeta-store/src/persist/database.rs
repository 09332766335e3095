//! Database namespace nodes

use crate::node_path;
use crate::repository::PersistRepository;
use shardmeta_common::Result;
use std::sync::Arc;

/// Database meta data persist service
#[derive(Clone)]
pub struct DatabaseMetaDataPersistService {
    repository: Arc<dyn PersistRepository>,
}

impl DatabaseMetaDataPersistService {
    pub fn new(repository: Arc<dyn PersistRepository>) -> Self {
        Self { repository }
    }

    pub fn add(&self, database_name: &str) -> Result<()> {
        self.repository
            .persist(&node_path::database(database_name), "")
    }

    /// Remove the database node with everything below it
    pub fn drop(&self, database_name: &str) -> Result<()> {
        self.repository.delete(&node_path::database(database_name))
    }

    pub fn exists(&self, database_name: &str) -> Result<bool> {
        Ok(self
            .repository
            .query(&node_path::database(database_name))?
            .is_some())
    }

    pub fn load_all_names(&self) -> Result<Vec<String>> {
        self.repository.get_children_keys(node_path::METADATA_ROOT)
    }
}
