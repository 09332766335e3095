//! Storage unit pool properties
//!
//! Unlike tables, storage unit writes are returned as uncommitted
//! [`MetaDataVersion`] descriptors: the caller decides when the new pool
//! properties become authoritative.

use crate::node_path;
use crate::repository::PersistRepository;
use crate::version::{MetaDataVersion, MetaDataVersionPersistService};
use shardmeta_common::{DataSourcePoolProperties, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Data source unit persist service
#[derive(Clone)]
pub struct DataSourceUnitPersistService {
    repository: Arc<dyn PersistRepository>,
    versions: MetaDataVersionPersistService,
}

impl DataSourceUnitPersistService {
    pub fn new(repository: Arc<dyn PersistRepository>, versions: MetaDataVersionPersistService) -> Self {
        Self {
            repository,
            versions,
        }
    }

    /// Write a new revision for every storage unit, returning one pending
    /// descriptor per unit
    pub fn persist(
        &self,
        database_name: &str,
        props: &BTreeMap<String, DataSourcePoolProperties>,
    ) -> Result<Vec<MetaDataVersion>> {
        let mut result = Vec::with_capacity(props.len());
        for (name, each) in props {
            let path = node_path::data_source_unit(database_name, name);
            result.push(
                self.versions
                    .persist_next_version(&path, &serde_json::to_string(each)?)?,
            );
        }
        Ok(result)
    }

    /// Active pool properties of every storage unit of the database
    pub fn load(&self, database_name: &str) -> Result<BTreeMap<String, DataSourcePoolProperties>> {
        let mut result = BTreeMap::new();
        for name in self
            .repository
            .get_children_keys(&node_path::data_source_units(database_name))?
        {
            let path = node_path::data_source_unit(database_name, &name);
            match self.versions.load_active_value(&path)? {
                Some(raw) => {
                    result.insert(name, serde_json::from_str(&raw)?);
                }
                None => warn!("Storage unit {} of {} has no active version", name, database_name),
            }
        }
        Ok(result)
    }

    pub fn delete(&self, database_name: &str, storage_unit_name: &str) -> Result<()> {
        self.repository
            .delete(&node_path::data_source_unit(database_name, storage_unit_name))
    }
}
