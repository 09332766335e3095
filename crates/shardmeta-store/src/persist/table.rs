//! Table and view definitions
//!
//! Each table and view is a versioned item; a persisted definition is
//! committed immediately, so readers resolving the active version see it as
//! soon as the call returns.

use crate::node_path;
use crate::repository::PersistRepository;
use crate::version::MetaDataVersionPersistService;
use shardmeta_common::{Result, TableMeta, ViewMeta};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Table meta data persist service
#[derive(Clone)]
pub struct TableMetaDataPersistService {
    repository: Arc<dyn PersistRepository>,
    versions: MetaDataVersionPersistService,
}

impl TableMetaDataPersistService {
    pub fn new(repository: Arc<dyn PersistRepository>, versions: MetaDataVersionPersistService) -> Self {
        Self {
            repository,
            versions,
        }
    }

    pub fn persist<'a>(
        &self,
        database_name: &str,
        schema_name: &str,
        tables: impl IntoIterator<Item = &'a TableMeta>,
    ) -> Result<()> {
        for table in tables {
            let path = node_path::table(database_name, schema_name, &table.name);
            self.versions
                .persist_and_activate(&path, &serde_json::to_string(table)?)?;
            debug!("Persisted table {}.{}.{}", database_name, schema_name, table.name);
        }
        Ok(())
    }

    pub fn drop(&self, database_name: &str, schema_name: &str, table_name: &str) -> Result<()> {
        self.repository
            .delete(&node_path::table(database_name, schema_name, table_name))
    }

    pub fn load(&self, database_name: &str, schema_name: &str) -> Result<BTreeMap<String, TableMeta>> {
        let mut result = BTreeMap::new();
        for name in self
            .repository
            .get_children_keys(&node_path::tables(database_name, schema_name))?
        {
            let path = node_path::table(database_name, schema_name, &name);
            if let Some(raw) = self.versions.load_active_value(&path)? {
                result.insert(name, serde_json::from_str(&raw)?);
            }
        }
        Ok(result)
    }
}

/// View meta data persist service
#[derive(Clone)]
pub struct ViewMetaDataPersistService {
    repository: Arc<dyn PersistRepository>,
    versions: MetaDataVersionPersistService,
}

impl ViewMetaDataPersistService {
    pub fn new(repository: Arc<dyn PersistRepository>, versions: MetaDataVersionPersistService) -> Self {
        Self {
            repository,
            versions,
        }
    }

    pub fn persist<'a>(
        &self,
        database_name: &str,
        schema_name: &str,
        views: impl IntoIterator<Item = &'a ViewMeta>,
    ) -> Result<()> {
        for view in views {
            let path = node_path::view(database_name, schema_name, &view.name);
            self.versions
                .persist_and_activate(&path, &serde_json::to_string(view)?)?;
        }
        Ok(())
    }

    pub fn drop(&self, database_name: &str, schema_name: &str, view_name: &str) -> Result<()> {
        self.repository
            .delete(&node_path::view(database_name, schema_name, view_name))
    }

    pub fn load(&self, database_name: &str, schema_name: &str) -> Result<BTreeMap<String, ViewMeta>> {
        let mut result = BTreeMap::new();
        for name in self
            .repository
            .get_children_keys(&node_path::views(database_name, schema_name))?
        {
            let path = node_path::view(database_name, schema_name, &name);
            if let Some(raw) = self.versions.load_active_value(&path)? {
                result.insert(name, serde_json::from_str(&raw)?);
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use shardmeta_common::ColumnMeta;

    fn services() -> (TableMetaDataPersistService, ViewMetaDataPersistService) {
        let repo: Arc<dyn PersistRepository> = Arc::new(MemoryRepository::new());
        let versions = MetaDataVersionPersistService::new(repo.clone());
        (
            TableMetaDataPersistService::new(repo.clone(), versions.clone()),
            ViewMetaDataPersistService::new(repo, versions),
        )
    }

    #[test]
    fn test_table_redefinition_keeps_single_revision() {
        let (tables, _) = services();
        let v1 = TableMeta::new("t_order", vec![ColumnMeta::new("order_id", "BIGINT").primary_key()]);
        let mut v2 = v1.clone();
        v2.columns.push(ColumnMeta::new("user_id", "INT"));

        tables.persist("foo_db", "public", [&v1]).unwrap();
        tables.persist("foo_db", "public", [&v2]).unwrap();

        let loaded = tables.load("foo_db", "public").unwrap();
        assert_eq!(loaded.get("t_order"), Some(&v2));
        let path = node_path::table("foo_db", "public", "t_order");
        assert_eq!(tables.versions.get_versions(&path).unwrap(), vec![1]);
    }

    #[test]
    fn test_drop_view() {
        let (_, views) = services();
        let view = ViewMeta::new("v_order", "SELECT * FROM t_order");
        views.persist("foo_db", "public", [&view]).unwrap();
        assert_eq!(views.load("foo_db", "public").unwrap().len(), 1);

        views.drop("foo_db", "public", "v_order").unwrap();
        assert!(views.load("foo_db", "public").unwrap().is_empty());
    }
}
