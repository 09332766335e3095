//! Schema nodes

use crate::node_path;
use crate::persist::table::{TableMetaDataPersistService, ViewMetaDataPersistService};
use crate::repository::PersistRepository;
use shardmeta_common::{Result, SchemaMeta};
use std::sync::Arc;

/// Schema meta data persist service
#[derive(Clone)]
pub struct SchemaMetaDataPersistService {
    repository: Arc<dyn PersistRepository>,
    tables: TableMetaDataPersistService,
    views: ViewMetaDataPersistService,
}

impl SchemaMetaDataPersistService {
    pub fn new(
        repository: Arc<dyn PersistRepository>,
        tables: TableMetaDataPersistService,
        views: ViewMetaDataPersistService,
    ) -> Self {
        Self {
            repository,
            tables,
            views,
        }
    }

    /// Create an empty schema
    pub fn add(&self, database_name: &str, schema_name: &str) -> Result<()> {
        self.repository
            .persist(&node_path::tables(database_name, schema_name), "")
    }

    pub fn drop(&self, database_name: &str, schema_name: &str) -> Result<()> {
        self.repository
            .delete(&node_path::schema(database_name, schema_name))
    }

    /// Persist the tables and views of a schema reshaped by a rule change
    pub fn alter_by_rule_altered(&self, database_name: &str, schema: &SchemaMeta) -> Result<()> {
        self.add(database_name, &schema.name)?;
        self.tables
            .persist(database_name, &schema.name, schema.all_tables())?;
        self.views
            .persist(database_name, &schema.name, schema.all_views())
    }

    /// Persist the tables of a schema reshaped by a rule or storage unit removal
    pub fn alter_by_rule_dropped(&self, database_name: &str, schema: &SchemaMeta) -> Result<()> {
        self.add(database_name, &schema.name)?;
        self.tables
            .persist(database_name, &schema.name, schema.all_tables())
    }

    pub fn load_names(&self, database_name: &str) -> Result<Vec<String>> {
        self.repository
            .get_children_keys(&node_path::schemas(database_name))
    }

    /// Load a schema with its tables and views
    pub fn load(&self, database_name: &str, schema_name: &str) -> Result<SchemaMeta> {
        Ok(SchemaMeta {
            name: schema_name.to_string(),
            tables: self.tables.load(database_name, schema_name)?,
            views: self.views.load(database_name, schema_name)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::MetaDataVersionPersistService;
    use crate::repository::MemoryRepository;
    use shardmeta_common::{TableMeta, ViewMeta};

    fn service() -> SchemaMetaDataPersistService {
        let repo: Arc<dyn PersistRepository> = Arc::new(MemoryRepository::new());
        let versions = MetaDataVersionPersistService::new(repo.clone());
        SchemaMetaDataPersistService::new(
            repo.clone(),
            TableMetaDataPersistService::new(repo.clone(), versions.clone()),
            ViewMetaDataPersistService::new(repo, versions),
        )
    }

    #[test]
    fn test_add_empty_schema() {
        let service = service();
        service.add("foo_db", "public").unwrap();
        assert_eq!(service.load_names("foo_db").unwrap(), vec!["public"]);
        assert!(service.load("foo_db", "public").unwrap().is_empty());
    }

    #[test]
    fn test_alter_by_rule_dropped_skips_views() {
        let service = service();
        let mut schema = SchemaMeta::with_tables("public", [TableMeta::new("t_order", vec![])]);
        schema.put_view(ViewMeta::new("v_order", "SELECT 1"));

        service.alter_by_rule_dropped("foo_db", &schema).unwrap();
        let loaded = service.load("foo_db", "public").unwrap();
        assert!(loaded.contains_table("t_order"));
        assert!(loaded.views.is_empty());

        service.alter_by_rule_altered("foo_db", &schema).unwrap();
        assert_eq!(service.load("foo_db", "public").unwrap(), schema);
    }

    #[test]
    fn test_drop_schema() {
        let service = service();
        service.add("foo_db", "public").unwrap();
        service.add("foo_db", "archive").unwrap();
        service.drop("foo_db", "public").unwrap();
        assert_eq!(service.load_names("foo_db").unwrap(), vec!["archive"]);
    }
}
