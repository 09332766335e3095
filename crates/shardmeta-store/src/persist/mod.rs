//! Persist services mapping metadata objects onto repository nodes.

pub mod data_source;
pub mod database;
pub mod props;
pub mod rule;
pub mod schema;
pub mod statistics;
pub mod table;

pub use data_source::DataSourceUnitPersistService;
pub use database::DatabaseMetaDataPersistService;
pub use props::PropertiesPersistService;
pub use rule::{DatabaseRulePersistService, GlobalRulePersistService};
pub use schema::SchemaMetaDataPersistService;
pub use statistics::StatisticsPersistService;
pub use table::{TableMetaDataPersistService, ViewMetaDataPersistService};

use crate::repository::PersistRepository;
use crate::version::MetaDataVersionPersistService;
use shardmeta_common::{Result, SchemaMeta};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Entry point to every persist service sharing one repository
#[derive(Clone)]
pub struct MetaDataPersistFacade {
    repository: Arc<dyn PersistRepository>,
    version_service: MetaDataVersionPersistService,
    database_service: DatabaseMetaDataPersistService,
    schema_service: SchemaMetaDataPersistService,
    table_service: TableMetaDataPersistService,
    view_service: ViewMetaDataPersistService,
    data_source_unit_service: DataSourceUnitPersistService,
    database_rule_service: DatabaseRulePersistService,
    global_rule_service: GlobalRulePersistService,
    props_service: PropertiesPersistService,
    statistics_service: StatisticsPersistService,
}

impl MetaDataPersistFacade {
    pub fn new(repository: Arc<dyn PersistRepository>) -> Self {
        let version_service = MetaDataVersionPersistService::new(repository.clone());
        let table_service = TableMetaDataPersistService::new(repository.clone(), version_service.clone());
        let view_service = ViewMetaDataPersistService::new(repository.clone(), version_service.clone());
        Self {
            database_service: DatabaseMetaDataPersistService::new(repository.clone()),
            schema_service: SchemaMetaDataPersistService::new(
                repository.clone(),
                table_service.clone(),
                view_service.clone(),
            ),
            data_source_unit_service: DataSourceUnitPersistService::new(
                repository.clone(),
                version_service.clone(),
            ),
            database_rule_service: DatabaseRulePersistService::new(repository.clone(), version_service.clone()),
            global_rule_service: GlobalRulePersistService::new(repository.clone(), version_service.clone()),
            props_service: PropertiesPersistService::new(version_service.clone()),
            statistics_service: StatisticsPersistService::new(repository.clone()),
            table_service,
            view_service,
            version_service,
            repository,
        }
    }

    pub fn repository(&self) -> &Arc<dyn PersistRepository> {
        &self.repository
    }

    pub const fn version_service(&self) -> &MetaDataVersionPersistService {
        &self.version_service
    }

    pub const fn database_service(&self) -> &DatabaseMetaDataPersistService {
        &self.database_service
    }

    pub const fn schema_service(&self) -> &SchemaMetaDataPersistService {
        &self.schema_service
    }

    pub const fn table_service(&self) -> &TableMetaDataPersistService {
        &self.table_service
    }

    pub const fn view_service(&self) -> &ViewMetaDataPersistService {
        &self.view_service
    }

    pub const fn data_source_unit_service(&self) -> &DataSourceUnitPersistService {
        &self.data_source_unit_service
    }

    pub const fn database_rule_service(&self) -> &DatabaseRulePersistService {
        &self.database_rule_service
    }

    pub const fn global_rule_service(&self) -> &GlobalRulePersistService {
        &self.global_rule_service
    }

    pub const fn props_service(&self) -> &PropertiesPersistService {
        &self.props_service
    }

    pub const fn statistics_service(&self) -> &StatisticsPersistService {
        &self.statistics_service
    }

    /// Persist the schema differences of a database reloaded after an
    /// alteration: new or changed tables and views are written, tables that
    /// disappeared are dropped.
    pub fn persist_reload_database_by_alter(
        &self,
        database_name: &str,
        reload_schemas: &BTreeMap<String, SchemaMeta>,
        current_schemas: &BTreeMap<String, SchemaMeta>,
    ) -> Result<()> {
        for schema in to_be_added_schemas(reload_schemas, current_schemas) {
            self.schema_service.alter_by_rule_altered(database_name, &schema)?;
        }
        self.drop_removed_tables(database_name, reload_schemas, current_schemas)
    }

    /// Same as [`Self::persist_reload_database_by_alter`] for a reload
    /// caused by removing a rule or storage unit; views are left as they are.
    pub fn persist_reload_database_by_drop(
        &self,
        database_name: &str,
        reload_schemas: &BTreeMap<String, SchemaMeta>,
        current_schemas: &BTreeMap<String, SchemaMeta>,
    ) -> Result<()> {
        for schema in to_be_added_schemas(reload_schemas, current_schemas) {
            self.schema_service.alter_by_rule_dropped(database_name, &schema)?;
        }
        self.drop_removed_tables(database_name, reload_schemas, current_schemas)
    }

    fn drop_removed_tables(
        &self,
        database_name: &str,
        reload_schemas: &BTreeMap<String, SchemaMeta>,
        current_schemas: &BTreeMap<String, SchemaMeta>,
    ) -> Result<()> {
        for (schema_name, current) in current_schemas {
            let reload = reload_schemas.get(schema_name);
            for table in current
                .all_tables()
                .filter(|each| !reload.is_some_and(|schema| schema.contains_table(&each.name)))
            {
                debug!("Dropping table {}.{}.{} after reload", database_name, schema_name, table.name);
                self.table_service.drop(database_name, schema_name, &table.name)?;
            }
        }
        Ok(())
    }
}

/// Per schema, the tables and views of `reload` that `current` lacks or
/// defines differently
fn to_be_added_schemas(
    reload_schemas: &BTreeMap<String, SchemaMeta>,
    current_schemas: &BTreeMap<String, SchemaMeta>,
) -> Vec<SchemaMeta> {
    let mut result = Vec::new();
    for (schema_name, reload) in reload_schemas {
        let current = current_schemas.get(schema_name);
        let mut added = SchemaMeta::new(schema_name.clone());
        for table in reload.all_tables() {
            if current.and_then(|each| each.get_table(&table.name)) != Some(table) {
                added.put_table(table.clone());
            }
        }
        for view in reload.all_views() {
            if current.and_then(|each| each.views.get(&view.name)) != Some(view) {
                added.put_view(view.clone());
            }
        }
        if !added.is_empty() {
            result.push(added);
        }
    }
    result
}
