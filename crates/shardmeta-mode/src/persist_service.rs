//! Cluster metadata orchestration
//!
//! Every administrative metadata change runs through
//! [`ClusterMetaDataManagerPersistService`]: snapshot the current
//! generation, compute and build the change, persist it, commit its
//! versions, propagate, then reclaim retired resources.
//!
//! Callers serialize operations on the same database; operations on
//! different databases may run concurrently.

use crate::contexts::{MetaDataContexts, RuleMetaData};
use crate::coordinator::{
    ClusterDatabaseListenerCoordinatorType, ClusterDatabaseListenerPersistCoordinator,
    DatabaseListenerNotifier,
};
use crate::manager::MetaDataContextManager;
use crate::pool::DataSourcePoolDestroyer;
use crate::switch::SwitchingResource;
use async_trait::async_trait;
use shardmeta_common::{
    Config, DataSourcePoolProperties, Error, Properties, Result, RuleConfiguration,
    SingleRuleConfiguration, TableMeta, ViewMeta,
};
use shardmeta_store::{MetaDataPersistFacade, PersistRepository};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Administrative metadata mutations
#[async_trait]
pub trait MetaDataManagerPersistService: Send + Sync {
    async fn create_database(&self, database_name: &str) -> Result<()>;

    async fn drop_database(&self, database_name: &str) -> Result<()>;

    async fn create_schema(&self, database_name: &str, schema_name: &str) -> Result<()>;

    async fn alter_schema(
        &self,
        database_name: &str,
        schema_name: &str,
        altered_tables: &[TableMeta],
        altered_views: &[ViewMeta],
        dropped_tables: &[String],
        dropped_views: &[String],
    ) -> Result<()>;

    async fn rename_schema(&self, database_name: &str, schema_name: &str, rename_schema_name: &str) -> Result<()>;

    async fn drop_schema(&self, database_name: &str, schema_names: &[String]) -> Result<()>;

    async fn create_table(&self, database_name: &str, schema_name: &str, table: &TableMeta) -> Result<()>;

    async fn drop_table(&self, database_name: &str, schema_name: &str, table_name: &str) -> Result<()>;

    async fn register_storage_units(
        &self,
        database_name: &str,
        to_be_registered: &BTreeMap<String, DataSourcePoolProperties>,
    ) -> Result<()>;

    async fn alter_storage_units(
        &self,
        database_name: &str,
        to_be_altered: &BTreeMap<String, DataSourcePoolProperties>,
    ) -> Result<()>;

    async fn unregister_storage_units(&self, database_name: &str, to_be_dropped: &[String]) -> Result<()>;

    async fn alter_single_rule_configuration(&self, database_name: &str, rule_meta_data: &RuleMetaData) -> Result<()>;

    async fn alter_rule_configuration(&self, database_name: &str, config: Option<&RuleConfiguration>) -> Result<()>;

    async fn remove_rule_configuration_item(
        &self,
        database_name: &str,
        config: Option<&RuleConfiguration>,
    ) -> Result<()>;

    async fn remove_rule_configuration(&self, database_name: &str, rule_name: &str) -> Result<()>;

    async fn alter_global_rule_configuration(&self, config: &RuleConfiguration) -> Result<()>;

    async fn alter_properties(&self, props: &Properties) -> Result<()>;
}

#[derive(Clone, Copy)]
enum StorageUnitChange<'a> {
    Register(&'a BTreeMap<String, DataSourcePoolProperties>),
    Alter(&'a BTreeMap<String, DataSourcePoolProperties>),
    Unregister(&'a str),
}

/// Cluster meta data manager persist service
pub struct ClusterMetaDataManagerPersistService {
    context_manager: Arc<MetaDataContextManager>,
    persist_facade: MetaDataPersistFacade,
    listener_notifier: Arc<dyn DatabaseListenerNotifier>,
    destroyer: DataSourcePoolDestroyer,
    reload_timeout: Duration,
}

impl ClusterMetaDataManagerPersistService {
    pub fn new(
        context_manager: Arc<MetaDataContextManager>,
        repository: Arc<dyn PersistRepository>,
        config: &Config,
    ) -> Self {
        Self {
            persist_facade: context_manager.persist_facade().clone(),
            context_manager,
            listener_notifier: Arc::new(ClusterDatabaseListenerPersistCoordinator::new(repository)),
            destroyer: DataSourcePoolDestroyer::from_config(&config.pool),
            reload_timeout: config.cluster.reload_timeout(),
        }
    }

    /// Replace the notifier publishing database lifecycle events
    #[must_use]
    pub fn with_listener_notifier(mut self, listener_notifier: Arc<dyn DatabaseListenerNotifier>) -> Self {
        self.listener_notifier = listener_notifier;
        self
    }

    async fn switch_storage_units(&self, database_name: &str, change: StorageUnitChange<'_>) -> Result<()> {
        let original = self.context_manager.meta_data_contexts();
        let resource = original.database(database_name)?.resource();
        let switch_manager = self.context_manager.resource_switch_manager();
        let switching = match change {
            StorageUnitChange::Register(props) => {
                switch_manager
                    .switch_by_register_storage_unit(resource, props)
                    .await?
            }
            StorageUnitChange::Alter(props) => switch_manager.switch_by_alter_storage_unit(resource, props).await?,
            StorageUnitChange::Unregister(name) => {
                switch_manager
                    .create_by_unregister_storage_unit(resource, &[name.to_string()])
                    .await?
            }
        };
        match self.apply_switching_resource(database_name, &original, &switching, change) {
            Ok(()) => {
                self.destroyer
                    .destroy_all(switching.stale_data_sources().values().cloned());
                Ok(())
            }
            Err(e) => {
                warn!("Storage unit change of {} failed, closing new data sources: {}", database_name, e);
                self.destroyer
                    .destroy_all(switching.new_data_sources().values().cloned());
                Err(e)
            }
        }
    }

    fn apply_switching_resource(
        &self,
        database_name: &str,
        original: &MetaDataContexts,
        switching: &SwitchingResource,
        change: StorageUnitChange<'_>,
    ) -> Result<()> {
        let reload = self
            .context_manager
            .contexts_factory()
            .create_by_switch_resource(database_name, false, switching, original)?;
        let database = reload.database(database_name)?.clone();
        match change {
            StorageUnitChange::Register(props) | StorageUnitChange::Alter(props) => {
                let versions = self
                    .persist_facade
                    .data_source_unit_service()
                    .persist(database_name, props)?;
                self.persist_facade
                    .version_service()
                    .switch_active_version(&versions)?;
                self.after_storage_units_altered(database_name, original, &reload)?;
            }
            StorageUnitChange::Unregister(name) => {
                self.persist_facade
                    .data_source_unit_service()
                    .delete(database_name, name)?;
                self.after_storage_units_dropped(database_name, original, &reload)?;
            }
        }
        self.context_manager.install_database(database);
        Ok(())
    }

    fn after_storage_units_altered(
        &self,
        database_name: &str,
        original: &MetaDataContexts,
        reload: &MetaDataContexts,
    ) -> Result<()> {
        self.persist_statistics(database_name, original, reload)?;
        self.persist_facade.persist_reload_database_by_alter(
            database_name,
            &reload.schemas(database_name),
            &original.schemas(database_name),
        )
    }

    fn after_storage_units_dropped(
        &self,
        database_name: &str,
        original: &MetaDataContexts,
        reload: &MetaDataContexts,
    ) -> Result<()> {
        for schema in reload.database(database_name)?.schemas().values() {
            self.persist_facade
                .schema_service()
                .alter_by_rule_dropped(database_name, schema)?;
        }
        self.persist_statistics(database_name, original, reload)?;
        self.persist_facade.persist_reload_database_by_drop(
            database_name,
            &reload.schemas(database_name),
            &original.schemas(database_name),
        )
    }

    fn persist_statistics(&self, database_name: &str, original: &MetaDataContexts, reload: &MetaDataContexts) -> Result<()> {
        let Some(statistics) = reload.statistics().get_database(database_name) else {
            return Ok(());
        };
        let database = original.meta_data().get_database(database_name);
        for (schema_name, each) in &statistics.schemas {
            self.persist_facade.statistics_service().persist(
                database_name,
                schema_name,
                database.and_then(|db| db.get_schema(schema_name)),
                each,
            )?;
        }
        Ok(())
    }

    /// Wait for the generation whose rules of `database_name` match the
    /// committed ones
    async fn await_reload(&self, database_name: &str, original: &MetaDataContexts) -> Result<Arc<MetaDataContexts>> {
        let committed = RuleMetaData::new(
            self.persist_facade
                .database_rule_service()
                .load(database_name)?,
        );
        let generation = original.generation();
        self.context_manager
            .wait_until(
                |current| {
                    current.generation() > generation
                        && current
                            .meta_data()
                            .get_database(database_name)
                            .is_some_and(|database| database.rule_meta_data() == &committed)
                },
                self.reload_timeout,
            )
            .await
            .ok_or_else(|| Error::ReloadTimeout {
                database: database_name.to_string(),
                waited_ms: u64::try_from(self.reload_timeout.as_millis()).unwrap_or(u64::MAX),
            })
    }

    async fn after_rule_configuration_altered(&self, database_name: &str, original: &MetaDataContexts) -> Result<()> {
        let reload = self.await_reload(database_name, original).await?;
        self.persist_facade.persist_reload_database_by_alter(
            database_name,
            &reload.schemas(database_name),
            &original.schemas(database_name),
        )
    }

    async fn after_rule_configuration_dropped(&self, database_name: &str, original: &MetaDataContexts) -> Result<()> {
        let reload = self.await_reload(database_name, original).await?;
        self.persist_facade.persist_reload_database_by_drop(
            database_name,
            &reload.schemas(database_name),
            &original.schemas(database_name),
        )
    }
}

#[async_trait]
impl MetaDataManagerPersistService for ClusterMetaDataManagerPersistService {
    async fn create_database(&self, database_name: &str) -> Result<()> {
        // Node first: listeners reacting to CREATE must find it
        self.persist_facade.database_service().add(database_name)?;
        self.listener_notifier
            .notify(database_name, ClusterDatabaseListenerCoordinatorType::Create)
    }

    async fn drop_database(&self, database_name: &str) -> Result<()> {
        // Notification first: listeners reacting to DROP must still find the node
        self.listener_notifier
            .notify(database_name, ClusterDatabaseListenerCoordinatorType::Drop)?;
        self.persist_facade.database_service().drop(database_name)
    }

    async fn create_schema(&self, database_name: &str, schema_name: &str) -> Result<()> {
        self.persist_facade.schema_service().add(database_name, schema_name)
    }

    async fn alter_schema(
        &self,
        database_name: &str,
        schema_name: &str,
        altered_tables: &[TableMeta],
        altered_views: &[ViewMeta],
        dropped_tables: &[String],
        dropped_views: &[String],
    ) -> Result<()> {
        let tables = self.persist_facade.table_service();
        let views = self.persist_facade.view_service();
        tables.persist(database_name, schema_name, altered_tables)?;
        views.persist(database_name, schema_name, altered_views)?;
        for each in dropped_tables {
            tables.drop(database_name, schema_name, each)?;
        }
        for each in dropped_views {
            views.drop(database_name, schema_name, each)?;
        }
        Ok(())
    }

    async fn rename_schema(&self, database_name: &str, schema_name: &str, rename_schema_name: &str) -> Result<()> {
        let contexts = self.context_manager.meta_data_contexts();
        let schema = contexts
            .database(database_name)?
            .get_schema(schema_name)
            .ok_or_else(|| Error::SchemaNotFound {
                database: database_name.to_string(),
                schema: schema_name.to_string(),
            })?;
        if schema.is_empty() {
            self.persist_facade
                .schema_service()
                .add(database_name, rename_schema_name)?;
        } else {
            self.persist_facade
                .table_service()
                .persist(database_name, rename_schema_name, schema.all_tables())?;
            self.persist_facade
                .view_service()
                .persist(database_name, rename_schema_name, schema.all_views())?;
        }
        self.persist_facade.schema_service().drop(database_name, schema_name)?;
        info!("Renamed schema {}.{} to {}", database_name, schema_name, rename_schema_name);
        Ok(())
    }

    async fn drop_schema(&self, database_name: &str, schema_names: &[String]) -> Result<()> {
        for each in schema_names {
            self.persist_facade.schema_service().drop(database_name, each)?;
        }
        Ok(())
    }

    async fn create_table(&self, database_name: &str, schema_name: &str, table: &TableMeta) -> Result<()> {
        self.persist_facade
            .table_service()
            .persist(database_name, schema_name, [table])
    }

    async fn drop_table(&self, database_name: &str, schema_name: &str, table_name: &str) -> Result<()> {
        self.persist_facade
            .table_service()
            .drop(database_name, schema_name, table_name)
    }

    async fn register_storage_units(
        &self,
        database_name: &str,
        to_be_registered: &BTreeMap<String, DataSourcePoolProperties>,
    ) -> Result<()> {
        self.switch_storage_units(database_name, StorageUnitChange::Register(to_be_registered))
            .await?;
        info!(
            "Registered storage units {:?} of {}",
            to_be_registered.keys().collect::<Vec<_>>(),
            database_name
        );
        Ok(())
    }

    async fn alter_storage_units(
        &self,
        database_name: &str,
        to_be_altered: &BTreeMap<String, DataSourcePoolProperties>,
    ) -> Result<()> {
        self.switch_storage_units(database_name, StorageUnitChange::Alter(to_be_altered))
            .await?;
        info!(
            "Altered storage units {:?} of {}",
            to_be_altered.keys().collect::<Vec<_>>(),
            database_name
        );
        Ok(())
    }

    async fn unregister_storage_units(&self, database_name: &str, to_be_dropped: &[String]) -> Result<()> {
        let registered = self
            .persist_facade
            .data_source_unit_service()
            .load(database_name)?;
        for each in to_be_dropped {
            if !registered.contains_key(each) {
                debug!("Skipping unknown storage unit {} of {}", each, database_name);
                continue;
            }
            self.switch_storage_units(database_name, StorageUnitChange::Unregister(each))
                .await?;
            info!("Unregistered storage unit {} of {}", each, database_name);
        }
        Ok(())
    }

    async fn alter_single_rule_configuration(&self, database_name: &str, rule_meta_data: &RuleMetaData) -> Result<()> {
        let config = rule_meta_data
            .find::<SingleRuleConfiguration>()
            .ok_or_else(|| Error::RuleNotFound {
                database: database_name.to_string(),
                rule: SingleRuleConfiguration::RULE_NAME.to_string(),
            })?;
        let versions = self
            .persist_facade
            .database_rule_service()
            .persist(database_name, [&RuleConfiguration::Single(config.clone())])?;
        self.persist_facade
            .version_service()
            .switch_active_version(&versions)
    }

    async fn alter_rule_configuration(&self, database_name: &str, config: Option<&RuleConfiguration>) -> Result<()> {
        let Some(config) = config else {
            return Ok(());
        };
        let original = self.context_manager.meta_data_contexts();
        let versions = self
            .persist_facade
            .database_rule_service()
            .persist(database_name, [config])?;
        self.persist_facade
            .version_service()
            .switch_active_version(&versions)?;
        self.after_rule_configuration_altered(database_name, &original)
            .await
    }

    async fn remove_rule_configuration_item(
        &self,
        database_name: &str,
        config: Option<&RuleConfiguration>,
    ) -> Result<()> {
        let Some(config) = config else {
            return Ok(());
        };
        let original = self.context_manager.meta_data_contexts();
        self.persist_facade
            .database_rule_service()
            .delete_items(database_name, [config])?;
        self.after_rule_configuration_dropped(database_name, &original)
            .await
    }

    async fn remove_rule_configuration(&self, database_name: &str, rule_name: &str) -> Result<()> {
        let original = self.context_manager.meta_data_contexts();
        self.persist_facade
            .database_rule_service()
            .delete(database_name, rule_name)?;
        self.after_rule_configuration_dropped(database_name, &original)
            .await
    }

    async fn alter_global_rule_configuration(&self, config: &RuleConfiguration) -> Result<()> {
        self.persist_facade.global_rule_service().persist([config])
    }

    async fn alter_properties(&self, props: &Properties) -> Result<()> {
        self.persist_facade.props_service().persist(props)
    }
}
