//! Metadata generations
//!
//! A [`MetaDataContexts`] is one immutable snapshot of everything a node
//! knows: databases with their schemas, rules and live pools, global rules,
//! properties and statistics. Changes build a new generation; nothing
//! mutates an installed one.

use crate::resource::{ResourceMetaData, StorageUnit};
use crate::switch::SwitchingResource;
use shardmeta_common::{
    DatabaseStatistics, Error, Properties, Result, RuleConfiguration, SchemaMeta,
    SingleRuleConfiguration,
};
use std::collections::BTreeMap;

/// Typed access to one kind of rule configuration
pub trait RuleKind: Sized {
    /// Rule name the configuration is registered under
    const TAG: &'static str;

    fn extract(config: &RuleConfiguration) -> Option<&Self>;
}

impl RuleKind for SingleRuleConfiguration {
    const TAG: &'static str = Self::RULE_NAME;

    fn extract(config: &RuleConfiguration) -> Option<&Self> {
        match config {
            RuleConfiguration::Single(single) => Some(single),
            RuleConfiguration::Named(_) => None,
        }
    }
}

/// Rule configurations keyed by rule name
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuleMetaData {
    configurations: BTreeMap<String, RuleConfiguration>,
}

impl RuleMetaData {
    pub fn new(configurations: impl IntoIterator<Item = RuleConfiguration>) -> Self {
        Self {
            configurations: configurations
                .into_iter()
                .map(|each| (each.rule_name().to_string(), each))
                .collect(),
        }
    }

    pub fn configurations(&self) -> impl Iterator<Item = &RuleConfiguration> {
        self.configurations.values()
    }

    pub fn get(&self, rule_name: &str) -> Option<&RuleConfiguration> {
        self.configurations.get(rule_name)
    }

    /// Typed configuration of rule kind `R`
    pub fn find<R: RuleKind>(&self) -> Option<&R> {
        self.configurations.get(R::TAG).and_then(R::extract)
    }
}

/// One logical database
#[derive(Clone, Debug, Default)]
pub struct Database {
    name: String,
    resource: ResourceMetaData,
    rule_meta_data: RuleMetaData,
    schemas: BTreeMap<String, SchemaMeta>,
}

impl Database {
    pub fn new(
        name: impl Into<String>,
        resource: ResourceMetaData,
        rule_meta_data: RuleMetaData,
        schemas: impl IntoIterator<Item = SchemaMeta>,
    ) -> Self {
        Self {
            name: name.into(),
            resource,
            rule_meta_data,
            schemas: schemas
                .into_iter()
                .map(|each| (each.name.clone(), each))
                .collect(),
        }
    }

    /// Database with no storage units, rules or schemas
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, ResourceMetaData::default(), RuleMetaData::default(), Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn resource(&self) -> &ResourceMetaData {
        &self.resource
    }

    pub const fn rule_meta_data(&self) -> &RuleMetaData {
        &self.rule_meta_data
    }

    pub const fn schemas(&self) -> &BTreeMap<String, SchemaMeta> {
        &self.schemas
    }

    pub fn get_schema(&self, name: &str) -> Option<&SchemaMeta> {
        self.schemas.get(name)
    }

    #[must_use]
    pub fn with_resource(mut self, resource: ResourceMetaData) -> Self {
        self.resource = resource;
        self
    }
}

/// Databases, global rules and properties of one generation
#[derive(Clone, Debug, Default)]
pub struct MetaData {
    databases: BTreeMap<String, Database>,
    global_rule_meta_data: RuleMetaData,
    props: Properties,
}

impl MetaData {
    pub fn new(
        databases: impl IntoIterator<Item = Database>,
        global_rule_meta_data: RuleMetaData,
        props: Properties,
    ) -> Self {
        Self {
            databases: databases
                .into_iter()
                .map(|each| (each.name().to_string(), each))
                .collect(),
            global_rule_meta_data,
            props,
        }
    }

    pub const fn databases(&self) -> &BTreeMap<String, Database> {
        &self.databases
    }

    pub fn get_database(&self, name: &str) -> Option<&Database> {
        self.databases.get(name)
    }

    pub fn contains_database(&self, name: &str) -> bool {
        self.databases.contains_key(name)
    }

    pub const fn global_rule_meta_data(&self) -> &RuleMetaData {
        &self.global_rule_meta_data
    }

    pub const fn props(&self) -> &Properties {
        &self.props
    }

    /// Copy with `database` added or replaced
    #[must_use]
    pub fn with_database(&self, database: Database) -> Self {
        let mut result = self.clone();
        result.databases.insert(database.name().to_string(), database);
        result
    }
}

/// Statistics collected per database
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Statistics {
    databases: BTreeMap<String, DatabaseStatistics>,
}

impl Statistics {
    pub const fn new(databases: BTreeMap<String, DatabaseStatistics>) -> Self {
        Self { databases }
    }

    pub fn get_database(&self, name: &str) -> Option<&DatabaseStatistics> {
        self.databases.get(name)
    }
}

/// One immutable generation of cluster metadata
#[derive(Clone, Debug, Default)]
pub struct MetaDataContexts {
    generation: u64,
    meta_data: MetaData,
    statistics: Statistics,
}

impl MetaDataContexts {
    pub const fn new(generation: u64, meta_data: MetaData, statistics: Statistics) -> Self {
        Self {
            generation,
            meta_data,
            statistics,
        }
    }

    /// Monotonic number of this generation
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub const fn meta_data(&self) -> &MetaData {
        &self.meta_data
    }

    pub const fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn database(&self, name: &str) -> Result<&Database> {
        self.meta_data
            .get_database(name)
            .ok_or_else(|| Error::DatabaseNotFound(name.to_string()))
    }

    /// Schemas of a database, empty when the database is unknown
    pub fn schemas(&self, database_name: &str) -> BTreeMap<String, SchemaMeta> {
        self.meta_data
            .get_database(database_name)
            .map(|each| each.schemas().clone())
            .unwrap_or_default()
    }

    /// Next generation carrying `meta_data` and this generation's statistics
    #[must_use]
    pub fn successor(&self, meta_data: MetaData) -> Self {
        Self::new(self.generation + 1, meta_data, self.statistics.clone())
    }
}

/// Builds new generations
pub trait MetaDataContextsFactory: Send + Sync {
    /// Generation in which `database_name` uses the resources of `switching`
    fn create_by_switch_resource(
        &self,
        database_name: &str,
        is_new_database: bool,
        switching: &SwitchingResource,
        original: &MetaDataContexts,
    ) -> Result<MetaDataContexts>;
}

/// Rebuilds the switched database's resources and keeps everything else
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultMetaDataContextsFactory;

impl MetaDataContextsFactory for DefaultMetaDataContextsFactory {
    fn create_by_switch_resource(
        &self,
        database_name: &str,
        is_new_database: bool,
        switching: &SwitchingResource,
        original: &MetaDataContexts,
    ) -> Result<MetaDataContexts> {
        let database = match original.meta_data().get_database(database_name) {
            Some(database) => database.clone(),
            None if is_new_database => Database::empty(database_name),
            None => return Err(Error::DatabaseNotFound(database_name.to_string())),
        };
        let mut data_sources = database.resource().data_sources().clone();
        data_sources.retain(|node, _| !switching.stale_data_sources().contains_key(node));
        data_sources.extend(
            switching
                .new_data_sources()
                .iter()
                .map(|(node, pool)| (node.clone(), pool.clone())),
        );
        let storage_units = switching
            .merged_props()
            .iter()
            .map(|(name, props)| (name.clone(), StorageUnit::new(name.clone(), props.clone())))
            .collect();
        let database = database.with_resource(ResourceMetaData::new(data_sources, storage_units));
        Ok(original.successor(original.meta_data().with_database(database)))
    }
}
