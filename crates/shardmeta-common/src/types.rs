//! Core type definitions for ShardMeta
//!
//! This module defines the metadata value types that flow between the
//! persistence layer and the in-memory generations: table/view/schema
//! definitions, storage-unit pool properties, rule configurations and
//! statistics.

use crate::error::{Error, Result};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---- Storage units ----

/// Identity of a physical data source behind one or more storage units
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From)]
#[display("{_0}")]
pub struct StorageNode(String);

impl StorageNode {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Connection pool properties of a storage unit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourcePoolProperties {
    /// JDBC-style connection URL of the backing data store
    pub url: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Pool tuning knobs (e.g. `maxPoolSize`, `idleTimeout`)
    #[serde(default)]
    pub pool: BTreeMap<String, String>,
}

impl DataSourcePoolProperties {
    pub fn new(url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            pool: BTreeMap::new(),
        }
    }

    /// Set a pool property, returning the updated properties
    #[must_use]
    pub fn with_pool_prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pool.insert(key.into(), value.into());
        self
    }
}

// ---- Schema objects ----

/// Column definition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

const fn default_nullable() -> bool {
    true
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            primary_key: false,
            nullable: true,
        }
    }

    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

/// Index definition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub name: String,
    pub columns: Vec<String>,
}

/// Table definition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnMeta>,
    #[serde(default)]
    pub indexes: Vec<IndexMeta>,
}

impl TableMeta {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnMeta>) -> Self {
        Self {
            name: name.into(),
            columns,
            indexes: Vec::new(),
        }
    }
}

/// View definition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewMeta {
    pub name: String,
    pub definition: String,
}

impl ViewMeta {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
        }
    }
}

/// Schema: a named set of tables and views
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMeta {
    pub name: String,
    pub tables: BTreeMap<String, TableMeta>,
    pub views: BTreeMap<String, ViewMeta>,
}

impl SchemaMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_tables(name: impl Into<String>, tables: impl IntoIterator<Item = TableMeta>) -> Self {
        let mut schema = Self::new(name);
        for table in tables {
            schema.put_table(table);
        }
        schema
    }

    pub fn put_table(&mut self, table: TableMeta) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn put_view(&mut self, view: ViewMeta) {
        self.views.insert(view.name.clone(), view);
    }

    /// A schema with neither tables nor views
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.views.is_empty()
    }

    #[must_use]
    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&TableMeta> {
        self.tables.get(name)
    }

    pub fn all_tables(&self) -> impl Iterator<Item = &TableMeta> {
        self.tables.values()
    }

    pub fn all_views(&self) -> impl Iterator<Item = &ViewMeta> {
        self.views.values()
    }
}

// ---- Rule configuration ----

/// Configuration of the built-in single-table rule
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleRuleConfiguration {
    /// Loaded single tables, as `storage_unit.table` or `storage_unit.*`
    pub tables: Vec<String>,
    /// Storage unit receiving newly created single tables
    pub default_data_source: Option<String>,
}

impl SingleRuleConfiguration {
    pub const RULE_NAME: &'static str = "single";
}

/// Configuration of any other rule, kept as opaque named items
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRuleConfiguration {
    pub name: String,
    pub items: BTreeMap<String, serde_json::Value>,
}

impl NamedRuleConfiguration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_item(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.items.insert(key.into(), value);
        self
    }
}

/// A database-level or global rule configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleConfiguration {
    Single(SingleRuleConfiguration),
    Named(NamedRuleConfiguration),
}

const SINGLE_TABLES_ITEM: &str = "tables";
const SINGLE_DEFAULT_DATA_SOURCE_ITEM: &str = "default_data_source";

impl RuleConfiguration {
    /// Rule kind tag, also the rule's node name in the repository
    #[must_use]
    pub fn rule_name(&self) -> &str {
        match self {
            Self::Single(_) => SingleRuleConfiguration::RULE_NAME,
            Self::Named(named) => &named.name,
        }
    }

    /// Split the configuration into independently versioned items
    pub fn to_items(&self) -> Result<Vec<(String, String)>> {
        match self {
            Self::Single(single) => {
                let mut items = vec![(
                    SINGLE_TABLES_ITEM.to_string(),
                    serde_json::to_string(&single.tables)?,
                )];
                if let Some(default_ds) = &single.default_data_source {
                    items.push((
                        SINGLE_DEFAULT_DATA_SOURCE_ITEM.to_string(),
                        serde_json::to_string(default_ds)?,
                    ));
                }
                Ok(items)
            }
            Self::Named(named) => named
                .items
                .iter()
                .map(|(key, value)| Ok((key.clone(), serde_json::to_string(value)?)))
                .collect(),
        }
    }

    /// Rebuild a configuration from the items stored under `rule_name`
    pub fn from_items(rule_name: &str, items: &BTreeMap<String, String>) -> Result<Self> {
        if rule_name == SingleRuleConfiguration::RULE_NAME {
            let tables = items
                .get(SINGLE_TABLES_ITEM)
                .map(|raw| serde_json::from_str(raw))
                .transpose()?
                .unwrap_or_default();
            let default_data_source = items
                .get(SINGLE_DEFAULT_DATA_SOURCE_ITEM)
                .map(|raw| serde_json::from_str(raw))
                .transpose()?;
            return Ok(Self::Single(SingleRuleConfiguration {
                tables,
                default_data_source,
            }));
        }
        let mut named = NamedRuleConfiguration::new(rule_name);
        for (key, raw) in items {
            let value = serde_json::from_str(raw).map_err(|e| {
                Error::Serialization(format!("rule {rule_name} item {key}: {e}"))
            })?;
            named.items.insert(key.clone(), value);
        }
        Ok(Self::Named(named))
    }
}

/// Process-wide properties
pub type Properties = BTreeMap<String, String>;

// ---- Statistics ----

/// Collected rows for one table
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableStatistics {
    pub name: String,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Statistics for all tables of one schema
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaStatistics {
    pub tables: BTreeMap<String, TableStatistics>,
}

impl SchemaStatistics {
    pub fn put_table(&mut self, table: TableStatistics) {
        self.tables.insert(table.name.clone(), table);
    }
}

/// Statistics for all schemas of one database
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStatistics {
    pub schemas: BTreeMap<String, SchemaStatistics>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_emptiness() {
        let mut schema = SchemaMeta::new("public");
        assert!(schema.is_empty());

        schema.put_view(ViewMeta::new("v_order", "SELECT * FROM t_order"));
        assert!(!schema.is_empty());
        assert!(!schema.contains_table("v_order"));
    }

    #[test]
    fn test_single_rule_items() {
        let config = RuleConfiguration::Single(SingleRuleConfiguration {
            tables: vec!["ds_0.t_order".into()],
            default_data_source: Some("ds_0".into()),
        });
        assert_eq!(config.rule_name(), "single");

        let items: BTreeMap<String, String> = config.to_items().unwrap().into_iter().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(RuleConfiguration::from_items("single", &items).unwrap(), config);
    }

    #[test]
    fn test_single_rule_without_default_data_source() {
        let config = RuleConfiguration::Single(SingleRuleConfiguration::default());
        let items = config.to_items().unwrap();
        assert_eq!(items, vec![("tables".to_string(), "[]".to_string())]);
    }

    #[test]
    fn test_named_rule_items() {
        let config = RuleConfiguration::Named(
            NamedRuleConfiguration::new("sharding")
                .with_item("tables.t_order", serde_json::json!({"actualDataNodes": "ds_${0..1}.t_order"})),
        );
        let items: BTreeMap<String, String> = config.to_items().unwrap().into_iter().collect();
        assert!(items.contains_key("tables.t_order"));
        assert_eq!(RuleConfiguration::from_items("sharding", &items).unwrap(), config);
    }

    #[test]
    fn test_named_rule_rejects_malformed_item() {
        let items = BTreeMap::from([("k".to_string(), "{broken".to_string())]);
        assert!(matches!(
            RuleConfiguration::from_items("encrypt", &items),
            Err(Error::Serialization(_))
        ));
    }
}
