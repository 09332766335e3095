//! Storage units and the live pools behind them

use crate::pool::DataSourcePool;
use shardmeta_common::{DataSourcePoolProperties, StorageNode};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A named storage unit and the data source it routes to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageUnit {
    name: String,
    storage_node: StorageNode,
    props: DataSourcePoolProperties,
}

impl StorageUnit {
    pub fn new(name: impl Into<String>, props: DataSourcePoolProperties) -> Self {
        let name = name.into();
        Self {
            storage_node: StorageNode::new(name.clone()),
            name,
            props,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn storage_node(&self) -> &StorageNode {
        &self.storage_node
    }

    pub const fn props(&self) -> &DataSourcePoolProperties {
        &self.props
    }
}

/// Storage units of one database together with their open pools
#[derive(Clone, Debug, Default)]
pub struct ResourceMetaData {
    data_sources: BTreeMap<StorageNode, Arc<dyn DataSourcePool>>,
    storage_units: BTreeMap<String, StorageUnit>,
}

impl ResourceMetaData {
    pub const fn new(
        data_sources: BTreeMap<StorageNode, Arc<dyn DataSourcePool>>,
        storage_units: BTreeMap<String, StorageUnit>,
    ) -> Self {
        Self {
            data_sources,
            storage_units,
        }
    }

    pub const fn data_sources(&self) -> &BTreeMap<StorageNode, Arc<dyn DataSourcePool>> {
        &self.data_sources
    }

    pub const fn storage_units(&self) -> &BTreeMap<String, StorageUnit> {
        &self.storage_units
    }

    pub fn get_storage_unit(&self, name: &str) -> Option<&StorageUnit> {
        self.storage_units.get(name)
    }

    pub fn contains_storage_unit(&self, name: &str) -> bool {
        self.storage_units.contains_key(name)
    }

    /// Pool of the storage unit called `name`
    pub fn get_data_source(&self, name: &str) -> Option<&Arc<dyn DataSourcePool>> {
        self.storage_units
            .get(name)
            .and_then(|unit| self.data_sources.get(unit.storage_node()))
    }

    /// Pool properties keyed by storage unit name
    pub fn props(&self) -> BTreeMap<String, DataSourcePoolProperties> {
        self.storage_units
            .iter()
            .map(|(name, unit)| (name.clone(), unit.props().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::mock::MockPool;

    #[test]
    fn test_data_source_lookup_by_unit_name() {
        let props = DataSourcePoolProperties::new("jdbc:mysql://127.0.0.1:3306/ds_0", "root", "");
        let unit = StorageUnit::new("ds_0", props.clone());
        let pool: Arc<dyn DataSourcePool> = Arc::new(MockPool::new(props.url.clone()));
        let resource = ResourceMetaData::new(
            BTreeMap::from([(unit.storage_node().clone(), pool)]),
            BTreeMap::from([("ds_0".to_string(), unit)]),
        );

        assert!(resource.contains_storage_unit("ds_0"));
        assert_eq!(resource.get_data_source("ds_0").unwrap().url(), props.url);
        assert!(resource.get_data_source("ds_1").is_none());
        assert_eq!(resource.props()["ds_0"], props);
    }
}
