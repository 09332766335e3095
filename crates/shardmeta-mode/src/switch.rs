//! Resource diffs for storage unit changes
//!
//! A [`SwitchingResource`] lists the pools opened for a change and the
//! pools it makes stale. New pools belong to the caller until a generation
//! holding them is installed; stale pools stay live until then.

use crate::pool::{DataSourcePool, DataSourcePoolCreator, DataSourcePoolDestroyer};
use crate::resource::ResourceMetaData;
use async_trait::async_trait;
use shardmeta_common::{DataSourcePoolProperties, Error, Result, StorageNode};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Computed resource diff of one storage unit change
#[derive(Debug, Default)]
pub struct SwitchingResource {
    new_data_sources: BTreeMap<StorageNode, Arc<dyn DataSourcePool>>,
    stale_data_sources: BTreeMap<StorageNode, Arc<dyn DataSourcePool>>,
    stale_storage_unit_names: BTreeSet<String>,
    merged_props: BTreeMap<String, DataSourcePoolProperties>,
}

impl SwitchingResource {
    pub const fn new(
        new_data_sources: BTreeMap<StorageNode, Arc<dyn DataSourcePool>>,
        stale_data_sources: BTreeMap<StorageNode, Arc<dyn DataSourcePool>>,
        stale_storage_unit_names: BTreeSet<String>,
        merged_props: BTreeMap<String, DataSourcePoolProperties>,
    ) -> Self {
        Self {
            new_data_sources,
            stale_data_sources,
            stale_storage_unit_names,
            merged_props,
        }
    }

    /// Pools opened for this change
    pub const fn new_data_sources(&self) -> &BTreeMap<StorageNode, Arc<dyn DataSourcePool>> {
        &self.new_data_sources
    }

    /// Live pools replaced or removed by this change
    pub const fn stale_data_sources(&self) -> &BTreeMap<StorageNode, Arc<dyn DataSourcePool>> {
        &self.stale_data_sources
    }

    pub const fn stale_storage_unit_names(&self) -> &BTreeSet<String> {
        &self.stale_storage_unit_names
    }

    /// Pool properties of every storage unit once the change applies
    pub const fn merged_props(&self) -> &BTreeMap<String, DataSourcePoolProperties> {
        &self.merged_props
    }
}

/// Computes resource diffs for storage unit changes
#[async_trait]
pub trait ResourceSwitchManager: Send + Sync {
    /// Open pools for new units; fails without opening anything if a unit
    /// is already present in `resource`
    async fn switch_by_register_storage_unit(
        &self,
        resource: &ResourceMetaData,
        to_be_registered: &BTreeMap<String, DataSourcePoolProperties>,
    ) -> Result<SwitchingResource>;

    /// Open replacement pools; the current pools of those units become stale
    async fn switch_by_alter_storage_unit(
        &self,
        resource: &ResourceMetaData,
        to_be_altered: &BTreeMap<String, DataSourcePoolProperties>,
    ) -> Result<SwitchingResource>;

    /// Mark the pools of the named units stale; unknown names are ignored
    async fn create_by_unregister_storage_unit(
        &self,
        resource: &ResourceMetaData,
        to_be_removed: &[String],
    ) -> Result<SwitchingResource>;
}

/// Resource switch manager opening pools through a [`DataSourcePoolCreator`]
pub struct DefaultResourceSwitchManager {
    creator: Arc<dyn DataSourcePoolCreator>,
    destroyer: DataSourcePoolDestroyer,
}

impl DefaultResourceSwitchManager {
    pub fn new(creator: Arc<dyn DataSourcePoolCreator>, destroyer: DataSourcePoolDestroyer) -> Self {
        Self { creator, destroyer }
    }

    /// Open a pool per entry; on failure the pools opened so far are
    /// destroyed before the error is returned
    async fn open_all(
        &self,
        props: &BTreeMap<String, DataSourcePoolProperties>,
    ) -> Result<BTreeMap<StorageNode, Arc<dyn DataSourcePool>>> {
        let mut opened = BTreeMap::new();
        for (name, each) in props {
            match self.creator.create(name, each).await {
                Ok(pool) => {
                    debug!("Opened data source for storage unit {}", name);
                    opened.insert(StorageNode::new(name.clone()), pool);
                }
                Err(e) => {
                    warn!("Failed to open storage unit {}: {}", name, e);
                    self.destroyer.destroy_all(opened.into_values());
                    return Err(e);
                }
            }
        }
        Ok(opened)
    }
}

#[async_trait]
impl ResourceSwitchManager for DefaultResourceSwitchManager {
    async fn switch_by_register_storage_unit(
        &self,
        resource: &ResourceMetaData,
        to_be_registered: &BTreeMap<String, DataSourcePoolProperties>,
    ) -> Result<SwitchingResource> {
        let duplicated: Vec<String> = to_be_registered
            .keys()
            .filter(|name| resource.contains_storage_unit(name))
            .cloned()
            .collect();
        if !duplicated.is_empty() {
            return Err(Error::DuplicateStorageUnit(duplicated));
        }
        let new_data_sources = self.open_all(to_be_registered).await?;
        let mut merged_props = resource.props();
        merged_props.extend(to_be_registered.iter().map(|(name, each)| (name.clone(), each.clone())));
        Ok(SwitchingResource::new(
            new_data_sources,
            BTreeMap::new(),
            BTreeSet::new(),
            merged_props,
        ))
    }

    async fn switch_by_alter_storage_unit(
        &self,
        resource: &ResourceMetaData,
        to_be_altered: &BTreeMap<String, DataSourcePoolProperties>,
    ) -> Result<SwitchingResource> {
        let new_data_sources = self.open_all(to_be_altered).await?;
        let stale_data_sources = to_be_altered
            .keys()
            .filter_map(|name| {
                let unit = resource.get_storage_unit(name)?;
                let pool = resource.data_sources().get(unit.storage_node())?;
                Some((unit.storage_node().clone(), pool.clone()))
            })
            .collect();
        let mut merged_props = resource.props();
        merged_props.extend(to_be_altered.iter().map(|(name, each)| (name.clone(), each.clone())));
        Ok(SwitchingResource::new(
            new_data_sources,
            stale_data_sources,
            BTreeSet::new(),
            merged_props,
        ))
    }

    async fn create_by_unregister_storage_unit(
        &self,
        resource: &ResourceMetaData,
        to_be_removed: &[String],
    ) -> Result<SwitchingResource> {
        let mut stale_data_sources = BTreeMap::new();
        let mut stale_storage_unit_names = BTreeSet::new();
        for name in to_be_removed {
            let Some(unit) = resource.get_storage_unit(name) else {
                continue;
            };
            if let Some(pool) = resource.data_sources().get(unit.storage_node()) {
                stale_data_sources.insert(unit.storage_node().clone(), pool.clone());
            }
            stale_storage_unit_names.insert(name.clone());
        }
        let mut merged_props = resource.props();
        merged_props.retain(|name, _| !stale_storage_unit_names.contains(name));
        Ok(SwitchingResource::new(
            BTreeMap::new(),
            stale_data_sources,
            stale_storage_unit_names,
            merged_props,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::mock::MockPoolCreator;
    use crate::resource::StorageUnit;
    use std::time::Duration;

    fn props(name: &str) -> DataSourcePoolProperties {
        DataSourcePoolProperties::new(format!("jdbc:mysql://127.0.0.1:3306/{name}"), "root", "")
    }

    fn manager(creator: Arc<MockPoolCreator>) -> DefaultResourceSwitchManager {
        DefaultResourceSwitchManager::new(
            creator,
            DataSourcePoolDestroyer::new(Duration::from_millis(1), Duration::from_secs(1)),
        )
    }

    async fn resource_with(creator: &MockPoolCreator, names: &[&str]) -> ResourceMetaData {
        let mut data_sources = BTreeMap::new();
        let mut storage_units = BTreeMap::new();
        for name in names {
            let unit = StorageUnit::new(*name, props(name));
            data_sources.insert(
                unit.storage_node().clone(),
                creator.create(name, unit.props()).await.unwrap(),
            );
            storage_units.insert((*name).to_string(), unit);
        }
        ResourceMetaData::new(data_sources, storage_units)
    }

    #[tokio::test]
    async fn test_register_new_units() {
        let creator = Arc::new(MockPoolCreator::default());
        let resource = resource_with(&creator, &["ds_0"]).await;
        let switching = manager(creator.clone())
            .switch_by_register_storage_unit(&resource, &BTreeMap::from([("ds_1".to_string(), props("ds_1"))]))
            .await
            .unwrap();

        assert_eq!(
            switching.new_data_sources().keys().collect::<Vec<_>>(),
            vec![&StorageNode::new("ds_1")]
        );
        assert!(switching.stale_data_sources().is_empty());
        assert_eq!(switching.merged_props().keys().collect::<Vec<_>>(), vec!["ds_0", "ds_1"]);
        assert_eq!(creator.open_count(), 2);
    }

    #[tokio::test]
    async fn test_register_rejects_existing_units() {
        let creator = Arc::new(MockPoolCreator::default());
        let resource = resource_with(&creator, &["ds_0"]).await;
        let err = manager(creator.clone())
            .switch_by_register_storage_unit(
                &resource,
                &BTreeMap::from([("ds_0".to_string(), props("other")), ("ds_1".to_string(), props("ds_1"))]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateStorageUnit(names) if names == vec!["ds_0".to_string()]));
        // Nothing is opened for the other units either
        assert_eq!(creator.opened().len(), 1);
    }

    #[tokio::test]
    async fn test_alter_marks_current_pool_stale() {
        let creator = Arc::new(MockPoolCreator::default());
        let resource = resource_with(&creator, &["ds_0"]).await;
        let altered = props("ds_0").with_pool_prop("maxPoolSize", "100");
        let switching = manager(creator.clone())
            .switch_by_alter_storage_unit(&resource, &BTreeMap::from([("ds_0".to_string(), altered.clone())]))
            .await
            .unwrap();

        let node = StorageNode::new("ds_0");
        assert!(Arc::ptr_eq(
            &switching.stale_data_sources()[&node],
            resource.get_data_source("ds_0").unwrap()
        ));
        assert!(!Arc::ptr_eq(
            &switching.new_data_sources()[&node],
            &switching.stale_data_sources()[&node]
        ));
        assert_eq!(switching.merged_props()["ds_0"], altered);
    }

    #[tokio::test]
    async fn test_open_failure_destroys_opened_pools() {
        let creator = Arc::new(MockPoolCreator::default());
        creator.fail_on(props("ds_2").url);
        let result = manager(creator.clone())
            .switch_by_register_storage_unit(
                &ResourceMetaData::default(),
                &BTreeMap::from([("ds_1".to_string(), props("ds_1")), ("ds_2".to_string(), props("ds_2"))]),
            )
            .await;

        assert!(result.is_err());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(creator.opened().len(), 1);
        assert_eq!(creator.open_count(), 0);
    }

    #[tokio::test]
    async fn test_unregister_ignores_unknown_names() {
        let creator = Arc::new(MockPoolCreator::default());
        let resource = resource_with(&creator, &["ds_0", "ds_1"]).await;
        let switching = manager(creator)
            .create_by_unregister_storage_unit(&resource, &["ds_1".to_string(), "ds_9".to_string()])
            .await
            .unwrap();

        assert_eq!(
            switching.stale_storage_unit_names().iter().collect::<Vec<_>>(),
            vec!["ds_1"]
        );
        assert_eq!(switching.stale_data_sources().len(), 1);
        assert!(switching.new_data_sources().is_empty());
        assert_eq!(switching.merged_props().keys().collect::<Vec<_>>(), vec!["ds_0"]);
    }
}
