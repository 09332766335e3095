//! Database and global rule configurations
//!
//! A database rule is split into items (see
//! [`RuleConfiguration::to_items`]), each versioned on its own so that a
//! change to one sharding table does not rewrite the whole rule. Global
//! rules are stored whole and committed on write.

use crate::node_path;
use crate::repository::PersistRepository;
use crate::version::{MetaDataVersion, MetaDataVersionPersistService};
use shardmeta_common::{Result, RuleConfiguration};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Database rule persist service
#[derive(Clone)]
pub struct DatabaseRulePersistService {
    repository: Arc<dyn PersistRepository>,
    versions: MetaDataVersionPersistService,
}

impl DatabaseRulePersistService {
    pub fn new(repository: Arc<dyn PersistRepository>, versions: MetaDataVersionPersistService) -> Self {
        Self {
            repository,
            versions,
        }
    }

    /// Write a new revision of every item, returning pending descriptors
    pub fn persist<'a>(
        &self,
        database_name: &str,
        configs: impl IntoIterator<Item = &'a RuleConfiguration>,
    ) -> Result<Vec<MetaDataVersion>> {
        let mut result = Vec::new();
        for config in configs {
            for (item, value) in config.to_items()? {
                let path = node_path::database_rule_item(database_name, config.rule_name(), &item);
                result.push(self.versions.persist_next_version(&path, &value)?);
            }
        }
        Ok(result)
    }

    /// Remove a whole rule
    pub fn delete(&self, database_name: &str, rule_name: &str) -> Result<()> {
        self.repository
            .delete(&node_path::database_rule(database_name, rule_name))
    }

    /// Remove only the items named by each configuration
    pub fn delete_items<'a>(
        &self,
        database_name: &str,
        configs: impl IntoIterator<Item = &'a RuleConfiguration>,
    ) -> Result<()> {
        for config in configs {
            for (item, _) in config.to_items()? {
                self.repository.delete(&node_path::database_rule_item(
                    database_name,
                    config.rule_name(),
                    &item,
                ))?;
            }
        }
        Ok(())
    }

    pub fn load(&self, database_name: &str) -> Result<Vec<RuleConfiguration>> {
        let mut result = Vec::new();
        for rule_name in self
            .repository
            .get_children_keys(&node_path::database_rules(database_name))?
        {
            let rule_path = node_path::database_rule(database_name, &rule_name);
            let mut items = BTreeMap::new();
            for item in self.repository.get_children_keys(&rule_path)? {
                let item_path = node_path::database_rule_item(database_name, &rule_name, &item);
                if let Some(value) = self.versions.load_active_value(&item_path)? {
                    items.insert(item, value);
                }
            }
            result.push(RuleConfiguration::from_items(&rule_name, &items)?);
        }
        Ok(result)
    }
}

/// Global rule persist service
#[derive(Clone)]
pub struct GlobalRulePersistService {
    repository: Arc<dyn PersistRepository>,
    versions: MetaDataVersionPersistService,
}

impl GlobalRulePersistService {
    pub fn new(repository: Arc<dyn PersistRepository>, versions: MetaDataVersionPersistService) -> Self {
        Self {
            repository,
            versions,
        }
    }

    pub fn persist<'a>(&self, configs: impl IntoIterator<Item = &'a RuleConfiguration>) -> Result<()> {
        for config in configs {
            self.versions.persist_and_activate(
                &node_path::global_rule(config.rule_name()),
                &serde_json::to_string(config)?,
            )?;
        }
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<RuleConfiguration>> {
        let mut result = Vec::new();
        for name in self
            .repository
            .get_children_keys(node_path::GLOBAL_RULES_ROOT)?
        {
            if let Some(raw) = self
                .versions
                .load_active_value(&node_path::global_rule(&name))?
            {
                result.push(serde_json::from_str(&raw)?);
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use shardmeta_common::{NamedRuleConfiguration, SingleRuleConfiguration};

    fn repo() -> (Arc<dyn PersistRepository>, MetaDataVersionPersistService) {
        let repo: Arc<dyn PersistRepository> = Arc::new(MemoryRepository::new());
        let versions = MetaDataVersionPersistService::new(repo.clone());
        (repo, versions)
    }

    fn sharding(actual_data_nodes: &str) -> RuleConfiguration {
        RuleConfiguration::Named(
            NamedRuleConfiguration::new("sharding")
                .with_item("tables.t_order", serde_json::json!({"actualDataNodes": actual_data_nodes}))
                .with_item("tables.t_item", serde_json::json!({"actualDataNodes": "ds_0.t_item"})),
        )
    }

    #[test]
    fn test_persist_returns_descriptor_per_item() {
        let (repo, versions) = repo();
        let service = DatabaseRulePersistService::new(repo, versions.clone());
        service.persist("foo_db", [&sharding("ds_0.t_order")]).unwrap();

        let pending = service.persist("foo_db", [&sharding("ds_${0..1}.t_order")]).unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|each| each.current_active_version() == 0 && each.next_active_version() == 1));

        versions.switch_active_version(&pending).unwrap();
        assert_eq!(service.load("foo_db").unwrap(), vec![sharding("ds_${0..1}.t_order")]);
    }

    #[test]
    fn test_delete_items_keeps_other_items() {
        let (repo, versions) = repo();
        let service = DatabaseRulePersistService::new(repo, versions);
        service.persist("foo_db", [&sharding("ds_0.t_order")]).unwrap();

        let t_item_only = RuleConfiguration::Named(
            NamedRuleConfiguration::new("sharding").with_item("tables.t_item", serde_json::Value::Null),
        );
        service.delete_items("foo_db", [&t_item_only]).unwrap();

        let RuleConfiguration::Named(loaded) = &service.load("foo_db").unwrap()[0] else {
            panic!("expected named rule");
        };
        assert_eq!(loaded.items.keys().collect::<Vec<_>>(), vec!["tables.t_order"]);
    }

    #[test]
    fn test_delete_rule() {
        let (repo, versions) = repo();
        let service = DatabaseRulePersistService::new(repo, versions);
        let single = RuleConfiguration::Single(SingleRuleConfiguration::default());
        service.persist("foo_db", [&single, &sharding("ds_0.t_order")]).unwrap();

        service.delete("foo_db", "sharding").unwrap();
        assert_eq!(service.load("foo_db").unwrap(), vec![single]);
    }

    #[test]
    fn test_global_rule_is_committed_on_write() {
        let (repo, versions) = repo();
        let service = GlobalRulePersistService::new(repo, versions.clone());
        let v1 = RuleConfiguration::Named(
            NamedRuleConfiguration::new("transaction").with_item("defaultType", serde_json::json!("LOCAL")),
        );
        let v2 = RuleConfiguration::Named(
            NamedRuleConfiguration::new("transaction").with_item("defaultType", serde_json::json!("XA")),
        );
        service.persist([&v1]).unwrap();
        service.persist([&v2]).unwrap();

        assert_eq!(service.load().unwrap(), vec![v2]);
        assert_eq!(versions.get_versions("/rules/transaction").unwrap(), vec![1]);
    }
}
