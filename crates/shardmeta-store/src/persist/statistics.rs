//! Collected statistics

use crate::node_path;
use crate::repository::PersistRepository;
use shardmeta_common::{Result, SchemaMeta, SchemaStatistics, TableStatistics};
use std::sync::Arc;
use tracing::debug;

/// Statistics persist service
#[derive(Clone)]
pub struct StatisticsPersistService {
    repository: Arc<dyn PersistRepository>,
}

impl StatisticsPersistService {
    pub fn new(repository: Arc<dyn PersistRepository>) -> Self {
        Self { repository }
    }

    /// Persist the statistics of one schema.
    ///
    /// `schema` is the definition the rows were collected against; tables
    /// it does not know are skipped.
    pub fn persist(
        &self,
        database_name: &str,
        schema_name: &str,
        schema: Option<&SchemaMeta>,
        statistics: &SchemaStatistics,
    ) -> Result<()> {
        if statistics.tables.is_empty() {
            return self
                .repository
                .persist(&node_path::statistics_schema(database_name, schema_name), "");
        }
        for (table_name, table) in &statistics.tables {
            if !schema.is_some_and(|each| each.contains_table(table_name)) {
                debug!(
                    "Skipping statistics of unknown table {}.{}.{}",
                    database_name, schema_name, table_name
                );
                continue;
            }
            self.repository.persist(
                &node_path::statistics_table(database_name, schema_name, table_name),
                &serde_json::to_string(&table.rows)?,
            )?;
        }
        Ok(())
    }

    pub fn load_table(
        &self,
        database_name: &str,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Option<TableStatistics>> {
        let path = node_path::statistics_table(database_name, schema_name, table_name);
        match self.repository.query(&path)? {
            Some(raw) => Ok(Some(TableStatistics {
                name: table_name.to_string(),
                rows: serde_json::from_str(&raw)?,
            })),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use shardmeta_common::TableMeta;

    #[test]
    fn test_persist_known_tables_only() {
        let repo = Arc::new(MemoryRepository::new());
        let service = StatisticsPersistService::new(repo.clone());
        let schema = SchemaMeta::with_tables("public", [TableMeta::new("t_order", vec![])]);
        let mut statistics = SchemaStatistics::default();
        statistics.put_table(TableStatistics {
            name: "t_order".into(),
            rows: vec![vec![serde_json::json!(1), serde_json::json!("paid")]],
        });
        statistics.put_table(TableStatistics {
            name: "t_ghost".into(),
            rows: vec![],
        });

        service.persist("foo_db", "public", Some(&schema), &statistics).unwrap();

        assert_eq!(
            service.load_table("foo_db", "public", "t_order").unwrap().unwrap().rows.len(),
            1
        );
        assert!(service.load_table("foo_db", "public", "t_ghost").unwrap().is_none());
    }

    #[test]
    fn test_empty_statistics_persist_schema_node() {
        let repo = Arc::new(MemoryRepository::new());
        let service = StatisticsPersistService::new(repo.clone());
        service
            .persist("foo_db", "public", None, &SchemaStatistics::default())
            .unwrap();
        assert!(
            repo.query("/statistics/databases/foo_db/schemas/public")
                .unwrap()
                .is_some()
        );
    }
}
