//! Redb table definitions for persistent metadata storage.

use redb::TableDefinition;

// Key: absolute node path (e.g. "/metadata/foo_db/data_sources/units/ds_0/active_version"),
// Value: node content, empty for pure directory nodes
pub const NODES: TableDefinition<&str, &str> = TableDefinition::new("nodes");
