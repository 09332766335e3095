//! Repository node layout
//!
//! ```text
//! /metadata/{db}/schemas/{schema}/tables/{table}
//! /metadata/{db}/schemas/{schema}/views/{view}
//! /metadata/{db}/data_sources/units/{unit}
//! /metadata/{db}/rules/{rule}/{item}
//! /rules/{rule}
//! /props
//! /statistics/databases/{db}/schemas/{schema}/tables/{table}
//! /states/listener_coordinator/{db}
//! ```
//!
//! Versioned items carry `active_version` and `versions/{n}` children.

pub const METADATA_ROOT: &str = "/metadata";
pub const GLOBAL_RULES_ROOT: &str = "/rules";
pub const PROPS: &str = "/props";
pub const STATISTICS_ROOT: &str = "/statistics/databases";
pub const LISTENER_COORDINATOR_ROOT: &str = "/states/listener_coordinator";

pub const ACTIVE_VERSION: &str = "active_version";
pub const VERSIONS: &str = "versions";

// ---- Versioned item children ----

#[must_use]
pub fn active_version(path: &str) -> String {
    format!("{path}/{ACTIVE_VERSION}")
}

#[must_use]
pub fn versions(path: &str) -> String {
    format!("{path}/{VERSIONS}")
}

#[must_use]
pub fn version(path: &str, version: u32) -> String {
    format!("{path}/{VERSIONS}/{version}")
}

// ---- Databases, schemas, tables, views ----

#[must_use]
pub fn database(db: &str) -> String {
    format!("{METADATA_ROOT}/{db}")
}

#[must_use]
pub fn schemas(db: &str) -> String {
    format!("{METADATA_ROOT}/{db}/schemas")
}

#[must_use]
pub fn schema(db: &str, schema: &str) -> String {
    format!("{METADATA_ROOT}/{db}/schemas/{schema}")
}

#[must_use]
pub fn tables(db: &str, schema: &str) -> String {
    format!("{METADATA_ROOT}/{db}/schemas/{schema}/tables")
}

#[must_use]
pub fn table(db: &str, schema: &str, table: &str) -> String {
    format!("{METADATA_ROOT}/{db}/schemas/{schema}/tables/{table}")
}

#[must_use]
pub fn views(db: &str, schema: &str) -> String {
    format!("{METADATA_ROOT}/{db}/schemas/{schema}/views")
}

#[must_use]
pub fn view(db: &str, schema: &str, view: &str) -> String {
    format!("{METADATA_ROOT}/{db}/schemas/{schema}/views/{view}")
}

// ---- Storage units ----

#[must_use]
pub fn data_source_units(db: &str) -> String {
    format!("{METADATA_ROOT}/{db}/data_sources/units")
}

#[must_use]
pub fn data_source_unit(db: &str, unit: &str) -> String {
    format!("{METADATA_ROOT}/{db}/data_sources/units/{unit}")
}

// ---- Rules ----

#[must_use]
pub fn database_rules(db: &str) -> String {
    format!("{METADATA_ROOT}/{db}/rules")
}

#[must_use]
pub fn database_rule(db: &str, rule: &str) -> String {
    format!("{METADATA_ROOT}/{db}/rules/{rule}")
}

#[must_use]
pub fn database_rule_item(db: &str, rule: &str, item: &str) -> String {
    format!("{METADATA_ROOT}/{db}/rules/{rule}/{item}")
}

#[must_use]
pub fn global_rule(rule: &str) -> String {
    format!("{GLOBAL_RULES_ROOT}/{rule}")
}

// ---- Statistics ----

#[must_use]
pub fn statistics_schema(db: &str, schema: &str) -> String {
    format!("{STATISTICS_ROOT}/{db}/schemas/{schema}")
}

#[must_use]
pub fn statistics_table(db: &str, schema: &str, table: &str) -> String {
    format!("{STATISTICS_ROOT}/{db}/schemas/{schema}/tables/{table}")
}

// ---- Cluster states ----

#[must_use]
pub fn listener_coordinator(db: &str) -> String {
    format!("{LISTENER_COORDINATOR_ROOT}/{db}")
}
