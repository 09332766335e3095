//! ShardMeta Mode - cluster metadata orchestration
//!
//! This crate holds the in-memory metadata generations, the resource
//! switching that opens and retires storage unit pools, and the orchestrator
//! sequencing every administrative change against the shared store.

pub mod contexts;
pub mod coordinator;
pub mod manager;
pub mod persist_service;
pub mod pool;
pub mod resource;
pub mod switch;

// Re-exports
pub use contexts::{
    Database, DefaultMetaDataContextsFactory, MetaData, MetaDataContexts, MetaDataContextsFactory,
    RuleKind, RuleMetaData, Statistics,
};
pub use coordinator::{
    ClusterDatabaseListenerCoordinatorType, ClusterDatabaseListenerPersistCoordinator,
    DatabaseListenerNotifier,
};
pub use manager::MetaDataContextManager;
pub use persist_service::{ClusterMetaDataManagerPersistService, MetaDataManagerPersistService};
pub use pool::{DataSourcePool, DataSourcePoolCreator, DataSourcePoolDestroyer};
pub use resource::{ResourceMetaData, StorageUnit};
pub use switch::{DefaultResourceSwitchManager, ResourceSwitchManager, SwitchingResource};
