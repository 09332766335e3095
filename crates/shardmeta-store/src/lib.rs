//! ShardMeta Store - versioned hierarchical configuration store
//!
//! This crate implements the path-addressed repository the cluster shares,
//! the active-version switch protocol layered on top of it, and the persist
//! services that map metadata objects onto repository nodes.

pub mod node_path;
pub mod persist;
pub mod repository;
pub mod store;
pub mod tables;
pub mod version;

// Re-exports
pub use persist::MetaDataPersistFacade;
pub use repository::{MemoryRepository, PersistRepository};
pub use store::RedbRepository;
pub use version::{MetaDataVersion, MetaDataVersionPersistService};
