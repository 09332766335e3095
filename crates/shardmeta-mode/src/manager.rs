//! Process-wide holder of the current generation
//!
//! The current [`MetaDataContexts`] lives in a `tokio::sync::watch` channel:
//! readers take a cheap `Arc` snapshot, writers replace it under the
//! channel's lock, and waiters can block until a generation they are
//! interested in shows up.

use crate::contexts::{Database, MetaDataContexts, MetaDataContextsFactory};
use crate::switch::ResourceSwitchManager;
use shardmeta_store::MetaDataPersistFacade;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Meta data context manager
pub struct MetaDataContextManager {
    contexts: watch::Sender<Arc<MetaDataContexts>>,
    persist_facade: MetaDataPersistFacade,
    resource_switch_manager: Arc<dyn ResourceSwitchManager>,
    contexts_factory: Arc<dyn MetaDataContextsFactory>,
}

impl MetaDataContextManager {
    pub fn new(
        initial: MetaDataContexts,
        persist_facade: MetaDataPersistFacade,
        resource_switch_manager: Arc<dyn ResourceSwitchManager>,
        contexts_factory: Arc<dyn MetaDataContextsFactory>,
    ) -> Self {
        let (contexts, _) = watch::channel(Arc::new(initial));
        Self {
            contexts,
            persist_facade,
            resource_switch_manager,
            contexts_factory,
        }
    }

    /// Consistent snapshot of the current generation
    pub fn meta_data_contexts(&self) -> Arc<MetaDataContexts> {
        self.contexts.borrow().clone()
    }

    /// Make `contexts` the current generation, returning the one it replaces
    pub fn install(&self, contexts: MetaDataContexts) -> Arc<MetaDataContexts> {
        let generation = contexts.generation();
        let superseded = self.contexts.send_replace(Arc::new(contexts));
        if generation <= superseded.generation() {
            warn!(
                "Installed generation {} does not advance past {}",
                generation,
                superseded.generation()
            );
        } else {
            debug!("Installed generation {}", generation);
        }
        superseded
    }

    /// Swap `database` into the current generation.
    ///
    /// The successor is derived from whatever generation is current when
    /// the swap happens, so databases changed concurrently by other writers
    /// are kept.
    pub fn install_database(&self, database: Database) -> Arc<MetaDataContexts> {
        let mut installed = Arc::default();
        self.contexts.send_modify(|current| {
            *current = Arc::new(current.successor(current.meta_data().with_database(database)));
            installed = Arc::clone(current);
        });
        debug!("Installed generation {}", installed.generation());
        installed
    }

    /// Wait until the current generation satisfies `predicate`, checking the
    /// current one first.
    ///
    /// Returns `None` if no such generation appears within `timeout`.
    pub async fn wait_until(
        &self,
        mut predicate: impl FnMut(&MetaDataContexts) -> bool + Send,
        timeout: Duration,
    ) -> Option<Arc<MetaDataContexts>> {
        let mut receiver = self.contexts.subscribe();
        match tokio::time::timeout(timeout, receiver.wait_for(|each| predicate(&**each))).await {
            Ok(Ok(contexts)) => Some(contexts.clone()),
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Wait until a generation newer than `generation` is installed
    pub async fn wait_for_generation_after(
        &self,
        generation: u64,
        timeout: Duration,
    ) -> Option<Arc<MetaDataContexts>> {
        self.wait_until(|each| each.generation() > generation, timeout)
            .await
    }

    pub const fn persist_facade(&self) -> &MetaDataPersistFacade {
        &self.persist_facade
    }

    pub fn resource_switch_manager(&self) -> &dyn ResourceSwitchManager {
        self.resource_switch_manager.as_ref()
    }

    pub fn contexts_factory(&self) -> &dyn MetaDataContextsFactory {
        self.contexts_factory.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contexts::DefaultMetaDataContextsFactory;
    use crate::pool::DataSourcePoolDestroyer;
    use crate::pool::mock::MockPoolCreator;
    use crate::switch::DefaultResourceSwitchManager;
    use shardmeta_store::MemoryRepository;

    fn manager() -> Arc<MetaDataContextManager> {
        Arc::new(MetaDataContextManager::new(
            MetaDataContexts::default(),
            MetaDataPersistFacade::new(Arc::new(MemoryRepository::new())),
            Arc::new(DefaultResourceSwitchManager::new(
                Arc::new(MockPoolCreator::default()),
                DataSourcePoolDestroyer::default(),
            )),
            Arc::new(DefaultMetaDataContextsFactory),
        ))
    }

    #[tokio::test]
    async fn test_install_swaps_snapshot() {
        let manager = manager();
        let before = manager.meta_data_contexts();
        let next = before.successor(before.meta_data().clone());

        let superseded = manager.install(next);
        assert!(Arc::ptr_eq(&superseded, &before));
        assert_eq!(manager.meta_data_contexts().generation(), 1);
        // Snapshots taken earlier keep seeing their own generation
        assert_eq!(before.generation(), 0);
    }

    #[tokio::test]
    async fn test_wait_resolves_on_install() {
        let manager = manager();
        let installer = manager.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let current = installer.meta_data_contexts();
            installer.install(current.successor(current.meta_data().clone()));
        });

        let reloaded = manager
            .wait_for_generation_after(0, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(reloaded.generation(), 1);
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_already_newer() {
        let manager = manager();
        let current = manager.meta_data_contexts();
        manager.install(current.successor(current.meta_data().clone()));

        let reloaded = manager
            .wait_for_generation_after(0, Duration::from_millis(1))
            .await;
        assert!(reloaded.is_some());
    }

    #[tokio::test]
    async fn test_install_database_keeps_concurrent_changes() {
        let manager = manager();
        let stale = manager.meta_data_contexts();
        manager.install_database(Database::empty("foo_db"));

        // Built from an older snapshot, yet foo_db survives
        let installed = manager.install_database(Database::empty("bar_db"));
        assert_eq!(stale.generation(), 0);
        assert_eq!(installed.generation(), 2);
        assert!(installed.meta_data().contains_database("foo_db"));
        assert!(installed.meta_data().contains_database("bar_db"));
        assert!(Arc::ptr_eq(&installed, &manager.meta_data_contexts()));
    }

    #[tokio::test]
    async fn test_wait_until_skips_unrelated_generations() {
        let manager = manager();
        let installer = manager.clone();
        tokio::spawn(async move {
            installer.install_database(Database::empty("bar_db"));
            tokio::time::sleep(Duration::from_millis(20)).await;
            installer.install_database(Database::empty("foo_db"));
        });

        let reloaded = manager
            .wait_until(|each| each.meta_data().contains_database("foo_db"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(reloaded.generation(), 2);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let manager = manager();
        assert!(
            manager
                .wait_for_generation_after(0, Duration::from_millis(20))
                .await
                .is_none()
        );
    }
}
