//! Data source pools
//!
//! A storage unit is backed by a connection pool opened through a
//! [`DataSourcePoolCreator`]. Retired pools are handed to a
//! [`DataSourcePoolDestroyer`], which waits in the background for in-flight
//! connections to be returned before closing the pool.

use async_trait::async_trait;
use shardmeta_common::config::PoolConfig;
use shardmeta_common::{DataSourcePoolProperties, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A live connection pool behind a storage unit
#[async_trait]
pub trait DataSourcePool: Send + Sync + fmt::Debug {
    /// Connection URL the pool was opened against
    fn url(&self) -> &str;

    /// Connections currently lent out
    fn active_connections(&self) -> usize;

    fn is_closed(&self) -> bool;

    /// Close the pool; connections still in use are cut off
    async fn close(&self) -> Result<()>;
}

/// Opens pools for storage units
#[async_trait]
pub trait DataSourcePoolCreator: Send + Sync {
    async fn create(
        &self,
        storage_unit_name: &str,
        props: &DataSourcePoolProperties,
    ) -> Result<Arc<dyn DataSourcePool>>;
}

/// Closes retired pools off the caller's path
#[derive(Clone, Debug)]
pub struct DataSourcePoolDestroyer {
    poll_interval: Duration,
    drain_timeout: Duration,
}

impl DataSourcePoolDestroyer {
    pub const fn new(poll_interval: Duration, drain_timeout: Duration) -> Self {
        Self {
            poll_interval,
            drain_timeout,
        }
    }

    pub const fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.drain_poll_interval(), config.drain_timeout())
    }

    /// Close `pool` once its active connections drain, or when the drain
    /// timeout expires, on a background task
    pub fn async_destroy(&self, pool: Arc<dyn DataSourcePool>) -> JoinHandle<()> {
        let poll_interval = self.poll_interval;
        let deadline = Instant::now() + self.drain_timeout;
        tokio::spawn(async move {
            while pool.active_connections() > 0 {
                if Instant::now() >= deadline {
                    warn!(
                        "Closing data source {} with {} active connections after drain timeout",
                        pool.url(),
                        pool.active_connections()
                    );
                    break;
                }
                tokio::time::sleep(poll_interval).await;
            }
            match pool.close().await {
                Ok(()) => debug!("Closed data source {}", pool.url()),
                Err(e) => warn!("Failed to close data source {}: {}", pool.url(), e),
            }
        })
    }

    pub fn destroy_all(
        &self,
        pools: impl IntoIterator<Item = Arc<dyn DataSourcePool>>,
    ) -> Vec<JoinHandle<()>> {
        pools
            .into_iter()
            .map(|pool| self.async_destroy(pool))
            .collect()
    }
}

impl Default for DataSourcePoolDestroyer {
    fn default() -> Self {
        Self::from_config(&PoolConfig::default())
    }
}
