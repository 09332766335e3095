//! Process-wide properties

use crate::node_path;
use crate::version::MetaDataVersionPersistService;
use shardmeta_common::{Properties, Result};

/// Properties persist service
#[derive(Clone)]
pub struct PropertiesPersistService {
    versions: MetaDataVersionPersistService,
}

impl PropertiesPersistService {
    pub const fn new(versions: MetaDataVersionPersistService) -> Self {
        Self { versions }
    }

    /// Replace the properties; committed on write
    pub fn persist(&self, props: &Properties) -> Result<()> {
        self.versions
            .persist_and_activate(node_path::PROPS, &serde_json::to_string(props)?)?;
        Ok(())
    }

    pub fn load(&self) -> Result<Properties> {
        match self.versions.load_active_value(node_path::PROPS)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Properties::new()),
        }
    }
}
