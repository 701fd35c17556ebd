#![deny(missing_docs)]

//! # Contract Store
//!
//! Holds the active [`OperationSet`] for hosts that reload documents while
//! serving. A reload builds a complete new set and swaps the pointer; readers
//! keep whatever snapshot they already hold.

use crate::config::EngineConfig;
use crate::error::SpecResult;
use crate::oas::operations::OperationSet;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// The currently active operation set.
#[derive(Debug)]
pub struct ContractStore {
    active: RwLock<Arc<OperationSet>>,
    config: EngineConfig,
}

impl ContractStore {
    /// Loads the first document.
    pub fn new(document: &Value, config: EngineConfig) -> SpecResult<Self> {
        let set = OperationSet::load(document, config.clone())?;
        Ok(Self {
            active: RwLock::new(Arc::new(set)),
            config,
        })
    }

    /// The active set. Cheap; holds no lock after returning.
    pub fn snapshot(&self) -> Arc<OperationSet> {
        self.active.read().clone()
    }

    /// Replaces the active set. On error the previous set stays active.
    pub fn reload(&self, document: &Value) -> SpecResult<Arc<OperationSet>> {
        let set = match OperationSet::load(document, self.config.clone()) {
            Ok(set) => Arc::new(set),
            Err(error) => {
                warn!(%error, "reload rejected, keeping previous contract");
                return Err(error);
            }
        };
        *self.active.write() = Arc::clone(&set);
        info!(operations = set.len(), "contract reloaded");
        Ok(set)
    }
}
