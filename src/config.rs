//! Component factory for environment-based configuration
//!
//! Selects the store backend from environment variables so embedding
//! binaries and tests can switch backends without code changes.

use crate::store::{KvStore, MemoryKvStore};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::info;

/// Supported store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            other => Err(Error::Config(format!(
                "unknown store backend '{}'; expected 'memory'",
                other
            ))),
        }
    }
}

pub struct ComponentFactory;

impl ComponentFactory {
    /// Create a store from the environment.
    ///
    /// `STORAGE_BACKEND` selects the backend; `memory` (the default) is the
    /// in-process store. Wide-column backends plug in here behind the same
    /// trait.
    pub fn create_store() -> Result<Arc<dyn KvStore>> {
        let backend: StoreBackend = std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .parse()?;

        match backend {
            StoreBackend::Memory => {
                info!("Using in-memory store (development mode)");
                Ok(Arc::new(MemoryKvStore::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backend_is_memory() {
        // STORAGE_BACKEND is unset in the test environment.
        assert!(ComponentFactory::create_store().is_ok());
    }

    #[test]
    fn backend_parsing() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!(
            " Memory ".parse::<StoreBackend>().unwrap(),
            StoreBackend::Memory
        );
        assert!("cassandra".parse::<StoreBackend>().is_err());
    }
}
