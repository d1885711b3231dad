//! Opaque key-value preference storage.

use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Persisted UI preferences (window size, column widths, last table).
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_state(&self, key: &str) -> GatewayResult<Option<Value>>;
    async fn set_state(&self, key: &str, value: Value) -> GatewayResult<()>;
}

/// Non-persistent store, used when no preference file is configured.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_state(&self, key: &str) -> GatewayResult<Option<Value>> {
        let values = self
            .values
            .lock()
            .map_err(|e| GatewayError::unexpected(format!("state lock poisoned: {}", e)))?;
        Ok(values.get(key).cloned())
    }

    async fn set_state(&self, key: &str, value: Value) -> GatewayResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| GatewayError::unexpected(format!("state lock poisoned: {}", e)))?;
        values.insert(key.to_owned(), value);
        Ok(())
    }
}
