//! Registry of named backend handles.
//!
//! The registry owns the handles it stores: replacing or removing one
//! closes its pool. The executor only borrows handles and never closes them.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, PoolConfig};
use crate::db::{self, BackendHandle};
use crate::error::{EngineError, Result};

/// Named, shared backend handles.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    pool: PoolConfig,
    handles: RwLock<HashMap<String, BackendHandle>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry whose connectors use `pool` sizing.
    pub fn new(pool: PoolConfig) -> Self {
        Self {
            pool,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Connects, verifies the backend answers, then stores the handle.
    ///
    /// A handle already registered under `name` is closed after the new one
    /// is in place. On failure nothing is stored and the old handle stays.
    pub async fn provision(&self, name: &str, config: &ConnectionConfig) -> Result<BackendHandle> {
        info!("Provisioning connection '{}' ({})", name, config.display_string());
        let handle = db::connect(config, &self.pool).await?;

        match handle.test_connection().await {
            Ok(true) => {}
            Ok(false) => {
                close_quietly(name, &handle).await;
                return Err(EngineError::connectivity(format!(
                    "Connection '{}' answered the probe unexpectedly",
                    name
                )));
            }
            Err(e) => {
                close_quietly(name, &handle).await;
                return Err(e);
            }
        }

        self.register(name, handle.clone()).await;
        Ok(handle)
    }

    /// Stores an already-connected handle, closing any handle it replaces.
    pub async fn register(&self, name: &str, handle: BackendHandle) {
        let replaced = self
            .handles
            .write()
            .await
            .insert(name.to_string(), handle);

        if let Some(old) = replaced {
            debug!("Replacing connection '{}'", name);
            close_quietly(name, &old).await;
        }
    }

    /// Looks up a handle by name.
    pub async fn get(&self, name: &str) -> Option<BackendHandle> {
        self.handles.read().await.get(name).cloned()
    }

    /// Registered names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handles.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Removes and closes one handle. Returns false if the name is unknown.
    pub async fn close(&self, name: &str) -> Result<bool> {
        let removed = self.handles.write().await.remove(name);
        match removed {
            Some(handle) => {
                handle.close().await?;
                debug!("Closed connection '{}'", name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes and closes every handle.
    pub async fn close_all(&self) {
        let drained: Vec<(String, BackendHandle)> =
            self.handles.write().await.drain().collect();
        for (name, handle) in drained {
            close_quietly(&name, &handle).await;
        }
    }
}

async fn close_quietly(name: &str, handle: &BackendHandle) {
    if let Err(e) = handle.close().await {
        warn!("Failed to close connection '{}': {}", name, e);
    }
}
