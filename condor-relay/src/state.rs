//! Application state shared by the HTTP handlers

use crate::bridge::Bridge;
use crate::config::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub bridge: Bridge,

    /// Configuration as last edited; the bridge picks the network section up on start
    pub config: Arc<RwLock<AppConfig>>,

    /// Where edits are persisted (None keeps them in memory only)
    pub config_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(bridge: Bridge, config: AppConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            bridge,
            config: Arc::new(RwLock::new(config)),
            config_path,
        }
    }

    /// Write the current configuration back to disk if a path is set
    pub async fn persist(&self) {
        let Some(path) = &self.config_path else {
            return;
        };
        let config = self.config.read().await;
        match config.save(path) {
            Ok(()) => debug!("Configuration saved to {}", path.display()),
            Err(e) => warn!("Failed to save configuration: {}", e),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        let config = AppConfig::default();
        Self::new(Bridge::new(config.conversions), config, None)
    }
}
