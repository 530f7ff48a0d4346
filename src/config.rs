// ⚙️ Configuration
// Defaults with FORMGRID_* environment overrides

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub const ENV_DB: &str = "FORMGRID_DB";
pub const ENV_EXPORT_DIR: &str = "FORMGRID_EXPORT_DIR";
pub const ENV_ADDR: &str = "FORMGRID_ADDR";
pub const ENV_LOG: &str = "FORMGRID_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite file holding persisted store state
    pub db_path: PathBuf,
    /// Directory CSV exports are written to
    pub export_dir: PathBuf,
    pub server_addr: String,
    /// tracing filter directive, e.g. "info" or "formgrid=debug"
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            db_path: PathBuf::from("formgrid.db"),
            export_dir: PathBuf::from("exports"),
            server_addr: "0.0.0.0:3000".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns; blank values are ignored
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = AppConfig::default();

        if let Some(db) = get(ENV_DB) {
            config.db_path = PathBuf::from(db);
        }
        if let Some(dir) = get(ENV_EXPORT_DIR) {
            config.export_dir = PathBuf::from(dir);
        }
        if let Some(addr) = get(ENV_ADDR) {
            config.server_addr = addr;
        }
        if let Some(filter) = get(ENV_LOG) {
            config.log_filter = filter;
        }
        config
    }
}

/// Install the global subscriber once; events go to stderr so stdout stays clean
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
