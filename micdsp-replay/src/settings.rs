//! Session configuration file (JSON, camelCase keys).

use std::fs;
use std::path::Path;

use micdsp_core::SessionConfig;
use tracing::warn;

/// Read a config file, falling back to defaults for a missing or unreadable
/// file and for any key the file leaves out.
pub fn load_config(path: &Path) -> SessionConfig {
    let parsed = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|raw| serde_json::from_str::<SessionConfig>(&raw).map_err(|e| e.to_string()));

    let mut config = match parsed {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), "using default config: {e}");
            SessionConfig::default()
        }
    };
    config.normalize();
    config
}

pub fn save_config(path: &Path, config: &SessionConfig) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
