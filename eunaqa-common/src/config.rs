//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "EUNAQA_ROOT_FOLDER";

/// File name of the SQLite database inside the root folder
pub const DATABASE_FILE: &str = "eunaqa.db";

/// Optional TOML configuration file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database
    pub root_folder: Option<String>,
    /// Bind address for the admin service (host:port)
    pub admin_bind: Option<String>,
    /// Base URL of the external LLM API used by the diagnostic process
    pub llm_base_url: Option<String>,
}

/// Resolve the root folder following priority order:
/// 1. Command-line argument (highest priority)
/// 2. `EUNAQA_ROOT_FOLDER` environment variable
/// 3. TOML config file (`root_folder` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config) = load_toml_config() {
        if let Some(root_folder) = config.root_folder {
            return PathBuf::from(root_folder);
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Load the TOML configuration file if one exists
///
/// Looks for `<config dir>/eunaqa/config.toml`, then `/etc/eunaqa/config.toml`
/// on Linux.
pub fn load_toml_config() -> Result<TomlConfig> {
    let path = config_file_path()?;
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

fn config_file_path() -> Result<PathBuf> {
    if let Some(path) = dirs::config_dir().map(|d| d.join("eunaqa").join("config.toml")) {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/eunaqa/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("eunaqa"))
        .unwrap_or_else(|| PathBuf::from("./eunaqa_data"))
}

/// Create the root folder if missing and return the database path inside it
pub fn ensure_root_folder(root: &PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(root)?;
    Ok(root.join(DATABASE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_argument_wins() {
        let root = resolve_root_folder(Some("/tmp/eunaqa-cli-test"));
        assert_eq!(root, PathBuf::from("/tmp/eunaqa-cli-test"));
    }

    #[test]
    fn ensure_root_folder_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("root");
        let db_path = ensure_root_folder(&root).unwrap();
        assert!(root.is_dir());
        assert!(db_path.ends_with(DATABASE_FILE));
    }
}
