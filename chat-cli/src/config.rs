//! Configuration resolution for parley.
//!
//! Precedence: `--config <file>`, then `<data_dir>/config.toml` if present,
//! then defaults. `--server` overrides the base URL from any of them.

use anyhow::{Context, Result};
use parley_chat_client::ClientConfig;
use std::path::{Path, PathBuf};
use url::Url;

/// Name of the optional config file inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Everything a command needs to build a client.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the session file and the optional config file.
    pub data_dir: PathBuf,
    /// Client configuration.
    pub client: ClientConfig,
}

impl Settings {
    /// Resolve settings from command-line flags.
    pub fn resolve(
        data_dir: Option<PathBuf>,
        config: Option<&Path>,
        server: Option<Url>,
    ) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => default_data_dir()?,
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let mut client = match config {
            Some(path) => ClientConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => {
                let path = data_dir.join(CONFIG_FILE);
                if path.exists() {
                    ClientConfig::from_file(&path)
                        .with_context(|| format!("Failed to load config {}", path.display()))?
                } else {
                    ClientConfig::default()
                }
            }
        };

        if let Some(server) = server {
            client.server.base_url = server;
        }
        client
            .ws_endpoint()
            .context("Server URL cannot be used for the push channel")?;

        Ok(Self { data_dir, client })
    }
}

/// Get the default data directory for parley.
pub fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "parley", "parley")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
