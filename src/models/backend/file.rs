use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;

use super::ConfigBackend;
use crate::models::{Config, ConfigError};

/// TOML file configuration storage
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_owned(),
        }
    }

    /// Location of the configuration file in the user configuration directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("gammy");
            path.push("gammy.toml");
            path
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigBackend for FileBackend {
    async fn load(&mut self) -> Result<Config, ConfigError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(full) => Config::from_toml(&full),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no configuration file, using defaults");
                Ok(Config::default())
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn save(&mut self, config: &Config) -> Result<(), ConfigError> {
        let full = config.to_toml()?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Readers never see a partial file
        let tmp_path = self.path.with_extension("toml.tmp");
        tokio::fs::write(&tmp_path, full.as_bytes()).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        info!(path = %self.path.display(), "saved configuration");
        Ok(())
    }
}
