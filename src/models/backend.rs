use async_trait::async_trait;

use super::{Config, ConfigError};

mod file;
pub use file::FileBackend;

/// Storage for the user configuration
#[async_trait]
pub trait ConfigBackend {
    async fn load(&mut self) -> Result<Config, ConfigError>;

    /// Persist an accepted configuration
    async fn save(&mut self, config: &Config) -> Result<(), ConfigError>;
}
