use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

const CONFIG_PATH_REL_HOME: &str = ".config/commbot/config.toml";

/// Bot configuration
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub general: General,
    #[serde(default)]
    pub store: Store,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct General {
    pub discord_token: String,
    pub bot_owners: Vec<String>,
    pub command_prefix: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Store {
    /// Relative paths are resolved against the working directory.
    pub path: PathBuf,
    /// Number of previous store files to keep alongside the current one.
    pub backups: usize,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/database.json"),
            backups: 0,
        }
    }
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            anyhow!(
                "Could not open configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        Self::parse(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })
    }

    fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Re-read the configuration file.  The store section only takes effect on restart.
    pub async fn reload(&mut self) -> Result<()> {
        let new = Self::load().await?;
        *self = new;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERAL: &str = r#"
        [general]
        discord_token = "token"
        bot_owners = ["alice"]
        command_prefix = ";"
    "#;

    #[test]
    fn store_section_is_optional() {
        let cfg = Config::parse(GENERAL).unwrap();
        assert_eq!(cfg.general.command_prefix, ";");
        assert_eq!(cfg.store.path, PathBuf::from("data/database.json"));
        assert_eq!(cfg.store.backups, 0);
    }

    #[test]
    fn store_section_overrides_defaults() {
        let contents = format!("{}\n[store]\nbackups = 3\n", GENERAL);
        let cfg = Config::parse(&contents).unwrap();
        assert_eq!(cfg.store.backups, 3);
        assert_eq!(cfg.store.path, PathBuf::from("data/database.json"));
    }

    #[test]
    fn missing_general_is_an_error() {
        assert!(Config::parse("[store]\nbackups = 1\n").is_err());
    }
}
