use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use healthdump_core::service::DEFAULT_GOAL_WINDOW_DAYS;

pub const DB_ENV_VAR: &str = "HEALTHDUMP_DB";
pub const DEFAULT_LOG_FILTER: &str = "healthdump=info,healthdump_core=info,tower_http=info";
const DB_FILE_NAME: &str = "health_dumps.db";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5009,
        }
    }
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
struct FileConfig {
    db_path: Option<PathBuf>,
    goal_window_days: Option<i64>,
    log_filter: Option<String>,
    server: ServerConfig,
}

pub struct Config {
    pub db_path: PathBuf,
    pub goal_window_days: i64,
    pub log_filter: Option<String>,
    pub server: ServerConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("", "", "healthdump")
            .context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let file = read_file_config(&proj_dirs.config_dir().join("config.toml"))?;
        let env_db = std::env::var_os(DB_ENV_VAR).map(PathBuf::from);
        Ok(Self::resolve(file, env_db, &data_dir))
    }

    /// Precedence for the database path: environment, then config file, then
    /// the data directory.
    fn resolve(file: FileConfig, env_db: Option<PathBuf>, data_dir: &Path) -> Self {
        let db_path = env_db
            .or(file.db_path)
            .unwrap_or_else(|| data_dir.join(DB_FILE_NAME));
        Config {
            db_path,
            goal_window_days: file.goal_window_days.unwrap_or(DEFAULT_GOAL_WINDOW_DAYS),
            log_filter: file.log_filter,
            server: file.server,
        }
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_file_config(&text).with_context(|| format!("Invalid config file: {}", path.display()))
}

fn parse_file_config(text: &str) -> Result<FileConfig> {
    let file: FileConfig = toml::from_str(text)?;
    if let Some(days) = file.goal_window_days {
        anyhow::ensure!(days > 0, "goal_window_days must be positive, got {days}");
    }
    Ok(file)
}
