use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite://little-lemon.db";
const DEFAULT_TOKEN_TTL_HOURS: u64 = 24;
const MAX_TOKEN_TTL_HOURS: u64 = 24 * 365;

#[derive(Debug, Parser)]
#[command(
    name = "little-lemon",
    version,
    about = "Restaurant ordering API: menu, carts, orders and staff roles"
)]
pub struct Cli {
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    #[arg(long, short = 'u', visible_alias = "auth-file", value_name = "FILE")]
    pub users_file: Option<PathBuf>,

    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub database_url: String,
    pub users_file: PathBuf,
    pub prune_users: bool,
    pub token_ttl_hours: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid boolean value for env var {key}: {value}")]
    InvalidEnvBool { key: String, value: String },
    #[error("no users file configured; pass --users-file or set users_file in the config file")]
    MissingUsersFile,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    #[serde(alias = "auth_file")]
    users_file: Option<PathBuf>,
    prune_users: Option<bool>,
    token_ttl_hours: Option<u64>,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let from_file = read_file_config(cli.config.as_deref())?;
        let env_database_url = read_env_string("LITTLE_LEMON_DATABASE_URL");
        let env_prune_users = read_env_bool("LITTLE_LEMON_PRUNE_USERS")?;

        let bind = cli
            .bind
            .or(from_file.bind)
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)));
        let database_url = cli
            .database_url
            .or(env_database_url)
            .or(from_file.database_url)
            .unwrap_or_else(|| String::from(DEFAULT_DATABASE_URL));
        let users_file = cli
            .users_file
            .or(from_file.users_file)
            .ok_or(ConfigError::MissingUsersFile)?;
        let prune_users = env_prune_users.or(from_file.prune_users).unwrap_or(false);
        let token_ttl_hours = from_file
            .token_ttl_hours
            .unwrap_or(DEFAULT_TOKEN_TTL_HOURS)
            .clamp(1, MAX_TOKEN_TTL_HOURS);

        Ok(Self {
            bind,
            database_url,
            users_file,
            prune_users,
            token_ttl_hours,
        })
    }
}

fn read_file_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn read_env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => parse_bool_value(key, &value).map(Some),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnvBool {
            key: String::from(key),
            value: String::from("<non-unicode>"),
        }),
    }
}

fn parse_bool_value(key: &str, raw: &str) -> Result<bool, ConfigError> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvBool {
            key: String::from(key),
            value: String::from(raw),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::{
        parse_bool_value, read_file_config, AppConfig, Cli, ConfigError, MAX_TOKEN_TTL_HOURS,
    };

    fn bare_cli() -> Cli {
        Cli {
            bind: None,
            database_url: None,
            users_file: None,
            config: None,
        }
    }

    #[test]
    fn parse_bool_value_accepts_common_true_values() {
        assert_eq!(parse_bool_value("K", "true").ok(), Some(true));
        assert_eq!(parse_bool_value("K", "1").ok(), Some(true));
        assert_eq!(parse_bool_value("K", "YES").ok(), Some(true));
        assert_eq!(parse_bool_value("K", " on ").ok(), Some(true));
    }

    #[test]
    fn parse_bool_value_accepts_common_false_values() {
        assert_eq!(parse_bool_value("K", "false").ok(), Some(false));
        assert_eq!(parse_bool_value("K", "0").ok(), Some(false));
        assert_eq!(parse_bool_value("K", "NO").ok(), Some(false));
        assert_eq!(parse_bool_value("K", " off ").ok(), Some(false));
    }

    #[test]
    fn parse_bool_value_rejects_invalid_values() {
        assert!(parse_bool_value("K", "maybe").is_err());
    }

    #[test]
    fn missing_users_file_is_a_config_error() {
        let result = AppConfig::from_cli(bare_cli());
        assert!(matches!(result, Err(ConfigError::MissingUsersFile)));
    }

    #[test]
    fn cli_values_win_over_file_values() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("little-lemon.toml");
        std::fs::write(
            &path,
            "bind = \"127.0.0.1:9000\"\nusers_file = \"from-file.toml\"\ntoken_ttl_hours = 2\n",
        )?;

        let mut cli = bare_cli();
        cli.config = Some(path);
        cli.users_file = Some("from-cli.toml".into());
        let config = AppConfig::from_cli(cli)?;

        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.users_file, std::path::PathBuf::from("from-cli.toml"));
        assert_eq!(config.token_ttl_hours, 2);
        Ok(())
    }

    #[test]
    fn file_config_accepts_auth_file_alias() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("little-lemon.toml");
        std::fs::write(&path, "auth_file = \"users.toml\"\nprune_users = true\n")?;

        let parsed = read_file_config(Some(&path))?;
        assert_eq!(parsed.users_file, Some("users.toml".into()));
        assert_eq!(parsed.prune_users, Some(true));
        Ok(())
    }

    #[test]
    fn token_ttl_is_clamped_to_a_year() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("little-lemon.toml");
        std::fs::write(
            &path,
            "users_file = \"users.toml\"\ntoken_ttl_hours = 9223372036854775807\n",
        )?;

        let mut cli = bare_cli();
        cli.config = Some(path);
        let config = AppConfig::from_cli(cli)?;
        assert_eq!(config.token_ttl_hours, MAX_TOKEN_TTL_HOURS);
        Ok(())
    }
}
