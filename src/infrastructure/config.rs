use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub master: DbConfig,
    pub destinations: Vec<DbConfig>,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

fn default_port() -> u16 {
    3306
}

/// Engine tuning. Every field has a sensible default so the section can be
/// omitted entirely.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncSettings {
    /// Rows per transfer batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    /// InnoDB key-length ceiling in bytes. 3072 for DYNAMIC row format,
    /// 767 for very old servers.
    #[serde(default = "default_max_index_key_bytes")]
    pub max_index_key_bytes: u32,
    /// Immediate retries per failed batch before giving up on a table.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
    /// Delete destination rows before copying each table (data-only mode).
    #[serde(default)]
    pub truncate_before_copy: bool,
}

fn default_batch_size() -> u64 {
    1000
}

fn default_max_index_key_bytes() -> u32 {
    3072
}

fn default_retry_budget() -> u32 {
    3
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_index_key_bytes: default_max_index_key_bytes(),
            retry_budget: default_retry_budget(),
            truncate_before_copy: false,
        }
    }
}

impl DbConfig {
    /// Build a sqlx-compatible connection URL from this config.
    pub fn url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.dbname
        )
    }
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let cfg: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config TOML")?;
        if cfg.destinations.is_empty() {
            anyhow::bail!("At least one [[destinations]] entry is required");
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[master]
host = "db1.internal"
dbname = "app"
user = "sync"
password = "secret"

[[destinations]]
host = "db2.internal"
port = 3307
dbname = "app_replica"
user = "sync"
password = "secret"
"#;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(MINIMAL.as_bytes()).unwrap();
        let cfg = AppConfig::load(f.path().to_str().unwrap()).unwrap();

        assert_eq!(cfg.master.port, 3306, "default port");
        assert_eq!(cfg.destinations.len(), 1);
        assert_eq!(cfg.sync.batch_size, 1000);
        assert_eq!(cfg.sync.max_index_key_bytes, 3072);
        assert_eq!(cfg.sync.retry_budget, 3);
        assert!(!cfg.sync.truncate_before_copy);
    }

    #[test]
    fn sync_section_overrides_defaults() {
        let toml = format!(
            "{MINIMAL}\n[sync]\nbatch_size = 50\nmax_index_key_bytes = 767\n"
        );
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(toml.as_bytes()).unwrap();
        let cfg = AppConfig::load(f.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.sync.batch_size, 50);
        assert_eq!(cfg.sync.max_index_key_bytes, 767);
    }

    #[test]
    fn empty_destinations_rejected() {
        let toml = r#"
[master]
host = "h"
dbname = "d"
user = "u"
password = "p"
destinations = []
"#;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(toml.as_bytes()).unwrap();
        assert!(AppConfig::load(f.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn url_formats_mysql_dsn() {
        let cfg = DbConfig {
            host: "localhost".into(),
            port: 3306,
            dbname: "app".into(),
            user: "root".into(),
            password: "pw".into(),
        };
        assert_eq!(cfg.url(), "mysql://root:pw@localhost:3306/app");
    }
}
