// crates/chitfund-cli/src/config.rs
//
// Runtime configuration for the chitfund CLI.
// Loaded from a TOML file or populated with sensible defaults.

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use chitfund_core::amount::DEFAULT_DECIMALS;

/// Runtime configuration for the CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// Directory holding the ledger file.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Ledger file name, relative to `data_dir`.
    #[serde(default = "default_ledger_file")]
    pub ledger_file: String,

    /// Decimal places of the display unit (18 for ETH/wei).
    #[serde(default = "default_decimals")]
    pub decimals: u32,

    /// Account address to act as. Commands that need an identity fail
    /// without one.
    #[serde(default)]
    pub identity: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_dir() -> String {
    "~/.chitfund".to_string()
}

fn default_ledger_file() -> String {
    "ledger.json".to_string()
}

fn default_decimals() -> u32 {
    DEFAULT_DECIMALS
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            ledger_file: default_ledger_file(),
            decimals: default_decimals(),
            identity: None,
            log_level: default_log_level(),
        }
    }
}

impl CliConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(expand_tilde(path))?;
        let config: CliConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Full path of the ledger file, with `~` expanded.
    pub fn ledger_path(&self) -> PathBuf {
        PathBuf::from(expand_tilde(&self.data_dir)).join(&self.ledger_file)
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CliConfig::default();
        assert_eq!(config.decimals, 18);
        assert_eq!(config.ledger_file, "ledger.json");
        assert!(config.identity.is_none());
        assert!(config.ledger_path().ends_with("ledger.json"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: CliConfig = toml::from_str(
            r#"
            identity = "0xAbC"
            decimals = 6
            "#,
        )
        .unwrap();
        assert_eq!(config.identity.as_deref(), Some("0xAbC"));
        assert_eq!(config.decimals, 6);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.data_dir, "~/.chitfund");
    }

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/tmp/x"), "/tmp/x");
    }
}
