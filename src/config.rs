use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::error::{AppError, Result};

pub const APP_NAME: &str = "polytracker";
pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";
pub const CLOB_API_URL: &str = "https://clob.polymarket.com";
pub const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Environment variables are `POLYTRACKER_` + the key with `.` replaced by `_`.
pub const ENV_PREFIX: &str = "POLYTRACKER";

pub const DEFAULT_THEME: &str = "dracula";
pub const DEFAULT_EXPORT_DIR: &str = "exports";

/// Every key the loader recognises. Used to map environment overrides,
/// since the key names themselves contain underscores.
const KNOWN_KEYS: &[&str] = &[
    "polymarket.api_key",
    "polymarket.api_secret",
    "polymarket.passphrase",
    "polymarket.gamma_url",
    "polymarket.clob_url",
    "polymarket.timeout_secs",
    "polymarket.rate_limit",
    "polymarket.burst",
    "claude.api_key",
    "claude.endpoint",
    "database.path",
    "ui.theme",
    "export.dir",
    "scan.market_limit",
    "log.level",
];

pub const DEFAULT_CONFIG_YAML: &str = r#"# polytracker configuration
# Every key can be overridden by an environment variable, e.g.
#   claude.api_key  ->  POLYTRACKER_CLAUDE_API_KEY

polymarket:
  api_key: ""
  api_secret: ""
  passphrase: ""
  gamma_url: "https://gamma-api.polymarket.com"
  clob_url: "https://clob.polymarket.com"
  timeout_secs: 10
  rate_limit: 5
  burst: 10

claude:
  api_key: ""
  endpoint: "https://api.anthropic.com/v1/messages"

database:
  path: "polytracker.db"

ui:
  # dracula, nord, gruvbox, catppuccin, tokyo
  theme: "dracula"

export:
  dir: "exports"

scan:
  market_limit: 10

log:
  level: "info"
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub polymarket: PolymarketConfig,
    pub claude: ClaudeConfig,
    pub database: DatabaseConfig,
    pub ui: UiConfig,
    pub export: ExportConfig,
    pub scan: ScanConfig,
    pub log: LogConfig,
    /// File the values were read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolymarketConfig {
    /// Credentials are carried for completeness; public endpoints need none.
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
    pub gamma_url: String,
    pub clob_url: String,
    /// Per-request timeout (POLYTRACKER_POLYMARKET_TIMEOUT_SECS)
    pub timeout_secs: u64,
    /// Sustained requests per second (POLYTRACKER_POLYMARKET_RATE_LIMIT)
    pub rate_limit: f64,
    /// Bucket capacity (POLYTRACKER_POLYMARKET_BURST)
    pub burst: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeConfig {
    /// POLYTRACKER_CLAUDE_API_KEY
    pub api_key: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    pub theme: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    pub market_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

impl AppConfig {
    /// Load from defaults, the config file and `POLYTRACKER_*` variables.
    ///
    /// An explicit `path` must exist. Without one, the first existing of
    /// `$HOME/.polytracker/config.yaml` and `./config.yaml` is used, and
    /// having neither is fine.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    pub fn load_with_env<F>(path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(AppError::Config(format!(
                        "config file not found: {}",
                        p.display()
                    )));
                }
                Some(p.to_path_buf())
            }
            None => search_paths().into_iter().find(|p| p.exists()),
        };

        let mut builder = Config::builder()
            .set_default("polymarket.api_key", "")?
            .set_default("polymarket.api_secret", "")?
            .set_default("polymarket.passphrase", "")?
            .set_default("polymarket.gamma_url", GAMMA_API_URL)?
            .set_default("polymarket.clob_url", CLOB_API_URL)?
            .set_default("polymarket.timeout_secs", 10)?
            .set_default("polymarket.rate_limit", 5.0)?
            .set_default("polymarket.burst", 10)?
            .set_default("claude.api_key", "")?
            .set_default("claude.endpoint", CLAUDE_API_URL)?
            .set_default("database.path", format!("{APP_NAME}.db"))?
            .set_default("ui.theme", DEFAULT_THEME)?
            .set_default("export.dir", DEFAULT_EXPORT_DIR)?
            .set_default("scan.market_limit", crate::scanner::DEFAULT_MARKET_LIMIT as u64)?
            .set_default("log.level", "info")?;

        if let Some(ref f) = file {
            builder = builder.add_source(File::from(f.as_path()).format(FileFormat::Yaml).required(true));
        }

        for key in KNOWN_KEYS {
            if let Some(value) = env(&env_var_name(key)) {
                builder = builder.set_override(*key, value)?;
            }
        }

        let mut cfg: AppConfig = builder.build()?.try_deserialize()?;
        cfg.source = file;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.polymarket.rate_limit <= 0.0 {
            return Err(AppError::Config("polymarket.rate_limit must be positive".to_string()));
        }
        if self.polymarket.burst == 0 {
            return Err(AppError::Config("polymarket.burst must be at least 1".to_string()));
        }
        if self.database.path.trim().is_empty() {
            return Err(AppError::Config("database.path must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn has_claude_key(&self) -> bool {
        !self.claude.api_key.trim().is_empty()
    }
}

/// `claude.api_key` -> `POLYTRACKER_CLAUDE_API_KEY`
pub fn env_var_name(key: &str) -> String {
    format!("{ENV_PREFIX}_{}", key.replace('.', "_").to_ascii_uppercase())
}

pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(format!(".{APP_NAME}")))
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = default_config_dir() {
        paths.push(dir.join("config.yaml"));
    }
    paths.push(PathBuf::from("config.yaml"));
    paths
}

/// Write the default YAML template. Refuses to clobber an existing file unless `force`.
pub fn create_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(AppError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, DEFAULT_CONFIG_YAML)?;
    Ok(())
}

/// Show the first and last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    match chars.len() {
        0 => "(not set)".to_string(),
        n if n <= 8 => "********".to_string(),
        n => {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[n - 4..].iter().collect();
            format!("{head}...{tail}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_fill_an_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.yaml");
        std::fs::write(&path, "{}\n").unwrap();

        let cfg = AppConfig::load_with_env(Some(&path), no_env).unwrap();
        assert_eq!(cfg.database.path, "polytracker.db");
        assert_eq!(cfg.ui.theme, "dracula");
        assert_eq!(cfg.claude.endpoint, CLAUDE_API_URL);
        assert_eq!(cfg.polymarket.timeout_secs, 10);
        assert_eq!(cfg.polymarket.burst, 10);
        assert_eq!(cfg.scan.market_limit, 10);
        assert_eq!(cfg.export.dir, "exports");
        assert!(!cfg.has_claude_key());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load_with_env(Some(&dir.path().join("nope.yaml")), no_env).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn file_then_env_layering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "database:\n  path: from-file.db\nui:\n  theme: nord\nclaude:\n  api_key: file-key\n",
        )
        .unwrap();

        let env: HashMap<String, String> = [
            ("POLYTRACKER_CLAUDE_API_KEY".to_string(), "env-key".to_string()),
            ("POLYTRACKER_POLYMARKET_RATE_LIMIT".to_string(), "2".to_string()),
        ]
        .into_iter()
        .collect();

        let cfg = AppConfig::load_with_env(Some(&path), |k| env.get(k).cloned()).unwrap();
        assert_eq!(cfg.database.path, "from-file.db");
        assert_eq!(cfg.ui.theme, "nord");
        assert_eq!(cfg.claude.api_key, "env-key");
        assert_eq!(cfg.polymarket.rate_limit, 2.0);
        assert_eq!(cfg.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn rejects_zero_burst() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "polymarket:\n  burst: 0\n").unwrap();
        assert!(AppConfig::load_with_env(Some(&path), no_env).is_err());
    }

    #[test]
    fn env_names_replace_dots() {
        assert_eq!(env_var_name("claude.api_key"), "POLYTRACKER_CLAUDE_API_KEY");
        assert_eq!(env_var_name("database.path"), "POLYTRACKER_DATABASE_PATH");
    }

    #[test]
    fn default_template_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        create_default_config(&path, false).unwrap();
        assert!(create_default_config(&path, false).is_err());
        create_default_config(&path, true).unwrap();

        let cfg = AppConfig::load_with_env(Some(&path), no_env).unwrap();
        assert_eq!(cfg.polymarket.gamma_url, GAMMA_API_URL);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn masks_secrets() {
        assert_eq!(mask_secret(""), "(not set)");
        assert_eq!(mask_secret("short"), "********");
        assert_eq!(mask_secret("sk-ant-1234567890"), "sk-a...7890");
    }
}
