//! # Configuration Module
//!
//! Runtime configuration read once at startup from the process environment
//! (after an optional `.env` file). [`BotConfig::from_lookup`] takes the lookup
//! function as a parameter so parsing can be tested without touching the real
//! environment.

use std::env;
use std::path::PathBuf;
use thiserror::Error;

use crate::ledger::sheets::DEFAULT_API_BASE;
use crate::ledger::sheets_auth::METADATA_TOKEN_URL;

// Constants for configuration defaults
pub const DEFAULT_LANGUAGE: &str = "ar";
pub const DEFAULT_RECENT_LIMIT: usize = 5;
pub const MAX_RECENT_LIMIT: usize = 50;
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const PID_FILE_NAME: &str = "purchases_bot.pid";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("no ledger configured: set SHEETS_SPREADSHEET_ID, DATABASE_URL or LEDGER_BACKEND=memory")]
    NoLedger,
}

/// Google Sheets ledger settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    /// Worksheet title, `None` for the first sheet
    pub worksheet: Option<String>,
    pub api_base: String,
    /// Fixed OAuth token, takes precedence over the other sources
    pub access_token: Option<String>,
    /// Service-account JSON key file
    pub credentials_file: Option<PathBuf>,
    /// Metadata server token endpoint, used when neither of the above is set
    pub token_url: String,
}

/// Where records are stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerConfig {
    Sheets(SheetsConfig),
    Postgres { database_url: String },
    /// In-process storage, lost on restart
    Memory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Directory for per-run log files, `None` disables file logging
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: Some(PathBuf::from(DEFAULT_LOG_DIR)),
            format: LogFormat::Text,
        }
    }
}

/// Behaviour of the bot itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotSettings {
    /// Reply language when the user's language is unsupported
    pub language: String,
    /// Number of rows `/recent` shows without an argument
    pub recent_default_limit: usize,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            recent_default_limit: DEFAULT_RECENT_LIMIT,
        }
    }
}

/// Complete process configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub telegram_token: String,
    pub ledger: LedgerConfig,
    pub settings: BotSettings,
    pub log: LogConfig,
    pub pid_file: PathBuf,
}

impl BotConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let telegram_token = get("TELEGRAM_BOT_TOKEN")
            .or_else(|| get("TELEGRAM_TOKEN"))
            .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let ledger = Self::ledger_from(&get)?;

        let language = get("BOT_LANGUAGE")
            .map(|l| l.to_lowercase())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let recent_default_limit = match get("RECENT_DEFAULT_LIMIT") {
            Some(value) => match value.parse::<usize>() {
                Ok(0) | Err(_) => {
                    return Err(ConfigError::Invalid {
                        name: "RECENT_DEFAULT_LIMIT",
                        value,
                        reason: "expected a positive integer".to_string(),
                    })
                }
                Ok(limit) => limit.min(MAX_RECENT_LIMIT),
            },
            None => DEFAULT_RECENT_LIMIT,
        };

        // An explicitly empty LOG_DIR disables file logging.
        let dir = match lookup("LOG_DIR") {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(PathBuf::from(value.trim())),
            None => Some(PathBuf::from(DEFAULT_LOG_DIR)),
        };

        let format = match get("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    value: other.to_string(),
                    reason: "expected text or json".to_string(),
                })
            }
        };

        let pid_file = get("PID_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join(PID_FILE_NAME));

        Ok(Self {
            telegram_token,
            ledger,
            settings: BotSettings {
                language,
                recent_default_limit,
            },
            log: LogConfig { dir, format },
            pid_file,
        })
    }

    fn ledger_from<G>(get: &G) -> Result<LedgerConfig, ConfigError>
    where
        G: Fn(&str) -> Option<String>,
    {
        let backend = match get("LEDGER_BACKEND") {
            Some(backend) => backend.to_lowercase(),
            None if get("SHEETS_SPREADSHEET_ID").is_some() => "sheets".to_string(),
            None if get("DATABASE_URL").is_some() => "postgres".to_string(),
            None => return Err(ConfigError::NoLedger),
        };

        match backend.as_str() {
            "sheets" => Ok(LedgerConfig::Sheets(SheetsConfig {
                spreadsheet_id: get("SHEETS_SPREADSHEET_ID")
                    .ok_or(ConfigError::Missing("SHEETS_SPREADSHEET_ID"))?,
                worksheet: get("SHEETS_WORKSHEET"),
                api_base: get("SHEETS_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                access_token: get("SHEETS_ACCESS_TOKEN"),
                credentials_file: get("SHEETS_CREDENTIALS_FILE")
                    .or_else(|| get("GOOGLE_APPLICATION_CREDENTIALS"))
                    .map(PathBuf::from),
                token_url: get("SHEETS_TOKEN_URL")
                    .unwrap_or_else(|| METADATA_TOKEN_URL.to_string()),
            })),
            "postgres" | "postgresql" => Ok(LedgerConfig::Postgres {
                database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            }),
            "memory" => Ok(LedgerConfig::Memory),
            _ => Err(ConfigError::Invalid {
                name: "LEDGER_BACKEND",
                value: backend,
                reason: "expected sheets, postgres or memory".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_minimal_sheets_config() {
        let config = config(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("SHEETS_SPREADSHEET_ID", "sheet"),
        ])
        .unwrap();

        assert_eq!(config.telegram_token, "123:abc");
        assert_eq!(
            config.ledger,
            LedgerConfig::Sheets(SheetsConfig {
                spreadsheet_id: "sheet".to_string(),
                worksheet: None,
                api_base: DEFAULT_API_BASE.to_string(),
                access_token: None,
                credentials_file: None,
                token_url: METADATA_TOKEN_URL.to_string(),
            })
        );
        assert_eq!(config.settings, BotSettings::default());
        assert_eq!(config.log, LogConfig::default());
        assert!(config.pid_file.ends_with(PID_FILE_NAME));
    }

    #[test]
    fn test_service_account_credentials() {
        let credentials = |vars: &[(&str, &str)]| match config(vars).unwrap().ledger {
            LedgerConfig::Sheets(sheets) => sheets.credentials_file,
            other => panic!("unexpected ledger {other:?}"),
        };
        let base = [("TELEGRAM_BOT_TOKEN", "t"), ("SHEETS_SPREADSHEET_ID", "sheet")];

        assert_eq!(
            credentials(&[base[0], base[1], ("GOOGLE_APPLICATION_CREDENTIALS", "/etc/key.json")]),
            Some(PathBuf::from("/etc/key.json"))
        );
        assert_eq!(
            credentials(&[
                base[0],
                base[1],
                ("GOOGLE_APPLICATION_CREDENTIALS", "/etc/key.json"),
                ("SHEETS_CREDENTIALS_FILE", "credentials.json"),
            ]),
            Some(PathBuf::from("credentials.json"))
        );
    }

    #[test]
    fn test_legacy_token_name() {
        let config = config(&[("TELEGRAM_TOKEN", "t"), ("LEDGER_BACKEND", "memory")]).unwrap();
        assert_eq!(config.telegram_token, "t");
        assert_eq!(config.ledger, LedgerConfig::Memory);
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(
            config(&[("LEDGER_BACKEND", "memory")]),
            Err(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))
        );
    }

    #[test]
    fn test_backend_inference() {
        let postgres = config(&[("TELEGRAM_BOT_TOKEN", "t"), ("DATABASE_URL", "postgres://x")]).unwrap();
        assert_eq!(
            postgres.ledger,
            LedgerConfig::Postgres {
                database_url: "postgres://x".to_string()
            }
        );
        assert!(matches!(
            config(&[("TELEGRAM_BOT_TOKEN", "t")]),
            Err(ConfigError::NoLedger)
        ));
    }

    #[test]
    fn test_recent_limit_capped_and_validated() {
        let capped = config(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("LEDGER_BACKEND", "memory"),
            ("RECENT_DEFAULT_LIMIT", "500"),
        ])
        .unwrap();
        assert_eq!(capped.settings.recent_default_limit, MAX_RECENT_LIMIT);

        assert!(matches!(
            config(&[
                ("TELEGRAM_BOT_TOKEN", "t"),
                ("LEDGER_BACKEND", "memory"),
                ("RECENT_DEFAULT_LIMIT", "0"),
            ]),
            Err(ConfigError::Invalid {
                name: "RECENT_DEFAULT_LIMIT",
                ..
            })
        ));
    }

    #[test]
    fn test_log_settings() {
        let config = config(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("LEDGER_BACKEND", "memory"),
            ("LOG_DIR", ""),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.log.dir, None);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_backend() {
        assert!(matches!(
            config(&[("TELEGRAM_BOT_TOKEN", "t"), ("LEDGER_BACKEND", "excel")]),
            Err(ConfigError::Invalid {
                name: "LEDGER_BACKEND",
                ..
            })
        ));
    }
}
