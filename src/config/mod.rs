use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AppError;
use crate::mindmap::ColorScheme;

/// Lower bound for the generation timeout in milliseconds.
pub const MIN_GENERATION_TIMEOUT_MS: u64 = 1_000;
/// Upper bound for the generation timeout in milliseconds.
pub const MAX_GENERATION_TIMEOUT_MS: u64 = 120_000;
/// Default generation timeout in milliseconds.
pub const DEFAULT_GENERATION_TIMEOUT_MS: u64 = 25_000;

/// Server settings, see [`Config::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    pub langbase: LangbaseConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub pipes: PipeConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone)]
pub struct LangbaseConfig {
    pub api_key: String,
    pub base_url: String,
}

/// SQLite file and pool size.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Subscriber output on stderr.
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Per-request HTTP timeout and retry policy for Langbase calls.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct PipeConfig {
    pub mindmap: String,
}

/// Mind map generation settings
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Hard bound on the backend call; expiry degrades to the fallback graph.
    pub timeout_ms: u64,
    /// Scheme used when a request names none or an unknown one.
    pub default_color_scheme: ColorScheme,
}

const DEFAULT_BASE_URL: &str = "https://api.langbase.com";
const DEFAULT_DATABASE_PATH: &str = "./data/mindmap.db";
const DEFAULT_MINDMAP_PIPE: &str = "mindmap-generator-v1";

impl Config {
    /// Read configuration from the process environment, after loading `.env` if one exists.
    ///
    /// Only `LANGBASE_API_KEY` is required. Unparseable numbers fall back to their
    /// defaults and `GENERATION_TIMEOUT_MS` is clamped to
    /// `MIN_GENERATION_TIMEOUT_MS..=MAX_GENERATION_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, AppError> {
        // A missing .env file is the normal case.
        dotenvy::dotenv().ok();

        let api_key = env::var("LANGBASE_API_KEY").map_err(|_| AppError::Config {
            message: "LANGBASE_API_KEY is required".to_string(),
        })?;

        let request_defaults = RequestConfig::default();
        let generation_defaults = GenerationConfig::default();

        Ok(Config {
            langbase: LangbaseConfig {
                api_key,
                base_url: var_or("LANGBASE_BASE_URL", DEFAULT_BASE_URL),
            },
            database: DatabaseConfig {
                path: PathBuf::from(var_or("DATABASE_PATH", DEFAULT_DATABASE_PATH)),
                max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 5),
            },
            logging: LoggingConfig {
                level: var_or("LOG_LEVEL", "info"),
                format: LogFormat::from_name(&var_or("LOG_FORMAT", "pretty")),
            },
            request: RequestConfig {
                timeout_ms: parsed_or("REQUEST_TIMEOUT_MS", request_defaults.timeout_ms),
                max_retries: parsed_or("MAX_RETRIES", request_defaults.max_retries),
                retry_delay_ms: parsed_or("RETRY_DELAY_MS", request_defaults.retry_delay_ms),
            },
            pipes: PipeConfig {
                mindmap: var_or("PIPE_MINDMAP", DEFAULT_MINDMAP_PIPE),
            },
            generation: GenerationConfig {
                timeout_ms: parsed_or("GENERATION_TIMEOUT_MS", generation_defaults.timeout_ms)
                    .clamp(MIN_GENERATION_TIMEOUT_MS, MAX_GENERATION_TIMEOUT_MS),
                default_color_scheme: env::var("DEFAULT_COLOR_SCHEME")
                    .map(|name| ColorScheme::from_name_or_default(Some(&name)))
                    .unwrap_or(generation_defaults.default_color_scheme),
            },
        })
    }
}

impl LogFormat {
    /// `json` in any case selects JSON lines; anything else is pretty.
    fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 0,
            retry_delay_ms: 1_000,
        }
    }
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            mindmap: DEFAULT_MINDMAP_PIPE.to_string(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_GENERATION_TIMEOUT_MS,
            default_color_scheme: ColorScheme::default(),
        }
    }
}
