use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::dispatch::is_valid_model_name;
use crate::error::ForgeError;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_QUOTA_POINTS: u32 = 10;
pub const DEFAULT_QUOTA_WINDOW_SECS: u64 = 1;

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub port: u16,
    pub base_url: String,
    pub default_model: String,
    pub static_dir: PathBuf,
    pub quota: QuotaConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuotaConfig {
    pub points: u32,
    pub window: Duration,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            points: DEFAULT_QUOTA_POINTS,
            window: Duration::from_secs(DEFAULT_QUOTA_WINDOW_SECS),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"[REDACTED]")
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("static_dir", &self.static_dir)
            .field("quota", &self.quota)
            .finish()
    }
}

/// Optional TOML overlay. Every key is optional; environment variables win.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerSection,
    pub model: ModelSection,
    pub quota: QuotaSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: Option<u16>,
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub default: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QuotaSection {
    pub points: Option<u32>,
    pub window_secs: Option<u64>,
}

impl FileConfig {
    pub fn parse(contents: &str) -> Result<Self, ForgeError> {
        toml::from_str(contents).map_err(|e| ForgeError::Config(format!("invalid config file: {e}")))
    }

    pub fn read(path: &Path) -> Result<Self, ForgeError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ForgeError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::parse(&contents)
    }
}

impl Config {
    /// Load configuration from the process environment, layered over the
    /// optional TOML file named by `IDEAFORGE_CONFIG`.
    pub fn load() -> Result<Self, ForgeError> {
        let file = match env::var("IDEAFORGE_CONFIG") {
            Ok(path) if !path.trim().is_empty() => FileConfig::read(Path::new(path.trim()))?,
            _ => FileConfig::default(),
        };
        Self::resolve(|name| env::var(name).ok(), file)
    }

    /// Resolve a config from a variable lookup and a file overlay.
    pub fn resolve(
        lookup: impl Fn(&str) -> Option<String>,
        file: FileConfig,
    ) -> Result<Self, ForgeError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = var("GEMINI_API_KEY")
            .ok_or_else(|| ForgeError::Config("GEMINI_API_KEY is not set".to_string()))?;

        let port = match var("PORT") {
            Some(raw) => parse_number::<u16>("PORT", &raw)?,
            None => file.server.port.unwrap_or(DEFAULT_PORT),
        };

        let base_url = var("GEMINI_BASE_URL")
            .or(file.model.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let default_model = var("DEFAULT_MODEL")
            .or(file.model.default)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        if !is_valid_model_name(&default_model) {
            return Err(ForgeError::Config(format!(
                "default model {default_model:?} is not a valid model identifier"
            )));
        }

        let static_dir = var("STATIC_DIR")
            .map(PathBuf::from)
            .or(file.server.static_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));

        let points = match var("RATE_LIMIT_POINTS") {
            Some(raw) => parse_number::<u32>("RATE_LIMIT_POINTS", &raw)?,
            None => file.quota.points.unwrap_or(DEFAULT_QUOTA_POINTS),
        };
        let window_secs = match var("RATE_LIMIT_WINDOW_SECS") {
            Some(raw) => parse_number::<u64>("RATE_LIMIT_WINDOW_SECS", &raw)?,
            None => file.quota.window_secs.unwrap_or(DEFAULT_QUOTA_WINDOW_SECS),
        };
        if points == 0 || window_secs == 0 {
            return Err(ForgeError::Config(
                "rate limit points and window must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            api_key,
            port,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model,
            static_dir,
            quota: QuotaConfig {
                points,
                window: Duration::from_secs(window_secs),
            },
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ForgeError> {
    raw.trim()
        .parse()
        .map_err(|_| ForgeError::Config(format!("{name} must be a positive integer, got {raw:?}")))
}

/// Load `.env` from the binary's directory, falling back to the CWD search.
pub fn load_dotenv() {
    let beside_binary = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(".env")))
        .filter(|path| path.exists());

    match beside_binary {
        Some(path) => {
            dotenvy::from_path(&path).ok();
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
}
