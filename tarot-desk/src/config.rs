// Configuration loading and parsing (app.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::tarot::deck::DeckKind;

/// Environment variable that overrides `gemini_api_key` from credentials.toml.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub reading: ReadingConfig,
    pub market: MarketConfig,
    pub storage: StorageConfig,
    pub art: ArtConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// app.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire app.toml file.
#[derive(Debug, Clone, Deserialize)]
struct AppFile {
    llm: LlmConfig,
    reading: ReadingConfig,
    market: MarketConfig,
    storage: StorageConfig,
    #[serde(default)]
    art: ArtConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    /// Starting sampling temperature; the sensitivity slider moves it at runtime.
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Override for the API root (tests point this at a local server).
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadingConfig {
    #[serde(default)]
    pub deck: DeckKind,
    pub cards_per_draw: usize,
    /// How many of the user's previous records are embedded in each prompt.
    pub history_context: usize,
    pub summary_max_chars: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    pub base_url: String,
    pub range: String,
    pub interval: String,
    pub sma_short: usize,
    pub sma_long: usize,
    pub rsi_period: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Append-only SQLite table.
    Sqlite,
    /// CSV sheet, read and rewritten whole on every operation.
    Sheet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// File location. When omitted, the history lives in the platform data
    /// directory (see `resolved_path`).
    #[serde(default)]
    pub path: Option<String>,
}

impl StorageConfig {
    /// The concrete history file path for this backend.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return PathBuf::from(path);
        }
        let file_name = match self.backend {
            StorageBackend::Sqlite => "history.db",
            StorageBackend::Sheet => "history.csv",
        };
        match directories::ProjectDirs::from("", "", "tarot-desk") {
            Some(dirs) => dirs.data_dir().join(file_name),
            None => PathBuf::from(file_name),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ArtConfig {
    #[serde(default)]
    pub local_dir: Option<String>,
    #[serde(default)]
    pub remote_base_url: Option<String>,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub gemini_api_key: Option<String>,
}

impl CredentialsConfig {
    /// Let a non-empty environment value replace the file value.
    pub fn apply_env_override(&mut self, env_value: Option<String>) {
        if let Some(key) = env_value.filter(|k| !k.trim().is_empty()) {
            self.gemini_api_key = Some(key.trim().to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/app.toml` and (optionally)
/// `config/credentials.toml`, relative to the given `base_dir`.
///
/// This is the lower-level loading primitive: it neither copies defaults nor
/// reads the environment. Prefer `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- app.toml (required) ---
    let app_path = config_dir.join("app.toml");
    let app_text = read_file(&app_path)?;
    let app_file: AppFile = toml::from_str(&app_text).map_err(|e| ConfigError::ParseError {
        path: app_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        llm: app_file.llm,
        reading: app_file.reading,
        market: app_file.market,
        storage: app_file.storage,
        art: app_file.art,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Copy every file from `defaults/` into `config/` that is not there yet,
/// skipping `*.example` templates. Returns the paths that were created.
///
/// A tree with `config/` but no `defaults/` is accepted as-is.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        return if config_dir.is_dir() {
            Ok(Vec::new())
        } else {
            Err(copy_error(format!(
                "neither defaults/ nor config/ directory found in {}; \
                 run tarot-desk from its project directory",
                base_dir.display()
            )))
        };
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("cannot create {}: {e}", config_dir.display())))?;
    let entries = std::fs::read_dir(&defaults_dir)
        .map_err(|e| copy_error(format!("cannot list {}: {e}", defaults_dir.display())))?;

    let mut copied = Vec::new();
    for entry in entries {
        let source = entry
            .map_err(|e| copy_error(format!("cannot list {}: {e}", defaults_dir.display())))?
            .path();
        let Some(name) = source.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !source.is_file() || name.ends_with(".example") {
            continue;
        }
        let target = config_dir.join(name);
        if copy_if_absent(&source, &target)? {
            copied.push(target);
        }
    }

    Ok(copied)
}

/// Create `target` with the contents of `source` unless it already exists.
/// `create_new` keeps an existing user copy even under a concurrent start.
fn copy_if_absent(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_error(format!("cannot create {}: {e}", target.display()))),
    };
    let content = std::fs::read(source)
        .map_err(|e| copy_error(format!("cannot read {}: {e}", source.display())))?;
    std::io::Write::write_all(&mut dest, &content)
        .map_err(|e| copy_error(format!("cannot write {}: {e}", target.display())))?;
    Ok(true)
}

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Convenience wrapper: loads config relative to the current working
/// directory, copying defaults first and applying the `GEMINI_API_KEY`
/// environment override.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    let mut config = load_config_from(&cwd)?;
    config
        .credentials
        .apply_env_override(std::env::var(API_KEY_ENV).ok());
    Ok(config)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let llm = &config.llm;
    if llm.model.trim().is_empty() {
        return Err(invalid("llm.model", "must not be empty"));
    }
    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(invalid(
            "llm.temperature",
            format!("must be between 0.0 and 2.0 inclusive, got {}", llm.temperature),
        ));
    }
    if llm.max_output_tokens == 0 {
        return Err(invalid("llm.max_output_tokens", "must be > 0"));
    }

    let reading = &config.reading;
    let deck_size = reading.deck.size();
    if reading.cards_per_draw == 0 || reading.cards_per_draw > deck_size {
        return Err(invalid(
            "reading.cards_per_draw",
            format!(
                "must be between 1 and {deck_size}, got {}",
                reading.cards_per_draw
            ),
        ));
    }
    if reading.summary_max_chars == 0 {
        return Err(invalid("reading.summary_max_chars", "must be > 0"));
    }

    let market = &config.market;
    if market.base_url.trim().is_empty() {
        return Err(invalid("market.base_url", "must not be empty"));
    }
    if market.sma_short == 0 {
        return Err(invalid("market.sma_short", "must be > 0"));
    }
    if market.sma_long <= market.sma_short {
        return Err(invalid(
            "market.sma_long",
            format!(
                "must be greater than sma_short ({}), got {}",
                market.sma_short, market.sma_long
            ),
        ));
    }
    if market.rsi_period == 0 {
        return Err(invalid("market.rsi_period", "must be > 0"));
    }

    if config
        .storage
        .path
        .as_deref()
        .is_some_and(|p| p.trim().is_empty())
    {
        return Err(invalid("storage.path", "must not be empty when set"));
    }

    Ok(())
}

/// The shipped defaults with the given API key, for tests in other modules.
#[cfg(test)]
pub(crate) fn test_config(api_key: Option<&str>) -> Config {
    let app_file: AppFile =
        toml::from_str(include_str!("../defaults/app.toml")).expect("defaults/app.toml parses");
    Config {
        llm: app_file.llm,
        reading: app_file.reading,
        market: app_file.market,
        storage: app_file.storage,
        art: app_file.art,
        credentials: CredentialsConfig {
            gemini_api_key: api_key.map(str::to_string),
        },
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
