use crate::application::engine::EngineSettings;
use crate::infrastructure::error::SettingsError;
use crate::presentation::format::NumberFormat;
use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub access: AccessConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_ttl_ms")]
    pub cache_ttl_ms: i64,
    #[serde(default = "default_ttl_ms")]
    pub refresh_ttl_ms: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            cache_ttl_ms: default_ttl_ms(),
            refresh_ttl_ms: default_ttl_ms(),
        }
    }
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        EngineSettings {
            debounce: Duration::from_millis(config.debounce_ms),
            cache_ttl_ms: config.cache_ttl_ms,
            refresh_ttl_ms: config.refresh_ttl_ms,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FormatConfig {
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    #[serde(default)]
    pub symbol_after: bool,
    #[serde(default = "default_thousands_separator")]
    pub thousands_separator: String,
    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            currency_symbol: default_currency_symbol(),
            symbol_after: false,
            thousands_separator: default_thousands_separator(),
            decimal_separator: default_decimal_separator(),
        }
    }
}

impl From<&FormatConfig> for NumberFormat {
    fn from(config: &FormatConfig) -> Self {
        NumberFormat {
            currency_symbol: config.currency_symbol.clone(),
            symbol_after: config.symbol_after,
            thousands_separator: config.thousands_separator.clone(),
            decimal_separator: config.decimal_separator.clone(),
        }
    }
}

/// Capabilities of the acting user, as resolved by the host application.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AccessConfig {
    #[serde(default)]
    pub can_filter_by_customer: bool,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_ttl_ms() -> i64 {
    90_000
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

fn default_thousands_separator() -> String {
    ",".to_string()
}

fn default_decimal_separator() -> String {
    ".".to_string()
}

/// Load `config/dashboard.*` (optional) overlaid with `ANALYTICS__*` env vars.
pub fn load_settings() -> Result<Settings, SettingsError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(
            config::Environment::with_prefix("ANALYTICS")
                .prefix_separator("__")
                .separator("__"),
        );

    build_settings(builder)
}

fn build_settings(builder: ConfigBuilder<DefaultState>) -> Result<Settings, SettingsError> {
    let settings: Settings = builder.build()?.try_deserialize()?;
    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &Settings) -> Result<(), SettingsError> {
    if settings.api.base_url.trim().is_empty() {
        return Err(SettingsError::Invalid {
            key: "api.base_url",
            reason: "must not be empty".to_string(),
        });
    }
    if settings.engine.cache_ttl_ms < 0 {
        return Err(SettingsError::Invalid {
            key: "engine.cache_ttl_ms",
            reason: "must not be negative".to_string(),
        });
    }
    if settings.engine.refresh_ttl_ms < 0 {
        return Err(SettingsError::Invalid {
            key: "engine.refresh_ttl_ms",
            reason: "must not be negative".to_string(),
        });
    }
    Ok(())
}
