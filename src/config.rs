use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use log::LevelFilter;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "poolbet.toml";
/// A hundred years.
pub const MAX_SESSION_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub market: MarketSettings,
    pub auth: AuthSettings,
    /// One of off, error, warn, info, debug, trace.
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    /// 0 picks a free port.
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MarketSettings {
    /// Balance every new user starts with.
    pub starting_balance: Decimal,
    /// How often markets past their close date get closed. 0 disables the
    /// sweep, bets still close them lazily.
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthSettings {
    pub session_ttl_secs: u64,
    pub default_invite_code: String,
    pub pbkdf2_rounds: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            market: MarketSettings::default(),
            auth: AuthSettings::default(),
            log_level: "info".into(),
        }
    }
}
impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8081,
        }
    }
}
impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            starting_balance: dec!(1000),
            sweep_interval_secs: 60,
        }
    }
}
impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_ttl_secs: 7 * 24 * 60 * 60,
            default_invite_code: "FIRSTUSER".into(),
            pbkdf2_rounds: 10_000,
        }
    }
}

impl Settings {
    /// Reads `path` if it exists, then `POOLBET__SECTION__KEY` variables on
    /// top of it.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let required = path.is_some();
        let path = path.unwrap_or(DEFAULT_CONFIG_FILE);
        let settings: Settings = Config::builder()
            .add_source(File::with_name(path).required(required))
            .add_source(
                Environment::with_prefix("POOLBET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Error reading configuration from {}", path))?
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }
    fn validate(&self) -> Result<()> {
        if self.market.starting_balance < Decimal::ZERO {
            anyhow::bail!("Starting balance can't be negative");
        }
        if self.auth.default_invite_code.trim().is_empty() {
            anyhow::bail!("Default invite code can't be empty");
        }
        if self.auth.session_ttl_secs == 0 || self.auth.session_ttl_secs > MAX_SESSION_TTL_SECS {
            anyhow::bail!(
                "session_ttl_secs must be between 1 and {}",
                MAX_SESSION_TTL_SECS
            );
        }
        if self.auth.pbkdf2_rounds == 0 {
            anyhow::bail!("pbkdf2_rounds must be at least 1");
        }
        self.log_level_filter()?;
        Ok(())
    }
    pub fn log_level_filter(&self) -> Result<LevelFilter> {
        self.log_level
            .parse()
            .with_context(|| format!("Unknown log level {}", self.log_level))
    }
}
