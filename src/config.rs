//! Application configuration (spec.md §9 "Configuration" ambient concern).
//!
//! Loaded from environment variables (optionally via a `.env` file) layered
//! over hardcoded defaults, the way the teacher's `main.rs` calls
//! `dotenvy::dotenv()` then `AppConfig::load()` before constructing services.
//! Grounded in the teacher's `RedisConfig`/`AppConfig` shape
//! (`cache/redis_client.rs`, `main.rs`), generalized from connection strings
//! to the engine's symbol catalog and risk parameters.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolConfig {
    pub symbol: String,
    pub tick_size: i64,
    pub min_size: f64,
    pub max_size: f64,
    pub leverage: u32,
    pub maintenance_margin_ratio: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeeScheduleConfig {
    pub maker_fee_rate: f64,
    pub taker_fee_rate: f64,
}

impl Default for FeeScheduleConfig {
    fn default() -> Self {
        Self { maker_fee_rate: 0.0002, taker_fee_rate: 0.0005 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    pub journal_path: String,
    pub snapshot_dir: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { journal_path: "data/events.journal".to_string(), snapshot_dir: "data/snapshots".to_string() }
    }
}

/// Top-level configuration, assembled the way the teacher's `AppConfig`
/// aggregates its per-concern config structs.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    #[serde(default)]
    pub symbols: Vec<SymbolConfig>,
    #[serde(default)]
    pub fees: FeeScheduleConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default = "default_stp_mode")]
    pub stp_mode: String,
}

fn default_stp_mode() -> String {
    "cancel_oldest".to_string()
}

impl AppConfig {
    /// Loads from `CLOB_*`-prefixed environment variables over built-in
    /// defaults. A missing symbol list is valid; callers populate the
    /// Product Catalog separately in that case.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("environment", "development")?
            .set_default("stp_mode", "cancel_oldest")?
            .set_default("fees.maker_fee_rate", 0.0002)?
            .set_default("fees.taker_fee_rate", 0.0005)?
            .set_default("journal.journal_path", "data/events.journal")?
            .set_default("journal.snapshot_dir", "data/snapshots")?
            .add_source(Environment::with_prefix("CLOB").separator("__").try_parsing(true));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_falls_back_to_defaults_without_env() {
        let config = AppConfig::load().unwrap();
        assert_eq!(config.environment, "development");
        assert_eq!(config.stp_mode, "cancel_oldest");
        assert_eq!(config.fees.maker_fee_rate, 0.0002);
    }

    #[test]
    fn env_override_takes_precedence() {
        std::env::set_var("CLOB__ENVIRONMENT", "production");
        let config = AppConfig::load().unwrap();
        assert_eq!(config.environment, "production");
        std::env::remove_var("CLOB__ENVIRONMENT");
    }
}
