use anyhow::Context;
use rust_decimal::Decimal;
use std::{net::SocketAddr, path::Path, str::FromStr, time::Duration};

use vaultledger_core::constants::{
    DEFAULT_ANNUAL_INTEREST_RATE, DEFAULT_GROUP_MEMBER_CAP, DEFAULT_PRICE_STALENESS_SECS,
};
use vaultledger_core::ledger::LedgerConfig;
use vaultledger_core::vault::VaultConfig;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub log_format: String,
    pub vaults: Vec<VaultConfig>,
    pub ledger: LedgerConfig,
    pub price_oracle_url: Option<String>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env_or(key, default);
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", key, raw, e))
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = parse_env("VL_LISTEN_ADDR", "0.0.0.0:8080")?;
        let db_path = env_or("VL_DB_PATH", "./db/vaultledger.db");
        let cors_allow = env_or("VL_CORS_ALLOW_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = parse_env("VL_REQUEST_TIMEOUT_MS", "30000")?;
        let log_format = env_or("VL_LOG_FORMAT", "text");
        let vaults = load_vaults(Path::new(&env_or("VL_VAULTS_FILE", "./vaults.json")))?;

        let default_annual_rate: Decimal =
            parse_env("VL_DEFAULT_ANNUAL_RATE", DEFAULT_ANNUAL_INTEREST_RATE)?;
        let group_member_cap: u32 =
            parse_env("VL_GROUP_MEMBER_CAP", &DEFAULT_GROUP_MEMBER_CAP.to_string())?;
        let price_staleness_secs: i64 = parse_env(
            "VL_PRICE_STALENESS_SECS",
            &DEFAULT_PRICE_STALENESS_SECS.to_string(),
        )?;
        if default_annual_rate < Decimal::ZERO {
            anyhow::bail!("VL_DEFAULT_ANNUAL_RATE must not be negative");
        }
        if group_member_cap == 0 {
            anyhow::bail!("VL_GROUP_MEMBER_CAP must be at least 1");
        }

        let price_oracle_url = std::env::var("VL_PRICE_ORACLE_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(Self {
            listen_addr,
            db_path,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            log_format,
            vaults,
            ledger: LedgerConfig {
                default_annual_rate,
                group_member_cap,
                price_staleness_secs,
            },
            price_oracle_url,
        })
    }
}

/// Reads the vault list. A missing file means no scanners are started.
pub fn load_vaults(path: &Path) -> anyhow::Result<Vec<VaultConfig>> {
    if !path.exists() {
        tracing::warn!(
            "Vaults file {} not found; chain scanning is disabled",
            path.display()
        );
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read vaults file {}", path.display()))?;
    parse_vaults(&raw).with_context(|| format!("Invalid vaults file {}", path.display()))
}

pub fn parse_vaults(raw: &str) -> anyhow::Result<Vec<VaultConfig>> {
    let vaults: Vec<VaultConfig> = serde_json::from_str(raw)?;
    let mut seen = std::collections::HashSet::new();
    vaults
        .into_iter()
        .map(|vault| {
            let vault = vault.normalized();
            vault.validate()?;
            if !seen.insert(vault.key()) {
                anyhow::bail!("Vault {} is configured twice", vault.key());
            }
            Ok(vault)
        })
        .collect()
}
