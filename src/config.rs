use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use dotenv::dotenv;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    /// Tick of the pending-offer reconciliation sweep.
    pub offer_check_interval: Duration,
    /// Tick of the pending-lease reconciliation sweep.
    pub lease_check_interval: Duration,
    /// Weekly UEM budget split across the period's Hub reports.
    pub uem_reward_amount: f64,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            offer_check_interval: Duration::from_secs(env_or(
                "OFFER_CHECK_INTERVAL_SECONDS",
                60,
            )?),
            lease_check_interval: Duration::from_secs(env_or(
                "LEASE_CHECK_INTERVAL_SECONDS",
                60,
            )?),
            uem_reward_amount: env_or("UEM_REWARD_AMOUNT", 5000.0)?,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("invalid value for {key}")),
        Err(_) => Ok(default),
    }
}
