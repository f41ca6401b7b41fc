//! Configuration types for EcoMarket nodes.

use std::{path::Path, time::Duration};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MarketError, Result, WalletId, constants};

/// Checkout session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Hold applied when a request asks for `<= 0` minutes.
    #[serde(default = "default_hold_minutes")]
    pub default_hold_minutes: i64,
}

impl CheckoutConfig {
    /// Hold duration actually applied for a requested value.
    ///
    /// # Errors
    /// `InvalidAmount` for a hold longer than [`constants::MAX_HOLD_MINUTES`].
    pub fn effective_hold_minutes(&self, requested: i64) -> Result<i64> {
        if requested <= 0 {
            return Ok(self.default_hold_minutes);
        }
        if requested > constants::MAX_HOLD_MINUTES {
            return Err(MarketError::InvalidAmount {
                reason: format!(
                    "hold of {requested} minutes exceeds the limit of {}",
                    constants::MAX_HOLD_MINUTES
                ),
            });
        }
        Ok(requested)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_hold_minutes <= 0 || self.default_hold_minutes > constants::MAX_HOLD_MINUTES
        {
            return Err(MarketError::Configuration(format!(
                "default_hold_minutes must be in 1..={}, got {}",
                constants::MAX_HOLD_MINUTES,
                self.default_hold_minutes
            )));
        }
        Ok(())
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            default_hold_minutes: constants::DEFAULT_HOLD_MINUTES,
        }
    }
}

fn default_hold_minutes() -> i64 {
    constants::DEFAULT_HOLD_MINUTES
}

/// Payout settlement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// The platform escrow wallet every payout is drawn from.
    pub platform_wallet: WalletId,
    /// Fraction of each order total kept by the platform. Default 0.10.
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,
    /// Interval between settlement sweeps. Default one minute.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl SettlementConfig {
    #[must_use]
    pub fn new(platform_wallet: WalletId) -> Self {
        Self {
            platform_wallet,
            fee_rate: default_fee_rate(),
            sweep_interval_ms: constants::DEFAULT_SWEEP_INTERVAL_MS,
        }
    }

    #[must_use]
    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fee_rate.is_sign_negative() || self.fee_rate >= Decimal::ONE {
            return Err(MarketError::Configuration(format!(
                "fee_rate must be in [0, 1), got {}",
                self.fee_rate
            )));
        }
        if self.sweep_interval_ms < constants::MIN_SWEEP_INTERVAL_MS {
            return Err(MarketError::Configuration(format!(
                "sweep_interval_ms must be at least {}, got {}",
                constants::MIN_SWEEP_INTERVAL_MS,
                self.sweep_interval_ms
            )));
        }
        Ok(())
    }
}

fn default_fee_rate() -> Decimal {
    let (mantissa, scale) = constants::DEFAULT_FEE_RATE;
    Decimal::new(mantissa, scale)
}

fn default_sweep_interval_ms() -> u64 {
    constants::DEFAULT_SWEEP_INTERVAL_MS
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// `RUST_LOG`-style directive used when the env var is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    constants::DEFAULT_LOG_FILTER.to_string()
}

/// Top-level configuration for one settlement node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub checkout: CheckoutConfig,
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl NodeConfig {
    #[must_use]
    pub fn new(platform_wallet: WalletId) -> Self {
        Self {
            checkout: CheckoutConfig::default(),
            settlement: SettlementConfig::new(platform_wallet),
            log: LogConfig::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        self.checkout.validate()?;
        self.settlement.validate()
    }
}
