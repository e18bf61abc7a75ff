//! Configuration

use std::{fs, io, path::Path, time::Duration};

use decimal_percentage::Percentage;
use jiff::SignedDuration;
use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prices::currency_from_code;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    /// The config file is not valid YAML for [`CartConfig`]
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Tax rate below zero
    #[error("Tax rate must not be negative: {0}")]
    NegativeTaxRate(Decimal),
}

/// Cart engine settings. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CartConfig {
    /// ISO 4217 currency code
    pub currency: String,

    /// Flat tax rate as a fraction (`0.18` is 18%)
    pub tax_rate: Decimal,

    /// How long removed items can be restored
    pub undo_window_secs: u64,

    /// How many removed items are kept
    pub undo_capacity: usize,

    /// Delay before the item list is saved
    pub persist_debounce_ms: u64,

    /// Interval between background cart refreshes
    pub resync_interval_secs: u64,

    /// Storage key for the item list
    pub storage_key: String,

    /// Cart service base URL, e.g. `https://shop.example/api`
    pub api_base_url: Option<String>,

    /// Cart service request timeout
    pub request_timeout_secs: u64,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            tax_rate: Decimal::new(18, 2),
            undo_window_secs: 300,
            undo_capacity: 20,
            persist_debounce_ms: 300,
            resync_interval_secs: 30,
            storage_key: "cart-items".to_string(),
            api_base_url: None,
            request_timeout_secs: 10,
        }
    }
}

impl CartConfig {
    /// Loads and validates a YAML config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails
    /// [`CartConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }

    /// Parses and validates YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or fails [`CartConfig::validate`].
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: CartConfig = serde_norway::from_str(yaml)?;

        config.validate()?;

        Ok(config)
    }

    /// Checks values that deserialize but cannot be used.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnknownCurrency`]: the currency is not supported.
    /// - [`ConfigError::NegativeTaxRate`]: the tax rate is below zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.currency()?;

        if self.tax_rate < Decimal::ZERO {
            return Err(ConfigError::NegativeTaxRate(self.tax_rate));
        }

        Ok(())
    }

    /// The configured currency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCurrency`] for unsupported codes.
    pub fn currency(&self) -> Result<&'static Currency, ConfigError> {
        currency_from_code(&self.currency)
            .ok_or_else(|| ConfigError::UnknownCurrency(self.currency.clone()))
    }

    /// The flat tax rate.
    pub fn tax_rate(&self) -> Percentage {
        Percentage::from(self.tax_rate)
    }

    /// The undo retention window.
    pub fn undo_window(&self) -> SignedDuration {
        SignedDuration::from_secs(i64::try_from(self.undo_window_secs).unwrap_or(i64::MAX))
    }

    /// The persistence debounce.
    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    /// The background resync interval.
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// The cart service request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use rusty_money::iso::{GBP, USD};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn empty_yaml_uses_defaults() -> TestResult {
        let config = CartConfig::from_yaml_str("{}")?;

        assert_eq!(config, CartConfig::default());
        assert_eq!(config.currency()?, USD);
        assert_eq!(config.undo_window(), SignedDuration::from_mins(5));
        assert_eq!(config.persist_debounce(), Duration::from_millis(300));
        assert_eq!(config.resync_interval(), Duration::from_secs(30));

        Ok(())
    }

    #[test]
    fn load_reads_overrides_from_file() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;

        writeln!(
            file,
            "currency: gbp\ntax_rate: 0.2\nundo_capacity: 5\napi_base_url: http://localhost:8080"
        )?;

        let config = CartConfig::load(file.path())?;

        assert_eq!(config.currency()?, GBP);
        assert_eq!(config.tax_rate, Decimal::new(2, 1));
        assert_eq!(config.undo_capacity, 5);
        assert_eq!(config.api_base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.storage_key, "cart-items");

        Ok(())
    }

    #[test]
    fn unknown_currency_is_rejected() {
        let result = CartConfig::from_yaml_str("currency: XYZ");

        assert!(matches!(result, Err(ConfigError::UnknownCurrency(code)) if code == "XYZ"));
    }

    #[test]
    fn negative_tax_rate_is_rejected() {
        let result = CartConfig::from_yaml_str("tax_rate: -0.1");

        assert!(matches!(result, Err(ConfigError::NegativeTaxRate(_))));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = CartConfig::from_yaml_str("taxrate: 0.1");

        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }
}
