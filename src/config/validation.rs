//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, escalation ≥ 10%, polling 2-5s)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>

use std::fmt;

use crate::config::schema::RelayConfig;

/// Smallest escalation step a retry may apply.
pub const MIN_ESCALATION_PERCENT: u32 = 10;

/// Allowed receipt polling window in milliseconds.
pub const POLL_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 2000..=5000;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration, collecting every violation.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.chain.rpc_url.parse::<url::Url>().is_err() {
        errors.push(ValidationError::new("chain.rpc_url", "not a valid URL"));
    }
    for url in &config.chain.failover_urls {
        if url.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(
                "chain.failover_urls",
                format!("'{}' is not a valid URL", url),
            ));
        }
    }
    if config.chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("chain.rpc_timeout_secs", "must be > 0"));
    }

    if config.fees.escalation_percent < MIN_ESCALATION_PERCENT {
        errors.push(ValidationError::new(
            "fees.escalation_percent",
            format!("must be >= {}", MIN_ESCALATION_PERCENT),
        ));
    }
    if config.fees.base_fee_multiplier == 0 {
        errors.push(ValidationError::new("fees.base_fee_multiplier", "must be > 0"));
    }
    if config.fees.max_fee_per_gas_cap == Some(0) {
        errors.push(ValidationError::new("fees.max_fee_per_gas_cap", "must be > 0 when set"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    if config.confirmation.confirmations == 0 {
        errors.push(ValidationError::new("confirmation.confirmations", "must be >= 1"));
    }
    if config.confirmation.poll_interval_ms == 0 {
        errors.push(ValidationError::new("confirmation.poll_interval_ms", "must be > 0"));
    } else if !config.confirmation.allow_fast_polling
        && !POLL_INTERVAL_RANGE_MS.contains(&config.confirmation.poll_interval_ms)
    {
        errors.push(ValidationError::new(
            "confirmation.poll_interval_ms",
            format!(
                "must be within {}..={} ms (set allow_fast_polling for devnets)",
                POLL_INTERVAL_RANGE_MS.start(),
                POLL_INTERVAL_RANGE_MS.end()
            ),
        ));
    }
    if config.confirmation.default_deadline_secs == Some(0) {
        errors.push(ValidationError::new(
            "confirmation.default_deadline_secs",
            "must be > 0 when set",
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a valid socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = RelayConfig::default();
        config.fees.escalation_percent = 5;
        config.retries.max_attempts = 0;
        config.confirmation.confirmations = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "fees.escalation_percent",
                "retries.max_attempts",
                "confirmation.confirmations"
            ]
        );
    }

    #[test]
    fn test_poll_interval_window() {
        let mut config = RelayConfig::default();
        config.confirmation.poll_interval_ms = 500;
        assert!(validate_config(&config).is_err());

        config.confirmation.allow_fast_polling = true;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_urls() {
        let mut config = RelayConfig::default();
        config.chain.rpc_url = "localhost 8545".to_string();
        config.chain.failover_urls = vec!["http://ok:8545".into(), "nope".into()];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[1].to_string().contains("'nope'"));
    }
}
