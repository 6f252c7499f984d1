// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde attributes cannot express: non-empty
//! paths, positive worker counts, forwarding targets, key encodings.

use crate::diagnostic::ConfigError;
use crate::model::{ForwardMode, PkgrelayConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every error instead of failing on the first one.
pub fn validate_config(config: &PkgrelayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if config.service.name.trim().is_empty() {
        invalid("service.name must not be empty".to_string());
    }

    let level = config.service.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        invalid(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path must not be empty".to_string());
    }

    if config.blob.root_dir.trim().is_empty() {
        invalid("blob.root_dir must not be empty".to_string());
    }
    if config.blob.timeout_ms == 0 {
        invalid("blob.timeout_ms must be greater than 0".to_string());
    }

    if config.queue.inbound.trim().is_empty() {
        invalid("queue.inbound must not be empty".to_string());
    }
    if config.queue.workers == 0 {
        invalid("queue.workers must be at least 1".to_string());
    }
    if config.queue.max_deliver == 0 {
        invalid("queue.max_deliver must be at least 1".to_string());
    }
    if config.queue.ack_wait_secs == 0 {
        invalid("queue.ack_wait_secs must be greater than 0".to_string());
    }
    if config.queue.poll_interval_ms == 0 {
        invalid("queue.poll_interval_ms must be greater than 0".to_string());
    }

    match config.forward.mode {
        ForwardMode::Queue => {
            if config.forward.queue_name.trim().is_empty() {
                invalid("forward.queue_name must not be empty when mode = \"queue\"".to_string());
            }
        }
        ForwardMode::Http => match config.forward.http_url.as_deref() {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
            Some(url) => invalid(format!(
                "forward.http_url `{url}` must start with http:// or https://"
            )),
            None => invalid("forward.http_url is required when mode = \"http\"".to_string()),
        },
    }
    if config.forward.timeout_ms == 0 {
        invalid("forward.timeout_ms must be greater than 0".to_string());
    }

    if let Some(key) = &config.packing.signing_key {
        let trimmed = key.trim();
        if trimmed.len() != 64 || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            invalid("packing.signing_key must be 64 hex characters (32-byte seed)".to_string());
        }
    }

    if config.gateway.enabled {
        let host = config.gateway.host.trim();
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = !host.is_empty()
            && host
                .chars()
                .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            invalid(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            ));
        }
        if matches!(&config.gateway.bearer_token, Some(t) if t.trim().is_empty()) {
            invalid("gateway.bearer_token must not be empty when set".to_string());
        }
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

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = PkgrelayConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = PkgrelayConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "database_path"));
    }

    #[test]
    fn http_mode_requires_url() {
        let mut config = PkgrelayConfig::default();
        config.forward.mode = ForwardMode::Http;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "forward.http_url is required"));

        config.forward.http_url = Some("ftp://sender".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "must start with http"));

        config.forward.http_url = Some("http://sender.local/v1/packages".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn bad_signing_key_fails_validation() {
        let mut config = PkgrelayConfig::default();
        config.packing.signing_key = Some("not-hex".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "signing_key"));

        config.packing.signing_key = Some("ab".repeat(32));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = PkgrelayConfig::default();
        config.queue.workers = 0;
        config.queue.max_deliver = 0;
        config.service.log_level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn disabled_gateway_skips_host_check() {
        let mut config = PkgrelayConfig::default();
        config.gateway.enabled = false;
        config.gateway.host = "not a host!".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
