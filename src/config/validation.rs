use crate::config::types::{AssetConfig, Config, CrawlerConfig, SiteConfig, ThrottleConfig};
use crate::ConfigError;
use url::Url;

/// Largest accepted `cache-days` (ten years)
const MAX_CACHE_DAYS: u64 = 3650;

/// Largest accepted `max-asset-kb` (1 GiB)
const MAX_ASSET_KB: u64 = 1024 * 1024;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_crawler_config(&config.crawler)?;
    validate_throttle_config(&config.throttle)?;
    validate_asset_config(&config.assets)?;

    if config.paths.slug_max_len < 8 {
        return Err(ConfigError::Validation(format!(
            "slug-max-len must be >= 8, got {}",
            config.paths.slug_max_len
        )));
    }

    Ok(())
}

fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", config.base_url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' has no host",
            config.base_url
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.retry_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "retry-limit must be >= 1, got {}",
            config.retry_limit
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.per_host_connections < 1 {
        return Err(ConfigError::Validation(
            "per-host-connections must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_throttle_config(config: &ThrottleConfig) -> Result<(), ConfigError> {
    let delays = [
        ("base-delay", config.base_delay),
        ("min-delay", config.min_delay),
        ("max-delay", config.max_delay),
        ("delay-step", config.delay_step),
    ];
    for (name, value) in delays {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::Validation(format!(
                "{} must be a non-negative number, got {}",
                name, value
            )));
        }
    }

    if config.min_delay > config.max_delay {
        return Err(ConfigError::Validation(format!(
            "min-delay ({}) cannot exceed max-delay ({})",
            config.min_delay, config.max_delay
        )));
    }

    if config.success_window < 1 {
        return Err(ConfigError::Validation(
            "success-window must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_asset_config(config: &AssetConfig) -> Result<(), ConfigError> {
    for pattern in &config.ad_hosts {
        validate_domain_pattern(pattern)?;
    }

    if let Some(kb) = config.max_asset_kb {
        if kb > MAX_ASSET_KB {
            return Err(ConfigError::Validation(format!(
                "max-asset-kb must be <= {}, got {}",
                MAX_ASSET_KB, kb
            )));
        }
    }

    for source in &config.ad_sources {
        Url::parse(&source.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid ad source '{}': {}", source.url, e))
        })?;
        if source.cache_days > MAX_CACHE_DAYS {
            return Err(ConfigError::Validation(format!(
                "cache-days of ad source '{}' must be <= {}, got {}",
                source.url, MAX_CACHE_DAYS, source.cache_days
            )));
        }
    }

    Ok(())
}

/// Validates a host pattern (supports a leading `*.` wildcard)
pub(crate) fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => validate_domain_string(domain),
        None => validate_domain_string(pattern),
    }
}

fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == '_')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}
