use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// The file only carries tunables; the forum URL and backup folder usually come from the
/// command line and are applied with [`apply_overrides`] before validation.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use forum_mirror::config::load_config;
///
/// let config = load_config(Path::new("settings.toml")).unwrap();
/// println!("Workers: {}", config.crawler.workers);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so two runs over the same backup folder can be told apart.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Applies the command-line forum URL and backup folder, then validates the result
pub fn apply_overrides(
    mut config: Config,
    base_url: &str,
    backup_root: &Path,
) -> Result<Config, ConfigError> {
    config.site.base_url = base_url.trim_end_matches('/').to_string();
    config.site.backup_root = backup_root.to_path_buf();
    validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_partial_config_keeps_defaults() {
        let file = create_temp_config(
            r#"
[crawler]
workers = 8

[throttle]
base-delay = 1.5

[filters]
ignored-prefixes = ["/login", "/search"]
blacklist-params = ["sid"]

[paths.folder-mapping]
f = "categorias"
"#,
        );

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.workers, 8);
        assert_eq!(config.crawler.retry_limit, 3);
        assert_eq!(config.throttle.base_delay, 1.5);
        assert_eq!(config.throttle.max_delay, 10.0);
        assert_eq!(config.scheduler.max_idle_polls, 15);
        assert_eq!(config.filters.ignored_prefixes.len(), 2);
        assert_eq!(
            config.paths.folder_mapping.get("f").map(String::as_str),
            Some("categorias")
        );
    }

    #[test]
    fn test_load_ad_sources() {
        let file = create_temp_config(
            r#"
[assets]
max-asset-kb = 512
ad-hosts = ["ads.example.net", "*.doubleclick.net"]

[[assets.ad-sources]]
url = "https://hosts.example.org/hosts.txt"
"#,
        );

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.assets.max_asset_bytes(), Some(512 * 1024));
        assert_eq!(config.assets.ad_sources.len(), 1);
        assert_eq!(config.assets.ad_sources[0].cache_days, 7);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/settings.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_apply_overrides_validates() {
        let config = Config::default();
        let result = apply_overrides(config, "not a url", Path::new("/tmp/mirror"));
        assert!(result.is_err());

        let config = apply_overrides(
            Config::default(),
            "https://forum.example.com/",
            Path::new("/tmp/mirror"),
        )
        .unwrap();
        assert_eq!(config.site.base_url, "https://forum.example.com");
    }

    #[test]
    fn test_compute_config_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        assert_eq!(hash1, compute_config_hash(file1.path()).unwrap());
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, compute_config_hash(file2.path()).unwrap());
    }
}
