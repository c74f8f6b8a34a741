use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use course_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Search expression: {}", config.search.expression);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;

    // Parse TOML
    let config: Config = toml::from_str(&content)?;

    // Validate the configuration
    validate(&config)?;

    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// This is used to detect if the configuration has changed between harvest runs.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok((Config, String))` - Successfully loaded configuration and its hash
/// * `Err(ConfigError)` - Failed to load or parse the configuration
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::KeyStrategy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[run]
max-concurrent-tasks = 4
timeout-ms = 30000
retry-attempts = 3

[run.retry-backoff]
initial-delay-ms = 250
multiplier = 1.5
max-delay-ms = 4000

[search]
expression = "rust programming"
start-page = 1
end-page = 3

[catalog]
base-url = "https://www.udemy.com"
unique-key = "canonical-url"

[user-agent]
crawler-name = "CourseHarvest"
crawler-version = "0.1"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./courses.db"
export-dir = "./exports"
summary-path = "./summary.md"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.run.max_concurrent_tasks, 4);
        assert_eq!(config.run.retry_attempts, 3);
        assert_eq!(config.run.retry_backoff.initial_delay_ms, 250);
        assert!(!config.run.fetch_instructor_profiles);
        assert_eq!(config.search.expression, "rust programming");
        assert_eq!(config.search.end_page, 3);
        assert!(config.search.listing_urls.is_empty());
        assert_eq!(config.catalog.unique_key, KeyStrategy::CanonicalUrl);
        assert_eq!(config.user_agent.crawler_name, "CourseHarvest");
    }

    #[test]
    fn test_defaults_applied() {
        let config_content = r#"
[run]
max-concurrent-tasks = 2
timeout-ms = 5000
retry-attempts = 1

[search]
expression = "ChatGPT"

[catalog]
base-url = "https://www.udemy.com"

[user-agent]
crawler-name = "CourseHarvest"
crawler-version = "0.1"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./courses.db"
export-dir = "./exports"
summary-path = "./summary.md"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.search.start_page, 1);
        assert_eq!(config.search.end_page, 1);
        assert_eq!(config.catalog.unique_key, KeyStrategy::Slug);
        assert_eq!(config.run.retry_backoff.max_delay_ms, 10_000);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let config_content = "this is not valid TOML {{{";
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[run]
max-concurrent-tasks = 0
timeout-ms = 30000
retry-attempts = 3

[search]
expression = "rust"

[catalog]
base-url = "https://www.udemy.com"

[user-agent]
crawler-name = "CourseHarvest"
crawler-version = "0.1"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./courses.db"
export-dir = "./exports"
summary-path = "./summary.md"
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_unknown_key_strategy_rejected() {
        let config_content = r#"
[run]
max-concurrent-tasks = 2
timeout-ms = 5000
retry-attempts = 1

[search]
expression = "rust"

[catalog]
base-url = "https://www.udemy.com"
unique-key = "isbn"

[user-agent]
crawler-name = "CourseHarvest"
crawler-version = "0.1"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./courses.db"
export-dir = "./exports"
summary-path = "./summary.md"
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let config_content = "test content";
        let file = create_temp_config(config_content);

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        // Same content should produce same hash
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA-256 produces 64 hex characters
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
