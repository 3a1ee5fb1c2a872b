use crate::config::types::{
    Config, CrawlerConfig, ExtractionConfig, FetchConfig, OutputConfig, RetryConfig,
    UniversityEntry,
};
use crate::url::same_registrable_domain;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_fetch_config(&config.fetch)?;
    validate_extraction_config(&config.extraction)?;
    validate_output_config(&config.output)?;
    validate_universities(&config.universities)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.link_budget_per_seed > 1000 {
        return Err(ConfigError::Validation(format!(
            "link-budget-per-seed must be <= 1000, got {}",
            config.link_budget_per_seed
        )));
    }

    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min-delay-ms ({}) cannot exceed max-delay-ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    if !config.delay_factor.is_finite() || config.delay_factor < 0.0 {
        return Err(ConfigError::Validation(format!(
            "delay-factor must be a non-negative number, got {}",
            config.delay_factor
        )));
    }

    Ok(())
}

/// Validates fetch retry policy
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    validate_attempts("retry.max-attempts", config.max_attempts)?;

    if config.backoff_base_ms > config.backoff_cap_ms {
        return Err(ConfigError::Validation(format!(
            "retry.backoff-base-ms ({}) cannot exceed retry.backoff-cap-ms ({})",
            config.backoff_base_ms, config.backoff_cap_ms
        )));
    }

    Ok(())
}

/// Validates HTTP fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 || config.timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be between 1 and 300, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

/// Validates LLM extraction configuration
fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    let endpoint = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid extraction endpoint: {}", e)))?;

    if endpoint.scheme() != "https" && endpoint.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "Extraction endpoint '{}' must use http or https",
            config.endpoint
        )));
    }

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation("model cannot be empty".to_string()));
    }

    if config.api_key_env.trim().is_empty() {
        return Err(ConfigError::Validation(
            "api-key-env cannot be empty".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(ConfigError::Validation(format!(
            "temperature must be between 0.0 and 2.0, got {}",
            config.temperature
        )));
    }

    if config.max_tokens < 1 {
        return Err(ConfigError::Validation(
            "max-tokens must be >= 1".to_string(),
        ));
    }

    if config.max_input_chars < 100 {
        return Err(ConfigError::Validation(format!(
            "max-input-chars must be >= 100, got {}",
            config.max_input_chars
        )));
    }

    validate_attempts("extraction.max-attempts", config.max_attempts)?;

    if config.backoff_base_ms > config.backoff_cap_ms {
        return Err(ConfigError::Validation(format!(
            "extraction.backoff-base-ms ({}) cannot exceed extraction.backoff-cap-ms ({})",
            config.backoff_base_ms, config.backoff_cap_ms
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.artifacts_dir.is_empty() {
        return Err(ConfigError::Validation(
            "artifacts-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the university entries
fn validate_universities(entries: &[UniversityEntry]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    let mut agents = HashSet::new();

    for entry in entries {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "University name cannot be empty".to_string(),
            ));
        }

        if !names.insert(entry.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "University '{}' is listed more than once",
                entry.name
            )));
        }

        validate_agent_name(&entry.agent)?;
        if !agents.insert(entry.agent.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Agent '{}' is used by more than one university",
                entry.agent
            )));
        }

        validate_domain_string(&entry.domain)?;

        if entry.seeds.is_empty() {
            return Err(ConfigError::Validation(format!(
                "University '{}' must have at least one seed URL",
                entry.name
            )));
        }

        for seed in &entry.seeds {
            let url = Url::parse(seed).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e))
            })?;

            if url.scheme() != "https" && url.scheme() != "http" {
                return Err(ConfigError::InvalidUrl(format!(
                    "Seed URL '{}' must use http or https",
                    seed
                )));
            }

            let host = url.host_str().unwrap_or_default();
            if !same_registrable_domain(host, &entry.domain) {
                return Err(ConfigError::Validation(format!(
                    "Seed URL '{}' is outside the domain '{}'",
                    seed, entry.domain
                )));
            }
        }

        if entry.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "University '{}' has an empty keyword",
                entry.name
            )));
        }
    }

    Ok(())
}

fn validate_attempts(field: &str, attempts: u32) -> Result<(), ConfigError> {
    if attempts < 1 || attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and 10, got {}",
            field, attempts
        )));
    }
    Ok(())
}

/// Agent names become directory names, so they are restricted to a safe alphabet
fn validate_agent_name(agent: &str) -> Result<(), ConfigError> {
    if agent.is_empty() {
        return Err(ConfigError::Validation(
            "agent cannot be empty".to_string(),
        ));
    }

    if !agent
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "agent must contain only ASCII letters, digits, '-' and '_', got '{}'",
            agent
        )));
    }

    Ok(())
}

/// Validates a domain string
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidDomain(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') && domain != "localhost" {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' must contain at least one dot (e.g., 'nust.edu.pk')",
            domain
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn university(name: &str, agent: &str, domain: &str, seeds: &[&str]) -> UniversityEntry {
        UniversityEntry {
            name: name.to_string(),
            agent: agent.to_string(),
            domain: domain.to_string(),
            seeds: seeds.iter().map(|s| s.to_string()).collect(),
            keywords: Vec::new(),
        }
    }

    #[test]
    fn test_validate_domain_string() {
        assert!(validate_domain_string("nust.edu.pk").is_ok());
        assert!(validate_domain_string("iqra.edu.pk").is_ok());
        assert!(validate_domain_string("127.0.0.1").is_ok());
        assert!(validate_domain_string("localhost").is_ok());

        assert!(validate_domain_string("").is_err());
        assert!(validate_domain_string("example").is_err());
        assert!(validate_domain_string(".example.edu").is_err());
        assert!(validate_domain_string("example.edu.").is_err());
        assert!(validate_domain_string("exa mple.edu").is_err());
    }

    #[test]
    fn test_validate_agent_name() {
        assert!(validate_agent_name("nust_agent").is_ok());
        assert!(validate_agent_name("zu-agent-2").is_ok());

        assert!(validate_agent_name("").is_err());
        assert!(validate_agent_name("../escape").is_err());
        assert!(validate_agent_name("with space").is_err());
    }

    #[test]
    fn test_seed_on_subdomain_accepted() {
        let entries = vec![university(
            "NUST",
            "nust_agent",
            "nust.edu.pk",
            &["https://ugadmissions.nust.edu.pk/"],
        )];
        assert!(validate_universities(&entries).is_ok());
    }

    #[test]
    fn test_seed_outside_domain_rejected() {
        let entries = vec![university(
            "NUST",
            "nust_agent",
            "nust.edu.pk",
            &["https://zu.edu.pk/admissions"],
        )];
        assert!(matches!(
            validate_universities(&entries),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_university_without_seeds_rejected() {
        let entries = vec![university("NUST", "nust_agent", "nust.edu.pk", &[])];
        assert!(validate_universities(&entries).is_err());
    }

    #[test]
    fn test_duplicate_agent_rejected() {
        let entries = vec![
            university("NUST", "agent", "nust.edu.pk", &["https://nust.edu.pk/"]),
            university("Ziauddin", "agent", "zu.edu.pk", &["https://zu.edu.pk/"]),
        ];
        assert!(validate_universities(&entries).is_err());
    }

    #[test]
    fn test_non_http_seed_rejected() {
        let entries = vec![university(
            "NUST",
            "nust_agent",
            "nust.edu.pk",
            &["ftp://nust.edu.pk/programs"],
        )];
        assert!(matches!(
            validate_universities(&entries),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_attempt_bounds() {
        assert!(validate_attempts("retry.max-attempts", 1).is_ok());
        assert!(validate_attempts("retry.max-attempts", 10).is_ok());
        assert!(validate_attempts("retry.max-attempts", 0).is_err());
        assert!(validate_attempts("retry.max-attempts", 11).is_err());
    }
}
