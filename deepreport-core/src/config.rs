//! Configuration management

use crate::error::{ErrorContext, ReportError, ReportResult};
use crate::types::{AssemblyConfig, LlmConfig, ReportConfig, SearchApi, SearchConfig};

use std::path::Path;
use tracing::debug;

/// Outline template used when no custom structure is configured
pub const DEFAULT_REPORT_STRUCTURE: &str = r#"Use this structure to create a report on the user-provided topic:

1. Introduction (no research needed)
   - Brief overview of the topic area

2. Main Body Sections:
   - Each section should focus on a sub-topic of the user-provided topic

3. Conclusion
   - Aim for 1 structural element (either a list or table) that distills the main body sections
   - Provide a concise summary of the report"#;

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            report_structure: DEFAULT_REPORT_STRUCTURE.to_string(),
            number_of_queries: 2,
            max_search_depth: 2,
            max_tokens_per_source: 1000,
            include_raw_content: true,
            max_concurrent_sections: 4,
            search: SearchConfig::default(),
            planner: LlmConfig {
                provider: "openai".to_string(),
                model: "o3-mini".to_string(),
                temperature: 0.0,
                max_tokens: None,
                api_key: None,
                base_url: None,
                request_timeout_ms: 120_000,
                azure_endpoint: None,
                deployment_name: None,
                api_version: None,
            },
            writer: LlmConfig {
                provider: "anthropic".to_string(),
                model: "claude-3-5-sonnet-latest".to_string(),
                temperature: 0.0,
                max_tokens: Some(4000),
                api_key: None,
                base_url: None,
                request_timeout_ms: 120_000,
                azure_endpoint: None,
                deployment_name: None,
                api_version: None,
            },
            assembly: AssemblyConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api: SearchApi::Tavily,
            max_results: 5,
            timeout_seconds: 30,
            retry_attempts: 2,
            max_concurrent_searches: 4,
            api_key: None,
            base_url: None,
        }
    }
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            separator: "\n\n".to_string(),
            include_headers: false,
        }
    }
}

impl ReportConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ReportResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ReportError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: ReportConfig = toml::from_str(&content).map_err(|e| ReportError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ReportResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ReportError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| ReportError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Override fields from environment variables named after them
    pub fn apply_env_overrides(&mut self) -> ReportResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override fields from an arbitrary key lookup (environment, CLI, tests)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ReportResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(value) = get("REPORT_STRUCTURE") {
            self.report_structure = value;
        }
        if let Some(value) = get("NUMBER_OF_QUERIES") {
            self.number_of_queries = parse_override("NUMBER_OF_QUERIES", &value)?;
        }
        if let Some(value) = get("MAX_SEARCH_DEPTH") {
            self.max_search_depth = parse_override("MAX_SEARCH_DEPTH", &value)?;
        }
        if let Some(value) = get("SEARCH_API") {
            self.search.api = value
                .parse()
                .map_err(|e: String| crate::config_error!(e, "config"))?;
        }
        if let Some(value) = get("PLANNER_PROVIDER") {
            self.planner.provider = value;
        }
        if let Some(value) = get("PLANNER_MODEL") {
            self.planner.model = value;
        }
        if let Some(value) = get("WRITER_PROVIDER") {
            self.writer.provider = value;
        }
        if let Some(value) = get("WRITER_MODEL") {
            self.writer.model = value;
        }

        debug!(
            search_api = %self.search.api,
            number_of_queries = self.number_of_queries,
            max_search_depth = self.max_search_depth,
            "Applied configuration overrides"
        );

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ReportResult<()> {
        let checks: [(bool, &str, &str); 6] = [
            (
                self.report_structure.trim().is_empty(),
                "report_structure must not be empty",
                "Set report_structure or remove it to use the default",
            ),
            (
                self.number_of_queries == 0,
                "number_of_queries must be at least 1",
                "Set number_of_queries to a positive value",
            ),
            (
                self.max_search_depth == 0,
                "max_search_depth must be at least 1",
                "Set max_search_depth to a positive value",
            ),
            (
                self.max_tokens_per_source == 0,
                "max_tokens_per_source must be greater than 0",
                "Set max_tokens_per_source to a positive value",
            ),
            (
                self.max_concurrent_sections == 0,
                "max_concurrent_sections must be at least 1",
                "Set max_concurrent_sections to a positive value",
            ),
            (
                self.search.max_concurrent_searches == 0 || self.search.retry_attempts == 0,
                "search.max_concurrent_searches and search.retry_attempts must be at least 1",
                "Set both search limits to positive values",
            ),
        ];

        for (failed, message, suggestion) in checks {
            if failed {
                return Err(ReportError::Config {
                    message: message.to_string(),
                    source: None,
                    context: ErrorContext::new("config")
                        .with_operation("validate")
                        .with_suggestion(suggestion),
                });
            }
        }

        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> ReportResult<T> {
    value.parse().map_err(|_| ReportError::Config {
        message: format!("Invalid value for {}: {}", key, value),
        source: None,
        context: ErrorContext::new("config")
            .with_operation("apply_overrides")
            .with_metadata("key", key),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = ReportConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.number_of_queries, 2);
        assert_eq!(config.max_search_depth, 2);
        assert_eq!(config.search.api, SearchApi::Tavily);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let mut config = ReportConfig::default();
        config.max_search_depth = 0;
        assert!(matches!(config.validate(), Err(ReportError::Config { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("NUMBER_OF_QUERIES", "3"),
            ("MAX_SEARCH_DEPTH", "5"),
            ("SEARCH_API", "perplexity"),
            ("WRITER_MODEL", "gpt-4o"),
            ("PLANNER_MODEL", ""),
        ]
        .into_iter()
        .collect();

        let mut config = ReportConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.number_of_queries, 3);
        assert_eq!(config.max_search_depth, 5);
        assert_eq!(config.search.api, SearchApi::Perplexity);
        assert_eq!(config.writer.model, "gpt-4o");
        // Empty values are ignored
        assert_eq!(config.planner.model, "o3-mini");
    }

    #[test]
    fn test_invalid_override() {
        let mut config = ReportConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "MAX_SEARCH_DEPTH").then(|| "deep".to_string())
        });
        assert!(result.is_err());
    }
}
