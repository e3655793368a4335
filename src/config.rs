//! Environment configuration.
//!
//! Credentials are read once at process start. Absence is not a startup
//! failure; adapters fail lazily with a missing-credentials error on first
//! use.

use std::env;
use std::path::PathBuf;

/// Environment variable for the SerpAPI key.
pub const SERP_API_KEY_VAR: &str = "SERP_API_KEY";
/// Environment variable for the NewsAPI key.
pub const NEWS_API_KEY_VAR: &str = "NEWS_API_KEY";

/// API credentials for the external data sources.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// SerpAPI key for web search.
    pub serp_api_key: Option<String>,
    /// NewsAPI key for news lookup.
    pub news_api_key: Option<String>,
}

impl Credentials {
    /// Reads credentials from the process environment. Blank values count
    /// as absent.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            serp_api_key: non_blank(env::var(SERP_API_KEY_VAR).ok()),
            news_api_key: non_blank(env::var(NEWS_API_KEY_VAR).ok()),
        }
    }
}

/// Runtime settings for where the pipeline keeps its artifacts.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory for report documents and feedback ledgers.
    pub reports_dir: PathBuf,
    /// Directory for fallback artifacts.
    pub data_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from("reports"),
            data_dir: PathBuf::from("data"),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values_count_as_absent() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(Some(String::new())), None);
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("key".to_string())), Some("key".to_string()));
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.reports_dir, PathBuf::from("reports"));
        assert_eq!(settings.data_dir, PathBuf::from("data"));
    }
}
