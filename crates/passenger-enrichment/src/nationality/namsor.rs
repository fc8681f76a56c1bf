//! HTTP provider backed by the NamSor country-of-origin API.

use super::{NationalityProvider, normalize_country_code};
use crate::error::{EnrichmentError, LookupError, Result};
use reqwest::Url;
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "NAMSOR_API_KEY";

const DEFAULT_BASE_URL: &str = "https://v2.namsor.com/NamSorAPIv2/api2/json/country";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_USER_AGENT: &str = concat!("passenger-enrichment/", env!("CARGO_PKG_VERSION"));

/// Where the surname goes in the request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurnamePlacement {
    /// `GET {base_url}/{surname}`, the shape of the NamSor `country` endpoint.
    #[default]
    PathSegment,
    /// `GET {base_url}?surname={surname}`, for proxies and compatible services.
    Query,
}

/// Configuration for [`NamsorProvider`].
#[derive(Debug, Clone)]
pub struct NamsorConfig {
    /// Endpoint the surname is appended to, see [`SurnamePlacement`].
    pub base_url: String,
    pub surname_placement: SurnamePlacement,
    /// Request timeout in seconds. A timeout counts as a failed lookup.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for NamsorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            surname_placement: SurnamePlacement::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl NamsorConfig {
    /// Create a new configuration builder.
    pub fn builder() -> NamsorConfigBuilder {
        NamsorConfigBuilder::default()
    }
}

/// Builder for [`NamsorConfig`].
#[derive(Default)]
pub struct NamsorConfigBuilder {
    base_url: Option<String>,
    surname_placement: Option<SurnamePlacement>,
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
}

impl NamsorConfigBuilder {
    /// Set a custom base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn surname_placement(mut self, placement: SurnamePlacement) -> Self {
        self.surname_placement = Some(placement);
        self
    }

    /// Set the request timeout in seconds.
    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> NamsorConfig {
        NamsorConfig {
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            surname_placement: self.surname_placement.unwrap_or_default(),
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        }
    }
}

/// Nationality provider calling the NamSor API, one request per surname.
///
/// # Example
///
/// ```rust,ignore
/// use passenger_enrichment::nationality::{NamsorConfig, NamsorProvider};
///
/// let config = NamsorConfig::builder().timeout_secs(5).build();
/// let provider = NamsorProvider::with_config(api_key, config)?;
/// ```
pub struct NamsorProvider {
    api_key: String,
    config: NamsorConfig,
    base_url: Url,
    client: Client,
}

impl NamsorProvider {
    /// Create a provider with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(api_key, NamsorConfig::default())
    }

    /// Create a provider with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, the base URL cannot carry a
    /// path, or the HTTP client cannot be created.
    pub fn with_config(api_key: impl Into<String>, config: NamsorConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(EnrichmentError::InvalidConfig(format!(
                "{} must not be empty",
                API_KEY_ENV
            )));
        }

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| {
                EnrichmentError::InvalidConfig(format!("base URL '{}': {}", config.base_url, e))
            })?;
        if base_url.cannot_be_a_base() {
            return Err(EnrichmentError::InvalidConfig(format!(
                "base URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            api_key,
            config,
            base_url,
            client,
        })
    }

    /// Create a provider reading the key from [`API_KEY_ENV`].
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_config(NamsorConfig::default())
    }

    /// Same as [`NamsorProvider::from_env`] with custom configuration.
    pub fn from_env_with_config(config: NamsorConfig) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            EnrichmentError::InvalidConfig(format!("{} environment variable not set", API_KEY_ENV))
        })?;
        Self::with_config(api_key, config)
    }

    pub fn config(&self) -> &NamsorConfig {
        &self.config
    }

    /// URL requested for `surname`, percent-encoded.
    pub fn request_url(&self, surname: &str) -> Url {
        let mut url = self.base_url.clone();
        match self.config.surname_placement {
            SurnamePlacement::PathSegment => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().push(surname);
                }
            }
            SurnamePlacement::Query => {
                url.query_pairs_mut().append_pair("surname", surname);
            }
        }
        url
    }
}

impl NationalityProvider for NamsorProvider {
    fn lookup(&self, surname: &str) -> std::result::Result<Option<String>, LookupError> {
        debug!("Requesting country for surname '{}'", surname);

        let response = self
            .client
            .get(self.request_url(surname))
            .header("X-API-KEY", &self.api_key)
            .header("Accept", "application/json")
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(LookupError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_country(&body)
    }

    fn name(&self) -> &str {
        "NamSor"
    }
}

/// Extract the country from a response body.
///
/// A missing `country` field is a failure; an explicit `null` or empty
/// string means the service could not place the name.
pub fn parse_country(body: &str) -> std::result::Result<Option<String>, LookupError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| LookupError::Malformed(e.to_string()))?;

    let object = value
        .as_object()
        .ok_or_else(|| LookupError::Malformed("expected a JSON object".to_string()))?;

    match object.get("country") {
        None => Err(LookupError::MissingCountry),
        Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => normalize_country_code(s)
            .map(Some)
            .ok_or_else(|| LookupError::Malformed(format!("invalid country code '{}'", s))),
        Some(other) => Err(LookupError::Malformed(format!(
            "unexpected country value {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_country_success() {
        let body = r#"{"id":"x","name":"Braund","country":"gb","countryAlt":"IE"}"#;
        assert_eq!(parse_country(body).unwrap().as_deref(), Some("GB"));
    }

    #[test]
    fn test_parse_country_missing_field() {
        let err = parse_country(r#"{"name":"Braund"}"#).unwrap_err();
        assert!(matches!(err, LookupError::MissingCountry));
    }

    #[test]
    fn test_parse_country_null_is_unmatched() {
        assert_eq!(parse_country(r#"{"country":null}"#).unwrap(), None);
        assert_eq!(parse_country(r#"{"country":""}"#).unwrap(), None);
    }

    #[test]
    fn test_parse_country_malformed() {
        assert!(matches!(
            parse_country("<html>").unwrap_err(),
            LookupError::Malformed(_)
        ));
        assert!(matches!(
            parse_country(r#"["GB"]"#).unwrap_err(),
            LookupError::Malformed(_)
        ));
        assert!(matches!(
            parse_country(r#"{"country":"Great Britain"}"#).unwrap_err(),
            LookupError::Malformed(_)
        ));
        assert!(matches!(
            parse_country(r#"{"country":44}"#).unwrap_err(),
            LookupError::Malformed(_)
        ));
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = NamsorConfig::builder().build();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.surname_placement, SurnamePlacement::PathSegment);
    }

    #[test]
    fn test_config_builder_custom_values() {
        let config = NamsorConfig::builder()
            .base_url("http://localhost:9999/country")
            .timeout_secs(2)
            .user_agent("tests")
            .build();

        assert_eq!(config.base_url, "http://localhost:9999/country");
        assert_eq!(config.timeout_secs, 2);
        assert_eq!(config.user_agent, "tests");
    }

    #[test]
    fn test_request_url_path_segment_by_default() {
        let provider = NamsorProvider::new("test-key").unwrap();
        assert_eq!(
            provider.request_url("Braund").as_str(),
            "https://v2.namsor.com/NamSorAPIv2/api2/json/country/Braund"
        );
        assert_eq!(
            provider.request_url("Vander Planke").as_str(),
            "https://v2.namsor.com/NamSorAPIv2/api2/json/country/Vander%20Planke"
        );
    }

    #[test]
    fn test_request_url_trailing_slash_and_reserved_chars() {
        let config = NamsorConfig::builder()
            .base_url("http://localhost:9999/country/")
            .build();
        let provider = NamsorProvider::with_config("test-key", config).unwrap();
        assert_eq!(
            provider.request_url("O/Brien?").as_str(),
            "http://localhost:9999/country/O%2FBrien%3F"
        );
    }

    #[test]
    fn test_request_url_query_placement() {
        let config = NamsorConfig::builder()
            .base_url("http://localhost:9999/lookup")
            .surname_placement(SurnamePlacement::Query)
            .build();
        let provider = NamsorProvider::with_config("test-key", config).unwrap();
        assert_eq!(
            provider.request_url("Vander Planke").as_str(),
            "http://localhost:9999/lookup?surname=Vander+Planke"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = NamsorConfig::builder().base_url("not a url").build();
        let err = NamsorProvider::with_config("test-key", config).err().unwrap();
        assert_eq!(err.error_code(), "INVALID_CONFIG");

        let config = NamsorConfig::builder().base_url("mailto:x@example.com").build();
        assert!(NamsorProvider::with_config("test-key", config).is_err());
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let err = NamsorProvider::new("  ").err().unwrap();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_provider_name() {
        let provider = NamsorProvider::new("test-key").unwrap();
        assert_eq!(provider.name(), "NamSor");
    }

    #[test]
    fn test_unreachable_service_is_lookup_failure() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let config = NamsorConfig::builder()
            .base_url("http://127.0.0.1:9/country")
            .timeout_secs(2)
            .build();
        let provider = NamsorProvider::with_config("test-key", config).unwrap();

        let err = provider.lookup("Braund").unwrap_err();
        assert!(matches!(
            err,
            LookupError::Transport(_) | LookupError::Timeout
        ));
    }
}
