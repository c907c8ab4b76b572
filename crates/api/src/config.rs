use std::env;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderValue;
use csf_core::HyphenPolicy;
use csf_llm::{OpenRouterConfig, DEFAULT_APP_REFERER, DEFAULT_APP_TITLE, DEFAULT_BASE_URL, DEFAULT_MODEL};
use csf_retrieval::DEFAULT_TOP_K;
use thiserror::Error;
use url::Url;

pub const API_KEY_VAR: &str = "OPENROUTER_API_KEY";

const DEFAULT_BIND: &str = "0.0.0.0:8000";
const DEFAULT_LLM_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_LLM_MAX_RETRIES: u32 = 2;
const MAX_REFERENCE_TOP_K: usize = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingCredential(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    /// Every origin is accepted; the request origin is echoed back.
    Any,
    Origins(Vec<String>),
}

/// Process configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    pub llm: OpenRouterConfig,
    pub cors: CorsPolicy,
    pub reference_root: Option<PathBuf>,
    pub reference_top_k: usize,
    pub hyphen_policy: HyphenPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = value(API_KEY_VAR).ok_or(ConfigError::MissingCredential(API_KEY_VAR))?;

        let base_url = value("CSF_LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let parsed = Url::parse(&base_url).map_err(|error| ConfigError::Invalid {
            key: "CSF_LLM_BASE_URL",
            reason: error.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                key: "CSF_LLM_BASE_URL",
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        let referer = value("CSF_APP_REFERER").unwrap_or_else(|| DEFAULT_APP_REFERER.to_string());
        Url::parse(&referer).map_err(|error| ConfigError::Invalid {
            key: "CSF_APP_REFERER",
            reason: error.to_string(),
        })?;
        let title = value("CSF_APP_TITLE").unwrap_or_else(|| DEFAULT_APP_TITLE.to_string());
        HeaderValue::from_str(&title).map_err(|_| ConfigError::Invalid {
            key: "CSF_APP_TITLE",
            reason: "not a valid header value".to_string(),
        })?;

        let timeout_seconds = parse_or(
            "CSF_LLM_TIMEOUT_SECONDS",
            value("CSF_LLM_TIMEOUT_SECONDS"),
            DEFAULT_LLM_TIMEOUT_SECONDS,
        )?;
        if timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "CSF_LLM_TIMEOUT_SECONDS",
                reason: "must be greater than zero".to_string(),
            });
        }

        let mut llm = OpenRouterConfig::new(api_key);
        llm.base_url = base_url;
        llm.model = value("CSF_LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        llm.referer = referer;
        llm.title = title;
        llm.timeout = Duration::from_secs(timeout_seconds);
        llm.max_retries = parse_or(
            "CSF_LLM_MAX_RETRIES",
            value("CSF_LLM_MAX_RETRIES"),
            DEFAULT_LLM_MAX_RETRIES,
        )?;

        let reference_top_k = parse_or(
            "CSF_REFERENCE_TOP_K",
            value("CSF_REFERENCE_TOP_K"),
            DEFAULT_TOP_K,
        )?;
        if !(1..=MAX_REFERENCE_TOP_K).contains(&reference_top_k) {
            return Err(ConfigError::Invalid {
                key: "CSF_REFERENCE_TOP_K",
                reason: format!("must be between 1 and {MAX_REFERENCE_TOP_K}"),
            });
        }

        let hyphen_policy = match value("CSF_SANITIZE_HYPHENS") {
            Some(raw) => HyphenPolicy::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                key: "CSF_SANITIZE_HYPHENS",
                reason: format!("expected strip_all or list_markers, got {raw}"),
            })?,
            None => HyphenPolicy::default(),
        };

        Ok(Self {
            bind: value("CSF_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            llm,
            cors: parse_cors_policy(value("CSF_ALLOWED_ORIGINS").as_deref())?,
            reference_root: value("CSF_REFERENCE_ROOT").map(PathBuf::from),
            reference_top_k,
            hyphen_policy,
        })
    }
}

pub fn parse_cors_policy(raw: Option<&str>) -> Result<CorsPolicy, ConfigError> {
    let Some(raw) = raw else {
        return Ok(CorsPolicy::Any);
    };

    let origins = raw
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .collect::<Vec<_>>();

    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return Ok(CorsPolicy::Any);
    }

    for origin in &origins {
        if Url::parse(origin).is_err() || HeaderValue::from_str(origin).is_err() {
            return Err(ConfigError::Invalid {
                key: "CSF_ALLOWED_ORIGINS",
                reason: format!("not a valid origin: {origin}"),
            });
        }
    }

    Ok(CorsPolicy::Origins(origins))
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::Invalid {
            key,
            reason: format!("could not parse {raw:?}"),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn missing_credential_fails_fast() {
        assert_eq!(
            config_from(&[]).unwrap_err(),
            ConfigError::MissingCredential(API_KEY_VAR)
        );
        assert_eq!(
            config_from(&[(API_KEY_VAR, "   ")]).unwrap_err(),
            ConfigError::MissingCredential(API_KEY_VAR)
        );
    }

    #[test]
    fn defaults_match_the_hosted_deployment() {
        let config = config_from(&[(API_KEY_VAR, "sk-test")]).unwrap();
        assert_eq!(config.bind, "0.0.0.0:8000");
        assert_eq!(config.llm.model, "deepseek/deepseek-chat");
        assert_eq!(config.llm.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.llm.referer, "https://nist-csf-agent.onrender.com");
        assert_eq!(config.llm.title, "NIST CSF AI Agent");
        assert_eq!(config.cors, CorsPolicy::Any);
        assert_eq!(config.reference_root, None);
        assert_eq!(config.reference_top_k, 5);
        assert_eq!(config.hyphen_policy, HyphenPolicy::StripAll);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            (API_KEY_VAR, "sk-test"),
            ("CSF_LLM_MODEL", "openai/gpt-4o-mini"),
            ("CSF_LLM_MAX_RETRIES", "0"),
            ("CSF_REFERENCE_ROOT", "reference"),
            ("CSF_REFERENCE_TOP_K", "3"),
            ("CSF_SANITIZE_HYPHENS", "list_markers"),
            ("CSF_ALLOWED_ORIGINS", "https://a.example/, https://b.example"),
        ])
        .unwrap();

        assert_eq!(config.llm.model, "openai/gpt-4o-mini");
        assert_eq!(config.llm.max_retries, 0);
        assert_eq!(config.reference_root, Some(PathBuf::from("reference")));
        assert_eq!(config.reference_top_k, 3);
        assert_eq!(config.hyphen_policy, HyphenPolicy::ListMarkersOnly);
        assert_eq!(
            config.cors,
            CorsPolicy::Origins(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
    }

    #[test]
    fn invalid_values_are_rejected_not_defaulted() {
        let bad = [
            ("CSF_LLM_TIMEOUT_SECONDS", "soon"),
            ("CSF_LLM_TIMEOUT_SECONDS", "0"),
            ("CSF_REFERENCE_TOP_K", "0"),
            ("CSF_SANITIZE_HYPHENS", "keep"),
            ("CSF_LLM_BASE_URL", "ftp://example.com"),
            ("CSF_ALLOWED_ORIGINS", "not an origin"),
        ];

        for (key, raw) in bad {
            let error = config_from(&[(API_KEY_VAR, "sk-test"), (key, raw)]).unwrap_err();
            assert!(
                matches!(error, ConfigError::Invalid { key: k, .. } if k == key),
                "{key}={raw} gave {error:?}"
            );
        }
    }

    #[test]
    fn wildcard_anywhere_means_any_origin() {
        assert_eq!(
            parse_cors_policy(Some("https://a.example,*")).unwrap(),
            CorsPolicy::Any
        );
        assert_eq!(parse_cors_policy(Some(" , ")).unwrap(), CorsPolicy::Any);
    }
}
