use std::str::FromStr;

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::backend::DEMO_KEY;
use crate::cache::DEFAULT_TTL_SECS;
use crate::retry::DEFAULT_MAX_RETRIES;

/// Service configuration loaded from environment variables (and `.env`).
///
/// | Env Var               | Default                    |
/// |-----------------------|----------------------------|
/// | `PORT`                | `8080`                     |
/// | `GENERATION_API_BASE` | `http://localhost:9000/v1` |
/// | `GENERATION_API_KEY`  | `DEMO_KEY`                 |
/// | `CACHE_TTL_SECS`      | `86400`                    |
/// | `MAX_RETRIES`         | `2`                        |
/// | `CORS_ORIGINS`        | `*`                        |
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub backend_url: String,
    pub api_key: String,
    pub cache_ttl_secs: u64,
    pub max_retries: u32,
    pub cors_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            backend_url: "http://localhost:9000/v1".into(),
            api_key: DEMO_KEY.into(),
            cache_ttl_secs: DEFAULT_TTL_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            cors_origins: vec!["*".into()],
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unparseable numbers keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parse_or("PORT", lookup("PORT"), defaults.port),
            backend_url: lookup("GENERATION_API_BASE").unwrap_or(defaults.backend_url),
            api_key: lookup("GENERATION_API_KEY").unwrap_or(defaults.api_key),
            cache_ttl_secs: parse_or("CACHE_TTL_SECS", lookup("CACHE_TTL_SECS"), defaults.cache_ttl_secs),
            max_retries: parse_or("MAX_RETRIES", lookup("MAX_RETRIES"), defaults.max_retries),
            cors_origins: lookup("CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
        }
    }

    /// The API key with everything past the first four characters masked.
    pub fn masked_api_key(&self) -> String {
        let head: String = self.api_key.chars().take(4).collect();
        format!("{head}***")
    }

    pub fn cors_layer(&self) -> CorsLayer {
        let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
        if self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*") {
            return base.allow_origin(Any);
        }
        let origins: Vec<HeaderValue> = self
            .cors_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        base.allow_origin(AllowOrigin::list(origins))
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %value, "Ignoring unparseable setting, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let c = config(&[]);
        assert_eq!(c.port, 8080);
        assert_eq!(c.api_key, DEMO_KEY);
        assert_eq!(c.cache_ttl_secs, 86_400);
        assert_eq!(c.max_retries, 2);
        assert_eq!(c.cors_origins, vec!["*".to_string()]);
    }

    #[test]
    fn reads_overrides() {
        let c = config(&[
            ("PORT", "3001"),
            ("GENERATION_API_KEY", "sk-live-123"),
            ("MAX_RETRIES", "4"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
        ]);
        assert_eq!(c.port, 3001);
        assert_eq!(c.max_retries, 4);
        assert_eq!(c.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(c.masked_api_key(), "sk-l***");
    }

    #[test]
    fn bad_numbers_fall_back() {
        let c = config(&[("PORT", "eighty"), ("CACHE_TTL_SECS", "-1")]);
        assert_eq!(c.port, 8080);
        assert_eq!(c.cache_ttl_secs, 86_400);
    }
}
