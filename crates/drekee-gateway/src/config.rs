use chrono::{DateTime, Utc};
use drekee_protocol::Provider;
use serde::{Deserialize, Serialize};

pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Where one provider's chat completions are served and how to authenticate.
///
/// With no key the gateway only calls a non-default `base_url`, on the
/// assumption that it is a proxy holding the key server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl ProviderEndpoint {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub groq: ProviderEndpoint,
    pub mistral: ProviderEndpoint,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            groq: ProviderEndpoint::new(DEFAULT_GROQ_BASE_URL, None),
            mistral: ProviderEndpoint::new(DEFAULT_MISTRAL_BASE_URL, None),
        }
    }
}

/// Which providers have credentials configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub groq: bool,
    pub mistral: bool,
    pub timestamp: DateTime<Utc>,
}

impl GatewayConfig {
    /// Read `GROQ_API_KEY`, `MISTRAL_API_KEY`, `GROQ_BASE_URL` and
    /// `MISTRAL_BASE_URL` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let endpoint = |provider: Provider, base_var: &str, default_base: &str| {
            let base = lookup(base_var)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default_base.to_owned());
            ProviderEndpoint::new(base, lookup(provider.api_key_env()))
        };

        Self {
            groq: endpoint(Provider::Groq, "GROQ_BASE_URL", DEFAULT_GROQ_BASE_URL),
            mistral: endpoint(Provider::Mistral, "MISTRAL_BASE_URL", DEFAULT_MISTRAL_BASE_URL),
        }
    }

    pub fn endpoint(&self, provider: Provider) -> &ProviderEndpoint {
        match provider {
            Provider::Groq => &self.groq,
            Provider::Mistral => &self.mistral,
        }
    }

    /// Whether a call to `provider` can be attempted at all: a key is set,
    /// or the endpoint was pointed at a proxy.
    pub fn is_callable(&self, provider: Provider) -> bool {
        let endpoint = self.endpoint(provider);
        let default_base = match provider {
            Provider::Groq => DEFAULT_GROQ_BASE_URL,
            Provider::Mistral => DEFAULT_MISTRAL_BASE_URL,
        };
        endpoint.has_key() || endpoint.base_url.trim_end_matches('/') != default_base
    }

    pub fn status(&self) -> ProviderStatus {
        ProviderStatus {
            groq: self.groq.has_key(),
            mistral: self.mistral.has_key(),
            timestamp: Utc::now(),
        }
    }
}
