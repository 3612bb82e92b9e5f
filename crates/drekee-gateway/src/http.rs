use async_trait::async_trait;
use drekee_protocol::{
    CallOptions, GatewayError, ModelGateway, ModelTarget, PromptMessage, Provider,
};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::GatewayConfig;
use crate::normalize::extract_content;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

/// Gateway posting to `{base_url}/chat/completions` of each provider.
#[derive(Debug, Clone)]
pub struct HttpModelGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl HttpModelGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Map a non-success response to the gateway error taxonomy.
pub fn classify_failure(provider: Provider, status: u16, body: String) -> GatewayError {
    match status {
        401 => GatewayError::InvalidCredentials { provider },
        500 if body.contains("not configured") => GatewayError::MissingCredentials { provider },
        _ => GatewayError::Http { status, body },
    }
}

#[async_trait]
impl ModelGateway for HttpModelGateway {
    #[instrument(
        skip_all,
        fields(provider = %target.provider, model = %target.model, messages = messages.len())
    )]
    async fn call(
        &self,
        target: &ModelTarget,
        messages: &[PromptMessage],
        options: &CallOptions,
    ) -> Result<String, GatewayError> {
        let provider = target.provider;
        if !self.config.is_callable(provider) {
            return Err(GatewayError::MissingCredentials { provider });
        }

        let endpoint = self.config.endpoint(provider);
        let body = CompletionRequest {
            model: &target.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
            stream: false,
        };

        let mut request = self.client.post(endpoint.completions_url()).json(&body);
        if let Some(key) = &endpoint.api_key {
            let header = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| GatewayError::InvalidCredentials { provider })?;
            request = request.header(AUTHORIZATION, header);
        }

        debug!(max_tokens = options.max_tokens, "sending completion request");
        let response = request
            .send()
            .await
            .map_err(|error| GatewayError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "model gateway call failed");
            return Err(classify_failure(provider, status.as_u16(), body_text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|error| GatewayError::UnexpectedPayload(error.to_string()))?;
        let content = extract_content(&payload)?;
        debug!(chars = content.chars().count(), "completion received");
        Ok(content)
    }
}
