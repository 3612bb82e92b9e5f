//! [`ModelGateway`](drekee_protocol::ModelGateway) over OpenAI-compatible
//! chat completion endpoints.

pub mod config;
pub mod http;
pub mod normalize;

pub use config::{
    DEFAULT_GROQ_BASE_URL, DEFAULT_MISTRAL_BASE_URL, GatewayConfig, ProviderEndpoint,
    ProviderStatus,
};
pub use http::{HttpModelGateway, classify_failure};
pub use normalize::extract_content;
