//! Error types for the Drekee chat pipeline.

use thiserror::Error;

use crate::model::Provider;

/// Failures reported by a model gateway call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{provider} credentials are not configured")]
    MissingCredentials { provider: Provider },
    #[error("{provider} rejected the configured credentials")]
    InvalidCredentials { provider: Provider },
    #[error("gateway returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected gateway payload: {0}")]
    UnexpectedPayload(String),
}

impl GatewayError {
    /// Whether the failure is a configuration problem rather than a transient one.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials { .. } | Self::InvalidCredentials { .. }
        )
    }
}

/// Errors surfaced by the chat pipeline and its stores.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    /// The user cancelled the in-flight send. Not a failure.
    #[error("generation aborted")]
    Aborted,
    #[error("a generation is already in progress")]
    Busy,
    #[error("attached files are empty: {}", .0.join(", "))]
    EmptyAttachments(Vec<String>),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("chat not found: {0}")]
    ChatNotFound(String),
    #[error("no active chat")]
    NoActiveChat,
}

impl ChatError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Gateway(error) if error.is_configuration())
    }

    /// Human-readable text for the UI boundary.
    pub fn user_message(&self) -> String {
        match self {
            Self::Aborted => "Geração interrompida pelo usuário.".to_owned(),
            Self::Busy => "Aguarde a resposta atual terminar.".to_owned(),
            Self::EmptyAttachments(names) => format!(
                "Alguns arquivos anexados estão vazios ou não foram salvos corretamente: {}. \
                 Por favor, verifique os arquivos.",
                names.join(", ")
            ),
            Self::Gateway(GatewayError::MissingCredentials { provider }) => format!(
                "A chave de API {} não está configurada. Defina {} e tente novamente.",
                provider,
                provider.api_key_env()
            ),
            Self::Gateway(GatewayError::InvalidCredentials { provider }) => format!(
                "Chave de API inválida para {}: verifique {}.",
                provider,
                provider.api_key_env()
            ),
            Self::Gateway(error) => format!(
                "Desculpe, ocorreu um erro ao processar sua mensagem. {error}"
            ),
            other => format!("Desculpe, ocorreu um erro interno. {other}"),
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Convenience result type for pipeline operations.
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_distinguished_from_transient_ones() {
        let missing: ChatError = GatewayError::MissingCredentials {
            provider: Provider::Groq,
        }
        .into();
        let transient: ChatError = GatewayError::Http {
            status: 503,
            body: "overloaded".to_owned(),
        }
        .into();

        assert!(missing.is_configuration());
        assert!(missing.user_message().contains("GROQ_API_KEY"));
        assert!(!transient.is_configuration());
        assert!(transient.user_message().contains("503"));
    }

    #[test]
    fn aborted_is_a_sentinel() {
        assert!(ChatError::Aborted.is_aborted());
        assert!(!ChatError::Busy.is_aborted());
    }

    #[test]
    fn empty_attachments_lists_names() {
        let error = ChatError::EmptyAttachments(vec!["a.txt".to_owned(), "b.rs".to_owned()]);
        assert_eq!(error.to_string(), "attached files are empty: a.txt, b.rs");
    }
}
