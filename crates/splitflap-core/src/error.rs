use thiserror::Error;

/// Root error type for the orchestration core.
///
/// Variants map onto the error taxonomy in the design spec: each one is
/// tagged as retryable or terminal by the call sites that inspect it
/// (`RetryEngine::should_retry`, `ContentSelector`), not by the type
/// itself — the same `Transient` failure is retryable inside the retry
/// engine but terminal once it escapes the orchestrator.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("rate limited by provider '{provider}'")]
    RateLimit {
        provider: String,
        retry_after_ms: Option<u64>,
    },

    #[error("authentication failed for provider '{provider}'")]
    Authentication { provider: String },

    #[error("invalid request to provider '{provider}': {message}")]
    InvalidRequest { provider: String, message: String },

    #[error("provider '{provider}' overloaded")]
    Overloaded { provider: String },

    #[error("transient failure calling '{provider}': {message}")]
    Transient { provider: String, message: String },

    #[error("generated content failed validation: {message}")]
    ValidationFailed { message: String },

    #[error("circuit '{circuit_id}' is open")]
    CircuitOpen { circuit_id: String },

    #[error("no alternate provider available for tier '{tier}'")]
    NoAlternate { tier: String },

    #[error("persistence store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("automation bus disconnected")]
    BusDisconnected,

    #[error("generator '{generator_id}' failed: {message}")]
    Generator {
        generator_id: String,
        message: String,
    },

    #[error("frame decoration failed: {message}")]
    Decoration { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CoreError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn generator(generator_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generator {
            generator_id: generator_id.into(),
            message: message.into(),
        }
    }

    /// Provider name this error is attributed to, if any — used by the
    /// retry engine and orchestrator to know which provider circuit to
    /// record success/failure against.
    pub fn provider_name(&self) -> Option<&str> {
        match self {
            Self::RateLimit { provider, .. }
            | Self::Authentication { provider }
            | Self::InvalidRequest { provider, .. }
            | Self::Overloaded { provider }
            | Self::Transient { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// True for failures the retry engine should retry (spec §7):
    /// rate limit, overload, transient network, validation failure.
    /// False for terminal failures that should escalate immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit { .. }
                | Self::Overloaded { .. }
                | Self::Transient { .. }
                | Self::ValidationFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification_matches_taxonomy() {
        assert!(
            CoreError::RateLimit {
                provider: "openai".into(),
                retry_after_ms: None,
            }
            .is_retryable()
        );
        assert!(
            CoreError::ValidationFailed {
                message: "too long".into(),
            }
            .is_retryable()
        );
        assert!(
            !CoreError::Authentication {
                provider: "openai".into(),
            }
            .is_retryable()
        );
        assert!(
            !CoreError::InvalidRequest {
                provider: "openai".into(),
                message: "bad schema".into(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn provider_name_extracted_from_attributed_errors() {
        let err = CoreError::Overloaded {
            provider: "anthropic".into(),
        };
        assert_eq!(err.provider_name(), Some("anthropic"));
        assert_eq!(CoreError::BusDisconnected.provider_name(), None);
    }
}
