use thiserror::Error;

/// Errors raised by the generation lifecycle.
///
/// `Provider` keeps the upstream message verbatim so callers can relay it
/// to the user unchanged.
#[derive(Error, Debug)]
pub enum GenError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("a generation is already in flight")]
    Busy,
    #[error("{0}")]
    Provider(String),
    #[error("service {service} unavailable, retry in {retry_after_ms}ms")]
    CircuitOpen { service: String, retry_after_ms: u64 },
    #[error("unknown task: {0}")]
    UnknownTask(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl GenError {
    /// True for conditions the caller should treat as transient and retry
    /// later, as opposed to a hard provider failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::Busy)
    }
}

pub type Result<T> = std::result::Result<T, GenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_display_is_the_upstream_message_verbatim() {
        let err = GenError::Provider("rate limited".to_string());
        assert_eq!(err.to_string(), "rate limited");
        assert!(!err.is_transient());
    }

    #[test]
    fn circuit_open_names_the_service_and_cooldown() {
        let err = GenError::CircuitOpen {
            service: "image-generation".to_string(),
            retry_after_ms: 1500,
        };
        assert_eq!(
            err.to_string(),
            "service image-generation unavailable, retry in 1500ms"
        );
        assert!(err.is_transient());
    }
}
