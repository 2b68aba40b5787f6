use std::time::Duration;

/// Failure reported by a device or notification collaborator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("Authentication rejected: {0}")]
    Authentication(String),

    #[error("Permanent failure: {0}")]
    Permanent(String),
}

impl GatewayError {
    /// Transient, rate-limit and timeout failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Transient(_) | GatewayError::RateLimited(_) | GatewayError::Timeout(_)
        )
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, GatewayError::Authentication(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Transient(_) => "transient",
            GatewayError::RateLimited(_) => "rate_limited",
            GatewayError::Timeout(_) => "timeout",
            GatewayError::Authentication(_) => "authentication",
            GatewayError::Permanent(_) => "permanent",
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() || error.is_request() {
            return GatewayError::Transient(error.to_string());
        }

        match error.status() {
            Some(status) => GatewayError::from_status(status.as_u16(), error.to_string()),
            None => GatewayError::Transient(error.to_string()),
        }
    }
}

impl GatewayError {
    /// Maps an HTTP status from a vendor API onto the retry taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => GatewayError::Authentication(message),
            408 => GatewayError::Transient(message),
            429 => GatewayError::RateLimited(message),
            500..=599 => GatewayError::Transient(message),
            _ => GatewayError::Permanent(message),
        }
    }
}
