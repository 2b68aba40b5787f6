use super::GatewayError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RetryError {
    #[error("Gave up after {attempts} attempts: {error}")]
    Exhausted { attempts: u32, error: GatewayError },

    #[error("Not retried after attempt {attempts}: {error}")]
    NotRetryable { attempts: u32, error: GatewayError },

    #[error("Cancelled by shutdown after {attempts} attempts")]
    Cancelled {
        attempts: u32,
        error: Option<GatewayError>,
    },
}

impl RetryError {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. }
            | RetryError::NotRetryable { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// The last failure the operation itself reported, if any.
    pub fn last_error(&self) -> Option<&GatewayError> {
        match self {
            RetryError::Exhausted { error, .. } | RetryError::NotRetryable { error, .. } => {
                Some(error)
            }
            RetryError::Cancelled { error, .. } => error.as_ref(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    pub fn is_authentication(&self) -> bool {
        self.last_error().is_some_and(GatewayError::is_authentication)
    }
}
