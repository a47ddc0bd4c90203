use std::fmt;

/// Error type for AI provider operations
#[derive(Debug, Clone)]
pub enum AiProviderError {
    NetworkError(String),
    InvalidResponse(String),
    RateLimitExceeded,
    InvalidApiKey,
    ModelNotFound,
    ValidationError(String),
    Unknown(String),
}

impl fmt::Display for AiProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiProviderError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            AiProviderError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            AiProviderError::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            AiProviderError::InvalidApiKey => write!(f, "Invalid API key"),
            AiProviderError::ModelNotFound => write!(f, "Model not found"),
            AiProviderError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AiProviderError::Unknown(msg) => write!(f, "Unknown error: {}", msg),
        }
    }
}

impl std::error::Error for AiProviderError {}

/// Determines if an error is transient and should be retried
pub fn is_retryable_error(error: &AiProviderError) -> bool {
    match error {
        // Network errors are usually transient
        AiProviderError::NetworkError(_) => true,
        // Rate limits are transient - wait and retry
        AiProviderError::RateLimitExceeded => true,
        // These are permanent errors - don't retry
        AiProviderError::InvalidApiKey => false,
        AiProviderError::InvalidResponse(_) => false,
        AiProviderError::ValidationError(_) => false,
        AiProviderError::ModelNotFound => false,
        AiProviderError::Unknown(_) => false,
    }
}
