use thiserror::Error;

/// Why a delivery attempt failed, and whether trying again can help.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("transient delivery failure: {0}")]
    Transient(String),

    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl DeliveryError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryError::Permanent(_))
    }

    /// Classify a non-success HTTP status. 4xx is permanent except request
    /// timeout (408) and rate limiting (429).
    pub fn from_status(status: u16, detail: &str) -> Self {
        let message = if detail.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, detail)
        };
        match status {
            408 | 429 => DeliveryError::Transient(message),
            400..=499 => DeliveryError::Permanent(message),
            _ => DeliveryError::Transient(message),
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => DeliveryError::from_status(status.as_u16(), ""),
            None if e.is_builder() => DeliveryError::Permanent(e.to_string()),
            None => DeliveryError::Transient(e.to_string()),
        }
    }
}
