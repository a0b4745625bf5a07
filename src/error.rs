use crate::domain::order::OrderId;
use thiserror::Error;

/// Failures talking to the payment processor.
///
/// Kept apart from [`GatewayError`] so callers can tell a broken transport from an
/// explicit decision made by the processor.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("processor returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode processor response: {0}")]
    Decode(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),
    /// The display text is the generic message handed to the caller; the raw
    /// transport failure is kept as the source for logs and order notes.
    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: TransportError,
    },
    #[error("Payment verification failed: {0}")]
    VerificationFailed(String),
    #[error("{message}")]
    Rejected { status_code: i32, message: String },
    #[error("This order does not require capture. It may have already been captured or was processed with immediate capture.")]
    CaptureNotNeeded,
    #[error("No transaction ID found for this order.")]
    MissingTransactionId,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration file: {0}")]
    Config(#[from] serde_json::Error),
}

impl GatewayError {
    pub fn transport(message: impl Into<String>, source: TransportError) -> Self {
        GatewayError::Transport {
            message: message.into(),
            source,
        }
    }

    /// Rejected locally before any remote call was attempted.
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            GatewayError::CaptureNotNeeded
                | GatewayError::MissingTransactionId
                | GatewayError::InvalidAmount(_)
        )
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Transport { .. })
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for GatewayError {
    fn from(err: rocksdb::Error) -> Self {
        GatewayError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
