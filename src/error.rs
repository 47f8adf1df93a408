use crate::domain::payment::PaymentState;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Cannot {action} a payment in state {from}")]
    InvalidTransition {
        from: PaymentState,
        action: &'static str,
    },
    #[error("{0} not found")]
    NotFound(String),
    /// The processor answered but declined the request.
    #[error("Payment could not be processed: {0}")]
    Gateway(String),
    /// The processor could not be reached, or did not answer in time.
    #[error("Payment gateway unavailable: {0}")]
    GatewayTransport(String),
    #[error("There was no encrypted credit card data provided")]
    MissingAuthorizationData,
    #[error("There was an error retrieving the user's payment profile")]
    ProfileLookup,
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for ReconcileError {
    fn from(e: rocksdb::Error) -> Self {
        Self::Storage(e.into_string())
    }
}
