use musd_payment_engine::{LedgerError, MatchingError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Could not initialize the matching service. {0}")]
    InitializeError(String),
    #[error("Invalid service configuration. {0}")]
    ConfigurationError(String),
    #[error("Ledger failure. {0}")]
    LedgerError(#[from] LedgerError),
    #[error("The matching pipeline failed. {0}")]
    MatchingError(#[from] MatchingError),
}
