//! Error taxonomy for sale lifecycle operations.
//!
//! Persistence failures abort the operation and surface to the caller.
//! Notification failures never appear here; they are logged and reported
//! as a soft status on the outcome instead.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("persistence failure: {0}")]
    Persistence(#[from] anyhow::Error),

    #[error("{0}")]
    Validation(String),

    #[error("sale not found: {0}")]
    SaleNotFound(Uuid),

    #[error("sale item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("operation not permitted for this session")]
    Forbidden,
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
