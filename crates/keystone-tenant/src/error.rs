//! Error types for tenant provisioning.

use thiserror::Error;

/// Result type alias for tenant operations.
pub type TenantResult<T> = Result<T, TenantError>;

/// Errors that can occur while provisioning a tenant.
#[derive(Debug, Error)]
pub enum TenantError {
    /// The tenant id failed allow-list validation. Raised before any
    /// SQL identifier is constructed.
    #[error("invalid tenant id: {0}")]
    InvalidTenantId(String),

    #[error("database connection error: {0}")]
    Connection(String),

    /// A DDL statement failed; the transaction was rolled back and no
    /// partial schema remains.
    #[error("provisioning failed: {0}")]
    Provision(String),
}
