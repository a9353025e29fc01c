//! Tenant id validation and SQL identifier construction.
//!
//! Schema and policy names are assembled by string formatting, so the
//! tenant id must pass a strict anchored allow-list before anything is
//! built from it, and identifiers are double-quoted on top of that.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{TenantError, TenantResult};

/// Longest accepted tenant id. Keeps `tenant_<id>` comfortably inside
/// Postgres's 63-byte identifier limit.
pub const MAX_TENANT_ID_LEN: usize = 48;

static TENANT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]+$").expect("tenant id pattern"));

/// Validate a tenant id: lowercase alphanumeric or underscore, 1 to 48
/// characters. Anything else is rejected before identifier
/// construction.
pub fn validate_tenant_id(tenant_id: &str) -> TenantResult<()> {
    if tenant_id.is_empty() || tenant_id.len() > MAX_TENANT_ID_LEN {
        return Err(TenantError::InvalidTenantId(format!(
            "{tenant_id:?} must be 1 to {MAX_TENANT_ID_LEN} characters"
        )));
    }
    if !TENANT_ID.is_match(tenant_id) {
        return Err(TenantError::InvalidTenantId(format!(
            "{tenant_id:?} may only contain lowercase letters, digits, and underscores"
        )));
    }
    Ok(())
}

/// The schema name for a tenant: a deterministic function of its id.
/// Callers must validate the id first.
pub fn schema_name(tenant_id: &str) -> String {
    format!("tenant_{tenant_id}")
}

/// Double-quote a SQL identifier, doubling any embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
