//! keystone-tenant — per-tenant schema provisioning for Keystone.
//!
//! Creates a fully isolated, row-level-secured schema for each tenant
//! in the shared relational database, as one atomic unit of work.
//!
//! # Architecture
//!
//! ```text
//! TenantProvisioner
//!   ├── validate_tenant_id()      — anchored allow-list, length-bounded
//!   ├── create_tenant_schema()    — one transaction:
//!   │     ├── CREATE SCHEMA IF NOT EXISTS tenant_<id>
//!   │     ├── users / audit_logs / transactions (IF NOT EXISTS)
//!   │     ├── ENABLE ROW LEVEL SECURITY on all three
//!   │     └── one guarded policy per table (service_role or tenant role)
//!   └── tenant_connection()       — shared pool + computed schema name
//!
//! TenantDatabase (port)
//!   └── PostgresDatabase — deadpool-postgres pool implementation
//! ```
//!
//! Either every object is visible after provisioning or none are: any
//! DDL failure rolls the whole transaction back and re-raises. The
//! operation is idempotent, so a failed attempt is safe to retry.
//!
//! Tenant ids are validated against a strict allow-list *before* any
//! identifier is constructed, and identifiers are quoted on top of
//! that — schema names are never built from raw caller input.

pub mod error;
pub mod ident;
pub mod postgres;
pub mod provisioner;

pub use error::{TenantError, TenantResult};
pub use ident::{quote_ident, schema_name, validate_tenant_id};
pub use postgres::PostgresDatabase;
pub use provisioner::{TenantDatabase, TenantHandle, TenantProvisioner};
