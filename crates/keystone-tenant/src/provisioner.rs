//! The tenant provisioner — builds the per-tenant DDL batch and runs
//! it through the `TenantDatabase` port as one transaction.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::TenantResult;
use crate::ident::{quote_ident, schema_name, validate_tenant_id};

/// Transactional SQL port over the shared relational database.
#[async_trait]
pub trait TenantDatabase: Send + Sync {
    /// Connectivity probe.
    async fn ping(&self) -> TenantResult<()>;

    /// Run every statement inside a single transaction. The first
    /// failure rolls the whole batch back and is re-raised; on success
    /// all effects become visible together.
    async fn execute_transaction(&self, statements: &[String]) -> TenantResult<()>;
}

/// A handle for working inside one tenant's schema: the shared database
/// plus the computed schema name. There is no dedicated per-tenant
/// connection — isolation is enforced by RLS, not the connection layer.
#[derive(Clone)]
pub struct TenantHandle {
    pub schema: String,
    pub db: Arc<dyn TenantDatabase>,
}

/// Provisions isolated, row-level-secured schemas for tenants.
pub struct TenantProvisioner {
    db: Arc<dyn TenantDatabase>,
}

impl TenantProvisioner {
    pub fn new(db: Arc<dyn TenantDatabase>) -> Self {
        Self { db }
    }

    /// Create the tenant's schema, tables, and RLS policies in one
    /// atomic unit of work. Idempotent: re-running for an existing
    /// tenant changes nothing and does not error.
    pub async fn create_tenant_schema(&self, tenant_id: &str) -> TenantResult<()> {
        validate_tenant_id(tenant_id)?;
        let statements = provisioning_statements(tenant_id);
        self.db.execute_transaction(&statements).await?;
        info!(%tenant_id, schema = %schema_name(tenant_id), "tenant schema provisioned");
        Ok(())
    }

    /// A handle bundling the shared database with the tenant's schema
    /// name.
    pub fn tenant_connection(&self, tenant_id: &str) -> TenantResult<TenantHandle> {
        validate_tenant_id(tenant_id)?;
        Ok(TenantHandle {
            schema: schema_name(tenant_id),
            db: Arc::clone(&self.db),
        })
    }
}

/// Tables created inside every tenant schema, with their isolation
/// policy names.
const TENANT_TABLES: [(&str, &str); 3] = [
    ("users", "tenant_isolation_users"),
    ("audit_logs", "tenant_isolation_audit"),
    ("transactions", "tenant_isolation_transactions"),
];

/// Build the full DDL batch for a tenant. The caller must have
/// validated the tenant id already; identifiers are quoted regardless.
pub fn provisioning_statements(tenant_id: &str) -> Vec<String> {
    let schema = schema_name(tenant_id);
    let qschema = quote_ident(&schema);
    let mut statements = Vec::with_capacity(10);

    statements.push(format!("CREATE SCHEMA IF NOT EXISTS {qschema}"));

    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {qschema}.\"users\" (\n\
         \x20   id UUID PRIMARY KEY DEFAULT gen_random_uuid(),\n\
         \x20   email TEXT UNIQUE NOT NULL,\n\
         \x20   encrypted_password TEXT NOT NULL,\n\
         \x20   role TEXT NOT NULL,\n\
         \x20   created_at TIMESTAMPTZ DEFAULT NOW(),\n\
         \x20   updated_at TIMESTAMPTZ DEFAULT NOW()\n\
         )"
    ));
    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {qschema}.\"audit_logs\" (\n\
         \x20   id UUID PRIMARY KEY DEFAULT gen_random_uuid(),\n\
         \x20   user_id UUID REFERENCES {qschema}.\"users\"(id),\n\
         \x20   action TEXT NOT NULL,\n\
         \x20   details JSONB,\n\
         \x20   ip_address TEXT,\n\
         \x20   created_at TIMESTAMPTZ DEFAULT NOW()\n\
         )"
    ));
    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {qschema}.\"transactions\" (\n\
         \x20   id UUID PRIMARY KEY DEFAULT gen_random_uuid(),\n\
         \x20   user_id UUID REFERENCES {qschema}.\"users\"(id),\n\
         \x20   amount DECIMAL NOT NULL,\n\
         \x20   currency TEXT NOT NULL,\n\
         \x20   status TEXT NOT NULL,\n\
         \x20   type TEXT NOT NULL,\n\
         \x20   metadata JSONB,\n\
         \x20   created_at TIMESTAMPTZ DEFAULT NOW(),\n\
         \x20   updated_at TIMESTAMPTZ DEFAULT NOW()\n\
         )"
    ));

    for (table, _) in TENANT_TABLES {
        statements.push(format!(
            "ALTER TABLE {qschema}.{} ENABLE ROW LEVEL SECURITY",
            quote_ident(table)
        ));
    }

    // CREATE POLICY has no IF NOT EXISTS form, so each policy is
    // guarded by a pg_policies lookup to keep the batch idempotent.
    for (table, policy) in TENANT_TABLES {
        statements.push(format!(
            "DO $$\n\
             BEGIN\n\
             \x20   IF NOT EXISTS (\n\
             \x20       SELECT 1 FROM pg_policies\n\
             \x20       WHERE schemaname = '{schema}'\n\
             \x20         AND tablename = '{table}'\n\
             \x20         AND policyname = '{policy}'\n\
             \x20   ) THEN\n\
             \x20       CREATE POLICY {policy} ON {qschema}.{qtable}\n\
             \x20           USING (current_user = 'service_role' OR current_user = '{tenant_id}');\n\
             \x20   END IF;\n\
             END\n\
             $$",
            qtable = quote_ident(table),
        ));
    }

    statements
}
