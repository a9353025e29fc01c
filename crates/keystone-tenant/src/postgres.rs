//! Postgres implementation of the `TenantDatabase` port, backed by a
//! deadpool connection pool.

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;
use tracing::{debug, warn};

use crate::error::{TenantError, TenantResult};
use crate::provisioner::TenantDatabase;

/// Default maximum pool size, matching the shared application pool.
pub const DEFAULT_POOL_SIZE: usize = 20;

/// Shared Postgres pool for tenant provisioning.
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: Pool,
}

impl PostgresDatabase {
    /// Build a pool from a connection string (`DATABASE_URL`).
    pub fn connect(url: &str, max_size: usize) -> TenantResult<Self> {
        let pg_config: tokio_postgres::Config = url
            .parse()
            .map_err(|e: tokio_postgres::Error| TenantError::Connection(e.to_string()))?;
        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(max_size)
            .build()
            .map_err(|e| TenantError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Access the underlying pool for non-provisioning queries.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl TenantDatabase for PostgresDatabase {
    async fn ping(&self) -> TenantResult<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| TenantError::Connection(e.to_string()))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| TenantError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn execute_transaction(&self, statements: &[String]) -> TenantResult<()> {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| TenantError::Connection(e.to_string()))?;
        let transaction = client
            .transaction()
            .await
            .map_err(|e| TenantError::Provision(e.to_string()))?;

        for statement in statements {
            if let Err(error) = transaction.batch_execute(statement).await {
                if let Err(rollback_error) = transaction.rollback().await {
                    warn!(%rollback_error, "rollback failed after DDL error");
                }
                return Err(TenantError::Provision(error.to_string()));
            }
        }

        transaction
            .commit()
            .await
            .map_err(|e| TenantError::Provision(e.to_string()))?;
        debug!(statements = statements.len(), "transaction committed");
        Ok(())
    }
}
