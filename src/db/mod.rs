//! Database connection pool, migrations, and health check.
//!
//! The Db handle is the only mutation path into the ticket store and the
//! assignment ledger. Every multi-statement operation runs in a single
//! transaction; claim arbitration rides the partial unique indexes defined
//! in the migrations.

pub mod assignments;
pub mod commissions;
pub mod quality;
pub mod tickets;

use crate::error::{Error, Result};
use crate::event::ChangeEvent;
use crate::policy::CommissionPolicy;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Database handle. Owns the connection pool and the commission policy.
pub struct Db {
    pool: PgPool,
    policy: CommissionPolicy,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    /// Uses the built-in commission rates; see [`Db::with_policy`].
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self {
            pool,
            policy: CommissionPolicy::default_rates(),
        })
    }

    /// Replace the commission policy (e.g. one loaded from TOML).
    pub fn with_policy(mut self, policy: CommissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Simple health check — run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool (for submodules and listeners).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Publish a change event on its NOTIFY channel from inside a transaction.
/// NOTIFY is transactional — the event only fires on commit.
pub(crate) async fn notify_change(
    tx: &mut sqlx::PgConnection,
    event: &ChangeEvent,
) -> Result<()> {
    let payload = serde_json::to_string(event)
        .map_err(|e| Error::Other(format!("serialize change event: {e}")))?;
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(event.channel())
        .bind(payload)
        .execute(tx)
        .await?;
    Ok(())
}
