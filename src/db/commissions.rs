//! Commission record queries.
//!
//! Accrual happens inside the coordinator's complete path; payment is a
//! separate process. This module only reads.

use crate::error::{Error, Result};
use crate::model::*;
use uuid::Uuid;

impl super::Db {
    /// Get a commission record by ID.
    pub async fn get_commission(&self, id: CommissionId) -> Result<CommissionRecord> {
        let row: Option<CommissionRow> = sqlx::query_as(
            "SELECT id, worker_id, service_id, role, amount, state, created_at
             FROM commission_records WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("commission {id}")))?
            .try_into_commission()
    }

    /// List commissions, newest first, optionally filtered by worker and state.
    pub async fn list_commissions(
        &self,
        worker_id: Option<WorkerId>,
        state: Option<CommissionState>,
        limit: i64,
    ) -> Result<Vec<CommissionRecord>> {
        let rows: Vec<CommissionRow> = sqlx::query_as(
            "SELECT id, worker_id, service_id, role, amount, state, created_at
             FROM commission_records
             WHERE ($1::uuid IS NULL OR worker_id = $1)
               AND ($2::text IS NULL OR state = $2)
             ORDER BY created_at DESC
             LIMIT $3",
        )
        .bind(worker_id.map(|w| w.0))
        .bind(state.map(|s| s.to_string()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(CommissionRow::try_into_commission)
            .collect()
    }

    /// Commissions accrued on one ticket.
    pub async fn list_ticket_commissions(
        &self,
        service_id: TicketId,
    ) -> Result<Vec<CommissionRecord>> {
        let rows: Vec<CommissionRow> = sqlx::query_as(
            "SELECT id, worker_id, service_id, role, amount, state, created_at
             FROM commission_records WHERE service_id = $1
             ORDER BY created_at",
        )
        .bind(service_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(CommissionRow::try_into_commission)
            .collect()
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct CommissionRow {
    id: Uuid,
    worker_id: Uuid,
    service_id: Uuid,
    role: String,
    amount: i64,
    state: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl CommissionRow {
    fn try_into_commission(self) -> Result<CommissionRecord> {
        Ok(CommissionRecord {
            id: CommissionId(self.id),
            worker_id: WorkerId(self.worker_id),
            service_id: TicketId(self.service_id),
            role: self.role.parse()?,
            amount: self.amount,
            state: self.state.parse()?,
            created_at: self.created_at,
        })
    }
}
