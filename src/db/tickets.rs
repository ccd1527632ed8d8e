//! Service ticket store: intake, lookup, listing, admin cancel.

use crate::db::notify_change;
use crate::error::{Error, Result};
use crate::event::ChangeEvent;
use crate::model::*;
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use uuid::Uuid;

impl super::Db {
    /// Create a service ticket with its task list. The distinct roles in
    /// the task list are the roles required before the ticket can close.
    pub async fn create_ticket(&self, new: NewTicket) -> Result<ServiceTicket> {
        let mut tx = self.pool.begin().await?;
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        let (track_no,): (i64,) = sqlx::query_as(
            "INSERT INTO service_tickets (id, status, vehicle_id, customer_id, total, created_at, updated_at, estimated_completion)
             VALUES ($1, 'pending', $2, $3, $4, $5, $5, $6)
             RETURNING track_no",
        )
        .bind(id)
        .bind(new.vehicle_id)
        .bind(new.customer_id)
        .bind(new.total)
        .bind(now)
        .bind(new.estimated_completion)
        .fetch_one(&mut *tx)
        .await?;

        for (role, description, labor) in &new.tasks {
            sqlx::query(
                "INSERT INTO ticket_tasks (ticket_id, role, description, labor)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(role.to_string())
            .bind(description)
            .bind(labor)
            .execute(&mut *tx)
            .await?;
        }

        notify_change(
            &mut tx,
            &ChangeEvent::TicketCreated {
                id: TicketId(id),
                track_no,
            },
        )
        .await?;

        tx.commit().await?;

        metrics::tickets_created().add(1, &[]);

        self.get_ticket(TicketId(id)).await
    }

    /// Get a service ticket by ID.
    pub async fn get_ticket(&self, id: TicketId) -> Result<ServiceTicket> {
        let row: Option<TicketRow> = sqlx::query_as(
            "SELECT id, track_no, status, vehicle_id, customer_id, total, created_at, updated_at, estimated_completion, completed_at
             FROM service_tickets WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("service ticket {id}")))?
            .try_into_ticket()
    }

    /// Get a ticket's task list.
    pub async fn get_ticket_tasks(&self, id: TicketId) -> Result<Vec<TicketTask>> {
        let rows: Vec<(Uuid, String, String, i64)> = sqlx::query_as(
            "SELECT ticket_id, role, description, labor FROM ticket_tasks WHERE ticket_id = $1",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(ticket_id, role, description, labor)| {
                Ok(TicketTask {
                    ticket_id: TicketId(ticket_id),
                    role: role.parse()?,
                    description,
                    labor,
                })
            })
            .collect()
    }

    /// List tickets, newest first, optionally filtered by status.
    pub async fn list_tickets(
        &self,
        status: Option<TicketStatus>,
        limit: i64,
    ) -> Result<Vec<ServiceTicket>> {
        let rows: Vec<TicketRow> = sqlx::query_as(
            "SELECT id, track_no, status, vehicle_id, customer_id, total, created_at, updated_at, estimated_completion, completed_at
             FROM service_tickets
             WHERE $1::text IS NULL OR status = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(status.map(|s| s.to_string()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TicketRow::try_into_ticket).collect()
    }

    /// Administrative cancel. Pending and in-progress tickets only;
    /// completed/cancelled refuse. Terminal.
    pub async fn cancel_ticket(&self, id: TicketId) -> Result<ServiceTicket> {
        let mut tx = self.pool.begin().await?;
        let now = chrono::Utc::now();

        let row: Option<(String,)> =
            sqlx::query_as("SELECT status FROM service_tickets WHERE id = $1 FOR UPDATE")
                .bind(id.0)
                .fetch_optional(&mut *tx)
                .await?;
        let status: TicketStatus = row
            .ok_or_else(|| Error::NotFound(format!("service ticket {id}")))?
            .0
            .parse()?;

        if !status.can_transition_to(TicketStatus::Cancelled) {
            return Err(Error::InvalidState {
                entity: format!("service ticket {id}"),
                state: status.to_string(),
            });
        }

        sqlx::query("UPDATE service_tickets SET status = 'cancelled', updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        notify_change(
            &mut tx,
            &ChangeEvent::TicketStatusChanged {
                id,
                from: status,
                to: TicketStatus::Cancelled,
            },
        )
        .await?;

        tx.commit().await?;

        metrics::ticket_state_transitions().add(
            1,
            &[
                KeyValue::new("from", status.to_string()),
                KeyValue::new("to", "cancelled"),
            ],
        );

        self.get_ticket(id).await
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
pub(crate) struct TicketRow {
    id: Uuid,
    track_no: i64,
    status: String,
    vehicle_id: Uuid,
    customer_id: Uuid,
    total: i64,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    estimated_completion: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TicketRow {
    pub(crate) fn try_into_ticket(self) -> Result<ServiceTicket> {
        Ok(ServiceTicket {
            id: TicketId(self.id),
            track_no: self.track_no,
            status: self.status.parse()?,
            vehicle_id: self.vehicle_id,
            customer_id: self.customer_id,
            total: self.total,
            created_at: self.created_at,
            updated_at: self.updated_at,
            estimated_completion: self.estimated_completion,
            completed_at: self.completed_at,
        })
    }
}
