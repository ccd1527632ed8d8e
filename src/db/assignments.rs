//! Assignment coordinator: claimable listing, claim arbitration, completion.
//!
//! A ticket is globally locked while any assignment on it is in progress,
//! and unlocks once every assignment has completed — even if its own status
//! still reads in_progress because roles remain outstanding. The lock is a
//! partial unique index on (service_id) WHERE state = 'in_progress': two
//! racing claims serialize on the insert and exactly one wins.

use crate::db::notify_change;
use crate::error::{Error, Result};
use crate::event::ChangeEvent;
use crate::model::*;
use crate::telemetry::metrics;
use crate::telemetry::service::{record_state_transition, start_service_span};
use opentelemetry::KeyValue;
use tracing::Instrument;
use uuid::Uuid;

impl super::Db {
    /// List the tickets this worker may see and claim, newest first.
    ///
    /// A pending/in-progress ticket appears unless someone else is actively
    /// working it. The caller always sees tickets they hold any assignment
    /// on, so claimed and ongoing work stays visible to its owner.
    /// Read-only; the claim itself re-checks the lock at commit time.
    pub async fn list_claimable(
        &self,
        worker_id: WorkerId,
        limit: i64,
    ) -> Result<Vec<ServiceTicket>> {
        let rows: Vec<super::tickets::TicketRow> = sqlx::query_as(
            "SELECT t.id, t.track_no, t.status, t.vehicle_id, t.customer_id, t.total, t.created_at, t.updated_at, t.estimated_completion, t.completed_at
             FROM service_tickets t
             WHERE t.status IN ('pending', 'in_progress')
               AND (
                 EXISTS (
                   SELECT 1 FROM worker_assignments a
                   WHERE a.service_id = t.id AND a.worker_id = $1
                 )
                 OR NOT EXISTS (
                   SELECT 1 FROM worker_assignments a
                   WHERE a.service_id = t.id AND a.state = 'in_progress'
                 )
               )
             ORDER BY t.created_at DESC
             LIMIT $2",
        )
        .bind(worker_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(super::tickets::TicketRow::try_into_ticket)
            .collect()
    }

    /// Claim a service ticket for one role.
    ///
    /// Check-then-act runs as a single transaction: the ticket row is
    /// locked, its status verified, and the insert races against the
    /// partial unique index — the loser gets `AlreadyLocked`, never a
    /// second in-progress row. A first claim flips a pending ticket to
    /// in_progress.
    pub async fn claim(
        &self,
        service_id: TicketId,
        worker_id: WorkerId,
        role: Role,
    ) -> Result<WorkerAssignment> {
        let span = start_service_span("service.claim", service_id, Some(role));
        async {
            let mut tx = self.pool.begin().await?;
            let now = chrono::Utc::now();

            let row: Option<(String,)> =
                sqlx::query_as("SELECT status FROM service_tickets WHERE id = $1 FOR UPDATE")
                    .bind(service_id.0)
                    .fetch_optional(&mut *tx)
                    .await?;
            let status: TicketStatus = row
                .ok_or_else(|| Error::NotFound(format!("service ticket {service_id}")))?
                .0
                .parse()?;

            if !matches!(status, TicketStatus::Pending | TicketStatus::InProgress) {
                return Err(Error::InvalidState {
                    entity: format!("service ticket {service_id}"),
                    state: status.to_string(),
                });
            }

            let id = Uuid::new_v4();
            let inserted: Option<(Uuid,)> = sqlx::query_as(
                "INSERT INTO worker_assignments (id, service_id, worker_id, role, state, started_at, evidence_attached)
                 VALUES ($1, $2, $3, $4, 'in_progress', $5, FALSE)
                 ON CONFLICT (service_id) WHERE state = 'in_progress' DO NOTHING
                 RETURNING id",
            )
            .bind(id)
            .bind(service_id.0)
            .bind(worker_id.0)
            .bind(role.to_string())
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?;

            if inserted.is_none() {
                metrics::claims().add(
                    1,
                    &[
                        KeyValue::new("role", role.to_string()),
                        KeyValue::new("result", "locked"),
                    ],
                );
                return Err(Error::AlreadyLocked {
                    service: service_id,
                });
            }

            if status == TicketStatus::Pending {
                sqlx::query(
                    "UPDATE service_tickets SET status = 'in_progress', updated_at = $1 WHERE id = $2",
                )
                .bind(now)
                .bind(service_id.0)
                .execute(&mut *tx)
                .await?;

                record_state_transition(&tracing::Span::current(), "pending", "in_progress");
                notify_change(
                    &mut tx,
                    &ChangeEvent::TicketStatusChanged {
                        id: service_id,
                        from: TicketStatus::Pending,
                        to: TicketStatus::InProgress,
                    },
                )
                .await?;
            }

            notify_change(
                &mut tx,
                &ChangeEvent::AssignmentClaimed {
                    id: AssignmentId(id),
                    service_id,
                    worker_id,
                    role,
                },
            )
            .await?;

            tx.commit().await?;

            metrics::claims().add(
                1,
                &[
                    KeyValue::new("role", role.to_string()),
                    KeyValue::new("result", "ok"),
                ],
            );

            self.get_assignment(AssignmentId(id)).await
        }
        .instrument(span)
        .await
    }

    /// Complete this worker's in-progress portion of a ticket.
    ///
    /// Accrues a pending commission for eligible roles, then recomputes the
    /// ticket status in the same transaction: once nothing is in progress
    /// and every required role has a completed assignment, the ticket
    /// closes; otherwise it stays in_progress and unlocks for new claims.
    /// Re-submitting an already-completed portion is `AlreadyCompleted`.
    pub async fn complete(
        &self,
        service_id: TicketId,
        worker_id: WorkerId,
        role: Role,
        evidence_attached: bool,
        notes: Option<&str>,
    ) -> Result<WorkerAssignment> {
        let span = start_service_span("service.complete", service_id, Some(role));
        async {
            let mut tx = self.pool.begin().await?;
            let now = chrono::Utc::now();

            let row: Option<(String,)> =
                sqlx::query_as("SELECT status FROM service_tickets WHERE id = $1 FOR UPDATE")
                    .bind(service_id.0)
                    .fetch_optional(&mut *tx)
                    .await?;
            let status: TicketStatus = row
                .ok_or_else(|| Error::NotFound(format!("service ticket {service_id}")))?
                .0
                .parse()?;

            let updated: Option<(Uuid,)> = sqlx::query_as(
                "UPDATE worker_assignments
                 SET state = 'completed', finished_at = $1, evidence_attached = $2, notes = $3
                 WHERE service_id = $4 AND worker_id = $5 AND role = $6 AND state = 'in_progress'
                 RETURNING id",
            )
            .bind(now)
            .bind(evidence_attached)
            .bind(notes)
            .bind(service_id.0)
            .bind(worker_id.0)
            .bind(role.to_string())
            .fetch_optional(&mut *tx)
            .await?;

            let assignment_id = match updated {
                Some((id,)) => AssignmentId(id),
                None => {
                    // Distinguish a duplicate submission from a claim that
                    // never happened.
                    let done: Option<(Uuid,)> = sqlx::query_as(
                        "SELECT id FROM worker_assignments
                         WHERE service_id = $1 AND worker_id = $2 AND role = $3 AND state = 'completed'
                         LIMIT 1",
                    )
                    .bind(service_id.0)
                    .bind(worker_id.0)
                    .bind(role.to_string())
                    .fetch_optional(&mut *tx)
                    .await?;

                    return Err(if done.is_some() {
                        Error::AlreadyCompleted {
                            service: service_id,
                        }
                    } else {
                        Error::NotFound(format!(
                            "no in-progress assignment on service {service_id} for worker {worker_id} as {role}"
                        ))
                    });
                }
            };

            record_state_transition(&tracing::Span::current(), "in_progress", "completed");

            if role.commission_eligible() {
                self.accrue_commission(&mut tx, service_id, worker_id, role, now)
                    .await?;
            }

            // Ticket status recomputation, same transaction as the ledger
            // write. The ticket row lock serializes this with concurrent
            // claims and rejections.
            let (open,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM worker_assignments WHERE service_id = $1 AND state = 'in_progress'",
            )
            .bind(service_id.0)
            .fetch_one(&mut *tx)
            .await?;

            let (missing_roles,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM (
                   SELECT DISTINCT role FROM ticket_tasks WHERE ticket_id = $1
                   EXCEPT
                   SELECT DISTINCT role FROM worker_assignments
                   WHERE service_id = $1 AND state = 'completed'
                 ) AS outstanding",
            )
            .bind(service_id.0)
            .fetch_one(&mut *tx)
            .await?;

            if open == 0 && missing_roles == 0 && status.can_transition_to(TicketStatus::Completed)
            {
                sqlx::query(
                    "UPDATE service_tickets SET status = 'completed', completed_at = $1, updated_at = $1 WHERE id = $2",
                )
                .bind(now)
                .bind(service_id.0)
                .execute(&mut *tx)
                .await?;

                record_state_transition(
                    &tracing::Span::current(),
                    &status.to_string(),
                    "completed",
                );
                notify_change(
                    &mut tx,
                    &ChangeEvent::TicketStatusChanged {
                        id: service_id,
                        from: status,
                        to: TicketStatus::Completed,
                    },
                )
                .await?;

                metrics::ticket_state_transitions().add(
                    1,
                    &[
                        KeyValue::new("from", status.to_string()),
                        KeyValue::new("to", "completed"),
                    ],
                );
            }

            notify_change(
                &mut tx,
                &ChangeEvent::AssignmentCompleted {
                    id: assignment_id,
                    service_id,
                    worker_id,
                    role,
                },
            )
            .await?;

            tx.commit().await?;

            metrics::assignment_transitions().add(
                1,
                &[
                    KeyValue::new("role", role.to_string()),
                    KeyValue::new("to", "completed"),
                ],
            );

            self.get_assignment(assignment_id).await
        }
        .instrument(span)
        .await
    }

    /// Insert a pending commission for a completed eligible role.
    /// Idempotent per (service, worker, role) via the unique index — a
    /// replayed completion accrues nothing.
    async fn accrue_commission(
        &self,
        tx: &mut sqlx::PgConnection,
        service_id: TicketId,
        worker_id: WorkerId,
        role: Role,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let (labor_total,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(labor), 0)::BIGINT FROM ticket_tasks WHERE ticket_id = $1 AND role = $2",
        )
        .bind(service_id.0)
        .bind(role.to_string())
        .fetch_one(&mut *tx)
        .await?;

        let amount = self.policy.amount_for(role, labor_total);

        let id = Uuid::new_v4();
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            "INSERT INTO commission_records (id, worker_id, service_id, role, amount, state, created_at)
             VALUES ($1, $2, $3, $4, $5, 'pending', $6)
             ON CONFLICT (service_id, worker_id, role) DO NOTHING
             RETURNING id",
        )
        .bind(id)
        .bind(worker_id.0)
        .bind(service_id.0)
        .bind(role.to_string())
        .bind(amount)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_some() {
            notify_change(
                tx,
                &ChangeEvent::CommissionAccrued {
                    id: CommissionId(id),
                    service_id,
                    worker_id,
                    amount,
                },
            )
            .await?;

            metrics::commissions_accrued().add(1, &[KeyValue::new("role", role.to_string())]);
        }

        Ok(())
    }

    /// Get a ledger entry by ID.
    pub async fn get_assignment(&self, id: AssignmentId) -> Result<WorkerAssignment> {
        let row: Option<AssignmentRow> = sqlx::query_as(
            "SELECT id, service_id, worker_id, role, state, started_at, finished_at, evidence_attached, notes
             FROM worker_assignments WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("assignment {id}")))?
            .try_into_assignment()
    }

    /// Full ledger history for a ticket, oldest first.
    pub async fn list_assignments(&self, service_id: TicketId) -> Result<Vec<WorkerAssignment>> {
        let rows: Vec<AssignmentRow> = sqlx::query_as(
            "SELECT id, service_id, worker_id, role, state, started_at, finished_at, evidence_attached, notes
             FROM worker_assignments WHERE service_id = $1
             ORDER BY started_at",
        )
        .bind(service_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(AssignmentRow::try_into_assignment)
            .collect()
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
pub(crate) struct AssignmentRow {
    id: Uuid,
    service_id: Uuid,
    worker_id: Uuid,
    role: String,
    state: String,
    started_at: chrono::DateTime<chrono::Utc>,
    finished_at: Option<chrono::DateTime<chrono::Utc>>,
    evidence_attached: bool,
    notes: Option<String>,
}

impl AssignmentRow {
    pub(crate) fn try_into_assignment(self) -> Result<WorkerAssignment> {
        Ok(WorkerAssignment {
            id: AssignmentId(self.id),
            service_id: TicketId(self.service_id),
            worker_id: WorkerId(self.worker_id),
            role: self.role.parse()?,
            state: self.state.parse()?,
            started_at: self.started_at,
            finished_at: self.finished_at,
            evidence_attached: self.evidence_attached,
            notes: self.notes,
        })
    }
}
