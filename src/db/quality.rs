//! Quality control gate: review of a completed service before final closure.
//!
//! A rejection bounces the ticket back into rework: the report resolves,
//! the ticket reopens, and a fresh in-progress assignment is created for
//! the worker whose portion was inspected.

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
    /// Mark that a quality worker has begun inspecting a service.
    /// Purely informational — blocks nothing, mutates nothing.
    pub async fn start_review(&self, service_id: TicketId, worker_id: WorkerId) -> Result<()> {
        // Existence check only; inspection itself leaves no ledger trace.
        self.get_ticket(service_id).await?;

        tracing::info!(
            service_id = %service_id,
            worker_id = %worker_id,
            "quality review started"
        );
        metrics::quality_reviews().add(1, &[KeyValue::new("result", "started")]);
        Ok(())
    }

    /// File a pending quality report against a completed service.
    ///
    /// The partial unique index on (service_id) WHERE state = 'pending'
    /// turns a duplicate pending report into `Conflict`.
    #[allow(clippy::too_many_arguments)]
    pub async fn submit_evidence(
        &self,
        service_id: TicketId,
        worker_id: WorkerId,
        description: &str,
        checklist_passed: bool,
        rating: i16,
        defects: &[String],
        media: &[String],
    ) -> Result<QualityReport> {
        if !(1..=5).contains(&rating) {
            return Err(Error::Validation(format!(
                "rating must be between 1 and 5, got {rating}"
            )));
        }

        let span = start_service_span("quality.submit", service_id, None);
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

            if status != TicketStatus::Completed {
                return Err(Error::InvalidState {
                    entity: format!("service ticket {service_id}"),
                    state: status.to_string(),
                });
            }

            let id = Uuid::new_v4();
            let inserted: Option<(Uuid,)> = sqlx::query_as(
                "INSERT INTO quality_reports
                   (id, service_id, worker_id, checklist_passed, rating, description, defects, media, state, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9)
                 ON CONFLICT (service_id) WHERE state = 'pending' DO NOTHING
                 RETURNING id",
            )
            .bind(id)
            .bind(service_id.0)
            .bind(worker_id.0)
            .bind(checklist_passed)
            .bind(rating)
            .bind(description)
            .bind(serde_json::json!(defects))
            .bind(serde_json::json!(media))
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?;

            if inserted.is_none() {
                return Err(Error::Conflict(format!(
                    "service {service_id} already has a pending quality report"
                )));
            }

            notify_change(
                &mut tx,
                &ChangeEvent::ReportSubmitted {
                    id: ReportId(id),
                    service_id,
                },
            )
            .await?;

            tx.commit().await?;

            metrics::quality_reviews().add(1, &[KeyValue::new("result", "submitted")]);

            self.get_report(ReportId(id)).await
        }
        .instrument(span)
        .await
    }

    /// Approve a pending report. The ticket stays completed; terminal for
    /// that report.
    pub async fn approve(
        &self,
        report_id: ReportId,
        resolver: WorkerId,
        comments: Option<&str>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let now = chrono::Utc::now();

        let updated: Option<(Uuid,)> = sqlx::query_as(
            "UPDATE quality_reports
             SET state = 'approved', resolved_by = $1, resolution_comments = $2, resolved_at = $3
             WHERE id = $4 AND state = 'pending'
             RETURNING service_id",
        )
        .bind(resolver.0)
        .bind(comments)
        .bind(now)
        .bind(report_id.0)
        .fetch_optional(&mut *tx)
        .await?;

        let service_id = match updated {
            Some((sid,)) => TicketId(sid),
            None => return Err(self.report_update_miss(report_id).await),
        };

        notify_change(
            &mut tx,
            &ChangeEvent::ReportResolved {
                id: report_id,
                service_id,
                state: ReportState::Approved,
            },
        )
        .await?;

        tx.commit().await?;

        metrics::quality_reviews().add(1, &[KeyValue::new("result", "approved")]);
        Ok(())
    }

    /// Reject a pending report and send the work back.
    ///
    /// Comments are mandatory. In one transaction: the report resolves to
    /// rejected, the ticket reopens to in_progress, and the most recently
    /// finished non-quality assignment is recreated in_progress for the
    /// same worker and role so they can redo the work.
    pub async fn reject(
        &self,
        report_id: ReportId,
        resolver: WorkerId,
        comments: &str,
    ) -> Result<()> {
        if comments.trim().is_empty() {
            return Err(Error::Validation(
                "rejection comments must not be empty".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let now = chrono::Utc::now();

        let pending: Option<(Uuid,)> =
            sqlx::query_as("SELECT service_id FROM quality_reports WHERE id = $1 AND state = 'pending'")
                .bind(report_id.0)
                .fetch_optional(&mut *tx)
                .await?;
        let service_id = match pending {
            Some((sid,)) => TicketId(sid),
            None => return Err(self.report_update_miss(report_id).await),
        };

        let span = start_service_span("quality.reject", service_id, None);
        async {
            // Ticket row lock first, so the reopen serializes with claims
            // and completions on the same ticket.
            let row: Option<(String,)> =
                sqlx::query_as("SELECT status FROM service_tickets WHERE id = $1 FOR UPDATE")
                    .bind(service_id.0)
                    .fetch_optional(&mut *tx)
                    .await?;
            let status: TicketStatus = row
                .ok_or_else(|| Error::NotFound(format!("service ticket {service_id}")))?
                .0
                .parse()?;

            if status == TicketStatus::Cancelled {
                return Err(Error::InvalidState {
                    entity: format!("service ticket {service_id}"),
                    state: status.to_string(),
                });
            }

            let updated = sqlx::query(
                "UPDATE quality_reports
                 SET state = 'rejected', resolved_by = $1, resolution_comments = $2, resolved_at = $3
                 WHERE id = $4 AND state = 'pending'",
            )
            .bind(resolver.0)
            .bind(comments)
            .bind(now)
            .bind(report_id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if updated == 0 {
                return Err(self.report_update_miss(report_id).await);
            }

            if status == TicketStatus::Completed {
                sqlx::query(
                    "UPDATE service_tickets SET status = 'in_progress', completed_at = NULL, updated_at = $1 WHERE id = $2",
                )
                .bind(now)
                .bind(service_id.0)
                .execute(&mut *tx)
                .await?;

                record_state_transition(&tracing::Span::current(), "completed", "in_progress");
                notify_change(
                    &mut tx,
                    &ChangeEvent::TicketStatusChanged {
                        id: service_id,
                        from: TicketStatus::Completed,
                        to: TicketStatus::InProgress,
                    },
                )
                .await?;

                metrics::ticket_state_transitions().add(
                    1,
                    &[
                        KeyValue::new("from", "completed"),
                        KeyValue::new("to", "in_progress"),
                    ],
                );
            }

            // The work the reviewer inspected: the last portion finished
            // by a non-quality role. Reopen it for the same worker.
            let target: Option<(Uuid, String)> = sqlx::query_as(
                "SELECT worker_id, role FROM worker_assignments
                 WHERE service_id = $1 AND state = 'completed'
                   AND role NOT IN ('quality', 'quality-system')
                 ORDER BY finished_at DESC
                 LIMIT 1",
            )
            .bind(service_id.0)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some((target_worker, target_role)) = target {
                let role: Role = target_role.parse()?;
                let id = Uuid::new_v4();
                let inserted: Option<(Uuid,)> = sqlx::query_as(
                    "INSERT INTO worker_assignments (id, service_id, worker_id, role, state, started_at, evidence_attached)
                     VALUES ($1, $2, $3, $4, 'in_progress', $5, FALSE)
                     ON CONFLICT (service_id) WHERE state = 'in_progress' DO NOTHING
                     RETURNING id",
                )
                .bind(id)
                .bind(service_id.0)
                .bind(target_worker)
                .bind(role.to_string())
                .bind(now)
                .fetch_optional(&mut *tx)
                .await?;

                if inserted.is_none() {
                    return Err(Error::AlreadyLocked {
                        service: service_id,
                    });
                }

                notify_change(
                    &mut tx,
                    &ChangeEvent::AssignmentReopened {
                        id: AssignmentId(id),
                        service_id,
                        worker_id: WorkerId(target_worker),
                        role,
                    },
                )
                .await?;
            }

            notify_change(
                &mut tx,
                &ChangeEvent::ReportResolved {
                    id: report_id,
                    service_id,
                    state: ReportState::Rejected,
                },
            )
            .await?;

            tx.commit().await?;

            metrics::quality_reviews().add(1, &[KeyValue::new("result", "rejected")]);
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Get a quality report by ID.
    pub async fn get_report(&self, id: ReportId) -> Result<QualityReport> {
        let row: Option<ReportRow> = sqlx::query_as(
            "SELECT id, service_id, worker_id, checklist_passed, rating, description, defects, media, state, resolved_by, resolution_comments, created_at, resolved_at
             FROM quality_reports WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("quality report {id}")))?
            .try_into_report()
    }

    /// All reports filed against a ticket, oldest first (rework history).
    pub async fn list_reports(&self, service_id: TicketId) -> Result<Vec<QualityReport>> {
        let rows: Vec<ReportRow> = sqlx::query_as(
            "SELECT id, service_id, worker_id, checklist_passed, rating, description, defects, media, state, resolved_by, resolution_comments, created_at, resolved_at
             FROM quality_reports WHERE service_id = $1
             ORDER BY created_at",
        )
        .bind(service_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReportRow::try_into_report).collect()
    }

    /// Classify a failed pending-report update: missing vs already resolved.
    async fn report_update_miss(&self, report_id: ReportId) -> Error {
        match self.get_report(report_id).await {
            Ok(report) => Error::InvalidState {
                entity: format!("quality report {report_id}"),
                state: report.state.to_string(),
            },
            Err(e) => e,
        }
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct ReportRow {
    id: Uuid,
    service_id: Uuid,
    worker_id: Uuid,
    checklist_passed: bool,
    rating: i16,
    description: String,
    defects: serde_json::Value,
    media: serde_json::Value,
    state: String,
    resolved_by: Option<Uuid>,
    resolution_comments: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    resolved_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ReportRow {
    fn try_into_report(self) -> Result<QualityReport> {
        Ok(QualityReport {
            id: ReportId(self.id),
            service_id: TicketId(self.service_id),
            worker_id: WorkerId(self.worker_id),
            checklist_passed: self.checklist_passed,
            rating: self.rating,
            description: self.description,
            defects: serde_json::from_value(self.defects)
                .map_err(|e| Error::Other(format!("bad defects payload: {e}")))?,
            media: serde_json::from_value(self.media)
                .map_err(|e| Error::Other(format!("bad media payload: {e}")))?,
            state: self.state.parse()?,
            resolved_by: self.resolved_by.map(WorkerId),
            resolution_comments: self.resolution_comments,
            created_at: self.created_at,
            resolved_at: self.resolved_at,
        })
    }
}
