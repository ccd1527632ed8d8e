//! Structured change events published on every committed mutation.
//!
//! Events ride Postgres NOTIFY channels ("ticket_changed",
//! "assignment_changed") as JSON payloads. Consumers use them for cache
//! revalidation and dashboards — fire-and-forget, no delivery guarantee.

use serde::{Deserialize, Serialize};

use crate::model::{
    AssignmentId, CommissionId, ReportId, ReportState, Role, TicketId, TicketStatus, WorkerId,
};

/// Channel carrying ticket-level changes.
pub const TICKET_CHANNEL: &str = "ticket_changed";
/// Channel carrying ledger and review changes.
pub const ASSIGNMENT_CHANNEL: &str = "assignment_changed";

/// A change published by a committed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    TicketCreated {
        id: TicketId,
        track_no: i64,
    },
    TicketStatusChanged {
        id: TicketId,
        from: TicketStatus,
        to: TicketStatus,
    },
    AssignmentClaimed {
        id: AssignmentId,
        service_id: TicketId,
        worker_id: WorkerId,
        role: Role,
    },
    AssignmentCompleted {
        id: AssignmentId,
        service_id: TicketId,
        worker_id: WorkerId,
        role: Role,
    },
    AssignmentReopened {
        id: AssignmentId,
        service_id: TicketId,
        worker_id: WorkerId,
        role: Role,
    },
    ReportSubmitted {
        id: ReportId,
        service_id: TicketId,
    },
    ReportResolved {
        id: ReportId,
        service_id: TicketId,
        state: ReportState,
    },
    CommissionAccrued {
        id: CommissionId,
        service_id: TicketId,
        worker_id: WorkerId,
        amount: i64,
    },
}

impl ChangeEvent {
    /// Which NOTIFY channel this event belongs on.
    pub fn channel(&self) -> &'static str {
        match self {
            ChangeEvent::TicketCreated { .. } | ChangeEvent::TicketStatusChanged { .. } => {
                TICKET_CHANNEL
            }
            _ => ASSIGNMENT_CHANNEL,
        }
    }
}
