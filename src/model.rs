//! Core data model.
//!
//! A service ticket is one repair job moving through the shop. Workers of
//! fixed roles claim it, record their portion in the assignment ledger, and
//! an optional quality review gates final closure. All monetary values are
//! integer minor currency units.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                // Short display: first 8 chars of UUID
                write!(f, "{}", &self.0.to_string()[..8])
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

id_newtype!(
    /// Newtype for service ticket IDs.
    TicketId
);
id_newtype!(
    /// Newtype for worker IDs (supplied by the identity provider).
    WorkerId
);
id_newtype!(
    /// Newtype for ledger assignment IDs.
    AssignmentId
);
id_newtype!(
    /// Newtype for quality report IDs.
    ReportId
);
id_newtype!(
    /// Newtype for commission record IDs.
    CommissionId
);

// ---------------------------------------------------------------------------
// Ticket status
// ---------------------------------------------------------------------------

/// Lifecycle status of a service ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Created, no worker has claimed it yet.
    Pending,
    /// At least one claim happened; work may still be outstanding.
    InProgress,
    /// Every required role finished. May reopen via quality rejection.
    Completed,
    /// Administratively cancelled. Terminal.
    Cancelled,
}

impl TicketStatus {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, to),
            (Pending, InProgress)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
                | (Completed, InProgress) // quality rejection reopens
        )
    }

    /// Is this a terminal status? Completed is not — a rejected quality
    /// review can send the ticket back into rework.
    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Cancelled)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TicketStatus::Pending => "pending",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Completed => "completed",
            TicketStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TicketStatus::Pending),
            "in_progress" => Ok(TicketStatus::InProgress),
            "completed" => Ok(TicketStatus::Completed),
            "cancelled" => Ok(TicketStatus::Cancelled),
            other => Err(crate::error::Error::Validation(format!(
                "unknown ticket status: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker roles
// ---------------------------------------------------------------------------

/// The fixed set of shop roles. Closed enum — an unknown role string is a
/// validation error at the parse boundary, not a fallthrough label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Mechanic,
    Painter,
    BodyWork,
    Prep,
    Assembly,
    Wash,
    Polish,
    Quality,
    QualitySystem,
}

impl Role {
    /// Every role, in display order.
    pub const ALL: [Role; 9] = [
        Role::Mechanic,
        Role::Painter,
        Role::BodyWork,
        Role::Prep,
        Role::Assembly,
        Role::Wash,
        Role::Polish,
        Role::Quality,
        Role::QualitySystem,
    ];

    /// Does completing this role's work accrue a commission?
    pub fn commission_eligible(self) -> bool {
        matches!(self, Role::Mechanic | Role::BodyWork)
    }

    /// Is this a quality-control role?
    pub fn is_quality(self) -> bool {
        matches!(self, Role::Quality | Role::QualitySystem)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Mechanic => "mechanic",
            Role::Painter => "painter",
            Role::BodyWork => "body-work",
            Role::Prep => "prep",
            Role::Assembly => "assembly",
            Role::Wash => "wash",
            Role::Polish => "polish",
            Role::Quality => "quality",
            Role::QualitySystem => "quality-system",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mechanic" => Ok(Role::Mechanic),
            "painter" => Ok(Role::Painter),
            "body-work" => Ok(Role::BodyWork),
            "prep" => Ok(Role::Prep),
            "assembly" => Ok(Role::Assembly),
            "wash" => Ok(Role::Wash),
            "polish" => Ok(Role::Polish),
            "quality" => Ok(Role::Quality),
            "quality-system" => Ok(Role::QualitySystem),
            other => Err(crate::error::Error::Validation(format!(
                "unknown role: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Service ticket
// ---------------------------------------------------------------------------

/// One repair job tracked by the shop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTicket {
    /// Unique identifier.
    pub id: TicketId,

    /// Sequential display number shown to customers and on the board.
    pub track_no: i64,

    /// Current lifecycle status. Mutated only through the coordinator,
    /// the quality gate, or the admin cancel path.
    pub status: TicketStatus,

    /// Vehicle this job is for.
    pub vehicle_id: Uuid,

    /// Customer who owns the vehicle.
    pub customer_id: Uuid,

    /// Quoted total, minor currency units.
    pub total: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Promised completion date, if one was given.
    pub estimated_completion: Option<DateTime<Utc>>,
    /// Set when every required role finished.
    pub completed_at: Option<DateTime<Utc>>,
}

/// One line of a ticket's task list. The set of distinct roles across a
/// ticket's tasks is the set of roles required to close it; the labor
/// amounts are the base for commission accrual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketTask {
    pub ticket_id: TicketId,
    pub role: Role,
    pub description: String,
    /// Labor amount for this task, minor currency units.
    pub labor: i64,
}

// ---------------------------------------------------------------------------
// Assignment ledger
// ---------------------------------------------------------------------------

/// Claim state of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentState {
    InProgress,
    Completed,
}

impl std::fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AssignmentState::InProgress => "in_progress",
            AssignmentState::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AssignmentState {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(AssignmentState::InProgress),
            "completed" => Ok(AssignmentState::Completed),
            other => Err(crate::error::Error::Validation(format!(
                "unknown assignment state: {other}"
            ))),
        }
    }
}

/// One ledger entry: a worker's claim on one role of one service ticket.
/// Append-only — rework creates fresh rows, nothing is ever deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerAssignment {
    pub id: AssignmentId,
    pub service_id: TicketId,
    pub worker_id: WorkerId,
    pub role: Role,
    pub state: AssignmentState,
    pub started_at: DateTime<Utc>,
    /// None until the worker submits completion.
    pub finished_at: Option<DateTime<Utc>>,
    /// Whether completion evidence (photos etc.) was attached.
    pub evidence_attached: bool,
    /// Free-text completion notes.
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Commissions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionState {
    Pending,
    Paid,
}

impl std::fmt::Display for CommissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CommissionState::Pending => "pending",
            CommissionState::Paid => "paid",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for CommissionState {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommissionState::Pending),
            "paid" => Ok(CommissionState::Paid),
            other => Err(crate::error::Error::Validation(format!(
                "unknown commission state: {other}"
            ))),
        }
    }
}

/// Commission accrued from a completed assignment of an eligible role.
/// Created by the coordinator at completion time; the payment process that
/// flips it to paid lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionRecord {
    pub id: CommissionId,
    pub worker_id: WorkerId,
    pub service_id: TicketId,
    pub role: Role,
    /// Accrued amount, minor currency units.
    pub amount: i64,
    pub state: CommissionState,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Quality reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for ReportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReportState::Pending => "pending",
            ReportState::Approved => "approved",
            ReportState::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ReportState {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportState::Pending),
            "approved" => Ok(ReportState::Approved),
            "rejected" => Ok(ReportState::Rejected),
            other => Err(crate::error::Error::Validation(format!(
                "unknown report state: {other}"
            ))),
        }
    }
}

/// A quality reviewer's findings on a completed service. A ticket can
/// accumulate several over rework cycles, but only one may be pending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub id: ReportId,
    pub service_id: TicketId,
    /// The quality worker who inspected.
    pub worker_id: WorkerId,
    /// Did the inspection checklist pass?
    pub checklist_passed: bool,
    /// 1–5 rating.
    pub rating: i16,
    pub description: String,
    /// Defects found during inspection.
    pub defects: Vec<String>,
    /// Opaque references into the media store.
    pub media: Vec<String>,
    pub state: ReportState,
    /// Who approved or rejected, once resolved.
    pub resolved_by: Option<WorkerId>,
    pub resolution_comments: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for creating service tickets. The store's public API for intake.
pub struct NewTicket {
    pub(crate) vehicle_id: Uuid,
    pub(crate) customer_id: Uuid,
    pub(crate) total: i64,
    pub(crate) estimated_completion: Option<DateTime<Utc>>,
    pub(crate) tasks: Vec<(Role, String, i64)>,
}

impl NewTicket {
    pub fn new(vehicle_id: Uuid, customer_id: Uuid, total: i64) -> Self {
        Self {
            vehicle_id,
            customer_id,
            total,
            estimated_completion: None,
            tasks: Vec::new(),
        }
    }

    pub fn estimated(mut self, when: DateTime<Utc>) -> Self {
        self.estimated_completion = Some(when);
        self
    }

    /// Add a task line. The role becomes required for ticket completion.
    pub fn task(mut self, role: Role, description: impl Into<String>, labor: i64) -> Self {
        self.tasks.push((role, description.into(), labor));
        self
    }
}
