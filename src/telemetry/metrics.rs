//! Metric instrument factories for shopfloor-rs.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"shopfloor-rs"` meter.

use opentelemetry::metrics::{Counter, Meter};

/// Returns the shared meter for shopfloor-rs instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("shopfloor-rs")
}

/// Counter: number of service tickets created.
pub fn tickets_created() -> Counter<u64> {
    meter()
        .u64_counter("shopfloor.tickets.created")
        .with_description("Number of service tickets created")
        .build()
}

/// Counter: ticket status transitions.
/// Labels: `from`, `to`.
pub fn ticket_state_transitions() -> Counter<u64> {
    meter()
        .u64_counter("shopfloor.tickets.state_transitions")
        .with_description("Number of ticket status transitions")
        .build()
}

/// Counter: claim attempts.
/// Labels: `role`, `result` ("ok" | "locked").
pub fn claims() -> Counter<u64> {
    meter()
        .u64_counter("shopfloor.assignments.claims")
        .with_description("Number of claim attempts")
        .build()
}

/// Counter: ledger entry transitions.
/// Labels: `role`, `to`.
pub fn assignment_transitions() -> Counter<u64> {
    meter()
        .u64_counter("shopfloor.assignments.transitions")
        .with_description("Number of assignment state transitions")
        .build()
}

/// Counter: quality review activity.
/// Labels: `result` ("started" | "submitted" | "approved" | "rejected").
pub fn quality_reviews() -> Counter<u64> {
    meter()
        .u64_counter("shopfloor.quality.reviews")
        .with_description("Quality review activity")
        .build()
}

/// Counter: commissions accrued.
/// Labels: `role`.
pub fn commissions_accrued() -> Counter<u64> {
    meter()
        .u64_counter("shopfloor.commissions.accrued")
        .with_description("Number of commission records accrued")
        .build()
}
