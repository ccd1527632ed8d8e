//! Service lifecycle span helpers.
//!
//! Provides span creation and state-transition recording for tickets
//! flowing through the coordinator and the quality gate.

use tracing::Span;

use crate::model::{Role, TicketId};

/// Start a span for one coordinator or quality-gate operation.
///
/// The `service.state` field is declared empty and can be updated via
/// [`record_state_transition`].
pub fn start_service_span(operation: &str, service_id: TicketId, role: Option<Role>) -> Span {
    let role = role.map(|r| r.to_string());
    tracing::info_span!(
        "service.operation",
        "service.op" = operation,
        "service.id" = %service_id,
        "service.role" = role.as_deref(),
        "service.state" = tracing::field::Empty,
    )
}

/// Record a state transition event on the given span.
///
/// Emits a tracing `info` event scoped to the given span.
pub fn record_state_transition(span: &Span, from: &str, to: &str) {
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "state_transition");
    });
}
