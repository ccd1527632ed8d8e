//! Error types for shopfloor-rs.

use thiserror::Error;

use crate::model::TicketId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("service {service} is locked by an in-progress assignment")]
    AlreadyLocked { service: TicketId },

    #[error("{entity} is {state}, operation not allowed")]
    InvalidState { entity: String, state: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("assignment on service {service} already completed")]
    AlreadyCompleted { service: TicketId },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
