//! # shopfloor-rs
//!
//! Postgres-backed coordination core for an auto-repair-shop portal.
//!
//! Covers the part of the shop that needs multi-actor coordination: the
//! worker assignment ledger (who is working which ticket, claim arbitration
//! under concurrency), the quality-control gate, and commission accrual.
//! Customer/vehicle records, rendering, and sessions live elsewhere.

pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod model;
pub mod policy;
pub mod telemetry;
