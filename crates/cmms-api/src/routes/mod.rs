//! # API Route Modules
//!
//! - `vendors` — vendor CRUD; the listing shows active vendors only.
//! - `equipment` — the equipment tree: root listing, nested detail views,
//!   cycle-checked moves and cascading deletes.
//! - `parts` — spare part CRUD with equipment and supplier links.
//! - `tasks` — maintenance and calibration task CRUD.
//! - `schedules` — scheduled occurrences and the completion transition.
//! - `users` — read-only listing of assignable users.

pub mod equipment;
pub mod parts;
pub mod schedules;
pub mod tasks;
pub mod users;
pub mod vendors;

use std::fmt::Display;

use crate::error::AppError;

/// Log a failed write-through and turn it into a 500.
///
/// The in-memory change has already been made (or reverted) by the caller;
/// the client is told the write failed so it does not assume durability.
pub(crate) fn persist_failed(kind: &'static str, id: impl Display, err: sqlx::Error) -> AppError {
    tracing::error!(record = kind, id = %id, error = %err, "failed to persist to database");
    AppError::Internal(format!("{kind} {id} database persist failed"))
}
