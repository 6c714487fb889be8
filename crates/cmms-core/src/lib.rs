#![deny(missing_docs)]

//! # cmms-core — Foundational Types for the CMMS Stack
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies — only `serde`, `serde_json`,
//! `thiserror`, `chrono` and `uuid` from the external ecosystem (plus
//! `utoipa` behind the `openapi` feature).
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** You cannot pass a [`TaskId`]
//!    where a [`ScheduleId`] is expected.
//!
//! 2. **Closed enumerations.** [`Frequency`], [`Priority`], [`TaskType`],
//!    [`LocationStatus`] and [`ScheduleStatus`] reject unknown strings at the
//!    deserialization boundary. Nothing downstream handles "other".
//!
//! 3. **Injected time.** Code that needs "today" takes a [`Clock`] instead of
//!    reading the system time, so tests pin dates with [`FixedClock`].
//!
//! 4. **[`CmmsError`] hierarchy.** Structured errors with `thiserror` — no
//!    `Box<dyn Error>`, no `.unwrap()` outside tests.

pub mod domain;
pub mod error;
pub mod identity;
pub mod model;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use domain::{Frequency, LocationStatus, Priority, ScheduleStatus, TaskType};
pub use error::{CmmsError, ValidationError};
pub use identity::{EquipmentId, PartId, ScheduleId, TaskId, UserId, VendorId};
pub use model::{Equipment, Part, Schedule, Task, User, Vendor};
pub use temporal::{Clock, FixedClock, SystemClock};
