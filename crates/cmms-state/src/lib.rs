//! # cmms-state — Schedule Lifecycle and Equipment Tree Rules
//!
//! The two pieces of the CMMS stack that carry real invariants. Both are
//! synchronous and free of I/O; the API crate decides how their results
//! are persisted and under which lock.
//!
//! - **Recurrence** (`recurrence.rs`): next-due-date arithmetic and the
//!   completion transition of a scheduled occurrence. Completing an
//!   occurrence stamps the completion date and yields at most one
//!   successor; completing it again is a no-op.
//!
//! - **Hierarchy** (`hierarchy.rs`): an arena of equipment nodes keyed by
//!   id, with name-ordered children, cycle-checked moves and a nested-set
//!   index rebuilt from raw parent pointers.
//!
//! ## Design
//!
//! The completion rule lives in exactly one function,
//! [`recurrence::apply_status`]. Every write path that can change a
//! schedule's status goes through it, so the idempotence guard cannot
//! drift between call sites.

pub mod hierarchy;
pub mod recurrence;

pub use hierarchy::{EquipmentTree, HierarchyError, RawNode, TreePosition};
pub use recurrence::{
    apply_status, complete, is_overdue, next_due_date, Completion, ScheduleError, StatusChange,
};
