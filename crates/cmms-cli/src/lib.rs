//! # cmms-cli — CLI Tool for the CMMS Stack
//!
//! Provides the `cmms` command-line interface.
//!
//! ## Subcommands
//!
//! - `cmms next-due` — Print the next due dates of a recurring task.
//! - `cmms tree` — Validate an equipment export and print its tree.
//! - `cmms serve` — Run the API server.
//!
//! ```bash
//! cmms next-due --frequency monthly --from 2025-01-31 --count 3
//! cmms tree equipment.json
//! cmms serve --port 8080
//! ```
//!
//! Every subcommand returns an exit code: 0 on success, 1 when the input
//! is rejected, 2 on an operational error.

pub mod next_due;
pub mod serve;
pub mod tree;
