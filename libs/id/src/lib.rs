//! # grayframe-id
//!
//! Identifiers for locally created records.
//!
//! Record IDs use a prefixed format: `{prefix}_{ulid}`, for example
//! `task_01HV4Z2WQXKJNM8GPQY6VBKC3D`. Records imported from older backups may
//! carry arbitrary string IDs, so the stores keep IDs as plain strings and only
//! use these types to mint fresh ones.

mod macros;
mod types;

pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
