//! # FrameMachine IO
//!
//! Persistence for frame machine programs.
//!
//! This crate provides:
//! - Structured error handling with custom error types
//! - JSON and hex encodings of code frames
//! - Ranked machine export and verified import

/// Error types and result aliases for I/O operations
pub mod error;
/// Exported machine records
pub mod records;
/// Code frame encodings and JSON file helpers
pub mod serialization;

pub use error::{IoError, Result};
pub use records::{export_ranked, read_records, write_records, MachineRecord};
pub use serialization::{
    code_digest, code_frame_from_hex, code_frame_to_hex, from_json, read_json_file, to_json,
    to_json_pretty, write_json_file,
};
