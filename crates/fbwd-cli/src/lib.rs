//! Library side of the `fbwd` binary.
//!
//! - [`batch`]: QID collection → `MID → QID` dictionary.
//! - [`persist`]: JSON input/output for the batch and for the property table.

pub mod batch;
pub mod persist;

pub use batch::{convert_qids, convert_qids_with, BatchOptions, BatchReport};
