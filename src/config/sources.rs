//! Config file sources, one module per location.

pub mod global_file;
pub mod workspace_file;
