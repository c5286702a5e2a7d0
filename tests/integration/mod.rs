//! Integration tests for the Folio document generation pipeline

mod config_integration;
mod interruption;
mod pipeline_end_to_end;
mod streaming;
pub mod test_utils;
