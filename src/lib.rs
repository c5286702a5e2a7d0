//! Folio: multi-section document generation
//!
//! Generates structured documents section by section over a text-generation backend,
//! running independent sections concurrently and dependent sections in order with
//! compressed context from earlier ones, then persists the result.

pub mod backend;
pub mod cli;
pub mod compress;
pub mod config;
pub mod error;
pub mod fallback;
pub mod generator;
pub mod logging;
pub mod normalize;
pub mod orchestrator;
pub mod persistence;
pub mod pipeline;
pub mod plan;
pub mod prompt;
pub mod provider;
pub mod request;
pub mod store;
