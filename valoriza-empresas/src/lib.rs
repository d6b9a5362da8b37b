//! valoriza-empresas: empresa consolidation from public registries
//!
//! Queries SUNAT and OSCE (through the scraping service), merges their
//! answers with an optional manual form, scores and validates the result,
//! and decides how the empresa can be created.

pub mod config;
pub mod fusion; // Tier 2: field merger
pub mod persistence;
pub mod sources; // Tier 1: source adapters
pub mod types;
pub mod validators; // Tier 3: scorer, validator
pub mod workflow;

pub use config::ConsolidationConfig;
pub use workflow::{ConsolidationOrchestrator, ConsolidationRequest, CreationDecision};
