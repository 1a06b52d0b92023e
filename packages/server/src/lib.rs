// Castmatch - Discovery-to-Match Pipeline Core
//
// This crate advances discovery records (candidate campaign/podcast pairings)
// through enrichment, AI description generation, vetting, and match creation.
// Stage runners are independent, idempotent, and coordinate exclusively
// through status fields and typed claim markers on the discovery record.

pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
