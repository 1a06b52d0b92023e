// Matching domain - quota accounting and match/review-task creation for
// qualifying discovery records.

pub mod match_creator;
pub mod models;

pub use match_creator::{MatchCreator, MatchOutcome, PostgresMatchWriter};
