pub mod client_quota;
pub mod match_suggestion;
pub mod review_task;

pub use client_quota::ClientQuota;
pub use match_suggestion::MatchSuggestion;
pub use review_task::ReviewTask;
