// Discovery domain - candidate (campaign, media) pairings and the
// stage runners that advance them.

pub mod models;
pub mod pipeline;
