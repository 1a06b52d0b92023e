pub mod campaign;
pub mod discovery_record;
pub mod media;
pub mod vetting_history;

pub use campaign::Campaign;
pub use discovery_record::{DiscoveryRecord, Stage, StageStatus, StatusCount};
pub use media::Media;
pub use vetting_history::VettingHistory;
