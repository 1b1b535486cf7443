pub mod record;
pub mod store;

pub use record::{
    DeliveryMode, StageTimings, TranscriptionStatus, UtteranceRecord, PLACEHOLDER_TEXT,
};
pub use store::{JsonRecordStore, RecordStore};
