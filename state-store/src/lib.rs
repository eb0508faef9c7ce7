mod checkpoint;
mod daily_state;
mod errors;
mod failed_dates;
mod fetch_progress;
mod file_store;

pub use checkpoint::{CheckpointStore, LAST_FETCH_DATE, LAST_NORMALIZE_DATE, LAST_SUMMARIZE_DATE};
pub use daily_state::{DailyStateStore, PHASE_FETCH, PHASE_NORMALIZE, PHASE_SUMMARIZE};
pub use errors::{Result, StateError};
pub use failed_dates::{FailedDateStore, FailureEntry, is_permanent_error};
pub use fetch_progress::{ChunkProgress, FetchProgressStore};
