pub mod errors;
pub mod fetcher;
pub mod github_json;
pub mod model;
pub mod noise;
pub mod normalizer;
pub mod orchestrator;
pub mod outcome;
pub mod paths;
pub mod summarizer;

pub use errors::{FetchError, FetchResult, NormalizeError, NormalizeResult, StepFailedError, SummarizeError, SummarizeResult};
pub use fetcher::{FetchPaths, Fetcher};
pub use model::{Activity, ActivityKind, DailyStats, SourceType, ALL_SOURCES};
pub use normalizer::Normalizer;
pub use orchestrator::Orchestrator;
pub use outcome::{DateOutcome, OutcomeStatus};
pub use summarizer::Summarizer;
