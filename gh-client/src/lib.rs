mod client;
mod errors;
mod pool;
mod types;

pub use client::{GhClient, SearchAllResult};
pub use errors::{FetchError, Result};
pub use pool::{ClientPool, Lease};
pub use types::SearchPage;
