/// All fields optional: an unset variable disables the corresponding sink
/// rather than failing configuration loading.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub database_url: Option<String>,
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub qdrant_collection: String,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env_opt("DATABASE_URL"),
            qdrant_url: env_opt("QDRANT_URL"),
            qdrant_api_key: env_opt("QDRANT_API_KEY"),
            qdrant_collection: env_opt("QDRANT_COLLECTION").unwrap_or_else(|| "work_recap".to_string()),
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
