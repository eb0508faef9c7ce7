use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("reading router config at {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing router config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("no routing config for task '{0}' and no 'default' task defined")]
    UnknownTask(String),

    #[error("provider '{0}' not configured")]
    UnknownProvider(String),

    #[error("LLM call failed: {0}")]
    Chat(#[from] ai_llm_service::AiLlmError),
}
