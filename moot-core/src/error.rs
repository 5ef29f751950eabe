use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("room is full")]
    RoomFull,

    #[error("broadcaster already exists in this room")]
    BroadcasterExists,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
