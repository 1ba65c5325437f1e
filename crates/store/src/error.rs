use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("core error: {0}")]
    Core(#[from] ratewatch_core::CoreError),

    #[error("lock poisoned: {0}")]
    Lock(String),

    #[error("{0}")]
    Other(String),
}
