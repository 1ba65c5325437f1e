use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] ratewatch_store::StoreError),

    #[error("{0}")]
    Other(String),
}
