use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CollectionError {
    #[error("key must not be empty")]
    EmptyKey,
    #[error("key not found")]
    KeyNotFound,
    #[error("duplicate key `{0}`")]
    DuplicateKey(String),
    #[error("container is empty")]
    EmptyContainer,
    #[error("capacity {requested} out of range with {len} live entries")]
    CapacityOutOfRange { requested: usize, len: usize },
    #[error("maximum capacity reached")]
    MaximumCapacityReached,
}

pub type Result<T> = std::result::Result<T, CollectionError>;
