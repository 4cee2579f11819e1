//! Cache error types.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] flexbuffers::SerializationError),
    #[error(transparent)]
    Deserialization(#[from] flexbuffers::DeserializationError),
}
