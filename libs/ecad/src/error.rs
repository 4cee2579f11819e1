//! Error types for database persistence, export and configuration.

use arcstr::ArcStr;

/// The result type of fallible database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// An error while persisting, loading or configuring databases.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A binary archive could not be written.
    #[error("error encoding binary archive: {0}")]
    BinaryEncode(#[from] flexbuffers::SerializationError),
    /// A binary archive could not be read.
    #[error("error decoding binary archive: {0}")]
    BinaryDecode(#[from] flexbuffers::DeserializationError),
    /// An XML archive could not be written.
    #[error("error encoding xml archive: {0}")]
    XmlEncode(#[from] quick_xml::SeError),
    /// An XML archive could not be parsed.
    #[error("error decoding xml archive: {0}")]
    XmlDecode(#[from] quick_xml::DeError),
    /// An archive parsed but describes an inconsistent database.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),
    /// A configuration file could not be parsed.
    #[error(transparent)]
    Config(#[from] toml::de::Error),
    /// A database with the same name is already live.
    #[error("database `{0}` already exists")]
    DatabaseExists(ArcStr),
    /// Text output could not be formatted.
    #[error("error formatting output")]
    Format(#[from] std::fmt::Error),
    /// No live database has the given name.
    #[error("no database named `{0}`")]
    UnknownDatabase(ArcStr),
}
