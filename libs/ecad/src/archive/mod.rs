//! Saving and loading databases.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::Result;

mod xml;

/// The on-disk encoding of a database archive.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// A compact binary encoding.
    #[default]
    Binary,
    /// A human-readable XML document.
    Xml,
}

/// Encodes a database as a binary archive.
pub fn to_bytes(db: &Database) -> Result<Vec<u8>> {
    Ok(flexbuffers::to_vec(db)?)
}

/// Decodes a database from a binary archive.
pub fn from_bytes(bytes: &[u8]) -> Result<Database> {
    Ok(flexbuffers::from_slice(bytes)?)
}

/// Encodes a database as an XML document.
pub fn to_xml_string(db: &Database) -> Result<String> {
    xml::to_string(db)
}

/// Decodes a database from an XML document.
pub fn from_xml_str(s: &str) -> Result<Database> {
    xml::from_str(s)
}

/// Writes a database to `path`.
pub fn save(db: &Database, path: impl AsRef<Path>, format: ArchiveFormat) -> Result<()> {
    let path = path.as_ref();
    let _span = tracing::debug_span!("save_database", db = %db.name(), ?format).entered();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    match format {
        ArchiveFormat::Binary => fs::write(path, to_bytes(db)?)?,
        ArchiveFormat::Xml => fs::write(path, to_xml_string(db)?)?,
    }
    tracing::info!(path = %path.display(), "saved database");
    Ok(())
}

/// Reads a database from `path`.
pub fn load(path: impl AsRef<Path>, format: ArchiveFormat) -> Result<Database> {
    let path = path.as_ref();
    let _span = tracing::debug_span!("load_database", path = %path.display(), ?format).entered();
    let db = match format {
        ArchiveFormat::Binary => from_bytes(&fs::read(path)?)?,
        ArchiveFormat::Xml => from_xml_str(&fs::read_to_string(path)?)?,
    };
    tracing::info!(db = %db.name(), cells = db.cells().len(), "loaded database");
    Ok(db)
}

#[cfg(test)]
mod tests;
