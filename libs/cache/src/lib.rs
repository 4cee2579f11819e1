//! A content-addressed on-disk cache for expensive, deterministic computations.
//!
//! Keys are serialized with flexbuffers and hashed with SHA-256; values are stored
//! as flexbuffers blobs under `<root>/<hash(namespace)>/<hash(key)>`. Each entry is
//! guarded by an exclusive file lock, so processes sharing a cache directory never
//! observe a partially written value.
#![warn(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod error;

pub use error::{Error, Result};

lazy_static! {
    /// A regex for matching valid namespaces.
    pub static ref NAMESPACE_REGEX: Regex =
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*\.)*[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// A namespace used for addressing a set of cached items.
///
/// Must match the [`NAMESPACE_REGEX`](static@NAMESPACE_REGEX) regular expression.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Namespace(String);

impl Namespace {
    /// Creates a new [`Namespace`].
    ///
    /// # Panics
    ///
    /// Panics if the provided string does not match [`NAMESPACE_REGEX`](static@NAMESPACE_REGEX).
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace: String = namespace.into();
        if !Namespace::validate(&namespace) {
            panic!(
                "invalid namespace, does not match regex {:?}",
                NAMESPACE_REGEX.as_str(),
            );
        }
        Self(namespace)
    }

    /// Returns `true` if the provided string is a valid namespace.
    pub fn validate(namespace: &str) -> bool {
        NAMESPACE_REGEX.is_match(namespace)
    }

    /// Converts the namespace into its string value.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for Namespace {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Whether a value was read from disk or freshly generated.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CacheStatus {
    /// The value was loaded from an existing entry.
    Hit,
    /// The value was generated and written to the cache.
    Miss,
}

/// The digest identifying a serialized key.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct KeyDigest(Vec<u8>);

impl KeyDigest {
    /// Hashes the flexbuffers encoding of `key`.
    pub fn new(key: &impl Serialize) -> Result<Self> {
        Ok(Self(hash(&flexbuffers::to_vec(key)?)))
    }

    /// The digest as a lowercase hexadecimal string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// A cache rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Opens a cache rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The root directory of the cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the cached value for `key`, generating and storing it on a miss.
    ///
    /// If `force_rebuild` is set, any existing entry is ignored and overwritten.
    /// Entries that fail to deserialize are treated as misses.
    pub fn get_or_generate<K, V, E>(
        &self,
        namespace: &Namespace,
        key: &K,
        force_rebuild: bool,
        generate_fn: impl FnOnce() -> std::result::Result<V, E>,
    ) -> std::result::Result<(V, CacheStatus), E>
    where
        K: Serialize,
        V: Serialize + DeserializeOwned,
        E: From<Error>,
    {
        let digest = KeyDigest::new(key)?;
        let path = self.entry_path(namespace, &digest);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(Error::from)?;
        }
        let lock = EntryLock::acquire(&path).map_err(Error::from)?;

        if !force_rebuild && path.exists() {
            match read_value::<V>(&path) {
                Ok(value) => {
                    tracing::debug!(namespace = %namespace.as_str(), key = %digest.to_hex(), "cache hit");
                    drop(lock);
                    return Ok((value, CacheStatus::Hit));
                }
                Err(err) => {
                    tracing::warn!(path = ?path, "discarding unreadable cache entry: {err}");
                }
            }
        }

        tracing::debug!(namespace = %namespace.as_str(), key = %digest.to_hex(), force_rebuild, "cache miss");
        let value = generate_fn()?;
        write_value(&path, &value)?;
        drop(lock);
        Ok((value, CacheStatus::Miss))
    }

    /// Reads the value stored for `key`, if any.
    pub fn get<K, V>(&self, namespace: &Namespace, key: &K) -> Result<Option<V>>
    where
        K: Serialize,
        V: DeserializeOwned,
    {
        let path = self.entry_path(namespace, &KeyDigest::new(key)?);
        if !path.exists() {
            return Ok(None);
        }
        let _lock = EntryLock::acquire(&path)?;
        read_value(&path).map(Some)
    }

    /// Removes the entry stored for `key`, returning `true` if one existed.
    pub fn invalidate<K: Serialize>(&self, namespace: &Namespace, key: &K) -> Result<bool> {
        let path = self.entry_path(namespace, &KeyDigest::new(key)?);
        if !path.exists() {
            return Ok(false);
        }
        let _lock = EntryLock::acquire(&path)?;
        fs::remove_file(&path)?;
        Ok(true)
    }

    fn entry_path(&self, namespace: &Namespace, digest: &KeyDigest) -> PathBuf {
        self.root
            .join(hex::encode(hash(namespace.as_bytes())))
            .join(digest.to_hex())
    }
}

/// An exclusive advisory lock on a cache entry, released on drop.
struct EntryLock {
    file: File,
}

impl EntryLock {
    fn acquire(entry: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(entry.with_extension("lock"))?;
        fs4::fs_std::FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }
}

impl Drop for EntryLock {
    fn drop(&mut self) {
        if let Err(err) = fs4::fs_std::FileExt::unlock(&self.file) {
            tracing::warn!("failed to release cache entry lock: {err}");
        }
    }
}

fn read_value<V: DeserializeOwned>(path: &Path) -> Result<V> {
    let bytes = fs::read(path)?;
    Ok(flexbuffers::from_slice(&bytes)?)
}

fn write_value<V: Serialize>(path: &Path, value: &V) -> Result<()> {
    let bytes = flexbuffers::to_vec(value)?;
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn hash(val: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(val);
    hasher.finalize()[..].into()
}
