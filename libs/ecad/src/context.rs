//! The explicit context owning all live databases.

use std::path::Path;

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;
use tracing_subscriber::EnvFilter;

use crate::archive::ArchiveFormat;
use crate::config::EcadConfig;
use crate::database::Database;
use crate::error::{Error, Result};

/// Owns the databases of a session and the configuration they share.
///
/// At most one database per name is live at a time. Dropping the context
/// releases every database it owns.
///
/// ```
/// # use ecad::prelude::*;
/// let mut ctx = Context::init(EcadConfig::default());
/// assert!(ctx.create_database("pkg").is_some());
/// assert!(ctx.create_database("pkg").is_none());
/// assert!(ctx.remove_database("pkg"));
/// ctx.shutdown();
/// ```
#[derive(Debug)]
pub struct Context {
    config: EcadConfig,
    databases: IndexMap<ArcStr, Database>,
}

impl Context {
    /// Creates a context and installs a log subscriber at the configured level.
    ///
    /// `RUST_LOG` overrides the configured level. If a global subscriber is already
    /// installed, it is left in place.
    pub fn init(config: EcadConfig) -> Self {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_tracing_level().as_str()));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        tracing::info!(threads = config.threads(), "initialized context");
        Self {
            config,
            databases: IndexMap::new(),
        }
    }

    /// Releases every database and ends the session.
    pub fn shutdown(self) {}

    /// The configuration of this context.
    pub fn config(&self) -> &EcadConfig {
        &self.config
    }

    /// The default worker thread count.
    pub fn threads(&self) -> usize {
        self.config.threads()
    }

    /// The separator between instance names in hierarchical names.
    pub fn hier_sep(&self) -> char {
        self.config.hier_sep
    }

    /// The number of segments used to approximate circles.
    pub fn circle_div(&self) -> usize {
        self.config.circle_div.max(3)
    }

    /// Approximates a circle with [`circle_div`](Context::circle_div) segments.
    ///
    /// `center` and `radius` are in database units.
    pub fn circle(&self, center: Point, radius: i64) -> Polygon {
        Polygon::circle(center, radius, self.circle_div())
    }

    /// Creates an empty database.
    ///
    /// Returns `None` if a database with the same name is live.
    pub fn create_database(&mut self, name: impl Into<ArcStr>) -> Option<&mut Database> {
        let name = name.into();
        if self.databases.contains_key(&name) {
            tracing::warn!(database = %name, "database already exists");
            return None;
        }
        let mut db = Database::new(name.clone());
        db.set_hier_sep(self.config.hier_sep);
        let (index, _) = self.databases.insert_full(name, db);
        self.databases.get_index_mut(index).map(|(_, db)| db)
    }

    /// Removes a database, returning `true` if it was live.
    pub fn remove_database(&mut self, name: &str) -> bool {
        self.databases.shift_remove(name).is_some()
    }

    /// Returns the live database with the given name.
    pub fn database(&self, name: &str) -> Option<&Database> {
        self.databases.get(name)
    }

    /// Returns the live database with the given name mutably.
    pub fn database_mut(&mut self, name: &str) -> Option<&mut Database> {
        self.databases.get_mut(name)
    }

    /// The names of the live databases.
    pub fn database_names(&self) -> impl Iterator<Item = &ArcStr> {
        self.databases.keys()
    }

    /// Saves a live database to a file.
    pub fn save_database(
        &self,
        name: &str,
        path: impl AsRef<Path>,
        format: ArchiveFormat,
    ) -> Result<()> {
        let db = self
            .database(name)
            .ok_or_else(|| Error::UnknownDatabase(name.into()))?;
        crate::archive::save(db, path, format)
    }

    /// Loads a database from a file and makes it live under its stored name.
    ///
    /// Fails if a database with that name is already live.
    pub fn load_database(
        &mut self,
        path: impl AsRef<Path>,
        format: ArchiveFormat,
    ) -> Result<&mut Database> {
        let db = crate::archive::load(path, format)?;
        let name = db.name().clone();
        if self.databases.contains_key(&name) {
            return Err(Error::DatabaseExists(name));
        }
        let (index, _) = self.databases.insert_full(name.clone(), db);
        self.databases
            .get_index_mut(index)
            .map(|(_, db)| db)
            .ok_or(Error::UnknownDatabase(name))
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        tracing::debug!(databases = self.databases.len(), "shutting down context");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circles_follow_the_configured_division() {
        let ctx = Context::init(EcadConfig {
            circle_div: 32,
            ..Default::default()
        });
        let pad = ctx.circle(Point::new(1_000, 0), 500);
        assert_eq!(pad.points().len(), 32);
        assert!(pad.contains_point(Point::new(1_000, 0)));

        let coarse = Context::init(EcadConfig {
            circle_div: 1,
            ..Default::default()
        });
        assert_eq!(coarse.circle_div(), 3);
        assert_eq!(coarse.circle(Point::zero(), 500).points().len(), 3);
    }

    #[test_log::test]
    fn load_rejects_live_names() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pkg.bin");
        let mut ctx = Context::init(EcadConfig::default());
        ctx.create_database("pkg").unwrap().create_circuit_cell("top");
        ctx.save_database("pkg", &path, ArchiveFormat::Binary)?;

        assert!(matches!(
            ctx.load_database(&path, ArchiveFormat::Binary),
            Err(Error::DatabaseExists(_))
        ));
        assert!(ctx.remove_database("pkg"));
        let db = ctx.load_database(&path, ArchiveFormat::Binary)?;
        assert!(db.find_cell_by_name("top").is_some());
        assert!(matches!(
            ctx.save_database("missing", &path, ArchiveFormat::Xml),
            Err(Error::UnknownDatabase(_))
        ));
        Ok(())
    }
}
