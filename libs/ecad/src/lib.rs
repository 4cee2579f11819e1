//! A hierarchical layout data model for electronic packages.
//!
//! A [`Database`](crate::database::Database) owns cells, materials and the component,
//! padstack and layer map definitions they share. Each cell owns a
//! [`Layout`](crate::layout::Layout): a stackup of layers, nets, primitives, placed
//! components and instances of other cells. Hierarchies are resolved into a single
//! flat layout by [`Database::flatten`](crate::database::Database::flatten).
//!
//! Construction methods return `Option` and log a warning instead of failing when a
//! name is taken or a reference does not resolve.
//!
//! # Examples
//!
//! ```
//! # use ecad::prelude::*;
//! let mut db = Database::new("pkg");
//! let cell = db.create_circuit_cell("top").unwrap();
//! let layout = db.layout_mut(cell).unwrap();
//! let top = layout
//!     .append_layer(Layer::new("Top", LayerType::Conducting, 0.3, 0.3, "Cu", "Air"))
//!     .unwrap();
//! let net = layout.create_net("gnd");
//! assert!(layout.create_geometry_2d(top, net, Rect::from_sides(0, 0, 10, 10)).is_some());
//! assert!(layout.create_net("gnd").is_none());
//! ```
#![warn(missing_docs)]

pub mod archive;
pub mod cell;
pub mod component;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod flatten;
mod id;
pub mod layer;
pub mod layout;
pub mod material;
pub mod padstack;
pub mod prelude;
pub mod primitive;
pub mod retriever;
pub mod script;
pub mod validate;

pub use error::{Error, Result};
pub use id::Id;
