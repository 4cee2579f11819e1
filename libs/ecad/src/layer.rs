//! Stackup layers and layer maps between hierarchy levels.

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::id::Id;

/// Identifies a layer within its owning layout.
pub type LayerId = Id<Layer>;

/// The electrical role of a stackup layer.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum LayerType {
    /// A metal layer; shapes on it are filled with the conducting material.
    #[default]
    Conducting,
    /// An insulating layer.
    Dielectric,
}

/// A horizontal slab of the stackup.
///
/// `elevation` is the height of the top surface; the layer occupies
/// `[elevation - thickness, elevation]`. Both are in user units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    name: ArcStr,
    kind: LayerType,
    elevation: f64,
    thickness: f64,
    conducting_material: ArcStr,
    dielectric_material: ArcStr,
}

impl Layer {
    /// Creates a stackup layer.
    pub fn new(
        name: impl Into<ArcStr>,
        kind: LayerType,
        elevation: f64,
        thickness: f64,
        conducting_material: impl Into<ArcStr>,
        dielectric_material: impl Into<ArcStr>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            elevation,
            thickness,
            conducting_material: conducting_material.into(),
            dielectric_material: dielectric_material.into(),
        }
    }

    /// The layer name.
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The layer type.
    pub fn layer_type(&self) -> LayerType {
        self.kind
    }

    /// The height of the top surface.
    pub fn elevation(&self) -> f64 {
        self.elevation
    }

    /// The layer thickness.
    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    /// The height of the bottom surface.
    pub fn bottom(&self) -> f64 {
        self.elevation - self.thickness
    }

    /// The material filling shapes drawn on this layer.
    pub fn conducting_material(&self) -> &ArcStr {
        &self.conducting_material
    }

    /// The material filling the rest of the layer.
    pub fn dielectric_material(&self) -> &ArcStr {
        &self.dielectric_material
    }

    /// Moves the layer to a new top elevation.
    pub fn set_elevation(&mut self, elevation: f64) {
        self.elevation = elevation;
    }
}

/// Identifies a layer map within its owning database.
pub type LayerMapId = Id<LayerMap>;

/// A bidirectional translation table between the layers of two layouts.
///
/// Each source layer maps to at most one target layer and vice versa.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerMap {
    name: ArcStr,
    pairs: Vec<(LayerId, LayerId)>,
}

impl LayerMap {
    /// Creates an empty layer map.
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            pairs: Vec::new(),
        }
    }

    /// The layer map name.
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// Maps `from` to `to`, replacing any mapping that involves either layer.
    ///
    /// ```
    /// # use ecad::layer::*;
    /// let mut map = LayerMap::new("map");
    /// let (a, b, c) = (LayerId::from_raw(0), LayerId::from_raw(1), LayerId::from_raw(2));
    /// map.set_mapping(a, b);
    /// map.set_mapping(c, b);
    /// assert_eq!(map.mapping_forward(a), None);
    /// assert_eq!(map.mapping_backward(b), Some(c));
    /// ```
    pub fn set_mapping(&mut self, from: LayerId, to: LayerId) {
        self.pairs.retain(|(f, t)| *f != from && *t != to);
        self.pairs.push((from, to));
    }

    /// Removes the mapping from `from`, returning the target it mapped to.
    pub fn remove_mapping(&mut self, from: LayerId) -> Option<LayerId> {
        let pos = self.pairs.iter().position(|(f, _)| *f == from)?;
        Some(self.pairs.remove(pos).1)
    }

    /// Looks up the target of `from`.
    pub fn mapping_forward(&self, from: LayerId) -> Option<LayerId> {
        self.pairs.iter().find(|(f, _)| *f == from).map(|(_, t)| *t)
    }

    /// Looks up the source mapped to `to`.
    pub fn mapping_backward(&self, to: LayerId) -> Option<LayerId> {
        self.pairs.iter().find(|(_, t)| *t == to).map(|(f, _)| *f)
    }

    /// The mapped pairs in insertion order.
    pub fn pairs(&self) -> &[(LayerId, LayerId)] {
        &self.pairs
    }

    /// Composes two maps: `self` followed by `next`.
    pub fn compose(&self, next: &LayerMap, name: impl Into<ArcStr>) -> LayerMap {
        let mut out = LayerMap::new(name);
        for (f, t) in &self.pairs {
            if let Some(t2) = next.mapping_forward(*t) {
                out.set_mapping(*f, t2);
            }
        }
        out
    }
}

impl LayerId {
    /// Creates a layer id from a raw layer index.
    pub fn from_raw(index: usize) -> Self {
        Self::from_index(index)
    }
}
