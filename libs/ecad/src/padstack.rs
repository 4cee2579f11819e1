//! Padstack definitions and instances.

use arcstr::ArcStr;
use geometry::prelude::*;
use serde::{Deserialize, Serialize};

use crate::id::Id;
use crate::layer::LayerId;
use crate::layout::NetId;

/// Identifies a padstack definition within its owning database.
pub type PadstackDefId = Id<PadstackDef>;
/// Identifies a padstack instance within its owning layout.
pub type PadstackInstId = Id<PadstackInst>;

/// A shape placed relative to the padstack origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadShape {
    /// The pad outline, centered at the origin.
    pub shape: Shape,
    /// The offset of the pad from the padstack origin.
    pub offset: Point,
    /// The rotation of the pad in degrees.
    pub rotation: f64,
}

impl PadShape {
    /// The pad outline relative to the padstack origin.
    pub fn placed(&self) -> Shape {
        self.shape.clone().transform(Transformation::from_parts(
            1.,
            self.rotation.to_radians(),
            Mirror::No,
            self.offset,
        ))
    }
}

/// The shared definition of a padstack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PadstackDef {
    name: ArcStr,
    material: ArcStr,
    layers: Vec<ArcStr>,
    pads: Vec<Option<PadShape>>,
    via: Option<PadShape>,
}

impl PadstackDef {
    /// Creates an empty padstack definition.
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The definition name.
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The via fill material.
    pub fn material(&self) -> &ArcStr {
        &self.material
    }

    /// Sets the via fill material.
    pub fn set_material(&mut self, material: impl Into<ArcStr>) -> &mut Self {
        self.material = material.into();
        self
    }

    /// Sets the names of the layers the padstack has pads on, top first.
    ///
    /// Pads set previously for layers that remain are kept.
    pub fn set_layers(&mut self, layers: impl IntoIterator<Item = impl Into<ArcStr>>) -> &mut Self {
        let layers: Vec<ArcStr> = layers.into_iter().map(Into::into).collect();
        let pads = layers
            .iter()
            .map(|name| {
                self.layers
                    .iter()
                    .position(|l| l == name)
                    .and_then(|i| self.pads[i].clone())
            })
            .collect();
        self.layers = layers;
        self.pads = pads;
        self
    }

    /// The padstack layer names, top first.
    pub fn layers(&self) -> &[ArcStr] {
        &self.layers
    }

    /// Sets the pad on a named layer.
    ///
    /// Returns `false` if the layer is not one of the padstack layers.
    pub fn set_pad(&mut self, layer: &str, shape: Shape, offset: Point, rotation: f64) -> bool {
        let Some(i) = self.layers.iter().position(|l| l == layer) else {
            tracing::warn!(padstack = %self.name, layer, "pad layer is not in the padstack");
            return false;
        };
        self.pads[i] = Some(PadShape {
            shape,
            offset,
            rotation,
        });
        true
    }

    /// The pad on a named layer.
    pub fn pad(&self, layer: &str) -> Option<&PadShape> {
        let i = self.layers.iter().position(|l| l == layer)?;
        self.pads[i].as_ref()
    }

    /// Sets the via shape.
    pub fn set_via(&mut self, shape: Shape, offset: Point, rotation: f64) -> &mut Self {
        self.via = Some(PadShape {
            shape,
            offset,
            rotation,
        });
        self
    }

    /// The via shape.
    pub fn via(&self) -> Option<&PadShape> {
        self.via.as_ref()
    }
}

/// A padstack placed in a layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadstackInst {
    /// The instance name.
    pub name: ArcStr,
    /// The placed definition.
    pub def: PadstackDefId,
    /// The topmost layer spanned.
    pub top_layer: LayerId,
    /// The bottommost layer spanned.
    pub bot_layer: LayerId,
    /// The net the padstack connects to.
    pub net: Option<NetId>,
    /// The placement of the definition.
    pub transform: Transformation,
    /// Whether the padstack is a terminal of the layout.
    pub is_layout_pin: bool,
}

impl PadstackInst {
    /// The location of the padstack origin.
    pub fn position(&self) -> Point {
        self.transform.offset_point()
    }
}
