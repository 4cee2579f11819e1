//! Layout primitives: shapes, text and bondwires.

use arcstr::ArcStr;
use geometry::prelude::*;
use serde::{Deserialize, Serialize};

use crate::component::ComponentId;
use crate::id::Id;
use crate::layer::LayerId;
use crate::layout::NetId;

/// Identifies a primitive within its owning layout.
pub type PrimitiveId = Id<Primitive>;

/// A primitive layout object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    /// A filled shape on a layer.
    Geometry(Geometry2D),
    /// A text annotation.
    Text(Text),
    /// A wire bonded between two points.
    Bondwire(Bondwire),
}

impl Primitive {
    /// The primitive as a shape, if it is one.
    pub fn as_geometry(&self) -> Option<&Geometry2D> {
        match self {
            Primitive::Geometry(g) => Some(g),
            _ => None,
        }
    }

    /// The primitive as a bondwire, if it is one.
    pub fn as_bondwire(&self) -> Option<&Bondwire> {
        match self {
            Primitive::Bondwire(b) => Some(b),
            _ => None,
        }
    }

    /// The primitive as a mutable bondwire, if it is one.
    pub fn as_bondwire_mut(&mut self) -> Option<&mut Bondwire> {
        match self {
            Primitive::Bondwire(b) => Some(b),
            _ => None,
        }
    }

    /// The primitive as text, if it is text.
    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Primitive::Text(t) => Some(t),
            _ => None,
        }
    }

    /// The net the primitive belongs to, if any.
    pub fn net(&self) -> Option<NetId> {
        match self {
            Primitive::Geometry(g) => g.net,
            Primitive::Text(_) => None,
            Primitive::Bondwire(b) => b.net,
        }
    }
}

/// A shape drawn on a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry2D {
    /// The layer the shape is drawn on.
    pub layer: LayerId,
    /// The net the shape belongs to.
    pub net: Option<NetId>,
    /// The shape, in database units.
    pub shape: Shape,
}

/// A text annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    /// The layer the text is placed on.
    pub layer: Option<LayerId>,
    /// The text content.
    pub text: ArcStr,
    /// The placement of the text origin.
    pub transform: Transformation,
}

impl Text {
    /// The location of the text origin.
    pub fn position(&self) -> Point {
        self.transform.offset_point()
    }
}

/// The vertical shape of a bondwire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BondwireProfile {
    /// A trapezoidal loop rising by the bondwire height near both ends.
    #[default]
    Simple,
    /// A JEDEC-4 loop that rises vertically at the start.
    ///
    /// The angles are in degrees.
    Jedec4 {
        /// The loop height above the start point.
        h1: f64,
        /// The height of the end segment.
        h2: f64,
        /// The take-off angle.
        alpha: f64,
        /// The landing angle.
        beta: f64,
    },
}

/// One end of a bondwire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BondwireEnd {
    /// Bonded to a layer at a fixed location.
    Layer {
        /// The layer bonded to.
        layer: LayerId,
        /// The bond location, in database units.
        point: Point,
        /// Whether the bond lands on the bottom of the layer.
        flipped: bool,
    },
    /// Bonded to a pin of a component.
    Pin {
        /// The component.
        component: ComponentId,
        /// The pin name on the component's definition.
        pin: ArcStr,
    },
}

/// A thin wire carrying current between two bond locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bondwire {
    name: ArcStr,
    net: Option<NetId>,
    radius: f64,
    height: f64,
    material: ArcStr,
    current: f64,
    scenario: usize,
    profile: BondwireProfile,
    start: BondwireEnd,
    end: BondwireEnd,
}

impl Bondwire {
    /// Creates a bondwire between two layer locations.
    ///
    /// `radius` and `height` are in user units; the default current is zero.
    pub fn new(
        name: impl Into<ArcStr>,
        net: Option<NetId>,
        start: BondwireEnd,
        end: BondwireEnd,
        radius: f64,
    ) -> Self {
        Self {
            name: name.into(),
            net,
            radius,
            height: 0.,
            material: ArcStr::new(),
            current: 0.,
            scenario: 0,
            profile: BondwireProfile::Simple,
            start,
            end,
        }
    }

    /// The bondwire name.
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: ArcStr) {
        self.name = name;
    }

    /// The net the bondwire belongs to.
    pub fn net(&self) -> Option<NetId> {
        self.net
    }

    pub(crate) fn set_net(&mut self, net: Option<NetId>) {
        self.net = net;
    }

    /// The wire radius in user units.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Sets the wire radius.
    pub fn set_radius(&mut self, radius: f64) -> &mut Self {
        self.radius = radius;
        self
    }

    /// The loop height above the bond points.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Sets the loop height.
    pub fn set_height(&mut self, height: f64) -> &mut Self {
        self.height = height;
        self
    }

    /// The wire material name.
    pub fn material(&self) -> &ArcStr {
        &self.material
    }

    /// Sets the wire material.
    pub fn set_material(&mut self, material: impl Into<ArcStr>) -> &mut Self {
        self.material = material.into();
        self
    }

    /// The current carried by the wire, in amperes.
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Sets the current carried by the wire.
    pub fn set_current(&mut self, current: f64) -> &mut Self {
        self.current = current;
        self
    }

    /// The excitation scenario that scales this wire's Joule heat.
    pub fn scenario(&self) -> usize {
        self.scenario
    }

    /// Sets the excitation scenario.
    pub fn set_scenario(&mut self, scenario: usize) -> &mut Self {
        self.scenario = scenario;
        self
    }

    /// The loop profile.
    pub fn profile(&self) -> BondwireProfile {
        self.profile
    }

    /// Sets the loop profile.
    pub fn set_profile(&mut self, profile: BondwireProfile) -> &mut Self {
        self.profile = profile;
        self
    }

    /// The start of the wire.
    pub fn start(&self) -> &BondwireEnd {
        &self.start
    }

    /// The end of the wire.
    pub fn end(&self) -> &BondwireEnd {
        &self.end
    }

    /// Binds the start of the wire to a layer location.
    pub fn set_start_layer(&mut self, layer: LayerId, point: Point, flipped: bool) -> &mut Self {
        self.start = BondwireEnd::Layer {
            layer,
            point,
            flipped,
        };
        self
    }

    /// Binds the end of the wire to a layer location.
    pub fn set_end_layer(&mut self, layer: LayerId, point: Point, flipped: bool) -> &mut Self {
        self.end = BondwireEnd::Layer {
            layer,
            point,
            flipped,
        };
        self
    }

    pub(crate) fn set_start(&mut self, start: BondwireEnd) {
        self.start = start;
    }

    pub(crate) fn set_end(&mut self, end: BondwireEnd) {
        self.end = end;
    }

    /// Clears the electrical excitation, leaving only geometric information.
    pub fn clear_current(&mut self) {
        self.current = 0.;
    }
}
