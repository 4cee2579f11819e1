//! Component definitions and placed component instances.

use arcstr::ArcStr;
use geometry::prelude::*;
use serde::{Deserialize, Serialize};

use crate::id::Id;
use crate::layer::LayerId;
use crate::material::interpolate;

/// Identifies a component definition within its owning database.
pub type ComponentDefId = Id<ComponentDef>;
/// Identifies a component within its owning layout.
pub type ComponentId = Id<Component>;

/// The role of a component.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    /// Any other component.
    #[default]
    Other,
    /// A die or packaged integrated circuit.
    Ic,
    /// An I/O terminal.
    Io,
    /// A molding compound block.
    Molding,
}

/// Pin directions.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum PinIoType {
    /// Input.
    Input,
    /// Output.
    Output,
    /// Input or output.
    #[default]
    InOut,
}

/// A named connection point on a component definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    /// The pin name.
    pub name: ArcStr,
    /// The pin location relative to the component origin, in database units.
    pub location: Point,
    /// The pin direction.
    pub io: PinIoType,
}

/// The shared definition of a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDef {
    name: ArcStr,
    kind: ComponentType,
    boundary: Rect,
    height: f64,
    material: ArcStr,
    solder_ball_bump_height: f64,
    solder_filling_material: ArcStr,
    pins: Vec<Pin>,
}

impl ComponentDef {
    /// Creates a component definition with the given body outline and no pins.
    pub fn new(name: impl Into<ArcStr>, kind: ComponentType, boundary: Rect) -> Self {
        Self {
            name: name.into(),
            kind,
            boundary,
            height: 0.,
            material: ArcStr::new(),
            solder_ball_bump_height: 0.,
            solder_filling_material: ArcStr::new(),
            pins: Vec::new(),
        }
    }

    /// The definition name.
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The component role.
    pub fn component_type(&self) -> ComponentType {
        self.kind
    }

    /// The body outline relative to the component origin.
    pub fn boundary(&self) -> Rect {
        self.boundary
    }

    /// Sets the body outline.
    pub fn set_boundary(&mut self, boundary: Rect) -> &mut Self {
        self.boundary = boundary;
        self
    }

    /// The body height in user units.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Sets the body height.
    pub fn set_height(&mut self, height: f64) -> &mut Self {
        self.height = height;
        self
    }

    /// The body material name.
    pub fn material(&self) -> &ArcStr {
        &self.material
    }

    /// Sets the body material.
    pub fn set_material(&mut self, material: impl Into<ArcStr>) -> &mut Self {
        self.material = material.into();
        self
    }

    /// The height of the solder bumps under the body.
    pub fn solder_ball_bump_height(&self) -> f64 {
        self.solder_ball_bump_height
    }

    /// Sets the solder bump height.
    pub fn set_solder_ball_bump_height(&mut self, height: f64) -> &mut Self {
        self.solder_ball_bump_height = height;
        self
    }

    /// The material filling the bump gap.
    pub fn solder_filling_material(&self) -> &ArcStr {
        &self.solder_filling_material
    }

    /// Sets the bump filling material.
    pub fn set_solder_filling_material(&mut self, material: impl Into<ArcStr>) -> &mut Self {
        self.solder_filling_material = material.into();
        self
    }

    /// Adds a pin.
    ///
    /// Returns `false` and leaves the definition unchanged if a pin with the same name exists.
    pub fn add_pin(&mut self, name: impl Into<ArcStr>, location: Point, io: PinIoType) -> bool {
        let name = name.into();
        if self.pin(&name).is_some() {
            tracing::warn!(def = %self.name, pin = %name, "duplicate pin name");
            return false;
        }
        self.pins.push(Pin { name, location, io });
        true
    }

    /// Looks up a pin by name.
    pub fn pin(&self, name: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.name == name)
    }

    /// The pins in insertion order.
    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }
}

/// Loss power as a function of temperature.
///
/// Samples are `(celsius, watts)` pairs kept sorted by temperature. Lookups between samples
/// interpolate linearly; lookups outside the sampled range clamp to the nearest sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossPowerTable {
    samples: Vec<(f64, f64)>,
}

impl LossPowerTable {
    /// Creates a table from samples in any order.
    pub fn new(samples: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut table = Self::default();
        for (t, p) in samples {
            table.insert(t, p);
        }
        table
    }

    /// A temperature-independent loss.
    pub fn constant(watts: f64) -> Self {
        Self {
            samples: vec![(25., watts)],
        }
    }

    /// Inserts a sample, replacing any sample at the same temperature.
    pub fn insert(&mut self, celsius: f64, watts: f64) {
        match self
            .samples
            .binary_search_by(|(t, _)| t.total_cmp(&celsius))
        {
            Ok(i) => self.samples[i].1 = watts,
            Err(i) => self.samples.insert(i, (celsius, watts)),
        }
    }

    /// The loss in watts at `celsius`. An empty table has no loss.
    ///
    /// ```
    /// # use ecad::component::LossPowerTable;
    /// let table = LossPowerTable::new([(125., 120.), (25., 100.)]);
    /// assert_eq!(table.power(75.), 110.);
    /// assert_eq!(table.power(-40.), 100.);
    /// ```
    pub fn power(&self, celsius: f64) -> f64 {
        interpolate(&self.samples, celsius)
    }

    /// The sorted samples.
    pub fn samples(&self) -> &[(f64, f64)] {
        &self.samples
    }

    /// Returns `true` if the table has no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A component definition placed on a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    name: ArcStr,
    def: ComponentDefId,
    layer: LayerId,
    transform: Transformation,
    flipped: bool,
    loss_power: LossPowerTable,
    scenario: usize,
}

impl Component {
    pub(crate) fn new(
        name: ArcStr,
        def: ComponentDefId,
        layer: LayerId,
        transform: Transformation,
        flipped: bool,
    ) -> Self {
        Self {
            name,
            def,
            layer,
            transform,
            flipped,
            loss_power: LossPowerTable::default(),
            scenario: 0,
        }
    }

    /// The instance name.
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: ArcStr) {
        self.name = name;
    }

    /// The definition this component places.
    pub fn def(&self) -> ComponentDefId {
        self.def
    }

    /// The layer the component is mounted on.
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub(crate) fn set_layer(&mut self, layer: LayerId) {
        self.layer = layer;
    }

    /// The placement of the definition in layout coordinates.
    pub fn transform(&self) -> &Transformation {
        &self.transform
    }

    pub(crate) fn set_transform(&mut self, transform: Transformation) {
        self.transform = transform;
    }

    /// Whether the component hangs below its layer instead of sitting on top.
    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// The temperature-dependent loss of the component.
    pub fn loss_power(&self) -> &LossPowerTable {
        &self.loss_power
    }

    /// Replaces the loss table.
    pub fn set_loss_power(&mut self, table: LossPowerTable) -> &mut Self {
        self.loss_power = table;
        self
    }

    /// The excitation scenario that scales this component's loss.
    pub fn scenario(&self) -> usize {
        self.scenario
    }

    /// Sets the excitation scenario.
    pub fn set_scenario(&mut self, scenario: usize) -> &mut Self {
        self.scenario = scenario;
        self
    }

    /// The body outline in layout coordinates.
    pub fn footprint(&self, def: &ComponentDef) -> Shape {
        Shape::Rect(def.boundary()).transform(self.transform)
    }

    /// The location of a pin in layout coordinates.
    pub fn pin_location(&self, def: &ComponentDef, pin: &str) -> Option<Point> {
        def.pin(pin).map(|p| p.location.transform(self.transform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn loss_table_sorts_replaces_and_clamps() {
        let mut t = LossPowerTable::new([(150., 130.), (25., 108.)]);
        t.insert(25., 100.);
        assert_eq!(t.samples(), &[(25., 100.), (150., 130.)]);
        assert_relative_eq!(t.power(87.5), 115.);
        assert_relative_eq!(t.power(400.), 130.);
        assert_eq!(LossPowerTable::default().power(25.), 0.);
    }

    #[test]
    fn duplicate_pins_are_rejected() {
        let mut def = ComponentDef::new("die", ComponentType::Ic, Rect::from_sides(-10, -10, 10, 10));
        assert!(def.add_pin("G", Point::new(1, 2), PinIoType::Input));
        assert!(!def.add_pin("G", Point::new(3, 4), PinIoType::Output));
        assert_eq!(def.pins().len(), 1);
        assert_eq!(def.pin("G").map(|p| p.location), Some(Point::new(1, 2)));
    }

    #[test]
    fn pin_location_follows_placement() {
        let mut def = ComponentDef::new("die", ComponentType::Ic, Rect::from_sides(-10, -5, 10, 5));
        def.add_pin("S", Point::new(5, 0), PinIoType::InOut);
        let comp = Component::new(
            "U1".into(),
            ComponentDefId::from_index(0),
            LayerId::from_raw(0),
            Transformation::from_parts(1., std::f64::consts::FRAC_PI_2, Mirror::No, Point::new(100, 0)),
            false,
        );
        assert_eq!(comp.pin_location(&def, "S"), Some(Point::new(100, 5)));
        assert_eq!(
            comp.footprint(&def).bbox(),
            Some(Rect::from_sides(95, -10, 105, 10))
        );
    }
}
