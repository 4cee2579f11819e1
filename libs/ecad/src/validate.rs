//! Consistency checks over cells and their references.

use std::fmt::Display;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::cell::CellId;
use crate::database::Database;
use crate::layout::Layout;
use crate::primitive::{BondwireEnd, Primitive};

/// An enumeration of possible severity levels.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Severity {
    /// An informational message.
    Info,
    /// A warning.
    #[default]
    Warning,
    /// An error. Extraction of a layout with errors fails or gives wrong results.
    Error,
}

impl Severity {
    /// Returns `true` if the severity is [`Severity::Error`].
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(*self, Self::Error)
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// The cause of a validation issue.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Cause {
    /// A reference to a layer that does not exist.
    #[error("unknown layer {0}")]
    UnknownLayer(usize),
    /// A reference to a net that does not exist.
    #[error("unknown net {0}")]
    UnknownNet(usize),
    /// A reference to a component that does not exist.
    #[error("unknown component {0}")]
    UnknownComponent(usize),
    /// A reference to a pin its component's definition lacks.
    #[error("component `{component}` has no pin `{pin}`")]
    UnknownPin {
        /// The component name.
        component: ArcStr,
        /// The pin name.
        pin: ArcStr,
    },
    /// A reference to a component definition that does not exist.
    #[error("unknown component definition {0}")]
    UnknownComponentDef(usize),
    /// A reference to a padstack definition that does not exist.
    #[error("unknown padstack definition {0}")]
    UnknownPadstackDef(usize),
    /// A cell instance of a cell that does not exist.
    #[error("unknown cell {0}")]
    UnknownCell(usize),
    /// A cell instance with a layer map that does not exist.
    #[error("unknown layer map {0}")]
    UnknownLayerMap(usize),
    /// A material name with no definition.
    #[error("unknown material `{0}`")]
    UnknownMaterial(ArcStr),
    /// A shape enclosing no area.
    #[error("degenerate shape")]
    DegenerateShape,
    /// A layer with zero or negative thickness.
    #[error("non-positive layer thickness")]
    NonPositiveThickness,
}

/// A problem found while validating a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// The cell containing the problem.
    pub cell: ArcStr,
    /// The name of the offending object, or its kind if it is unnamed.
    pub object: ArcStr,
    /// What is wrong.
    pub cause: Cause,
}

impl Issue {
    /// The severity of the issue.
    pub fn severity(&self) -> Severity {
        match self.cause {
            Cause::DegenerateShape => Severity::Warning,
            Cause::UnknownMaterial(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} in cell `{}`: {}",
            self.severity(),
            self.object,
            self.cell,
            self.cause
        )
    }
}

/// A collection of issues.
#[derive(Debug, Clone, Default)]
pub struct IssueSet {
    issues: Vec<Issue>,
    num_errors: usize,
    num_warnings: usize,
}

impl IssueSet {
    /// Creates a new, empty issue set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the given issue to the issue set.
    pub fn add(&mut self, issue: Issue) {
        match issue.severity() {
            Severity::Error => self.num_errors += 1,
            Severity::Warning => self.num_warnings += 1,
            Severity::Info => (),
        }
        self.issues.push(issue);
    }

    /// Returns an iterator over all issues in the set.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter()
    }

    /// The number of issues in this issue set.
    #[inline]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns `true` if this issue set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns `true` if this issue set contains an error.
    pub fn has_error(&self) -> bool {
        self.num_errors > 0
    }

    /// The number of errors in this issue set.
    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    /// The number of warnings in this issue set.
    pub fn num_warnings(&self) -> usize {
        self.num_warnings
    }
}

impl IntoIterator for IssueSet {
    type Item = Issue;
    type IntoIter = std::vec::IntoIter<Issue>;
    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

impl Display for IssueSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for issue in self.issues.iter() {
            writeln!(f, "{}", issue)?;
        }
        Ok(())
    }
}

struct Checker<'a> {
    db: &'a Database,
    layout: &'a Layout,
    cell: ArcStr,
    issues: &'a mut IssueSet,
}

impl Checker<'_> {
    fn report(&mut self, object: impl Into<ArcStr>, cause: Cause) {
        let issue = Issue {
            cell: self.cell.clone(),
            object: object.into(),
            cause,
        };
        tracing::debug!("{issue}");
        self.issues.add(issue);
    }

    fn material(&mut self, object: &ArcStr, name: &ArcStr) {
        if !name.is_empty() && self.db.find_material_by_name(name).is_none() {
            self.report(object.clone(), Cause::UnknownMaterial(name.clone()));
        }
    }

    fn end(&mut self, object: &ArcStr, end: &BondwireEnd) {
        let (db, layout) = (self.db, self.layout);
        match end {
            BondwireEnd::Layer { layer, .. } => {
                if layout.layer(*layer).is_none() {
                    self.report(object.clone(), Cause::UnknownLayer(layer.index()));
                }
            }
            BondwireEnd::Pin { component, pin } => {
                let Some(comp) = layout.component(*component) else {
                    self.report(object.clone(), Cause::UnknownComponent(component.index()));
                    return;
                };
                let found = db
                    .component_def(comp.def())
                    .is_some_and(|def| def.pin(pin).is_some());
                if !found {
                    let cause = Cause::UnknownPin {
                        component: comp.name().clone(),
                        pin: pin.clone(),
                    };
                    self.report(object.clone(), cause);
                }
            }
        }
    }

    fn run(&mut self) {
        let (db, layout) = (self.db, self.layout);
        for (_, layer) in layout.layers() {
            if layer.thickness() <= 0. {
                self.report(layer.name().clone(), Cause::NonPositiveThickness);
            }
            self.material(layer.name(), layer.conducting_material());
            self.material(layer.name(), layer.dielectric_material());
        }
        if layout.boundary().is_some_and(|b| b.is_degenerate()) {
            self.report("boundary", Cause::DegenerateShape);
        }
        for (id, prim) in layout.primitives() {
            let object = ArcStr::from(format!("primitive {}", id.index()));
            if let Some(net) = prim.net() {
                if layout.net(net).is_none() {
                    self.report(object.clone(), Cause::UnknownNet(net.index()));
                }
            }
            match prim {
                Primitive::Geometry(geom) => {
                    if layout.layer(geom.layer).is_none() {
                        self.report(object.clone(), Cause::UnknownLayer(geom.layer.index()));
                    }
                    if geom.shape.is_degenerate() {
                        self.report(object, Cause::DegenerateShape);
                    }
                }
                Primitive::Text(text) => {
                    if let Some(layer) = text.layer.filter(|l| layout.layer(*l).is_none()) {
                        self.report(object, Cause::UnknownLayer(layer.index()));
                    }
                }
                Primitive::Bondwire(wire) => {
                    let name = wire.name().clone();
                    self.end(&name, wire.start());
                    self.end(&name, wire.end());
                    self.material(&name, wire.material());
                }
            }
        }
        for (_, comp) in layout.components() {
            if layout.layer(comp.layer()).is_none() {
                self.report(comp.name().clone(), Cause::UnknownLayer(comp.layer().index()));
            }
            match db.component_def(comp.def()) {
                Some(def) => self.material(comp.name(), def.material()),
                None => self.report(comp.name().clone(), Cause::UnknownComponentDef(comp.def().index())),
            }
        }
        for (_, pad) in layout.padstack_insts() {
            for layer in [pad.top_layer, pad.bot_layer] {
                if layout.layer(layer).is_none() {
                    self.report(pad.name.clone(), Cause::UnknownLayer(layer.index()));
                }
            }
            if let Some(net) = pad.net.filter(|n| layout.net(*n).is_none()) {
                self.report(pad.name.clone(), Cause::UnknownNet(net.index()));
            }
            if db.padstack_def(pad.def).is_none() {
                self.report(pad.name.clone(), Cause::UnknownPadstackDef(pad.def.index()));
            }
        }
        for (_, inst) in layout.cell_insts() {
            if db.try_cell(inst.def()).is_none() {
                self.report(inst.name().clone(), Cause::UnknownCell(inst.def().index()));
            }
            if let Some(map) = inst.layer_map() {
                if db.layer_map(map).is_none() {
                    self.report(inst.name().clone(), Cause::UnknownLayerMap(map.index()));
                }
            }
        }
    }
}

impl Database {
    /// Checks a cell for unresolved references and suspicious geometry.
    ///
    /// Returns an empty set if the cell does not exist.
    pub fn validate(&self, cell: CellId) -> IssueSet {
        let mut issues = IssueSet::new();
        if let Some(c) = self.try_cell(cell) {
            Checker {
                db: self,
                layout: c.layout(),
                cell: c.name().clone(),
                issues: &mut issues,
            }
            .run();
        }
        issues
    }

    /// Checks every cell in the database.
    pub fn validate_all(&self) -> IssueSet {
        let mut issues = IssueSet::new();
        for (_, c) in self.cells() {
            Checker {
                db: self,
                layout: c.layout(),
                cell: c.name().clone(),
                issues: &mut issues,
            }
            .run();
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use geometry::prelude::*;

    use super::*;
    use crate::component::{ComponentDef, ComponentType};
    use crate::layer::{Layer, LayerType};
    use crate::material::MaterialDef;

    #[test]
    fn clean_cell_has_no_issues() {
        let mut db = Database::new("db");
        db.create_material_def(MaterialDef::new("Cu")).unwrap();
        db.create_material_def(MaterialDef::new("Air")).unwrap();
        let cell = db.create_circuit_cell("top").unwrap();
        let layout = db.layout_mut(cell).unwrap();
        let l = layout
            .append_layer(Layer::new("L0", LayerType::Conducting, 0., 1., "Cu", "Air"))
            .unwrap();
        layout.set_boundary(Rect::from_sides(0, 0, 100, 100));
        layout.create_geometry_2d(l, None, Rect::from_sides(0, 0, 10, 10));

        let issues = db.validate(cell);
        assert!(issues.is_empty(), "{issues}");
    }

    #[test]
    fn dangling_references_are_errors() {
        let mut db = Database::new("db");
        let cell = db.create_circuit_cell("top").unwrap();
        let def = db
            .create_component_def(ComponentDef::new(
                "die",
                ComponentType::Ic,
                Rect::from_sides(0, 0, 1, 1),
            ))
            .unwrap();
        let layout = db.layout_mut(cell).unwrap();
        let l = layout
            .append_layer(Layer::new("L0", LayerType::Conducting, 0., 0., "Cu", "Air"))
            .unwrap();
        layout.create_geometry_2d(l, None, Rect::from_sides(0, 0, 0, 10));
        let comp = layout
            .create_component("U1", def, l, Transformation::identity(), false)
            .unwrap();
        let start = BondwireEnd::Pin {
            component: comp,
            pin: "nope".into(),
        };
        let end = BondwireEnd::Layer {
            layer: l,
            point: Point::zero(),
            flipped: false,
        };
        layout.create_bondwire("bw", None, start, end, 0.1).unwrap();

        let issues = db.validate(cell);
        assert!(issues.has_error());
        let causes: Vec<_> = issues.iter().map(|i| i.cause.clone()).collect();
        assert!(causes.contains(&Cause::NonPositiveThickness));
        assert!(causes.contains(&Cause::DegenerateShape));
        assert!(causes.contains(&Cause::UnknownPin {
            component: "U1".into(),
            pin: "nope".into()
        }));
        assert!(causes.contains(&Cause::UnknownMaterial("Cu".into())));
    }
}
