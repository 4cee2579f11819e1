//! Export of bondwires as a 3D modeler automation script.
//!
//! The script creates one wire per bondwire in primitive order, named `Bondwire1`,
//! `Bondwire2`, and so on. Positions are written in user units with an `mm` suffix.

use std::fmt::Write;

use arcstr::ArcStr;

use crate::database::Database;
use crate::error::Result;
use crate::layout::Layout;
use crate::primitive::Bondwire;
use crate::retriever::LayoutRetriever;

/// Names used in the script preamble and wire attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOptions {
    /// The project to activate.
    pub project: ArcStr,
    /// The design to activate within the project.
    pub design: ArcStr,
    /// The wire body material.
    pub material: ArcStr,
    /// The wire surface material.
    pub surface_material: ArcStr,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            project: arcstr::literal!("Project1"),
            design: arcstr::literal!("IcepakDesign1"),
            material: arcstr::literal!("Al-Extruded"),
            surface_material: arcstr::literal!("Steel-oxidised-surface"),
        }
    }
}

/// The placement of one exported wire, in user units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WirePlacement {
    /// The wire diameter.
    pub diameter: f64,
    /// The start position.
    pub start: [f64; 3],
    /// The vector from start to end.
    pub direction: [f64; 3],
    /// The loop height.
    pub height: f64,
}

impl WirePlacement {
    /// The straight-line length between the wire ends.
    pub fn distance(&self) -> f64 {
        self.direction.iter().map(|d| d * d).sum::<f64>().sqrt()
    }
}

/// Computes the placement of a bondwire.
///
/// Returns `None` if an end does not resolve.
pub fn wire_placement(retriever: &LayoutRetriever<'_>, wire: &Bondwire) -> Option<WirePlacement> {
    let units = retriever.coord_units();
    let p0 = retriever.bondwire_end_location(wire.start())?;
    let p1 = retriever.bondwire_end_location(wire.end())?;
    let (z0, z1) = retriever.bondwire_heights(wire)?;
    let start = [units.to_unit(p0.x), units.to_unit(p0.y), z0];
    let end = [units.to_unit(p1.x), units.to_unit(p1.y), z1];
    Some(WirePlacement {
        diameter: wire.radius() * 2.,
        start,
        direction: [end[0] - start[0], end[1] - start[1], end[2] - start[2]],
        height: wire.height(),
    })
}

/// Renders the script creating every bondwire of `layout`.
///
/// Bondwires whose ends do not resolve are skipped with a warning; numbering
/// still counts them so names match primitive order.
pub fn bondwire_script(db: &Database, layout: &Layout, options: &ScriptOptions) -> Result<String> {
    let mut out = String::new();
    write_bondwire_script(&mut out, db, layout, options)?;
    Ok(out)
}

/// Writes the script of [`bondwire_script`] to `out`.
pub fn write_bondwire_script(
    out: &mut impl Write,
    db: &Database,
    layout: &Layout,
    options: &ScriptOptions,
) -> std::fmt::Result {
    let retriever = LayoutRetriever::new(db, layout);
    write_preamble(out, options)?;
    for (index, (id, wire)) in layout.bondwires().enumerate() {
        let Some(placement) = wire_placement(&retriever, wire) else {
            tracing::warn!(?id, bondwire = %wire.name(), "skipping bondwire with an unresolved end");
            continue;
        };
        write_wire(out, index + 1, &placement, options)?;
    }
    Ok(())
}

fn write_preamble(out: &mut impl Write, options: &ScriptOptions) -> std::fmt::Result {
    writeln!(out, "import ScriptEnv")?;
    writeln!(out, "ScriptEnv.Initialize(\"Ansoft.ElectronicsDesktop\")")?;
    writeln!(out, "oDesktop.RestoreWindow()")?;
    writeln!(out, "oProject = oDesktop.SetActiveProject(\"{}\")", options.project)?;
    writeln!(out, "oDesign = oProject.SetActiveDesign(\"{}\")", options.design)?;
    writeln!(out, "oEditor = oDesign.SetActiveEditor(\"3D Modeler\")")
}

fn write_wire(
    out: &mut impl Write,
    index: usize,
    p: &WirePlacement,
    options: &ScriptOptions,
) -> std::fmt::Result {
    writeln!(out, "oEditor.CreateBondwire(")?;
    writeln!(out, "\t[")?;
    writeln!(out, "\t\t\"NAME:BondwireParameters\",")?;
    writeln!(out, "\t\t\"WireType:=\"\t\t, \"LOW\",")?;
    writeln!(out, "\t\t\"WireDiameter:=\"\t, \"{}mm\",", p.diameter)?;
    writeln!(out, "\t\t\"NumSides:=\"\t\t, \"6\",")?;
    writeln!(out, "\t\t\"XPadPos:=\"\t\t, \"{}mm\",", p.start[0])?;
    writeln!(out, "\t\t\"YPadPos:=\"\t\t, \"{}mm\",", p.start[1])?;
    writeln!(out, "\t\t\"ZPadPos:=\"\t\t, \"{}mm\",", p.start[2])?;
    writeln!(out, "\t\t\"XDir:=\"\t\t, \"{}mm\",", p.direction[0])?;
    writeln!(out, "\t\t\"YDir:=\"\t\t, \"{}mm\",", p.direction[1])?;
    writeln!(out, "\t\t\"ZDir:=\"\t\t, \"{}mm\",", p.direction[2])?;
    writeln!(out, "\t\t\"Distance:=\"\t\t, \"{}mm\",", p.distance())?;
    writeln!(out, "\t\t\"h1:=\"\t\t\t, \"{}mm\",", p.height)?;
    writeln!(out, "\t\t\"h2:=\"\t\t\t, \"0mm\",")?;
    writeln!(out, "\t\t\"alpha:=\"\t\t, \"45deg\",")?;
    writeln!(out, "\t\t\"beta:=\"\t\t, \"45deg\",")?;
    writeln!(out, "\t\t\"WhichAxis:=\"\t\t, \"Z\",")?;
    writeln!(out, "\t\t\"ReverseDirection:=\"\t, False")?;
    writeln!(out, "\t], ")?;
    writeln!(out, "\t[")?;
    writeln!(out, "\t\t\"NAME:Attributes\",")?;
    writeln!(out, "\t\t\"Name:=\"\t\t, \"Bondwire{index}\",")?;
    writeln!(out, "\t\t\"Flags:=\"\t\t, \"\",")?;
    writeln!(out, "\t\t\"Color:=\"\t\t, \"(143 175 143)\",")?;
    writeln!(out, "\t\t\"Transparency:=\"\t, 0,")?;
    writeln!(out, "\t\t\"PartCoordinateSystem:=\", \"Global\",")?;
    writeln!(out, "\t\t\"UDMId:=\"\t\t, \"\",")?;
    writeln!(out, "\t\t\"MaterialValue:=\"\t, \"\\\"{}\\\"\",", options.material)?;
    writeln!(
        out,
        "\t\t\"SurfaceMaterialValue:=\", \"\\\"{}\\\"\",",
        options.surface_material
    )?;
    writeln!(out, "\t\t\"SolveInside:=\"\t\t, True,")?;
    writeln!(out, "\t\t\"ShellElement:=\"\t, False,")?;
    writeln!(out, "\t\t\"ShellElementThickness:=\", \"0mm\",")?;
    writeln!(out, "\t\t\"ReferenceTemperature:=\", \"20cel\",")?;
    writeln!(out, "\t\t\"IsMaterialEditable:=\"\t, True,")?;
    writeln!(out, "\t\t\"UseMaterialAppearance:=\", False,")?;
    writeln!(out, "\t\t\"IsLightweight:=\"\t, False")?;
    writeln!(out, "\t])")
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geometry::prelude::*;

    use super::*;
    use crate::component::{ComponentDef, ComponentType, PinIoType};
    use crate::database::BondwireSide;
    use crate::layer::{Layer, LayerType};
    use crate::primitive::BondwireEnd;

    #[test]
    fn wires_are_exported_in_primitive_order() {
        let mut db = Database::new("db");
        let cell = db.create_circuit_cell("top").unwrap();
        let mut def = ComponentDef::new("die", ComponentType::Ic, Rect::from_sides(-1, -1, 1, 1));
        def.set_height(0.2).set_solder_ball_bump_height(0.1);
        def.add_pin("G", Point::zero(), PinIoType::Input);
        let def = db.create_component_def(def).unwrap();

        let layout = db.layout_mut(cell).unwrap();
        let top = layout
            .append_layer(Layer::new("Top", LayerType::Conducting, 1., 0.3, "Cu", "Air"))
            .unwrap();
        let at = |x: i64| BondwireEnd::Layer {
            layer: top,
            point: Point::new(x, 0),
            flipped: false,
        };
        let w1 = layout
            .create_bondwire("a", None, at(1_000_000), at(4_000_000), 0.25)
            .unwrap();
        layout.bondwire_mut(w1).unwrap().set_height(0.5);
        let w2 = layout
            .create_bondwire("b", None, at(0), at(3_000_000), 0.1)
            .unwrap();
        let u1 = db
            .create_component(cell, "U1", def, top, Transformation::identity(), false)
            .unwrap();
        assert!(db.set_bondwire_pin(cell, w2, BondwireSide::Start, u1, "G"));

        let layout = db.layout(cell).unwrap();
        let retriever = LayoutRetriever::new(&db, layout);
        let wire = layout.primitive(w2).and_then(|p| p.as_bondwire()).unwrap();
        let p = wire_placement(&retriever, wire).unwrap();
        // the pin end sits on top of the die body
        assert_relative_eq!(p.start[2], 1.3, epsilon = 1e-12);
        assert_relative_eq!(p.direction[2], -0.3, epsilon = 1e-12);
        assert_relative_eq!(p.distance(), (9. + 0.09f64).sqrt(), epsilon = 1e-9);

        let script = bondwire_script(&db, layout, &ScriptOptions::default()).unwrap();
        assert!(script.starts_with("import ScriptEnv\n"));
        assert_eq!(script.matches("oEditor.CreateBondwire(").count(), 2);
        let first = script.find("\"Bondwire1\"").unwrap();
        let second = script.find("\"Bondwire2\"").unwrap();
        assert!(first < second);
        assert!(script.contains("\"WireDiameter:=\"\t, \"0.5mm\","));
        assert!(script.contains("\"h1:=\"\t\t\t, \"0.5mm\","));
        assert!(script.contains("\"MaterialValue:=\"\t, \"\\\"Al-Extruded\\\"\","));

        let mut full = Full(64);
        let err = write_bondwire_script(&mut full, &db, layout, &ScriptOptions::default());
        assert_eq!(err, Err(std::fmt::Error));
    }

    /// A sink that fails once its capacity in bytes runs out.
    struct Full(usize);

    impl Write for Full {
        fn write_str(&mut self, s: &str) -> std::fmt::Result {
            self.0 = self.0.checked_sub(s.len()).ok_or(std::fmt::Error)?;
            Ok(())
        }
    }
}
