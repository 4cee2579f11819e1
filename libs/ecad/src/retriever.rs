//! Derived geometric quantities of a layout.
//!
//! Vertical quantities (elevations, thicknesses, heights) are in user units. Planar
//! quantities returned as `f64` are converted from database units with the database's
//! [`CoordUnits`].

use geometry::prelude::*;

use crate::component::{Component, ComponentDef, ComponentId};
use crate::database::Database;
use crate::layer::LayerId;
use crate::layout::Layout;
use crate::primitive::{Bondwire, BondwireEnd, BondwireProfile};

/// Read-only queries over a layout and the database that owns its definitions.
#[derive(Debug, Copy, Clone)]
pub struct LayoutRetriever<'a> {
    db: &'a Database,
    layout: &'a Layout,
}

impl<'a> LayoutRetriever<'a> {
    /// Creates a retriever over `layout`, whose definitions live in `db`.
    pub fn new(db: &'a Database, layout: &'a Layout) -> Self {
        Self { db, layout }
    }

    /// The database.
    pub fn database(&self) -> &'a Database {
        self.db
    }

    /// The layout.
    pub fn layout(&self) -> &'a Layout {
        self.layout
    }

    /// The coordinate units of the database.
    pub fn coord_units(&self) -> CoordUnits {
        self.db.coord_units()
    }

    /// The top elevation and thickness of a layer.
    pub fn layer_elevation_thickness(&self, layer: LayerId) -> Option<(f64, f64)> {
        let layer = self.layout.layer(layer)?;
        Some((layer.elevation(), layer.thickness()))
    }

    /// The top elevation and total thickness of the stackup.
    pub fn stackup_elevation_thickness(&self) -> Option<(f64, f64)> {
        let mut layers = self.layout.layers().map(|(_, l)| l);
        let first = layers.next()?;
        let (top, bot) = layers.fold((first.elevation(), first.bottom()), |(t, b), l| {
            (t.max(l.elevation()), b.min(l.bottom()))
        });
        Some((top, top - bot))
    }

    /// Finds the layer whose vertical extent contains `z`, preferring the topmost.
    pub fn search_stackup_layer(&self, z: f64) -> Option<LayerId> {
        self.layout.stackup_layers().into_iter().find(|id| {
            self.layout
                .layer(*id)
                .is_some_and(|l| l.bottom() <= z && z <= l.elevation())
        })
    }

    fn component_and_def(&self, comp: ComponentId) -> Option<(&'a Component, &'a ComponentDef)> {
        let comp = self.layout.component(comp)?;
        let def = self.db.component_def(comp.def())?;
        Some((comp, def))
    }

    /// The top elevation and height of a component body.
    ///
    /// A component sits on its layer's top surface on solder bumps; a flipped
    /// component hangs from the layer's bottom surface.
    pub fn component_elevation_thickness(&self, comp: ComponentId) -> Option<(f64, f64)> {
        let (comp, def) = self.component_and_def(comp)?;
        let layer = self.layout.layer(comp.layer())?;
        let bump = def.solder_ball_bump_height();
        let elevation = if comp.is_flipped() {
            layer.bottom() - bump
        } else {
            layer.elevation() + bump + def.height()
        };
        Some((elevation, def.height()))
    }

    /// The top elevation and height of the solder bump gap under a component.
    pub fn component_bump_elevation_thickness(&self, comp: ComponentId) -> Option<(f64, f64)> {
        let (comp, def) = self.component_and_def(comp)?;
        let layer = self.layout.layer(comp.layer())?;
        let bump = def.solder_ball_bump_height();
        let elevation = if comp.is_flipped() {
            layer.bottom()
        } else {
            layer.elevation() + bump
        };
        Some((elevation, bump))
    }

    /// The body outline of a component in database units.
    pub fn component_footprint(&self, comp: ComponentId) -> Option<Shape> {
        let (comp, def) = self.component_and_def(comp)?;
        Some(comp.footprint(def))
    }

    /// The location of a bondwire end in database units.
    pub fn bondwire_end_location(&self, end: &BondwireEnd) -> Option<Point> {
        match end {
            BondwireEnd::Layer { point, .. } => Some(*point),
            BondwireEnd::Pin { component, pin } => {
                let (comp, def) = self.component_and_def(*component)?;
                comp.pin_location(def, pin)
            }
        }
    }

    /// The elevation a bondwire end is bonded at.
    pub fn bondwire_end_height(&self, end: &BondwireEnd) -> Option<f64> {
        match end {
            BondwireEnd::Layer { layer, flipped, .. } => {
                let (elevation, thickness) = self.layer_elevation_thickness(*layer)?;
                Some(if *flipped {
                    elevation - thickness
                } else {
                    elevation
                })
            }
            BondwireEnd::Pin { component, .. } => {
                let (elevation, thickness) = self.component_elevation_thickness(*component)?;
                let flipped = self.layout.component(*component)?.is_flipped();
                Some(if flipped {
                    elevation - thickness
                } else {
                    elevation
                })
            }
        }
    }

    /// The start and end elevations of a bondwire.
    pub fn bondwire_heights(&self, wire: &Bondwire) -> Option<(f64, f64)> {
        Some((
            self.bondwire_end_height(wire.start())?,
            self.bondwire_end_height(wire.end())?,
        ))
    }

    /// The 3-D polyline a bondwire follows, in user units.
    ///
    /// A simple profile rises by the bondwire height over the first eighth of its run and
    /// descends over the last eighth. A JEDEC-4 profile rises vertically by `h1` at the
    /// start, runs level to the first eighth and then descends straight to the end.
    pub fn bondwire_segments(&self, wire: &Bondwire) -> Option<Vec<[f64; 3]>> {
        let units = self.coord_units();
        let p0 = self.bondwire_end_location(wire.start())?;
        let p1 = self.bondwire_end_location(wire.end())?;
        let (z0, z1) = self.bondwire_heights(wire)?;
        let [x0, y0] = [units.to_unit(p0.x), units.to_unit(p0.y)];
        let [x1, y1] = [units.to_unit(p1.x), units.to_unit(p1.y)];
        let at = |t: f64, z: f64| [x0 + (x1 - x0) * t, y0 + (y1 - y0) * t, z];
        Some(match wire.profile() {
            BondwireProfile::Simple => {
                let h = wire.height();
                vec![at(0., z0), at(0.125, z0 + h), at(0.875, z1 + h), at(1., z1)]
            }
            BondwireProfile::Jedec4 { h1, .. } => {
                vec![at(0., z0), at(0., z0 + h1), at(0.125, z0 + h1), at(1., z1)]
            }
        })
    }
}

/// Splits the segments of a polyline at their midpoints until every segment is at most
/// `max_len` long and there are at least `min_segments` segments.
///
/// ```
/// # use ecad::retriever::subdivide_polyline;
/// let line = subdivide_polyline(&[[0., 0., 0.], [4., 0., 0.]], 1.5, 1);
/// assert_eq!(line.len(), 5);
/// ```
pub fn subdivide_polyline(points: &[[f64; 3]], max_len: f64, min_segments: usize) -> Vec<[f64; 3]> {
    let mut out = points.to_vec();
    if out.len() < 2 {
        return out;
    }
    loop {
        let too_long = max_len > 0. && out.windows(2).any(|w| dist3(w[0], w[1]) > max_len);
        let too_few = out.len() - 1 < min_segments;
        if !too_long && !too_few {
            return out;
        }
        let mut next = Vec::with_capacity(out.len() * 2);
        for w in out.windows(2) {
            next.push(w[0]);
            if too_few || dist3(w[0], w[1]) > max_len {
                next.push([
                    (w[0][0] + w[1][0]) / 2.,
                    (w[0][1] + w[1][1]) / 2.,
                    (w[0][2] + w[1][2]) / 2.,
                ]);
            }
        }
        if let Some(last) = out.last() {
            next.push(*last);
        }
        out = next;
    }
}

fn dist3(a: [f64; 3], b: [f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentType;
    use crate::layer::{Layer, LayerType};
    use approx::assert_relative_eq;

    fn design() -> (Database, LayerId, ComponentId, ComponentId) {
        let mut db = Database::new("db");
        let cell = db.create_circuit_cell("top").unwrap();
        let mut def = ComponentDef::new(
            "SicDie",
            ComponentType::Ic,
            Rect::from_sides(-2_545_000, -2_020_000, 2_545_000, 2_020_000),
        );
        def.set_height(0.18).set_solder_ball_bump_height(0.1);
        def.add_pin("G", Point::new(0, 1_000_000), Default::default());
        let def = db.create_component_def(def).unwrap();
        let layout = db.layout_mut(cell).unwrap();
        let top = layout
            .append_layer(Layer::new("TopCu", LayerType::Conducting, 0., 0.3, "Cu", "Air"))
            .unwrap();
        layout
            .append_layer(Layer::new("BotCu", LayerType::Conducting, -0.3, 3., "Cu", "Air"))
            .unwrap();
        let up = layout
            .create_component("up", def, top, Transformation::identity(), false)
            .unwrap();
        let down = layout
            .create_component("down", def, top, Transformation::identity(), true)
            .unwrap();
        (db, top, up, down)
    }

    #[test]
    fn component_and_stackup_elevations() {
        let (db, top, up, down) = design();
        let layout = db.layout(db.find_cell_by_name("top").unwrap()).unwrap();
        let r = LayoutRetriever::new(&db, layout);

        let (e, t) = r.component_elevation_thickness(up).unwrap();
        assert_relative_eq!(e, 0.28, epsilon = 1e-12);
        assert_relative_eq!(t, 0.18, epsilon = 1e-12);
        let (e, _) = r.component_elevation_thickness(down).unwrap();
        assert_relative_eq!(e, -0.4, epsilon = 1e-12);
        let (e, t) = r.component_bump_elevation_thickness(up).unwrap();
        assert_relative_eq!(e, 0.1, epsilon = 1e-12);
        assert_relative_eq!(t, 0.1, epsilon = 1e-12);

        let (e, t) = r.stackup_elevation_thickness().unwrap();
        assert_relative_eq!(e, 0., epsilon = 1e-12);
        assert_relative_eq!(t, 3.3, epsilon = 1e-12);
        assert_eq!(r.search_stackup_layer(-0.1), Some(top));
        assert_eq!(r.search_stackup_layer(1.), None);
    }

    #[test]
    fn simple_bondwire_profile() {
        let (mut db, top, up, _) = design();
        let cell = db.find_cell_by_name("top").unwrap();
        let layout = db.layout_mut(cell).unwrap();
        let start = BondwireEnd::Pin {
            component: up,
            pin: "G".into(),
        };
        let end = BondwireEnd::Layer {
            layer: top,
            point: Point::new(8_000_000, 1_000_000),
            flipped: false,
        };
        let id = layout.create_bondwire("bw", None, start, end, 0.15).unwrap();
        layout.bondwire_mut(id).unwrap().set_height(0.5);

        let layout = db.layout(cell).unwrap();
        let r = LayoutRetriever::new(&db, layout);
        let wire = layout.primitive(id).and_then(|p| p.as_bondwire()).unwrap();
        let pts = r.bondwire_segments(wire).unwrap();
        assert_eq!(pts.len(), 4);
        assert_relative_eq!(pts[0][0], 0., epsilon = 1e-12);
        assert_relative_eq!(pts[0][2], 0.28, epsilon = 1e-12);
        assert_relative_eq!(pts[1][0], 1., epsilon = 1e-12);
        assert_relative_eq!(pts[1][2], 0.78, epsilon = 1e-12);
        assert_relative_eq!(pts[2][2], 0.5, epsilon = 1e-12);
        assert_relative_eq!(pts[3][0], 8., epsilon = 1e-12);
        assert_relative_eq!(pts[3][1], 1., epsilon = 1e-12);
        assert_relative_eq!(pts[3][2], 0., epsilon = 1e-12);
    }

    #[test]
    fn subdivision_respects_minimum_count() {
        let line = subdivide_polyline(&[[0., 0., 0.], [1., 0., 0.]], 0., 3);
        assert_eq!(line.len(), 5);
        assert_relative_eq!(line[1][0], 0.25, epsilon = 1e-12);
    }
}
