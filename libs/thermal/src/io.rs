//! Diagnostic and result artifacts.
//!
//! Every writer produces a plain-text file: legacy VTK unstructured grids for meshes and
//! temperature maps, comma-separated transient results, an SVG sketch of the extraction
//! inputs and a triplet dump of the network matrices.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ecad::database::Database;
use ecad::layout::Layout;
use ecad::material::kelvin_to_celsius;
use ecad::retriever::LayoutRetriever;
use geometry::prelude::*;

use crate::error::Result;
use crate::model::PrismThermalModel;
use crate::network::ThermalNetwork;
use crate::settings::{FRect, Orientation, PrismExtractionSettings};
use crate::solver::sparse::assemble;
use crate::solver::static_rhs;

/// The mesh file name.
pub const MESH_FILE: &str = "mesh.vtk";
/// The static temperature map file name.
pub const HOTMAP_FILE: &str = "hotmap.vtk";
/// The transient result file name.
pub const TRANSIENT_FILE: &str = "trans.txt";
/// The extraction sketch file name.
pub const SKETCH_FILE: &str = "sketch.svg";
/// The matrix dump file name.
pub const MATRICES_FILE: &str = "matrices.txt";

const VTK_WEDGE: u8 = 13;
const VTK_LINE: u8 = 3;

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

fn write_grid(w: &mut impl Write, model: &PrismThermalModel, title: &str) -> Result<()> {
    let (np, nl) = (model.prisms.len(), model.lines.len());
    writeln!(w, "# vtk DataFile Version 3.0")?;
    writeln!(w, "{title}")?;
    writeln!(w, "ASCII")?;
    writeln!(w, "DATASET UNSTRUCTURED_GRID")?;
    writeln!(w, "POINTS {} double", 6 * np + 2 * nl)?;
    for p in 0..np {
        for [x, y, z] in model.prism_corners(p) {
            writeln!(w, "{x} {y} {z}")?;
        }
    }
    for line in &model.lines {
        for [x, y, z] in [line.start, line.end] {
            writeln!(w, "{x} {y} {z}")?;
        }
    }
    writeln!(w, "CELLS {} {}", np + nl, 7 * np + 3 * nl)?;
    for p in 0..np {
        let b = 6 * p;
        writeln!(w, "6 {} {} {} {} {} {}", b, b + 1, b + 2, b + 3, b + 4, b + 5)?;
    }
    for l in 0..nl {
        let b = 6 * np + 2 * l;
        writeln!(w, "2 {} {}", b, b + 1)?;
    }
    writeln!(w, "CELL_TYPES {}", np + nl)?;
    for _ in 0..np {
        writeln!(w, "{VTK_WEDGE}")?;
    }
    for _ in 0..nl {
        writeln!(w, "{VTK_LINE}")?;
    }
    writeln!(w, "CELL_DATA {}", np + nl)?;
    writeln!(w, "SCALARS material int 1")?;
    writeln!(w, "LOOKUP_TABLE default")?;
    for m in model
        .prisms
        .iter()
        .map(|p| p.material)
        .chain(model.lines.iter().map(|l| l.material))
    {
        writeln!(w, "{m}")?;
    }
    Ok(())
}

/// Writes the prisms and bondwire elements of `model` with their material index.
pub fn write_mesh_vtk(path: impl AsRef<Path>, model: &PrismThermalModel) -> Result<()> {
    let mut w = create(path.as_ref())?;
    write_grid(&mut w, model, "prism thermal model")?;
    w.flush()?;
    Ok(())
}

/// Writes `model` with the temperature of every element in Celsius.
///
/// `kelvin` holds one temperature per network node.
pub fn write_hotmap_vtk(
    path: impl AsRef<Path>,
    model: &PrismThermalModel,
    kelvin: &[f64],
) -> Result<()> {
    let mut w = create(path.as_ref())?;
    write_grid(&mut w, model, "prism thermal hotmap")?;
    writeln!(w, "SCALARS temperature double 1")?;
    writeln!(w, "LOOKUP_TABLE default")?;
    for t in kelvin {
        writeln!(w, "{}", kelvin_to_celsius(*t))?;
    }
    w.flush()?;
    Ok(())
}

/// Writes one row per sample: the time followed by each resolved monitor in Celsius.
///
/// `monitors` holds one optional series in kelvin per monitor; unresolved monitors are left out
/// and the header names the remaining ones `m<index>`.
pub fn write_transient_csv(
    path: impl AsRef<Path>,
    times: &[f64],
    monitors: &[Option<Vec<f64>>],
) -> Result<()> {
    let mut w = create(path.as_ref())?;
    let resolved: Vec<(usize, &Vec<f64>)> = monitors
        .iter()
        .enumerate()
        .filter_map(|(i, m)| m.as_ref().map(|m| (i, m)))
        .collect();
    write!(w, "time")?;
    for (i, _) in &resolved {
        write!(w, ",m{i}")?;
    }
    writeln!(w)?;
    for (k, t) in times.iter().enumerate() {
        write!(w, "{t}")?;
        for (_, series) in &resolved {
            write!(w, ",{}", kelvin_to_celsius(series[k]))?;
        }
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

/// Writes the conductance matrix as `row col value` triplets followed by the nominal
/// right-hand side.
pub fn write_matrices(path: impl AsRef<Path>, net: &ThermalNetwork) -> Result<()> {
    let mut w = create(path.as_ref())?;
    let k = assemble(net, None);
    writeln!(w, "# K {} {} {}", k.nrows(), k.ncols(), k.nnz())?;
    for (i, j, v) in k.triplet_iter() {
        writeln!(w, "{i} {j} {v}")?;
    }
    writeln!(w, "# P {}", net.num_nodes)?;
    for p in static_rhs(net) {
        writeln!(w, "{p}")?;
    }
    w.flush()?;
    Ok(())
}

const PALETTE: [&str; 6] = ["#b87333", "#4682b4", "#6b8e23", "#9932cc", "#cd5c5c", "#daa520"];

fn svg_points(shape: &Shape, units: CoordUnits) -> String {
    shape
        .outline()
        .points()
        .iter()
        .map(|p| format!("{},{}", units.to_unit(p.x), units.to_unit(p.y)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn svg_rect(w: &mut impl Write, r: &FRect, style: &str) -> Result<()> {
    writeln!(
        w,
        r#"<rect x="{}" y="{}" width="{}" height="{}" {style}/>"#,
        r.left,
        r.bot,
        r.width(),
        r.height()
    )?;
    Ok(())
}

/// Sketches the boundary, layer shapes, component footprints and boundary condition boxes
/// of an extraction in user units.
pub fn write_sketch_svg(
    path: impl AsRef<Path>,
    db: &Database,
    layout: &Layout,
    settings: &PrismExtractionSettings,
    model: &PrismThermalModel,
) -> Result<()> {
    let units = db.coord_units();
    let points = model.meshes.iter().flat_map(|m| m.points.iter());
    let (mut lo, mut hi) = ([f64::INFINITY; 2], [f64::NEG_INFINITY; 2]);
    for p in points {
        for i in 0..2 {
            lo[i] = lo[i].min(p[i]);
            hi[i] = hi[i].max(p[i]);
        }
    }
    if lo[0] > hi[0] {
        (lo, hi) = ([0.; 2], [1.; 2]);
    }
    let (width, height) = (hi[0] - lo[0], hi[1] - lo[1]);
    let stroke = width.max(height) / 500.;

    let mut w = create(path.as_ref())?;
    writeln!(
        w,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="{} {} {} {}">"#,
        lo[0],
        -hi[1],
        width,
        height
    )?;
    writeln!(w, r#"<g transform="scale(1,-1)" stroke-width="{stroke}">"#)?;
    if let Some(boundary) = layout.boundary() {
        writeln!(
            w,
            r#"<polygon points="{}" fill="none" stroke="black"/>"#,
            svg_points(boundary, units)
        )?;
    }
    let layers: Vec<_> = layout.stackup_layers();
    for (_, geom) in layout.geometries() {
        let color = layers
            .iter()
            .position(|&l| l == geom.layer)
            .map(|i| PALETTE[i % PALETTE.len()])
            .unwrap_or("gray");
        writeln!(
            w,
            r#"<polygon points="{}" fill="{color}" fill-opacity="0.3" stroke="{color}"/>"#,
            svg_points(&geom.shape, units)
        )?;
    }
    let retriever = LayoutRetriever::new(db, layout);
    for (id, _) in layout.components() {
        if let Some(footprint) = retriever.component_footprint(id) {
            writeln!(
                w,
                r#"<polygon points="{}" fill="dimgray" fill-opacity="0.6" stroke="black"/>"#,
                svg_points(&footprint, units)
            )?;
        }
    }
    for rect in &settings.layer_cut.imprint_box {
        svg_rect(
            &mut w,
            rect,
            r#"fill="none" stroke="green" stroke-dasharray="4 2""#,
        )?;
    }
    for block in &settings.block_bcs {
        let color = match block.orientation {
            Orientation::Top => "red",
            Orientation::Bot => "blue",
        };
        svg_rect(&mut w, &block.region, &format!(r#"fill="none" stroke="{color}""#))?;
    }
    writeln!(w, "</g>")?;
    writeln!(w, "</svg>")?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::model::tests::two_slabs;
    use crate::model::LineElement;
    use crate::network::{Edge, Link};

    #[test]
    fn vtk_grids_hold_wedges_and_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = two_slabs();
        model.lines.push(LineElement {
            bondwire: 0,
            start: [0.5, 0.5, 3.],
            end: [0.5, 0.5, 4.],
            radius: 0.1,
            material: 0,
            prev: None,
            anchors: vec![2],
        });
        write_mesh_vtk(dir.path().join(MESH_FILE), &model).unwrap();
        let mesh = fs::read_to_string(dir.path().join(MESH_FILE)).unwrap();
        assert!(mesh.contains("POINTS 20 double"));
        assert!(mesh.contains("CELLS 4 24"));
        assert_eq!(mesh.lines().filter(|l| *l == "13").count(), 3);
        assert!(mesh.contains("6 12 13 14 15 16 17"));
        assert!(mesh.contains("2 18 19"));

        let path = dir.path().join("out").join(HOTMAP_FILE);
        write_hotmap_vtk(&path, &model, &[273.15, 283.15, 293.15, 303.15]).unwrap();
        let hot = fs::read_to_string(path).unwrap();
        let tail: Vec<f64> = hot
            .lines()
            .rev()
            .take(4)
            .map(|l| l.parse().unwrap())
            .collect();
        for (t, expected) in tail.iter().zip([30., 20., 10., 0.]) {
            assert_abs_diff_eq!(*t, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn transient_rows_skip_unresolved_monitors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TRANSIENT_FILE);
        let monitors = vec![Some(vec![273.15, 274.15]), None, Some(vec![300.15, 301.15])];
        write_transient_csv(&path, &[0., 0.5], &monitors).unwrap();
        let text = fs::read_to_string(path).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows[0], "time,m0,m2");
        assert_eq!(rows[1].split(',').count(), 3);
        let last: Vec<f64> = rows[2].split(',').map(|v| v.parse().unwrap()).collect();
        assert_abs_diff_eq!(last[0], 0.5);
        assert_abs_diff_eq!(last[1], 1., epsilon = 1e-9);
        assert_abs_diff_eq!(last[2], 28., epsilon = 1e-9);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn matrices_dump_triplets_and_power() {
        let dir = tempfile::tempdir().unwrap();
        let net = ThermalNetwork {
            num_nodes: 2,
            edges: vec![Edge {
                a: 0,
                b: 1,
                conductance: 2.,
            }],
            capacitance: vec![1., 1.],
            links: vec![Link {
                node: 1,
                conductance: 1.,
                kelvin: 300.,
            }],
            ..Default::default()
        };
        let path = dir.path().join(MATRICES_FILE);
        write_matrices(&path, &net).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("# K 2 2 4\n"));
        assert!(text.contains("1 1 3\n"));
        assert!(text.contains("0 1 -2\n"));
        assert!(text.ends_with("# P 2\n0\n300\n"));
    }

    #[test]
    fn sketches_cover_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new("sketch");
        let mut layout = Layout::new();
        layout.set_boundary(Rect::from_sides(0, 0, 1_000_000, 1_000_000));
        let mut settings = PrismExtractionSettings::default();
        settings.add_block_bc(
            "sink",
            Orientation::Bot,
            FRect::from_sides(0., 0., 0.5, 0.5),
            crate::settings::BoundaryCondition::htc(10.),
        );
        let path = dir.path().join(SKETCH_FILE);
        write_sketch_svg(&path, &db, &layout, &settings, &two_slabs()).unwrap();
        let svg = fs::read_to_string(path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"viewBox="0 -1 1 1""#));
        assert!(svg.contains(r#"stroke="blue""#));
        assert!(svg.contains("stroke-dasharray"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }
}
