//! Extraction of prism thermal models from flattened layouts.

use std::collections::HashMap;

use arcstr::ArcStr;
use cache::{CacheStatus, DiskCache, Namespace};
use ecad::component::ComponentDef;
use ecad::database::Database;
use ecad::layer::LayerId;
use ecad::layout::Layout;
use ecad::padstack::PadstackDef;
use ecad::retriever::{subdivide_polyline, LayoutRetriever};
use geometry::prelude::*;
use indexmap::IndexSet;
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::mesh::{generate_mesh, overlap_area, ImprintLines, Mesh2D};
use crate::model::{Contact, LineElement, Prism, PrismThermalModel, Slab};
use crate::settings::{FRect, LayerCutSettings, MeshSettings, PrismExtractionSettings};

/// The cache namespace of extracted models.
pub const MODEL_NAMESPACE: &str = "thermal.prism_model";

/// Offset used to move bondwire bond points off the face they sit on.
const BOND_NUDGE: f64 = 1e-6;

struct Feature {
    shape: Shape,
    bbox: Rect,
    material: ArcStr,
}

struct StackLayer {
    name: ArcStr,
    bot: f64,
    top: f64,
    dielectric: ArcStr,
    pads: Vec<Feature>,
    shapes: Vec<Feature>,
    imprint: ImprintLines,
}

impl StackLayer {
    fn spans(&self, z: f64) -> bool {
        self.bot <= z && z <= self.top
    }

    fn distance(&self, z: f64) -> f64 {
        if self.spans(z) {
            0.
        } else {
            (z - self.top).abs().min((z - self.bot).abs())
        }
    }
}

struct Body {
    component: usize,
    footprint: Shape,
    bbox: Rect,
    body: (f64, f64),
    body_material: ArcStr,
    bump: Option<(f64, f64)>,
    bump_material: ArcStr,
}

/// Extracts the prism model of a flattened layout.
///
/// Runs on the current rayon thread pool. Cell instances of `layout` are ignored;
/// flatten the layout first.
pub fn extract_model(
    db: &Database,
    layout: &Layout,
    settings: &PrismExtractionSettings,
) -> Result<PrismThermalModel> {
    let _span = tracing::info_span!("extract").entered();
    let units = db.coord_units();
    let retriever = LayoutRetriever::new(db, layout);

    let order = layout.stackup_layers();
    if order.is_empty() {
        return Err(Error::MissingStackup);
    }
    let mut index_of: HashMap<LayerId, usize> = HashMap::new();
    let mut stack = Vec::with_capacity(order.len());
    let mut conducting = Vec::with_capacity(order.len());
    for id in order {
        let Some(layer) = layout.layer(id) else {
            continue;
        };
        index_of.insert(id, stack.len());
        conducting.push(layer.conducting_material().clone());
        stack.push(StackLayer {
            name: layer.name().clone(),
            bot: layer.bottom(),
            top: layer.elevation(),
            dielectric: layer.dielectric_material().clone(),
            pads: Vec::new(),
            shapes: Vec::new(),
            imprint: ImprintLines::default(),
        });
    }

    for (_, geom) in layout.geometries() {
        let (Some(&i), Some(bbox)) = (index_of.get(&geom.layer), geom.shape.bbox()) else {
            tracing::debug!(layer = ?geom.layer, "skipping shape off the stackup");
            continue;
        };
        stack[i].imprint.add_shape(&geom.shape, units);
        stack[i].shapes.push(Feature {
            shape: geom.shape.clone(),
            bbox,
            material: conducting[i].clone(),
        });
    }

    for (_, inst) in layout.padstack_insts() {
        let Some(def) = db.padstack_def(inst.def) else {
            tracing::warn!(padstack = %inst.name, "skipping padstack with an unknown definition");
            continue;
        };
        let (Some(top), Some(bot)) = (layout.layer(inst.top_layer), layout.layer(inst.bot_layer))
        else {
            continue;
        };
        let (hi, lo) = (
            top.elevation().max(bot.elevation()),
            top.bottom().min(bot.bottom()),
        );
        for (i, layer) in stack.iter_mut().enumerate() {
            if layer.top > hi + 1e-12 || layer.bot < lo - 1e-12 {
                continue;
            }
            for placed in def.pad(&layer.name).into_iter().chain(def.via()) {
                let shape = placed.placed().transform(inst.transform);
                let Some(bbox) = shape.bbox() else {
                    continue;
                };
                layer.imprint.add_shape(&shape, units);
                let material = if def.material().is_empty() {
                    conducting[i].clone()
                } else {
                    def.material().clone()
                };
                layer.pads.push(Feature {
                    shape,
                    bbox,
                    material,
                });
            }
        }
    }

    let mut component_names = Vec::new();
    let mut bodies = Vec::new();
    for (id, comp) in layout.components() {
        let (Some(def), Some(footprint), Some((top, height))) = (
            db.component_def(comp.def()),
            retriever.component_footprint(id),
            retriever.component_elevation_thickness(id),
        ) else {
            tracing::warn!(component = %comp.name(), "skipping unresolved component");
            continue;
        };
        let Some(bbox) = footprint.bbox() else {
            continue;
        };
        if let Some(&i) = index_of.get(&comp.layer()) {
            stack[i].imprint.add_shape(&footprint, units);
        }
        let bump = retriever
            .component_bump_elevation_thickness(id)
            .filter(|(_, h)| *h > 0.)
            .map(|(top, h)| (top - h, top));
        component_names.push(comp.name().clone());
        bodies.push(Body {
            component: component_names.len() - 1,
            footprint,
            bbox,
            body: (top - height, top),
            body_material: def.material().clone(),
            bump,
            bump_material: def.solder_filling_material().clone(),
        });
    }

    let boundary = match layout.boundary() {
        Some(b) => b.clone(),
        None => Shape::Rect(
            Rect::union_all_option(
                stack
                    .iter()
                    .flat_map(|l| l.pads.iter().chain(&l.shapes).map(|f| f.bbox))
                    .chain(bodies.iter().map(|b| b.bbox)),
            )
            .ok_or(Error::EmptyLayout)?,
        ),
    };

    let mut base = ImprintLines::default();
    base.add_shape(&boundary, units);
    for rect in &settings.layer_cut.imprint_box {
        base.add_rect(rect);
    }
    for block in &settings.block_bcs {
        base.add_rect(&block.region);
    }
    let by_layer = settings.mesh.gen_mesh_by_layer;
    let inputs: Vec<ImprintLines> = if by_layer {
        (0..stack.len())
            .map(|i| {
                let mut lines = base.clone();
                lines.extend(&stack[i].imprint);
                if settings.mesh.imprint_upper_layer && i > 0 {
                    lines.extend(&stack[i - 1].imprint);
                }
                lines
            })
            .collect()
    } else {
        let mut lines = base.clone();
        for layer in &stack {
            lines.extend(&layer.imprint);
        }
        vec![lines]
    };
    let meshes = inputs
        .par_iter()
        .map(|lines| generate_mesh(&boundary, units, lines, &settings.mesh))
        .collect::<Result<Vec<Mesh2D>>>()?;

    let ranges = slab_ranges(&stack, &bodies, &settings.layer_cut);
    if ranges.is_empty() {
        return Err(Error::EmptyLayout);
    }

    let mut materials: IndexSet<ArcStr> = IndexSet::new();
    let names = conducting
        .iter()
        .chain(stack.iter().map(|l| &l.dielectric))
        .chain(stack.iter().flat_map(|l| l.pads.iter().map(|f| &f.material)))
        .chain(bodies.iter().flat_map(|b| [&b.body_material, &b.bump_material]))
        .chain(layout.bondwires().map(|(_, w)| w.material()));
    for name in names {
        if !name.is_empty() {
            materials.insert(name.clone());
        }
    }
    let material = |name: &ArcStr| materials.get_index_of(name);

    let to_db = 1. / units.scale2unit();
    let fill = |mid: f64, c: [f64; 2]| -> Option<(usize, Option<usize>)> {
        let at = [c[0] * to_db, c[1] * to_db];
        if let Some(layer) = stack.iter().find(|l| l.spans(mid)) {
            let hit = layer
                .pads
                .iter()
                .chain(&layer.shapes)
                .find(|f| rect_contains(&f.bbox, at) && f.shape.contains_point_f64(at));
            let name = hit.map(|f| &f.material).unwrap_or(&layer.dielectric);
            return material(name).map(|m| (m, None));
        }
        bodies
            .iter()
            .filter(|b| rect_contains(&b.bbox, at) && b.footprint.contains_point_f64(at))
            .find_map(|b| {
                if b.body.0 <= mid && mid <= b.body.1 {
                    material(&b.body_material).map(|m| (m, Some(b.component)))
                } else if b.bump.is_some_and(|(lo, hi)| lo <= mid && mid <= hi) {
                    material(&b.bump_material).map(|m| (m, None))
                } else {
                    None
                }
            })
    };

    let mesh_of = |mid: f64| -> usize {
        if !by_layer {
            return 0;
        }
        (0..stack.len())
            .min_by(|&a, &b| stack[a].distance(mid).total_cmp(&stack[b].distance(mid)))
            .unwrap_or(0)
    };

    let cells: Vec<(usize, Vec<(usize, usize, Option<usize>)>)> = ranges
        .par_iter()
        .map(|&(bot, top)| {
            let mid = (bot + top) / 2.;
            let m = mesh_of(mid);
            let mesh = &meshes[m];
            let filled = (0..mesh.num_triangles())
                .filter_map(|t| fill(mid, mesh.centroid(t)).map(|(mat, comp)| (t, mat, comp)))
                .collect();
            (m, filled)
        })
        .collect();

    let mut model = PrismThermalModel {
        unit_to_meter: units.unit(),
        ..Default::default()
    };
    for (&(bot, top), (m, filled)) in ranges.iter().zip(cells) {
        let s = model.slabs.len();
        let mut prisms = vec![None; meshes[m].num_triangles()];
        for (t, mat, comp) in filled {
            prisms[t] = Some(model.prisms.len());
            model.prisms.push(Prism {
                slab: s,
                triangle: t,
                material: mat,
                component: comp,
                neighbors: [None; 3],
                top_exposed: 0.,
                bot_exposed: 0.,
            });
        }
        model.slabs.push(Slab {
            bot,
            top,
            mesh: m,
            prisms,
        });
    }
    model.meshes = meshes;
    model.materials = materials.into_iter().collect();
    model.components = component_names;

    connect_lateral(&mut model);
    connect_vertical(&mut model);
    add_bondwires(&mut model, layout, &retriever, &settings.mesh)?;

    tracing::info!(
        meshes = model.meshes.len(),
        slabs = model.slabs.len(),
        prisms = model.prisms.len(),
        lines = model.lines.len(),
        contacts = model.contacts.len(),
        "extracted prism model"
    );
    Ok(model)
}

fn rect_contains(r: &Rect, p: [f64; 2]) -> bool {
    r.left() as f64 <= p[0] && p[0] <= r.right() as f64 && r.bot() as f64 <= p[1] && p[1] <= r.top() as f64
}

/// Slices the occupied height of the stack into slabs, bottom first.
fn slab_ranges(stack: &[StackLayer], bodies: &[Body], cut: &LayerCutSettings) -> Vec<(f64, f64)> {
    let scale = 10f64.powi(cut.layer_cut_precision as i32);
    let round = |z: f64| (z * scale).round() / scale;
    let mut zs: Vec<f64> = stack.iter().flat_map(|l| [l.bot, l.top]).map(round).collect();
    for b in bodies {
        zs.extend([b.body.0, b.body.1].map(round));
        if let Some((lo, hi)) = b.bump {
            zs.extend([round(lo), round(hi)]);
        }
    }
    zs.sort_by(f64::total_cmp);
    zs.dedup();

    let occupied = |z: f64| {
        stack.iter().any(|l| l.spans(z))
            || bodies.iter().any(|b| {
                (b.body.0 <= z && z <= b.body.1) || b.bump.is_some_and(|(lo, hi)| lo <= z && z <= hi)
            })
    };
    let intervals: Vec<(f64, f64)> = zs
        .windows(2)
        .map(|w| (w[0], w[1]))
        .filter(|&(lo, hi)| hi > lo && occupied((lo + hi) / 2.))
        .collect();
    let thinnest = intervals
        .iter()
        .map(|(lo, hi)| hi - lo)
        .fold(f64::INFINITY, f64::min);
    let limit = cut.layer_transition_ratio * thinnest;

    let mut out = Vec::new();
    for (lo, hi) in intervals {
        let n = if limit > 0. {
            ((hi - lo) / limit - 1e-9).ceil().max(1.) as usize
        } else {
            1
        };
        for k in 0..n {
            let a = lo + (hi - lo) * k as f64 / n as f64;
            let b = if k + 1 == n {
                hi
            } else {
                lo + (hi - lo) * (k + 1) as f64 / n as f64
            };
            out.push((a, b));
        }
    }
    out
}

fn connect_lateral(model: &mut PrismThermalModel) {
    let neighbors: Vec<Vec<[Option<usize>; 3]>> =
        model.meshes.par_iter().map(Mesh2D::neighbors).collect();
    for prism in model.prisms.iter_mut() {
        let slab = &model.slabs[prism.slab];
        let adj = &neighbors[slab.mesh][prism.triangle];
        for e in 0..3 {
            prism.neighbors[e] = adj[e].and_then(|t| slab.prisms[t]);
        }
    }
}

fn connect_vertical(model: &mut PrismThermalModel) {
    let mut contacts = Vec::new();
    for k in 1..model.slabs.len() {
        let (lower, upper) = (&model.slabs[k - 1], &model.slabs[k]);
        if (lower.top - upper.bot).abs() > 1e-9 * (1. + upper.bot.abs()) {
            continue;
        }
        if lower.mesh == upper.mesh {
            let mesh = &model.meshes[lower.mesh];
            for t in 0..mesh.num_triangles() {
                if let (Some(u), Some(l)) = (upper.prisms[t], lower.prisms[t]) {
                    contacts.push(Contact {
                        upper: u,
                        lower: l,
                        area: mesh.area(t),
                    });
                }
            }
        } else {
            let (mu, ml) = (&model.meshes[upper.mesh], &model.meshes[lower.mesh]);
            for (tu, tl, area) in mesh_overlaps(mu, ml) {
                if let (Some(u), Some(l)) = (upper.prisms[tu], lower.prisms[tl]) {
                    contacts.push(Contact {
                        upper: u,
                        lower: l,
                        area,
                    });
                }
            }
        }
    }

    let mut covered_top = vec![0.; model.prisms.len()];
    let mut covered_bot = vec![0.; model.prisms.len()];
    for c in &contacts {
        covered_top[c.lower] += c.area;
        covered_bot[c.upper] += c.area;
    }
    for p in 0..model.prisms.len() {
        let area = model.prism_area(p);
        let exposed = |covered: f64| {
            let rest = area - covered;
            if rest > 1e-9 * area {
                rest
            } else {
                0.
            }
        };
        model.prisms[p].top_exposed = exposed(covered_top[p]);
        model.prisms[p].bot_exposed = exposed(covered_bot[p]);
    }
    model.contacts = contacts;
}

/// Overlapping triangle pairs `(upper, lower, area)` of two meshes of the same region.
fn mesh_overlaps(upper: &Mesh2D, lower: &Mesh2D) -> Vec<(usize, usize, f64)> {
    let n = lower.num_triangles();
    let Some(bounds) = (0..n).map(|t| lower.bbox(t)).reduce(|a, b| FRect {
        left: a.left.min(b.left),
        bot: a.bot.min(b.bot),
        right: a.right.max(b.right),
        top: a.top.max(b.top),
    }) else {
        return Vec::new();
    };
    let g = ((n as f64).sqrt().ceil() as usize).clamp(1, 256);
    let (cw, ch) = (
        (bounds.width() / g as f64).max(f64::MIN_POSITIVE),
        (bounds.height() / g as f64).max(f64::MIN_POSITIVE),
    );
    let span = |r: &FRect| {
        let cell = |v: f64, lo: f64, size: f64| (((v - lo) / size).floor().max(0.) as usize).min(g - 1);
        (
            cell(r.left, bounds.left, cw),
            cell(r.right, bounds.left, cw),
            cell(r.bot, bounds.bot, ch),
            cell(r.top, bounds.bot, ch),
        )
    };
    let mut buckets = vec![Vec::new(); g * g];
    for t in 0..n {
        let (i0, i1, j0, j1) = span(&lower.bbox(t));
        for i in i0..=i1 {
            for j in j0..=j1 {
                buckets[i * g + j].push(t);
            }
        }
    }
    (0..upper.num_triangles())
        .into_par_iter()
        .flat_map_iter(|tu| {
            let (i0, i1, j0, j1) = span(&upper.bbox(tu));
            let mut candidates: Vec<usize> = (i0..=i1)
                .flat_map(|i| (j0..=j1).map(move |j| (i, j)))
                .flat_map(|(i, j)| buckets[i * g + j].iter().copied())
                .collect();
            candidates.sort_unstable();
            candidates.dedup();
            let a = upper.vertices(tu);
            let min_area = 1e-12 * upper.area(tu);
            candidates
                .into_iter()
                .map(move |tl| (tu, tl, overlap_area(&a, &lower.vertices(tl))))
                .filter(move |&(_, _, area)| area > min_area)
        })
        .collect()
}

fn add_bondwires(
    model: &mut PrismThermalModel,
    layout: &Layout,
    retriever: &LayoutRetriever<'_>,
    mesh: &MeshSettings,
) -> Result<()> {
    let max_len = if mesh.max_len < f64::MAX { mesh.max_len } else { 0. };
    let anchor = |model: &PrismThermalModel, p: [f64; 3]| {
        [-BOND_NUDGE, BOND_NUDGE]
            .into_iter()
            .find_map(|dz| model.locate([p[0], p[1], p[2] + dz]))
    };
    for (id, wire) in layout.bondwires() {
        let Some(points) = retriever.bondwire_segments(wire) else {
            tracing::warn!(?id, bondwire = %wire.name(), "skipping bondwire with an unresolved end");
            continue;
        };
        let Some(material) = model.materials.iter().position(|m| m == wire.material()) else {
            return Err(Error::MissingMaterial(wire.material().clone()));
        };
        let points = subdivide_polyline(&points, max_len, 1);
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            continue;
        };
        let (start, end) = (anchor(model, *first), anchor(model, *last));
        if start.is_none() && end.is_none() {
            tracing::warn!(bondwire = %wire.name(), "skipping bondwire bonded outside the model");
            continue;
        }
        if start.is_none() || end.is_none() {
            tracing::warn!(bondwire = %wire.name(), "bondwire end lies outside the model");
        }

        model.bondwires.push(wire.name().clone());
        let bondwire = model.bondwires.len() - 1;
        let segments: Vec<([f64; 3], [f64; 3])> = points
            .windows(2)
            .map(|w| (w[0], w[1]))
            .filter(|(a, b)| (0..3).any(|i| (a[i] - b[i]).abs() > 1e-12))
            .collect();
        let first_line = model.lines.len();
        for (k, (a, b)) in segments.iter().enumerate() {
            let mut anchors = Vec::new();
            if k == 0 {
                anchors.extend(start);
            }
            if k + 1 == segments.len() {
                anchors.extend(end);
            }
            model.lines.push(LineElement {
                bondwire,
                start: *a,
                end: *b,
                radius: wire.radius(),
                material,
                prev: (k > 0).then(|| first_line + k - 1),
                anchors,
            });
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ModelKey<'a> {
    layout: Layout,
    units: CoordUnits,
    component_defs: Vec<&'a ComponentDef>,
    padstack_defs: Vec<&'a PadstackDef>,
    mesh: MeshSettings,
    layer_cut: LayerCutSettings,
    blocks: Vec<FRect>,
}

/// Builds the cache key of a model: the geometry of `layout` without any loss curves or
/// currents, and every setting that affects meshing.
fn model_key<'a>(
    db: &'a Database,
    layout: &Layout,
    settings: &PrismExtractionSettings,
) -> ModelKey<'a> {
    let mut layout = layout.clone();
    let components: Vec<_> = layout.components().map(|(id, _)| id).collect();
    for id in components {
        if let Some(comp) = layout.component_mut(id) {
            comp.set_loss_power(Default::default());
        }
    }
    let wires: Vec<_> = layout.bondwires().map(|(id, _)| id).collect();
    for id in wires {
        if let Some(wire) = layout.bondwire_mut(id) {
            wire.clear_current();
        }
    }
    ModelKey {
        layout,
        units: db.coord_units(),
        component_defs: db.component_defs().map(|(_, d)| d).collect(),
        padstack_defs: db.padstack_defs().map(|(_, d)| d).collect(),
        mesh: MeshSettings {
            dump_mesh_file: false,
            ..settings.mesh.clone()
        },
        layer_cut: LayerCutSettings {
            dump_sketch_img: false,
            ..settings.layer_cut.clone()
        },
        blocks: settings.block_bcs.iter().map(|b| b.region).collect(),
    }
}

/// Extracts a model, reusing a cached one from `<work_dir>/cache` when the geometry and
/// mesh settings are unchanged.
///
/// Without a work directory the model is always extracted.
pub fn extract_cached(
    db: &Database,
    layout: &Layout,
    settings: &PrismExtractionSettings,
) -> Result<(PrismThermalModel, CacheStatus)> {
    let Some(dir) = &settings.work_dir else {
        return Ok((extract_model(db, layout, settings)?, CacheStatus::Miss));
    };
    let cache = DiskCache::new(dir.join("cache"))?;
    let key = model_key(db, layout, settings);
    cache.get_or_generate(
        &Namespace::new(MODEL_NAMESPACE),
        &key,
        settings.force_rebuild,
        || extract_model(db, layout, settings),
    )
}

#[cfg(test)]
mod tests;
