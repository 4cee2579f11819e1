//! The XML archive layout.
//!
//! Every collection is written in creation order so that ids survive a round trip.
//! Cross references (layers, nets, components, definitions, cells) are stored as indices.

use geometry::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellId};
use crate::component::{
    Component, ComponentDef, ComponentDefId, ComponentId, ComponentType, LossPowerTable,
    PinIoType,
};
use crate::database::{Database, DEFAULT_HIER_SEP};
use crate::error::{Error, Result};
use crate::layer::{Layer, LayerId, LayerMap, LayerMapId, LayerType};
use crate::layout::{CellInst, Layout, NetId};
use crate::material::{MaterialDef, MaterialProp, MaterialPropId, MaterialType};
use crate::padstack::{PadShape, PadstackDef, PadstackDefId, PadstackInst};
use crate::primitive::{Bondwire, BondwireEnd, BondwireProfile, Geometry2D, Primitive, Text};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "Database")]
struct DatabaseDoc {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@unit")]
    unit: f64,
    #[serde(rename = "@precision")]
    precision: f64,
    #[serde(rename = "@hier_sep")]
    hier_sep: String,
    #[serde(rename = "Material", default)]
    materials: Vec<MaterialDoc>,
    #[serde(rename = "ComponentDef", default)]
    component_defs: Vec<ComponentDefDoc>,
    #[serde(rename = "PadstackDef", default)]
    padstack_defs: Vec<PadstackDefDoc>,
    #[serde(rename = "LayerMap", default)]
    layer_maps: Vec<LayerMapDoc>,
    #[serde(rename = "Cell", default)]
    cells: Vec<CellDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MaterialDoc {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@kind")]
    kind: MaterialType,
    #[serde(rename = "Prop", default)]
    props: Vec<PropDoc>,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PropKind {
    Simple,
    Anisotropic,
    Polynomial,
    Table,
}

/// A property value. Rows are separated by `;` and values within a row by spaces.
#[derive(Debug, Serialize, Deserialize)]
struct PropDoc {
    #[serde(rename = "@id")]
    id: MaterialPropId,
    #[serde(rename = "@kind")]
    kind: PropKind,
    #[serde(rename = "@values")]
    values: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ComponentDefDoc {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@kind")]
    kind: ComponentType,
    #[serde(rename = "@height")]
    height: f64,
    #[serde(rename = "@material", default)]
    material: String,
    #[serde(rename = "@bump")]
    bump: f64,
    #[serde(rename = "@filling", default)]
    filling: String,
    #[serde(rename = "@x0")]
    x0: i64,
    #[serde(rename = "@y0")]
    y0: i64,
    #[serde(rename = "@x1")]
    x1: i64,
    #[serde(rename = "@y1")]
    y1: i64,
    #[serde(rename = "Pin", default)]
    pins: Vec<PinDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PinDoc {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@x")]
    x: i64,
    #[serde(rename = "@y")]
    y: i64,
    #[serde(rename = "@io")]
    io: PinIoType,
}

#[derive(Debug, Serialize, Deserialize)]
struct PadstackDefDoc {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@material", default)]
    material: String,
    #[serde(rename = "Layer", default)]
    layers: Vec<PadLayerDoc>,
    #[serde(rename = "Via", default, skip_serializing_if = "Option::is_none")]
    via: Option<PadDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PadLayerDoc {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "Pad", default, skip_serializing_if = "Option::is_none")]
    pad: Option<PadDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PadDoc {
    #[serde(rename = "@x")]
    x: i64,
    #[serde(rename = "@y")]
    y: i64,
    #[serde(rename = "@rotation")]
    rotation: f64,
    #[serde(rename = "Shape")]
    shape: ShapeDoc,
}

#[derive(Debug, Serialize, Deserialize)]
struct LayerMapDoc {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "Pair", default)]
    pairs: Vec<PairDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PairDoc {
    #[serde(rename = "@from")]
    from: usize,
    #[serde(rename = "@to")]
    to: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct CellDoc {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "Boundary", default, skip_serializing_if = "Option::is_none")]
    boundary: Option<ShapeDoc>,
    #[serde(rename = "Layer", default)]
    layers: Vec<LayerDoc>,
    #[serde(rename = "Net", default)]
    nets: Vec<NetDoc>,
    #[serde(rename = "Component", default)]
    components: Vec<ComponentDoc>,
    #[serde(rename = "Primitive", default)]
    primitives: Vec<PrimitiveDoc>,
    #[serde(rename = "Padstack", default)]
    padstacks: Vec<PadstackInstDoc>,
    #[serde(rename = "Instance", default)]
    instances: Vec<InstanceDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LayerDoc {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@kind")]
    kind: LayerType,
    #[serde(rename = "@elevation")]
    elevation: f64,
    #[serde(rename = "@thickness")]
    thickness: f64,
    #[serde(rename = "@conducting", default)]
    conducting: String,
    #[serde(rename = "@dielectric", default)]
    dielectric: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct NetDoc {
    #[serde(rename = "@name")]
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ComponentDoc {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@def")]
    def: usize,
    #[serde(rename = "@layer")]
    layer: usize,
    #[serde(rename = "@flipped")]
    flipped: bool,
    #[serde(rename = "@scenario", default)]
    scenario: usize,
    /// Flattened `(celsius, watts)` pairs.
    #[serde(rename = "@loss", default, skip_serializing_if = "String::is_empty")]
    loss: String,
    #[serde(rename = "Transform")]
    transform: TransformDoc,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PrimitiveKind {
    Geometry,
    Text,
    Bondwire,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ProfileKind {
    Simple,
    Jedec4,
}

/// One primitive of any kind. Only the attributes relevant to `kind` are present.
#[derive(Debug, Serialize, Deserialize)]
struct PrimitiveDoc {
    #[serde(rename = "@kind")]
    kind: PrimitiveKind,
    #[serde(rename = "@name", default, skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(rename = "@layer", default, skip_serializing_if = "Option::is_none")]
    layer: Option<usize>,
    #[serde(rename = "@net", default, skip_serializing_if = "Option::is_none")]
    net: Option<usize>,
    #[serde(rename = "@text", default, skip_serializing_if = "String::is_empty")]
    text: String,
    #[serde(rename = "@radius", default, skip_serializing_if = "Option::is_none")]
    radius: Option<f64>,
    #[serde(rename = "@height", default, skip_serializing_if = "Option::is_none")]
    height: Option<f64>,
    #[serde(rename = "@material", default, skip_serializing_if = "String::is_empty")]
    material: String,
    #[serde(rename = "@current", default, skip_serializing_if = "Option::is_none")]
    current: Option<f64>,
    #[serde(rename = "@scenario", default, skip_serializing_if = "Option::is_none")]
    scenario: Option<usize>,
    #[serde(rename = "@profile", default, skip_serializing_if = "Option::is_none")]
    profile: Option<ProfileKind>,
    #[serde(rename = "@h1", default, skip_serializing_if = "Option::is_none")]
    h1: Option<f64>,
    #[serde(rename = "@h2", default, skip_serializing_if = "Option::is_none")]
    h2: Option<f64>,
    #[serde(rename = "@alpha", default, skip_serializing_if = "Option::is_none")]
    alpha: Option<f64>,
    #[serde(rename = "@beta", default, skip_serializing_if = "Option::is_none")]
    beta: Option<f64>,
    #[serde(rename = "Transform", default, skip_serializing_if = "Option::is_none")]
    transform: Option<TransformDoc>,
    #[serde(rename = "Shape", default, skip_serializing_if = "Option::is_none")]
    shape: Option<ShapeDoc>,
    #[serde(rename = "Start", default, skip_serializing_if = "Option::is_none")]
    start: Option<EndDoc>,
    #[serde(rename = "End", default, skip_serializing_if = "Option::is_none")]
    end: Option<EndDoc>,
}

impl PrimitiveDoc {
    fn empty(kind: PrimitiveKind) -> Self {
        Self {
            kind,
            name: String::new(),
            layer: None,
            net: None,
            text: String::new(),
            radius: None,
            height: None,
            material: String::new(),
            current: None,
            scenario: None,
            profile: None,
            h1: None,
            h2: None,
            alpha: None,
            beta: None,
            transform: None,
            shape: None,
            start: None,
            end: None,
        }
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EndKind {
    Layer,
    Pin,
}

#[derive(Debug, Serialize, Deserialize)]
struct EndDoc {
    #[serde(rename = "@kind")]
    kind: EndKind,
    #[serde(rename = "@layer", default, skip_serializing_if = "Option::is_none")]
    layer: Option<usize>,
    #[serde(rename = "@x", default)]
    x: i64,
    #[serde(rename = "@y", default)]
    y: i64,
    #[serde(rename = "@flipped", default)]
    flipped: bool,
    #[serde(rename = "@component", default, skip_serializing_if = "Option::is_none")]
    component: Option<usize>,
    #[serde(rename = "@pin", default, skip_serializing_if = "String::is_empty")]
    pin: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PadstackInstDoc {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@def")]
    def: usize,
    #[serde(rename = "@top")]
    top: usize,
    #[serde(rename = "@bot")]
    bot: usize,
    #[serde(rename = "@net", default, skip_serializing_if = "Option::is_none")]
    net: Option<usize>,
    #[serde(rename = "@pin", default)]
    is_layout_pin: bool,
    #[serde(rename = "Transform")]
    transform: TransformDoc,
}

#[derive(Debug, Serialize, Deserialize)]
struct InstanceDoc {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@cell")]
    cell: usize,
    #[serde(rename = "@layer_map", default, skip_serializing_if = "Option::is_none")]
    layer_map: Option<usize>,
    #[serde(rename = "Transform")]
    transform: TransformDoc,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ShapeKind {
    Rect,
    Polygon,
    PolygonWithHoles,
}

/// A shape. `points` lists `x y` pairs; a rectangle stores its lower-left and upper-right corners.
#[derive(Debug, Serialize, Deserialize)]
struct ShapeDoc {
    #[serde(rename = "@kind")]
    kind: ShapeKind,
    #[serde(rename = "@points")]
    points: String,
    #[serde(rename = "Hole", default)]
    holes: Vec<HoleDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct HoleDoc {
    #[serde(rename = "@points")]
    points: String,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
struct TransformDoc {
    #[serde(rename = "@a00")]
    a00: f64,
    #[serde(rename = "@a01")]
    a01: f64,
    #[serde(rename = "@a10")]
    a10: f64,
    #[serde(rename = "@a11")]
    a11: f64,
    #[serde(rename = "@b0")]
    b0: f64,
    #[serde(rename = "@b1")]
    b1: f64,
}

impl From<&Transformation> for TransformDoc {
    fn from(t: &Transformation) -> Self {
        let [[a00, a01], [a10, a11]] = t.matrix();
        let [b0, b1] = t.offset();
        Self {
            a00,
            a01,
            a10,
            a11,
            b0,
            b1,
        }
    }
}

impl From<TransformDoc> for Transformation {
    fn from(t: TransformDoc) -> Self {
        Transformation::from_matrix([[t.a00, t.a01], [t.a10, t.a11]], [t.b0, t.b1])
    }
}

fn malformed(msg: impl Into<String>) -> Error {
    Error::MalformedArchive(msg.into())
}

fn join_floats(values: &[f64]) -> String {
    values
        .iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_floats(s: &str) -> Result<Vec<f64>> {
    s.split_whitespace()
        .map(|v| {
            v.parse::<f64>()
                .map_err(|_| malformed(format!("invalid number `{v}`")))
        })
        .collect()
}

fn join_rows(rows: impl IntoIterator<Item = Vec<f64>>) -> String {
    rows.into_iter()
        .map(|row| join_floats(&row))
        .collect::<Vec<_>>()
        .join(";")
}

fn parse_rows(s: &str) -> Result<Vec<Vec<f64>>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(';').map(parse_floats).collect()
}

fn pairs(values: Vec<f64>, what: &str) -> Result<Vec<(f64, f64)>> {
    if values.len() % 2 != 0 {
        return Err(malformed(format!("odd number of values in {what}")));
    }
    Ok(values.chunks_exact(2).map(|c| (c[0], c[1])).collect())
}

fn prop_doc(id: MaterialPropId, prop: &MaterialProp) -> PropDoc {
    let (kind, values) = match prop {
        MaterialProp::Simple(v) => (PropKind::Simple, v.to_string()),
        MaterialProp::Anisotropic(v) => (PropKind::Anisotropic, join_floats(v)),
        MaterialProp::Polynomial(rows) => (PropKind::Polynomial, join_rows(rows.iter().cloned())),
        MaterialProp::Table(samples) => (
            PropKind::Table,
            join_rows(samples.iter().map(|(t, v)| vec![*t, *v])),
        ),
    };
    PropDoc { id, kind, values }
}

fn prop_from_doc(doc: &PropDoc) -> Result<MaterialProp> {
    Ok(match doc.kind {
        PropKind::Simple => match parse_floats(&doc.values)?.as_slice() {
            [v] => MaterialProp::Simple(*v),
            _ => return Err(malformed("simple property needs one value")),
        },
        PropKind::Anisotropic => match parse_floats(&doc.values)?.as_slice() {
            [x, y, z] => MaterialProp::Anisotropic([*x, *y, *z]),
            _ => return Err(malformed("anisotropic property needs three values")),
        },
        PropKind::Polynomial => MaterialProp::Polynomial(parse_rows(&doc.values)?),
        PropKind::Table => {
            let mut samples = Vec::new();
            for row in parse_rows(&doc.values)? {
                samples.extend(pairs(row, "table row")?);
            }
            MaterialProp::Table(samples)
        }
    })
}

fn join_points(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{} {}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_points(s: &str) -> Result<Vec<Point>> {
    let coords = s
        .split_whitespace()
        .map(|v| {
            v.parse::<i64>()
                .map_err(|_| malformed(format!("invalid coordinate `{v}`")))
        })
        .collect::<Result<Vec<_>>>()?;
    if coords.len() % 2 != 0 {
        return Err(malformed("odd number of coordinates"));
    }
    Ok(coords
        .chunks_exact(2)
        .map(|c| Point::new(c[0], c[1]))
        .collect())
}

fn shape_doc(shape: &Shape) -> ShapeDoc {
    match shape {
        Shape::Rect(r) => ShapeDoc {
            kind: ShapeKind::Rect,
            points: join_points(&[r.lower_left(), r.upper_right()]),
            holes: Vec::new(),
        },
        Shape::Polygon(p) => ShapeDoc {
            kind: ShapeKind::Polygon,
            points: join_points(p.points()),
            holes: Vec::new(),
        },
        Shape::PolygonWithHoles(p) => ShapeDoc {
            kind: ShapeKind::PolygonWithHoles,
            points: join_points(p.outline.points()),
            holes: p
                .holes
                .iter()
                .map(|h| HoleDoc {
                    points: join_points(h.points()),
                })
                .collect(),
        },
    }
}

fn shape_from_doc(doc: &ShapeDoc) -> Result<Shape> {
    let points = parse_points(&doc.points)?;
    Ok(match doc.kind {
        ShapeKind::Rect => match points.as_slice() {
            [a, b] => Shape::Rect(Rect::new(*a, *b)),
            _ => return Err(malformed("rectangle needs two corners")),
        },
        ShapeKind::Polygon => Shape::Polygon(Polygon::from_verts(points)),
        ShapeKind::PolygonWithHoles => {
            let holes = doc
                .holes
                .iter()
                .map(|h| parse_points(&h.points).map(Polygon::from_verts))
                .collect::<Result<Vec<_>>>()?;
            Shape::PolygonWithHoles(PolygonWithHoles::new(Polygon::from_verts(points), holes))
        }
    })
}

fn end_doc(end: &BondwireEnd) -> EndDoc {
    match end {
        BondwireEnd::Layer {
            layer,
            point,
            flipped,
        } => EndDoc {
            kind: EndKind::Layer,
            layer: Some(layer.index()),
            x: point.x,
            y: point.y,
            flipped: *flipped,
            component: None,
            pin: String::new(),
        },
        BondwireEnd::Pin { component, pin } => EndDoc {
            kind: EndKind::Pin,
            layer: None,
            x: 0,
            y: 0,
            flipped: false,
            component: Some(component.index()),
            pin: pin.to_string(),
        },
    }
}

fn end_from_doc(doc: Option<&EndDoc>) -> Result<BondwireEnd> {
    let doc = doc.ok_or_else(|| malformed("bondwire is missing an end"))?;
    Ok(match doc.kind {
        EndKind::Layer => BondwireEnd::Layer {
            layer: LayerId::from_index(
                doc.layer
                    .ok_or_else(|| malformed("layer end without a layer"))?,
            ),
            point: Point::new(doc.x, doc.y),
            flipped: doc.flipped,
        },
        EndKind::Pin => BondwireEnd::Pin {
            component: ComponentId::from_index(
                doc.component
                    .ok_or_else(|| malformed("pin end without a component"))?,
            ),
            pin: doc.pin.as_str().into(),
        },
    })
}

fn primitive_doc(primitive: &Primitive) -> PrimitiveDoc {
    match primitive {
        Primitive::Geometry(g) => PrimitiveDoc {
            layer: Some(g.layer.index()),
            net: g.net.map(|n| n.index()),
            shape: Some(shape_doc(&g.shape)),
            ..PrimitiveDoc::empty(PrimitiveKind::Geometry)
        },
        Primitive::Text(t) => PrimitiveDoc {
            layer: t.layer.map(|l| l.index()),
            text: t.text.to_string(),
            transform: Some(TransformDoc::from(&t.transform)),
            ..PrimitiveDoc::empty(PrimitiveKind::Text)
        },
        Primitive::Bondwire(b) => {
            let (profile, h1, h2, alpha, beta) = match b.profile() {
                BondwireProfile::Simple => (ProfileKind::Simple, None, None, None, None),
                BondwireProfile::Jedec4 {
                    h1,
                    h2,
                    alpha,
                    beta,
                } => (
                    ProfileKind::Jedec4,
                    Some(h1),
                    Some(h2),
                    Some(alpha),
                    Some(beta),
                ),
            };
            PrimitiveDoc {
                name: b.name().to_string(),
                net: b.net().map(|n| n.index()),
                radius: Some(b.radius()),
                height: Some(b.height()),
                material: b.material().to_string(),
                current: Some(b.current()),
                scenario: Some(b.scenario()),
                profile: Some(profile),
                h1,
                h2,
                alpha,
                beta,
                start: Some(end_doc(b.start())),
                end: Some(end_doc(b.end())),
                ..PrimitiveDoc::empty(PrimitiveKind::Bondwire)
            }
        }
    }
}

fn primitive_from_doc(doc: &PrimitiveDoc) -> Result<Primitive> {
    let net = doc.net.map(NetId::from_index);
    Ok(match doc.kind {
        PrimitiveKind::Geometry => Primitive::Geometry(Geometry2D {
            layer: LayerId::from_index(
                doc.layer
                    .ok_or_else(|| malformed("geometry without a layer"))?,
            ),
            net,
            shape: shape_from_doc(
                doc.shape
                    .as_ref()
                    .ok_or_else(|| malformed("geometry without a shape"))?,
            )?,
        }),
        PrimitiveKind::Text => Primitive::Text(Text {
            layer: doc.layer.map(LayerId::from_index),
            text: doc.text.as_str().into(),
            transform: doc.transform.map(Transformation::from).unwrap_or_default(),
        }),
        PrimitiveKind::Bondwire => {
            let start = end_from_doc(doc.start.as_ref())?;
            let end = end_from_doc(doc.end.as_ref())?;
            let mut wire = Bondwire::new(
                doc.name.as_str(),
                net,
                start,
                end,
                doc.radius.unwrap_or_default(),
            );
            if let Some(height) = doc.height {
                wire.set_height(height);
            }
            if !doc.material.is_empty() {
                wire.set_material(doc.material.as_str());
            }
            if let Some(current) = doc.current {
                wire.set_current(current);
            }
            if let Some(scenario) = doc.scenario {
                wire.set_scenario(scenario);
            }
            if let Some(ProfileKind::Jedec4) = doc.profile {
                let (Some(h1), Some(h2), Some(alpha), Some(beta)) =
                    (doc.h1, doc.h2, doc.alpha, doc.beta)
                else {
                    return Err(malformed(format!(
                        "JEDEC-4 bondwire `{}` is missing loop parameters",
                        doc.name
                    )));
                };
                wire.set_profile(BondwireProfile::Jedec4 {
                    h1,
                    h2,
                    alpha,
                    beta,
                });
            }
            Primitive::Bondwire(wire)
        }
    })
}

fn pad_doc(pad: &PadShape) -> PadDoc {
    PadDoc {
        x: pad.offset.x,
        y: pad.offset.y,
        rotation: pad.rotation,
        shape: shape_doc(&pad.shape),
    }
}

fn cell_doc(cell: &Cell) -> CellDoc {
    let layout = cell.layout();
    CellDoc {
        name: cell.name().to_string(),
        boundary: layout.boundary().map(shape_doc),
        layers: layout
            .layers()
            .map(|(_, l)| LayerDoc {
                name: l.name().to_string(),
                kind: l.layer_type(),
                elevation: l.elevation(),
                thickness: l.thickness(),
                conducting: l.conducting_material().to_string(),
                dielectric: l.dielectric_material().to_string(),
            })
            .collect(),
        nets: layout
            .nets()
            .map(|(_, n)| NetDoc {
                name: n.name().to_string(),
            })
            .collect(),
        components: layout
            .components()
            .map(|(_, c)| {
                let loss: Vec<f64> = c
                    .loss_power()
                    .samples()
                    .iter()
                    .flat_map(|(t, p)| [*t, *p])
                    .collect();
                ComponentDoc {
                    name: c.name().to_string(),
                    def: c.def().index(),
                    layer: c.layer().index(),
                    flipped: c.is_flipped(),
                    scenario: c.scenario(),
                    loss: join_floats(&loss),
                    transform: c.transform().into(),
                }
            })
            .collect(),
        primitives: layout
            .primitives()
            .map(|(_, p)| primitive_doc(p))
            .collect(),
        padstacks: layout
            .padstack_insts()
            .map(|(_, p)| PadstackInstDoc {
                name: p.name.to_string(),
                def: p.def.index(),
                top: p.top_layer.index(),
                bot: p.bot_layer.index(),
                net: p.net.map(|n| n.index()),
                is_layout_pin: p.is_layout_pin,
                transform: (&p.transform).into(),
            })
            .collect(),
        instances: layout
            .cell_insts()
            .map(|(_, inst)| InstanceDoc {
                name: inst.name().to_string(),
                cell: inst.def().index(),
                layer_map: inst.layer_map().map(|m| m.index()),
                transform: inst.transform().into(),
            })
            .collect(),
    }
}

fn database_doc(db: &Database) -> DatabaseDoc {
    let units = db.coord_units();
    DatabaseDoc {
        name: db.name().to_string(),
        unit: units.unit(),
        precision: units.precision(),
        hier_sep: db.hier_sep().to_string(),
        materials: db
            .materials()
            .map(|(_, m)| MaterialDoc {
                name: m.name().to_string(),
                kind: m.material_type(),
                props: MaterialPropId::ALL
                    .into_iter()
                    .filter_map(|id| m.property(id).map(|p| prop_doc(id, p)))
                    .collect(),
            })
            .collect(),
        component_defs: db
            .component_defs()
            .map(|(_, d)| {
                let b = d.boundary();
                ComponentDefDoc {
                    name: d.name().to_string(),
                    kind: d.component_type(),
                    height: d.height(),
                    material: d.material().to_string(),
                    bump: d.solder_ball_bump_height(),
                    filling: d.solder_filling_material().to_string(),
                    x0: b.left(),
                    y0: b.bot(),
                    x1: b.right(),
                    y1: b.top(),
                    pins: d
                        .pins()
                        .iter()
                        .map(|p| PinDoc {
                            name: p.name.to_string(),
                            x: p.location.x,
                            y: p.location.y,
                            io: p.io,
                        })
                        .collect(),
                }
            })
            .collect(),
        padstack_defs: db
            .padstack_defs()
            .map(|(_, d)| PadstackDefDoc {
                name: d.name().to_string(),
                material: d.material().to_string(),
                layers: d
                    .layers()
                    .iter()
                    .map(|l| PadLayerDoc {
                        name: l.to_string(),
                        pad: d.pad(l).map(pad_doc),
                    })
                    .collect(),
                via: d.via().map(pad_doc),
            })
            .collect(),
        layer_maps: db
            .layer_maps()
            .map(|(_, m)| LayerMapDoc {
                name: m.name().to_string(),
                pairs: m
                    .pairs()
                    .iter()
                    .map(|(f, t)| PairDoc {
                        from: f.index(),
                        to: t.index(),
                    })
                    .collect(),
            })
            .collect(),
        cells: db.cells().map(|(_, cell)| cell_doc(cell)).collect(),
    }
}

fn layout_from_doc(doc: &CellDoc, db: &Database) -> Result<Layout> {
    let mut layout = Layout::new();
    layout.set_boundary_option(doc.boundary.as_ref().map(shape_from_doc).transpose()?);
    for l in &doc.layers {
        layout
            .append_layer(Layer::new(
                l.name.as_str(),
                l.kind,
                l.elevation,
                l.thickness,
                l.conducting.as_str(),
                l.dielectric.as_str(),
            ))
            .ok_or_else(|| malformed(format!("duplicate layer `{}`", l.name)))?;
    }
    for n in &doc.nets {
        if layout.contains_net_name(&n.name) {
            return Err(malformed(format!("duplicate net `{}`", n.name)));
        }
        layout.insert_net_raw(n.name.as_str().into());
    }
    let layer = |index: usize| {
        (index < doc.layers.len())
            .then(|| LayerId::from_index(index))
            .ok_or_else(|| malformed(format!("cell `{}` has no layer {index}", doc.name)))
    };
    let net = |index: Option<usize>| match index {
        Some(i) if i >= doc.nets.len() => {
            Err(malformed(format!("cell `{}` has no net {i}", doc.name)))
        }
        other => Ok(other.map(NetId::from_index)),
    };

    for c in &doc.components {
        if layout.contains_component_name(&c.name) {
            return Err(malformed(format!("duplicate component `{}`", c.name)));
        }
        let def = ComponentDefId::from_index(c.def);
        if db.component_def(def).is_none() {
            return Err(malformed(format!("component `{}` has no definition", c.name)));
        }
        let mut comp = Component::new(
            c.name.as_str().into(),
            def,
            layer(c.layer)?,
            c.transform.into(),
            c.flipped,
        );
        comp.set_scenario(c.scenario);
        let samples = pairs(parse_floats(&c.loss)?, "loss power table")?;
        if !samples.is_empty() {
            comp.set_loss_power(LossPowerTable::new(samples));
        }
        layout.push_component(comp);
    }

    for p in &doc.primitives {
        let primitive = primitive_from_doc(p)?;
        net(primitive.net().map(|n| n.index()))?;
        match &primitive {
            Primitive::Geometry(g) => {
                layer(g.layer.index())?;
            }
            Primitive::Text(t) => {
                if let Some(l) = t.layer {
                    layer(l.index())?;
                }
            }
            Primitive::Bondwire(b) => {
                if !layout.check_end(b.start()) || !layout.check_end(b.end()) {
                    return Err(malformed(format!(
                        "bondwire `{}` has an unresolved end",
                        b.name()
                    )));
                }
                if layout.find_bondwire_by_name(b.name()).is_some() {
                    return Err(malformed(format!("duplicate bondwire `{}`", b.name())));
                }
            }
        }
        layout.push_primitive_raw(primitive);
    }

    for p in &doc.padstacks {
        if layout.find_padstack_inst_by_name(&p.name).is_some() {
            return Err(malformed(format!("duplicate padstack `{}`", p.name)));
        }
        let def = PadstackDefId::from_index(p.def);
        if db.padstack_def(def).is_none() {
            return Err(malformed(format!("padstack `{}` has no definition", p.name)));
        }
        layout.push_padstack_inst(PadstackInst {
            name: p.name.as_str().into(),
            def,
            top_layer: layer(p.top)?,
            bot_layer: layer(p.bot)?,
            net: net(p.net)?,
            transform: p.transform.into(),
            is_layout_pin: p.is_layout_pin,
        });
    }

    for inst in &doc.instances {
        let child = CellId::from_index(inst.cell);
        if db.try_cell(child).is_none() {
            return Err(malformed(format!("instance `{}` has no cell", inst.name)));
        }
        let layer_map = inst.layer_map.map(LayerMapId::from_index);
        if layer_map.is_some_and(|m| db.layer_map(m).is_none()) {
            return Err(malformed(format!("instance `{}` has no layer map", inst.name)));
        }
        layout
            .insert_cell_inst(CellInst::new(
                inst.name.as_str().into(),
                child,
                inst.transform.into(),
                layer_map,
            ))
            .ok_or_else(|| malformed(format!("duplicate instance `{}`", inst.name)))?;
    }
    Ok(layout)
}

fn database_from_doc(doc: DatabaseDoc) -> Result<Database> {
    let mut db = Database::new(doc.name.as_str());
    db.set_coord_units(
        CoordUnits::from_meters(doc.unit, doc.precision)
            .ok_or_else(|| malformed("coordinate units must be positive"))?,
    );
    db.set_hier_sep(doc.hier_sep.chars().next().unwrap_or(DEFAULT_HIER_SEP));

    for m in &doc.materials {
        let mut def = MaterialDef::new(m.name.as_str());
        def.set_material_type(m.kind);
        for p in &m.props {
            def.set_property(p.id, prop_from_doc(p)?);
        }
        db.create_material_def(def)
            .ok_or_else(|| malformed(format!("duplicate material `{}`", m.name)))?;
    }

    for d in &doc.component_defs {
        let mut def = ComponentDef::new(
            d.name.as_str(),
            d.kind,
            Rect::from_sides(d.x0, d.y0, d.x1, d.y1),
        );
        def.set_height(d.height)
            .set_material(d.material.as_str())
            .set_solder_ball_bump_height(d.bump)
            .set_solder_filling_material(d.filling.as_str());
        for p in &d.pins {
            if !def.add_pin(p.name.as_str(), Point::new(p.x, p.y), p.io) {
                return Err(malformed(format!("duplicate pin `{}` on `{}`", p.name, d.name)));
            }
        }
        db.create_component_def(def)
            .ok_or_else(|| malformed(format!("duplicate component definition `{}`", d.name)))?;
    }

    for d in &doc.padstack_defs {
        let mut def = PadstackDef::new(d.name.as_str());
        def.set_material(d.material.as_str())
            .set_layers(d.layers.iter().map(|l| l.name.as_str()));
        for l in &d.layers {
            if let Some(pad) = &l.pad {
                def.set_pad(
                    &l.name,
                    shape_from_doc(&pad.shape)?,
                    Point::new(pad.x, pad.y),
                    pad.rotation,
                );
            }
        }
        if let Some(via) = &d.via {
            def.set_via(shape_from_doc(&via.shape)?, Point::new(via.x, via.y), via.rotation);
        }
        db.create_padstack_def(def)
            .ok_or_else(|| malformed(format!("duplicate padstack definition `{}`", d.name)))?;
    }

    for m in &doc.layer_maps {
        let mut map = LayerMap::new(m.name.as_str());
        for p in &m.pairs {
            map.set_mapping(LayerId::from_index(p.from), LayerId::from_index(p.to));
        }
        db.create_layer_map(map)
            .ok_or_else(|| malformed(format!("duplicate layer map `{}`", m.name)))?;
    }

    let ids = doc
        .cells
        .iter()
        .map(|c| {
            db.create_circuit_cell(c.name.as_str())
                .ok_or_else(|| malformed(format!("duplicate cell `{}`", c.name)))
        })
        .collect::<Result<Vec<_>>>()?;
    for (id, cell) in ids.into_iter().zip(&doc.cells) {
        let layout = layout_from_doc(cell, &db)?;
        db.replace_layout(id, layout);
    }
    Ok(db)
}

pub(super) fn to_string(db: &Database) -> Result<String> {
    Ok(quick_xml::se::to_string(&database_doc(db))?)
}

pub(super) fn from_str(s: &str) -> Result<Database> {
    database_from_doc(quick_xml::de::from_str(s)?)
}
