use geometry::prelude::*;

use crate::component::{ComponentDef, ComponentType, PinIoType};
use crate::database::{BondwireSide, Database};
use crate::flatten::FlattenOption;
use crate::layer::{Layer, LayerMap, LayerType};
use crate::primitive::{BondwireEnd, Primitive};

fn stackup() -> [Layer; 2] {
    [
        Layer::new("TopCu", LayerType::Conducting, 0., 0.3, "Cu", "Air"),
        Layer::new("BotCu", LayerType::Conducting, -0.3, 3., "Cu", "Air"),
    ]
}

fn tilted_square() -> Shape {
    Shape::Polygon(Polygon::from_verts(vec![
        Point::new(0, 0),
        Point::new(1000, 0),
        Point::new(1000, 1000),
        Point::new(0, 1000),
    ]))
}

#[test]
fn nested_transforms_compose_once() {
    let mut db = Database::new("db");
    let a = db.create_circuit_cell("A").unwrap();
    let b = db.create_circuit_cell("B").unwrap();
    let c = db.create_circuit_cell("C").unwrap();
    for cell in [a, b, c] {
        db.layout_mut(cell).unwrap().append_layers(stackup()).unwrap();
    }
    let top = db.layout(a).unwrap().find_layer_by_name("TopCu").unwrap();
    db.layout_mut(a)
        .unwrap()
        .create_geometry_2d(top, None, tilted_square())
        .unwrap();

    let t1 = Transformation::from_parts(1., 0.5, Mirror::X, Point::new(1234, -77));
    let t2 = Transformation::from_parts(2., -1.1, Mirror::No, Point::new(-5000, 9000));
    db.create_cell_inst(b, "a0", a, t1, None).unwrap();
    db.create_cell_inst(c, "b0", b, t2, None).unwrap();

    let flat = db.flattened(c).unwrap();
    let expected = tilted_square().transform(Transformation::cascade(t2, t1));
    let shapes: Vec<_> = flat.geometries().map(|(_, g)| g.shape.clone()).collect();
    assert_eq!(shapes, vec![expected]);
    assert!(flat.is_flat());
}

#[test]
fn flatten_is_idempotent() {
    let mut db = Database::new("db");
    let leaf = db.create_circuit_cell("leaf").unwrap();
    let top = db.create_circuit_cell("top").unwrap();
    for cell in [leaf, top] {
        db.layout_mut(cell).unwrap().append_layers(stackup()).unwrap();
    }
    let layout = db.layout_mut(leaf).unwrap();
    let l0 = layout.find_layer_by_name("BotCu").unwrap();
    let net = layout.create_net("GND");
    layout
        .create_geometry_2d(l0, net, Rect::from_sides(0, 0, 10, 10))
        .unwrap();
    for (i, x) in [0, 100].into_iter().enumerate() {
        db.create_cell_inst(
            top,
            format!("i{i}"),
            leaf,
            Transformation::from_offset(Point::new(x, 0)),
            None,
        )
        .unwrap();
    }

    let once = db.flatten(top, FlattenOption::InPlace).unwrap().clone();
    let twice = db.flatten(top, FlattenOption::InPlace).unwrap().clone();
    assert_eq!(once, twice);
    assert_eq!(once.num_primitives(), 2);
    assert!(once.find_net_by_name("i0/GND").is_some());
    assert!(once.find_net_by_name("i1/GND").is_some());
}

#[test]
fn snapshot_leaves_hierarchy_untouched() {
    let mut db = Database::new("db");
    let leaf = db.create_circuit_cell("leaf").unwrap();
    let top = db.create_circuit_cell("top").unwrap();
    for cell in [leaf, top] {
        db.layout_mut(cell).unwrap().append_layers(stackup()).unwrap();
    }
    db.create_cell_inst(top, "i0", leaf, Transformation::identity(), None)
        .unwrap();
    let before = db.layout(top).unwrap().clone();

    assert!(db.flatten(top, FlattenOption::Snapshot).unwrap().is_flat());
    assert_eq!(db.layout(top), Some(&before));
    assert!(db.cell(top).flattened_layout().is_some());

    db.layout_mut(leaf).unwrap().create_net("VDD");
    assert!(db.cell(top).flattened_layout().is_none());
}

#[test]
fn unmapped_layers_are_dropped() {
    let mut db = Database::new("db");
    let leaf = db.create_circuit_cell("leaf").unwrap();
    let top = db.create_circuit_cell("top").unwrap();
    let leaf_layout = db.layout_mut(leaf).unwrap();
    let [l_top, l_bot] = stackup();
    let lt = leaf_layout.append_layer(l_top).unwrap();
    let lb = leaf_layout.append_layer(l_bot).unwrap();
    leaf_layout
        .create_geometry_2d(lt, None, Rect::from_sides(0, 0, 5, 5))
        .unwrap();
    leaf_layout
        .create_geometry_2d(lb, None, Rect::from_sides(0, 0, 5, 5))
        .unwrap();

    let top_layout = db.layout_mut(top).unwrap();
    let t0 = top_layout
        .append_layer(Layer::new("Metal", LayerType::Conducting, 0., 0.3, "Cu", "Air"))
        .unwrap();

    let mut map = LayerMap::new("leaf2top");
    map.set_mapping(lb, t0);
    let map = db.create_layer_map(map).unwrap();
    db.create_cell_inst(top, "i0", leaf, Transformation::identity(), Some(map))
        .unwrap();

    let flat = db.flattened(top).unwrap();
    let layers: Vec<_> = flat.geometries().map(|(_, g)| g.layer).collect();
    assert_eq!(layers, vec![t0]);

    // Without a map, layers match by name and "Metal" has no counterpart.
    let other = db.create_circuit_cell("other").unwrap();
    db.layout_mut(other)
        .unwrap()
        .append_layer(Layer::new("Metal", LayerType::Conducting, 0., 0.3, "Cu", "Air"));
    db.create_cell_inst(other, "i0", leaf, Transformation::identity(), None)
        .unwrap();
    assert_eq!(db.flattened(other).unwrap().num_primitives(), 0);
}

#[test]
fn bondwire_pins_follow_renamed_components() {
    let mut db = Database::new("db");
    let mut def = ComponentDef::new("die", ComponentType::Ic, Rect::from_sides(-50, -50, 50, 50));
    def.add_pin("G", Point::new(0, 40), PinIoType::Input);
    let def = db.create_component_def(def).unwrap();

    let leaf = db.create_circuit_cell("leaf").unwrap();
    let top = db.create_circuit_cell("top").unwrap();
    for cell in [leaf, top] {
        db.layout_mut(cell).unwrap().append_layers(stackup()).unwrap();
    }
    let layout = db.layout_mut(top).unwrap();
    let l0 = layout.find_layer_by_name("TopCu").unwrap();
    layout.create_component("U1", def, l0, Transformation::identity(), false);

    let layout = db.layout_mut(leaf).unwrap();
    let end = BondwireEnd::Layer {
        layer: l0,
        point: Point::new(500, 0),
        flipped: false,
    };
    let wire = layout
        .create_bondwire("G", None, end.clone(), end, 0.1)
        .unwrap();
    let u1 = db
        .create_component(leaf, "U1", def, l0, Transformation::identity(), false)
        .unwrap();
    assert!(db.set_bondwire_pin(leaf, wire, BondwireSide::Start, u1, "G"));
    db.create_cell_inst(
        top,
        "sub",
        leaf,
        Transformation::from_offset(Point::new(1000, 0)),
        None,
    )
    .unwrap();

    let flat = db.flattened(top).unwrap();
    let comp = flat.find_component_by_name("sub/U1").unwrap();
    assert_eq!(
        flat.component(comp).map(|c| c.transform().offset_point()),
        Some(Point::new(1000, 0))
    );
    let (_, wire) = flat.bondwires().next().unwrap();
    assert_eq!(wire.name(), "sub/G");
    assert_eq!(
        wire.start(),
        &BondwireEnd::Pin {
            component: comp,
            pin: "G".into()
        }
    );
    assert!(matches!(
        wire.end(),
        BondwireEnd::Layer { point, .. } if *point == Point::new(1500, 0)
    ));
    assert!(flat
        .primitives()
        .all(|(_, p)| !matches!(p, Primitive::Text(_))));
}

#[test]
fn unknown_cells_do_not_flatten() {
    let mut db = Database::new("db");
    let top = db.create_circuit_cell("top").unwrap();
    let missing = crate::cell::CellId::from_index(7);

    assert!(db.flattened(missing).is_none());
    assert!(db.flatten(missing, FlattenOption::Snapshot).is_none());
    assert!(db.flatten(missing, FlattenOption::InPlace).is_none());
    assert!(db
        .create_cell_inst(top, "i0", missing, Transformation::identity(), None)
        .is_none());
    assert!(db.flattened(top).unwrap().is_flat());
}
