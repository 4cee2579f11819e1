use approx::assert_relative_eq;
use ecad::prelude::*;
use test_log::test;

use super::*;

/// A 10 x 10 mm two-layer board with a 2 x 2 mm die bonded to the top copper.
fn board() -> (Database, CellId) {
    board_at(Transformation::translate(5e6, 5e6))
}

fn board_at(place: Transformation) -> (Database, CellId) {
    let mut db = Database::new("board");
    let mut die = ComponentDef::new(
        "die",
        ComponentType::Ic,
        Rect::from_sides(-1_000_000, -1_000_000, 1_000_000, 1_000_000),
    );
    die.set_height(0.5).set_material("SiC");
    die.add_pin("G", Point::new(0, 500_000), PinIoType::Input);
    let die = db.create_component_def(die).unwrap();

    let cell = db.create_circuit_cell("top").unwrap();
    let layout = db.layout_mut(cell).unwrap();
    let top = layout
        .append_layer(Layer::new("TopCu", LayerType::Conducting, 0., 0.3, "Cu", "Air"))
        .unwrap();
    let bot = layout
        .append_layer(Layer::new("BotCu", LayerType::Conducting, -0.3, 3., "Cu", "Air"))
        .unwrap();
    let outline = Rect::from_sides(0, 0, 10_000_000, 10_000_000);
    layout.set_boundary(outline);
    layout.create_geometry_2d(top, None, outline).unwrap();
    layout.create_geometry_2d(bot, None, outline).unwrap();

    let comp = db
        .create_component(cell, "U1", die, top, place, false)
        .unwrap();
    let layout = db.layout_mut(cell).unwrap();
    layout
        .component_mut(comp)
        .unwrap()
        .set_loss_power(LossPowerTable::constant(10.));
    let end = BondwireEnd::Layer {
        layer: top,
        point: Point::new(8_000_000, 5_000_000),
        flipped: false,
    };
    let start = BondwireEnd::Pin {
        component: comp,
        pin: "G".into(),
    };
    let wire = layout.create_bondwire("BW1", None, start, end, 0.1).unwrap();
    layout
        .bondwire_mut(wire)
        .unwrap()
        .set_height(0.5)
        .set_material("Cu")
        .set_current(5.);
    (db, cell)
}

fn contact_area(model: &PrismThermalModel) -> f64 {
    model.contacts.iter().map(|c| c.area).sum()
}

fn assert_board_model(model: &PrismThermalModel) {
    assert_eq!(model.slabs.len(), 7);
    assert_relative_eq!(model.total_volume(), 332., max_relative = 1e-9);
    assert_relative_eq!(contact_area(model), 504., max_relative = 1e-9);
    let top: f64 = model.prisms.iter().map(|p| p.top_exposed).sum();
    let bot: f64 = model.prisms.iter().map(|p| p.bot_exposed).sum();
    assert_relative_eq!(top, 100., max_relative = 1e-9);
    assert_relative_eq!(bot, 100., max_relative = 1e-9);
}

#[test]
fn stack_is_sliced_and_filled() {
    let (db, cell) = board();
    let layout = db.layout(cell).unwrap();
    let model = extract_model(&db, layout, &PrismExtractionSettings::default()).unwrap();

    assert_board_model(&model);
    assert_eq!(model.meshes.len(), 1);
    assert_relative_eq!(model.unit_to_meter, 1e-3);
    assert_eq!(model.components, vec![arcstr::literal!("U1")]);

    let die = model.locate([5., 5., 0.25]).unwrap();
    assert_eq!(model.prisms[die].component, Some(0));
    assert_eq!(model.materials[model.prisms[die].material], "SiC");
    let copper = model.locate([1., 1., -2.]).unwrap();
    assert_eq!(model.materials[model.prisms[copper].material], "Cu");
    assert_eq!(model.locate([1., 1., 0.25]), None);

    let thickest = model.slabs.iter().map(Slab::thickness).fold(0., f64::max);
    assert!(thickest <= 0.6 + 1e-9);
}

#[test]
fn rotated_die_keeps_its_volume() {
    let (db, cell) = board_at(Transformation::cascade(
        Transformation::translate(5e6, 5e6),
        Transformation::rotate(std::f64::consts::FRAC_PI_4),
    ));
    let layout = db.layout(cell).unwrap();
    let model = extract_model(&db, layout, &PrismExtractionSettings::default()).unwrap();

    let die: f64 = (0..model.prisms.len())
        .filter(|&p| model.prisms[p].component == Some(0))
        .map(|p| model.prism_volume(p))
        .sum();
    assert_relative_eq!(die, 2., max_relative = 1e-5);
    assert_relative_eq!(model.total_volume(), 332., max_relative = 1e-5);

    let tip = model.locate([5., 6.3, 0.25]).unwrap();
    assert_eq!(model.prisms[tip].component, Some(0));
    // a corner of the unrotated footprint lies outside the die
    assert_eq!(model.locate([5.9, 5.9, 0.25]), None);
}

#[test]
fn lateral_neighbors_are_mutual() {
    let (db, cell) = board();
    let layout = db.layout(cell).unwrap();
    let model = extract_model(&db, layout, &PrismExtractionSettings::default()).unwrap();
    for (i, prism) in model.prisms.iter().enumerate() {
        for n in prism.neighbors.into_iter().flatten() {
            assert_eq!(model.prisms[n].slab, prism.slab);
            assert!(model.prisms[n].neighbors.contains(&Some(i)));
        }
    }
}

#[test]
fn layer_meshes_are_joined_by_overlaps() {
    let (db, cell) = board();
    let layout = db.layout(cell).unwrap();
    let mut settings = PrismExtractionSettings::default();
    settings.mesh.gen_mesh_by_layer = true;
    let model = extract_model(&db, layout, &settings).unwrap();

    assert_eq!(model.meshes.len(), 2);
    assert!(model.meshes[1].num_triangles() < model.meshes[0].num_triangles());
    assert_board_model(&model);
}

#[test]
fn bondwires_become_anchored_lines() {
    let (db, cell) = board();
    let layout = db.layout(cell).unwrap();
    let model = extract_model(&db, layout, &PrismExtractionSettings::default()).unwrap();

    assert_eq!(model.bondwires, vec![arcstr::literal!("BW1")]);
    assert_eq!(model.lines.len(), 3);
    assert_eq!(model.lines[0].prev, None);
    assert_eq!(model.lines[2].prev, Some(1));
    let start = model.lines[0].anchors[0];
    assert_eq!(model.prisms[start].component, Some(0));
    let end = model.lines[2].anchors[0];
    assert!(model.prism_center(end)[2] < 0.);
    assert!(model.lines[1].anchors.is_empty());
    assert_relative_eq!(model.lines[0].start[2], 0.5);

    let mut settings = PrismExtractionSettings::default();
    settings.mesh.max_len = 1.;
    let fine = extract_model(&db, layout, &settings).unwrap();
    assert!(fine.lines.len() > 3);
    assert!(fine.lines.iter().all(|l| l.length() <= 1. + 1e-9));
}

#[test]
fn empty_inputs_are_rejected() {
    let mut db = Database::new("empty");
    let cell = db.create_circuit_cell("top").unwrap();
    let settings = PrismExtractionSettings::default();
    let err = extract_model(&db, db.layout(cell).unwrap(), &settings).unwrap_err();
    assert!(matches!(err, Error::MissingStackup));

    db.layout_mut(cell)
        .unwrap()
        .append_layer(Layer::new("L", LayerType::Conducting, 0., 1., "Cu", "Air"))
        .unwrap();
    let err = extract_model(&db, db.layout(cell).unwrap(), &settings).unwrap_err();
    assert!(matches!(err, Error::EmptyLayout));
    assert!(err.is_extraction_error());
}

#[test]
fn cached_models_ignore_power_and_current() {
    let dir = tempfile::tempdir().unwrap();
    let (mut db, cell) = board();
    let settings = PrismExtractionSettings::default().with_work_dir(dir.path());

    let (first, status) = extract_cached(&db, db.layout(cell).unwrap(), &settings).unwrap();
    assert_eq!(status, CacheStatus::Miss);
    let (second, status) = extract_cached(&db, db.layout(cell).unwrap(), &settings).unwrap();
    assert_eq!(status, CacheStatus::Hit);
    assert_eq!(first, second);

    let layout = db.layout_mut(cell).unwrap();
    let comp = layout.find_component_by_name("U1").unwrap();
    layout
        .component_mut(comp)
        .unwrap()
        .set_loss_power(LossPowerTable::constant(99.));
    let (_, status) = extract_cached(&db, db.layout(cell).unwrap(), &settings).unwrap();
    assert_eq!(status, CacheStatus::Hit);

    let mut finer = settings.clone();
    finer.mesh.max_len = 2.;
    let (_, status) = extract_cached(&db, db.layout(cell).unwrap(), &finer).unwrap();
    assert_eq!(status, CacheStatus::Miss);

    let mut forced = settings.clone();
    forced.force_rebuild = true;
    let (_, status) = extract_cached(&db, db.layout(cell).unwrap(), &forced).unwrap();
    assert_eq!(status, CacheStatus::Miss);
}
