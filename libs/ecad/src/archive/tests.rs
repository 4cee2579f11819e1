use geometry::prelude::*;

use super::*;
use crate::component::{ComponentDef, ComponentType, LossPowerTable, PinIoType};
use crate::database::BondwireSide;
use crate::error::Error;
use crate::layer::{Layer, LayerType};
use crate::material::{MaterialDef, MaterialProp, MaterialPropId, MaterialType};
use crate::padstack::PadstackDef;
use crate::primitive::{BondwireEnd, BondwireProfile};

fn package() -> Database {
    let mut db = Database::new("pkg");
    db.set_hier_sep('.');

    let mut cu = MaterialDef::new("Cu");
    cu.set_property(
        MaterialPropId::ThermalConductivity,
        MaterialProp::Polynomial(vec![vec![437.6, -0.165, 1.825e-4, -1.427e-7]]),
    )
    .set_property(MaterialPropId::SpecificHeat, MaterialProp::Simple(385.))
    .set_property(
        MaterialPropId::MassDensity,
        MaterialProp::Table(vec![(250., 8960.), (400., 8900.)]),
    );
    db.create_material_def(cu).unwrap();
    let mut air = MaterialDef::new("Air");
    air.set_material_type(MaterialType::Fluid).set_property(
        MaterialPropId::ThermalConductivity,
        MaterialProp::Anisotropic([0.026, 0.026, 0.03]),
    );
    db.create_material_def(air).unwrap();

    let mut die = ComponentDef::new(
        "die",
        ComponentType::Ic,
        Rect::from_sides(-2_500_000, -2_000_000, 2_500_000, 2_000_000),
    );
    die.set_height(0.18)
        .set_material("SiC")
        .set_solder_ball_bump_height(0.1)
        .set_solder_filling_material("Sn");
    die.add_pin("G", Point::new(-1_000_000, 0), PinIoType::Input);
    die.add_pin("S", Point::new(1_000_000, 0), PinIoType::Output);
    let die = db.create_component_def(die).unwrap();

    let mut via = PadstackDef::new("via");
    via.set_material("Cu").set_layers(["Top", "Bot"]);
    via.set_pad(
        "Top",
        Shape::Polygon(Polygon::circle(Point::zero(), 200_000, 8)),
        Point::new(10, -10),
        45.,
    );
    via.set_via(Rect::from_sides(-50_000, -50_000, 50_000, 50_000).into(), Point::zero(), 0.);
    let via = db.create_padstack_def(via).unwrap();

    let sub = db.create_circuit_cell("sub").unwrap();
    let top = db.create_circuit_cell("top").unwrap();
    for cell in [sub, top] {
        let layout = db.layout_mut(cell).unwrap();
        layout
            .append_layer(Layer::new("Top", LayerType::Conducting, 3.3, 0.3, "Cu", "Air"))
            .unwrap();
        layout
            .append_layer(Layer::new("Bot", LayerType::Conducting, 3., 3., "Cu", "Air"))
            .unwrap();
    }
    let map = db.create_default_layer_map("sub2top", sub, top).unwrap();

    let layout = db.layout_mut(sub).unwrap();
    let l0 = layout.find_layer_by_name("Top").unwrap();
    let l1 = layout.find_layer_by_name("Bot").unwrap();
    let gate = layout.create_net("gate").unwrap();
    let outline = Polygon::from_verts(vec![
        Point::new(0, 0),
        Point::new(20_000_000, 0),
        Point::new(20_000_000, 10_000_000),
        Point::new(0, 10_000_000),
    ]);
    let hole = Polygon::rect(Rect::from_sides(1_000_000, 1_000_000, 2_000_000, 2_000_000));
    layout.set_boundary(Shape::PolygonWithHoles(PolygonWithHoles::new(outline, vec![hole])));
    layout
        .create_geometry_2d(l0, Some(gate), Rect::from_sides(0, 0, 5_000_000, 5_000_000))
        .unwrap();
    layout
        .create_text(None, "label", Transformation::translate(1e6, 2e6))
        .unwrap();
    layout
        .create_padstack_inst("V1", via, l0, l1, Some(gate), Transformation::identity(), true)
        .unwrap();
    let start = BondwireEnd::Layer {
        layer: l0,
        point: Point::new(8_000_000, 3_000_000),
        flipped: false,
    };
    let wire = layout
        .create_bondwire("BW1", Some(gate), start.clone(), start, 0.0635)
        .unwrap();
    layout
        .bondwire_mut(wire)
        .unwrap()
        .set_height(0.5)
        .set_material("Al")
        .set_current(12.)
        .set_scenario(1)
        .set_profile(BondwireProfile::Jedec4 {
            h1: 0.4,
            h2: 0.2,
            alpha: 60.,
            beta: 30.,
        });
    let rot = Transformation::rotate(std::f64::consts::FRAC_PI_3);
    let u1 = db.create_component(sub, "U1", die, l0, rot, true).unwrap();
    db.layout_mut(sub)
        .unwrap()
        .component_mut(u1)
        .unwrap()
        .set_loss_power(LossPowerTable::new([(25., 108.), (125., 120.)]))
        .set_scenario(2);
    assert!(db.set_bondwire_pin(sub, wire, BondwireSide::End, u1, "G"));

    db.create_cell_inst(
        top,
        "s0",
        sub,
        Transformation::from_parts(1., 0.3, Mirror::Y, Point::new(5, 7)),
        Some(map),
    )
    .unwrap();
    db
}

#[test]
fn binary_round_trip_is_lossless() -> anyhow::Result<()> {
    let db = package();
    let loaded = from_bytes(&to_bytes(&db)?)?;
    assert_eq!(loaded, db);
    assert_eq!(loaded.hier_sep(), '.');
    Ok(())
}

#[test]
fn xml_round_trip_is_lossless() -> anyhow::Result<()> {
    let db = package();
    let xml = to_xml_string(&db)?;
    assert!(xml.starts_with("<Database"));
    let loaded = from_xml_str(&xml)?;
    assert_eq!(loaded, db);
    Ok(())
}

#[test]
fn empty_property_curves_round_trip() -> anyhow::Result<()> {
    let mut db = Database::new("empty");
    let mut void = MaterialDef::new("Void");
    void.set_property(MaterialPropId::ThermalConductivity, MaterialProp::Polynomial(vec![]))
        .set_property(MaterialPropId::MassDensity, MaterialProp::Table(vec![]));
    db.create_material_def(void).unwrap();
    assert_eq!(from_xml_str(&to_xml_string(&db)?)?, db);
    assert_eq!(from_bytes(&to_bytes(&db)?)?, db);
    Ok(())
}

#[test_log::test]
fn files_round_trip_in_both_formats() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let db = package();
    let files = [
        ("nested/pkg.bin", ArchiveFormat::Binary),
        ("pkg.xml", ArchiveFormat::Xml),
    ];
    for (file, format) in files {
        let path = dir.path().join(file);
        save(&db, &path, format)?;
        let loaded = load(&path, format)?;
        assert_eq!(loaded.cells().len(), 2);
        let sub = loaded.find_cell_by_name("sub").unwrap();
        let layout = loaded.layout(sub).unwrap();
        assert_eq!(layout.num_layers(), 2);
        assert_eq!(layout.num_primitives(), 3);
        assert!(layout.find_net_by_name("gate").is_some());
    }
    Ok(())
}

#[test]
fn malformed_xml_is_rejected() {
    let bad_ref = r#"<Database name="x" unit="0.001" precision="1e-9" hier_sep="/">
        <Cell name="top"><Instance name="i" cell="4"><Transform a00="1" a01="0" a10="0" a11="1" b0="0" b1="0"/></Instance></Cell>
    </Database>"#;
    assert!(matches!(from_xml_str(bad_ref), Err(Error::MalformedArchive(_))));

    let bad_units = r#"<Database name="x" unit="0" precision="1e-9" hier_sep="/"/>"#;
    assert!(matches!(from_xml_str(bad_units), Err(Error::MalformedArchive(_))));

    assert!(matches!(from_xml_str("<Database"), Err(Error::XmlDecode(_))));
}
