use approx::assert_relative_eq;
use ecad::prelude::*;
use test_log::test;
use thermal::prelude::*;

use crate::shared::package::*;

fn roundtrip(format: ArchiveFormat) -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("module.db");
    let mut ctx = Context::init(EcadConfig::default());

    let db = ctx.create_database("module").unwrap();
    let cell = tiny(db, "tiny");
    bond_gate(db, cell, 10.);
    let before = run_thermal_simulation(db, cell, &static_setup(5000.))?;
    ctx.save_database("module", &path, format)?;
    assert!(ctx.remove_database("module"));

    let db = ctx.load_database(&path, format)?;
    assert_eq!(db.name(), "module");
    let cell = db.find_cell_by_name("tiny").unwrap();
    let layout = db.layout(cell).unwrap();
    let wire = layout.find_bondwire_by_name(GATE_WIRE).unwrap();
    let wire = layout.primitive(wire).unwrap().as_bondwire().unwrap();
    assert_relative_eq!(wire.current(), 10.);
    assert_eq!(
        layout
            .component(layout.find_component_by_name(DIE).unwrap())
            .unwrap()
            .loss_power()
            .power(25.),
        DIE_POWER
    );

    let after = run_thermal_simulation(db, cell, &static_setup(5000.))?;
    assert_eq!(after, before);
    assert!(ctx.load_database(&path, format).is_err());
    Ok(())
}

#[test]
fn binary_archives_simulate_identically() -> anyhow::Result<()> {
    roundtrip(ArchiveFormat::Binary)
}

#[test]
fn xml_archives_simulate_identically() -> anyhow::Result<()> {
    roundtrip(ArchiveFormat::Xml)
}
