use approx::assert_relative_eq;
use cache::CacheStatus;
use ecad::prelude::*;
use test_log::test;
use thermal::prelude::*;

use crate::shared::package::*;

#[test]
fn die_heats_the_module() {
    let mut db = Database::new("module");
    let cell = tiny(&mut db, "tiny");
    let result = run_thermal_simulation(&db, cell, &static_setup(5000.)).unwrap();

    assert!(result.min > 25.);
    assert!(result.max > result.min + 1.);
    let die = result.monitors[0].unwrap();
    assert!(result.min <= die && die <= result.max);
    assert!(die > (result.min + result.max) / 2.);

    let (min, max, monitors) = run_thermal_simulation(&db, cell, &static_setup(5000.))
        .unwrap()
        .into();
    assert_eq!((min, max), (result.min, result.max));
    assert_eq!(monitors, result.monitors);
}

#[test]
fn better_cooling_lowers_temperatures() {
    let mut db = Database::new("module");
    let cell = tiny(&mut db, "tiny");
    let mut maxima = Vec::new();
    for htc in [2000., 5000., 20000.] {
        maxima.push(run_thermal_simulation(&db, cell, &static_setup(htc)).unwrap().max);
    }
    assert!(maxima.windows(2).all(|w| w[0] > w[1]), "{maxima:?}");
}

#[test]
fn transient_approaches_the_static_solution() {
    let mut db = Database::new("module");
    let cell = tiny(&mut db, "tiny");
    let steady = run_thermal_simulation(&db, cell, &static_setup(5000.))
        .unwrap()
        .monitors[0]
        .unwrap();

    let setup = ThermalTransientSimulationSetup {
        extraction: extraction(5000.),
        settings: ThermalTransientSettings {
            step: 0.1,
            duration: 60.,
            ..Default::default()
        },
        monitors: vec![die_monitor(), [-5., -5., 0.]],
    };
    let result = run_thermal_simulation(&db, cell, &setup).unwrap();
    let series = result.monitors[0].as_ref().unwrap();
    assert!(result.monitors[1].is_none());
    assert_relative_eq!(series[0], 25., max_relative = 1e-9);
    assert_relative_eq!(*series.last().unwrap(), steady, max_relative = 1e-4);
    assert!(series.iter().all(|t| *t <= result.max + 1e-9));
}

#[test]
fn excitation_scales_the_die_power() {
    let mut db = Database::new("module");
    let cell = tiny(&mut db, "tiny");
    let setup = ThermalTransientSimulationSetup {
        extraction: extraction(5000.),
        settings: ThermalTransientSettings {
            step: 0.1,
            duration: 30.,
            ..Default::default()
        },
        monitors: vec![die_monitor()],
    };
    let full = run_thermal_simulation(&db, cell, &setup).unwrap();
    let half = run_thermal_simulation_with_excitation(&db, cell, &setup, &|_, _| 0.5).unwrap();
    let rise = |r: &ThermalTransientResult| r.monitors[0].as_ref().unwrap().last().unwrap() - 25.;
    assert_relative_eq!(rise(&half), rise(&full) / 2., max_relative = 1e-3);
}

#[test]
fn bondwire_current_adds_heat() {
    let mut db = Database::new("module");
    let cell = tiny(&mut db, "tiny");
    bond_gate(&mut db, cell, 0.);
    let cold = run_thermal_simulation(&db, cell, &static_setup(5000.)).unwrap();

    let wire = db
        .layout(cell)
        .unwrap()
        .find_bondwire_by_name(GATE_WIRE)
        .unwrap();
    db.layout_mut(cell)
        .unwrap()
        .bondwire_mut(wire)
        .unwrap()
        .set_current(30.);
    let hot = run_thermal_simulation(&db, cell, &static_setup(5000.)).unwrap();
    assert!(hot.max > cold.max);
    assert!(hot.monitors[0].unwrap() > cold.monitors[0].unwrap());
}

#[test]
fn instanced_dies_match_flat_ones() {
    let mut flat_db = Database::new("flat");
    let flat_cell = tiny(&mut flat_db, "tiny");
    let flat = run_thermal_simulation(&flat_db, flat_cell, &static_setup(5000.)).unwrap();

    let mut db = Database::new("hier");
    define_materials(&mut db);
    let def = define_die(&mut db);
    let die_cell = db.create_circuit_cell("die_site").unwrap();
    let top = db
        .layout_mut(die_cell)
        .unwrap()
        .append_layer(Layer::new(TOP_CU, LayerType::Conducting, 0., 0.3, "Cu", "Air"))
        .unwrap();
    let comp = db
        .create_component(die_cell, DIE, def, top, Transformation::identity(), false)
        .unwrap();
    db.layout_mut(die_cell)
        .unwrap()
        .component_mut(comp)
        .unwrap()
        .set_loss_power(LossPowerTable::constant(DIE_POWER));
    let board = db.create_circuit_cell("board").unwrap();
    build_stackup(db.layout_mut(board).unwrap());
    db.create_cell_inst(
        board,
        "site0",
        die_cell,
        Transformation::translate(BOARD_W / 2. * 1e6, BOARD_H / 2. * 1e6),
        None,
    )
    .unwrap();

    let hier = run_thermal_simulation(&db, board, &static_setup(5000.)).unwrap();
    assert_relative_eq!(hier.max, flat.max, max_relative = 1e-9);
    assert_relative_eq!(hier.min, flat.min, max_relative = 1e-9);
    assert_relative_eq!(
        hier.monitors[0].unwrap(),
        flat.monitors[0].unwrap(),
        max_relative = 1e-9
    );
    assert!(db.layout(board).unwrap().components().next().is_none());
}

#[test]
fn extracted_models_are_cached() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::new("module");
    let cell = tiny(&mut db, "tiny");
    let settings = extraction(5000.).with_work_dir(dir.path());

    let a = {
        let mut first = PrismThermalSimulation::new(&db, cell, settings.clone()).unwrap();
        let a = first
            .solve_static(&ThermalStaticSettings::default(), &[die_monitor()])
            .unwrap();
        assert_eq!(first.cache_status(), Some(CacheStatus::Miss));
        a
    };
    assert!(dir.path().join("sketch.svg").is_file());

    // power is not part of the model
    let die = db.layout(cell).unwrap().find_component_by_name(DIE).unwrap();
    db.layout_mut(cell)
        .unwrap()
        .component_mut(die)
        .unwrap()
        .set_loss_power(LossPowerTable::constant(DIE_POWER / 2.));
    let mut second = PrismThermalSimulation::new(&db, cell, settings.clone()).unwrap();
    let b = second
        .solve_static(&ThermalStaticSettings::default(), &[die_monitor()])
        .unwrap();
    assert_eq!(second.cache_status(), Some(CacheStatus::Hit));
    assert_relative_eq!(b.max - 25., (a.max - 25.) / 2., max_relative = 1e-9);

    let mut rebuilt = settings;
    rebuilt.force_rebuild = true;
    let mut third = PrismThermalSimulation::new(&db, cell, rebuilt).unwrap();
    third.extract().unwrap();
    assert_eq!(third.cache_status(), Some(CacheStatus::Miss));
}

#[test]
fn missing_materials_abort_the_run() {
    let mut db = Database::new("module");
    let cell = tiny(&mut db, "tiny");
    let mut die = ComponentDef::new(
        "Mystery",
        ComponentType::Ic,
        Rect::from_sides(0, 0, 1_000_000, 1_000_000),
    );
    die.set_height(0.1).set_material("Unobtainium");
    let def = db.create_component_def(die).unwrap();
    let top = db.layout(cell).unwrap().find_layer_by_name(TOP_CU).unwrap();
    db.create_component(cell, "U2", def, top, Transformation::translate(2e6, 2e6), false)
        .unwrap();

    let err = run_thermal_simulation(&db, cell, &static_setup(5000.)).unwrap_err();
    assert!(matches!(err, Error::MissingMaterial(ref m) if m == "Unobtainium"));
}
