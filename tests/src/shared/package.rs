//! A small power module used across scenarios.
//!
//! The board is 40 x 30 mm with 0.3 mm top copper over 3 mm bottom copper. A 5 x 4 mm SiC die,
//! 0.18 mm thick, sits at the center of the top copper and dissipates 108 W.

use ecad::prelude::*;
use thermal::prelude::*;

pub const BOARD_W: f64 = 40.;
pub const BOARD_H: f64 = 30.;
pub const DIE_THICKNESS: f64 = 0.18;
pub const DIE_POWER: f64 = 108.;
pub const TOP_CU: &str = "TopCu";
pub const BOT_CU: &str = "BotCu";
pub const DIE: &str = "U1";
pub const GATE_WIRE: &str = "G1";

fn mm(v: f64) -> i64 {
    (v * 1e6).round() as i64
}

pub fn define_materials(db: &mut Database) {
    let mut cu = MaterialDef::new("Cu");
    cu.set_property(MaterialPropId::ThermalConductivity, MaterialProp::Simple(400.))
        .set_property(MaterialPropId::SpecificHeat, MaterialProp::Simple(385.))
        .set_property(MaterialPropId::MassDensity, MaterialProp::Simple(8960.))
        .set_property(MaterialPropId::Resistivity, MaterialProp::Simple(1.7e-8));
    let mut sic = MaterialDef::new("SiC");
    sic.set_property(MaterialPropId::ThermalConductivity, MaterialProp::Simple(370.))
        .set_property(MaterialPropId::SpecificHeat, MaterialProp::Simple(750.))
        .set_property(MaterialPropId::MassDensity, MaterialProp::Simple(3210.));
    let mut air = MaterialDef::new("Air");
    air.set_property(MaterialPropId::ThermalConductivity, MaterialProp::Simple(0.026))
        .set_property(MaterialPropId::SpecificHeat, MaterialProp::Simple(1003.))
        .set_property(MaterialPropId::MassDensity, MaterialProp::Simple(1.225));
    for mat in [cu, sic, air] {
        db.create_material_def(mat).unwrap();
    }
}

/// The die footprint, centered on its origin, with a gate pin 1 mm above the center.
pub fn define_die(db: &mut Database) -> ComponentDefId {
    let mut die = ComponentDef::new(
        "SiCDie",
        ComponentType::Ic,
        Rect::from_sides(mm(-2.5), mm(-2.), mm(2.5), mm(2.)),
    );
    die.set_height(DIE_THICKNESS).set_material("SiC");
    die.add_pin("G", Point::new(0, mm(1.)), PinIoType::Input);
    db.create_component_def(die).unwrap()
}

/// Appends the two copper layers and covers them with copper.
pub fn build_stackup(layout: &mut Layout) -> (LayerId, LayerId) {
    let top = layout
        .append_layer(Layer::new(TOP_CU, LayerType::Conducting, 0., 0.3, "Cu", "Air"))
        .unwrap();
    let bot = layout
        .append_layer(Layer::new(BOT_CU, LayerType::Conducting, -0.3, 3., "Cu", "Air"))
        .unwrap();
    let outline = Rect::from_sides(0, 0, mm(BOARD_W), mm(BOARD_H));
    layout.set_boundary(outline);
    layout.create_geometry_2d(top, None, outline).unwrap();
    layout.create_geometry_2d(bot, None, outline).unwrap();
    (top, bot)
}

/// Creates the module as a single flat cell named `name`.
pub fn tiny(db: &mut Database, name: &str) -> CellId {
    define_materials(db);
    let def = define_die(db);
    let cell = db.create_circuit_cell(name).unwrap();
    let (top, _) = build_stackup(db.layout_mut(cell).unwrap());
    let comp = db
        .create_component(
            cell,
            DIE,
            def,
            top,
            Transformation::translate(mm(BOARD_W / 2.) as f64, mm(BOARD_H / 2.) as f64),
            false,
        )
        .unwrap();
    db.layout_mut(cell)
        .unwrap()
        .component_mut(comp)
        .unwrap()
        .set_loss_power(LossPowerTable::constant(DIE_POWER));
    cell
}

/// Bonds the die gate of `cell` to the top copper 8 mm to its right, carrying `current`.
pub fn bond_gate(db: &mut Database, cell: CellId, current: f64) {
    let layout = db.layout_mut(cell).unwrap();
    let top = layout.find_layer_by_name(TOP_CU).unwrap();
    let comp = layout.find_component_by_name(DIE).unwrap();
    let start = BondwireEnd::Pin {
        component: comp,
        pin: "G".into(),
    };
    let end = BondwireEnd::Layer {
        layer: top,
        point: Point::new(mm(BOARD_W / 2. + 8.), mm(BOARD_H / 2.)),
        flipped: false,
    };
    let wire = layout
        .create_bondwire(GATE_WIRE, None, start, end, 0.15)
        .unwrap();
    layout
        .bondwire_mut(wire)
        .unwrap()
        .set_height(1.)
        .set_material("Cu")
        .set_current(current);
}

/// A point inside the die, a tenth of its thickness below the top face.
pub fn die_monitor() -> Monitor {
    [BOARD_W / 2., BOARD_H / 2., DIE_THICKNESS * 0.9]
}

pub fn extraction(htc: f64) -> PrismExtractionSettings {
    PrismExtractionSettings::default()
        .with_threads(2)
        .with_bot_bc(BoundaryCondition::htc(htc))
}

pub fn static_setup(htc: f64) -> ThermalStaticSimulationSetup {
    ThermalStaticSimulationSetup {
        extraction: extraction(htc),
        settings: ThermalStaticSettings::default(),
        monitors: vec![die_monitor()],
    }
}
