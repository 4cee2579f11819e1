//! Thermal extraction and simulation of package layouts.
//!
//! A flattened [`Layout`](ecad::layout::Layout) is cut into horizontal slabs and meshed into
//! triangular prisms ([`extract`]). The prisms, bondwire line elements and boundary conditions
//! form a conductance and capacity network ([`network`]) that is solved at steady state or
//! over time ([`solver`]). [`simulation`] ties the steps together and reports temperatures in
//! Celsius at caller-supplied monitor points.
//!
//! # Examples
//!
//! ```
//! # use ecad::prelude::*;
//! # use thermal::prelude::*;
//! let mut db = Database::new("pkg");
//! let mut cu = MaterialDef::new("Cu");
//! cu.set_property(MaterialPropId::ThermalConductivity, MaterialProp::Simple(400.))
//!     .set_property(MaterialPropId::SpecificHeat, MaterialProp::Simple(385.))
//!     .set_property(MaterialPropId::MassDensity, MaterialProp::Simple(8960.));
//! db.create_material_def(cu).unwrap();
//!
//! let cell = db.create_circuit_cell("board").unwrap();
//! let layout = db.layout_mut(cell).unwrap();
//! let layer = layout
//!     .append_layer(Layer::new("Cu", LayerType::Conducting, 0., 1., "Cu", "Cu"))
//!     .unwrap();
//! layout.create_geometry_2d(layer, None, Rect::from_sides(0, 0, 4_000_000, 4_000_000));
//!
//! let setup = ThermalStaticSimulationSetup {
//!     extraction: PrismExtractionSettings::default()
//!         .with_threads(1)
//!         .with_bot_bc(BoundaryCondition::temperature(40.)),
//!     monitors: vec![[2., 2., -0.5]],
//!     ..Default::default()
//! };
//! let result = run_thermal_simulation(&db, cell, &setup).unwrap();
//! assert!((result.max - 40.).abs() < 1e-6);
//! ```
#![warn(missing_docs)]

pub mod error;
pub mod extract;
pub mod io;
pub mod mesh;
pub mod model;
pub mod network;
pub mod settings;
pub mod simulation;
pub mod solver;

pub use error::{Error, Result};

/// Commonly used items.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::model::PrismThermalModel;
    pub use crate::settings::{
        BoundaryCondition, BoundaryConditionType, FRect, LayerCutSettings, MeshSettings, Monitor,
        MorSettings, Orientation, PrismExtractionSettings, ThermalStaticSettings,
        ThermalStaticSimulationSetup, ThermalTransientSettings, ThermalTransientSimulationSetup,
    };
    pub use crate::simulation::{
        run_thermal_simulation, run_thermal_simulation_with_excitation, PrismThermalSimulation,
        SimulationState, ThermalSetup, ThermalStaticResult, ThermalTransientResult,
    };
    pub use crate::solver::Excitation;
}
