//! High-level thermal simulation of a layout cell.
//!
//! A [`PrismThermalSimulation`] owns a flattened snapshot of the cell, so extraction and solves
//! never touch the source hierarchy. It moves from [`SimulationState::Unbuilt`] to
//! [`SimulationState::Extracted`] on [`PrismThermalSimulation::extract`] and records the last
//! solve afterwards. Solves may be repeated with other settings on the same model.

use std::path::PathBuf;

use cache::CacheStatus;
use ecad::cell::CellId;
use ecad::database::Database;
use ecad::layout::Layout;
use ecad::material::kelvin_to_celsius;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::extract::extract_cached;
use crate::io;
use crate::model::PrismThermalModel;
use crate::network::NetworkBuilder;
use crate::settings::{
    Monitor, PrismExtractionSettings, ThermalStaticSettings, ThermalStaticSimulationSetup,
    ThermalTransientSettings, ThermalTransientSimulationSetup,
};
use crate::solver::{solve_static, solve_transient, Excitation};

/// The lifecycle state of a [`PrismThermalSimulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    /// No model has been extracted yet.
    Unbuilt,
    /// A model is available and nothing has been solved.
    Extracted,
    /// The last solve was a static one.
    SolvedStatic,
    /// The last solve was a transient one.
    SolvedTransient,
}

/// The result of a static simulation, in Celsius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalStaticResult {
    /// The lowest temperature in the domain.
    pub min: f64,
    /// The highest temperature in the domain.
    pub max: f64,
    /// The temperature at each monitor, or `None` if the monitor lies outside the model.
    pub monitors: Vec<Option<f64>>,
}

impl From<ThermalStaticResult> for (f64, f64, Vec<Option<f64>>) {
    fn from(value: ThermalStaticResult) -> Self {
        (value.min, value.max, value.monitors)
    }
}

/// The result of a transient simulation, in Celsius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalTransientResult {
    /// The lowest temperature over the retained samples.
    pub min: f64,
    /// The highest temperature over the retained samples.
    pub max: f64,
    /// The sample times in seconds.
    pub times: Vec<f64>,
    /// The series of each monitor, or `None` if the monitor lies outside the model.
    pub monitors: Vec<Option<Vec<f64>>>,
}

impl From<ThermalTransientResult> for (f64, f64, Vec<Option<Vec<f64>>>) {
    fn from(value: ThermalTransientResult) -> Self {
        (value.min, value.max, value.monitors)
    }
}

/// Maps each monitor to the model node containing it.
pub fn resolve_monitors(model: &PrismThermalModel, monitors: &[Monitor]) -> Vec<Option<usize>> {
    monitors
        .iter()
        .enumerate()
        .map(|(i, &point)| {
            let node = model.locate(point);
            if node.is_none() {
                tracing::warn!(monitor = i, ?point, "monitor lies outside the model");
            }
            node
        })
        .collect()
}

/// A thermal simulation of one flattened cell.
pub struct PrismThermalSimulation<'a> {
    db: &'a Database,
    layout: Layout,
    extraction: PrismExtractionSettings,
    pool: rayon::ThreadPool,
    model: Option<PrismThermalModel>,
    cache_status: Option<CacheStatus>,
    state: SimulationState,
}

impl<'a> PrismThermalSimulation<'a> {
    /// Prepares a simulation of `cell`, flattening its hierarchy.
    pub fn new(db: &'a Database, cell: CellId, extraction: PrismExtractionSettings) -> Result<Self> {
        let layout = db.flattened(cell).ok_or(Error::Flatten)?;
        Self::from_layout(db, layout, extraction)
    }

    /// Prepares a simulation of an already flat layout.
    pub fn from_layout(
        db: &'a Database,
        layout: Layout,
        extraction: PrismExtractionSettings,
    ) -> Result<Self> {
        extraction.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(extraction.threads)
            .build()?;
        Ok(Self {
            db,
            layout,
            extraction,
            pool,
            model: None,
            cache_status: None,
            state: SimulationState::Unbuilt,
        })
    }

    /// The current state.
    pub fn state(&self) -> SimulationState {
        self.state
    }

    /// The flattened layout being simulated.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The extracted model, if any.
    pub fn model(&self) -> Option<&PrismThermalModel> {
        self.model.as_ref()
    }

    /// Whether the model came from the cache, if it has been extracted.
    pub fn cache_status(&self) -> Option<CacheStatus> {
        self.cache_status
    }

    fn artifact(&self, name: &str) -> Option<PathBuf> {
        self.extraction.work_dir.as_ref().map(|dir| dir.join(name))
    }

    /// Extracts the model. Later calls return the model already extracted.
    pub fn extract(&mut self) -> Result<&PrismThermalModel> {
        if self.model.is_none() {
            let _span = tracing::info_span!("extract").entered();
            let (model, status) = self
                .pool
                .install(|| extract_cached(self.db, &self.layout, &self.extraction))?;
            tracing::info!(
                prisms = model.prisms.len(),
                lines = model.lines.len(),
                ?status,
                "extracted thermal model"
            );
            if self.extraction.mesh.dump_mesh_file {
                if let Some(path) = self.artifact(io::MESH_FILE) {
                    io::write_mesh_vtk(path, &model)?;
                }
            }
            if self.extraction.layer_cut.dump_sketch_img {
                if let Some(path) = self.artifact(io::SKETCH_FILE) {
                    io::write_sketch_svg(path, self.db, &self.layout, &self.extraction, &model)?;
                }
            }
            self.cache_status = Some(status);
            self.state = SimulationState::Extracted;
            self.model = Some(model);
        }
        self.model.as_ref().ok_or(Error::EmptyLayout)
    }

    /// Solves the steady state, extracting first if needed.
    pub fn solve_static(
        &mut self,
        settings: &ThermalStaticSettings,
        monitors: &[Monitor],
    ) -> Result<ThermalStaticResult> {
        settings.validate()?;
        self.extract()?;
        let model = self.model.as_ref().ok_or(Error::EmptyLayout)?;
        let probes = resolve_monitors(model, monitors);

        let solution = self.pool.install(|| {
            let builder = NetworkBuilder::new(
                model,
                self.db,
                &self.layout,
                &self.extraction,
                settings.env_temperature,
            )?;
            solve_static(&builder, settings, model.num_nodes())
        })?;

        if settings.dump_hotmaps {
            if let Some(path) = self.artifact(io::HOTMAP_FILE) {
                io::write_hotmap_vtk(path, model, &solution.kelvin)?;
            }
        }
        if settings.dump_matrices {
            if let Some(path) = self.artifact(io::MATRICES_FILE) {
                io::write_matrices(path, &solution.network)?;
            }
        }

        let (min, max) = solution
            .kelvin
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| {
                (lo.min(t), hi.max(t))
            });
        self.state = SimulationState::SolvedStatic;
        Ok(ThermalStaticResult {
            min: kelvin_to_celsius(min),
            max: kelvin_to_celsius(max),
            monitors: probes
                .iter()
                .map(|p| p.map(|n| kelvin_to_celsius(solution.kelvin[n])))
                .collect(),
        })
    }

    /// Integrates the transient response from ambient temperature, extracting first if needed.
    pub fn solve_transient(
        &mut self,
        settings: &ThermalTransientSettings,
        monitors: &[Monitor],
        excitation: &Excitation,
    ) -> Result<ThermalTransientResult> {
        settings.validate()?;
        self.extract()?;
        let model = self.model.as_ref().ok_or(Error::EmptyLayout)?;
        let probes = resolve_monitors(model, monitors);

        let solution = self.pool.install(|| {
            let builder = NetworkBuilder::new(
                model,
                self.db,
                &self.layout,
                &self.extraction,
                settings.env_temperature,
            )?;
            solve_transient(&builder, settings, model.num_nodes(), &probes, excitation)
        })?;

        let monitors: Vec<Option<Vec<f64>>> = solution
            .probes
            .iter()
            .map(|p| {
                p.as_ref()
                    .map(|series| series.iter().map(|t| kelvin_to_celsius(*t)).collect())
            })
            .collect();
        if settings.dump_results {
            if let Some(path) = self.artifact(io::TRANSIENT_FILE) {
                io::write_transient_csv(path, &solution.times, &solution.probes)?;
            }
        }
        self.state = SimulationState::SolvedTransient;
        Ok(ThermalTransientResult {
            min: kelvin_to_celsius(solution.min),
            max: kelvin_to_celsius(solution.max),
            times: solution.times,
            monitors,
        })
    }
}

/// A complete description of one kind of thermal simulation.
pub trait ThermalSetup {
    /// The result of the simulation.
    type Output;

    /// The extraction settings.
    fn extraction(&self) -> &PrismExtractionSettings;

    /// Runs the simulation on a prepared [`PrismThermalSimulation`].
    fn run(
        &self,
        sim: &mut PrismThermalSimulation<'_>,
        excitation: &Excitation,
    ) -> Result<Self::Output>;
}

impl ThermalSetup for ThermalStaticSimulationSetup {
    type Output = ThermalStaticResult;

    fn extraction(&self) -> &PrismExtractionSettings {
        &self.extraction
    }

    fn run(
        &self,
        sim: &mut PrismThermalSimulation<'_>,
        _excitation: &Excitation,
    ) -> Result<Self::Output> {
        sim.solve_static(&self.settings, &self.monitors)
    }
}

impl ThermalSetup for ThermalTransientSimulationSetup {
    type Output = ThermalTransientResult;

    fn extraction(&self) -> &PrismExtractionSettings {
        &self.extraction
    }

    fn run(
        &self,
        sim: &mut PrismThermalSimulation<'_>,
        excitation: &Excitation,
    ) -> Result<Self::Output> {
        sim.solve_transient(&self.settings, &self.monitors, excitation)
    }
}

/// Simulates `cell` at nominal power.
pub fn run_thermal_simulation<S: ThermalSetup>(
    db: &Database,
    cell: CellId,
    setup: &S,
) -> Result<S::Output> {
    run_thermal_simulation_with_excitation(db, cell, setup, &|_, _| 1.)
}

/// Simulates `cell` with the power of each scenario scaled by `excitation` over time.
///
/// Static simulations run at nominal power and ignore the excitation.
pub fn run_thermal_simulation_with_excitation<S: ThermalSetup>(
    db: &Database,
    cell: CellId,
    setup: &S,
    excitation: &Excitation,
) -> Result<S::Output> {
    let mut sim = PrismThermalSimulation::new(db, cell, setup.extraction().clone())?;
    setup.run(&mut sim, excitation)
}
