//! Extraction and simulation settings.
//!
//! Every settings struct has a [`Default`] matching common package simulation practice
//! and a `validate` method that is called before any work starts. Temperatures are in
//! Celsius and planar coordinates in the user units of the database.

use std::path::PathBuf;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An axis-aligned box in user units.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct FRect {
    /// The left edge.
    pub left: f64,
    /// The bottom edge.
    pub bot: f64,
    /// The right edge.
    pub right: f64,
    /// The top edge.
    pub top: f64,
}

impl FRect {
    /// Creates a box from its edges, swapping reversed edges.
    pub fn from_sides(left: f64, bot: f64, right: f64, top: f64) -> Self {
        Self {
            left: left.min(right),
            bot: bot.min(top),
            right: left.max(right),
            top: bot.max(top),
        }
    }

    /// The horizontal extent.
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// The vertical extent.
    pub fn height(&self) -> f64 {
        self.top - self.bot
    }

    /// Returns `true` if `p` lies in the box or on its edges.
    pub fn contains(&self, p: [f64; 2]) -> bool {
        self.left <= p[0] && p[0] <= self.right && self.bot <= p[1] && p[1] <= self.top
    }
}

/// How a boundary condition constrains a face.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum BoundaryConditionType {
    /// Convection to the environment with a heat-transfer coefficient in W/(m²·K).
    #[default]
    Htc,
    /// A fixed face temperature in Celsius.
    Temperature,
    /// A fixed heat flux into the face in W/m².
    HeatFlux,
}

/// A boundary condition applied to exterior faces.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCondition {
    /// The constraint type.
    pub kind: BoundaryConditionType,
    /// The constraint value, in the unit of its type.
    pub value: f64,
}

impl BoundaryCondition {
    /// A convective boundary.
    pub fn htc(value: f64) -> Self {
        Self {
            kind: BoundaryConditionType::Htc,
            value,
        }
    }

    /// A fixed-temperature boundary.
    pub fn temperature(celsius: f64) -> Self {
        Self {
            kind: BoundaryConditionType::Temperature,
            value: celsius,
        }
    }

    /// A fixed heat-flux boundary.
    pub fn heat_flux(value: f64) -> Self {
        Self {
            kind: BoundaryConditionType::HeatFlux,
            value,
        }
    }

    fn validate(&self, what: &str) -> Result<()> {
        if !self.value.is_finite() {
            return Err(Error::InvalidSettings(format!("{what} value is not finite")));
        }
        if self.kind == BoundaryConditionType::Htc && self.value < 0. {
            return Err(Error::InvalidSettings(format!(
                "{what} heat-transfer coefficient is negative"
            )));
        }
        Ok(())
    }
}

/// The side of the stack a boundary condition applies to.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    /// Upward-facing exterior faces.
    #[default]
    Top,
    /// Downward-facing exterior faces.
    Bot,
}

/// A boundary condition restricted to a rectangular region.
///
/// Faces whose center lies in the box use this condition instead of the uniform one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockBoundaryCondition {
    /// A label used in diagnostics.
    pub name: ArcStr,
    /// The faces the condition applies to.
    pub orientation: Orientation,
    /// The region, in user units.
    pub region: FRect,
    /// The condition.
    pub bc: BoundaryCondition,
}

/// Controls for 2-D mesh generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshSettings {
    /// The minimum triangle angle in degrees enforced by refinement passes, at most
    /// [`MeshSettings::MAX_MIN_ALPHA`].
    pub min_alpha: f64,
    /// The minimum edge length in user units; closer imprint lines merge.
    pub min_len: f64,
    /// The maximum edge length in user units; longer intervals are split.
    pub max_len: f64,
    /// Imprint lines closer than this merge, in user units.
    pub tolerance: f64,
    /// The maximum number of angle refinement passes. Zero refines until the angle bound
    /// holds, up to an internal limit.
    pub iteration: usize,
    /// Generates one mesh per stackup layer instead of one shared mesh.
    pub gen_mesh_by_layer: bool,
    /// With per-layer meshes, imprints each layer's geometry on the layer below it.
    pub imprint_upper_layer: bool,
    /// Writes `mesh.vtk` to the work directory after extraction.
    pub dump_mesh_file: bool,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            min_alpha: 20.,
            min_len: 0.,
            max_len: f64::MAX,
            tolerance: 0.,
            iteration: 0,
            gen_mesh_by_layer: false,
            imprint_upper_layer: false,
            dump_mesh_file: false,
        }
    }
}

impl MeshSettings {
    /// The largest minimum angle grid bisection can always reach, in degrees.
    ///
    /// Grid cells split into right triangles, and halving the longer side of a cell keeps
    /// its side ratio at or above `1 / sqrt(2)`.
    pub const MAX_MIN_ALPHA: f64 = 35.;

    /// Checks the settings for consistency.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_alpha > 0. && self.min_alpha <= Self::MAX_MIN_ALPHA) {
            return Err(Error::InvalidSettings(format!(
                "minimum angle {} is not in (0, {}] degrees",
                self.min_alpha,
                Self::MAX_MIN_ALPHA
            )));
        }
        if self.min_len < 0. || self.tolerance < 0. {
            return Err(Error::InvalidSettings(
                "mesh lengths and tolerance must not be negative".into(),
            ));
        }
        if self.max_len <= 0. || self.min_len > self.max_len {
            return Err(Error::InvalidSettings(format!(
                "maximum edge length {} is not above minimum edge length {}",
                self.max_len, self.min_len
            )));
        }
        Ok(())
    }

    /// The distance below which imprint lines merge.
    pub fn merge_distance(&self) -> f64 {
        self.tolerance.max(self.min_len)
    }
}

/// Controls for the vertical subdivision of the stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerCutSettings {
    /// Slabs thicker than this multiple of the thinnest slab are subdivided. Zero disables
    /// subdivision.
    pub layer_transition_ratio: f64,
    /// The number of decimal digits elevations are rounded to before slicing.
    pub layer_cut_precision: usize,
    /// Writes `sketch.svg` to the work directory after extraction.
    pub dump_sketch_img: bool,
    /// Extra regions imprinted into every mesh, in user units.
    pub imprint_box: Vec<FRect>,
}

impl Default for LayerCutSettings {
    fn default() -> Self {
        Self {
            layer_transition_ratio: 2.,
            layer_cut_precision: 6,
            dump_sketch_img: true,
            imprint_box: Vec::new(),
        }
    }
}

impl LayerCutSettings {
    /// Checks the settings for consistency.
    pub fn validate(&self) -> Result<()> {
        if !(self.layer_transition_ratio >= 0.) {
            return Err(Error::InvalidSettings(
                "layer transition ratio must not be negative".into(),
            ));
        }
        if self.layer_cut_precision > 12 {
            return Err(Error::InvalidSettings(
                "layer cut precision must be at most 12 digits".into(),
            ));
        }
        Ok(())
    }
}

/// Settings for extracting a prism thermal model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrismExtractionSettings {
    /// The directory holding the extraction cache and diagnostic artifacts.
    ///
    /// Without a work directory nothing is cached or written.
    pub work_dir: Option<PathBuf>,
    /// The number of worker threads.
    pub threads: usize,
    /// Ignores any cached model and extracts again.
    pub force_rebuild: bool,
    /// Mesh generation controls.
    pub mesh: MeshSettings,
    /// Vertical subdivision controls.
    pub layer_cut: LayerCutSettings,
    /// The condition on upward-facing exterior faces, if any.
    pub top_uniform_bc: Option<BoundaryCondition>,
    /// The condition on downward-facing exterior faces, if any.
    pub bot_uniform_bc: Option<BoundaryCondition>,
    /// Regional conditions overriding the uniform ones.
    pub block_bcs: Vec<BlockBoundaryCondition>,
}

impl Default for PrismExtractionSettings {
    fn default() -> Self {
        Self {
            work_dir: None,
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            force_rebuild: false,
            mesh: MeshSettings::default(),
            layer_cut: LayerCutSettings::default(),
            top_uniform_bc: None,
            bot_uniform_bc: None,
            block_bcs: Vec::new(),
        }
    }
}

impl PrismExtractionSettings {
    /// Default settings with the worker thread count of a [`Context`](ecad::context::Context).
    pub fn from_context(ctx: &ecad::context::Context) -> Self {
        Self {
            threads: ctx.threads(),
            ..Default::default()
        }
    }

    /// Sets the work directory.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Sets the number of worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the uniform top boundary condition.
    pub fn with_top_bc(mut self, bc: BoundaryCondition) -> Self {
        self.top_uniform_bc = Some(bc);
        self
    }

    /// Sets the uniform bottom boundary condition.
    pub fn with_bot_bc(mut self, bc: BoundaryCondition) -> Self {
        self.bot_uniform_bc = Some(bc);
        self
    }

    /// Adds a block boundary condition and imprints its region into the mesh.
    pub fn add_block_bc(
        &mut self,
        name: impl Into<ArcStr>,
        orientation: Orientation,
        region: FRect,
        bc: BoundaryCondition,
    ) -> &mut Self {
        self.layer_cut.imprint_box.push(region);
        self.block_bcs.push(BlockBoundaryCondition {
            name: name.into(),
            orientation,
            region,
            bc,
        });
        self
    }

    /// Checks the settings for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(Error::InvalidSettings("thread count must be positive".into()));
        }
        self.mesh.validate()?;
        self.layer_cut.validate()?;
        if let Some(bc) = &self.top_uniform_bc {
            bc.validate("top boundary")?;
        }
        if let Some(bc) = &self.bot_uniform_bc {
            bc.validate("bottom boundary")?;
        }
        for block in &self.block_bcs {
            block.bc.validate(&format!("block boundary `{}`", block.name))?;
            if !(block.region.width() > 0. && block.region.height() > 0.) {
                return Err(Error::InvalidSettings(format!(
                    "block boundary `{}` has an empty region",
                    block.name
                )));
            }
        }
        Ok(())
    }
}

/// Settings for a steady-state solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalStaticSettings {
    /// The environment temperature in Celsius.
    pub env_temperature: f64,
    /// The maximum number of fixed-point iterations on temperature-dependent properties.
    pub iteration: usize,
    /// The temperature update in Kelvin below which iteration stops.
    pub residual: f64,
    /// Measures the update by its largest entry instead of its mean.
    pub maximum_res: bool,
    /// Writes `hotmap.vtk` to the work directory.
    pub dump_hotmaps: bool,
    /// Writes `matrices.txt` to the work directory.
    pub dump_matrices: bool,
}

impl Default for ThermalStaticSettings {
    fn default() -> Self {
        Self {
            env_temperature: 25.,
            iteration: 10,
            residual: 0.1,
            maximum_res: true,
            dump_hotmaps: false,
            dump_matrices: false,
        }
    }
}

impl ThermalStaticSettings {
    /// Checks the settings for consistency.
    pub fn validate(&self) -> Result<()> {
        validate_env(self.env_temperature)?;
        if self.iteration == 0 {
            return Err(Error::InvalidSettings("iteration cap must be positive".into()));
        }
        if !(self.residual > 0.) {
            return Err(Error::InvalidSettings("residual must be positive".into()));
        }
        Ok(())
    }
}

/// Model-order reduction settings.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorSettings {
    /// The reduced order. Zero integrates the full system.
    pub order: usize,
}

/// Settings for a transient solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalTransientSettings {
    /// The environment and initial temperature in Celsius.
    pub env_temperature: f64,
    /// Logs every accepted step at info level.
    pub verbose: bool,
    /// Controls the step size from a local error estimate.
    pub adaptive: bool,
    /// Re-evaluates temperature-dependent properties as the solution evolves.
    pub temperature_depend: bool,
    /// The base step in seconds. Adaptive steps are this step scaled by powers of two.
    pub step: f64,
    /// The simulated duration in seconds.
    pub duration: f64,
    /// The absolute local error tolerance in Kelvin.
    pub abs_error: f64,
    /// The relative local error tolerance.
    pub rel_error: f64,
    /// The minimum time between recorded samples in seconds.
    pub min_sampling_interval: f64,
    /// Only samples within this window before the end are kept. Zero keeps all samples.
    pub sampling_window: f64,
    /// Model-order reduction.
    pub mor: MorSettings,
    /// Writes `trans.txt` to the work directory.
    pub dump_results: bool,
}

impl Default for ThermalTransientSettings {
    fn default() -> Self {
        Self {
            env_temperature: 25.,
            verbose: false,
            adaptive: true,
            temperature_depend: true,
            step: 1.,
            duration: 10.,
            abs_error: 1e-6,
            rel_error: 1e-6,
            min_sampling_interval: 0.,
            sampling_window: 0.,
            mor: MorSettings::default(),
            dump_results: true,
        }
    }
}

impl ThermalTransientSettings {
    /// Checks the settings for consistency.
    pub fn validate(&self) -> Result<()> {
        validate_env(self.env_temperature)?;
        if !(self.step > 0.) || !(self.duration > 0.) {
            return Err(Error::InvalidSettings(
                "transient step and duration must be positive".into(),
            ));
        }
        if !(self.abs_error > 0.) || !(self.rel_error > 0.) {
            return Err(Error::InvalidSettings("error tolerances must be positive".into()));
        }
        if !(self.min_sampling_interval >= 0.) || !(self.sampling_window >= 0.) {
            return Err(Error::InvalidSettings(
                "sampling interval and window must not be negative".into(),
            ));
        }
        Ok(())
    }
}

fn validate_env(celsius: f64) -> Result<()> {
    if !celsius.is_finite() || celsius <= -ecad::material::KELVIN_OFFSET {
        return Err(Error::InvalidSettings(format!(
            "environment temperature {celsius} is below absolute zero"
        )));
    }
    Ok(())
}

/// A monitor point in user units.
pub type Monitor = [f64; 3];

/// Everything needed for a steady-state simulation.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalStaticSimulationSetup {
    /// The extraction settings.
    pub extraction: PrismExtractionSettings,
    /// The solver settings.
    pub settings: ThermalStaticSettings,
    /// The probe points reported in the result.
    pub monitors: Vec<Monitor>,
}

/// Everything needed for a transient simulation.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalTransientSimulationSetup {
    /// The extraction settings.
    pub extraction: PrismExtractionSettings,
    /// The solver settings.
    pub settings: ThermalTransientSettings,
    /// The probe points reported in the result.
    pub monitors: Vec<Monitor>,
}
