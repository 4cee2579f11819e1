//! Thermal extraction and solver errors.

use arcstr::ArcStr;

/// The result type of thermal extraction and simulation.
pub type Result<T> = std::result::Result<T, Error>;

/// An error raised while extracting or solving a thermal model.
///
/// Extraction errors abort a run before any solve starts. Solve errors abort the run
/// they occur in; neither leaves the source layout modified.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The layout has no boundary and no geometry to derive one from.
    #[error("layout has no geometry to extract")]
    EmptyLayout,
    /// The layout has no stackup layers.
    #[error("layout has no stackup layers")]
    MissingStackup,
    /// The requested cell does not exist or its hierarchy cannot be flattened.
    #[error("cell cannot be flattened for extraction")]
    Flatten,
    /// A referenced material is not defined in the database.
    #[error("material `{0}` is not defined")]
    MissingMaterial(ArcStr),
    /// A material lacks a property the model needs.
    #[error("material `{material}` has no {property} property")]
    MissingProperty {
        /// The material name.
        material: ArcStr,
        /// The missing property.
        property: &'static str,
    },
    /// Mesh generation failed.
    #[error("mesh generation failed: {0}")]
    Mesh(String),
    /// The conductance matrix is singular, usually because no boundary condition grounds it.
    #[error("singular thermal system: {0}")]
    SingularSystem(String),
    /// The static fixed-point iteration did not converge.
    #[error("static solve did not converge after {iterations} iterations (residual {residual:.3e} K)")]
    NonConvergent {
        /// The iterations performed.
        iterations: usize,
        /// The last temperature update.
        residual: f64,
    },
    /// The transient integrator could not take an acceptable step.
    #[error("transient step became unstable at t = {time:.6e} s")]
    UnstableStep {
        /// The simulation time of the failed step.
        time: f64,
    },
    /// Settings failed validation.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    /// The worker pool could not be created.
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    /// An I/O error while writing artifacts.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The extraction cache failed.
    #[error(transparent)]
    Cache(#[from] cache::Error),
}

impl Error {
    /// Returns `true` for errors raised before solving starts.
    pub fn is_extraction_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyLayout
                | Error::MissingStackup
                | Error::Flatten
                | Error::MissingMaterial(_)
                | Error::MissingProperty { .. }
                | Error::Mesh(_)
        )
    }

    /// Returns `true` for numerical failures of a solve.
    pub fn is_solve_error(&self) -> bool {
        matches!(
            self,
            Error::SingularSystem(_) | Error::NonConvergent { .. } | Error::UnstableStep { .. }
        )
    }
}
