//! Static and transient solvers for thermal networks.
//!
//! Temperatures are solved in kelvin. Temperature-dependent networks are rebuilt from their
//! [`NetworkBuilder`] as the field changes.

use crate::error::{Error, Result};
use crate::network::{NetworkBuilder, ThermalNetwork};
use crate::settings::ThermalStaticSettings;

pub mod mor;
pub mod sparse;
pub mod transient;

pub use transient::{solve_transient, TransientSolution};

/// Scales the nominal power of scenario `.1` at time `.0` in seconds.
pub type Excitation = dyn Fn(f64, usize) -> f64 + Send + Sync;

/// The solution of a static solve.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticSolution {
    /// The temperature of every node in K.
    pub kelvin: Vec<f64>,
    /// The number of linear solves performed.
    pub iterations: usize,
    /// The temperature change of the last iteration in K.
    pub residual: f64,
    /// The network of the last iteration.
    pub network: ThermalNetwork,
}

/// The right-hand side of a static solve with all scenarios at nominal power.
pub(crate) fn static_rhs(net: &ThermalNetwork) -> Vec<f64> {
    let mut rhs = net.fixed_power();
    for (r, p) in rhs.iter_mut().zip(net.source_power(|_| 1.)) {
        *r += p;
    }
    rhs
}

/// Fails unless every connected part of `net` reaches an HTC or temperature boundary.
///
/// A floating part leaves the conductance matrix singular, which a floating-point
/// factorization does not reliably report.
pub(crate) fn check_grounded(net: &ThermalNetwork) -> Result<()> {
    if net.links.is_empty() {
        return Err(Error::SingularSystem(
            "no HTC or temperature boundary condition grounds the network".into(),
        ));
    }
    fn root(parent: &mut [usize], mut n: usize) -> usize {
        while parent[n] != n {
            parent[n] = parent[parent[n]];
            n = parent[n];
        }
        n
    }
    let mut parent: Vec<usize> = (0..net.num_nodes).collect();
    for e in net.edges.iter().filter(|e| e.conductance > 0.) {
        let (a, b) = (root(&mut parent, e.a), root(&mut parent, e.b));
        parent[a] = b;
    }
    let mut grounded = vec![false; net.num_nodes];
    for link in net.links.iter().filter(|l| l.conductance > 0.) {
        let r = root(&mut parent, link.node);
        grounded[r] = true;
    }
    let floating: Vec<usize> = (0..net.num_nodes)
        .filter(|&n| !grounded[root(&mut parent, n)])
        .collect();
    if let Some(first) = floating.first() {
        return Err(Error::SingularSystem(format!(
            "{} of {} nodes, starting at node {first}, are not connected to an HTC or \
             temperature boundary condition",
            floating.len(),
            net.num_nodes
        )));
    }
    Ok(())
}

/// Solves `K T = P` at steady state.
///
/// A temperature-dependent network is relinearized at each solution until the update falls
/// below `settings.residual` (the largest update, or the mean one if `maximum_res` is unset).
pub fn solve_static(
    builder: &NetworkBuilder<'_>,
    settings: &ThermalStaticSettings,
    nodes: usize,
) -> Result<StaticSolution> {
    let _span = tracing::info_span!("solve_static").entered();
    let dependent = builder.is_temperature_dependent();
    let max_iter = if dependent { settings.iteration } else { 1 };
    let mut kelvin = vec![builder.env_kelvin(); nodes];
    let mut residual = f64::INFINITY;

    for iteration in 1..=max_iter {
        let network = builder.build(&kelvin)?;
        check_grounded(&network)?;
        let k = sparse::assemble(&network, None);
        let next = sparse::Factor::new(&k)?.solve(&static_rhs(&network));
        if next.iter().any(|t| !t.is_finite()) {
            return Err(Error::SingularSystem("solution is not finite".into()));
        }

        let deltas = next.iter().zip(&kelvin).map(|(a, b)| (a - b).abs());
        residual = if settings.maximum_res {
            deltas.fold(0., f64::max)
        } else {
            deltas.sum::<f64>() / nodes.max(1) as f64
        };
        kelvin = next;
        tracing::debug!(iteration, residual, "static iteration");
        if max_iter == 1 || residual < settings.residual {
            tracing::info!(iterations = iteration, residual, "static solve finished");
            return Ok(StaticSolution {
                kelvin,
                iterations: iteration,
                residual,
                network,
            });
        }
    }
    Err(Error::NonConvergent {
        iterations: max_iter,
        residual,
    })
}
