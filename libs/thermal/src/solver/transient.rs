//! Implicit Euler integration of `C dT/dt + K T = P(t)`.
//!
//! With adaptive stepping every step is taken once with `h` and twice with `h/2`; the step
//! is accepted when both agree within tolerance and the two results are Richardson
//! extrapolated. Step sizes stay on `step × 2^k` so factorizations are reused.

use std::borrow::Cow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use nalgebra::{Cholesky, DVector, Dyn};

use super::mor::{self, ReducedModel};
use super::sparse::{self, Factor};
use super::{check_grounded, Excitation};
use crate::error::{Error, Result};
use crate::network::{NetworkBuilder, ThermalNetwork};
use crate::settings::ThermalTransientSettings;

/// Halvings of the base step after which a step counts as unstable.
const MAX_HALVINGS: i32 = 40;

/// Temperature drift in K that triggers relinearization of a temperature-dependent network.
const RELINEARIZE_DRIFT: f64 = 1.;

/// The sampled result of a transient solve, in kelvin.
#[derive(Debug, Clone, PartialEq)]
pub struct TransientSolution {
    /// The sample times in seconds.
    pub times: Vec<f64>,
    /// The temperature of each probe node at each sample, or `None` for unresolved probes.
    pub probes: Vec<Option<Vec<f64>>>,
    /// The lowest temperature over all samples.
    pub min: f64,
    /// The highest temperature over all samples.
    pub max: f64,
    /// The temperature of every node at the final time.
    pub last: Vec<f64>,
    /// The number of accepted steps.
    pub steps: usize,
    /// The number of rejected steps.
    pub rejected: usize,
}

trait StepSystem {
    /// Advances `x0` at time `t` by one implicit Euler step of length `h`.
    fn step(&mut self, t: f64, h: f64, x0: &[f64]) -> Result<Vec<f64>>;

    /// Called after every accepted step.
    fn accepted(&mut self, _x: &[f64]) -> Result<()> {
        Ok(())
    }

    /// The node temperatures of a state.
    fn expand<'x>(&self, x: &'x [f64]) -> Cow<'x, [f64]>;
}

/// The cache slot of step `h`, if it is a power-of-two multiple of `base`.
fn level(base: f64, h: f64) -> Option<i32> {
    let k = (h / base).log2().round() as i32;
    ((base * 2f64.powi(k) - h).abs() <= 1e-9 * h).then_some(k)
}

fn is_finite(x: &[f64]) -> bool {
    x.iter().all(|v| v.is_finite())
}

struct FullSystem<'a> {
    builder: Option<&'a NetworkBuilder<'a>>,
    excitation: &'a Excitation,
    base: f64,
    net: ThermalNetwork,
    fixed: Vec<f64>,
    scenarios: Vec<Vec<f64>>,
    linearized_at: Vec<f64>,
    factors: HashMap<i32, Factor>,
}

impl<'a> FullSystem<'a> {
    fn new(
        builder: &'a NetworkBuilder<'a>,
        kelvin: &[f64],
        settings: &ThermalTransientSettings,
        excitation: &'a Excitation,
    ) -> Result<Self> {
        let relinearize = settings.temperature_depend && builder.is_temperature_dependent();
        let mut sys = Self {
            builder: relinearize.then_some(builder),
            excitation,
            base: settings.step,
            net: ThermalNetwork::default(),
            fixed: Vec::new(),
            scenarios: Vec::new(),
            linearized_at: kelvin.to_vec(),
            factors: HashMap::new(),
        };
        sys.load(builder.build(kelvin)?)?;
        Ok(sys)
    }

    fn load(&mut self, net: ThermalNetwork) -> Result<()> {
        check_grounded(&net)?;
        self.fixed = net.fixed_power();
        self.scenarios = (0..net.num_scenarios())
            .map(|s| net.scenario_power(s))
            .collect();
        self.net = net;
        self.factors.clear();
        Ok(())
    }

    /// Factors `C/h + K`.
    fn factor(net: &ThermalNetwork, h: f64) -> Result<Factor> {
        let shift: Vec<f64> = net.capacitance.iter().map(|c| c / h).collect();
        Factor::new(&sparse::assemble(net, Some(&shift)))
    }
}

impl StepSystem for FullSystem<'_> {
    fn step(&mut self, t: f64, h: f64, x0: &[f64]) -> Result<Vec<f64>> {
        let mut rhs = self.fixed.clone();
        for (s, p) in self.scenarios.iter().enumerate() {
            let scale = (self.excitation)(t + h, s);
            rhs.iter_mut().zip(p).for_each(|(r, p)| *r += scale * p);
        }
        for ((r, c), x) in rhs.iter_mut().zip(&self.net.capacitance).zip(x0) {
            *r += c / h * x;
        }
        let x = match level(self.base, h) {
            Some(k) => match self.factors.entry(k) {
                Entry::Occupied(e) => e.into_mut().solve(&rhs),
                Entry::Vacant(e) => e.insert(Self::factor(&self.net, h)?).solve(&rhs),
            },
            None => Self::factor(&self.net, h)?.solve(&rhs),
        };
        Ok(x)
    }

    fn accepted(&mut self, x: &[f64]) -> Result<()> {
        let Some(builder) = self.builder else {
            return Ok(());
        };
        let drift = x
            .iter()
            .zip(&self.linearized_at)
            .map(|(a, b)| (a - b).abs())
            .fold(0., f64::max);
        if drift > RELINEARIZE_DRIFT {
            tracing::debug!(drift, "relinearizing thermal network");
            self.load(builder.build(x)?)?;
            self.linearized_at = x.to_vec();
        }
        Ok(())
    }

    fn expand<'x>(&self, x: &'x [f64]) -> Cow<'x, [f64]> {
        Cow::Borrowed(x)
    }
}

struct ReducedSystem<'a> {
    model: ReducedModel,
    excitation: &'a Excitation,
    scenarios: usize,
    base: f64,
    factors: HashMap<i32, Cholesky<f64, Dyn>>,
}

impl ReducedSystem<'_> {
    fn factor(model: &ReducedModel, h: f64) -> Result<Cholesky<f64, Dyn>> {
        (&model.c / h + &model.k)
            .cholesky()
            .ok_or_else(|| Error::SingularSystem("reduced step matrix is not positive definite".into()))
    }
}

impl StepSystem for ReducedSystem<'_> {
    fn step(&mut self, t: f64, h: f64, x0: &[f64]) -> Result<Vec<f64>> {
        let u = DVector::from_fn(self.scenarios + 1, |s, _| {
            if s < self.scenarios {
                (self.excitation)(t + h, s)
            } else {
                1.
            }
        });
        let rhs = &self.model.b * u + &self.model.c * DVector::from_column_slice(x0) / h;
        let z = match level(self.base, h) {
            Some(k) => match self.factors.entry(k) {
                Entry::Occupied(e) => e.into_mut().solve(&rhs),
                Entry::Vacant(e) => e.insert(Self::factor(&self.model, h)?).solve(&rhs),
            },
            None => Self::factor(&self.model, h)?.solve(&rhs),
        };
        Ok(z.as_slice().to_vec())
    }

    fn expand<'x>(&self, x: &'x [f64]) -> Cow<'x, [f64]> {
        Cow::Owned(self.model.expand(x))
    }
}

struct Sampler<'p> {
    probes: &'p [Option<usize>],
    interval: f64,
    times: Vec<f64>,
    values: Vec<Vec<f64>>,
    extremes: Vec<(f64, f64)>,
    last: Vec<f64>,
}

impl<'p> Sampler<'p> {
    fn new(probes: &'p [Option<usize>], interval: f64) -> Self {
        Self {
            probes,
            interval,
            times: Vec::new(),
            values: Vec::new(),
            extremes: Vec::new(),
            last: Vec::new(),
        }
    }

    fn wants(&self, t: f64, fin: bool) -> bool {
        match self.times.last() {
            None => true,
            Some(&prev) if fin => t - prev > 1e-12 * t.abs().max(1.),
            Some(&prev) => t - prev >= self.interval * (1. - 1e-9),
        }
    }

    fn record(&mut self, t: f64, field: &[f64]) {
        self.times.push(t);
        self.values.push(
            self.probes
                .iter()
                .flatten()
                .map(|&node| field[node])
                .collect(),
        );
        let lo = field.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = field.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        self.extremes.push((lo, hi));
    }

    fn finish(self, end: f64, window: f64, steps: usize, rejected: usize) -> TransientSolution {
        let first = if window > 0. {
            self.times
                .iter()
                .position(|&t| t >= end - window - 1e-12 * end)
                .unwrap_or(0)
        } else {
            0
        };
        let times = self.times[first..].to_vec();
        let values = &self.values[first..];
        let mut resolved = 0;
        let probes = self
            .probes
            .iter()
            .map(|p| {
                p.map(|_| {
                    let column = values.iter().map(|v| v[resolved]).collect();
                    resolved += 1;
                    column
                })
            })
            .collect();
        let (min, max) = self.extremes[first..]
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(a, b)| {
                (lo.min(a), hi.max(b))
            });
        TransientSolution {
            times,
            probes,
            min,
            max,
            last: self.last,
            steps,
            rejected,
        }
    }
}

fn integrate<S: StepSystem>(
    sys: &mut S,
    mut x: Vec<f64>,
    settings: &ThermalTransientSettings,
    sampler: &mut Sampler<'_>,
) -> Result<(usize, usize)> {
    let end = settings.duration;
    let min_h = settings.step * 2f64.powi(-MAX_HALVINGS);
    let (mut t, mut h) = (0., settings.step);
    let (mut steps, mut rejected) = (0, 0);
    sampler.record(0., &sys.expand(&x));

    while end - t > 1e-12 * end {
        let h_try = h.min(end - t);
        let next = if settings.adaptive {
            let one = sys.step(t, h_try, &x)?;
            let half = sys.step(t, h_try / 2., &x)?;
            let two = sys.step(t + h_try / 2., h_try / 2., &half)?;
            let (one_t, two_t) = (sys.expand(&one), sys.expand(&two));
            let err = one_t
                .iter()
                .zip(two_t.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0., f64::max);
            let scale = two_t.iter().map(|v| v.abs()).fold(0., f64::max);
            let tol = settings.abs_error + settings.rel_error * scale;
            if !(err <= tol) || !is_finite(&two_t) {
                rejected += 1;
                h = h_try / 2.;
                if h < min_h {
                    return Err(Error::UnstableStep { time: t });
                }
                continue;
            }
            if err < tol / 4. && h_try == h {
                h *= 2.;
            }
            two.iter().zip(&one).map(|(b, a)| 2. * b - a).collect()
        } else {
            let next = sys.step(t, h_try, &x)?;
            if !is_finite(&sys.expand(&next)) {
                return Err(Error::UnstableStep { time: t });
            }
            next
        };

        t += h_try;
        x = next;
        steps += 1;
        sys.accepted(&x)?;
        if settings.verbose {
            tracing::info!(t, h = h_try, "transient step");
        } else {
            tracing::trace!(t, h = h_try, "transient step");
        }
        let fin = end - t <= 1e-12 * end;
        if sampler.wants(t, fin) {
            sampler.record(t, &sys.expand(&x));
        }
    }
    sampler.last = sys.expand(&x).into_owned();
    Ok((steps, rejected))
}

/// Integrates the network of `builder` from the ambient temperature over
/// `settings.duration`, recording the temperature of the `probes` nodes.
///
/// With `settings.mor.order > 0` the network is linearized at the ambient temperature and
/// reduced before integration.
pub fn solve_transient(
    builder: &NetworkBuilder<'_>,
    settings: &ThermalTransientSettings,
    nodes: usize,
    probes: &[Option<usize>],
    excitation: &Excitation,
) -> Result<TransientSolution> {
    let _span = tracing::info_span!("solve_transient").entered();
    let x0 = vec![builder.env_kelvin(); nodes];
    let mut sampler = Sampler::new(probes, settings.min_sampling_interval);

    let (steps, rejected) = if settings.mor.order > 0 {
        let net = builder.build(&x0)?;
        check_grounded(&net)?;
        let k = sparse::assemble(&net, None);
        let scenarios = net.num_scenarios();
        let mut inputs: Vec<Vec<f64>> = (0..scenarios).map(|s| net.scenario_power(s)).collect();
        inputs.push(net.fixed_power());
        let model = mor::reduce(&k, &net.capacitance, &inputs, &x0, settings.mor.order)?;
        tracing::info!(nodes, order = model.order(), "reduced transient model");
        let z0 = model.project(&x0).as_slice().to_vec();
        let mut sys = ReducedSystem {
            model,
            excitation,
            scenarios,
            base: settings.step,
            factors: HashMap::new(),
        };
        integrate(&mut sys, z0, settings, &mut sampler)?
    } else {
        let mut sys = FullSystem::new(builder, &x0, settings, excitation)?;
        integrate(&mut sys, x0, settings, &mut sampler)?
    };

    let solution = sampler.finish(
        settings.duration,
        settings.sampling_window,
        steps,
        rejected,
    );
    tracing::info!(
        steps,
        rejected,
        samples = solution.times.len(),
        "transient solve finished"
    );
    Ok(solution)
}
