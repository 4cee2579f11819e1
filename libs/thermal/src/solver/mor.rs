//! Model order reduction of `C dx/dt + K x = B u` by block Krylov projection.
//!
//! The basis spans the start state, `K⁻¹B`, `(K⁻¹C)K⁻¹B`, and so on. It therefore reproduces
//! the start state and every steady state of the inputs exactly.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;

use super::sparse::{spmv, Factor};
use crate::error::Result;

const DEFLATION: f64 = 1e-10;

/// A projected system.
pub struct ReducedModel {
    /// The orthonormal basis, one column per reduced state.
    pub basis: DMatrix<f64>,
    /// The reduced conductance matrix `VᵀKV`.
    pub k: DMatrix<f64>,
    /// The reduced capacity matrix `VᵀCV`.
    pub c: DMatrix<f64>,
    /// The reduced inputs `VᵀB`, one column per input.
    pub b: DMatrix<f64>,
}

impl ReducedModel {
    /// The number of reduced states.
    pub fn order(&self) -> usize {
        self.basis.ncols()
    }

    /// Projects a full state onto the basis.
    pub fn project(&self, x: &[f64]) -> DVector<f64> {
        self.basis.tr_mul(&DVector::from_column_slice(x))
    }

    /// Expands reduced coordinates into a full state.
    pub fn expand(&self, z: &[f64]) -> Vec<f64> {
        (&self.basis * DVector::from_column_slice(z)).as_slice().to_vec()
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Orthonormalizes `v` against `basis`, or returns `None` if nothing new is left.
fn orthonormalize(basis: &[Vec<f64>], mut v: Vec<f64>) -> Option<Vec<f64>> {
    let norm = dot(&v, &v).sqrt();
    if !(norm > 0.) {
        return None;
    }
    for _ in 0..2 {
        for q in basis {
            let d = dot(q, &v);
            v.iter_mut().zip(q).for_each(|(x, q)| *x -= d * q);
        }
    }
    let rest = dot(&v, &v).sqrt();
    (rest > DEFLATION * norm).then(|| v.into_iter().map(|x| x / rest).collect())
}

/// Reduces a system with conductances `k`, diagonal capacities `c` and the given input
/// columns to at least `order` states, or as many as the Krylov space provides.
///
/// The basis always has room for the start state plus one column per input.
pub fn reduce(
    k: &CscMatrix<f64>,
    c: &[f64],
    inputs: &[Vec<f64>],
    start: &[f64],
    order: usize,
) -> Result<ReducedModel> {
    let n = k.nrows();
    let target = order.max(inputs.len() + 1).min(n);
    let factor = Factor::new(k)?;

    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(target);
    basis.extend(orthonormalize(&basis, start.to_vec()));
    let mut block: Vec<Vec<f64>> = inputs.iter().map(|b| factor.solve(b)).collect();
    while basis.len() < target {
        let mut added = Vec::new();
        for v in block {
            if basis.len() >= target {
                break;
            }
            if let Some(q) = orthonormalize(&basis, v) {
                basis.push(q.clone());
                added.push(q);
            }
        }
        if added.is_empty() {
            break;
        }
        block = added
            .iter()
            .map(|q| {
                let cq: Vec<f64> = q.iter().zip(c).map(|(x, c)| x * c).collect();
                factor.solve(&cq)
            })
            .collect();
    }

    let r = basis.len();
    let kv: Vec<Vec<f64>> = basis.iter().map(|q| spmv(k, q)).collect();
    let kr = DMatrix::from_fn(r, r, |i, j| dot(&basis[i], &kv[j]));
    let cr = DMatrix::from_fn(r, r, |i, j| {
        basis[i]
            .iter()
            .zip(&basis[j])
            .zip(c)
            .map(|((a, b), c)| a * b * c)
            .sum()
    });
    let br = DMatrix::from_fn(r, inputs.len(), |i, j| dot(&basis[i], &inputs[j]));
    Ok(ReducedModel {
        basis: DMatrix::from_fn(n, r, |i, j| basis[j][i]),
        k: (&kr + kr.transpose()) / 2.,
        c: cr,
        b: br,
    })
}
