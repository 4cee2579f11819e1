//! Sparse assembly and factorization of network matrices.

use nalgebra::DMatrix;
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::error::{Error, Result};
use crate::network::ThermalNetwork;

/// Assembles the conductance matrix of `net` plus `diag` on the diagonal.
///
/// Links to fixed temperatures contribute to the diagonal only; their pull on the node lives
/// in [`ThermalNetwork::fixed_power`].
pub fn assemble(net: &ThermalNetwork, diag: Option<&[f64]>) -> CscMatrix<f64> {
    let n = net.num_nodes;
    let mut coo = CooMatrix::new(n, n);
    let mut d = diag.map(<[f64]>::to_vec).unwrap_or_else(|| vec![0.; n]);
    for e in &net.edges {
        coo.push(e.a, e.b, -e.conductance);
        coo.push(e.b, e.a, -e.conductance);
        d[e.a] += e.conductance;
        d[e.b] += e.conductance;
    }
    for link in &net.links {
        d[link.node] += link.conductance;
    }
    for (i, v) in d.into_iter().enumerate() {
        coo.push(i, i, v);
    }
    CscMatrix::from(&coo)
}

/// Computes `m * x`.
pub fn spmv(m: &CscMatrix<f64>, x: &[f64]) -> Vec<f64> {
    let mut y = vec![0.; m.nrows()];
    let (offsets, rows, values) = (m.col_offsets(), m.row_indices(), m.values());
    for col in 0..m.ncols() {
        for k in offsets[col]..offsets[col + 1] {
            y[rows[k]] += values[k] * x[col];
        }
    }
    y
}

/// A Cholesky factorization of a symmetric positive definite sparse matrix.
pub struct Factor {
    chol: CscCholesky<f64>,
}

impl Factor {
    /// Factors `m`, failing if it is not positive definite.
    pub fn new(m: &CscMatrix<f64>) -> Result<Self> {
        let chol = CscCholesky::factor(m)
            .map_err(|e| Error::SingularSystem(format!("{e:?}")))?;
        Ok(Self { chol })
    }

    /// Solves `m x = b`.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let b = DMatrix::from_column_slice(b.len(), 1, b);
        self.chol.solve(&b).as_slice().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::network::{Edge, Link};

    fn chain() -> ThermalNetwork {
        ThermalNetwork {
            num_nodes: 3,
            edges: vec![
                Edge {
                    a: 0,
                    b: 1,
                    conductance: 2.,
                },
                Edge {
                    a: 1,
                    b: 2,
                    conductance: 1.,
                },
            ],
            capacitance: vec![1.; 3],
            links: vec![Link {
                node: 0,
                conductance: 4.,
                kelvin: 300.,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn assembled_matrix_is_a_laplacian() {
        let net = chain();
        let k = assemble(&net, None);
        let y = spmv(&k, &[1., 1., 1.]);
        assert_relative_eq!(y.as_slice(), [4., 0., 0.].as_slice());
        let k = assemble(&net, Some(&[1., 1., 1.]));
        let y = spmv(&k, &[1., 0., 0.]);
        assert_relative_eq!(y.as_slice(), [7., -2., 0.].as_slice());
    }

    #[test]
    fn grounded_chain_settles_at_the_link() {
        let mut net = chain();
        let k = assemble(&net, None);
        let t = Factor::new(&k).unwrap().solve(&net.fixed_power());
        for v in t {
            assert_relative_eq!(v, 300., max_relative = 1e-12);
        }

        // 1 W into the far node drops 1/4 + 1/2 + 1 K along the chain
        let mut p = net.fixed_power();
        p[2] += 1.;
        let t = Factor::new(&k).unwrap().solve(&p);
        assert_relative_eq!(t[2] - 300., 1.75, max_relative = 1e-12);

        // an indefinite matrix has no Cholesky factor
        net.edges[0].conductance = -10.;
        assert!(matches!(
            Factor::new(&assemble(&net, None)),
            Err(Error::SingularSystem(_))
        ));
    }
}
