use fenris_sparse::cg::LinearOperator;
use nalgebra::{DVector, DVectorView, DVectorViewMut, RealField};
use nalgebra_sparse::CsrMatrix;
use std::error::Error;

/// Diagonal (Jacobi) preconditioner `P = diag(A)^{-1}`.
///
/// Zero diagonal entries are treated as one.
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner<T: RealField> {
    inv_diag: DVector<T>,
}

impl<T: RealField> JacobiPreconditioner<T> {
    pub fn from_csr(matrix: &CsrMatrix<T>) -> Self {
        let mut inv_diag = DVector::repeat(matrix.nrows(), T::one());
        for (i, row) in matrix.row_iter().enumerate() {
            let diag = row
                .col_indices()
                .iter()
                .zip(row.values())
                .find(|(&j, _)| j == i)
                .map(|(_, a_ii)| a_ii.clone());
            if let Some(a_ii) = diag {
                if a_ii != T::zero() {
                    inv_diag[i] = T::one() / a_ii;
                }
            }
        }
        Self { inv_diag }
    }

    pub fn inverse_diagonal(&self) -> &DVector<T> {
        &self.inv_diag
    }
}

impl<T: RealField> LinearOperator<T> for JacobiPreconditioner<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        if x.len() != self.inv_diag.len() {
            return Err("Jacobi preconditioner applied to vector of wrong dimension".into());
        }
        for i in 0..x.len() {
            y[i] = x[i].clone() * self.inv_diag[i].clone();
        }
        Ok(())
    }
}
