//! Linear solvers for assembled global systems.
use crate::equation::param::SlesParam;
use cdoflow_sparse::{CgWorkspace, ConjugateGradient, JacobiPreconditioner, ResidualCriterion, SolveErrorKind};
use eyre::eyre;
use log::{debug, warn};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

/// Outcome of a linear solve.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SolveInfo {
    pub iterations: usize,
    /// Norm of the (approximate) residual at the last iteration.
    pub residual: f64,
    pub converged: bool,
}

/// Solves `A x = b` for an assembled global system.
///
/// Failing to converge within the iteration budget is reported through
/// [`SolveInfo::converged`]; breakdowns are returned as errors.
pub trait LinearSolver {
    /// Solve with `x` as initial guess. The stopping criterion is `||r|| <= rtol * normalization`.
    fn solve(
        &mut self,
        matrix: &CsrMatrix<f64>,
        rhs: &DVector<f64>,
        x: &mut DVector<f64>,
        normalization: f64,
    ) -> eyre::Result<SolveInfo>;
}

/// Jacobi-preconditioned Conjugate Gradient, for symmetric positive definite systems.
#[derive(Debug, Clone)]
pub struct CgSolver {
    param: SlesParam,
    workspace: CgWorkspace<f64>,
    name: String,
}

impl CgSolver {
    pub fn new(name: impl Into<String>, param: SlesParam) -> Self {
        Self {
            param,
            workspace: CgWorkspace::default(),
            name: name.into(),
        }
    }

    pub fn param(&self) -> &SlesParam {
        &self.param
    }
}

impl LinearSolver for CgSolver {
    fn solve(
        &mut self,
        matrix: &CsrMatrix<f64>,
        rhs: &DVector<f64>,
        x: &mut DVector<f64>,
        normalization: f64,
    ) -> eyre::Result<SolveInfo> {
        let criterion = ResidualCriterion::new(self.param.rtol)
            .with_atol(self.param.atol)
            .with_dtol(self.param.dtol)
            .with_normalization(normalization);
        let result = ConjugateGradient::with_workspace(&mut self.workspace)
            .with_operator(matrix)
            .with_preconditioner(JacobiPreconditioner::from_csr(matrix))
            .with_stopping_criterion(&criterion)
            .with_max_iter(self.param.n_max_iter)
            .solve_with_guess(rhs, x);

        let info = match result {
            Ok(output) => SolveInfo {
                iterations: output.num_iterations,
                residual: criterion.residual_norm(),
                converged: true,
            },
            Err(err) => match err.kind {
                SolveErrorKind::MaxIterationsReached { max_iter } => {
                    warn!(
                        "{}: linear solver did not converge in {} iterations (residual {:.3e})",
                        self.name,
                        max_iter,
                        criterion.residual_norm()
                    );
                    SolveInfo {
                        iterations: err.output.num_iterations,
                        residual: criterion.residual_norm(),
                        converged: false,
                    }
                }
                _ => return Err(eyre!("{}: linear solve failed: {}", self.name, err)),
            },
        };

        if self.param.verbosity > 0 {
            debug!(
                "{}: n_iters {} residual {:.3e} normalization {:.3e}",
                self.name, info.iterations, info.residual, normalization
            );
        }
        Ok(info)
    }
}
