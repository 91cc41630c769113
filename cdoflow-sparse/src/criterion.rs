use fenris_sparse::cg::{CgStoppingCriterion, LinearOperator, SolveErrorKind};
use nalgebra::DVectorView;
use std::cell::Cell;
use std::error::Error;
use std::fmt;

/// Residual tolerance `||r|| <= max(rtol * n, atol)` where `n` is the normalization
/// (by default the norm of the right-hand side).
///
/// The solve is aborted with a [`Diverged`] stopping-criterion error when
/// `||r|| > dtol * ||r_0||`.
///
/// The criterion records the initial and the latest residual norm, so it is passed by reference
/// to the solver and queried afterwards:
///
/// ```
/// # use cdoflow_sparse::{ConjugateGradient, ResidualCriterion};
/// # use nalgebra::{DMatrix, DVector};
/// let a = DMatrix::<f64>::identity(2, 2);
/// let b = DVector::from_element(2, 1.0);
/// let mut x = DVector::zeros(2);
/// let criterion = ResidualCriterion::new(1e-12);
/// ConjugateGradient::new()
///     .with_operator(&a)
///     .with_stopping_criterion(&criterion)
///     .solve_with_guess(&b, &mut x)
///     .unwrap();
/// assert!(criterion.residual_norm() <= 1e-12);
/// ```
///
/// Note that we use the *approximate* residual given by Conjugate-Gradient. For ill-conditioned
/// problems, it is possible that CG's residual converges, but the real residual does not.
#[derive(Debug, Clone)]
pub struct ResidualCriterion {
    rtol: f64,
    atol: f64,
    dtol: f64,
    normalization: Option<f64>,
    initial_residual: Cell<f64>,
    residual: Cell<f64>,
}

impl ResidualCriterion {
    pub fn new(rtol: f64) -> Self {
        Self {
            rtol,
            atol: 0.0,
            dtol: f64::MAX,
            normalization: None,
            initial_residual: Cell::new(0.0),
            residual: Cell::new(0.0),
        }
    }

    pub fn with_atol(self, atol: f64) -> Self {
        Self { atol, ..self }
    }

    pub fn with_dtol(self, dtol: f64) -> Self {
        Self { dtol, ..self }
    }

    /// Replace the right-hand side norm by a custom normalization.
    pub fn with_normalization(self, normalization: f64) -> Self {
        Self {
            normalization: Some(normalization),
            ..self
        }
    }

    /// Norm of the approximate residual at the last convergence check.
    ///
    /// Zero if the solver returned before checking, i.e. for a zero right-hand side.
    pub fn residual_norm(&self) -> f64 {
        self.residual.get()
    }

    /// Norm of the residual of the initial guess.
    pub fn initial_residual_norm(&self) -> f64 {
        self.initial_residual.get()
    }

    fn check(&self, b_norm: f64, iteration: usize, approx_residual: DVectorView<f64>) -> Result<bool, SolveErrorKind> {
        let r_norm = approx_residual.norm();
        self.residual.set(r_norm);
        if iteration == 0 {
            self.initial_residual.set(r_norm);
        }

        let r0_norm = self.initial_residual.get();
        if r_norm > self.dtol * r0_norm {
            let diverged = Diverged {
                iteration,
                residual: r_norm,
                initial_residual: r0_norm,
            };
            return Err(SolveErrorKind::StoppingCriterionError(Box::new(diverged)));
        }
        let normalization = self.normalization.unwrap_or(b_norm);
        Ok(r_norm <= (self.rtol * normalization).max(self.atol))
    }
}

impl Default for ResidualCriterion {
    fn default() -> Self {
        Self::new(1e-8)
    }
}

impl CgStoppingCriterion<f64> for ResidualCriterion {
    fn reset(&self, _a: &dyn LinearOperator<f64>, _x: DVectorView<f64>, _b: DVectorView<f64>) {
        self.initial_residual.set(0.0);
        self.residual.set(0.0);
    }

    fn has_converged(
        &self,
        _a: &dyn LinearOperator<f64>,
        _x: DVectorView<f64>,
        _b: DVectorView<f64>,
        b_norm: f64,
        iteration: usize,
        approx_residual: DVectorView<f64>,
    ) -> Result<bool, SolveErrorKind> {
        self.check(b_norm, iteration, approx_residual)
    }
}

impl<'a> CgStoppingCriterion<f64> for &'a ResidualCriterion {
    fn reset(&self, a: &dyn LinearOperator<f64>, x: DVectorView<f64>, b: DVectorView<f64>) {
        <ResidualCriterion as CgStoppingCriterion<f64>>::reset(self, a, x, b)
    }

    fn has_converged(
        &self,
        _a: &dyn LinearOperator<f64>,
        _x: DVectorView<f64>,
        _b: DVectorView<f64>,
        b_norm: f64,
        iteration: usize,
        approx_residual: DVectorView<f64>,
    ) -> Result<bool, SolveErrorKind> {
        self.check(b_norm, iteration, approx_residual)
    }
}

/// The residual grew beyond the divergence tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diverged {
    pub iteration: usize,
    pub residual: f64,
    pub initial_residual: f64,
}

impl fmt::Display for Diverged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Residual {:.3e} at iteration {} exceeded the divergence tolerance (initial residual {:.3e}).",
            self.residual, self.iteration, self.initial_residual
        )
    }
}

impl Error for Diverged {}
