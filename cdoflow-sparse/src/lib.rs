//! Sparse linear algebra used by `cdoflow`: residual stopping criteria and preconditioners for
//! the Conjugate Gradient solver of `fenris-sparse`.
pub mod criterion;
pub mod precond;

pub use criterion::{Diverged, ResidualCriterion};
pub use fenris_sparse::cg::{
    CgOutput, CgStoppingCriterion, CgWorkspace, ConjugateGradient, IdentityOperator, LinearOperator, SolveError,
    SolveErrorKind,
};
pub use precond::JacobiPreconditioner;
