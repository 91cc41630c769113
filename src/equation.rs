//! Equations: parameters, per-equation bookkeeping and solve drivers.
pub mod builder;
pub mod edge_vector;
pub mod param;
pub mod scalar;

pub use builder::{EquationBuilder, FaceBoundaryConditions};
pub use edge_vector::EdgeVectorEquation;
pub use param::EquationParam;
pub use scalar::{CellScalarEquation, ExtraTerms, ScalarEquation, ScalarEquationParam};
