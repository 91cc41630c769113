//! Compatible discrete operator (CDO) schemes on polyhedral meshes.
//!
//! The crate provides the cellwise construction and parallel assembly of edge-based vector
//! equations (curl-curl, reaction and unsteady terms), cell-centered scalar equations and the
//! nonlinear coupling of temperature, solute concentration and liquid fraction used to model
//! the solidification of binary alloys.
pub mod assembly;
pub mod cell_mesh;
pub mod connectivity;
pub mod equation;
pub mod error;
pub mod mesh;
pub mod parallel;
pub mod reco;
pub mod solidification;
pub mod solver;
pub mod time_step;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
