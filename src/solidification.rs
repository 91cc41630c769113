//! Solidification of a pure component or of a binary alloy, coupled with the thermal and solute
//! transport equations.
//!
//! The entry point is [`Solidification`], built from a [`SolidificationParam`]. Each call to
//! [`Solidification::compute`] advances the coupled system by one time step.
use crate::error::SetupError;
use serde::{Deserialize, Serialize};

pub mod alloy;
pub mod coupling;
pub mod state;
pub mod strategy;
pub mod voller;

pub use alloy::{BinaryAlloy, BinaryAlloyParam};
pub use coupling::{AdvancedAnalysis, AlloyFields, CouplingInfo, Solidification, SolidificationMetrics};
pub use state::{CellField, SolidificationState, StateCounts};
pub use voller::{VollerModel, VollerParam};

/// Update of the liquid fraction in the binary alloy model.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Strategy {
    /// Lever rule inverted in the current state of each cell.
    Legacy,
    /// First-order Taylor expansion of the liquid fraction across the liquidus line.
    #[default]
    Taylor,
    /// Enthalpy-consistent update following each transition between two states.
    Path,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SolidificationModel {
    Voller(VollerParam),
    BinaryAlloy(BinaryAlloyParam),
}

impl Default for SolidificationModel {
    fn default() -> Self {
        Self::Voller(VollerParam::default())
    }
}

impl SolidificationModel {
    pub fn latent_heat(&self) -> f64 {
        match self {
            Self::Voller(param) => param.latent_heat,
            Self::BinaryAlloy(param) => param.latent_heat,
        }
    }

    /// Secondary dendrite arm spacing.
    pub fn s_das(&self) -> f64 {
        match self {
            Self::Voller(param) => param.s_das,
            Self::BinaryAlloy(param) => param.s_das,
        }
    }
}

/// Parameters of the nonlinear thermo-solutal coupling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegregationParam {
    pub strategy: Strategy,
    pub n_iter_max: usize,
    /// Tolerance on the maximal variation of temperature and concentration between two
    /// iterates.
    pub tolerance: f64,
    pub gliq_relax: f64,
    pub eta_relax: f64,
}

impl Default for SegregationParam {
    fn default() -> Self {
        Self {
            strategy: Strategy::Taylor,
            n_iter_max: 5,
            tolerance: 1e-3,
            gliq_relax: 0.0,
            eta_relax: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolidificationParam {
    pub model: SolidificationModel,
    pub segregation: SegregationParam,
    /// Start each time step from temperature and concentration extrapolated in time.
    pub use_extrapolation: bool,
    /// Add the explicit diffusion of `min(C - C_l, 0)` to the solute equation.
    pub solute_source_term: bool,
    /// Implicit treatment of the eutectic plateau in the thermal system (path strategy).
    pub penalized_eutectic: bool,
    /// Reference mass density.
    pub rho0: f64,
    /// Reference heat capacity.
    pub cp0: f64,
    /// Dynamic viscosity of the liquid.
    pub viscosity: f64,
    pub thermal_dilatation: f64,
    pub ref_temperature: f64,
    pub gravity: [f64; 3],
    /// Regularization of the Carman-Kozeny forcing in solid cells.
    pub forcing_eps: f64,
    /// Cells which are solid during the whole computation.
    pub permanent_solid_cells: Vec<usize>,
    pub verbosity: i32,
}

impl Default for SolidificationParam {
    fn default() -> Self {
        Self {
            model: SolidificationModel::default(),
            segregation: SegregationParam::default(),
            use_extrapolation: false,
            solute_source_term: false,
            penalized_eutectic: false,
            rho0: 1.0,
            cp0: 1.0,
            viscosity: 1.0,
            thermal_dilatation: 0.0,
            ref_temperature: 0.0,
            gravity: [0.0; 3],
            forcing_eps: 1e-3,
            permanent_solid_cells: Vec::new(),
            verbosity: 0,
        }
    }
}

impl SolidificationParam {
    pub fn from_json_str(json: &str) -> eyre::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check the parameters that do not depend on the mesh.
    pub fn check(&self) -> Result<(), SetupError> {
        let invalid = |name: &str, reason: &str| SetupError::InvalidParameter {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if self.model.s_das() < f64::from(f32::MIN_POSITIVE) {
            return Err(invalid("s_das", "the secondary dendrite arm spacing must be positive"));
        }
        if !(self.rho0 > 0.0) || !(self.cp0 > 0.0) {
            return Err(invalid("rho0, cp0", "must be positive"));
        }
        if !(self.model.latent_heat() > 0.0) {
            return Err(invalid("latent_heat", "must be positive"));
        }
        if !(self.forcing_eps > 0.0) {
            return Err(invalid("forcing_eps", "must be positive"));
        }
        let seg = &self.segregation;
        if seg.n_iter_max == 0 {
            return Err(invalid("segregation.n_iter_max", "at least one iteration is required"));
        }
        if !(seg.tolerance > 0.0) {
            return Err(invalid("segregation.tolerance", "must be positive"));
        }
        for (name, relax) in [("segregation.gliq_relax", seg.gliq_relax), ("segregation.eta_relax", seg.eta_relax)] {
            if !(0.0..1.0).contains(&relax) {
                return Err(invalid(name, "must lie in [0, 1)"));
            }
        }
        if self.solute_source_term && seg.strategy != Strategy::Legacy {
            return Err(SetupError::IncompatibleStrategy {
                strategy: seg.strategy,
                option: "solute_source_term",
            });
        }
        Ok(())
    }
}
