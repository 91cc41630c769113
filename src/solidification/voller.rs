//! Solidification of a pure component with a linear liquid fraction between the solidus and the
//! liquidus temperatures.
use crate::error::SetupError;
use crate::solidification::state::SolidificationState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VollerParam {
    pub t_solidus: f64,
    pub t_liquidus: f64,
    pub latent_heat: f64,
    /// Secondary dendrite arm spacing.
    pub s_das: f64,
}

impl Default for VollerParam {
    fn default() -> Self {
        Self {
            t_solidus: 0.0,
            t_liquidus: 1.0,
            latent_heat: 1.0,
            s_das: 1.0,
        }
    }
}

/// Values computed in one cell by [`VollerModel::update_cell`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VollerCellUpdate {
    pub state: SolidificationState,
    pub gliq: f64,
    pub reaction: f64,
    pub source: f64,
    pub forcing: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VollerModel {
    param: VollerParam,
    dgldt: f64,
}

impl VollerModel {
    pub fn new(param: VollerParam) -> Result<Self, SetupError> {
        if !(param.t_liquidus > param.t_solidus) {
            return Err(SetupError::InvalidParameter {
                name: String::from("voller.t_liquidus"),
                reason: String::from("must be greater than the solidus temperature"),
            });
        }
        Ok(Self {
            dgldt: 1.0 / (param.t_liquidus - param.t_solidus),
            param,
        })
    }

    pub fn param(&self) -> &VollerParam {
        &self.param
    }

    pub fn dgldt(&self) -> f64 {
        self.dgldt
    }

    /// `reaction_coef` is `rho0 L dgl/dT / dt`, `forcing_coef` already includes the viscosity.
    pub fn update_cell(
        &self,
        temp: f64,
        vol: f64,
        reaction_coef: f64,
        forcing_coef: f64,
        forcing_eps: f64,
    ) -> VollerCellUpdate {
        if temp < self.param.t_solidus {
            VollerCellUpdate {
                state: SolidificationState::Solid,
                gliq: 0.0,
                reaction: 0.0,
                source: 0.0,
                forcing: forcing_coef / forcing_eps,
            }
        } else if temp > self.param.t_liquidus {
            VollerCellUpdate {
                state: SolidificationState::Liquid,
                gliq: 1.0,
                reaction: 0.0,
                source: 0.0,
                forcing: 0.0,
            }
        } else {
            let gliq = (temp - self.param.t_solidus) * self.dgldt;
            let glc = 1.0 - gliq;
            VollerCellUpdate {
                state: SolidificationState::Mushy,
                gliq,
                reaction: reaction_coef,
                source: reaction_coef * temp * vol,
                forcing: forcing_coef * glc * glc / (gliq * gliq * gliq + forcing_eps),
            }
        }
    }
}
