//! Phase diagram of a binary alloy under the lever rule.
use crate::error::SetupError;
use crate::solidification::state::SolidificationState;
use serde::{Deserialize, Serialize};

/// Half-width of the temperature band around the eutectic temperature.
pub const EUTECTIC_THRESHOLD: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryAlloyParam {
    /// Melting temperature of the pure solvent.
    pub t_melt: f64,
    pub t_eutectic: f64,
    /// Slope of the liquidus line.
    pub liquidus_slope: f64,
    /// Partition coefficient between the solid and the liquid phases.
    pub partition_coef: f64,
    pub latent_heat: f64,
    /// Reference concentration, used in the Boussinesq term and the segregation index.
    pub ref_concentration: f64,
    /// Solutal dilatation coefficient.
    #[serde(default)]
    pub dilatation_coef: f64,
    /// Diffusivity of the solute in the liquid phase.
    #[serde(default)]
    pub solute_diffusivity: f64,
    /// Secondary dendrite arm spacing.
    pub s_das: f64,
}

/// Constants of the phase diagram, with the quantities derived from them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryAlloy {
    pub t_melt: f64,
    pub t_eut: f64,
    pub ml: f64,
    pub kp: f64,
    pub latent_heat: f64,

    pub inv_kp: f64,
    /// `1/(kp - 1)`
    pub inv_kpm1: f64,
    pub inv_ml: f64,
    /// Concentration of the liquid at the eutectic point.
    pub c_eut: f64,
    /// Concentration of the solid at the eutectic temperature, `kp * c_eut`.
    pub cs1: f64,
    /// Derivative of the liquid fraction with respect to the concentration on the eutectic
    /// plateau.
    pub dgldc_eut: f64,
    pub t_eut_inf: f64,
    pub t_eut_sup: f64,
}

impl BinaryAlloy {
    pub fn new(param: &BinaryAlloyParam) -> Result<Self, SetupError> {
        let invalid = |name: &str, reason: &str| SetupError::InvalidParameter {
            name: format!("binary_alloy.{name}"),
            reason: reason.to_string(),
        };
        let kp = param.partition_coef;
        let ml = param.liquidus_slope;
        if !(kp > 0.0) || kp == 1.0 {
            return Err(invalid("partition_coef", "must be positive and different from 1"));
        }
        if ml == 0.0 {
            return Err(invalid("liquidus_slope", "must be non-zero"));
        }
        if param.t_eutectic == param.t_melt {
            return Err(invalid("t_eutectic", "must differ from the melting temperature"));
        }

        let inv_ml = 1.0 / ml;
        let c_eut = (param.t_eutectic - param.t_melt) * inv_ml;
        let cs1 = c_eut * kp;
        Ok(Self {
            t_melt: param.t_melt,
            t_eut: param.t_eutectic,
            ml,
            kp,
            latent_heat: param.latent_heat,
            inv_kp: 1.0 / kp,
            inv_kpm1: 1.0 / (kp - 1.0),
            inv_ml,
            c_eut,
            cs1,
            dgldc_eut: 1.0 / (c_eut - cs1),
            t_eut_inf: param.t_eutectic - EUTECTIC_THRESHOLD,
            t_eut_sup: param.t_eutectic + EUTECTIC_THRESHOLD,
        })
    }

    pub fn t_liquidus(&self, conc: f64) -> f64 {
        self.t_eut.max(self.t_melt + self.ml * conc)
    }

    pub fn t_solidus(&self, conc: f64) -> f64 {
        if conc < self.cs1 {
            self.t_melt + self.ml * conc * self.inv_kp
        } else {
            self.t_eut
        }
    }

    /// Ratio `eta = C_l / C` between the liquid and the bulk concentrations.
    pub fn eta(&self, conc: f64) -> f64 {
        if conc > self.cs1 {
            self.c_eut / conc
        } else {
            self.inv_kp
        }
    }

    /// `eta` in the mushy zone for the liquid fraction `gliq`.
    pub fn eta_mushy(&self, gliq: f64) -> f64 {
        1.0 / (gliq * (1.0 - self.kp) + self.kp)
    }

    /// Liquid fraction in the mushy zone (lever rule).
    pub fn gl_mushy(&self, temp: f64, conc: f64) -> f64 {
        self.inv_kpm1 * (self.kp - self.ml * conc / (temp - self.t_melt))
    }

    /// The liquidus temperature of `conc` is the melting temperature of the solvent: there is no
    /// mushy zone to linearize the liquid fraction around.
    pub fn is_pure_solvent(&self, conc: f64) -> bool {
        (self.t_liquidus(conc) - self.t_melt).abs() <= f64::EPSILON * self.t_melt.abs().max(1.0)
    }

    /// Derivatives `(dgl/dT, dgl/dC)` of the liquid fraction in the mushy zone.
    ///
    /// Only defined away from the melting temperature, see [`Self::is_pure_solvent`].
    pub fn dgl_mushy(&self, temp: f64, conc: f64) -> (f64, f64) {
        let dtm = temp - self.t_melt;
        let kml = self.ml * self.inv_kpm1;
        (kml * conc / (dtm * dtm), -kml / dtm)
    }

    /// State of the couple `(temp, conc)`. A temperature equal to the liquidus (resp. solidus)
    /// temperature belongs to the lower state.
    pub fn state(&self, temp: f64, conc: f64) -> SolidificationState {
        if temp > self.t_liquidus(conc) {
            SolidificationState::Liquid
        } else if temp > self.t_solidus(conc) {
            SolidificationState::Mushy
        } else if conc < self.cs1 || temp < self.t_eut_inf {
            SolidificationState::Solid
        } else {
            SolidificationState::Eutectic
        }
    }

    /// State of a consistent tuple `(temp, conc, gliq)` from its enthalpy `cp T + gliq L`.
    pub fn state_by_enthalpy(&self, cp: f64, temp: f64, conc: f64, gliq: f64) -> SolidificationState {
        let l = self.latent_heat;
        let h_liq = cp * self.t_liquidus(conc) + l;
        let h = cp * temp + gliq * l;

        if h > h_liq {
            SolidificationState::Liquid
        } else if conc > self.cs1 {
            let h_sol = cp * self.t_eut;
            let gleut = (conc - self.cs1) * self.dgldc_eut;
            let h_eut = cp * self.t_eut + gleut * l;
            if h > h_eut {
                SolidificationState::Mushy
            } else if h > h_sol {
                SolidificationState::Eutectic
            } else {
                SolidificationState::Solid
            }
        } else {
            let h_sol = cp * (self.t_melt + self.ml * conc * self.inv_kp);
            if h > h_sol {
                SolidificationState::Mushy
            } else {
                SolidificationState::Solid
            }
        }
    }

    /// Concentration of the liquid phase in a cell currently in `state`.
    ///
    /// In the solid state, the value is only updated when the cell was not solid at the previous
    /// time step (`gliq_pre > 0`), otherwise `c_l_old` is kept.
    pub fn liquid_concentration(&self, state: SolidificationState, temp: f64, conc: f64, gliq_pre: f64, c_l_old: f64) -> f64 {
        match state {
            SolidificationState::Solid => {
                if gliq_pre > 0.0 {
                    if conc < self.cs1 {
                        conc * self.inv_kp
                    } else {
                        self.c_eut
                    }
                } else {
                    c_l_old
                }
            }
            SolidificationState::Mushy => (temp - self.t_melt) * self.inv_ml,
            SolidificationState::Liquid => conc,
            SolidificationState::Eutectic => self.c_eut,
        }
    }
}
