//! Cellwise updates of the liquid fraction and of the thermal source terms.
//!
//! Each strategy comes with two functions: one computing the liquid fraction and `eta` once the
//! thermal system has been solved, one computing the reaction coefficient and the source of the
//! thermal system from the state of the previous time step. All functions are pure: they operate
//! on a [`CellPoint`] and return the new values, which the coupling driver writes back.
use crate::solidification::alloy::BinaryAlloy;
use crate::solidification::state::SolidificationState::{Eutectic, Liquid, Mushy, Solid};

/// Shift applied to the temperature of a cell leaving the mushy zone without reaching the
/// eutectic plateau, keeping it just above the solidus line.
const SOLIDUS_SHIFT: f64 = 1e-6;

/// Values attached to one cell during a nonlinear iteration.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CellPoint {
    /// Temperature of the current iterate.
    pub temp: f64,
    /// Bulk concentration of the current iterate.
    pub conc: f64,
    pub temp_pre: f64,
    pub conc_pre: f64,
    pub gliq_pre: f64,
    /// Temperature of the previous iterate.
    pub temp_k: f64,
    /// Bulk concentration of the previous iterate.
    pub conc_k: f64,
    /// Liquid fraction currently stored in the cell.
    pub gliq_k: f64,
    /// `eta` currently stored in the cell.
    pub eta_k: f64,
}

/// Result of a liquid fraction update.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LiquidFractionUpdate {
    pub gliq: f64,
    pub eta: f64,
    /// New temperature of the cell when it has been moved onto a line of the phase diagram.
    pub temp: Option<f64>,
}

/// Contribution of a cell to the thermal system.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ThermalUpdate {
    /// Reaction coefficient, per unit volume.
    pub reaction: f64,
    /// Source, integrated over the cell.
    pub source: f64,
}

/// Relaxation coefficients `r` of `x = (1 - r) x_computed + r x_old`.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Relaxation {
    pub gliq: f64,
    pub eta: f64,
}

/// Physical coefficients shared by the thermal updates.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ThermalCoefs {
    /// `rho0 L / dt`
    pub rho_l_over_dt: f64,
    /// `cp0 / L`
    pub cp_over_l: f64,
}

#[inline]
pub fn clamp_unit(x: f64) -> f64 {
    // f64::max ignores NaN, which maps degenerate values to 0
    x.max(0.0).min(1.0)
}

impl LiquidFractionUpdate {
    fn new(gliq: f64, eta: f64) -> Self {
        Self { gliq, eta, temp: None }
    }

    /// Apply the relaxation. The liquid fraction is clamped again afterwards.
    pub fn relax(mut self, relax: &Relaxation, p: &CellPoint) -> Self {
        if relax.gliq > 0.0 {
            self.gliq = (1.0 - relax.gliq) * self.gliq + relax.gliq * p.gliq_k;
        }
        if relax.eta > 0.0 {
            self.eta = (1.0 - relax.eta) * self.eta + relax.eta * p.eta_k;
        }
        self.gliq = clamp_unit(self.gliq);
        self
    }
}

/// Interface temperature `T*` and liquid fraction obtained by linearizing the liquid fraction
/// around the liquidus point of the previous time step. `offset` is added to the enthalpy
/// balance.
fn taylor_from_liquidus(alloy: &BinaryAlloy, cp_over_l: f64, p: &CellPoint, offset: f64) -> (f64, f64) {
    let t_liq = alloy.t_liquidus(p.conc_pre);
    let (dgldt, dgldc) = alloy.dgl_mushy(t_liq, p.conc_pre);
    let t_star = (cp_over_l * p.temp + offset + dgldt * t_liq + dgldc * (p.conc_pre - p.conc)) / (cp_over_l + dgldt);
    let gliq = 1.0 + dgldt * (t_star - t_liq) + dgldc * (p.conc - p.conc_pre);
    (t_star, gliq)
}

/// Liquid fraction computed from the lever rule in the state of the current iterate.
pub fn gl_legacy(alloy: &BinaryAlloy, p: &CellPoint) -> LiquidFractionUpdate {
    match alloy.state(p.temp, p.conc) {
        Solid => {
            let eta = if p.gliq_pre > 0.0 { alloy.eta(p.conc) } else { p.eta_k };
            LiquidFractionUpdate::new(0.0, eta)
        }
        Mushy => {
            let gliq = clamp_unit(alloy.gl_mushy(p.temp, p.conc));
            LiquidFractionUpdate::new(gliq, alloy.eta_mushy(gliq))
        }
        Liquid => LiquidFractionUpdate::new(1.0, 1.0),
        Eutectic => {
            let gliq = clamp_unit((p.conc - alloy.cs1) * alloy.dgldc_eut);
            LiquidFractionUpdate::new(gliq, alloy.eta(p.conc))
        }
    }
}

/// Variant of [`gl_legacy`] used with the solute source term. `eta` is left untouched and the
/// liquid concentration is returned instead.
pub fn gl_legacy_with_solute_source(alloy: &BinaryAlloy, p: &CellPoint, c_l: f64) -> (LiquidFractionUpdate, f64) {
    let state = alloy.state(p.temp, p.conc);
    let c_l = alloy.liquid_concentration(state, p.temp, p.conc, p.gliq_pre, c_l);
    let gliq = match state {
        Solid => 0.0,
        Mushy => alloy.gl_mushy(p.temp, p.conc),
        Liquid => 1.0,
        Eutectic => (p.conc - alloy.cs1) * alloy.dgldc_eut,
    };
    (LiquidFractionUpdate::new(clamp_unit(gliq), p.eta_k), c_l)
}

/// Thermal terms built from the state of the previous time step.
pub fn thm_legacy(alloy: &BinaryAlloy, coefs: &ThermalCoefs, p: &CellPoint, vol: f64) -> ThermalUpdate {
    let rho_l_vol = vol * coefs.rho_l_over_dt;
    match alloy.state(p.temp_pre, p.conc_pre) {
        Mushy => {
            let (dgldt, dgldc) = alloy.dgl_mushy(p.temp_pre, p.conc_pre);
            ThermalUpdate {
                reaction: dgldt * coefs.rho_l_over_dt,
                source: rho_l_vol * (dgldt * p.temp_pre + dgldc * (p.conc_pre - p.conc)),
            }
        }
        Eutectic => ThermalUpdate {
            reaction: 0.0,
            source: rho_l_vol * alloy.dgldc_eut * (p.conc_pre - p.conc),
        },
        Solid | Liquid => ThermalUpdate::default(),
    }
}

/// Liquid fraction with a first-order Taylor expansion across the liquidus line. The
/// temperature of a cell leaving the liquid state is moved to the interface temperature.
pub fn gl_taylor(alloy: &BinaryAlloy, cp_over_l: f64, p: &CellPoint) -> LiquidFractionUpdate {
    let state = alloy.state(p.temp, p.conc);
    let from_liquid = alloy.state(p.temp_pre, p.conc_pre) == Liquid;
    if from_liquid && alloy.is_pure_solvent(p.conc_pre) {
        return gl_legacy(alloy, p);
    }

    // Solid and eutectic cells coming from the liquid state share the same update
    let from_liquid_below = |t_threshold: f64| {
        let (t_star, gliq) = taylor_from_liquidus(alloy, cp_over_l, p, 0.0);
        let gliq = clamp_unit(gliq);
        let eta = if t_star > t_threshold {
            alloy.eta_mushy(gliq)
        } else {
            alloy.eta(p.conc)
        };
        LiquidFractionUpdate {
            gliq,
            eta,
            temp: Some(t_star),
        }
    };

    match state {
        Solid if from_liquid => from_liquid_below(alloy.t_eut_sup),
        Solid => LiquidFractionUpdate::new(0.0, alloy.eta(p.conc)),
        Mushy => {
            let (gliq, temp) = if from_liquid {
                let (t_star, gliq) = taylor_from_liquidus(alloy, cp_over_l, p, 0.0);
                (gliq, Some(t_star))
            } else {
                (alloy.gl_mushy(p.temp, p.conc), None)
            };
            let gliq = clamp_unit(gliq);
            LiquidFractionUpdate {
                gliq,
                eta: alloy.eta_mushy(gliq),
                temp,
            }
        }
        Liquid => LiquidFractionUpdate::new(1.0, 1.0),
        Eutectic if from_liquid => from_liquid_below(alloy.t_eut_inf),
        Eutectic => {
            let gliq = clamp_unit(p.gliq_k + cp_over_l * (p.temp_k - alloy.t_eut));
            LiquidFractionUpdate::new(gliq, alloy.eta(p.conc))
        }
    }
}

pub fn thm_taylor(alloy: &BinaryAlloy, coefs: &ThermalCoefs, p: &CellPoint, vol: f64) -> ThermalUpdate {
    let rho_l_vol = vol * coefs.rho_l_over_dt;
    match alloy.state(p.temp_pre, p.conc_pre) {
        Liquid => {
            if alloy.state(p.temp_k, p.conc_k) == Liquid || alloy.is_pure_solvent(p.conc_pre) {
                return ThermalUpdate::default();
            }
            let t_liq = alloy.t_liquidus(p.conc_pre);
            let (dgldt, dgldc) = alloy.dgl_mushy(t_liq, p.conc_pre);
            ThermalUpdate {
                reaction: dgldt * coefs.rho_l_over_dt,
                source: rho_l_vol * (dgldt * t_liq + dgldc * (p.conc_pre - p.conc)),
            }
        }
        Mushy => {
            let (dgldt, dgldc) = alloy.dgl_mushy(p.temp_pre, p.conc_pre);
            ThermalUpdate {
                reaction: dgldt * coefs.rho_l_over_dt,
                source: rho_l_vol * (dgldt * p.temp_pre + dgldc * (p.conc_pre - p.conc)),
            }
        }
        Eutectic => {
            let mut dgl = coefs.cp_over_l * (p.temp_k - alloy.t_eut);
            if p.gliq_pre + dgl < 0.0 {
                dgl = -p.gliq_pre;
            } else if p.gliq_pre + dgl > 1.0 {
                dgl = 1.0 - p.gliq_pre;
            }
            ThermalUpdate {
                reaction: 0.0,
                source: rho_l_vol * dgl,
            }
        }
        Solid => ThermalUpdate::default(),
    }
}

/// Concentration `c*` reached on the eutectic plateau by a cell of the eutectic state, with the
/// matching enthalpy balance.
fn eutectic_plateau_concentration(alloy: &BinaryAlloy, cp0: f64, p: &CellPoint) -> f64 {
    let l = alloy.latent_heat;
    let (dgldt, _) = alloy.dgl_mushy(alloy.t_eut, p.conc_pre);
    let dgl = dgldt * (p.temp - p.temp_pre) + alloy.dgldc_eut * (p.conc - p.conc_pre);
    let dh = cp0 * (p.temp - p.temp_pre) + dgl * l;
    p.conc_pre + dh / (l * alloy.dgldc_eut)
}

fn on_eutectic_plateau(alloy: &BinaryAlloy, conc: f64) -> bool {
    conc >= alloy.cs1 && conc <= alloy.c_eut
}

/// Liquid fraction following the path between the state of the previous time step and the state
/// of the current iterate. Each transition enforces the enthalpy balance along the path.
pub fn gl_path(alloy: &BinaryAlloy, cp0: f64, p: &CellPoint) -> LiquidFractionUpdate {
    let l = alloy.latent_heat;
    let cp_over_l = cp0 / l;
    let state = alloy.state(p.temp, p.conc);
    let state_pre = alloy.state(p.temp_pre, p.conc_pre);
    if state_pre == Liquid && alloy.is_pure_solvent(p.conc_pre) {
        return gl_legacy(alloy, p);
    }

    let mut gliq = p.gliq_pre;
    let mut eta = p.eta_k;
    let mut temp = None;

    match state {
        Solid => match state_pre {
            Liquid => {
                let (mut t_star, gl) = taylor_from_liquidus(alloy, cp_over_l, p, 1.0);
                gliq = clamp_unit(gl);
                if gliq > 0.0 {
                    let t_sol = alloy.t_solidus(p.conc);
                    if t_star > t_sol {
                        eta = alloy.eta_mushy(gliq);
                    } else {
                        t_star = t_sol;
                        eta = alloy.eta(p.conc);
                    }
                } else {
                    eta = alloy.eta(p.conc);
                }
                temp = Some(t_star);
            }
            Mushy => {
                let t_sol = alloy.t_solidus(p.conc);
                let (dgldt, dgldc) = alloy.dgl_mushy(p.temp_pre, p.conc_pre);
                let dtemp = p.temp - p.temp_pre;
                let dh = cp0 * dtemp + l * (dgldc * (p.conc - p.conc_pre) + dgldt * dtemp);

                if p.conc < alloy.cs1 {
                    // The solidus line is crossed before the eutectic plateau
                    let c_star = p.conc_pre + (dh - cp0 * dtemp - dgldt * (t_sol - p.temp_pre)) / (l * dgldc);
                    gliq = clamp_unit(p.gliq_pre + dgldt * dtemp + dgldc * (c_star - p.conc_pre));
                    if gliq > 0.0 {
                        eta = alloy.eta_mushy(gliq);
                        temp = Some(t_sol + SOLIDUS_SHIFT);
                    } else {
                        eta = alloy.eta(p.conc);
                    }
                } else {
                    let c_star = p.conc
                        + (dh
                            - cp0 * (t_sol - p.temp_pre)
                            - l * (dgldc * (p.conc - p.conc_pre) + dgldt * (t_sol - p.temp_pre)))
                            / (l * alloy.dgldc_eut);
                    if !on_eutectic_plateau(alloy, c_star) {
                        gliq = 0.0;
                        eta = alloy.eta(p.conc);
                    } else {
                        gliq = clamp_unit(
                            p.gliq_pre
                                + dgldc * (p.conc - p.conc_pre)
                                + dgldt * (t_sol - p.temp_pre)
                                + alloy.dgldc_eut * (c_star - p.conc),
                        );
                        if gliq > 0.0 {
                            temp = Some(t_sol);
                        }
                        eta = alloy.eta(c_star);
                    }
                }
            }
            Eutectic => {
                let c_star = eutectic_plateau_concentration(alloy, cp0, p);
                if !on_eutectic_plateau(alloy, c_star) {
                    gliq = 0.0;
                    eta = alloy.eta(p.conc);
                } else {
                    gliq = clamp_unit(p.gliq_pre + alloy.dgldc_eut * (c_star - p.conc_pre));
                    eta = alloy.eta(c_star);
                    if gliq > 0.0 {
                        temp = Some(alloy.t_eut);
                    }
                }
            }
            Solid => {
                gliq = 0.0;
                if p.gliq_pre > 0.0 {
                    eta = alloy.eta(p.conc);
                }
            }
        },

        Mushy => {
            gliq = match state_pre {
                Liquid => {
                    let (t_star, gl) = taylor_from_liquidus(alloy, cp_over_l, p, 0.0);
                    temp = Some(t_star);
                    gl
                }
                Mushy => {
                    let (dgldt, dgldc) = alloy.dgl_mushy(p.temp_pre, p.conc_pre);
                    p.gliq_pre + dgldt * (p.temp - p.temp_pre) + dgldc * (p.conc - p.conc_pre)
                }
                Solid | Eutectic => alloy.gl_mushy(p.temp, p.conc),
            };
            gliq = clamp_unit(gliq);
            eta = alloy.eta_mushy(gliq);
        }

        Liquid => {
            gliq = 1.0;
            eta = 1.0;
        }

        Eutectic => match state_pre {
            Liquid => {
                let (t_star, gl) = taylor_from_liquidus(alloy, cp_over_l, p, 0.0);
                gliq = clamp_unit(gl);
                eta = if t_star > alloy.t_eut_inf {
                    alloy.eta_mushy(gliq)
                } else {
                    alloy.eta(p.conc)
                };
                temp = Some(t_star);
            }
            Mushy => {
                let (dgldt, _) = alloy.dgl_mushy(p.temp_pre, p.conc_pre);
                gliq = clamp_unit(
                    p.gliq_pre + alloy.dgldc_eut * (p.conc - p.conc_pre) + dgldt * (alloy.t_eut - p.temp_pre),
                );
                eta = alloy.eta(p.conc);
            }
            Eutectic | Solid => {
                let c_star = eutectic_plateau_concentration(alloy, cp0, p);
                if !on_eutectic_plateau(alloy, c_star) {
                    gliq = (p.conc - alloy.cs1) * alloy.dgldc_eut;
                    eta = alloy.eta(p.conc);
                } else {
                    gliq = p.gliq_pre + alloy.dgldc_eut * (c_star - p.conc_pre);
                    if gliq > 0.0 {
                        temp = Some(alloy.t_eut);
                    }
                    eta = alloy.eta(c_star);
                }
                gliq = clamp_unit(gliq);
            }
        },
    }

    LiquidFractionUpdate { gliq, eta, temp }
}

/// Thermal terms for the path strategy. `p.conc` is the concentration of the current iterate
/// (after the solute solve) and the state reached at the previous iterate is evaluated from
/// `(p.temp_k, p.conc_k)`.
pub fn thm_path(
    alloy: &BinaryAlloy,
    coefs: &ThermalCoefs,
    p: &CellPoint,
    vol: f64,
    penalized_eutectic: bool,
) -> ThermalUpdate {
    let rho_l_vol = vol * coefs.rho_l_over_dt;
    let state_k = alloy.state(p.temp_k, p.conc_k);
    let dconc = p.conc_pre - p.conc;

    match alloy.state(p.temp_pre, p.conc_pre) {
        Liquid if alloy.is_pure_solvent(p.conc_pre) => ThermalUpdate::default(),
        Liquid => {
            let t_liq = alloy.t_liquidus(p.conc_pre);
            let (dgldt, dgldc) = alloy.dgl_mushy(t_liq, p.conc_pre);
            match state_k {
                Mushy => ThermalUpdate {
                    reaction: dgldt * coefs.rho_l_over_dt,
                    source: rho_l_vol * (dgldt * t_liq + dgldc * dconc),
                },
                Eutectic | Solid => {
                    let t_sol = alloy.t_solidus(p.conc);
                    ThermalUpdate {
                        reaction: 0.0,
                        source: rho_l_vol * (dgldt * (t_liq - t_sol) + dgldc * dconc),
                    }
                }
                Liquid => ThermalUpdate::default(),
            }
        }
        Mushy => {
            let (dgldt, dgldc) = alloy.dgl_mushy(p.temp_pre, p.conc_pre);
            let dgldc = match state_k {
                Solid if p.conc >= alloy.cs1 => alloy.dgldc_eut,
                Eutectic => alloy.dgldc_eut,
                _ => dgldc,
            };
            ThermalUpdate {
                reaction: dgldt * coefs.rho_l_over_dt,
                source: rho_l_vol * (dgldt * p.temp_pre + dgldc * dconc),
            }
        }
        Eutectic => {
            let mut reaction = 0.0;
            let mut source = alloy.dgldc_eut * dconc;
            if penalized_eutectic
                && matches!(state_k, Eutectic | Solid)
                && p.conc > alloy.cs1
                && p.conc < alloy.c_eut
            {
                let (dgldt, _) = alloy.dgl_mushy(p.temp_pre, p.conc_pre);
                reaction = dgldt * coefs.rho_l_over_dt;
                source += dgldt * alloy.t_eut;
            }
            ThermalUpdate {
                reaction,
                source: rho_l_vol * source,
            }
        }
        Solid => ThermalUpdate::default(),
    }
}

