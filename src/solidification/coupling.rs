use crate::equation::scalar::{ExtraTerms, ScalarEquation};
use crate::error::SetupError;
use crate::mesh::CdoMesh;
use crate::parallel::Communicator;
use crate::solidification::alloy::BinaryAlloy;
use crate::solidification::state::{CellField, SolidificationState, StateCounts};
use crate::solidification::strategy::{self, CellPoint, LiquidFractionUpdate, Relaxation, ThermalCoefs, ThermalUpdate};
use crate::solidification::voller::{VollerCellUpdate, VollerModel};
use crate::solidification::{SolidificationModel, SolidificationParam, Strategy};
use crate::solver::LinearSolver;
use crate::time_step::TimeStep;
use itertools::izip;
use log::{debug, info, warn};
use nalgebra::Vector3;
use rayon::prelude::*;

/// Constant of the Carman-Kozeny relation.
pub const CARMAN_KOZENY_COEF: f64 = 180.0;

/// Lower bound of the solute diffusion property.
pub const DIFFUSION_EPS: f64 = 1e-16;

/// Liquidus temperature reported in permanent solid cells.
pub const PERMANENT_SOLID_LIQUIDUS: f64 = -999.99;

/// Fields of the binary alloy model.
#[derive(Debug, Clone)]
pub struct AlloyFields {
    pub alloy: BinaryAlloy,
    /// Ratio between the liquid and the bulk concentrations.
    pub eta: Vec<f64>,
    /// Concentration of the liquid phase.
    pub c_l: Vec<f64>,
    /// Temperature of the previous nonlinear iterate.
    pub tk: Vec<f64>,
    /// Bulk concentration of the previous nonlinear iterate.
    pub ck: Vec<f64>,
    /// Temperature extrapolated from the two previous time steps.
    pub tx: Option<Vec<f64>>,
    pub cx: Option<Vec<f64>>,
    /// Diffusion property of the solute equation. Absent when the solute does not diffuse.
    pub diffusion: Option<Vec<f64>>,
    /// `rho0 D`
    pub diff_coef: f64,
    pub n_iter: usize,
}

#[derive(Debug, Clone)]
enum ModelContext {
    Voller(VollerModel),
    BinaryAlloy(Box<AlloyFields>),
}

/// Outcome of the nonlinear coupling over one time step.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CouplingInfo {
    pub n_iter: usize,
    pub delta_temp: f64,
    pub delta_conc: f64,
    pub converged: bool,
}

/// Global indicators of the solidification process.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SolidificationMetrics {
    /// Volume ratio of each state, in percent, indexed by [`SolidificationState::index`].
    pub state_ratio: [f64; 4],
    /// Volume fraction of solid.
    pub solidification_rate: f64,
    /// Standard deviation of the relative concentration from the reference one.
    pub segregation_index: Option<f64>,
}

/// Per-cell deviation from equilibrium in the binary alloy model.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvancedAnalysis {
    /// `C_l - C`
    pub cliq_minus_cbulk: Vec<f64>,
    /// `T - T_liquidus(C)`
    pub tbulk_minus_tliq: Vec<f64>,
}

/// Borrowed fields of one nonlinear iterate.
struct IterateView<'a> {
    temp: &'a [f64],
    conc: &'a [f64],
    temp_pre: &'a [f64],
    conc_pre: &'a [f64],
    g_l: &'a CellField,
    tk: &'a [f64],
    ck: &'a [f64],
    eta: &'a [f64],
}

impl IterateView<'_> {
    fn point(&self, c: usize) -> CellPoint {
        CellPoint {
            temp: self.temp[c],
            conc: self.conc[c],
            temp_pre: self.temp_pre[c],
            conc_pre: self.conc_pre[c],
            gliq_pre: self.g_l.val_pre[c],
            temp_k: self.tk[c],
            conc_k: self.ck[c],
            gliq_k: self.g_l.val[c],
            eta_k: self.eta[c],
        }
    }
}

/// Maximal absolute difference and the cell where it is reached.
fn max_abs_diff(a: &[f64], b: &[f64]) -> (f64, usize) {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .enumerate()
        .fold((0.0, 0), |(max, i_max), (i, d)| if d > max { (d, i) } else { (max, i_max) })
}

fn extrapolate(cur: &[f64], pre: &[f64]) -> Vec<f64> {
    cur.iter().zip(pre).map(|(c, p)| 2.0 * c - p).collect()
}

/// State of the solidification module and of its coupling with the thermal and solute equations.
///
/// The thermal and solute equations are owned by the caller and passed to
/// [`compute`](Self::compute) at each time step. The reaction and source arrays built for the
/// thermal equation, the momentum forcing and the list of solid cells are exposed for the other
/// modules.
#[derive(Debug, Clone)]
pub struct Solidification {
    param: SolidificationParam,
    model: ModelContext,
    permanent_solid: Vec<bool>,
    g_l: CellField,
    cell_state: Vec<SolidificationState>,
    counts: StateCounts,
    thermal_reaction: Vec<f64>,
    thermal_source: Vec<f64>,
    forcing: Vec<f64>,
    /// `180 mu / s_das^2`
    forcing_coef: f64,
    solid_cells: Vec<usize>,
}

impl Solidification {
    pub fn new(param: SolidificationParam, mesh: &CdoMesh) -> eyre::Result<Self> {
        param.check()?;
        let n_cells = mesh.num_cells();

        let mut permanent_solid = vec![false; n_cells];
        for &c in &param.permanent_solid_cells {
            if c >= n_cells {
                return Err(SetupError::InvalidParameter {
                    name: String::from("permanent_solid_cells"),
                    reason: format!("cell {c} does not exist"),
                }
                .into());
            }
            permanent_solid[c] = true;
        }

        let model = match &param.model {
            SolidificationModel::Voller(voller) => ModelContext::Voller(VollerModel::new(voller.clone())?),
            SolidificationModel::BinaryAlloy(alloy_param) => {
                let diff_coef = param.rho0 * alloy_param.solute_diffusivity;
                ModelContext::BinaryAlloy(Box::new(AlloyFields {
                    alloy: BinaryAlloy::new(alloy_param)?,
                    eta: vec![1.0; n_cells],
                    c_l: vec![0.0; n_cells],
                    tk: vec![0.0; n_cells],
                    ck: vec![0.0; n_cells],
                    tx: None,
                    cx: None,
                    diffusion: (diff_coef > DIFFUSION_EPS).then(|| vec![diff_coef; n_cells]),
                    diff_coef,
                    n_iter: 0,
                }))
            }
        };

        let mut g_l = CellField::new(n_cells, 1.0);
        let mut cell_state = vec![SolidificationState::Liquid; n_cells];
        for c in (0..n_cells).filter(|&c| permanent_solid[c]) {
            g_l.val[c] = 0.0;
            g_l.val_pre[c] = 0.0;
            cell_state[c] = SolidificationState::Solid;
        }

        let s_das = param.model.s_das();
        Ok(Self {
            forcing_coef: CARMAN_KOZENY_COEF / (s_das * s_das) * param.viscosity,
            counts: StateCounts::from_states(&cell_state),
            param,
            model,
            permanent_solid,
            g_l,
            cell_state,
            thermal_reaction: vec![0.0; n_cells],
            thermal_source: vec![0.0; n_cells],
            forcing: vec![0.0; n_cells],
            solid_cells: Vec::new(),
        })
    }

    pub fn param(&self) -> &SolidificationParam {
        &self.param
    }

    pub fn is_binary_alloy(&self) -> bool {
        matches!(self.model, ModelContext::BinaryAlloy(_))
    }

    pub fn alloy_fields(&self) -> Option<&AlloyFields> {
        match &self.model {
            ModelContext::BinaryAlloy(fields) => Some(fields.as_ref()),
            ModelContext::Voller(_) => None,
        }
    }

    /// Set the initial fields from the initial temperature and concentration.
    ///
    /// The solute equation is required by the binary alloy model and ignored otherwise.
    pub fn initialize(
        &mut self,
        mesh: &CdoMesh,
        ts: &TimeStep,
        thermal: &dyn ScalarEquation,
        solute: Option<&dyn ScalarEquation>,
        comm: &dyn Communicator,
    ) -> eyre::Result<()> {
        if !self.is_binary_alloy() {
            self.update_voller(mesh, ts, thermal.values(), comm);
            return Ok(());
        }
        let ModelContext::BinaryAlloy(fields) = &mut self.model else {
            unreachable!("checked above")
        };
        let solute = solute.ok_or(SetupError::MissingEquation { name: "solute" })?;
        fields.c_l.copy_from_slice(solute.values());
        fields.tk.copy_from_slice(thermal.values());
        fields.ck.copy_from_slice(solute.values());
        fields.eta.fill(1.0);
        let diff_coef = fields.diff_coef;
        if let Some(diffusion) = &mut fields.diffusion {
            diffusion.fill(diff_coef);
        }
        Ok(())
    }

    /// Advance the coupled system by one time step.
    pub fn compute(
        &mut self,
        mesh: &CdoMesh,
        ts: &TimeStep,
        thermal: &mut dyn ScalarEquation,
        solute: Option<&mut dyn ScalarEquation>,
        solver: &mut dyn LinearSolver,
        comm: &dyn Communicator,
    ) -> eyre::Result<CouplingInfo> {
        let info = if self.is_binary_alloy() {
            let solute = solute.ok_or(SetupError::MissingEquation { name: "solute" })?;
            self.binary_coupling(mesh, ts, thermal, solute, solver, comm)?
        } else {
            let extra = ExtraTerms {
                reaction: Some(&self.thermal_reaction),
                source: Some(&self.thermal_source),
                ..Default::default()
            };
            thermal.solve(true, mesh, ts, &extra, solver, comm)?;
            self.g_l.current_to_previous();
            self.update_voller(mesh, ts, thermal.values(), comm);
            CouplingInfo {
                n_iter: 1,
                delta_temp: 0.0,
                delta_conc: 0.0,
                converged: true,
            }
        };

        if self.param.verbosity > 0 {
            self.monitor(mesh, comm);
        }
        Ok(info)
    }

    fn update_voller(&mut self, mesh: &CdoMesh, ts: &TimeStep, temp: &[f64], comm: &dyn Communicator) {
        let ModelContext::Voller(voller) = &self.model else {
            return;
        };
        let vol = mesh.cell_volumes();
        let reaction_coef = self.param.rho0 * voller.param().latent_heat * voller.dgldt() / ts.dt;
        let forcing_coef = self.forcing_coef;
        let eps = self.param.forcing_eps;
        let permanent_solid = &self.permanent_solid;

        let updates: Vec<VollerCellUpdate> = (0..temp.len())
            .into_par_iter()
            .with_min_len(256)
            .map(|c| {
                if permanent_solid[c] {
                    VollerCellUpdate {
                        state: SolidificationState::Solid,
                        gliq: 0.0,
                        reaction: 0.0,
                        source: 0.0,
                        forcing: forcing_coef / eps,
                    }
                } else {
                    voller.update_cell(temp[c], vol[c], reaction_coef, forcing_coef, eps)
                }
            })
            .collect();

        for (c, update) in updates.into_iter().enumerate() {
            self.g_l.val[c] = update.gliq;
            self.thermal_reaction[c] = update.reaction;
            self.thermal_source[c] = update.source;
            self.cell_state[c] = update.state;
            self.forcing[c] = update.forcing;
        }
        self.reduce_counts(comm);
    }

    fn binary_coupling(
        &mut self,
        mesh: &CdoMesh,
        ts: &TimeStep,
        thermal: &mut dyn ScalarEquation,
        solute: &mut dyn ScalarEquation,
        solver: &mut dyn LinearSolver,
        comm: &dyn Communicator,
    ) -> eyre::Result<CouplingInfo> {
        let ModelContext::BinaryAlloy(fields) = &mut self.model else {
            unreachable!("binary coupling requires the binary alloy model")
        };
        let param = &self.param;
        let seg = &param.segregation;
        let alloy = fields.alloy;
        let vol = mesh.cell_volumes();
        let permanent_solid = &self.permanent_solid;

        if param.use_extrapolation {
            fields.tx = Some(extrapolate(thermal.values(), thermal.previous_values()));
            fields.cx = Some(extrapolate(solute.values(), solute.previous_values()));
        }
        solute.current_to_previous();
        thermal.current_to_previous();
        self.g_l.current_to_previous();
        fields.tk.copy_from_slice(thermal.values());
        fields.ck.copy_from_slice(solute.values());

        let coefs = ThermalCoefs {
            rho_l_over_dt: param.rho0 * alloy.latent_heat / ts.dt,
            cp_over_l: param.cp0 / alloy.latent_heat,
        };
        let relax = Relaxation {
            gliq: seg.gliq_relax,
            eta: seg.eta_relax,
        };
        let tol = seg.tolerance;
        let mut delta_temp = 1.0 + tol;
        let mut delta_conc = 1.0 + tol;
        let mut n_iter = 0;

        while (delta_temp > tol || delta_conc > tol) && n_iter < seg.n_iter_max {
            // Solute transport
            let diffusion_source: Option<Vec<f64>> = param.solute_source_term.then(|| {
                izip!(solute.previous_values(), &fields.c_l, permanent_solid)
                    .map(|(conc, c_l, &solid)| if solid { 0.0 } else { (conc - c_l).min(0.0) })
                    .collect()
            });
            let extra = ExtraTerms {
                diffusion: fields.diffusion.as_deref(),
                diffusion_source: diffusion_source.as_deref(),
                ..Default::default()
            };
            solute.solve(false, mesh, ts, &extra, solver, comm)?;

            // Thermal terms, built from the previous iterate
            let thermal_updates: Vec<Option<ThermalUpdate>> = {
                let view = IterateView {
                    temp: thermal.values(),
                    conc: solute.values(),
                    temp_pre: thermal.previous_values(),
                    conc_pre: solute.previous_values(),
                    g_l: &self.g_l,
                    tk: &fields.tk,
                    ck: &fields.ck,
                    eta: &fields.eta,
                };
                (0..vol.len())
                    .into_par_iter()
                    .with_min_len(256)
                    .map(|c| {
                        (!permanent_solid[c]).then(|| {
                            let p = view.point(c);
                            match seg.strategy {
                                Strategy::Legacy => strategy::thm_legacy(&alloy, &coefs, &p, vol[c]),
                                Strategy::Taylor => strategy::thm_taylor(&alloy, &coefs, &p, vol[c]),
                                Strategy::Path => {
                                    strategy::thm_path(&alloy, &coefs, &p, vol[c], param.penalized_eutectic)
                                }
                            }
                        })
                    })
                    .collect()
            };
            for (c, update) in thermal_updates.into_iter().enumerate() {
                if let Some(update) = update {
                    self.thermal_reaction[c] = update.reaction;
                    self.thermal_source[c] = update.source;
                }
            }

            let extra = ExtraTerms {
                reaction: Some(&self.thermal_reaction),
                source: Some(&self.thermal_source),
                ..Default::default()
            };
            thermal.solve(false, mesh, ts, &extra, solver, comm)?;

            // Liquid fraction
            let gl_updates: Vec<Option<(LiquidFractionUpdate, Option<f64>)>> = {
                let view = IterateView {
                    temp: thermal.values(),
                    conc: solute.values(),
                    temp_pre: thermal.previous_values(),
                    conc_pre: solute.previous_values(),
                    g_l: &self.g_l,
                    tk: &fields.tk,
                    ck: &fields.ck,
                    eta: &fields.eta,
                };
                let c_l = &fields.c_l;
                (0..vol.len())
                    .into_par_iter()
                    .with_min_len(256)
                    .map(|c| {
                        (!permanent_solid[c]).then(|| {
                            let p = view.point(c);
                            let (update, c_l) = match seg.strategy {
                                Strategy::Legacy if param.solute_source_term => {
                                    let (update, c_l) = strategy::gl_legacy_with_solute_source(&alloy, &p, c_l[c]);
                                    (update, Some(c_l))
                                }
                                Strategy::Legacy => (strategy::gl_legacy(&alloy, &p), None),
                                Strategy::Taylor => (strategy::gl_taylor(&alloy, coefs.cp_over_l, &p), None),
                                Strategy::Path => (strategy::gl_path(&alloy, param.cp0, &p), None),
                            };
                            (update.relax(&relax, &p), c_l)
                        })
                    })
                    .collect()
            };
            let temp = thermal.values_mut();
            for (c, update) in gl_updates.into_iter().enumerate() {
                if let Some((update, c_l)) = update {
                    self.g_l.val[c] = update.gliq;
                    fields.eta[c] = update.eta;
                    if let Some(t_star) = update.temp {
                        temp[c] = t_star;
                    }
                    if let Some(c_l) = c_l {
                        fields.c_l[c] = c_l;
                    }
                }
            }

            let diff_coef = fields.diff_coef;
            if let Some(diffusion) = &mut fields.diffusion {
                for (d, &gliq) in diffusion.iter_mut().zip(&self.g_l.val) {
                    *d = if gliq > 0.0 { diff_coef * gliq } else { DIFFUSION_EPS };
                }
            }

            // Convergence
            let (dtemp, cell_temp) = max_abs_diff(thermal.values(), &fields.tk);
            let (dconc, cell_conc) = max_abs_diff(solute.values(), &fields.ck);
            fields.tk.copy_from_slice(thermal.values());
            fields.ck.copy_from_slice(solute.values());
            delta_temp = comm.max(dtemp);
            delta_conc = comm.max(dconc);
            n_iter += 1;

            if param.verbosity > 0 {
                info!(
                    "solidification: iter {:2} | delta_temp {:.3e} | delta_conc {:.3e}",
                    n_iter, delta_temp, delta_conc
                );
                if param.verbosity > 1 {
                    debug!("solidification: max delta_temp in cell {cell_temp}, max delta_conc in cell {cell_conc}");
                }
            }
        }

        let converged = delta_temp <= tol && delta_conc <= tol;
        if !converged && param.verbosity > 0 {
            warn!(
                "solidification: no convergence after {} iterations (delta_temp {:.3e}, delta_conc {:.3e})",
                n_iter, delta_temp, delta_conc
            );
        }
        fields.n_iter = n_iter;

        // Liquid concentration
        let temp = thermal.values();
        let conc = solute.values();
        for c in 0..vol.len() {
            fields.c_l[c] = if permanent_solid[c] {
                0.0
            } else {
                let state = alloy.state(temp[c], conc[c]);
                alloy.liquid_concentration(state, temp[c], conc[c], self.g_l.val_pre[c], fields.c_l[c])
            };
        }

        // Final state of each cell
        let g_l = &self.g_l.val;
        let cp0 = param.cp0;
        self.cell_state
            .par_iter_mut()
            .with_min_len(256)
            .enumerate()
            .for_each(|(c, state)| {
                *state = if permanent_solid[c] {
                    SolidificationState::Solid
                } else {
                    alloy.state_by_enthalpy(cp0, temp[c], conc[c], g_l[c])
                };
            });

        self.reduce_counts(comm);
        self.update_forcing();

        Ok(CouplingInfo {
            n_iter,
            delta_temp,
            delta_conc,
            converged,
        })
    }

    fn reduce_counts(&mut self, comm: &dyn Communicator) {
        self.counts = StateCounts::from_states(&self.cell_state);
        comm.sum_counts_in_place(self.counts.as_mut_slice());

        self.solid_cells.clear();
        if self.counts.get(SolidificationState::Solid) > 0 {
            self.solid_cells.extend(
                self.cell_state
                    .iter()
                    .enumerate()
                    .filter(|&(_, &state)| state == SolidificationState::Solid)
                    .map(|(c, _)| c),
            );
        }
    }

    /// Carman-Kozeny penalization of the velocity from the liquid fraction.
    fn update_forcing(&mut self) {
        let coef = self.forcing_coef;
        let eps = self.param.forcing_eps;
        self.forcing
            .par_iter_mut()
            .zip(&self.g_l.val)
            .for_each(|(forcing, &gliq)| {
                *forcing = if gliq < 1.0 {
                    let glc = 1.0 - gliq;
                    coef * glc * glc / (gliq * gliq * gliq + eps)
                } else {
                    0.0
                };
            });
    }

    /// Volume ratio of each state in percent.
    pub fn state_ratio(&self, mesh: &CdoMesh, comm: &dyn Communicator) -> [f64; 4] {
        let mut volumes = [0.0; 4];
        for (state, vol) in self.cell_state.iter().zip(mesh.cell_volumes()) {
            volumes[state.index()] += vol;
        }
        comm.sum_in_place(&mut volumes);
        let vol_tot = comm.sum(mesh.total_volume());
        volumes.map(|v| 100.0 * v / vol_tot)
    }

    /// Log the state of the computation.
    pub fn monitor(&self, mesh: &CdoMesh, comm: &dyn Communicator) {
        let ratio = self.state_ratio(mesh, comm);
        for state in SolidificationState::ALL {
            info!(
                "solidification: {:>8} {:6.2}% ({} cells)",
                state.name(),
                ratio[state.index()],
                self.counts.get(state)
            );
        }
    }

    /// Global indicators. The segregation index needs the bulk concentration.
    pub fn metrics(&self, mesh: &CdoMesh, conc: Option<&[f64]>, comm: &dyn Communicator) -> SolidificationMetrics {
        let vol = mesh.cell_volumes();
        let vol_tot = comm.sum(mesh.total_volume());
        let permanent_solid = &self.permanent_solid;
        let active = || (0..vol.len()).filter(move |&c| !permanent_solid[c]);

        let solid_volume: f64 = active().map(|c| (1.0 - self.g_l.val[c]) * vol[c]).sum();
        let segregation_index = match (&self.param.model, conc) {
            (SolidificationModel::BinaryAlloy(alloy_param), Some(conc)) => {
                let c0 = alloy_param.ref_concentration;
                let sum: f64 = active()
                    .map(|c| {
                        let rel = (conc[c] - c0) / c0;
                        rel * rel * vol[c]
                    })
                    .sum();
                Some((comm.sum(sum) / vol_tot).sqrt())
            }
            _ => None,
        };

        SolidificationMetrics {
            state_ratio: self.state_ratio(mesh, comm),
            solidification_rate: comm.sum(solid_volume) / vol_tot,
            segregation_index,
        }
    }

    /// Liquidus temperature in each cell for the binary alloy model.
    pub fn liquidus_temperature(&self, conc: &[f64]) -> Option<Vec<f64>> {
        let fields = self.alloy_fields()?;
        Some(
            conc.iter()
                .zip(&self.permanent_solid)
                .map(|(&c, &solid)| {
                    if solid {
                        PERMANENT_SOLID_LIQUIDUS
                    } else {
                        fields.alloy.t_liquidus(c)
                    }
                })
                .collect(),
        )
    }

    pub fn advanced_analysis(&self, temp: &[f64], conc: &[f64]) -> Option<AdvancedAnalysis> {
        let fields = self.alloy_fields()?;
        Some(AdvancedAnalysis {
            cliq_minus_cbulk: fields.c_l.iter().zip(conc).map(|(c_l, c)| c_l - c).collect(),
            tbulk_minus_tliq: temp
                .iter()
                .zip(conc)
                .map(|(&t, &c)| t - fields.alloy.t_liquidus(c))
                .collect(),
        })
    }

    /// Buoyancy source of the momentum equation in each cell.
    pub fn boussinesq_source(&self, temp: &[f64]) -> Vec<Vector3<f64>> {
        let param = &self.param;
        let gravity = Vector3::from(param.gravity);
        let thermal = |c: usize| -param.thermal_dilatation * (temp[c] - param.ref_temperature);
        match (&param.model, self.alloy_fields()) {
            (SolidificationModel::BinaryAlloy(alloy_param), Some(fields)) => (0..temp.len())
                .map(|c| {
                    let solutal = -alloy_param.dilatation_coef * (fields.c_l[c] - alloy_param.ref_concentration);
                    gravity * (param.rho0 * (thermal(c) + solutal))
                })
                .collect(),
            _ => (0..temp.len())
                .map(|c| gravity * (param.rho0 * thermal(c)))
                .collect(),
        }
    }

    pub fn cell_state(&self) -> &[SolidificationState] {
        &self.cell_state
    }

    /// Number of cells in each state, summed over all processes.
    pub fn counts(&self) -> &StateCounts {
        &self.counts
    }

    pub fn liquid_fraction(&self) -> &[f64] {
        &self.g_l.val
    }

    pub fn previous_liquid_fraction(&self) -> &[f64] {
        &self.g_l.val_pre
    }

    pub fn liquid_concentration(&self) -> Option<&[f64]> {
        self.alloy_fields().map(|fields| fields.c_l.as_slice())
    }

    pub fn eta(&self) -> Option<&[f64]> {
        self.alloy_fields().map(|fields| fields.eta.as_slice())
    }

    /// Diffusion property of the solute equation.
    pub fn solute_diffusion(&self) -> Option<&[f64]> {
        self.alloy_fields()?.diffusion.as_deref()
    }

    pub fn extrapolated_temperature(&self) -> Option<&[f64]> {
        self.alloy_fields()?.tx.as_deref()
    }

    pub fn extrapolated_concentration(&self) -> Option<&[f64]> {
        self.alloy_fields()?.cx.as_deref()
    }

    /// Reaction coefficient of the thermal equation, per unit volume.
    pub fn thermal_reaction(&self) -> &[f64] {
        &self.thermal_reaction
    }

    /// Source of the thermal equation, integrated over each cell.
    pub fn thermal_source(&self) -> &[f64] {
        &self.thermal_source
    }

    pub fn forcing(&self) -> &[f64] {
        &self.forcing
    }

    pub fn forcing_coef(&self) -> f64 {
        self.forcing_coef
    }

    /// Local cells in the solid state.
    pub fn solid_cells(&self) -> &[usize] {
        &self.solid_cells
    }

    pub fn is_permanent_solid(&self, c: usize) -> bool {
        self.permanent_solid[c]
    }

    /// Number of nonlinear iterations of the last time step.
    pub fn n_iter(&self) -> usize {
        self.alloy_fields().map_or(1, |fields| fields.n_iter)
    }

    /// Restart files are not supported: nothing is read.
    pub fn read_restart(&mut self) -> eyre::Result<()> {
        Ok(())
    }

    /// Restart files are not supported: nothing is written.
    pub fn write_restart(&self) -> eyre::Result<()> {
        Ok(())
    }
}
