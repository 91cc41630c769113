//! Edge-based vector equations: one circulation DoF per edge.
use crate::assembly::enforcement::{enforce_dirichlet_algebraic, enforce_dirichlet_penalized, enforce_internal_dofs};
use crate::assembly::global::{CsrParAssembler, VectorAccumulator};
use crate::assembly::hodge::{compute_epfd_diagonal, compute_fped_hodge};
use crate::assembly::local::{add_curlcurl_term, add_diagonal_term, add_source_term, CellBuilder, CellSystem, DofFlag};
use crate::cell_mesh::{CellMesh, CellMeshFlags};
use crate::equation::builder::{circulation, EquationBuilder};
use crate::equation::param::{EnforcementAlgorithm, EquationParam, Property, ResidualNormalization};
use crate::error::SetupError;
use crate::mesh::{CdoMesh, CellFlag};
use crate::parallel::Communicator;
use crate::reco::cell_vectors_from_edge_dofs;
use crate::solver::{LinearSolver, SolveInfo};
use crate::time_step::TimeStep;
use log::debug;
use nalgebra::{DVector, Vector3};
use nalgebra_sparse::CsrMatrix;
use std::cell::RefCell;
use std::time::Instant;
use thread_local::ThreadLocal;

/// Scratch data owned by one worker thread and reused for every cell it visits.
#[derive(Debug)]
struct CellScratch {
    cm: CellMesh,
    csys: CellSystem,
    cb: CellBuilder,
}

impl CellScratch {
    fn new(n_max_faces: usize, n_max_edges: usize) -> Self {
        Self {
            cm: CellMesh::default(),
            csys: CellSystem::new(n_max_edges),
            cb: CellBuilder::new(n_max_faces, n_max_edges),
        }
    }
}

/// Global system assembled from all cells, before the linear solve.
#[derive(Debug, Clone)]
pub struct AssembledSystem {
    pub matrix: CsrMatrix<f64>,
    pub rhs: DVector<f64>,
    /// Source term contribution, when the equation has source terms.
    pub source: Option<DVector<f64>>,
    /// Normalization of the residual, reduced over all processes.
    pub normalization: f64,
}

/// Context of an edge-based vector equation.
///
/// Owns the edge DoFs, the reconstructed cell values and one scratch set per worker thread,
/// created on first use and reused by all subsequent solves.
#[derive(Debug)]
pub struct EdgeVectorEquation {
    param: EquationParam,
    builder: EquationBuilder,
    edge_flags: Vec<DofFlag>,
    edge_values: DVector<f64>,
    edge_values_pre: Option<DVector<f64>>,
    cell_values: Vec<Vector3<f64>>,
    cell_values_pre: Vec<Vector3<f64>>,
    source_values: Option<DVector<f64>>,
    /// For each edge, index of its value in the internal enforcement list.
    enforced_ids: Option<Vec<Option<usize>>>,
    assembler: CsrParAssembler,
    n_max_faces: usize,
    n_max_edges: usize,
    scratch: ThreadLocal<RefCell<CellScratch>>,
}

impl EdgeVectorEquation {
    /// Set up the equation on `mesh`.
    ///
    /// Fails on parameters that do not describe an edge-based equation or that request an
    /// enforcement this equation does not implement.
    pub fn new(param: EquationParam, mesh: &CdoMesh) -> eyre::Result<Self> {
        param.check_edge_based(mesh.num_cells())?;
        if let Some(enforcement) = &param.internal_enforcement {
            if let Some(&e) = enforcement.dof_ids.iter().find(|&&e| e >= mesh.num_edges()) {
                return Err(SetupError::InvalidParameter {
                    name: format!("{}.internal_enforcement", param.name),
                    reason: format!("edge {e} does not exist"),
                }
                .into());
            }
        }

        let builder = EquationBuilder::new(&param, mesh)?;
        let edge_flags = builder.face_bc.edge_flags(mesh);
        let assembler = CsrParAssembler::new(mesh.cell_edges().clone(), mesh.num_edges())?;
        let n_edges = mesh.num_edges();
        let n_cells = mesh.num_cells();

        Ok(Self {
            edge_values: DVector::zeros(n_edges),
            edge_values_pre: param.is_unsteady().then(|| DVector::zeros(n_edges)),
            cell_values: vec![Vector3::zeros(); n_cells],
            cell_values_pre: vec![Vector3::zeros(); n_cells],
            source_values: (!param.source_terms.is_empty()).then(|| DVector::zeros(n_edges)),
            enforced_ids: None,
            n_max_faces: mesh.cell_faces().max_count(),
            n_max_edges: mesh.cell_edges().max_count(),
            scratch: ThreadLocal::new(),
            param,
            builder,
            edge_flags,
            assembler,
        })
    }

    pub fn param(&self) -> &EquationParam {
        &self.param
    }

    pub fn builder(&self) -> &EquationBuilder {
        &self.builder
    }

    pub fn edge_flags(&self) -> &[DofFlag] {
        &self.edge_flags
    }

    pub fn assembler(&self) -> &CsrParAssembler {
        &self.assembler
    }

    /// Set the initial values: zero, then the initial conditions in the order they are given,
    /// then the Dirichlet circulations at `t_eval`.
    pub fn init_values(&mut self, mesh: &CdoMesh, t_eval: f64) {
        self.edge_values.fill(0.0);
        for def in &self.param.initial_conditions {
            for e in 0..mesh.num_edges() {
                self.edge_values[e] = circulation(def, t_eval, mesh, e);
            }
        }
        if self.builder.face_bc.has_dirichlet() {
            let circ = self.compute_circulation_bc(mesh, t_eval);
            for (e, flag) in self.edge_flags.iter().enumerate() {
                if flag.contains(DofFlag::DIRICHLET) {
                    self.edge_values[e] = circ[e];
                }
            }
        }
        if let Some(pre) = &mut self.edge_values_pre {
            pre.copy_from(&self.edge_values);
        }
        self.cell_values = cell_vectors_from_edge_dofs(mesh, self.edge_values.as_slice());
        self.cell_values_pre.clone_from(&self.cell_values);
    }

    /// Circulation of the boundary conditions along each edge at `t_eval` (zero on edges
    /// without a Dirichlet condition).
    pub fn compute_circulation_bc(&self, mesh: &CdoMesh, t_eval: f64) -> Vec<f64> {
        self.builder.face_bc.edge_circulation(&self.param, mesh, t_eval)
    }

    fn build_enforced_ids(&mut self, n_edges: usize) {
        if self.enforced_ids.is_some() || !self.param.has_internal_enforcement() {
            return;
        }
        if let Some(enforcement) = &self.param.internal_enforcement {
            let mut ids = vec![None; n_edges];
            for (k, &e) in enforcement.dof_ids.iter().enumerate() {
                ids[e] = Some(k);
            }
            self.enforced_ids = Some(ids);
        }
    }

    /// Assemble the global system for the time step `ts` without solving it.
    pub fn build_system(&mut self, mesh: &CdoMesh, ts: &TimeStep, comm: &dyn Communicator) -> AssembledSystem {
        let n_edges = mesh.num_edges();
        let t_eval = ts.t_eval();
        let dir_values = self.compute_circulation_bc(mesh, t_eval);
        self.build_enforced_ids(n_edges);

        let param = &self.param;
        let builder = &self.builder;
        let curlcurl_pty = param.curlcurl.as_ref().map(|cc| &cc.property);
        let uniform_curlcurl = uniform_value(curlcurl_pty, builder.curlcurl_pty_uniform);
        let uniform_reaction = uniform_value(param.reaction.as_ref(), builder.reaction_pty_uniform);
        let uniform_time = uniform_value(param.time.as_ref(), builder.time_pty_uniform);
        let internal_values = param
            .internal_enforcement
            .as_ref()
            .map(|enforcement| enforcement.values.as_slice());

        let rhs_acc = VectorAccumulator::new(param.assembly_sync, n_edges);
        let source_acc = (!param.source_terms.is_empty()).then(|| VectorAccumulator::new(param.assembly_sync, n_edges));
        let mut matrix = self.assembler.zero_matrix();

        let cellwise_norm = self.assembler.assemble_into_csr(&mut matrix, |c, mut scatter| {
            let mut scratch = self
                .scratch
                .get_or(|| RefCell::new(CellScratch::new(self.n_max_faces, self.n_max_edges)))
                .borrow_mut();
            let CellScratch { cm, csys, cb } = &mut *scratch;

            let mut flag = builder.msh_flag;
            if mesh.cell_flags()[c].intersects(CellFlag::BOUNDARY_BY_FACE | CellFlag::BOUNDARY_BY_EDGE) {
                flag |= builder.bdy_flag;
            }
            cm.build(c, flag, mesh);
            cb.t_pty_eval = t_eval;
            cb.t_bc_eval = t_eval;
            cb.t_st_eval = t_eval;

            self.init_cell_system(cm, csys, &dir_values);

            if let Some(cc) = &param.curlcurl {
                cb.curlcurl_pty = uniform_curlcurl.unwrap_or_else(|| cc.property.value_in_cell(c));
                compute_fped_hodge(cm, cb.curlcurl_pty, &cc.hodge, &mut cb.hodge_buffer, &mut cb.hodge);
                add_curlcurl_term(cm, cb, csys);
            }
            if let Some(reaction) = &param.reaction {
                let sigma = uniform_reaction.unwrap_or_else(|| reaction.value_in_cell(c));
                compute_epfd_diagonal(cm, sigma, &mut cb.values);
                add_diagonal_term(&cb.values, csys);
            }
            if let Some(time) = &param.time {
                // Implicit Euler with a lumped mass operator
                let rho = uniform_time.unwrap_or_else(|| time.value_in_cell(c));
                compute_epfd_diagonal(cm, rho / ts.dt, &mut cb.values);
                add_diagonal_term(&cb.values, csys);
                for (i, m_i) in cb.values.iter().enumerate() {
                    csys.rhs[i] += m_i * csys.val_n[i];
                }
            }
            for def in &param.source_terms {
                let f = def.evaluate(cb.t_st_eval, &cm.xc);
                cb.values.clear();
                cb.values.extend(cm.dface.iter().map(|df| f.dot(df)));
                add_source_term(&cb.values, csys);
            }

            let rhs_norm = cellwise_rhs_normalization(param.sles.resnorm_type, cm, csys);

            match param.enforcement {
                EnforcementAlgorithm::Penalized => enforce_dirichlet_penalized(csys, param.penalization_coef),
                // Weak algorithms are rejected at setup
                _ => enforce_dirichlet_algebraic(csys),
            }
            if let Some(values) = internal_values {
                enforce_internal_dofs(csys, values);
            }

            scatter.add_local_matrix(&csys.mat);
            rhs_acc.add_local(&csys.dof_ids, csys.rhs.as_slice());
            if let Some(source_acc) = &source_acc {
                source_acc.add_local(&csys.dof_ids, csys.source.as_slice());
            }
            rhs_norm
        });

        let rhs = rhs_acc.into_vector();
        let normalization = sync_rhs_normalization(
            param.sles.resnorm_type,
            cellwise_norm,
            &rhs,
            mesh.total_volume(),
            comm,
        );
        AssembledSystem {
            matrix,
            rhs,
            source: source_acc.map(VectorAccumulator::into_vector),
            normalization,
        }
    }

    fn init_cell_system(&self, cm: &CellMesh, csys: &mut CellSystem, dir_values: &[f64]) {
        csys.reset(cm.c_id, &cm.e_ids);
        for (i, &e) in cm.e_ids.iter().enumerate() {
            csys.val_n[i] = self.edge_values[e];
            let flag = self.edge_flags[e];
            csys.dof_flags[i] = flag;
            if flag.contains(DofFlag::DIRICHLET) {
                csys.dir_values[i] = dir_values[e];
                csys.has_dirichlet = true;
            } else if let Some(k) = self.enforced_ids.as_ref().and_then(|ids| ids[e]) {
                csys.intern_forced_ids[i] = Some(k);
                csys.has_internal_enforcement = true;
            }
        }
    }

    /// Build and solve the system of the time step `ts`, then update the edge values and the
    /// reconstructed cell values.
    ///
    /// With `cur2prev`, the current values are copied to the previous ones before being
    /// overwritten.
    pub fn solve_steady_state(
        &mut self,
        cur2prev: bool,
        mesh: &CdoMesh,
        ts: &TimeStep,
        solver: &mut dyn LinearSolver,
        comm: &dyn Communicator,
    ) -> eyre::Result<SolveInfo> {
        let t0 = Instant::now();
        let system = self.build_system(mesh, ts, comm);
        self.source_values = system.source;
        let t1 = Instant::now();
        self.builder.tcb += t1 - t0;

        if cur2prev {
            if let Some(pre) = &mut self.edge_values_pre {
                pre.copy_from(&self.edge_values);
            }
        }
        let mut x = self.edge_values.clone();
        let info = solver.solve(&system.matrix, &system.rhs, &mut x, system.normalization)?;
        self.edge_values = x;
        let t2 = Instant::now();
        self.builder.tcs += t2 - t1;

        if cur2prev {
            std::mem::swap(&mut self.cell_values_pre, &mut self.cell_values);
        }
        self.cell_values = cell_vectors_from_edge_dofs(mesh, self.edge_values.as_slice());
        self.builder.tce += t2.elapsed();

        if self.param.verbosity > 1 {
            debug!(
                "{}: solved in {} iterations, residual {:.3e}",
                self.param.name, info.iterations, info.residual
            );
        }
        Ok(info)
    }

    /// Copy the current edge and cell values to the previous ones.
    pub fn current_to_previous(&mut self) {
        if let Some(pre) = &mut self.edge_values_pre {
            pre.copy_from(&self.edge_values);
        }
        self.cell_values_pre.clone_from(&self.cell_values);
    }

    /// Edge circulations. Previous values only exist for unsteady equations.
    pub fn edge_values(&self, previous: bool) -> Option<&[f64]> {
        if previous {
            self.edge_values_pre.as_ref().map(|v| v.as_slice())
        } else {
            Some(self.edge_values.as_slice())
        }
    }

    /// Vector field reconstructed at cell centers.
    pub fn cell_values(&self, previous: bool) -> &[Vector3<f64>] {
        if previous {
            &self.cell_values_pre
        } else {
            &self.cell_values
        }
    }

    /// Source term assembled during the last build, if the equation has source terms.
    pub fn source_values(&self) -> Option<&[f64]> {
        self.source_values.as_ref().map(|v| v.as_slice())
    }

    /// Restart data is regenerated from the primary fields; nothing is read.
    pub fn read_restart(&mut self) {}

    /// Restart data is regenerated from the primary fields; nothing is written.
    pub fn write_restart(&self) {}
}

/// Contribution of one cell to the residual normalization, computed before enforcement.
/// Value of a property shared by all cells, evaluated once before the cell loop.
fn uniform_value(property: Option<&Property>, is_uniform: bool) -> Option<f64> {
    property.filter(|_| is_uniform).map(|property| property.value_in_cell(0))
}

fn cellwise_rhs_normalization(resnorm: ResidualNormalization, cm: &CellMesh, csys: &CellSystem) -> f64 {
    match resnorm {
        ResidualNormalization::WeightedRhs => {
            debug_assert!(cm.flag.contains(CellMeshFlags::PEC));
            (0..cm.n_ec())
                .map(|i| cm.pvol_e[i] * csys.rhs[i] * csys.rhs[i])
                .sum()
        }
        ResidualNormalization::FilteredRhs => (0..csys.n_dofs)
            .filter(|&i| !csys.dof_flags[i].contains(DofFlag::DIRICHLET) && csys.intern_forced_ids[i].is_none())
            .map(|i| csys.rhs[i] * csys.rhs[i])
            .sum(),
        ResidualNormalization::None | ResidualNormalization::Norm2Rhs => 0.0,
    }
}

/// Final residual normalization from the reduced cellwise contributions or the assembled
/// right-hand side. Values too small to be meaningful fall back to 1.
fn sync_rhs_normalization(
    resnorm: ResidualNormalization,
    cellwise: f64,
    rhs: &DVector<f64>,
    total_volume: f64,
    comm: &dyn Communicator,
) -> f64 {
    let normalization = match resnorm {
        ResidualNormalization::None => 1.0,
        ResidualNormalization::Norm2Rhs => comm.sum(rhs.norm_squared()).sqrt(),
        ResidualNormalization::WeightedRhs => (comm.sum(cellwise) / total_volume).sqrt(),
        ResidualNormalization::FilteredRhs => comm.sum(cellwise).sqrt(),
    };
    if normalization < f64::from(f32::MIN_POSITIVE) {
        1.0
    } else {
        normalization
    }
}
