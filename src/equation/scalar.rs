//! Cell-centered scalar equations.
//!
//! Used for the temperature and the bulk concentration in the solidification coupling. The
//! diffusion term uses a two-point flux approximation with harmonic averaging of the property
//! across faces; unsteady terms use the implicit Euler scheme.
use crate::equation::param::{BoundaryZone, Property, ResidualNormalization, SlesParam};
use crate::error::SetupError;
use crate::mesh::CdoMesh;
use crate::parallel::Communicator;
use crate::solver::{LinearSolver, SolveInfo};
use crate::time_step::TimeStep;
use log::debug;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Prescribed value on a set of boundary faces. Other boundary faces carry a homogeneous
/// Neumann condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarDirichlet {
    pub zone: BoundaryZone,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalarEquationParam {
    pub name: String,
    pub diffusion: Option<Property>,
    /// Coefficient of the time derivative.
    pub time: Option<Property>,
    /// Reaction coefficient, per unit volume.
    pub reaction: Option<Property>,
    /// Source, per unit volume.
    pub source: Option<Property>,
    pub dirichlet: Vec<ScalarDirichlet>,
    pub initial_value: f64,
    pub sles: SlesParam,
    pub verbosity: i32,
}

impl Default for ScalarEquationParam {
    fn default() -> Self {
        Self {
            name: String::from("scalar"),
            diffusion: None,
            time: None,
            reaction: None,
            source: None,
            dirichlet: Vec::new(),
            initial_value: 0.0,
            sles: SlesParam::default(),
            verbosity: 0,
        }
    }
}

/// Cellwise arrays added to an equation by a coupled module for one solve.
#[derive(Debug, Copy, Clone, Default)]
pub struct ExtraTerms<'a> {
    /// Diffusion property per cell, replacing the one of the equation parameters.
    pub diffusion: Option<&'a [f64]>,
    /// Reaction coefficient per cell and per unit volume.
    pub reaction: Option<&'a [f64]>,
    /// Source per cell, already integrated over the cell.
    pub source: Option<&'a [f64]>,
    /// Cell values `w` whose explicit diffusion `K w` is added to the right-hand side, `K`
    /// being the diffusion operator of the equation.
    pub diffusion_source: Option<&'a [f64]>,
}

/// A scalar equation solved once per call, as seen by coupled modules.
pub trait ScalarEquation {
    fn name(&self) -> &str;

    /// Build and solve the system of the time step. With `cur2prev`, the current values are
    /// first copied to the previous ones.
    fn solve(
        &mut self,
        cur2prev: bool,
        mesh: &CdoMesh,
        ts: &TimeStep,
        extra: &ExtraTerms,
        solver: &mut dyn LinearSolver,
        comm: &dyn Communicator,
    ) -> eyre::Result<SolveInfo>;

    fn current_to_previous(&mut self);

    fn values(&self) -> &[f64];

    fn values_mut(&mut self) -> &mut [f64];

    fn previous_values(&self) -> &[f64];
}

/// Scalar equation with one DoF per cell.
#[derive(Debug, Clone)]
pub struct CellScalarEquation {
    param: ScalarEquationParam,
    /// Prescribed value of each Dirichlet boundary face.
    face_values: Vec<Option<f64>>,
    values: Vec<f64>,
    values_pre: Vec<f64>,
}

impl CellScalarEquation {
    pub fn new(param: ScalarEquationParam, mesh: &CdoMesh) -> eyre::Result<Self> {
        let properties = [
            ("diffusion", &param.diffusion),
            ("time", &param.time),
            ("reaction", &param.reaction),
            ("source", &param.source),
        ];
        for (term, property) in properties {
            if let Some(property) = property {
                property.check_len(format!("{}.{term}", param.name), mesh.num_cells())?;
            }
        }

        let mut face_values = vec![None; mesh.num_faces()];
        for (i, bc) in param.dirichlet.iter().enumerate() {
            let faces = match &bc.zone {
                BoundaryZone::All => mesh.boundary_faces(),
                BoundaryZone::Faces(faces) => faces.clone(),
            };
            for f in faces {
                if f >= mesh.num_faces() || !mesh.is_boundary_face(f) {
                    return Err(SetupError::InvalidParameter {
                        name: format!("{}.dirichlet[{i}]", param.name),
                        reason: format!("face {f} is not a boundary face"),
                    }
                    .into());
                }
                face_values[f] = Some(bc.value);
            }
        }
        let values = vec![param.initial_value; mesh.num_cells()];
        Ok(Self {
            face_values,
            values_pre: values.clone(),
            values,
            param,
        })
    }

    pub fn param(&self) -> &ScalarEquationParam {
        &self.param
    }

    /// Transmissibility of each face and the cells it connects (the second cell is absent on
    /// boundary faces).
    fn transmissibilities(&self, mesh: &CdoMesh, kappa: &[f64]) -> Vec<(f64, usize, Option<usize>)> {
        (0..mesh.num_faces())
            .into_par_iter()
            .with_min_len(64)
            .map(|f| {
                let cells = mesh.face_cells().ids(f);
                let x_f = mesh.face_centers()[f];
                let area = mesh.face_vectors()[f].norm();
                let resistance = |c: usize| (x_f - mesh.cell_centers()[c]).norm() / kappa[c];
                match cells {
                    &[a, b] => (area / (resistance(a) + resistance(b)), a, Some(b)),
                    &[a] => (area / resistance(a), a, None),
                    _ => (0.0, 0, None),
                }
            })
            .collect()
    }

    fn assemble(&self, mesh: &CdoMesh, ts: &TimeStep, extra: &ExtraTerms) -> (CsrMatrix<f64>, DVector<f64>) {
        let n_cells = mesh.num_cells();
        let vol = mesh.cell_volumes();
        let mut coo = CooMatrix::new(n_cells, n_cells);

        // Cellwise terms
        let (mut diagonal, mut rhs): (Vec<f64>, Vec<f64>) = (0..n_cells)
            .into_par_iter()
            .map(|c| {
                let mut diag = 0.0;
                let mut rhs = 0.0;
                if let Some(time) = &self.param.time {
                    let m = time.value_in_cell(c) * vol[c] / ts.dt;
                    diag += m;
                    rhs += m * self.values_pre[c];
                }
                if let Some(reaction) = &self.param.reaction {
                    diag += reaction.value_in_cell(c) * vol[c];
                }
                if let Some(reaction) = extra.reaction {
                    diag += reaction[c] * vol[c];
                }
                if let Some(source) = &self.param.source {
                    rhs += source.value_in_cell(c) * vol[c];
                }
                if let Some(source) = extra.source {
                    rhs += source[c];
                }
                (diag, rhs)
            })
            .unzip();

        let kappa: Option<Vec<f64>> = match (extra.diffusion, &self.param.diffusion) {
            (Some(values), _) => Some(values.to_vec()),
            (None, Some(property)) => Some((0..n_cells).map(|c| property.value_in_cell(c)).collect()),
            (None, None) => None,
        };
        if let Some(kappa) = kappa {
            for (f, (t, a, b)) in self.transmissibilities(mesh, &kappa).into_iter().enumerate() {
                match b {
                    Some(b) => {
                        diagonal[a] += t;
                        diagonal[b] += t;
                        coo.push(a, b, -t);
                        coo.push(b, a, -t);
                        if let Some(w) = extra.diffusion_source {
                            let flux = t * (w[a] - w[b]);
                            rhs[a] += flux;
                            rhs[b] -= flux;
                        }
                    }
                    None => {
                        if let Some(value) = self.face_values[f] {
                            diagonal[a] += t;
                            rhs[a] += t * value;
                        }
                    }
                }
            }
        }
        for (c, d) in diagonal.into_iter().enumerate() {
            coo.push(c, c, d);
        }

        (CsrMatrix::from(&coo), DVector::from_vec(rhs))
    }
}

impl ScalarEquation for CellScalarEquation {
    fn name(&self) -> &str {
        &self.param.name
    }

    fn solve(
        &mut self,
        cur2prev: bool,
        mesh: &CdoMesh,
        ts: &TimeStep,
        extra: &ExtraTerms,
        solver: &mut dyn LinearSolver,
        comm: &dyn Communicator,
    ) -> eyre::Result<SolveInfo> {
        if cur2prev {
            self.current_to_previous();
        }
        let (matrix, rhs) = self.assemble(mesh, ts, extra);
        let normalization = match self.param.sles.resnorm_type {
            ResidualNormalization::None => 1.0,
            _ => comm.sum(rhs.norm_squared()).sqrt().max(f64::from(f32::MIN_POSITIVE)),
        };
        let mut x = DVector::from_column_slice(&self.values);
        let info = solver.solve(&matrix, &rhs, &mut x, normalization)?;
        self.values.copy_from_slice(x.as_slice());
        if self.param.verbosity > 1 {
            debug!("{}: {} iterations, residual {:.3e}", self.param.name, info.iterations, info.residual);
        }
        Ok(info)
    }

    fn current_to_previous(&mut self) {
        self.values_pre.copy_from_slice(&self.values);
    }

    fn values(&self) -> &[f64] {
        &self.values
    }

    fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    fn previous_values(&self) -> &[f64] {
        &self.values_pre
    }
}
