//! Bookkeeping shared by the cellwise builds of an equation.
use crate::assembly::local::DofFlag;
use crate::cell_mesh::CellMeshFlags;
use crate::equation::param::{BoundaryConditionKind, BoundaryZone, EquationParam, ResidualNormalization, ValueDef};
use crate::error::SetupError;
use crate::mesh::CdoMesh;
use log::info;
use std::time::Duration;

/// Classification of the boundary faces of a mesh with respect to the boundary conditions of
/// an equation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceBoundaryConditions {
    /// [`DofFlag::NONE`] for interior faces.
    flags: Vec<DofFlag>,
    /// Index of the boundary condition definition attached to each face, if any.
    def_ids: Vec<Option<usize>>,
}

impl FaceBoundaryConditions {
    /// Boundary faces without a condition are homogeneous Neumann faces. When zones overlap,
    /// the last definition wins.
    pub fn new(param: &EquationParam, mesh: &CdoMesh) -> Result<Self, SetupError> {
        let n_faces = mesh.num_faces();
        let mut flags: Vec<DofFlag> = (0..n_faces)
            .map(|f| {
                if mesh.is_boundary_face(f) {
                    DofFlag::NEUMANN
                } else {
                    DofFlag::NONE
                }
            })
            .collect();
        let mut def_ids = vec![None; n_faces];

        for (def_id, bc) in param.boundary_conditions.iter().enumerate() {
            let faces = match &bc.zone {
                BoundaryZone::All => mesh.boundary_faces(),
                BoundaryZone::Faces(faces) => {
                    if let Some(&f) = faces.iter().find(|&&f| f >= n_faces || !mesh.is_boundary_face(f)) {
                        return Err(SetupError::InvalidParameter {
                            name: format!("{}.boundary_conditions[{def_id}]", param.name),
                            reason: format!("face {f} is not a boundary face"),
                        });
                    }
                    faces.clone()
                }
            };
            for f in faces {
                match bc.kind {
                    BoundaryConditionKind::HomogeneousNeumann => {
                        flags[f] = DofFlag::NEUMANN;
                        def_ids[f] = None;
                    }
                    BoundaryConditionKind::Dirichlet(_) => {
                        flags[f] = DofFlag::DIRICHLET;
                        def_ids[f] = Some(def_id);
                    }
                }
            }
        }

        Ok(Self { flags, def_ids })
    }

    pub fn flag(&self, f: usize) -> DofFlag {
        self.flags[f]
    }

    pub fn def_id(&self, f: usize) -> Option<usize> {
        self.def_ids[f]
    }

    pub fn has_dirichlet(&self) -> bool {
        self.def_ids.iter().any(Option::is_some)
    }

    /// Dirichlet faces with their boundary condition definition index.
    pub fn dirichlet_faces(&self) -> impl '_ + Iterator<Item = (usize, usize)> {
        self.def_ids
            .iter()
            .enumerate()
            .filter_map(|(f, def_id)| def_id.map(|def_id| (f, def_id)))
    }

    /// Flags of the edges: an edge of a Dirichlet face is Dirichlet, any other boundary edge is
    /// Neumann.
    pub fn edge_flags(&self, mesh: &CdoMesh) -> Vec<DofFlag> {
        let mut edge_flags = vec![DofFlag::NONE; mesh.num_edges()];
        for f in (0..mesh.num_faces()).filter(|&f| mesh.is_boundary_face(f)) {
            for &e in mesh.face_edges().ids(f) {
                edge_flags[e] |= self.flags[f];
            }
        }
        for flag in &mut edge_flags {
            if flag.contains(DofFlag::DIRICHLET) {
                *flag = DofFlag::DIRICHLET;
            }
        }
        edge_flags
    }

    /// Circulation of the Dirichlet boundary values along each boundary edge at time `t_eval`.
    ///
    /// Entries of non-Dirichlet edges are zero.
    pub fn edge_circulation(&self, param: &EquationParam, mesh: &CdoMesh, t_eval: f64) -> Vec<f64> {
        let mut values = vec![0.0; mesh.num_edges()];
        for (f, def_id) in self.dirichlet_faces() {
            if let BoundaryConditionKind::Dirichlet(def) = &param.boundary_conditions[def_id].kind {
                for &e in mesh.face_edges().ids(f) {
                    values[e] = circulation(def, t_eval, mesh, e);
                }
            }
        }
        values
    }
}

/// Circulation `u(x_e) . t_e` of a vector field along edge `e`.
pub fn circulation(def: &ValueDef, t_eval: f64, mesh: &CdoMesh, e: usize) -> f64 {
    def.evaluate(t_eval, &mesh.edge_centers()[e])
        .dot(&mesh.edge_tangents()[e])
}

/// Per-equation data describing what is computed in each cell, with performance timers.
#[derive(Debug, Clone)]
pub struct EquationBuilder {
    /// Cell mesh quantities needed in every cell.
    pub msh_flag: CellMeshFlags,
    /// Additional quantities needed in cells touching the boundary.
    pub bdy_flag: CellMeshFlags,
    pub curlcurl_pty_uniform: bool,
    pub reaction_pty_uniform: bool,
    pub time_pty_uniform: bool,
    pub face_bc: FaceBoundaryConditions,
    /// Time spent building systems.
    pub tcb: Duration,
    /// Time spent solving systems.
    pub tcs: Duration,
    /// Time spent in extra operations (reconstruction, copies).
    pub tce: Duration,
}

impl EquationBuilder {
    pub fn new(param: &EquationParam, mesh: &CdoMesh) -> Result<Self, SetupError> {
        let mut msh_flag = CellMeshFlags::NONE;
        if param.has_curlcurl() {
            msh_flag |= CellMeshFlags::PFQ | CellMeshFlags::DFQ | CellMeshFlags::FE | CellMeshFlags::FES;
        }
        if param.reaction.is_some() || param.is_unsteady() {
            msh_flag |= CellMeshFlags::PEQ | CellMeshFlags::DEQ;
        }
        if !param.source_terms.is_empty() {
            msh_flag |= CellMeshFlags::DEQ;
        }
        if param.sles.resnorm_type == ResidualNormalization::WeightedRhs {
            msh_flag |= CellMeshFlags::PEC;
        }

        Ok(Self {
            msh_flag,
            bdy_flag: CellMeshFlags::PEQ,
            curlcurl_pty_uniform: param
                .curlcurl
                .as_ref()
                .map_or(true, |cc| cc.property.is_uniform()),
            reaction_pty_uniform: param.reaction.as_ref().map_or(true, |p| p.is_uniform()),
            time_pty_uniform: param.time.as_ref().map_or(true, |p| p.is_uniform()),
            face_bc: FaceBoundaryConditions::new(param, mesh)?,
            tcb: Duration::ZERO,
            tcs: Duration::ZERO,
            tce: Duration::ZERO,
        })
    }

    pub fn reset_timers(&mut self) {
        self.tcb = Duration::ZERO;
        self.tcs = Duration::ZERO;
        self.tce = Duration::ZERO;
    }

    pub fn log_timers(&self, name: &str) {
        info!(
            "{name}: build {:.3} s, solve {:.3} s, extra {:.3} s",
            self.tcb.as_secs_f64(),
            self.tcs.as_secs_f64(),
            self.tce.as_secs_f64()
        );
    }
}
