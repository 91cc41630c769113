//! Local (cellwise) systems and operators.
use crate::assembly::hodge::HodgeBuffer;
use crate::cell_mesh::CellMesh;
use nalgebra::{DMatrix, DVector};
use std::ops::{BitOr, BitOrAssign};

/// Flags attached to a local degree of freedom.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct DofFlag(u8);

impl DofFlag {
    pub const NONE: DofFlag = DofFlag(0);
    /// The value of the DoF is prescribed by a Dirichlet boundary condition.
    pub const DIRICHLET: DofFlag = DofFlag(1 << 0);
    /// The DoF lies on a boundary face without essential condition.
    pub const NEUMANN: DofFlag = DofFlag(1 << 1);

    pub fn contains(self, other: DofFlag) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for DofFlag {
    type Output = DofFlag;

    fn bitor(self, rhs: Self) -> Self::Output {
        DofFlag(self.0 | rhs.0)
    }
}

impl BitOrAssign for DofFlag {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Dense local system `mat * x = rhs` attached to one cell.
#[derive(Debug, Clone)]
pub struct CellSystem {
    pub c_id: usize,
    pub n_dofs: usize,
    pub dof_ids: Vec<usize>,
    pub dof_flags: Vec<DofFlag>,
    pub mat: DMatrix<f64>,
    pub rhs: DVector<f64>,
    /// Source term contribution (kept separately for time schemes using it explicitly).
    pub source: DVector<f64>,
    /// DoF values at the previous time step.
    pub val_n: DVector<f64>,
    /// Prescribed values for DoFs flagged [`DofFlag::DIRICHLET`].
    pub dir_values: DVector<f64>,
    /// Index into the list of enforcement values for internally enforced DoFs.
    pub intern_forced_ids: Vec<Option<usize>>,
    pub has_dirichlet: bool,
    pub has_internal_enforcement: bool,
    /// Value of each DoF enforced by the current enforcement pass.
    pub enforced: Vec<Option<f64>>,
}

impl CellSystem {
    /// Create a system able to hold up to `n_max_dofs` DoFs without reallocation.
    pub fn new(n_max_dofs: usize) -> Self {
        Self {
            c_id: 0,
            n_dofs: 0,
            dof_ids: Vec::with_capacity(n_max_dofs),
            dof_flags: Vec::with_capacity(n_max_dofs),
            mat: DMatrix::zeros(n_max_dofs, n_max_dofs),
            rhs: DVector::zeros(n_max_dofs),
            source: DVector::zeros(n_max_dofs),
            val_n: DVector::zeros(n_max_dofs),
            dir_values: DVector::zeros(n_max_dofs),
            intern_forced_ids: Vec::with_capacity(n_max_dofs),
            has_dirichlet: false,
            has_internal_enforcement: false,
            enforced: Vec::with_capacity(n_max_dofs),
        }
    }

    /// Reset the system for cell `c_id` with the given global DoF ids.
    pub fn reset(&mut self, c_id: usize, dof_ids: &[usize]) {
        let n = dof_ids.len();
        self.c_id = c_id;
        self.n_dofs = n;
        self.dof_ids.clear();
        self.dof_ids.extend_from_slice(dof_ids);
        self.dof_flags.clear();
        self.dof_flags.resize(n, DofFlag::NONE);
        self.intern_forced_ids.clear();
        self.intern_forced_ids.resize(n, None);
        self.has_dirichlet = false;
        self.has_internal_enforcement = false;
        self.enforced.clear();

        if self.mat.nrows() != n || self.mat.ncols() != n {
            self.mat.resize_mut(n, n, 0.0);
        }
        for vector in [&mut self.rhs, &mut self.source, &mut self.val_n, &mut self.dir_values] {
            if vector.len() != n {
                vector.resize_vertically_mut(n, 0.0);
            }
        }
        self.mat.fill(0.0);
        self.rhs.fill(0.0);
        self.source.fill(0.0);
        self.val_n.fill(0.0);
        self.dir_values.fill(0.0);
    }
}

/// Per-worker scratch data used while building cellwise systems.
#[derive(Debug, Clone)]
pub struct CellBuilder {
    /// Time at which properties are evaluated.
    pub t_pty_eval: f64,
    /// Time at which boundary conditions are evaluated.
    pub t_bc_eval: f64,
    /// Time at which source terms are evaluated.
    pub t_st_eval: f64,
    /// Value of the curl-curl property in the current cell.
    pub curlcurl_pty: f64,
    /// Face-based discrete Hodge operator of the current cell.
    pub hodge: DMatrix<f64>,
    pub hodge_buffer: HodgeBuffer,
    /// Local operator built before being added to the cell system.
    pub loc: DMatrix<f64>,
    pub values: Vec<f64>,
}

impl CellBuilder {
    pub fn new(n_max_faces: usize, n_max_dofs: usize) -> Self {
        Self {
            t_pty_eval: 0.0,
            t_bc_eval: 0.0,
            t_st_eval: 0.0,
            curlcurl_pty: 0.0,
            hodge: DMatrix::zeros(n_max_faces, n_max_faces),
            hodge_buffer: HodgeBuffer::new(n_max_faces),
            loc: DMatrix::zeros(n_max_dofs, n_max_dofs),
            values: Vec::with_capacity(n_max_dofs),
        }
    }
}

/// Accumulate `sgn(f, e_k) * H[f][g] * sgn(g, e_l)` into `loc[e_k][e_l]`
/// for all pairs of faces `(f, g)` and all edges `e_k` of `f`, `e_l` of `g`.
///
/// `f2e_idx` holds the offsets of each face into `f2e_ids` (local edge ids) and `f2e_sgn`.
pub fn accumulate_signed_hodge(
    hodge: &DMatrix<f64>,
    f2e_idx: &[usize],
    f2e_ids: &[usize],
    f2e_sgn: &[i8],
    loc: &mut DMatrix<f64>,
) {
    let n_fc = f2e_idx.len().saturating_sub(1);
    assert_eq!(hodge.nrows(), n_fc);
    assert_eq!(hodge.ncols(), n_fc);

    for fk in 0..n_fc {
        let range_k = f2e_idx[fk]..f2e_idx[fk + 1];
        for fl in 0..n_fc {
            let h_kl = hodge[(fk, fl)];
            if h_kl == 0.0 {
                continue;
            }
            let range_l = f2e_idx[fl]..f2e_idx[fl + 1];
            for ik in range_k.clone() {
                let s_k = f64::from(f2e_sgn[ik]) * h_kl;
                for il in range_l.clone() {
                    loc[(f2e_ids[ik], f2e_ids[il])] += s_k * f64::from(f2e_sgn[il]);
                }
            }
        }
    }
}

/// Build the local curl-curl operator in `cb.loc` from the face Hodge operator in `cb.hodge`
/// and add it to the cell system matrix.
///
/// Requires the face to edge incidence with signs in `cm`.
pub fn add_curlcurl_term(cm: &CellMesh, cb: &mut CellBuilder, csys: &mut CellSystem) {
    let n_ec = cm.n_ec();
    cb.loc.resize_mut(n_ec, n_ec, 0.0);
    cb.loc.fill(0.0);
    accumulate_signed_hodge(&cb.hodge, &cm.f2e_idx, &cm.f2e_ids, &cm.f2e_sgn, &mut cb.loc);
    csys.mat += &cb.loc;
}

/// Add a diagonal (lumped) operator to the cell system matrix.
pub fn add_diagonal_term(diagonal: &[f64], csys: &mut CellSystem) {
    assert_eq!(diagonal.len(), csys.n_dofs);
    for (i, d) in diagonal.iter().enumerate() {
        csys.mat[(i, i)] += d;
    }
}

/// Add a source contribution to both the source buffer and the right-hand side.
pub fn add_source_term(contribution: &[f64], csys: &mut CellSystem) {
    assert_eq!(contribution.len(), csys.n_dofs);
    for (i, s) in contribution.iter().enumerate() {
        csys.source[i] += s;
        csys.rhs[i] += s;
    }
}
