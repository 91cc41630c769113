//! Discrete Hodge operators.
//!
//! The face-based Hodge operator (primal faces to dual edges) is used by the curl-curl term.
//! The edge-based Hodge operator (primal edges to dual faces) is used by reaction and unsteady
//! terms in its lumped form.
use crate::cell_mesh::{CellMesh, CellMeshFlags};
use nalgebra::{DMatrix, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HodgeAlgorithm {
    /// Consistent part plus a scaled stabilization.
    Cost,
    /// Diagonal operator, exact on orthogonal meshes.
    Voronoi,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HodgeParam {
    pub algorithm: HodgeAlgorithm,
    /// Scaling of the stabilization part for [`HodgeAlgorithm::Cost`].
    pub coef: f64,
}

impl Default for HodgeParam {
    fn default() -> Self {
        Self {
            algorithm: HodgeAlgorithm::Cost,
            coef: 1.0 / 3.0,
        }
    }
}

/// Reusable temporaries of [`compute_fped_hodge`].
#[derive(Debug, Clone)]
pub struct HodgeBuffer {
    dual_edges: Vec<Vector3<f64>>,
    stab: Vec<f64>,
    pi: DMatrix<f64>,
}

impl Default for HodgeBuffer {
    fn default() -> Self {
        Self::new(0)
    }
}

impl HodgeBuffer {
    pub fn new(n_max_faces: usize) -> Self {
        Self {
            dual_edges: Vec::with_capacity(n_max_faces),
            stab: Vec::with_capacity(n_max_faces),
            pi: DMatrix::zeros(n_max_faces, n_max_faces),
        }
    }
}

/// Compute the face-based discrete Hodge operator of the cell for an isotropic property
/// `kappa`, in the global orientation of the faces.
///
/// With the dual edges `ed_f = sgn(c, f) (x_f - x_c)` and the face vectors `S_f`, the COST
/// operator reads `H = Hc + beta * Pi^T D Pi` with
///
/// - `Hc[f][g] = kappa (ed_f . ed_g) / |c|`,
/// - `Pi[f][g] = delta_fg - (S_f . ed_g) / |c|`,
/// - `D = diag(kappa |ed_f| / |S_f|)`.
///
/// The Voronoi operator only keeps `D`. Requires [`CellMeshFlags::PFQ`] and [`CellMeshFlags::DFQ`].
pub fn compute_fped_hodge(
    cm: &CellMesh,
    kappa: f64,
    param: &HodgeParam,
    buffer: &mut HodgeBuffer,
    hodge: &mut DMatrix<f64>,
) {
    debug_assert!(cm.flag.contains(CellMeshFlags::PFQ | CellMeshFlags::DFQ));
    let n_fc = cm.n_fc();
    hodge.resize_mut(n_fc, n_fc, 0.0);
    hodge.fill(0.0);

    let HodgeBuffer { dual_edges, stab, pi } = buffer;
    dual_edges.clear();
    dual_edges.extend((0..n_fc).map(|f| (cm.f_centers[f] - cm.xc) * f64::from(cm.f_sgn[f])));
    stab.clear();
    stab.extend((0..n_fc).map(|f| kappa * dual_edges[f].norm() / cm.f_vectors[f].norm()));

    match param.algorithm {
        HodgeAlgorithm::Voronoi => {
            for f in 0..n_fc {
                hodge[(f, f)] = stab[f];
            }
        }
        HodgeAlgorithm::Cost => {
            let inv_vol = 1.0 / cm.vol_c;
            pi.resize_mut(n_fc, n_fc, 0.0);
            for f in 0..n_fc {
                for g in 0..n_fc {
                    let delta = if f == g { 1.0 } else { 0.0 };
                    pi[(f, g)] = delta - inv_vol * cm.f_vectors[f].dot(&dual_edges[g]);
                }
            }
            for f in 0..n_fc {
                for g in 0..n_fc {
                    let mut h_fg = kappa * inv_vol * dual_edges[f].dot(&dual_edges[g]);
                    for k in 0..n_fc {
                        h_fg += param.coef * pi[(k, f)] * stab[k] * pi[(k, g)];
                    }
                    hodge[(f, g)] = h_fg;
                }
            }
        }
    }
}

/// Diagonal edge-based Hodge operator (lumped mass) for the property `sigma`:
/// `sigma (df_e . t_e) / |t_e|^2` for each edge of the cell.
///
/// Requires [`CellMeshFlags::PEQ`] and [`CellMeshFlags::DEQ`].
pub fn compute_epfd_diagonal(cm: &CellMesh, sigma: f64, diagonal: &mut Vec<f64>) {
    debug_assert!(cm.flag.contains(CellMeshFlags::PEQ | CellMeshFlags::DEQ));
    diagonal.clear();
    diagonal.extend(
        cm.dface
            .iter()
            .zip(&cm.e_tangents)
            .map(|(df, t)| sigma * df.dot(t) / t.norm_squared()),
    );
}
