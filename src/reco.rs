//! Reconstruction of cell-centered fields from DoFs attached to other mesh entities.
use crate::mesh::CdoMesh;
use nalgebra::Vector3;
use rayon::prelude::*;

/// Reconstruct the vector field at the center of cell `c` from edge circulations:
/// `v_c = (1/|c|) sum_e a_e df_e`, where `df_e` is the dual face attached to `e` in `c`.
///
/// The reconstruction is exact for constant fields.
pub fn cell_vector_from_edge_dofs(mesh: &CdoMesh, c: usize, edge_values: &[f64]) -> Vector3<f64> {
    let sum = mesh
        .cell_edges()
        .ids(c)
        .iter()
        .zip(mesh.cell_dual_faces(c))
        .fold(Vector3::zeros(), |acc, (&e, df)| acc + df * edge_values[e]);
    sum / mesh.cell_volumes()[c]
}

/// Reconstruct the vector field at all cell centers, see [`cell_vector_from_edge_dofs`].
pub fn cell_vectors_from_edge_dofs(mesh: &CdoMesh, edge_values: &[f64]) -> Vec<Vector3<f64>> {
    assert_eq!(edge_values.len(), mesh.num_edges());
    (0..mesh.num_cells())
        .into_par_iter()
        .with_min_len(64)
        .map(|c| cell_vector_from_edge_dofs(mesh, c, edge_values))
        .collect()
}

/// Circulations `u(x_e) . t_e` of a vector field along all edges.
pub fn edge_dofs_from_vector_field<F>(mesh: &CdoMesh, field: F) -> Vec<f64>
where
    F: Fn(&nalgebra::Point3<f64>) -> Vector3<f64> + Sync,
{
    mesh.edge_centers()
        .par_iter()
        .zip(mesh.edge_tangents())
        .map(|(x_e, t_e)| field(x_e).dot(t_e))
        .collect()
}
