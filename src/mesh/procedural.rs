//! Basic procedural mesh generation routines.
use crate::connectivity::Adjacency;
use crate::mesh::CdoMesh;
use eyre::ensure;
use nalgebra::{Point3, Vector3};

/// Generates an axis-aligned box of uniform hexahedra with its minimum corner at `origin`.
///
/// Cells are numbered with `x` running fastest, then `y`, then `z`.
pub fn create_box_hex_mesh(origin: &Point3<f64>, extents: &Vector3<f64>, cells: [usize; 3]) -> eyre::Result<CdoMesh> {
    let [nx, ny, nz] = cells;
    ensure!(nx > 0 && ny > 0 && nz > 0, "A box mesh needs at least one cell per direction.");
    ensure!(extents.iter().all(|&l| l > 0.0), "Box extents must be positive.");

    let (nvx, nvy, nvz) = (nx + 1, ny + 1, nz + 1);
    let h = Vector3::new(extents.x / nx as f64, extents.y / ny as f64, extents.z / nz as f64);

    let mut vertices = Vec::with_capacity(nvx * nvy * nvz);
    for k in 0..nvz {
        for j in 0..nvy {
            for i in 0..nvx {
                let offset = Vector3::new(i as f64 * h.x, j as f64 * h.y, k as f64 * h.z);
                vertices.push(origin + offset);
            }
        }
    }
    let v = |i: usize, j: usize, k: usize| (nvx * nvy) * k + nvx * j + i;

    // Faces normal to x, then y, then z
    let mut faces = Adjacency::new();
    let x_face = |i: usize, j: usize, k: usize| (nvx * ny) * k + nvx * j + i;
    let n_x_faces = nvx * ny * nz;
    let y_face = |i: usize, j: usize, k: usize| n_x_faces + (nx * nvy) * k + nx * j + i;
    let n_y_faces = nx * nvy * nz;
    let z_face = |i: usize, j: usize, k: usize| n_x_faces + n_y_faces + (nx * ny) * k + nx * j + i;

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nvx {
                faces.push(&[v(i, j, k), v(i, j + 1, k), v(i, j + 1, k + 1), v(i, j, k + 1)], None);
            }
        }
    }
    for k in 0..nz {
        for j in 0..nvy {
            for i in 0..nx {
                faces.push(&[v(i, j, k), v(i, j, k + 1), v(i + 1, j, k + 1), v(i + 1, j, k)], None);
            }
        }
    }
    for k in 0..nvz {
        for j in 0..ny {
            for i in 0..nx {
                faces.push(&[v(i, j, k), v(i + 1, j, k), v(i + 1, j + 1, k), v(i, j + 1, k)], None);
            }
        }
    }

    let mut cell_faces = Adjacency::new();
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                cell_faces.push(
                    &[
                        x_face(i, j, k),
                        x_face(i + 1, j, k),
                        y_face(i, j, k),
                        y_face(i, j + 1, k),
                        z_face(i, j, k),
                        z_face(i, j, k + 1),
                    ],
                    None,
                );
            }
        }
    }

    CdoMesh::from_poly_data(vertices, faces, cell_faces)
}

pub fn create_unit_box_hex_mesh(cells_per_dim: usize) -> eyre::Result<CdoMesh> {
    create_box_hex_mesh(
        &Point3::origin(),
        &Vector3::repeat(1.0),
        [cells_per_dim, cells_per_dim, cells_per_dim],
    )
}

/// A mesh made of the single tetrahedron with the given vertices.
pub fn create_single_tetrahedron_mesh(vertices: [Point3<f64>; 4]) -> eyre::Result<CdoMesh> {
    let faces = Adjacency::from(vec![vec![0, 2, 1], vec![0, 1, 3], vec![1, 2, 3], vec![0, 3, 2]]);
    let cells = Adjacency::from(vec![vec![0, 1, 2, 3]]);
    CdoMesh::from_poly_data(vertices.to_vec(), faces, cells)
}
