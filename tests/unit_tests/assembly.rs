use cdoflow::assembly::global::{color_cells, AssemblySync, CsrParAssembler, VectorAccumulator};
use cdoflow::assembly::hodge::{compute_epfd_diagonal, compute_fped_hodge, HodgeAlgorithm, HodgeBuffer, HodgeParam};
use cdoflow::assembly::local::{accumulate_signed_hodge, add_curlcurl_term, CellBuilder, CellSystem};
use cdoflow::cell_mesh::{CellMesh, CellMeshFlags};
use cdoflow::mesh::procedural::{create_box_hex_mesh, create_single_tetrahedron_mesh, create_unit_box_hex_mesh};
use cdoflow::mesh::CdoMesh;
use cdoflow::proptest::{signs, spd_matrix};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector, Point3, Vector3};
use proptest::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::HashSet;

fn curlcurl_flags() -> CellMeshFlags {
    CellMeshFlags::PFQ | CellMeshFlags::DFQ | CellMeshFlags::FE | CellMeshFlags::FES
}

/// Local curl-curl operator of cell `c` with a unit property.
fn local_curlcurl(mesh: &CdoMesh, c: usize, hodge: &HodgeParam) -> DMatrix<f64> {
    let mut cm = CellMesh::default();
    cm.build(c, curlcurl_flags(), mesh);
    let mut cb = CellBuilder::new(cm.n_fc(), cm.n_ec());
    let mut csys = CellSystem::new(cm.n_ec());
    csys.reset(c, &cm.e_ids);
    compute_fped_hodge(&cm, 1.0, hodge, &mut cb.hodge_buffer, &mut cb.hodge);
    add_curlcurl_term(&cm, &mut cb, &mut csys);
    csys.mat
}

#[test]
fn coloring_separates_cells_sharing_an_edge() {
    let mesh = create_unit_box_hex_mesh(3).unwrap();
    let colors = color_cells(mesh.cell_edges());

    let mut seen = HashSet::new();
    for color in &colors {
        let mut edges = HashSet::new();
        for (&c, subset) in color.labels().iter().zip(color.subsets().iter()) {
            assert_eq!(subset, mesh.cell_edges().ids(c));
            assert!(seen.insert(c), "cell {c} appears in several colors");
            for &e in mesh.cell_edges().ids(c) {
                assert!(edges.insert(e), "edge {e} is shared within a color");
            }
        }
    }
    assert_eq!(seen.len(), mesh.num_cells());
    // The four cells around an interior edge pairwise conflict
    assert!(colors.len() >= 4);
}

#[test]
fn assembler_rejects_unsorted_dofs() {
    let c2d = vec![vec![0, 2, 1]].into();
    assert!(CsrParAssembler::new(c2d, 3).is_err());
    let c2d = vec![vec![0, 5]].into();
    assert!(CsrParAssembler::new(c2d, 3).is_err());
}

fn local_matrix(c: usize, n: usize) -> DMatrix<f64> {
    DMatrix::from_fn(n, n, |i, j| (c + 1) as f64 * (1 + i + 2 * j) as f64)
}

fn local_rhs(c: usize, n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.5 * (c + 1) as f64 - i as f64).collect()
}

#[test]
fn parallel_assembly_matches_sequential_sum() {
    let mesh = create_box_hex_mesh(&Point3::origin(), &Vector3::new(3.0, 2.0, 2.0), [3, 2, 2]).unwrap();
    let n_edges = mesh.num_edges();
    let c2e = mesh.cell_edges();

    let mut expected_matrix = DMatrix::zeros(n_edges, n_edges);
    let mut expected_rhs = DVector::zeros(n_edges);
    for c in 0..mesh.num_cells() {
        let ids = c2e.ids(c);
        let loc = local_matrix(c, ids.len());
        let rhs = local_rhs(c, ids.len());
        for (i, &gi) in ids.iter().enumerate() {
            expected_rhs[gi] += rhs[i];
            for (j, &gj) in ids.iter().enumerate() {
                expected_matrix[(gi, gj)] += loc[(i, j)];
            }
        }
    }

    let assembler = CsrParAssembler::new(c2e.clone(), n_edges).unwrap();
    for sync in [AssemblySync::CriticalSection, AssemblySync::Atomic] {
        for num_threads in [1, 2, 4, 8] {
            let pool = ThreadPoolBuilder::new().num_threads(num_threads).build().unwrap();
            let (matrix, rhs, total) = pool.install(|| {
                let acc = VectorAccumulator::new(sync, n_edges);
                let mut matrix = assembler.zero_matrix();
                let total = assembler.assemble_into_csr(&mut matrix, |c, mut scatter| {
                    let ids = scatter.dof_ids().to_vec();
                    scatter.add_local_matrix(&local_matrix(c, ids.len()));
                    acc.add_local(&ids, &local_rhs(c, ids.len()));
                    1.0
                });
                (matrix, acc.into_vector(), total)
            });

            assert_eq!(total, mesh.num_cells() as f64);
            assert_matrix_eq!(DMatrix::from(&matrix), expected_matrix, comp = abs, tol = 1e-10);
            assert_matrix_eq!(rhs, expected_rhs, comp = abs, tol = 1e-10);
        }
    }
}

#[test]
fn curlcurl_vanishes_on_discrete_gradients() {
    let tet = create_single_tetrahedron_mesh([
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.2, 0.0),
        Point3::new(0.1, 1.0, 0.0),
        Point3::new(0.3, 0.2, 0.9),
    ])
    .unwrap();
    let hex = create_box_hex_mesh(&Point3::origin(), &Vector3::new(1.0, 0.5, 2.0), [2, 1, 2]).unwrap();
    let potential = |x: &Point3<f64>| 1.0 + 2.0 * x.x - x.y + 0.5 * x.z * x.z + x.x * x.y;

    for mesh in [&tet, &hex] {
        for algorithm in [HodgeAlgorithm::Cost, HodgeAlgorithm::Voronoi] {
            let hodge = HodgeParam { algorithm, coef: 1.0 / 3.0 };
            for c in 0..mesh.num_cells() {
                let grad = DVector::from_iterator(
                    mesh.cell_edges().ids(c).len(),
                    mesh.cell_edges().ids(c).iter().map(|&e| {
                        let [a, b] = mesh.edge_vertices()[e];
                        potential(&mesh.vertices()[b]) - potential(&mesh.vertices()[a])
                    }),
                );
                let loc = local_curlcurl(mesh, c, &hodge);
                assert_matrix_eq!(&loc * grad, DVector::zeros(loc.nrows()), comp = abs, tol = 1e-12);
            }
        }
    }
}

#[test]
fn cost_hodge_is_symmetric_positive_definite() {
    let mesh = create_box_hex_mesh(&Point3::origin(), &Vector3::new(1.0, 2.0, 0.5), [1, 1, 1]).unwrap();
    let mut cm = CellMesh::default();
    cm.build(0, CellMeshFlags::PFQ | CellMeshFlags::DFQ, &mesh);
    let mut hodge = DMatrix::zeros(0, 0);
    compute_fped_hodge(&cm, 2.0, &HodgeParam::default(), &mut HodgeBuffer::default(), &mut hodge);

    assert_eq!(hodge.nrows(), 6);
    assert_matrix_eq!(hodge, hodge.transpose(), comp = abs, tol = 1e-14);
    let min_eigenvalue = hodge.clone().symmetric_eigenvalues().min();
    assert!(min_eigenvalue > 0.0);
}

#[test]
fn voronoi_hodge_on_a_cube() {
    let mesh = create_unit_box_hex_mesh(1).unwrap();
    let mut cm = CellMesh::default();
    cm.build(0, CellMeshFlags::PFQ | CellMeshFlags::DFQ, &mesh);
    let mut hodge = DMatrix::zeros(0, 0);
    let param = HodgeParam {
        algorithm: HodgeAlgorithm::Voronoi,
        ..Default::default()
    };
    compute_fped_hodge(&cm, 3.0, &param, &mut HodgeBuffer::default(), &mut hodge);
    // kappa |x_f - x_c| / |f|
    assert_matrix_eq!(hodge, DMatrix::identity(6, 6) * 1.5, comp = abs, tol = 1e-14);
}

#[test]
fn hodge_buffer_is_reused_across_cell_shapes() {
    let hex = create_box_hex_mesh(&Point3::origin(), &Vector3::new(1.0, 2.0, 0.5), [1, 1, 1]).unwrap();
    let tet = create_single_tetrahedron_mesh([
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
    ])
    .unwrap();
    let flags = CellMeshFlags::PFQ | CellMeshFlags::DFQ;
    let param = HodgeParam::default();

    let mut buffer = HodgeBuffer::new(6);
    let mut reused = DMatrix::zeros(0, 0);
    let mut fresh = DMatrix::zeros(0, 0);
    for mesh in [&hex, &tet, &hex] {
        let mut cm = CellMesh::default();
        cm.build(0, flags, mesh);
        compute_fped_hodge(&cm, 1.5, &param, &mut buffer, &mut reused);
        compute_fped_hodge(&cm, 1.5, &param, &mut HodgeBuffer::default(), &mut fresh);
        assert_eq!(reused.nrows(), cm.n_fc());
        assert_eq!(reused, fresh);
    }
}

#[test]
fn lumped_edge_mass_on_a_cube() {
    let mesh = create_unit_box_hex_mesh(1).unwrap();
    let mut cm = CellMesh::default();
    cm.build(0, CellMeshFlags::PEQ | CellMeshFlags::DEQ, &mesh);
    let mut diagonal = Vec::new();
    compute_epfd_diagonal(&cm, 2.0, &mut diagonal);
    assert_eq!(diagonal.len(), 12);
    for d in diagonal {
        assert_scalar_eq!(d, 0.5, comp = abs, tol = 1e-14);
    }
}

proptest! {
    #[test]
    fn signed_hodge_accumulation_is_symmetric_positive_semidefinite(
        (hodge, f2e_sgn) in (spd_matrix(6), signs(24))
    ) {
        // Face to edge incidence of a hexahedron with arbitrary orientations
        let f2e_ids = [
            0, 1, 2, 3,
            4, 5, 6, 7,
            0, 8, 4, 9,
            1, 10, 5, 8,
            2, 11, 6, 10,
            3, 9, 7, 11,
        ];
        let f2e_idx = [0, 4, 8, 12, 16, 20, 24];
        let mut loc = DMatrix::zeros(12, 12);
        accumulate_signed_hodge(&hodge, &f2e_idx, &f2e_ids, &f2e_sgn, &mut loc);

        let scale = hodge.norm();
        prop_assert!((&loc - loc.transpose()).norm() <= 1e-12 * scale);
        let min_eigenvalue = loc.symmetric_eigenvalues().min();
        prop_assert!(min_eigenvalue >= -1e-10 * scale);
    }
}
