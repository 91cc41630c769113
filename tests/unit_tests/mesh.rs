use cdoflow::mesh::procedural::{create_box_hex_mesh, create_single_tetrahedron_mesh, create_unit_box_hex_mesh};
use cdoflow::cell_mesh::{CellMesh, CellMeshFlags};
use cdoflow::mesh::CellFlag;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{Matrix3, Point3, Vector3};

#[test]
fn unit_box_entity_counts() {
    let mesh = create_unit_box_hex_mesh(2).unwrap();
    assert_eq!(mesh.num_cells(), 8);
    assert_eq!(mesh.num_vertices(), 27);
    assert_eq!(mesh.num_faces(), 36);
    assert_eq!(mesh.num_edges(), 54);
    assert_eq!(mesh.boundary_faces().len(), 24);
    assert!(mesh
        .cell_flags()
        .iter()
        .all(|flag| flag.contains(CellFlag::BOUNDARY_BY_FACE)));
}

#[test]
fn only_the_central_cell_is_interior() {
    let mesh = create_unit_box_hex_mesh(3).unwrap();
    for (c, flag) in mesh.cell_flags().iter().enumerate() {
        if c == 13 {
            assert_eq!(*flag, CellFlag::NONE);
        } else {
            assert!(flag.contains(CellFlag::BOUNDARY_BY_FACE));
        }
    }
}

#[test]
fn box_volumes() {
    let mesh = create_box_hex_mesh(&Point3::new(-1.0, 0.0, 2.0), &Vector3::new(2.0, 1.0, 3.0), [2, 1, 3]).unwrap();
    assert_eq!(mesh.num_cells(), 6);
    for &vol in mesh.cell_volumes() {
        assert_scalar_eq!(vol, 1.0, comp = abs, tol = 1e-12);
    }
    assert_scalar_eq!(mesh.total_volume(), 6.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(mesh.edge_volumes().iter().sum::<f64>(), 6.0, comp = abs, tol = 1e-12);

    // x runs fastest
    let xc = mesh.cell_centers()[1];
    assert_matrix_eq!(xc.coords, Vector3::new(0.5, 0.5, 2.5), comp = abs, tol = 1e-12);
}

#[test]
fn dual_faces_and_tangents_span_the_cell_volume() {
    // sum_e t_e (x) df_e = |c| Id in every cell
    let mesh = create_box_hex_mesh(&Point3::origin(), &Vector3::new(1.0, 2.0, 0.5), [2, 2, 2]).unwrap();
    for c in 0..mesh.num_cells() {
        let mut sum = Matrix3::zeros();
        for (&e, df) in mesh.cell_edges().ids(c).iter().zip(mesh.cell_dual_faces(c)) {
            sum += mesh.edge_tangents()[e] * df.transpose();
        }
        let expected = Matrix3::identity() * mesh.cell_volumes()[c];
        assert_matrix_eq!(sum, expected, comp = abs, tol = 1e-12);

        let pvol: f64 = mesh.cell_edge_volumes(c).iter().sum();
        assert_scalar_eq!(pvol, mesh.cell_volumes()[c], comp = abs, tol = 1e-12);
    }
}

#[test]
fn single_tetrahedron_geometry() {
    let mesh = create_single_tetrahedron_mesh([
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
    ])
    .unwrap();
    assert_eq!(mesh.num_edges(), 6);
    assert_eq!(mesh.num_faces(), 4);
    assert_eq!(mesh.boundary_faces().len(), 4);
    assert_scalar_eq!(mesh.cell_volumes()[0], 1.0 / 6.0, comp = abs, tol = 1e-14);
    assert_matrix_eq!(
        mesh.cell_centers()[0].coords,
        Vector3::repeat(0.25),
        comp = abs,
        tol = 1e-14
    );

    let mut sum = Matrix3::zeros();
    for (&e, df) in mesh.cell_edges().ids(0).iter().zip(mesh.cell_dual_faces(0)) {
        sum += mesh.edge_tangents()[e] * df.transpose();
    }
    assert_matrix_eq!(sum, Matrix3::identity() / 6.0, comp = abs, tol = 1e-14);
}

#[test]
fn invalid_box_is_rejected() {
    assert!(create_box_hex_mesh(&Point3::origin(), &Vector3::repeat(1.0), [0, 1, 1]).is_err());
    assert!(create_box_hex_mesh(&Point3::origin(), &Vector3::new(1.0, -1.0, 1.0), [1, 1, 1]).is_err());
}

#[test]
fn cell_mesh_local_connectivity_maps_back_to_global_ids() {
    let hex = create_box_hex_mesh(&Point3::origin(), &Vector3::new(1.0, 2.0, 1.0), [2, 1, 2]).unwrap();
    let tet = create_single_tetrahedron_mesh([
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
    ])
    .unwrap();
    let flags = CellMeshFlags::PV | CellMeshFlags::EV | CellMeshFlags::FE | CellMeshFlags::FES;

    let mut cm = CellMesh::default();
    for mesh in [&hex, &tet] {
        for c in 0..mesh.num_cells() {
            cm.build(c, flags, mesh);
            for (local, [a, b]) in cm.e2v_ids.iter().enumerate() {
                let e = cm.e_ids[local];
                assert_eq!([cm.v_ids[*a], cm.v_ids[*b]], mesh.edge_vertices()[e]);
            }
            for (local_f, &f) in cm.f_ids.iter().enumerate() {
                let (edges, signs) = cm.face_edges(local_f);
                let global: Vec<usize> = edges.iter().map(|&k| cm.e_ids[k]).collect();
                assert_eq!(global, mesh.face_edges().ids(f));
                assert_eq!(Some(signs), mesh.face_edges().signs(f));
            }
        }
    }
}
