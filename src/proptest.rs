//! Strategies for property-based tests.
use crate::mesh::procedural::create_box_hex_mesh;
use crate::mesh::CdoMesh;
use crate::solidification::strategy::CellPoint;
use crate::solidification::BinaryAlloyParam;
use ::proptest::prelude::*;
use nalgebra::{DMatrix, Point3, Vector3};

/// Symmetric positive definite matrices of size `n`, built as `A A^T + n I`.
pub fn spd_matrix(n: usize) -> impl Strategy<Value = DMatrix<f64>> {
    proptest::collection::vec(-1.0..1.0, n * n).prop_map(move |values| {
        let a = DMatrix::from_vec(n, n, values);
        &a * a.transpose() + DMatrix::identity(n, n) * n as f64
    })
}

/// Orientation signs in `{-1, 1}`.
pub fn signs(n: usize) -> impl Strategy<Value = Vec<i8>> {
    proptest::collection::vec(prop_oneof![Just(-1i8), Just(1i8)], n)
}

/// Small axis-aligned boxes of hexahedra with random extents.
pub fn box_hex_mesh() -> impl Strategy<Value = CdoMesh> {
    ((1usize..=3, 1usize..=3, 1usize..=2), [0.5..2.0, 0.5..2.0, 0.5..2.0]).prop_map(|((nx, ny, nz), [lx, ly, lz])| {
        create_box_hex_mesh(&Point3::origin(), &Vector3::new(lx, ly, lz), [nx, ny, nz])
            .expect("Box parameters are valid by construction")
    })
}

/// Phase diagrams with a negative liquidus slope and `0 < kp < 1`.
pub fn binary_alloy_param() -> impl Strategy<Value = BinaryAlloyParam> {
    (-5.0..5.0, 2.0..20.0, -5.0..-0.5, 0.05..0.9, 1.0..10.0).prop_map(|(t_melt, depth, ml, kp, latent_heat)| {
        BinaryAlloyParam {
            t_melt,
            t_eutectic: t_melt - depth,
            liquidus_slope: ml,
            partition_coef: kp,
            latent_heat,
            ref_concentration: 1.0,
            dilatation_coef: 0.0,
            solute_diffusivity: 0.0,
            s_das: 1e-4,
        }
    })
}

/// Cell values spanning all states of a phase diagram whose temperatures lie in
/// `[t_min, t_max]` and concentrations in `[0, c_max]`. Liquid fractions and `eta` may lie
/// outside their physical bounds.
pub fn cell_point(t_min: f64, t_max: f64, c_max: f64) -> impl Strategy<Value = CellPoint> {
    let temp = t_min..t_max;
    let conc = 0.0..c_max;
    (
        [temp.clone(), temp.clone(), temp],
        [conc.clone(), conc.clone(), conc],
        [-0.5..1.5, -0.5..1.5],
        0.0..20.0,
    )
        .prop_map(|([temp, temp_pre, temp_k], [conc, conc_pre, conc_k], [gliq_pre, gliq_k], eta_k)| CellPoint {
            temp,
            conc,
            temp_pre,
            conc_pre,
            gliq_pre,
            temp_k,
            conc_k,
            gliq_k,
            eta_k,
        })
}
