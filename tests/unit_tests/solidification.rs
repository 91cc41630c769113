use cdoflow::equation::param::Property;
use cdoflow::equation::scalar::{CellScalarEquation, ExtraTerms, ScalarEquation, ScalarEquationParam};
use cdoflow::error::SetupError;
use cdoflow::mesh::procedural::create_unit_box_hex_mesh;
use cdoflow::mesh::CdoMesh;
use cdoflow::parallel::{Communicator, SerialCommunicator};
use cdoflow::proptest::{binary_alloy_param, cell_point};
use cdoflow::solidification::coupling::PERMANENT_SOLID_LIQUIDUS;
use cdoflow::solidification::strategy::{
    gl_legacy, gl_path, gl_taylor, thm_legacy, thm_path, thm_taylor, CellPoint, ThermalCoefs,
};
use cdoflow::solidification::{
    BinaryAlloy, BinaryAlloyParam, SegregationParam, Solidification, SolidificationModel, SolidificationParam,
    SolidificationState, Strategy as GlStrategy, VollerModel, VollerParam,
};
use cdoflow::solver::{CgSolver, LinearSolver, SolveInfo};
use cdoflow::time_step::TimeStep;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::Vector3;
use proptest::prelude::*;
use std::collections::VecDeque;

use SolidificationState::{Eutectic, Liquid, Mushy, Solid};

fn alloy_param() -> BinaryAlloyParam {
    BinaryAlloyParam {
        t_melt: 0.0,
        t_eutectic: -10.0,
        liquidus_slope: -2.0,
        partition_coef: 0.3,
        latent_heat: 1.0,
        ref_concentration: 1.0,
        dilatation_coef: 0.0,
        solute_diffusivity: 0.0,
        s_das: 1e-4,
    }
}

fn alloy() -> BinaryAlloy {
    BinaryAlloy::new(&alloy_param()).unwrap()
}

fn alloy_solidification(strategy: GlStrategy) -> SolidificationParam {
    SolidificationParam {
        model: SolidificationModel::BinaryAlloy(alloy_param()),
        segregation: SegregationParam {
            strategy,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Equation whose solution at each time step is prescribed. The next solution is selected
/// every time the current values become the previous ones.
#[derive(Debug)]
struct PrescribedEquation {
    values: Vec<f64>,
    values_pre: Vec<f64>,
    solution: Vec<f64>,
    upcoming: VecDeque<Vec<f64>>,
    n_solves: usize,
}

impl PrescribedEquation {
    fn constant(values: Vec<f64>) -> Self {
        Self::with_solutions(values, Vec::new())
    }

    fn with_solutions(initial: Vec<f64>, solutions: Vec<Vec<f64>>) -> Self {
        Self {
            values_pre: initial.clone(),
            solution: initial.clone(),
            values: initial,
            upcoming: solutions.into(),
            n_solves: 0,
        }
    }
}

impl ScalarEquation for PrescribedEquation {
    fn name(&self) -> &str {
        "prescribed"
    }

    fn solve(
        &mut self,
        cur2prev: bool,
        _mesh: &CdoMesh,
        _ts: &TimeStep,
        _extra: &ExtraTerms,
        _solver: &mut dyn LinearSolver,
        _comm: &dyn Communicator,
    ) -> eyre::Result<SolveInfo> {
        if cur2prev {
            self.current_to_previous();
        }
        self.values.clone_from(&self.solution);
        self.n_solves += 1;
        Ok(SolveInfo {
            iterations: 0,
            residual: 0.0,
            converged: true,
        })
    }

    fn current_to_previous(&mut self) {
        self.values_pre.clone_from(&self.values);
        if let Some(next) = self.upcoming.pop_front() {
            self.solution = next;
        }
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

fn solver() -> CgSolver {
    CgSolver::new("solidification", Default::default())
}

#[test]
fn state_classification() {
    let alloy = alloy();
    assert_eq!(alloy.t_liquidus(1.0), -2.0);
    assert_scalar_eq!(alloy.t_solidus(1.0), -20.0 / 3.0, comp = abs, tol = 1e-14);
    assert_eq!(alloy.t_solidus(2.0), -10.0);
    // The liquidus never goes below the eutectic temperature
    assert_eq!(alloy.t_liquidus(8.0), -10.0);

    assert_eq!(alloy.state(-1.9, 1.0), Liquid);
    assert_eq!(alloy.state(-2.0, 1.0), Mushy);
    assert_eq!(alloy.state(-2.1, 1.0), Mushy);
    assert_eq!(alloy.state(-7.0, 1.0), Solid);
    assert_eq!(alloy.state(-10.0, 2.0), Eutectic);
    assert_eq!(alloy.state(-10.00005, 2.0), Eutectic);
    assert_eq!(alloy.state(-10.001, 2.0), Solid);
}

#[test]
fn enthalpy_classification_matches_consistent_states() {
    let alloy = alloy();
    let cp = 1.0;
    for conc in [0.2, 1.0, 1.4, 2.0, 4.0] {
        let (t_liq, t_sol) = (alloy.t_liquidus(conc), alloy.t_solidus(conc));
        for s in [0.1, 0.5, 0.9] {
            let temp = t_sol + s * (t_liq - t_sol);
            let gliq = alloy.gl_mushy(temp, conc);
            assert!(gliq > 0.0 && gliq < 1.0);
            assert_eq!(alloy.state(temp, conc), Mushy);
            assert_eq!(alloy.state_by_enthalpy(cp, temp, conc, gliq), Mushy);
        }
        assert_eq!(alloy.state_by_enthalpy(cp, t_liq + 0.5, conc, 1.0), Liquid);
        assert_eq!(alloy.state_by_enthalpy(cp, t_sol - 0.5, conc, 0.0), Solid);
        if conc > alloy.cs1 {
            let gleut = (conc - alloy.cs1) * alloy.dgldc_eut;
            for s in [0.1, 0.5, 0.9] {
                assert_eq!(alloy.state_by_enthalpy(cp, alloy.t_eut, conc, s * gleut), Eutectic);
            }
        }
    }
}

#[test]
fn liquid_concentration_per_state() {
    let alloy = alloy();
    assert_eq!(alloy.liquid_concentration(Liquid, -1.0, 1.0, 1.0, 0.0), 1.0);
    assert_eq!(alloy.liquid_concentration(Mushy, -4.0, 1.0, 1.0, 0.0), 2.0);
    assert_eq!(alloy.liquid_concentration(Eutectic, -10.0, 2.0, 1.0, 0.0), 5.0);
    assert_scalar_eq!(alloy.liquid_concentration(Solid, -8.0, 1.0, 0.1, 0.0), 1.0 / 0.3, comp = abs, tol = 1e-14);
    assert_eq!(alloy.liquid_concentration(Solid, -11.0, 2.0, 0.1, 0.0), 5.0);
    // A cell already solid keeps its liquid concentration
    assert_eq!(alloy.liquid_concentration(Solid, -11.0, 2.0, 0.0, 4.2), 4.2);
}

#[test]
fn invalid_phase_diagrams() {
    for param in [
        BinaryAlloyParam {
            partition_coef: 1.0,
            ..alloy_param()
        },
        BinaryAlloyParam {
            partition_coef: 0.0,
            ..alloy_param()
        },
        BinaryAlloyParam {
            liquidus_slope: 0.0,
            ..alloy_param()
        },
        BinaryAlloyParam {
            t_eutectic: 0.0,
            ..alloy_param()
        },
    ] {
        assert!(matches!(BinaryAlloy::new(&param), Err(SetupError::InvalidParameter { .. })));
    }
}

#[test]
fn legacy_and_taylor_thermal_terms() {
    let alloy = alloy();
    let coefs = ThermalCoefs {
        rho_l_over_dt: 2.0,
        cp_over_l: 1.0,
    };
    let mushy = CellPoint {
        temp: -6.0,
        conc: 0.9,
        temp_pre: -5.0,
        conc_pre: 1.0,
        gliq_pre: 1.0 / 7.0,
        temp_k: -5.0,
        conc_k: 1.0,
        gliq_k: 1.0 / 7.0,
        eta_k: 1.0,
    };
    // dgl/dT = 4/35 and dgl/dC = 4/7 at (-5, 1)
    for update in [thm_legacy(&alloy, &coefs, &mushy, 0.5), thm_taylor(&alloy, &coefs, &mushy, 0.5)] {
        assert_scalar_eq!(update.reaction, 2.0 * 4.0 / 35.0, comp = abs, tol = 1e-12);
        assert_scalar_eq!(
            update.source,
            0.5 * 2.0 * (4.0 / 35.0 * -5.0 + 4.0 / 7.0 * 0.1),
            comp = abs,
            tol = 1e-12
        );
    }

    let liquid = CellPoint {
        temp_pre: -1.0,
        temp_k: -1.0,
        conc: 1.0,
        ..mushy
    };
    assert_eq!(thm_legacy(&alloy, &coefs, &liquid, 0.5).source, 0.0);
    assert_eq!(thm_taylor(&alloy, &coefs, &liquid, 0.5).source, 0.0);

    // Crossing the liquidus at the previous iterate: linearization at the liquidus point
    let crossing = CellPoint { temp_k: -3.0, ..liquid };
    let update = thm_taylor(&alloy, &coefs, &crossing, 0.5);
    assert_scalar_eq!(update.reaction, 2.0 * 5.0 / 7.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(update.source, 0.5 * 2.0 * 5.0 / 7.0 * -2.0, comp = abs, tol = 1e-12);
}

#[test]
fn taylor_moves_cells_leaving_the_liquid_to_the_interface_temperature() {
    let alloy = alloy();
    let p = CellPoint {
        temp: -3.0,
        conc: 1.0,
        temp_pre: -1.0,
        conc_pre: 1.0,
        gliq_pre: 1.0,
        temp_k: -1.0,
        conc_k: 1.0,
        gliq_k: 1.0,
        eta_k: 1.0,
    };
    let update = gl_taylor(&alloy, 1.0, &p);
    assert_scalar_eq!(update.gliq, 7.0 / 12.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(update.temp.unwrap(), -31.0 / 12.0, comp = abs, tol = 1e-12);

    // Mushy to mushy: lever rule, temperature untouched
    let p = CellPoint {
        temp_pre: -4.0,
        gliq_pre: 0.5,
        ..p
    };
    let update = gl_taylor(&alloy, 1.0, &p);
    assert_scalar_eq!(update.gliq, alloy.gl_mushy(-3.0, 1.0), comp = abs, tol = 1e-14);
    assert_eq!(update.temp, None);

    // On the eutectic plateau, the excess temperature of the previous iterate is converted
    let p = CellPoint {
        temp: -10.0,
        conc: 2.0,
        temp_pre: -10.0,
        conc_pre: 2.0,
        temp_k: -9.95,
        gliq_k: 0.1,
        ..p
    };
    let update = gl_taylor(&alloy, 1.0, &p);
    assert_scalar_eq!(update.gliq, 0.15, comp = abs, tol = 1e-12);
    assert_scalar_eq!(update.eta, 2.5, comp = abs, tol = 1e-14);
}

#[test]
fn pure_solvent_cell_cooling_through_melting_point() {
    let alloy = alloy();
    assert!(alloy.is_pure_solvent(0.0));
    assert!(!alloy.is_pure_solvent(1.0));

    let p = CellPoint {
        temp: -0.5,
        conc: 0.0,
        temp_pre: 0.5,
        conc_pre: 0.0,
        gliq_pre: 1.0,
        temp_k: -0.5,
        conc_k: 0.0,
        gliq_k: 1.0,
        eta_k: 1.0,
    };
    // No mushy zone to linearize around: the cell solidifies at its computed temperature
    for update in [gl_taylor(&alloy, 1.0, &p), gl_path(&alloy, 1.0, &p)] {
        assert_eq!(update.gliq, 0.0);
        assert_eq!(update.temp, None);
        assert_scalar_eq!(update.eta, 1.0 / 0.3, comp = abs, tol = 1e-12);
        assert_eq!(update, gl_legacy(&alloy, &p));
    }

    let coefs = ThermalCoefs {
        rho_l_over_dt: 2.0,
        cp_over_l: 1.0,
    };
    assert_eq!(thm_taylor(&alloy, &coefs, &p, 0.5), Default::default());
    assert_eq!(thm_path(&alloy, &coefs, &p, 0.5, false), Default::default());
}

fn strategy_input() -> impl Strategy<Value = (BinaryAlloy, CellPoint)> {
    binary_alloy_param().prop_flat_map(|param| {
        let alloy = BinaryAlloy::new(&param).unwrap();
        let (t_min, t_max) = (alloy.t_eut - 5.0, alloy.t_melt + 5.0);
        (Just(alloy), cell_point(t_min, t_max, 1.5 * alloy.c_eut))
    })
}

proptest! {
    #[test]
    fn liquid_fractions_stay_in_unit_interval((alloy, p) in strategy_input(), cp in 0.1..10.0) {
        let cp_over_l = cp / alloy.latent_heat;
        for update in [gl_legacy(&alloy, &p), gl_taylor(&alloy, cp_over_l, &p), gl_path(&alloy, cp, &p)] {
            prop_assert!((0.0..=1.0).contains(&update.gliq), "gliq = {}", update.gliq);
            if let Some(temp) = update.temp {
                prop_assert!(temp.is_finite());
            }
        }
    }

    #[test]
    fn solvent_cells_have_finite_updates((alloy, p) in strategy_input(), cp in 0.1..10.0) {
        let p = CellPoint { conc_pre: 0.0, ..p };
        let coefs = ThermalCoefs { rho_l_over_dt: 1.0, cp_over_l: cp / alloy.latent_heat };
        for update in [gl_taylor(&alloy, coefs.cp_over_l, &p), gl_path(&alloy, cp, &p)] {
            prop_assert!(update.gliq.is_finite() && update.eta.is_finite());
            prop_assert!(update.temp.map_or(true, f64::is_finite));
        }
        for update in [thm_taylor(&alloy, &coefs, &p, 1.0), thm_path(&alloy, &coefs, &p, 1.0, true)] {
            prop_assert!(update.reaction.is_finite() && update.source.is_finite());
        }
    }

    #[test]
    fn classification_is_exhaustive((alloy, p) in strategy_input()) {
        let state = alloy.state(p.temp, p.conc);
        let t_liq = alloy.t_liquidus(p.conc);
        match state {
            Liquid => prop_assert!(p.temp > t_liq),
            Mushy => prop_assert!(p.temp <= t_liq && p.temp > alloy.t_solidus(p.conc)),
            Solid | Eutectic => prop_assert!(p.temp <= alloy.t_solidus(p.conc)),
        }
    }
}

#[test]
fn voller_cell_update() {
    let voller = VollerModel::new(VollerParam {
        t_solidus: 0.0,
        t_liquidus: 2.0,
        latent_heat: 3.0,
        s_das: 1.0,
    })
    .unwrap();
    assert_eq!(voller.dgldt(), 0.5);

    let mushy = voller.update_cell(1.0, 2.0, 4.0, 10.0, 1e-3);
    assert_eq!(mushy.state, Mushy);
    assert_eq!(mushy.gliq, 0.5);
    assert_eq!(mushy.reaction, 4.0);
    assert_eq!(mushy.source, 8.0);
    assert_scalar_eq!(mushy.forcing, 10.0 * 0.25 / (0.125 + 1e-3), comp = abs, tol = 1e-12);

    let solid = voller.update_cell(-1.0, 2.0, 4.0, 10.0, 1e-3);
    assert_eq!(solid.state, Solid);
    assert_eq!(solid.gliq, 0.0);
    assert_eq!((solid.reaction, solid.source), (0.0, 0.0));
    assert_scalar_eq!(solid.forcing, 1e4, comp = abs, tol = 1e-9);

    let liquid = voller.update_cell(3.0, 2.0, 4.0, 10.0, 1e-3);
    assert_eq!(liquid.state, Liquid);
    assert_eq!((liquid.gliq, liquid.forcing), (1.0, 0.0));

    assert!(VollerModel::new(VollerParam {
        t_solidus: 1.0,
        t_liquidus: 1.0,
        ..Default::default()
    })
    .is_err());
}

fn voller_setup(mesh: &CdoMesh, initial_temperature: f64) -> (Solidification, CellScalarEquation) {
    let param = SolidificationParam {
        model: SolidificationModel::Voller(VollerParam {
            t_solidus: 0.0,
            t_liquidus: 1.0,
            latent_heat: 1.0,
            s_das: 0.1,
        }),
        viscosity: 2.0,
        thermal_dilatation: 0.1,
        gravity: [0.0, 0.0, -10.0],
        rho0: 2.0,
        permanent_solid_cells: vec![0],
        ..Default::default()
    };
    let solidification = Solidification::new(param, mesh).unwrap();
    let thermal = CellScalarEquation::new(
        ScalarEquationParam {
            name: String::from("temperature"),
            time: Some(Property::Uniform(2.0)),
            initial_value: initial_temperature,
            ..Default::default()
        },
        mesh,
    )
    .unwrap();
    (solidification, thermal)
}

#[test]
fn voller_coupling_with_permanent_solid_cells() {
    let mesh = create_unit_box_hex_mesh(2).unwrap();
    let comm = SerialCommunicator;
    let ts = TimeStep::new(0.1);
    let (mut solidification, mut thermal) = voller_setup(&mesh, 0.5);
    assert!(!solidification.is_binary_alloy());
    assert_scalar_eq!(solidification.forcing_coef(), 36000.0, comp = abs, tol = 1e-8);
    assert!(solidification.is_permanent_solid(0));
    assert_eq!(solidification.liquid_fraction()[0], 0.0);

    solidification.initialize(&mesh, &ts, &thermal, None, &comm).unwrap();
    let info = solidification
        .compute(&mesh, &ts, &mut thermal, None, &mut solver(), &comm)
        .unwrap();
    assert!(info.converged);
    assert_eq!(solidification.n_iter(), 1);

    // The linearized latent heat keeps the temperature at its fixed point
    for &temp in thermal.values() {
        assert_scalar_eq!(temp, 0.5, comp = abs, tol = 1e-10);
    }
    assert_eq!(solidification.cell_state()[0], Solid);
    assert_eq!(solidification.counts().get(Solid), 1);
    assert_eq!(solidification.counts().get(Mushy), 7);
    assert_eq!(solidification.solid_cells(), &[0]);
    assert_eq!(solidification.forcing()[0], solidification.forcing_coef() / 1e-3);
    assert_eq!(solidification.thermal_reaction()[0], 0.0);
    for c in 1..8 {
        assert_scalar_eq!(solidification.liquid_fraction()[c], 0.5, comp = abs, tol = 1e-10);
        assert_scalar_eq!(solidification.thermal_reaction()[c], 2.0 / 0.1, comp = abs, tol = 1e-12);
    }
    assert_eq!(solidification.previous_liquid_fraction()[1], 0.5);

    let metrics = solidification.metrics(&mesh, Some(thermal.values()), &comm);
    assert_scalar_eq!(metrics.state_ratio[Solid.index()], 12.5, comp = abs, tol = 1e-10);
    assert_scalar_eq!(metrics.state_ratio[Mushy.index()], 87.5, comp = abs, tol = 1e-10);
    assert_scalar_eq!(metrics.solidification_rate, 7.0 * 0.5 / 8.0, comp = abs, tol = 1e-10);
    assert_eq!(metrics.segregation_index, None);

    // rho0 (-beta (T - T_ref)) g
    for source in solidification.boussinesq_source(thermal.values()) {
        assert_matrix_eq!(source, Vector3::new(0.0, 0.0, 1.0), comp = abs, tol = 1e-10);
    }
    assert!(solidification.liquidus_temperature(thermal.values()).is_none());
    assert!(solidification.advanced_analysis(thermal.values(), thermal.values()).is_none());
    solidification.write_restart().unwrap();
    solidification.read_restart().unwrap();
}

#[test]
fn invalid_solidification_setups() {
    let mesh = create_unit_box_hex_mesh(1).unwrap();

    let param = SolidificationParam {
        permanent_solid_cells: vec![1],
        ..Default::default()
    };
    let err = Solidification::new(param, &mesh).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SetupError>(),
        Some(SetupError::InvalidParameter { .. })
    ));

    let param = SolidificationParam {
        solute_source_term: true,
        ..alloy_solidification(GlStrategy::Path)
    };
    let err = Solidification::new(param, &mesh).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SetupError>(),
        Some(SetupError::IncompatibleStrategy {
            strategy: GlStrategy::Path,
            ..
        })
    ));

    let mut param = alloy_solidification(GlStrategy::Taylor);
    if let SolidificationModel::BinaryAlloy(alloy) = &mut param.model {
        alloy.s_das = 0.0;
    }
    assert!(Solidification::new(param, &mesh).is_err());

    // The binary alloy model needs the solute equation
    let comm = SerialCommunicator;
    let ts = TimeStep::new(1.0);
    let mut solidification = Solidification::new(alloy_solidification(GlStrategy::Taylor), &mesh).unwrap();
    let mut thermal = PrescribedEquation::constant(vec![0.0]);
    let err = solidification.initialize(&mesh, &ts, &thermal, None, &comm).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SetupError>(),
        Some(SetupError::MissingEquation { name: "solute" })
    ));
    let err = solidification
        .compute(&mesh, &ts, &mut thermal, None, &mut solver(), &comm)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SetupError>(),
        Some(SetupError::MissingEquation { .. })
    ));
}

#[test]
fn legacy_cooling_of_a_single_cell() {
    let mesh = create_unit_box_hex_mesh(1).unwrap();
    let comm = SerialCommunicator;
    let ts = TimeStep::new(1.0);

    // Cooling from the liquid to below the solidus temperature (-20/3) at C = 1
    let temperatures: Vec<f64> = (0..10).map(|k| -1.0 - k as f64 * (20.0 / 3.0) / 9.0).collect();
    let mut thermal = PrescribedEquation::with_solutions(
        vec![-0.5],
        temperatures.iter().map(|&t| vec![t]).collect(),
    );
    let mut solute = PrescribedEquation::constant(vec![1.0]);

    let mut solidification = Solidification::new(alloy_solidification(GlStrategy::Legacy), &mesh).unwrap();
    solidification
        .initialize(&mesh, &ts, &thermal, Some(&solute as &dyn ScalarEquation), &comm)
        .unwrap();
    assert_eq!(solidification.liquid_concentration(), Some(&[1.0][..]));

    let mut states = Vec::new();
    let mut liquid_fractions = Vec::new();
    for &temp in &temperatures {
        let info = solidification
            .compute(
                &mesh,
                &ts,
                &mut thermal,
                Some(&mut solute as &mut dyn ScalarEquation),
                &mut solver(),
                &comm,
            )
            .unwrap();
        assert!(info.converged);
        assert_eq!(info.n_iter, 2);
        assert_eq!(info.delta_temp, 0.0);
        assert_eq!(thermal.values(), &[temp]);
        states.push(solidification.cell_state()[0]);
        liquid_fractions.push(solidification.liquid_fraction()[0]);
    }

    let expected_states = [Liquid, Liquid, Mushy, Mushy, Mushy, Mushy, Mushy, Mushy, Solid, Solid];
    assert_eq!(states, expected_states);
    assert!(liquid_fractions.windows(2).all(|w| w[1] <= w[0]));
    assert_eq!(liquid_fractions[..2], [1.0, 1.0]);
    assert_eq!(liquid_fractions[9], 0.0);
    let alloy = alloy();
    for k in 2..8 {
        assert_scalar_eq!(liquid_fractions[k], alloy.gl_mushy(temperatures[k], 1.0), comp = abs, tol = 1e-14);
    }

    // Concentration of the liquid when the cell became solid
    assert_scalar_eq!(
        solidification.liquid_concentration().unwrap()[0],
        1.0 / 0.3,
        comp = abs,
        tol = 1e-12
    );
    assert_eq!(solidification.solid_cells(), &[0]);
    assert_eq!(solidification.n_iter(), 2);
    assert!(solidification.forcing()[0] > 0.0);
    assert!(solidification.extrapolated_temperature().is_none());
    assert!(solidification.solute_diffusion().is_none());

    let metrics = solidification.metrics(&mesh, Some(solute.values()), &comm);
    assert_eq!(metrics.segregation_index, Some(0.0));
    assert_scalar_eq!(metrics.solidification_rate, 1.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(metrics.state_ratio[Solid.index()], 100.0, comp = abs, tol = 1e-12);
}

#[test]
fn binary_alloy_outputs() {
    let mesh = create_unit_box_hex_mesh(2).unwrap();
    let comm = SerialCommunicator;
    let ts = TimeStep::new(1.0);
    let mut param = alloy_solidification(GlStrategy::Path);
    param.permanent_solid_cells = vec![3];
    param.gravity = [0.0, -1.0, 0.0];
    param.use_extrapolation = true;
    if let SolidificationModel::BinaryAlloy(alloy) = &mut param.model {
        alloy.dilatation_coef = 0.5;
        alloy.solute_diffusivity = 1e-3;
    }
    let mut solidification = Solidification::new(param, &mesh).unwrap();
    assert!(solidification.is_binary_alloy());
    assert_eq!(solidification.solute_diffusion().map(<[f64]>::len), Some(8));

    // A liquid state that does not evolve
    let mut thermal = PrescribedEquation::constant(vec![1.0; 8]);
    let mut solute = PrescribedEquation::constant(vec![2.0; 8]);
    solidification
        .initialize(&mesh, &ts, &thermal, Some(&solute as &dyn ScalarEquation), &comm)
        .unwrap();
    let info = solidification
        .compute(
            &mesh,
            &ts,
            &mut thermal,
            Some(&mut solute as &mut dyn ScalarEquation),
            &mut solver(),
            &comm,
        )
        .unwrap();
    assert!(info.converged);
    assert_eq!(info.n_iter, 1);
    assert_eq!(thermal.n_solves, 1);
    assert_eq!(solute.n_solves, 1);
    assert_eq!(solidification.extrapolated_temperature(), Some(&[1.0; 8][..]));
    assert_eq!(solidification.extrapolated_concentration(), Some(&[2.0; 8][..]));

    assert_eq!(solidification.counts().get(Liquid), 7);
    assert_eq!(solidification.solid_cells(), &[3]);
    assert_eq!(solidification.liquid_concentration().unwrap()[3], 0.0);
    assert_eq!(solidification.eta().unwrap()[0], 1.0);
    // Diffusion follows the liquid fraction
    let diffusion = solidification.solute_diffusion().unwrap();
    assert_scalar_eq!(diffusion[0], 1e-3, comp = abs, tol = 1e-18);
    assert_eq!(diffusion[3], 1e-16);

    let liquidus = solidification.liquidus_temperature(solute.values()).unwrap();
    assert_eq!(liquidus[0], -4.0);
    assert_eq!(liquidus[3], PERMANENT_SOLID_LIQUIDUS);

    let analysis = solidification
        .advanced_analysis(thermal.values(), solute.values())
        .unwrap();
    assert_eq!(analysis.cliq_minus_cbulk[0], 0.0);
    assert_eq!(analysis.tbulk_minus_tliq[0], 5.0);

    // rho0 (-beta_c (C_l - C_ref)) g, no thermal dilatation
    let source = solidification.boussinesq_source(thermal.values());
    assert_matrix_eq!(source[0], Vector3::new(0.0, 0.5, 0.0), comp = abs, tol = 1e-14);
    assert_matrix_eq!(source[3], Vector3::new(0.0, -0.5, 0.0), comp = abs, tol = 1e-14);

    let metrics = solidification.metrics(&mesh, Some(solute.values()), &comm);
    assert_scalar_eq!(metrics.segregation_index.unwrap(), 7.0_f64.sqrt() / 8.0_f64.sqrt(), comp = abs, tol = 1e-12);
    assert_scalar_eq!(metrics.solidification_rate, 0.0, comp = abs, tol = 1e-14);
}
