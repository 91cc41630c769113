//! Parameters describing an equation to solve.
use crate::assembly::global::AssemblySync;
use crate::assembly::hodge::HodgeParam;
use crate::error::SetupError;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpaceScheme {
    VertexBased,
    EdgeBased,
    FaceBased,
    Hho,
}

/// Algorithm used to enforce Dirichlet boundary conditions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnforcementAlgorithm {
    #[default]
    Algebraic,
    Penalized,
    WeakNitsche,
    WeakSym,
}

/// Normalization of the residual used by the linear solver stopping criterion.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResidualNormalization {
    #[default]
    None,
    /// Euclidean norm of the right-hand side.
    Norm2Rhs,
    /// Right-hand side norm weighted by the volume attached to each DoF.
    WeightedRhs,
    /// Euclidean norm of the right-hand side restricted to DoFs that are not enforced.
    FilteredRhs,
}

/// Parameters of the sparse linear solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlesParam {
    pub rtol: f64,
    pub atol: f64,
    pub dtol: f64,
    pub n_max_iter: usize,
    pub resnorm_type: ResidualNormalization,
    pub verbosity: i32,
}

impl Default for SlesParam {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-14,
            dtol: 1e3,
            n_max_iter: 10000,
            resnorm_type: ResidualNormalization::None,
            verbosity: 0,
        }
    }
}

/// A material property, either uniform or given per cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Property {
    Uniform(f64),
    Cellwise(Vec<f64>),
}

impl Property {
    pub fn is_uniform(&self) -> bool {
        matches!(self, Self::Uniform(_))
    }

    /// Check that a cellwise property has one value per cell.
    pub fn check_len(&self, name: impl Into<String>, num_cells: usize) -> Result<(), SetupError> {
        match self {
            Self::Cellwise(values) if values.len() != num_cells => Err(SetupError::PropertyLength {
                name: name.into(),
                expected: num_cells,
                got: values.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Value in cell `c`.
    pub fn value_in_cell(&self, c: usize) -> f64 {
        match self {
            Self::Uniform(value) => *value,
            Self::Cellwise(values) => values[c],
        }
    }
}

pub type AnalyticVectorFn = dyn Fn(f64, &Point3<f64>) -> Vector3<f64> + Send + Sync;

/// A vector-valued analytic function of time and space.
#[derive(Clone)]
pub struct AnalyticFunction(pub Arc<AnalyticVectorFn>);

impl AnalyticFunction {
    pub fn new(f: impl Fn(f64, &Point3<f64>) -> Vector3<f64> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for AnalyticFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnalyticFunction")
    }
}

/// Definition of a vector field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ValueDef {
    Uniform([f64; 3]),
    /// Analytic definitions cannot be read from configuration files.
    #[serde(skip)]
    Analytic(AnalyticFunction),
}

impl ValueDef {
    pub fn evaluate(&self, time: f64, x: &Point3<f64>) -> Vector3<f64> {
        match self {
            Self::Uniform(value) => Vector3::from(*value),
            Self::Analytic(function) => (function.0)(time, x),
        }
    }
}

/// Set of boundary faces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryZone {
    All,
    Faces(Vec<usize>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BoundaryConditionKind {
    /// Homogeneous natural condition (nothing to enforce).
    HomogeneousNeumann,
    /// Prescribed tangential trace: the circulation along each boundary edge is set.
    Dirichlet(ValueDef),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryCondition {
    pub zone: BoundaryZone,
    pub kind: BoundaryConditionKind,
}

/// DoFs pinned to given values in the interior of the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalEnforcement {
    pub dof_ids: Vec<usize>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurlCurlParam {
    pub property: Property,
    #[serde(default)]
    pub hodge: HodgeParam,
}

/// Parameters of an equation: active terms, boundary and initial conditions, enforcement and
/// linear solver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EquationParam {
    pub name: String,
    pub space_scheme: SpaceScheme,
    pub curlcurl: Option<CurlCurlParam>,
    /// Reaction (zero-order) term, discretized with a lumped mass operator.
    pub reaction: Option<Property>,
    /// Unsteady term, discretized with an implicit Euler scheme and a lumped mass operator.
    pub time: Option<Property>,
    pub source_terms: Vec<ValueDef>,
    pub boundary_conditions: Vec<BoundaryCondition>,
    pub initial_conditions: Vec<ValueDef>,
    pub enforcement: EnforcementAlgorithm,
    pub penalization_coef: f64,
    pub internal_enforcement: Option<InternalEnforcement>,
    pub sles: SlesParam,
    pub assembly_sync: AssemblySync,
    pub verbosity: i32,
}

impl Default for EquationParam {
    fn default() -> Self {
        Self {
            name: String::from("unnamed"),
            space_scheme: SpaceScheme::EdgeBased,
            curlcurl: None,
            reaction: None,
            time: None,
            source_terms: Vec::new(),
            boundary_conditions: Vec::new(),
            initial_conditions: Vec::new(),
            enforcement: EnforcementAlgorithm::Algebraic,
            penalization_coef: crate::assembly::enforcement::DEFAULT_PENALIZATION_COEF,
            internal_enforcement: None,
            sles: SlesParam::default(),
            assembly_sync: AssemblySync::default(),
            verbosity: 0,
        }
    }
}

impl EquationParam {
    pub fn from_json_str(json: &str) -> eyre::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn has_curlcurl(&self) -> bool {
        self.curlcurl.is_some()
    }

    pub fn is_unsteady(&self) -> bool {
        self.time.is_some()
    }

    pub fn has_internal_enforcement(&self) -> bool {
        self.internal_enforcement
            .as_ref()
            .map_or(false, |enforcement| !enforcement.dof_ids.is_empty())
    }

    /// Check the combination of parameters for an edge-based vector equation on a mesh with
    /// `num_cells` cells.
    pub fn check_edge_based(&self, num_cells: usize) -> Result<(), SetupError> {
        if self.space_scheme != SpaceScheme::EdgeBased {
            return Err(SetupError::InvalidSpaceScheme {
                equation: self.name.clone(),
                scheme: self.space_scheme,
            });
        }
        match self.enforcement {
            EnforcementAlgorithm::Algebraic | EnforcementAlgorithm::Penalized => {}
            algorithm => {
                return Err(SetupError::UnsupportedEnforcement {
                    equation: self.name.clone(),
                    algorithm,
                })
            }
        }
        if let Some(enforcement) = &self.internal_enforcement {
            if enforcement.dof_ids.len() != enforcement.values.len() {
                return Err(SetupError::InvalidParameter {
                    name: format!("{}.internal_enforcement", self.name),
                    reason: String::from("one value per enforced DoF is required"),
                });
            }
        }
        let properties = [
            ("curlcurl", self.curlcurl.as_ref().map(|cc| &cc.property)),
            ("reaction", self.reaction.as_ref()),
            ("time", self.time.as_ref()),
        ];
        for (term, property) in properties {
            if let Some(property) = property {
                property.check_len(format!("{}.{term}", self.name), num_cells)?;
            }
        }
        if let Some(Property::Cellwise(values)) = self.curlcurl.as_ref().map(|cc| &cc.property) {
            if values.iter().any(|&v| v < 0.0) {
                return Err(SetupError::InvalidParameter {
                    name: format!("{}.curlcurl", self.name),
                    reason: String::from("the property must be non-negative"),
                });
            }
        }
        Ok(())
    }
}
