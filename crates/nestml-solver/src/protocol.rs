//! Wire types for the external symbolic-solver exchange (spec.md §6).
//!
//! The driver never assumes anything about *how* the reply was produced —
//! only this JSON shape. A stub transport in tests constructs [`SolverReply`]
//! values directly; [`crate::transport::ProcessTransport`] round-trips them
//! through a subprocess.

use indexmap::IndexMap;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// One row of the differential system handed to the solver: a shape's
/// defining equation or a state variable's ODE, with units already stripped
/// (spec.md §4.7: "unit information is stripped... before handoff").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicsEntry {
    pub name: String,
    pub expression: String,
    pub initial_value: f64,
    /// `0` for a direct (closed-form) shape, `1`/`2` for an ODE-defined
    /// shape or state ODE of that derivative order.
    pub order: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverOptions {
    pub sim_time_resolution: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverRequest {
    pub dynamics: Vec<DynamicsEntry>,
    pub parameters: Vec<ParameterEntry>,
    pub options: SolverOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverStatus {
    Success,
    Partial,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    Analytical,
    Numeric,
}

/// A propagator matrix for a linear ODE subsystem: `propagator[i][j]`
/// advances generated state variable `i` by the contribution of `j` over
/// one fixed time step. Backed by `ndarray::Array2`, as `oldies-core`'s
/// `StateVector`/matrix types are, rather than a hand-rolled nested `Vec`.
pub type PropagatorMatrix = Array2<f64>;

/// A flat vector of generated state variables' values — the shape
/// `oldies-core::StateVector` (`ndarray::Array1<f64>`) gives a model's
/// integrator state, reused here for the analytic fold-back's generated
/// initial-value vector.
pub type StateVector = ndarray::Array1<f64>;

/// Build a [`PropagatorMatrix`] from row-major nested rows, as constructed
/// from a decoded wire reply or by a test's canned [`SolverReply`].
pub fn propagator_from_rows(rows: Vec<Vec<f64>>) -> PropagatorMatrix {
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, Vec::len);
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((nrows, ncols), flat).expect("row lengths must agree to form a matrix")
}

/// The wire encoding for [`PropagatorMatrix`] is a plain nested JSON array
/// (`[[p00, p01], [p10, p11]]`), matching what an external solver process
/// emits; `ndarray`'s own `Serialize`/`Deserialize` impl uses a different,
/// shape-tagged representation, so the wire format is handled explicitly
/// here instead.
mod propagator_wire {
    use ndarray::Array2;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Array2<f64>>, serializer: S) -> Result<S::Ok, S::Error> {
        let rows = value.as_ref().map(|m| m.outer_iter().map(|row| row.to_vec()).collect::<Vec<_>>());
        rows.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Array2<f64>>, D::Error> {
        let rows = Option::<Vec<Vec<f64>>>::deserialize(deserializer)?;
        rows.map(|rows| {
            let nrows = rows.len();
            let ncols = rows.first().map_or(0, Vec::len);
            let flat: Vec<f64> = rows.into_iter().flatten().collect();
            Array2::from_shape_vec((nrows, ncols), flat).map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverReply {
    pub status: SolverStatus,
    #[serde(default)]
    pub solver: Option<SolverKind>,
    #[serde(default, with = "propagator_wire")]
    pub propagator: Option<PropagatorMatrix>,
    #[serde(default)]
    pub update_expressions: IndexMap<String, String>,
    #[serde(default)]
    pub initial_values: IndexMap<String, f64>,
    #[serde(default)]
    pub state_variables: Vec<String>,
    /// Stiffness-test verdicts, observed but never used to gate code
    /// generation (spec.md §4.7: "recorded as informational diagnostics").
    #[serde(default)]
    pub stiffness_report: Option<String>,
}
