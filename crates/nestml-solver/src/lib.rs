//! # nestml-solver
//!
//! C8: the ODE analysis driver. Takes the canonicalized `equations` IR from
//! `nestml-equations`, serializes it into the external symbolic solver's
//! request protocol (spec.md §6), invokes a [`transport::SolverTransport`],
//! and folds the reply back into a per-model [`SolverAnalysis`]: either a
//! full analytic substitution (generated state variables + propagator
//! internals, no `convolve`/`shape` left to carry downstream) or a numeric-
//! mode annotation for the (out-of-scope) code generator's integrator.
//!
//! This crate owns the *protocol and fold-back*, not a real CAS: the
//! transport is a sum type (`Transport::Available(process) |
//! Transport::Unavailable`, see `crate::transport`), so tests exercise the
//! fold-back logic against canned [`protocol::SolverReply`] values without
//! a solver binary anywhere on `PATH`.

pub mod fold;
pub mod protocol;
pub mod transport;

use std::time::Duration;

use indexmap::IndexMap;

use nestml_core::{Diagnostic, SourceRange};
use nestml_equations::{EquationsAnalysis, EquationsIr, ShapeKind};
use nestml_parser::{Block, CompilationUnit, Model};

use fold::{fold_constants, initial_value_of, strip_expr};
use protocol::{DynamicsEntry, ParameterEntry, SolverKind, SolverOptions, SolverReply, SolverRequest, SolverStatus, StateVector};
use transport::{SolverTransport, TransportError};

/// Default per-unit solver timeout (spec.md §5: "60 s per unit").
pub const DEFAULT_SOLVER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    Analytic,
    Numeric,
}

/// A state variable the solver generated to replace a `shape` binding (and
/// every `convolve(...)` that referenced it), with its discrete per-step
/// update rule already folded in.
#[derive(Debug, Clone)]
pub struct GeneratedStateVariable {
    pub name: String,
    pub initial_value: f64,
    pub update_expression: String,
}

#[derive(Debug, Clone, Default)]
pub struct ModelOdeAnalysis {
    /// `None` when analysis didn't run at all (no `equations` block, or a
    /// malformed/unit-inconsistent reply halted this model's C8 pass).
    pub mode: Option<AnalysisMode>,
    pub generated_state_variables: IndexMap<String, GeneratedStateVariable>,
    /// Propagator coefficients, to be installed as new `internal`
    /// declarations by the downstream generator.
    pub generated_internals: IndexMap<String, f64>,
    /// `(shape, port) -> generated variable name` for every `convolve`
    /// occurrence the analytic rewrite resolved.
    pub convolve_replacements: IndexMap<(String, String), String>,
    pub rewritten_shapes: Vec<String>,
}

impl ModelOdeAnalysis {
    /// True once every `shape`/`convolve` this model declared has a
    /// generated replacement — the invariant spec.md §3 requires after C8
    /// for the analytic path.
    pub fn fully_rewritten(&self, ir: &EquationsIr) -> bool {
        self.mode == Some(AnalysisMode::Analytic) && ir.shapes.keys().all(|name| self.rewritten_shapes.contains(name))
    }

    /// The generated state variables' initial values, in declaration order,
    /// as the flat vector a downstream numeric integrator would advance one
    /// step at a time (mirrors `oldies-core::StateVector`'s role for the
    /// teacher's own simulators).
    pub fn initial_state_vector(&self) -> StateVector {
        StateVector::from_iter(self.generated_state_variables.values().map(|v| v.initial_value))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SolverAnalysis {
    pub models: IndexMap<String, ModelOdeAnalysis>,
}

fn blocks_of(model: &Model) -> &[Block] {
    match model {
        Model::Neuron(n) => &n.blocks,
        Model::Synapse(s) => &s.blocks,
    }
}

/// Run C8 for every model in `unit` that declared an `equations` block.
/// `sim_time_resolution` is the solver request's `options.sim_time_resolution`
/// (spec.md §6), conventionally the simulator's configured timestep.
pub fn analyze_odes(
    unit: &CompilationUnit,
    equations: &EquationsAnalysis,
    transport: &dyn SolverTransport,
    timeout: Duration,
    sim_time_resolution: f64,
) -> (SolverAnalysis, Vec<Diagnostic>) {
    let mut analysis = SolverAnalysis::default();
    let mut diagnostics = Vec::new();

    for model in &unit.models {
        let name = model.name().to_string();
        let Some(ir) = equations.models.get(&name) else { continue };
        if ir.shapes.is_empty() && ir.state_odes.is_empty() {
            continue;
        }

        let blocks = blocks_of(model);
        let consts = fold_constants(blocks);
        let request = build_request(ir, blocks, &consts, sim_time_resolution);

        log::debug!("dispatching ODE analysis request for model '{name}' ({} dynamics rows)", request.dynamics.len());

        let result = transport.solve(&request, timeout);
        let model_analysis = match result {
            Ok(reply) => fold_reply(&name, ir, reply, &mut diagnostics),
            Err(TransportError::Timeout) => {
                diagnostics.push(Diagnostic::warn(
                    "SolverTimeout",
                    SourceRange::unknown(),
                    format!("ODE solver did not reply for '{name}' within {timeout:?}; falling back to numeric integration"),
                ));
                ModelOdeAnalysis {
                    mode: Some(AnalysisMode::Numeric),
                    ..Default::default()
                }
            }
            Err(TransportError::Unavailable) => {
                diagnostics.push(Diagnostic::warn(
                    "SolverUnavailable",
                    SourceRange::unknown(),
                    format!("no ODE solver process is configured; '{name}' will use numeric integration"),
                ));
                ModelOdeAnalysis {
                    mode: Some(AnalysisMode::Numeric),
                    ..Default::default()
                }
            }
            Err(TransportError::MalformedReply(msg)) => {
                diagnostics.push(Diagnostic::error(
                    "SolverReplyMalformed",
                    SourceRange::unknown(),
                    format!("solver reply for '{name}' could not be parsed: {msg}"),
                ));
                ModelOdeAnalysis::default()
            }
            Err(other) => {
                diagnostics.push(Diagnostic::error(
                    "SolverTransportFailure",
                    SourceRange::unknown(),
                    format!("ODE solver invocation failed for '{name}': {other}"),
                ));
                ModelOdeAnalysis::default()
            }
        };

        analysis.models.insert(name, model_analysis);
    }

    (analysis, diagnostics)
}

fn build_request(ir: &EquationsIr, blocks: &[Block], consts: &IndexMap<String, f64>, sim_time_resolution: f64) -> SolverRequest {
    let mut dynamics = Vec::new();

    for shape in ir.shapes.values() {
        let order = match shape.kind {
            ShapeKind::Direct | ShapeKind::Delta => 0,
            ShapeKind::OdeDefined { order } => order,
        };
        dynamics.push(DynamicsEntry {
            name: shape.name.clone(),
            expression: strip_expr(&shape.inlined_rhs),
            initial_value: initial_value_of(blocks, &shape.name, consts),
            order,
        });
    }

    for ode in ir.state_odes.values() {
        dynamics.push(DynamicsEntry {
            name: ode.target.clone(),
            expression: strip_expr(&ode.inlined_rhs),
            initial_value: initial_value_of(blocks, &ode.target, consts),
            order: ode.order,
        });
    }

    let parameters = consts
        .iter()
        .map(|(name, value)| ParameterEntry {
            name: name.clone(),
            value: *value,
        })
        .collect();

    SolverRequest {
        dynamics,
        parameters,
        options: SolverOptions { sim_time_resolution },
    }
}

fn fold_reply(model_name: &str, ir: &EquationsIr, reply: SolverReply, diagnostics: &mut Vec<Diagnostic>) -> ModelOdeAnalysis {
    match reply.status {
        SolverStatus::Failure => {
            diagnostics.push(Diagnostic::warn(
                "SolverFallbackToNumeric",
                SourceRange::unknown(),
                format!("solver declined an analytic solution for '{model_name}'; falling back to numeric integration"),
            ));
            return ModelOdeAnalysis {
                mode: Some(AnalysisMode::Numeric),
                ..Default::default()
            };
        }
        SolverStatus::Partial => {
            diagnostics.push(Diagnostic::warn(
                "SolverPartialReply",
                SourceRange::unknown(),
                format!("solver returned a partial analytic solution for '{model_name}'; falling back to numeric integration"),
            ));
            return ModelOdeAnalysis {
                mode: Some(AnalysisMode::Numeric),
                ..Default::default()
            };
        }
        SolverStatus::Success => {}
    }

    match reply.solver {
        None | Some(SolverKind::Numeric) => ModelOdeAnalysis {
            mode: Some(AnalysisMode::Numeric),
            ..Default::default()
        },
        Some(SolverKind::Analytical) => fold_analytic_reply(model_name, ir, reply, diagnostics),
    }
}

fn fold_analytic_reply(model_name: &str, ir: &EquationsIr, reply: SolverReply, diagnostics: &mut Vec<Diagnostic>) -> ModelOdeAnalysis {
    if reply.state_variables.is_empty() {
        diagnostics.push(Diagnostic::error(
            "SolverReplyMalformed",
            SourceRange::unknown(),
            format!("analytic reply for '{model_name}' names no generated state variables"),
        ));
        return ModelOdeAnalysis::default();
    }

    for sv in &reply.state_variables {
        if !ir.shapes.contains_key(sv) && !ir.state_odes.contains_key(sv) {
            diagnostics.push(Diagnostic::error(
                "SolverUnitInconsistency",
                SourceRange::unknown(),
                format!("solver reply for '{model_name}' references generated variable '{sv}' absent from the request; cannot restore its physical unit"),
            ));
            return ModelOdeAnalysis::default();
        }
    }

    let mut generated = IndexMap::new();
    for sv in &reply.state_variables {
        let Some(update_expression) = reply.update_expressions.get(sv) else {
            diagnostics.push(Diagnostic::error(
                "SolverReplyMalformed",
                SourceRange::unknown(),
                format!("analytic reply for '{model_name}' is missing an update expression for generated variable '{sv}'"),
            ));
            continue;
        };
        let initial_value = reply.initial_values.get(sv).copied().unwrap_or(0.0);
        generated.insert(
            sv.clone(),
            GeneratedStateVariable {
                name: sv.clone(),
                initial_value,
                update_expression: update_expression.clone(),
            },
        );
    }

    let mut generated_internals = IndexMap::new();
    if let Some(matrix) = &reply.propagator {
        for ((i, j), coeff) in matrix.indexed_iter() {
            generated_internals.insert(format!("__P_{i}_{j}"), *coeff);
        }
    }

    let mut convolve_replacements = IndexMap::new();
    for occ in &ir.convolves {
        if generated.contains_key(&occ.shape) {
            convolve_replacements.insert((occ.shape.clone(), occ.port.clone()), occ.shape.clone());
        }
    }

    let rewritten_shapes: Vec<String> = ir.shapes.keys().filter(|name| generated.contains_key(*name)).cloned().collect();

    if let Some(report) = &reply.stiffness_report {
        diagnostics.push(Diagnostic::info(
            "SolverStiffnessReport",
            SourceRange::unknown(),
            format!("stiffness test for '{model_name}': {report}"),
        ));
    }

    ModelOdeAnalysis {
        mode: Some(AnalysisMode::Analytic),
        generated_state_variables: generated,
        generated_internals,
        convolve_replacements,
        rewritten_shapes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap as Map;
    use protocol::propagator_from_rows;
    use std::path::PathBuf;

    struct StubTransport(SolverReply);

    impl SolverTransport for StubTransport {
        fn solve(&self, _request: &SolverRequest, _timeout: Duration) -> Result<SolverReply, TransportError> {
            Ok(self.0.clone())
        }
    }

    struct FailingTransport(TransportError);

    impl SolverTransport for FailingTransport {
        fn solve(&self, _request: &SolverRequest, _timeout: Duration) -> Result<SolverReply, TransportError> {
            Err(match &self.0 {
                TransportError::Timeout => TransportError::Timeout,
                TransportError::Unavailable => TransportError::Unavailable,
                _ => TransportError::Unavailable,
            })
        }
    }

    fn analyze(source: &str, transport: &dyn SolverTransport) -> (SolverAnalysis, Vec<Diagnostic>, EquationsIr) {
        let (unit, parse_diags) = nestml_parser::parse_file(&PathBuf::from("m.nestml"), source, None);
        assert!(parse_diags.is_empty(), "unexpected parse diagnostics: {parse_diags:?}");
        let (symbols, _) = nestml_symbols::build_symbol_table(&unit);
        let (equations, _) = nestml_equations::analyze_equations(&unit, &symbols);
        let (analysis, diags) = analyze_odes(&unit, &equations, transport, Duration::from_secs(1), 0.1);
        let ir = equations.models["N"].clone();
        (analysis, diags, ir)
    }

    const ALPHA_SYNAPSE_MODEL: &str = r#"
neuron N:
    state:
        V_m mV = 0 mV
        g_ex nS = 0 nS
    end
    input:
        spikeExc <- excitatory spike
    end
    equations:
        shape g_ex = exp(-t/tau_syn_ex)
        V_m' = -convolve(g_ex, spikeExc) / C_m
    end
end
"#;

    #[test]
    fn analytic_reply_rewrites_shape_and_convolve() {
        let mut update_expressions = Map::new();
        update_expressions.insert("g_ex".to_string(), "g_ex * __P_0_0".to_string());
        let mut initial_values = Map::new();
        initial_values.insert("g_ex".to_string(), 0.0);

        let reply = SolverReply {
            status: SolverStatus::Success,
            solver: Some(SolverKind::Analytical),
            propagator: Some(propagator_from_rows(vec![vec![0.9048374180359595]])),
            update_expressions,
            initial_values,
            state_variables: vec!["g_ex".to_string()],
            stiffness_report: None,
        };

        let (analysis, diags, ir) = analyze(ALPHA_SYNAPSE_MODEL, &StubTransport(reply));
        assert!(diags.iter().all(|d| d.severity < nestml_core::Severity::Error), "unexpected diagnostics: {diags:?}");

        let model = &analysis.models["N"];
        assert_eq!(model.mode, Some(AnalysisMode::Analytic));
        assert!(model.fully_rewritten(&ir));
        assert!(model.generated_state_variables.contains_key("g_ex"));
        assert_eq!(
            model.convolve_replacements.get(&("g_ex".to_string(), "spikeExc".to_string())),
            Some(&"g_ex".to_string())
        );
        assert!(model.generated_internals.contains_key("__P_0_0"));
        assert_eq!(model.initial_state_vector(), StateVector::from_vec(vec![0.0]));
    }

    #[test]
    fn failure_status_falls_back_to_numeric_with_warn() {
        let reply = SolverReply {
            status: SolverStatus::Failure,
            solver: None,
            propagator: None,
            update_expressions: Map::new(),
            initial_values: Map::new(),
            state_variables: vec![],
            stiffness_report: None,
        };

        let (analysis, diags, ir) = analyze(ALPHA_SYNAPSE_MODEL, &StubTransport(reply));
        let model = &analysis.models["N"];
        assert_eq!(model.mode, Some(AnalysisMode::Numeric));
        assert!(model.generated_state_variables.is_empty());
        assert!(!model.fully_rewritten(&ir), "no convolve should be rewritten on fallback");
        assert!(diags.iter().any(|d| d.code == "SolverFallbackToNumeric" && d.severity == nestml_core::Severity::Warn));
    }

    #[test]
    fn timeout_falls_back_to_numeric_with_warn() {
        let (analysis, diags, _ir) = analyze(ALPHA_SYNAPSE_MODEL, &FailingTransport(TransportError::Timeout));
        assert_eq!(analysis.models["N"].mode, Some(AnalysisMode::Numeric));
        assert!(diags.iter().any(|d| d.code == "SolverTimeout"));
    }

    #[test]
    fn unavailable_transport_falls_back_to_numeric_with_warn() {
        let (analysis, diags, _ir) = analyze(ALPHA_SYNAPSE_MODEL, &FailingTransport(TransportError::Unavailable));
        assert_eq!(analysis.models["N"].mode, Some(AnalysisMode::Numeric));
        assert!(diags.iter().any(|d| d.code == "SolverUnavailable"));
    }

    #[test]
    fn reply_referencing_unknown_variable_is_a_unit_inconsistency_error() {
        let mut update_expressions = Map::new();
        update_expressions.insert("mystery".to_string(), "0".to_string());
        let reply = SolverReply {
            status: SolverStatus::Success,
            solver: Some(SolverKind::Analytical),
            propagator: None,
            update_expressions,
            initial_values: Map::new(),
            state_variables: vec!["mystery".to_string()],
            stiffness_report: None,
        };

        let (analysis, diags, _ir) = analyze(ALPHA_SYNAPSE_MODEL, &StubTransport(reply));
        assert_eq!(analysis.models["N"].mode, None);
        assert!(diags.iter().any(|d| d.code == "SolverUnitInconsistency" && d.severity == nestml_core::Severity::Error));
    }

    #[test]
    fn ode_defined_shape_and_direct_shape_produce_equivalent_generated_state(
    ) {
        // spec.md §9 open question: both encodings of exponential decay must
        // be accepted and produce IR with the same generated-variable shape.
        let direct = r#"
neuron N:
    state:
        V_m mV = 0 mV
        g_ex nS = 0 nS
    end
    input:
        spikeExc <- excitatory spike
    end
    equations:
        shape g_ex = exp(-t/tau_syn_ex)
        V_m' = -convolve(g_ex, spikeExc) / C_m
    end
end
"#;
        let ode_defined = r#"
neuron N:
    state:
        V_m mV = 0 mV
        g_ex nS = 0 nS
    end
    input:
        spikeExc <- excitatory spike
    end
    equations:
        shape g_ex' = -g_ex / tau_syn_ex
        V_m' = -convolve(g_ex, spikeExc) / C_m
    end
end
"#;
        let mk_reply = || {
            let mut update_expressions = Map::new();
            update_expressions.insert("g_ex".to_string(), "g_ex * __P_0_0".to_string());
            SolverReply {
                status: SolverStatus::Success,
                solver: Some(SolverKind::Analytical),
                propagator: Some(propagator_from_rows(vec![vec![0.9]])),
                update_expressions,
                initial_values: Map::new(),
                state_variables: vec!["g_ex".to_string()],
                stiffness_report: None,
            }
        };

        let (direct_analysis, _, _) = analyze(direct, &StubTransport(mk_reply()));
        let (ode_analysis, _, _) = analyze(ode_defined, &StubTransport(mk_reply()));

        let a = &direct_analysis.models["N"];
        let b = &ode_analysis.models["N"];
        assert_eq!(a.generated_state_variables.keys().collect::<Vec<_>>(), b.generated_state_variables.keys().collect::<Vec<_>>());
        assert_eq!(a.convolve_replacements.len(), b.convolve_replacements.len());
    }
}
