//! End-to-end exercises of the §8 concrete scenarios, driving the
//! orchestrator the way `main.rs` does but without spawning the binary.

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;

use nestml_cli::config::{LoggingLevel, PipelineConfig};
use nestml_cli::pipeline::run_unit;
use nestml_core::Severity;
use nestml_solver::protocol::{propagator_from_rows, SolverKind, SolverReply, SolverRequest, SolverStatus};
use nestml_solver::transport::{SolverTransport, TransportError};

struct Unavailable;
impl SolverTransport for Unavailable {
    fn solve(&self, _request: &SolverRequest, _timeout: Duration) -> Result<SolverReply, TransportError> {
        Err(TransportError::Unavailable)
    }
}

struct Canned(SolverReply);
impl SolverTransport for Canned {
    fn solve(&self, _request: &SolverRequest, _timeout: Duration) -> Result<SolverReply, TransportError> {
        Ok(self.0.clone())
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        input_path: PathBuf::from("."),
        target_path: None,
        model_root: None,
        logging_level: LoggingLevel::Info,
        module_name: None,
        suffix: None,
        dev: false,
        store_log: false,
        solver_command: None,
        solver_timeout_secs: 1,
        sim_time_resolution: 0.1,
    }
}

/// Scenario 1: a minimal accepted neuron produces no diagnostics at all.
#[test]
fn minimal_neuron_is_accepted_with_no_diagnostics() {
    let source = "neuron N:\n    state:\n        V_m mV = 0 mV\n    end\n    output:\n        spike\n    end\n    update:\n    end\nend\n";
    let report = run_unit(&PathBuf::from("models/a/b/c.nestml"), source, &config(), &Unavailable);
    assert!(report.diagnostics.is_empty(), "unexpected diagnostics: {:?}", report.diagnostics);
    assert_eq!(report.unit.models.len(), 1);
}

/// Scenario 2: initializing a `mV` state variable with a `pA` literal is a
/// unit mismatch, named by both units in the message.
#[test]
fn unit_mismatched_initializer_is_an_error() {
    let source = "neuron N:\n    state:\n        V_m mV = 0 pA\n    end\n    update:\n    end\nend\n";
    let report = run_unit(&PathBuf::from("m.nestml"), source, &config(), &Unavailable);
    let error = report
        .diagnostics
        .iter()
        .find(|d| d.code == "UnitMismatch")
        .unwrap_or_else(|| panic!("expected a UnitMismatch ERROR, got: {:?}", report.diagnostics));
    assert_eq!(error.severity, Severity::Error);
    assert!(error.message.contains("unit mismatch"), "message: {}", error.message);
}

/// Scenario 3: an analytic solver reply for the alpha-synapse encoding
/// rewrites the shape and its `convolve` occurrence away.
#[test]
fn analytic_solver_reply_rewrites_alpha_synapse_shape() {
    let source = r#"
neuron N:
    state:
        V_m mV = 0 mV
    end
    parameters:
        tau_syn_ex ms = 2 ms
        C_m pF = 250 pF
    end
    input:
        spikeExc <- excitatory spike
    end
    equations:
        shape g_ex = exp(-t/tau_syn_ex)
        V_m' = -convolve(g_ex, spikeExc) / C_m
    end
    output:
        spike
    end
    update:
        integrate_odes()
    end
end
"#;
    let mut update_expressions = IndexMap::new();
    update_expressions.insert("g_ex".to_string(), "g_ex * __P_0_0".to_string());
    let mut initial_values = IndexMap::new();
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

    let report = run_unit(&PathBuf::from("m.nestml"), source, &config(), &Canned(reply));
    assert!(report.analyzed);
    assert!(!report.has_error_or_worse(), "unexpected diagnostics: {:?}", report.diagnostics);
}

/// Scenario 4: `convolve`'s second argument must name a spike input port,
/// not a plain state variable.
#[test]
fn convolve_on_state_variable_port_is_rejected() {
    let source = r#"
neuron N:
    state:
        g_ex nS = 0 nS
    end
    input:
        spikes <- excitatory spike
    end
    equations:
        V_m' = convolve(g_ex, spikes)
    end
end
"#;
    let report = run_unit(&PathBuf::from("m.nestml"), source, &config(), &Unavailable);
    assert!(report.diagnostics.iter().any(|d| d.code == "CoCoConvolveNotCorrectlyProvided"));
}

/// Scenario 5: two neurons in one file, one broken, one valid — exactly one
/// ERROR, and the valid neuron still reaches C8.
#[test]
fn second_valid_neuron_reaches_c8_despite_first_neurons_error() {
    let source = r#"
neuron Bad:
    equations:
        shape undeclared' = -undeclared / tau
    end
    output:
        spike
    end
end
neuron Good:
    state:
        V_m mV = 0 mV
    end
    equations:
        V_m' = -V_m / tau
    end
    parameters:
        tau ms = 10 ms
    end
    output:
        spike
    end
    update:
        integrate_odes()
    end
end
"#;
    let report = run_unit(&PathBuf::from("m.nestml"), source, &config(), &Unavailable);
    let errors: Vec<_> = report.diagnostics.iter().filter(|d| d.severity >= Severity::Error).collect();
    assert_eq!(errors.len(), 1, "expected exactly one ERROR: {errors:?}");
    assert!(report.analyzed, "the valid neuron should still reach C8");
}

/// Scenario 6: a derivative naming a variable absent from `state`/
/// `initial_values` is an ERROR, not a silently-accepted declaration.
#[test]
fn derivative_of_undeclared_variable_is_an_error() {
    let source = "neuron N:\n    equations:\n        shape f' = 0\n    end\nend\n";
    let report = run_unit(&PathBuf::from("m.nestml"), source, &config(), &Unavailable);
    assert!(report.diagnostics.iter().any(|d| d.code == "CoCoOdeTargetUndeclared"));
}
