//! The orchestrator itself (C9): runs C1 through C8 for one compilation
//! unit, gates C7/C8 on the ERROR-or-worse count accumulated by C1-C6, and
//! fans independent compilation units out across a `rayon` pool, since
//! they have no cross-unit dependencies.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rayon::prelude::*;

use nestml_core::{Diagnostic, DiagnosticLog, Severity};
use nestml_cocos::check_cocos;
use nestml_equations::analyze_equations;
use nestml_parser::{parse_file, CompilationUnit, Model};
use nestml_solver::{analyze_odes, SolverTransport};
use nestml_symbols::{build_symbol_table, SymbolTable};
use nestml_typecheck::check_types;

use crate::config::PipelineConfig;

/// CoCos a `--dev` run downgrades from ERROR to WARN, so a model under
/// active construction can still reach C7/C8 and exercise the ODE
/// pipeline before every parameter is pinned down.
pub const DEV_RELAXED_COCOS: &[&str] = &["CoCoParameterNotConstant", "CoCoReservedNameRedeclared"];

/// Everything the orchestrator learned about one compilation unit, for the
/// renderer and for `--store-log`.
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub file: PathBuf,
    pub unit: CompilationUnit,
    pub diagnostics: Vec<Diagnostic>,
    /// `true` once C6 passed clean and C7/C8 actually ran for this unit.
    pub analyzed: bool,
}

impl UnitReport {
    pub fn has_error_or_worse(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity >= Severity::Error)
    }
}

/// Run C1 through C8 on one file's source text.
pub fn run_unit(file: &Path, source: &str, config: &PipelineConfig, transport: &dyn SolverTransport) -> UnitReport {
    let model_root = config.model_root.as_deref();
    let (unit, mut diagnostics) = parse_file(file, source, model_root);

    let (symbols, mut symbol_diags) = build_symbol_table(&unit);
    diagnostics.append(&mut symbol_diags);

    let (types, mut type_diags) = check_types(&unit, &symbols);
    diagnostics.append(&mut type_diags);

    let mut coco_diags = check_cocos(&unit, &symbols, &types);
    if config.dev {
        relax_dev_cocos(&mut coco_diags);
    }
    diagnostics.append(&mut coco_diags);

    // C1-C6 always run on every unit; the gate onto C7/C8 is per *model*,
    // not per file: one neuron's ERROR must not stop a second, valid
    // neuron declared in the same file from reaching C7/C8.
    let clean_models: Vec<Model> = unit
        .models
        .iter()
        .filter(|m| !model_has_error(m, &diagnostics))
        .cloned()
        .collect();
    let analyzed = !clean_models.is_empty();

    if analyzed {
        let sub_unit = CompilationUnit {
            package: unit.package.clone(),
            artifact: unit.artifact.clone(),
            models: clean_models,
        };
        let (equations, mut eq_diags) = analyze_equations(&sub_unit, &symbols);
        diagnostics.append(&mut eq_diags);

        let (_solver, mut solver_diags) = analyze_odes(
            &sub_unit,
            &equations,
            transport,
            config.solver_timeout(),
            config.sim_time_resolution,
        );
        diagnostics.append(&mut solver_diags);
    }

    UnitReport {
        file: file.to_path_buf(),
        unit,
        diagnostics,
        analyzed,
    }
}

/// Whether any ERROR-or-worse diagnostic's source range falls within this
/// model's own span. Diagnostics anchored outside every model (e.g. a
/// whole-file `PackageNamingAmbiguous` WARN) never gate anything by this
/// rule, which is the point: only per-model failures should stop that
/// model's C7/C8.
fn model_has_error(model: &Model, diagnostics: &[Diagnostic]) -> bool {
    let span = model.range();
    diagnostics
        .iter()
        .filter(|d| d.severity >= Severity::Error)
        .any(|d| d.range.start >= span.start && d.range.end <= span.end)
}

fn relax_dev_cocos(diagnostics: &mut [Diagnostic]) {
    for d in diagnostics.iter_mut() {
        if d.severity == Severity::Error && DEV_RELAXED_COCOS.contains(&d.code.as_str()) {
            d.severity = Severity::Warn;
        }
    }
}

/// Summary of a whole-invocation run: every unit's report plus the merged
/// shared log the exit-code policy reads from.
pub struct RunResult {
    pub reports: Vec<UnitReport>,
    pub log: DiagnosticLog,
}

/// Process every file independently and in parallel (rayon), merging each
/// unit's diagnostics into one shared, thread-safe log.
pub fn run_pipeline(files: &[PathBuf], config: &PipelineConfig, transport: &(dyn SolverTransport + Sync)) -> RunResult {
    let log = DiagnosticLog::new();

    let reports: Vec<UnitReport> = files
        .par_iter()
        .map(|file| {
            let source = match std::fs::read_to_string(file) {
                Ok(s) => s,
                Err(e) => {
                    let diag = Diagnostic::fatal(
                        "SourceFileUnreadable",
                        nestml_core::SourceRange::unknown(),
                        format!("could not read '{}': {e}", file.display()),
                    );
                    return UnitReport {
                        file: file.clone(),
                        unit: CompilationUnit {
                            package: String::new(),
                            artifact: String::new(),
                            models: Vec::new(),
                        },
                        diagnostics: vec![diag],
                        analyzed: false,
                    };
                }
            };
            log::info!("compiling {}", file.display());
            run_unit(file, &source, config, transport)
        })
        .collect();

    for report in &reports {
        log.merge(report.diagnostics.clone());
    }

    RunResult { reports, log }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestml_solver::transport::{SolverTransport as _, TransportError};
    use nestml_solver::protocol::{SolverReply, SolverRequest, SolverStatus};
    use std::path::PathBuf;

    struct AlwaysUnavailable;
    impl SolverTransport for AlwaysUnavailable {
        fn solve(&self, _request: &SolverRequest, _timeout: Duration) -> Result<SolverReply, TransportError> {
            Err(TransportError::Unavailable)
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            input_path: PathBuf::from("."),
            target_path: None,
            model_root: None,
            logging_level: crate::config::LoggingLevel::Info,
            module_name: None,
            suffix: None,
            dev: false,
            store_log: false,
            solver_command: None,
            solver_timeout_secs: 1,
            sim_time_resolution: 0.1,
        }
    }

    #[test]
    fn clean_unit_reaches_c7_and_c8() {
        let source = r#"
neuron N:
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
        let report = run_unit(Path::new("m.nestml"), source, &test_config(), &AlwaysUnavailable);
        assert!(report.analyzed);
        assert!(!report.has_error_or_worse());
    }

    #[test]
    fn unit_with_coco_error_skips_downstream_phases() {
        let source = r#"
neuron N:
    state:
        V_m mV = 0 mV
    end
    equations:
        shape other_than_v' = -other_than_v / tau
    end
end
"#;
        let report = run_unit(Path::new("m.nestml"), source, &test_config(), &AlwaysUnavailable);
        assert!(!report.analyzed);
        assert!(report.has_error_or_worse());
    }

    #[test]
    fn dev_mode_downgrades_parameter_not_constant_to_warn() {
        let source = r#"
neuron N:
    state:
        V_m mV = 0 mV
    end
    parameters:
        scale real = V_m
    end
end
"#;
        let mut config = test_config();
        config.dev = true;
        let report = run_unit(Path::new("m.nestml"), source, &config, &AlwaysUnavailable);
        let coco = report.diagnostics.iter().find(|d| d.code == "CoCoParameterNotConstant");
        assert_eq!(coco.map(|d| d.severity), Some(Severity::Warn));
    }

    #[test]
    fn two_model_unit_with_one_error_still_reports_the_other_clean() {
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
end
"#;
        let report = run_unit(Path::new("m.nestml"), source, &test_config(), &AlwaysUnavailable);
        let errors: Vec<_> = report.diagnostics.iter().filter(|d| d.severity >= Severity::Error).collect();
        assert_eq!(errors.len(), 1, "expected exactly one ERROR: {errors:?}");
    }
}
